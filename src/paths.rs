//! Resolution of CLI path arguments into a set of local files.
//!
//! When a path argument contains a wildcard the calling shell either expanded
//! it into several literal paths already, or (for patterns like `**/*` it
//! cannot expand, or quoted ones) passed the pattern through unchanged. Both
//! shapes are accepted: literal entries are taken as-is and every entry that
//! still contains a wildcard is walked and matched here.

use std::{
    collections::BTreeSet,
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use globset::GlobBuilder;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::StorageError;

/// Marks an entry as a glob pattern. Without it an entry stays literal even
/// when it contains other glob syntax, as in `pages/[id].js`.
const WILDCARD: char = '*';

/// Characters with a meaning inside a glob pattern.
const GLOB_META: &[char] = &['*', '?', '[', '{'];

/// Source of directory walks, so tests can replace the filesystem.
pub trait FileWalker: Send + Sync {
    /// Every path below `root`, `root` included, each joined onto `root`.
    ///
    /// A missing `root` yields no paths.
    fn walk(&self, root: &Path) -> Result<Vec<PathBuf>, StorageError>;

    fn is_file(&self, path: &Path) -> bool;
}

/// Walks the local filesystem, resolving relative paths against a working
/// directory.
pub struct LocalWalker {
    working_dir: PathBuf,
}

impl LocalWalker {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
        }
    }
}

impl FileWalker for LocalWalker {
    fn walk(&self, root: &Path) -> Result<Vec<PathBuf>, StorageError> {
        let abs_root = self.working_dir.join(root);
        if !abs_root.exists() {
            debug!(root = %abs_root.display(), "glob root does not exist");
            return Ok(Vec::new());
        }

        let mut paths = Vec::new();
        for entry in WalkDir::new(&abs_root) {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(abs_root.as_path()).to_path_buf();
                StorageError::local_io(path, e.into())
            })?;
            let path = entry
                .path()
                .strip_prefix(&self.working_dir)
                .unwrap_or(entry.path());
            paths.push(path.to_path_buf());
        }
        Ok(paths)
    }

    fn is_file(&self, path: &Path) -> bool {
        self.working_dir.join(path).is_file()
    }
}

#[derive(Clone)]
pub struct PathResolver {
    walker: Arc<dyn FileWalker>,
}

impl PathResolver {
    pub fn new(walker: Arc<dyn FileWalker>) -> Self {
        Self { walker }
    }

    pub fn local(working_dir: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(LocalWalker::new(working_dir)))
    }

    /// Expand literal paths and glob patterns into a sorted, de-duplicated
    /// set of normalized paths.
    ///
    /// Directories matched by a glob are included; see [`Self::files_only`].
    pub fn resolve(&self, entries: &[String]) -> Result<BTreeSet<PathBuf>, StorageError> {
        if entries.is_empty() {
            return Err(StorageError::invalid_argument("Paths or glob is empty."));
        }

        let (globs, literals): (Vec<&String>, Vec<&String>) =
            entries.iter().partition(|entry| has_wildcard(entry));

        let mut resolved: BTreeSet<PathBuf> = literals
            .into_iter()
            .map(|literal| normalize_path(Path::new(literal)))
            .collect();
        for glob in globs {
            resolved.extend(self.resolve_glob(glob)?);
        }
        Ok(resolved)
    }

    fn resolve_glob(&self, glob: &str) -> Result<Vec<PathBuf>, StorageError> {
        let glob = normalize_glob(glob);
        let matcher = GlobBuilder::new(glob)
            .literal_separator(true)
            .build()
            .map_err(|e| StorageError::invalid_argument(format!("Invalid glob {}: {}", glob, e)))?
            .compile_matcher();

        let root = glob_root_dir(glob);
        let matched: Vec<PathBuf> = self
            .walker
            .walk(&root)?
            .into_iter()
            .map(|path| normalize_path(&path))
            .filter(|path| matcher.is_match(path))
            .collect();

        debug!(
            glob = %glob,
            root = %root.display(),
            matched = matched.len(),
            "resolved glob"
        );
        Ok(matched)
    }

    /// Keep only the paths that are regular files.
    pub fn files_only(&self, paths: BTreeSet<PathBuf>) -> BTreeSet<PathBuf> {
        paths
            .into_iter()
            .filter(|path| self.walker.is_file(path))
            .collect()
    }
}

pub fn has_wildcard(entry: &str) -> bool {
    entry.contains(WILDCARD)
}

/// Strip redundant leading `./` segments from a glob.
pub fn normalize_glob(glob: &str) -> &str {
    let mut glob = glob;
    while let Some(rest) = glob.strip_prefix("./") {
        glob = rest;
    }
    glob
}

/// The deepest directory of `glob` without wildcards, which bounds the walk.
pub fn glob_root_dir(glob: &str) -> PathBuf {
    let segments: Vec<&str> = glob
        .split('/')
        .take_while(|segment| !segment.contains(GLOB_META))
        .collect();
    if segments.is_empty() {
        return PathBuf::from(".");
    }
    let root = segments.join("/");
    if root.is_empty() {
        // the pattern started with `/`
        return PathBuf::from("/");
    }
    normalize_path(Path::new(&root))
}

/// Lexically resolve `.` and `..` without touching the filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => normalized.push(".."),
            },
            other => normalized.push(other.as_os_str()),
        }
    }
    if normalized.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        normalized
    }
}
