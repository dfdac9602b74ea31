use std::{
    collections::BTreeSet,
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use blob_store::{BlobError, BlobStore};
use futures::{StreamExt, TryStreamExt};
use tokio::{io::AsyncWriteExt, task::JoinSet};
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::{error::StorageError, paths::normalize_path};

/// A local file written to the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedBlob {
    pub name: String,
    pub local_path: PathBuf,
    pub size_bytes: u64,
    pub etag: Option<String>,
}

/// Concurrent bulk transfers between the local filesystem and a blob store.
///
/// Every file is transferred by its own task. The first failing task fails
/// the whole batch and the remaining tasks are aborted; whatever was already
/// written stays written.
#[derive(Clone)]
pub struct BlobTransfer {
    store: Arc<dyn BlobStore>,
    working_dir: PathBuf,
}

impl BlobTransfer {
    /// Relative local paths are read and written under `working_dir`.
    pub fn new(store: Arc<dyn BlobStore>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            working_dir: working_dir.into(),
        }
    }

    /// Upload `files`, naming each blob after its path re-rooted under
    /// `prefix`. The result follows the order of `files`.
    pub async fn upload_all(
        &self,
        files: &BTreeSet<PathBuf>,
        prefix: Option<&str>,
    ) -> Result<Vec<UploadedBlob>, StorageError> {
        if files.is_empty() {
            return Err(StorageError::invalid_argument(
                "None of files are matched by paths or glob",
            ));
        }
        debug!(files = ?files, "uploading local files");

        let mut named = Vec::with_capacity(files.len());
        for local_path in files {
            let name = to_blob_name(local_path, prefix);
            if name == ".." || name.starts_with("../") {
                return Err(StorageError::invalid_argument(format!(
                    "Blob name {} of {} is outside of the bucket root, \
                     upload from a directory containing the file or set a prefix",
                    name,
                    local_path.display()
                )));
            }
            named.push((name, local_path.clone()));
        }

        let mut tasks = JoinSet::new();
        for (position, (name, local_path)) in named.into_iter().enumerate() {
            let source = self.working_dir.join(&local_path);
            let store = self.store.clone();
            tasks.spawn(async move {
                let file = tokio::fs::File::open(&source)
                    .await
                    .map_err(|e| StorageError::local_io(source.clone(), e))?;
                let path = source.clone();
                let content = ReaderStream::new(file)
                    .map_err(move |e| BlobError::IoError {
                        source: std::io::Error::new(
                            e.kind(),
                            format!("reading {}: {}", path.display(), e),
                        ),
                    })
                    .boxed();
                let metadata = store.put(&name, content).await?;
                debug!(blob = %name, size_bytes = metadata.size_bytes, "uploaded blob");
                Ok::<_, StorageError>((
                    position,
                    UploadedBlob {
                        name,
                        local_path,
                        size_bytes: metadata.size_bytes,
                        etag: metadata.etag,
                    },
                ))
            });
        }

        let mut uploaded = Vec::with_capacity(files.len());
        while let Some(result) = tasks.join_next().await {
            // returning drops `tasks`, which aborts the uploads still running
            uploaded.push(result??);
        }
        uploaded.sort_by_key(|(position, _)| *position);
        Ok(uploaded.into_iter().map(|(_, blob)| blob).collect())
    }

    /// Download every blob in `names` to `local_prefix/<name>`, creating
    /// directories as needed. Returns the written paths in `names` order.
    pub async fn download_all(
        &self,
        names: &[String],
        local_prefix: &Path,
    ) -> Result<Vec<PathBuf>, StorageError> {
        let mut targets = Vec::with_capacity(names.len());
        for name in names.iter().filter(|name| !name.is_empty()) {
            targets.push((name.clone(), destination(local_prefix, name)?));
        }

        let mut tasks = JoinSet::new();
        for (position, (name, local_path)) in targets.into_iter().enumerate() {
            let target = self.working_dir.join(&local_path);
            let store = self.store.clone();
            tasks.spawn(async move {
                let mut content = store.get(&name).await?;
                if let Some(parent) = target.parent() {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .map_err(|e| StorageError::local_io(parent, e))?;
                }
                let mut file = tokio::fs::File::create(&target)
                    .await
                    .map_err(|e| StorageError::local_io(target.clone(), e))?;
                while let Some(chunk) = content.try_next().await? {
                    file.write_all(&chunk)
                        .await
                        .map_err(|e| StorageError::local_io(target.clone(), e))?;
                }
                file.flush()
                    .await
                    .map_err(|e| StorageError::local_io(target.clone(), e))?;
                debug!(blob = %name, path = %local_path.display(), "downloaded blob");
                Ok::<_, StorageError>((position, local_path))
            });
        }

        let mut downloaded = Vec::new();
        while let Some(result) = tasks.join_next().await {
            downloaded.push(result??);
        }
        downloaded.sort_by_key(|(position, _)| *position);
        Ok(downloaded.into_iter().map(|(_, path)| path).collect())
    }
}

/// `./sample/text.txt` becomes `sample/text.txt`. Components are joined with
/// `/` on every platform.
pub fn to_blob_name(local_path: &Path, prefix: Option<&str>) -> String {
    let remote = normalize_path(&Path::new(prefix.unwrap_or(".")).join(local_path));
    remote
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Local path for blob `name` under `local_prefix`; names may not climb out
/// of the prefix.
fn destination(local_prefix: &Path, name: &str) -> Result<PathBuf, StorageError> {
    let relative = normalize_path(Path::new(name));
    let escapes = relative.has_root()
        || relative
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_) | Component::CurDir));
    if escapes {
        return Err(StorageError::invalid_argument(format!(
            "Blob {} would be written outside of {}",
            name,
            local_prefix.display()
        )));
    }
    Ok(normalize_path(&local_prefix.join(relative)))
}
