use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
    sync::Arc,
};

use blob_store::{BlobStorageConfig, BlobStore, ListRequest, ObjectStoreBlobStore};
use tracing::{info, warn};

use crate::{
    catalog::{CatalogBrowser, DEFAULT_PAGE_SIZE},
    config::SkwConfig,
    error::StorageError,
    index::{validate_segment, IndexManager, DEFAULT_INDEX_NAMESPACE},
    paths::{has_wildcard, normalize_path, PathResolver},
    transfer::{BlobTransfer, UploadedBlob},
};

#[derive(Debug, Clone)]
pub struct StorageOptions {
    pub index_namespace: String,
    pub page_size: usize,
    /// Base for relative local paths, both for uploads and downloads.
    pub working_dir: PathBuf,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            index_namespace: DEFAULT_INDEX_NAMESPACE.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            working_dir: PathBuf::from("."),
        }
    }
}

impl StorageOptions {
    pub fn from_config(config: &SkwConfig) -> Self {
        Self {
            index_namespace: config.index_namespace.clone(),
            page_size: config.page_size,
            ..Default::default()
        }
    }

    pub fn with_working_dir(mut self, working_dir: impl Into<PathBuf>) -> Self {
        self.working_dir = working_dir.into();
        self
    }
}

/// Entry point for every command: uploads files under a key and tags, and
/// resolves a key and tag back into local files.
#[derive(Clone)]
pub struct Storage {
    resolver: PathResolver,
    transfer: BlobTransfer,
    index: IndexManager,
    catalog: CatalogBrowser,
}

impl Storage {
    pub fn new(store: Arc<dyn BlobStore>, options: StorageOptions) -> Self {
        Self {
            resolver: PathResolver::local(options.working_dir.clone()),
            transfer: BlobTransfer::new(store.clone(), options.working_dir),
            index: IndexManager::new(store.clone(), options.index_namespace.clone()),
            catalog: CatalogBrowser::new(store, options.index_namespace, options.page_size),
        }
    }

    /// Open the bucket named by `config` and check that it is reachable with
    /// the ambient credentials.
    pub async fn connect(
        config: &BlobStorageConfig,
        options: StorageOptions,
    ) -> Result<Self, StorageError> {
        let bucket = config.bucket_url()?.to_string();
        let store = ObjectStoreBlobStore::from_config(config)?;
        // reads at most two entries whatever the bucket holds
        match store.list(ListRequest::new("", 1)).await {
            Ok(_) => {}
            Err(err) if err.is_not_found() => {
                return Err(StorageError::invalid_argument(format!(
                    "bucket {} does not exist",
                    bucket
                )))
            }
            Err(err) => return Err(err.into()),
        }
        info!(bucket = %bucket, "connected to bucket");
        Ok(Self::new(Arc::new(store), options))
    }

    #[cfg(test)]
    pub fn with_resolver(mut self, resolver: PathResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Upload the files matched by `paths_or_glob` and record them under
    /// `key` for every tag in `tags`.
    ///
    /// No index is written unless every file was uploaded.
    #[tracing::instrument(skip_all, fields(key = %key, tags = ?tags))]
    pub async fn upload(
        &self,
        paths_or_glob: &[String],
        key: &str,
        tags: &[String],
        prefix: Option<&str>,
    ) -> Result<Vec<UploadedBlob>, StorageError> {
        validate_segment("key", key)?;
        for tag in tags {
            validate_segment("tag", tag)?;
        }

        let resolver = self.resolver.clone();
        let entries = paths_or_glob.to_vec();
        let files = tokio::task::spawn_blocking(move || resolve_files(&resolver, &entries))
            .await??;

        let blobs = self.transfer.upload_all(&files, prefix).await?;
        self.index.write(&blobs, key, tags).await?;
        info!(blobs = blobs.len(), "uploaded");
        Ok(blobs)
    }

    /// Download every blob recorded under `key`/`tag` into `local_path`.
    #[tracing::instrument(skip_all, fields(key = %key, tag = %tag))]
    pub async fn download(
        &self,
        local_path: &Path,
        key: &str,
        tag: &str,
    ) -> Result<Vec<PathBuf>, StorageError> {
        let names: Vec<String> = self
            .index
            .read(key, tag)
            .await?
            .into_iter()
            .filter(|name| !name.is_empty())
            .collect();
        if names.is_empty() {
            info!("index is empty, nothing to download");
            return Ok(Vec::new());
        }

        let downloaded = self.transfer.download_all(&names, local_path).await?;
        info!(files = downloaded.len(), dest = %local_path.display(), "downloaded");
        Ok(downloaded)
    }

    pub async fn list_keys(&self, prefix: Option<&str>) -> Result<Vec<String>, StorageError> {
        self.catalog.list_keys(prefix).await
    }

    pub async fn list_tags(&self, key: &str) -> Result<Vec<String>, StorageError> {
        self.catalog.list_tags(key).await
    }
}

fn resolve_files(
    resolver: &PathResolver,
    entries: &[String],
) -> Result<BTreeSet<PathBuf>, StorageError> {
    let files = resolver.files_only(resolver.resolve(entries)?);
    for entry in entries.iter().filter(|entry| !has_wildcard(entry)) {
        let path = normalize_path(Path::new(entry));
        if !files.contains(&path) {
            warn!(path = %path.display(), "not a regular file, skipping");
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use tempfile::TempDir;

    use super::*;
    use crate::testing::{setup_test_tracing, FaultyStore, FixtureWalker};

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn storage(store: Arc<FaultyStore>, dir: &TempDir) -> Storage {
        Storage::new(
            store,
            StorageOptions::default().with_working_dir(dir.path()),
        )
    }

    #[tokio::test]
    async fn test_upload_skips_directories_and_missing_files() -> Result<()> {
        setup_test_tracing();
        let dir = TempDir::new()?;
        std::fs::create_dir_all(dir.path().join("data/nested"))?;
        std::fs::write(dir.path().join("data/a.bin"), b"a")?;
        std::fs::write(dir.path().join("data/nested/b.bin"), b"b")?;
        let store = Arc::new(FaultyStore::new());

        let blobs = storage(store.clone(), &dir)
            .upload(
                &strings(&["data/**", "missing.txt"]),
                "demo",
                &strings(&["v1"]),
                None,
            )
            .await?;

        let names: Vec<&str> = blobs.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["data/a.bin", "data/nested/b.bin"]);
        assert_eq!(
            store.peek("skw_index/demo/v1").await?.as_ref(),
            b"data/a.bin\ndata/nested/b.bin"
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_upload_with_prefix() -> Result<()> {
        let dir = TempDir::new()?;
        std::fs::create_dir_all(dir.path().join("build"))?;
        std::fs::write(dir.path().join("build/app"), b"binary")?;
        let store = Arc::new(FaultyStore::new());

        let blobs = storage(store.clone(), &dir)
            .upload(
                &strings(&["./build/app"]),
                "app",
                &strings(&["v1", "latest"]),
                Some("releases"),
            )
            .await?;

        assert_eq!(blobs[0].name, "releases/build/app");
        assert_eq!(store.peek("releases/build/app").await?.as_ref(), b"binary");
        assert_eq!(
            store.peek("skw_index/app/latest").await?.as_ref(),
            b"releases/build/app"
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_upload_rejects_bad_key_before_resolving() -> Result<()> {
        let dir = TempDir::new()?;
        let walker = Arc::new(FixtureWalker::new(&["a.txt"]));
        let store = Arc::new(FaultyStore::new());
        let storage =
            storage(store.clone(), &dir).with_resolver(PathResolver::new(walker.clone()));

        let err = storage
            .upload(&strings(&["*.txt"]), "a/b", &strings(&["v1"]), None)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidArgument(_)));
        assert!(walker.walked_roots().is_empty());
        assert_eq!(store.puts(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_upload_uses_injected_walker() -> Result<()> {
        let dir = TempDir::new()?;
        std::fs::write(dir.path().join("a.txt"), b"a")?;
        let walker = Arc::new(FixtureWalker::new(&["a.txt", "b.md"]));
        let store = Arc::new(FaultyStore::new());
        let storage =
            storage(store.clone(), &dir).with_resolver(PathResolver::new(walker.clone()));

        let blobs = storage
            .upload(&strings(&["*.txt"]), "demo", &strings(&["v1"]), None)
            .await?;
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0].name, "a.txt");
        assert_eq!(walker.walked_roots(), vec![PathBuf::from(".")]);
        Ok(())
    }

    #[tokio::test]
    async fn test_list_delegates_to_catalog() -> Result<()> {
        let dir = TempDir::new()?;
        std::fs::write(dir.path().join("a.txt"), b"a")?;
        let storage = storage(Arc::new(FaultyStore::new()), &dir);

        storage
            .upload(&strings(&["a.txt"]), "demo", &strings(&["v1"]), None)
            .await?;
        assert_eq!(storage.list_keys(None).await?, vec!["demo"]);
        assert_eq!(storage.list_tags("demo").await?, vec!["v1"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_connect_memory_bucket() -> Result<()> {
        let storage = Storage::connect(
            &BlobStorageConfig::new("memory://"),
            StorageOptions::default(),
        )
        .await?;
        assert!(storage.list_keys(None).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_connect_rejects_bad_bucket_urls() {
        for config in [
            BlobStorageConfig::default(),
            BlobStorageConfig::new("bucket-without-scheme"),
            BlobStorageConfig::new("https://example.com/bucket"),
        ] {
            match Storage::connect(&config, StorageOptions::default()).await {
                Err(StorageError::InvalidArgument(_)) => {}
                Err(other) => panic!("{:?}: unexpected error {:?}", config, other),
                Ok(_) => panic!("{:?}: connected", config),
            }
        }
    }
}
