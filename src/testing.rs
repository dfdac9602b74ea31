use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use blob_store::{
    BlobError,
    BlobMetadata,
    BlobResult,
    BlobStore,
    ByteStream,
    ListPage,
    ListRequest,
    ObjectStoreBlobStore,
};
use bytes::Bytes;
use tracing::subscriber;
use tracing_subscriber::{layer::SubscriberExt, Layer};

use crate::{error::StorageError, paths::FileWalker};

pub fn setup_test_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug"));
    let _ = subscriber::set_global_default(
        tracing_subscriber::registry().with(
            tracing_subscriber::fmt::layer()
                .with_test_writer()
                .with_filter(env_filter),
        ),
    );
}

/// A walk over a fixed list of files.
pub struct FixtureWalker {
    paths: Vec<PathBuf>,
    walked: Mutex<Vec<PathBuf>>,
}

impl FixtureWalker {
    pub fn new(paths: &[&str]) -> Self {
        Self {
            paths: paths.iter().map(PathBuf::from).collect(),
            walked: Mutex::new(Vec::new()),
        }
    }

    pub fn walked_roots(&self) -> Vec<PathBuf> {
        self.walked.lock().unwrap().clone()
    }
}

impl FileWalker for FixtureWalker {
    fn walk(&self, root: &Path) -> Result<Vec<PathBuf>, StorageError> {
        self.walked.lock().unwrap().push(root.to_path_buf());
        Ok(self
            .paths
            .iter()
            .filter(|path| root == Path::new(".") || path.starts_with(root))
            .cloned()
            .collect())
    }

    fn is_file(&self, path: &Path) -> bool {
        self.paths.iter().any(|p| p == path)
    }
}

/// In-memory store that fails selected operations and counts calls.
pub struct FaultyStore {
    inner: ObjectStoreBlobStore,
    fail_puts: HashSet<String>,
    fail_gets: HashSet<String>,
    fail_lists: bool,
    unauthorized: bool,
    puts: AtomicUsize,
    gets: AtomicUsize,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self {
            inner: ObjectStoreBlobStore::in_memory(),
            fail_puts: HashSet::new(),
            fail_gets: HashSet::new(),
            fail_lists: false,
            unauthorized: false,
            puts: AtomicUsize::new(0),
            gets: AtomicUsize::new(0),
        }
    }

    pub fn fail_put(mut self, name: &str) -> Self {
        self.fail_puts.insert(name.to_string());
        self
    }

    pub fn fail_get(mut self, name: &str) -> Self {
        self.fail_gets.insert(name.to_string());
        self
    }

    pub fn fail_lists(mut self) -> Self {
        self.fail_lists = true;
        self
    }

    /// Reject every call the way a backend without credentials does.
    pub fn unauthorized(mut self) -> Self {
        self.unauthorized = true;
        self
    }

    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// Read through to the backing store without counting.
    pub async fn peek(&self, name: &str) -> BlobResult<Bytes> {
        self.inner.read_bytes(name).await
    }

    fn check(&self, name: &str, failing: &HashSet<String>) -> BlobResult<()> {
        if self.unauthorized {
            return Err(BlobError::Unauthorized {
                source: anyhow::anyhow!("401 Unauthorized: {}", name),
            });
        }
        if failing.contains(name) {
            return Err(BlobError::NetworkError {
                source: anyhow::anyhow!("503 Service Unavailable: {}", name),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for FaultyStore {
    async fn put(&self, name: &str, data: ByteStream) -> BlobResult<BlobMetadata> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.check(name, &self.fail_puts)?;
        self.inner.put(name, data).await
    }

    async fn get(&self, name: &str) -> BlobResult<ByteStream> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.check(name, &self.fail_gets)?;
        self.inner.get(name).await
    }

    async fn list(&self, request: ListRequest) -> BlobResult<ListPage> {
        self.check(&request.prefix, &HashSet::new())?;
        if self.fail_lists {
            return Err(BlobError::NetworkError {
                source: anyhow::anyhow!("503 Service Unavailable: list {}", request.prefix),
            });
        }
        self.inner.list(request).await
    }
}
