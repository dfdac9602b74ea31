//! Blob store backed by the `object_store` crate.
//!
//! One adapter covers every supported scheme: `gs://` and `s3://` build cloud
//! clients from the ambient environment, `file://` writes to the local
//! filesystem and `memory://` keeps everything in process.

use std::sync::Arc;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use object_store::{
    aws::AmazonS3Builder,
    buffered::BufWriter,
    gcp::GoogleCloudStorageBuilder,
    local::LocalFileSystem,
    memory::InMemory,
    path::Path,
    ObjectMeta,
    ObjectStore,
    ObjectStoreScheme,
    RetryConfig,
};
use tokio::io::AsyncWriteExt;
use tracing::debug;
use url::Url;

use crate::{
    BlobError,
    BlobMetadata,
    BlobResult,
    BlobStorageConfig,
    BlobStore,
    ByteStream,
    ListPage,
    ListRequest,
};

/// Blob store over any `object_store` backend, rooted at a base path.
#[derive(Debug, Clone)]
pub struct ObjectStoreBlobStore {
    object_store: Arc<dyn ObjectStore>,
    base_path: Path,
    /// Whether the backend lists in lexicographic order, which lets a page
    /// stop reading early. The local filesystem walks in directory order.
    ordered_listing: bool,
}

impl ObjectStoreBlobStore {
    pub fn new(object_store: Arc<dyn ObjectStore>, base_path: Path) -> Self {
        Self {
            object_store,
            base_path,
            ordered_listing: true,
        }
    }

    /// Process-local store, used for dry runs and tests.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()), Path::default())
    }

    pub fn from_config(config: &BlobStorageConfig) -> BlobResult<Self> {
        Self::from_url(config.bucket_url()?)
    }

    /// Build a store from a bucket URL such as `gs://bucket/base`.
    ///
    /// Cloud credentials come from the environment
    /// (`GOOGLE_APPLICATION_CREDENTIALS`, `GOOGLE_SERVICE_ACCOUNT`, `AWS_*`).
    /// Client-side retries are disabled; failures surface immediately.
    pub fn from_url(url_str: &str) -> BlobResult<Self> {
        let url = url_str.parse::<Url>().map_err(|e| BlobError::InvalidUri {
            uri: url_str.to_string(),
            reason: e.to_string(),
        })?;
        let (scheme, base_path) =
            ObjectStoreScheme::parse(&url).map_err(|e| BlobError::InvalidUri {
                uri: url_str.to_string(),
                reason: e.to_string(),
            })?;
        let no_retry = RetryConfig {
            max_retries: 0,
            ..Default::default()
        };

        let ordered_listing = !matches!(scheme, ObjectStoreScheme::Local);
        let object_store: Arc<dyn ObjectStore> = match scheme {
            ObjectStoreScheme::GoogleCloudStorage => Arc::new(
                GoogleCloudStorageBuilder::from_env()
                    .with_url(url_str)
                    .with_retry(no_retry)
                    .build()
                    .map_err(|e| BlobError::InvalidUri {
                        uri: url_str.to_string(),
                        reason: e.to_string(),
                    })?,
            ),
            ObjectStoreScheme::AmazonS3 => Arc::new(
                AmazonS3Builder::from_env()
                    .with_url(url_str)
                    .with_retry(no_retry)
                    .build()
                    .map_err(|e| BlobError::InvalidUri {
                        uri: url_str.to_string(),
                        reason: e.to_string(),
                    })?,
            ),
            ObjectStoreScheme::Local => Arc::new(LocalFileSystem::new()),
            ObjectStoreScheme::Memory => Arc::new(InMemory::new()),
            other => {
                return Err(BlobError::UnsupportedBackend {
                    scheme: format!("{:?}", other),
                })
            }
        };

        debug!(
            url = %url_str,
            base_path = %base_path,
            "created object store blob store"
        );
        Ok(Self {
            ordered_listing,
            ..Self::new(object_store, base_path)
        })
    }

    /// Convert a blob name to an object location under the base path.
    fn key_to_path(&self, name: &str) -> Path {
        if self.base_path.as_ref().is_empty() {
            Path::from(name)
        } else {
            Path::from(format!("{}/{}", self.base_path, name))
        }
    }

    /// Inverse of [`Self::key_to_path`].
    fn path_to_name(&self, location: &Path) -> String {
        let raw: &str = location.as_ref();
        let base: &str = self.base_path.as_ref();
        if base.is_empty() {
            return raw.to_string();
        }
        raw.strip_prefix(base)
            .map(|rest| rest.trim_start_matches('/'))
            .unwrap_or(raw)
            .to_string()
    }

    fn to_metadata(&self, meta: ObjectMeta) -> BlobMetadata {
        BlobMetadata {
            name: self.path_to_name(&meta.location),
            size_bytes: meta.size as u64,
            etag: meta.e_tag,
            last_modified: Some(meta.last_modified),
        }
    }
}

#[async_trait]
impl BlobStore for ObjectStoreBlobStore {
    async fn put(&self, name: &str, data: ByteStream) -> BlobResult<BlobMetadata> {
        // a single PUT for small blobs, a multipart upload past the buffer size
        let mut writer = BufWriter::new(self.object_store.clone(), self.key_to_path(name));
        match write_all(&mut writer, data).await {
            Ok(size_bytes) => Ok(BlobMetadata::with_size(name, size_bytes)),
            Err(err) => {
                if let Err(abort_err) = writer.abort().await {
                    debug!(blob = %name, error = %abort_err, "failed to abort upload");
                }
                Err(err)
            }
        }
    }

    async fn get(&self, name: &str) -> BlobResult<ByteStream> {
        let path = self.key_to_path(name);
        let result = self.object_store.get(&path).await.map_err(|e| match e {
            object_store::Error::NotFound { .. } => BlobError::NotFound {
                name: name.to_string(),
            },
            other => BlobError::from(other),
        })?;
        Ok(result.into_stream().map_err(BlobError::from).boxed())
    }

    async fn list(&self, request: ListRequest) -> BlobResult<ListPage> {
        // object_store matches prefixes on whole path segments, so list the
        // directory holding the prefix and filter on the raw string.
        let dir = match request.prefix.rsplit_once('/') {
            Some((dir, _)) => self.key_to_path(dir),
            None => self.base_path.clone(),
        };
        let dir = (!dir.as_ref().is_empty()).then_some(dir);
        let after = request.page_token.as_deref().unwrap_or("");
        let wanted = |name: &str| name.starts_with(&request.prefix) && name > after;

        if request.delimited {
            // grouped server side, so this reads one entry per group rather
            // than one per object
            let result = self.object_store.list_with_delimiter(dir.as_ref()).await?;
            let mut entries: Vec<(String, Option<BlobMetadata>)> = Vec::new();
            for prefix in result.common_prefixes {
                let name = self.path_to_name(&prefix);
                if wanted(&name) {
                    entries.push((name, None));
                }
            }
            for meta in result.objects {
                let meta = self.to_metadata(meta);
                if wanted(&meta.name) {
                    entries.push((meta.name.clone(), Some(meta)));
                }
            }
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let has_more = entries.len() > request.page_size;
            entries.truncate(request.page_size);

            let mut page = ListPage::default();
            if has_more {
                page.next_page_token = entries.last().map(|(name, _)| name.clone());
            }
            for (name, meta) in entries {
                match meta {
                    Some(meta) => page.objects.push(meta),
                    None => page.common_prefixes.push(name),
                }
            }
            return Ok(page);
        }

        let offset = request.page_token.as_deref().map(|token| self.key_to_path(token));
        let mut stream = match &offset {
            Some(offset) => self.object_store.list_with_offset(dir.as_ref(), offset),
            None => self.object_store.list(dir.as_ref()),
        };

        let mut objects = Vec::new();
        let mut has_more = false;
        while let Some(meta) = stream.try_next().await? {
            let meta = self.to_metadata(meta);
            if !wanted(&meta.name) {
                let past_prefix = !meta.name.starts_with(&request.prefix)
                    && meta.name.as_str() > request.prefix.as_str();
                if self.ordered_listing && past_prefix {
                    // sorted past every name carrying the prefix
                    break;
                }
                continue;
            }
            if self.ordered_listing && objects.len() == request.page_size {
                has_more = true;
                break;
            }
            objects.push(meta);
        }
        if !self.ordered_listing {
            objects.sort_by(|a, b| a.name.cmp(&b.name));
            has_more = objects.len() > request.page_size;
            objects.truncate(request.page_size);
        }

        Ok(ListPage {
            next_page_token: if has_more {
                objects.last().map(|meta| meta.name.clone())
            } else {
                None
            },
            objects,
            common_prefixes: Vec::new(),
        })
    }
}

async fn write_all(writer: &mut BufWriter, mut data: ByteStream) -> BlobResult<u64> {
    let mut size_bytes = 0;
    while let Some(chunk) = data.next().await {
        let chunk = chunk?;
        size_bytes += chunk.len() as u64;
        writer.put(chunk).await?;
    }
    writer.shutdown().await?;
    Ok(size_bytes)
}
