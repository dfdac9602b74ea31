//! Index records mapping `(key, tag)` to the blob names of one upload.
//!
//! An index lives at `<namespace>/<key>/<tag>` and holds the blob names joined
//! with `\n`. Names are not escaped, so a name containing a newline would be
//! read back as two names.

use std::{collections::HashSet, sync::Arc};

use blob_store::BlobStore;
use bytes::Bytes;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::{error::StorageError, transfer::UploadedBlob};

pub const DEFAULT_INDEX_NAMESPACE: &str = "skw_index";

#[derive(Clone)]
pub struct IndexManager {
    store: Arc<dyn BlobStore>,
    namespace: String,
}

impl IndexManager {
    pub fn new(store: Arc<dyn BlobStore>, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
        }
    }

    pub fn index_name(&self, key: &str, tag: &str) -> String {
        format!("{}/{}/{}", self.namespace, key, tag)
    }

    /// Write one index per tag, all with the same content. Existing indexes
    /// for these tags are overwritten.
    pub async fn write(
        &self,
        blobs: &[UploadedBlob],
        key: &str,
        tags: &[String],
    ) -> Result<(), StorageError> {
        validate_segment("key", key)?;
        for tag in tags {
            validate_segment("tag", tag)?;
        }
        if tags.is_empty() {
            warn!(key = %key, "no tags given, index is not written");
            return Ok(());
        }

        let content = Bytes::from(encode_index(blobs.iter().map(|blob| blob.name.as_str())));
        let mut seen = HashSet::new();
        let mut tasks = JoinSet::new();
        for tag in tags.iter().filter(|tag| seen.insert(tag.as_str())) {
            let name = self.index_name(key, tag);
            let content = content.clone();
            let store = self.store.clone();
            tasks.spawn(async move {
                store.put_bytes(&name, content).await?;
                debug!(index = %name, "wrote index");
                Ok::<_, StorageError>(())
            });
        }
        while let Some(result) = tasks.join_next().await {
            result??;
        }
        Ok(())
    }

    /// Fetch the blob names recorded for `key`/`tag`, in written order.
    ///
    /// An index written for zero blobs reads back as a single empty name.
    pub async fn read(&self, key: &str, tag: &str) -> Result<Vec<String>, StorageError> {
        validate_segment("key", key)?;
        validate_segment("tag", tag)?;

        let name = self.index_name(key, tag);
        let content = match self.store.read_bytes(&name).await {
            Ok(content) => content,
            Err(err) if err.is_not_found() => {
                return Err(StorageError::NotFound(format!(
                    "Index file not found. key: {}, tag: {}",
                    key, tag
                )))
            }
            Err(err) => return Err(err.into()),
        };
        decode_index(&name, content)
    }
}

pub fn encode_index<'a>(names: impl IntoIterator<Item = &'a str>) -> String {
    names.into_iter().collect::<Vec<_>>().join("\n")
}

pub fn decode_index(name: &str, content: Bytes) -> Result<Vec<String>, StorageError> {
    let text = String::from_utf8(content.to_vec()).map_err(|source| StorageError::InvalidIndex {
        name: name.to_string(),
        source,
    })?;
    Ok(text.split('\n').map(str::to_string).collect())
}

/// Keys and tags become path segments of the index name.
pub(crate) fn validate_segment(kind: &str, value: &str) -> Result<(), StorageError> {
    if value.is_empty() {
        return Err(StorageError::invalid_argument(format!(
            "{} must not be empty",
            kind
        )));
    }
    if value.contains(['/', '\n']) {
        return Err(StorageError::invalid_argument(format!(
            "{} must not contain '/' or newlines: {:?}",
            kind, value
        )));
    }
    Ok(())
}
