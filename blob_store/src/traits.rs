//! Core blob store trait.

use async_trait::async_trait;
use bytes::Bytes;
use futures::{stream::BoxStream, StreamExt, TryStreamExt};

use crate::{BlobMetadata, BlobResult, ListPage, ListRequest};

/// Chunks of blob content.
pub type ByteStream = BoxStream<'static, BlobResult<Bytes>>;

/// Core blob store operations.
///
/// Names are `/`-delimited and relative to the bucket (and base path) the
/// store was created for. Implementations must be safe to share between
/// concurrent tasks.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Create or overwrite the blob `name` with the content of `data`,
    /// consuming it chunk by chunk.
    async fn put(&self, name: &str, data: ByteStream) -> BlobResult<BlobMetadata>;

    /// Stream the content of blob `name`.
    ///
    /// Returns `BlobError::NotFound` if the blob doesn't exist.
    async fn get(&self, name: &str) -> BlobResult<ByteStream>;

    /// List one page of blobs whose names start with `request.prefix`.
    ///
    /// Pages are ordered by name. Passing the returned `next_page_token` back
    /// in the following request continues after the last entry.
    async fn list(&self, request: ListRequest) -> BlobResult<ListPage>;

    /// Write a small blob held in memory.
    async fn put_bytes(&self, name: &str, data: Bytes) -> BlobResult<BlobMetadata> {
        self.put(name, futures::stream::once(async move { Ok(data) }).boxed())
            .await
    }

    /// Get entire blob data.
    async fn read_bytes(&self, name: &str) -> BlobResult<Bytes> {
        let mut chunks: Vec<Bytes> = self.get(name).await?.try_collect().await?;
        if chunks.len() == 1 {
            return Ok(chunks.remove(0));
        }
        Ok(Bytes::from(chunks.concat()))
    }
}
