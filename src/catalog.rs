use std::sync::Arc;

use blob_store::{BlobMetadata, BlobStore, ListRequest};
use tracing::debug;

use crate::{error::StorageError, index::validate_segment};

pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Lists keys and tags by scanning the index namespace.
#[derive(Clone)]
pub struct CatalogBrowser {
    store: Arc<dyn BlobStore>,
    namespace: String,
    page_size: usize,
}

impl CatalogBrowser {
    pub fn new(store: Arc<dyn BlobStore>, namespace: impl Into<String>, page_size: usize) -> Self {
        Self {
            store,
            namespace: namespace.into(),
            page_size,
        }
    }

    /// Keys with at least one index, optionally restricted to keys starting
    /// with `prefix`. Sorted by name.
    pub async fn list_keys(&self, prefix: Option<&str>) -> Result<Vec<String>, StorageError> {
        let namespace_prefix = format!("{}/", self.namespace);
        let request = ListRequest::new(
            format!("{}{}", namespace_prefix, prefix.unwrap_or("")),
            self.page_size,
        )
        .delimited();

        let mut keys = Vec::new();
        let mut page_token = None;
        loop {
            let page = self
                .store
                .list(request.clone().with_page_token(page_token))
                .await?;
            keys.extend(
                page.common_prefixes
                    .iter()
                    .filter_map(|group| group.strip_prefix(&namespace_prefix))
                    .map(|key| key.trim_end_matches('/').to_string()),
            );
            page_token = page.next_page_token;
            if page_token.is_none() {
                break;
            }
        }
        debug!(prefix = ?prefix, keys = keys.len(), "listed keys");
        Ok(keys)
    }

    /// Tags of `key`, most recently updated first.
    pub async fn list_tags(&self, key: &str) -> Result<Vec<String>, StorageError> {
        validate_segment("key", key)?;
        let request = ListRequest::new(format!("{}/{}/", self.namespace, key), self.page_size);

        let mut indexes: Vec<BlobMetadata> = Vec::new();
        let mut page_token = None;
        loop {
            let page = self
                .store
                .list(request.clone().with_page_token(page_token))
                .await?;
            indexes.extend(page.objects);
            page_token = page.next_page_token;
            if page_token.is_none() {
                break;
            }
        }

        if indexes.is_empty() {
            return Err(StorageError::NotFound(format!(
                "key:{} has not any tags!",
                key
            )));
        }

        indexes.sort_by(|a, b| {
            b.last_modified
                .cmp(&a.last_modified)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(indexes
            .into_iter()
            .filter_map(|index| index.name.rsplit('/').next().map(str::to_string))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use anyhow::Result;
    use bytes::Bytes;

    use super::*;
    use crate::{index::DEFAULT_INDEX_NAMESPACE, testing::FaultyStore};

    async fn put_index(store: &FaultyStore, key: &str, tag: &str) -> Result<()> {
        store
            .put_bytes(
                &format!("{}/{}/{}", DEFAULT_INDEX_NAMESPACE, key, tag),
                Bytes::from_static(b"a.txt"),
            )
            .await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_list_keys() -> Result<()> {
        let store = Arc::new(FaultyStore::new());
        for key in ["demo", "dev", "prod"] {
            put_index(&store, key, "latest").await?;
        }
        store.put_bytes("sample/a.txt", Bytes::from_static(b"x")).await?;
        let catalog = CatalogBrowser::new(store, DEFAULT_INDEX_NAMESPACE, DEFAULT_PAGE_SIZE);

        assert_eq!(catalog.list_keys(None).await?, vec!["demo", "dev", "prod"]);
        assert_eq!(catalog.list_keys(Some("de")).await?, vec!["demo", "dev"]);
        assert!(catalog.list_keys(Some("qa")).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_list_keys_reads_every_page() -> Result<()> {
        let store = Arc::new(FaultyStore::new());
        for key in ["k1", "k2", "k3", "k4", "k5"] {
            put_index(&store, key, "v1").await?;
            put_index(&store, key, "v2").await?;
        }
        let catalog = CatalogBrowser::new(store, DEFAULT_INDEX_NAMESPACE, 2);

        assert_eq!(
            catalog.list_keys(None).await?,
            vec!["k1", "k2", "k3", "k4", "k5"]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_list_tags_most_recent_first() -> Result<()> {
        let store = Arc::new(FaultyStore::new());
        put_index(&store, "demo", "a").await?;
        tokio::time::sleep(Duration::from_millis(20)).await;
        put_index(&store, "demo", "b").await?;
        put_index(&store, "demo2", "c").await?;
        let catalog = CatalogBrowser::new(store, DEFAULT_INDEX_NAMESPACE, 1);

        assert_eq!(catalog.list_tags("demo").await?, vec!["b", "a"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_list_tags_of_unknown_key_is_not_found() {
        let catalog = CatalogBrowser::new(
            Arc::new(FaultyStore::new()),
            DEFAULT_INDEX_NAMESPACE,
            DEFAULT_PAGE_SIZE,
        );

        match catalog.list_tags("demo").await {
            Err(StorageError::NotFound(message)) => {
                assert_eq!(message, "key:demo has not any tags!")
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_list_failure_is_transport_error() {
        let catalog = CatalogBrowser::new(
            Arc::new(FaultyStore::new().fail_lists()),
            DEFAULT_INDEX_NAMESPACE,
            DEFAULT_PAGE_SIZE,
        );

        let err = catalog.list_keys(None).await.unwrap_err();
        assert!(matches!(err, StorageError::RemoteTransport { .. }));
        let err = catalog.list_tags("demo").await.unwrap_err();
        assert!(matches!(err, StorageError::RemoteTransport { .. }));
    }
}
