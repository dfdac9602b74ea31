//! Blob store abstraction for skywarehouse.
//!
//! The [`BlobStore`] trait is the only thing the transfer engine knows about
//! remote storage. [`ObjectStoreBlobStore`] implements it on top of the
//! `object_store` crate and supports:
//!
//! - Google Cloud Storage (`gs://bucket[/base]`)
//! - Amazon S3 and compatible stores (`s3://bucket[/base]`)
//! - Local filesystem (`file:///path`)
//! - In-process memory (`memory://`)
//!
//! # Usage
//!
//! ```rust,no_run
//! use blob_store::{BlobStorageConfig, BlobStore, ListRequest, ObjectStoreBlobStore};
//! use bytes::Bytes;
//!
//! # async fn example() -> Result<(), blob_store::BlobError> {
//! let config = BlobStorageConfig::new("gs://my-bucket");
//! let store = ObjectStoreBlobStore::from_config(&config)?;
//!
//! store.put_bytes("sample/a.txt", Bytes::from_static(b"hello")).await?;
//! let data = store.read_bytes("sample/a.txt").await?;
//! let page = store.list(ListRequest::new("sample/", 100)).await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod metadata;
mod object;
mod traits;

pub use config::{BlobStorageConfig, SUPPORTED_SCHEMES};
pub use error::{BlobError, BlobResult};
pub use metadata::{BlobMetadata, ListPage, ListRequest};
pub use object::ObjectStoreBlobStore;
pub use traits::{BlobStore, ByteStream};
