//! Blob metadata structures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata about a blob.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlobMetadata {
    /// Object name relative to the bucket base path.
    pub name: String,

    /// Size in bytes.
    pub size_bytes: u64,

    /// ETag from object store (S3/GCS).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,

    /// Last update time, when the backend reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
}

impl BlobMetadata {
    /// Create metadata with just name and size.
    pub fn with_size(name: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            name: name.into(),
            size_bytes,
            etag: None,
            last_modified: None,
        }
    }
}

/// Parameters of one page of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRequest {
    /// Plain string prefix; it does not have to end on a `/` boundary.
    pub prefix: String,

    /// When set, names are grouped on the next `/` after the prefix and only
    /// the groups are returned, like a directory listing.
    pub delimited: bool,

    /// Maximum number of entries (objects plus groups) in the page.
    pub page_size: usize,

    /// Token returned by the previous page.
    pub page_token: Option<String>,
}

impl ListRequest {
    pub fn new(prefix: impl Into<String>, page_size: usize) -> Self {
        Self {
            prefix: prefix.into(),
            delimited: false,
            page_size,
            page_token: None,
        }
    }

    pub fn delimited(mut self) -> Self {
        self.delimited = true;
        self
    }

    pub fn with_page_token(mut self, page_token: Option<String>) -> Self {
        self.page_token = page_token;
        self
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub objects: Vec<BlobMetadata>,

    /// Groups for delimited listings, without the trailing `/`.
    pub common_prefixes: Vec<String>,

    /// Present when more entries are available.
    pub next_page_token: Option<String>,
}
