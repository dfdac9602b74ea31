//! Blob storage configuration.

use serde::{Deserialize, Serialize};

use crate::{BlobError, BlobResult};

/// Schemes accepted for the bucket URL.
pub const SUPPORTED_SCHEMES: &[&str] = &["gs", "s3", "file", "memory"];

/// Configuration for blob storage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlobStorageConfig {
    /// Bucket URL (e.g., `gs://bucket`, `s3://bucket/prefix`, `file:///path`).
    #[serde(default)]
    pub path: Option<String>,
}

impl BlobStorageConfig {
    pub fn new(path: &str) -> Self {
        BlobStorageConfig {
            path: Some(path.to_string()),
        }
    }

    /// Returns the configured bucket URL after checking its scheme.
    pub fn bucket_url(&self) -> BlobResult<&str> {
        let path = self.path.as_deref().ok_or_else(|| BlobError::InvalidUri {
            uri: String::new(),
            reason: "bucket is not configured".to_string(),
        })?;
        let (scheme, rest) = path.split_once("://").ok_or_else(|| BlobError::InvalidUri {
            uri: path.to_string(),
            reason: "missing scheme (expected format: gs://bucket)".to_string(),
        })?;
        if !SUPPORTED_SCHEMES.contains(&scheme) {
            return Err(BlobError::UnsupportedBackend {
                scheme: scheme.to_string(),
            });
        }
        if scheme != "memory" && rest.trim_matches('/').is_empty() {
            return Err(BlobError::InvalidUri {
                uri: path.to_string(),
                reason: "bucket name is empty".to_string(),
            });
        }
        Ok(path)
    }
}
