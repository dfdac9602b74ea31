//! Error types for blob store operations.

use std::fmt;

/// Result type for blob store operations.
pub type BlobResult<T> = Result<T, BlobError>;

/// Errors that can occur during blob store operations.
#[derive(Debug)]
pub enum BlobError {
    /// Blob not found under the requested name.
    NotFound { name: String },

    /// Invalid bucket URL or object name.
    InvalidUri { uri: String, reason: String },

    /// The backend rejected the credentials, or there were none.
    Unauthorized { source: anyhow::Error },

    /// I/O error during blob operation.
    IoError { source: std::io::Error },

    /// Network or server error (S3/GCS).
    NetworkError { source: anyhow::Error },

    /// Backend not supported.
    UnsupportedBackend { scheme: String },

    /// Generic error.
    Other { source: anyhow::Error },
}

impl BlobError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, BlobError::NotFound { .. })
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, BlobError::Unauthorized { .. })
    }
}

impl fmt::Display for BlobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlobError::NotFound { name } => write!(f, "Blob not found: {}", name),
            BlobError::InvalidUri { uri, reason } => {
                write!(f, "Invalid URI '{}': {}", uri, reason)
            }
            BlobError::Unauthorized { source } => write!(f, "Unauthorized: {}", source),
            BlobError::IoError { source } => write!(f, "I/O error: {}", source),
            BlobError::NetworkError { source } => write!(f, "Network error: {}", source),
            BlobError::UnsupportedBackend { scheme } => {
                write!(f, "Unsupported backend: {}", scheme)
            }
            BlobError::Other { source } => write!(f, "Blob store error: {}", source),
        }
    }
}

impl std::error::Error for BlobError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BlobError::IoError { source } => Some(source),
            BlobError::Unauthorized { source } => Some(source.as_ref()),
            BlobError::NetworkError { source } => Some(source.as_ref()),
            BlobError::Other { source } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for BlobError {
    fn from(err: std::io::Error) -> Self {
        // writers report remote failures as io errors wrapping the store error
        if err
            .get_ref()
            .is_some_and(|inner| inner.is::<object_store::Error>())
        {
            return match err.into_inner().map(|inner| inner.downcast::<object_store::Error>()) {
                Some(Ok(inner)) => BlobError::from(*inner),
                _ => BlobError::Other {
                    source: anyhow::anyhow!("unreadable object store error"),
                },
            };
        }
        BlobError::IoError { source: err }
    }
}

impl From<anyhow::Error> for BlobError {
    fn from(err: anyhow::Error) -> Self {
        BlobError::Other { source: err }
    }
}

impl From<object_store::Error> for BlobError {
    fn from(err: object_store::Error) -> Self {
        match err {
            object_store::Error::NotFound { ref path, .. } => BlobError::NotFound {
                name: path.clone(),
            },
            object_store::Error::Unauthenticated { .. }
            | object_store::Error::PermissionDenied { .. } => BlobError::Unauthorized {
                source: anyhow::Error::from(err),
            },
            object_store::Error::InvalidPath { .. } => BlobError::InvalidUri {
                uri: String::new(),
                reason: err.to_string(),
            },
            _ => BlobError::NetworkError {
                source: anyhow::Error::from(err),
            },
        }
    }
}

impl From<url::ParseError> for BlobError {
    fn from(err: url::ParseError) -> Self {
        BlobError::InvalidUri {
            uri: String::new(),
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_store_not_found_keeps_path() {
        let err = object_store::Error::NotFound {
            path: "skw_index/demo/v1".to_string(),
            source: "missing".into(),
        };
        match BlobError::from(err) {
            BlobError::NotFound { name } => assert_eq!(name, "skw_index/demo/v1"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_object_store_auth_errors_are_unauthorized() {
        let err = object_store::Error::Unauthenticated {
            path: "a".to_string(),
            source: "401".into(),
        };
        assert!(BlobError::from(err).is_unauthorized());

        let err = object_store::Error::PermissionDenied {
            path: "a".to_string(),
            source: "403".into(),
        };
        assert!(BlobError::from(err).is_unauthorized());
    }

    #[test]
    fn test_generic_errors_are_network_errors() {
        let err = object_store::Error::Generic {
            store: "GCS",
            source: "503 Service Unavailable".into(),
        };
        let err = BlobError::from(err);
        assert!(matches!(err, BlobError::NetworkError { .. }));
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn test_io_error_wrapping_store_error_keeps_its_kind() {
        let err = std::io::Error::from(object_store::Error::PermissionDenied {
            path: "a".to_string(),
            source: "403".into(),
        });
        assert!(BlobError::from(err).is_unauthorized());

        let err = std::io::Error::other("disk full");
        assert!(matches!(BlobError::from(err), BlobError::IoError { .. }));
    }
}
