use std::path::PathBuf;

use blob_store::BlobError;

/// Shown whenever the backend rejects our credentials.
pub const CREDENTIALS_HINT: &str = "For gs:// buckets set a service account key path \
     to GOOGLE_APPLICATION_CREDENTIALS or run `gcloud auth application-default login` \
     (https://cloud.google.com/sdk/gcloud/reference/auth/application-default/login). \
     For s3:// buckets set AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY \
     (plus AWS_SESSION_TOKEN for temporary credentials) and AWS_DEFAULT_REGION.";

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Must need authorization to access the bucket. {hint} error: {source}")]
    Authorization {
        hint: &'static str,
        source: BlobError,
    },

    #[error("Remote storage failure. error: {source}")]
    RemoteTransport { source: BlobError },

    #[error("Local I/O failure on {}. error: {}", path.display(), source)]
    LocalIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Index {name} is corrupted. error: {source}")]
    InvalidIndex {
        name: String,
        source: std::string::FromUtf8Error,
    },

    #[error("Transfer task did not complete. error: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl StorageError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn local_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::LocalIo {
            path: path.into(),
            source,
        }
    }

    /// Errors caused by the caller's input rather than by a failing system.
    pub fn is_user_error(&self) -> bool {
        matches!(self, Self::InvalidArgument(_) | Self::NotFound(_))
    }
}

impl From<BlobError> for StorageError {
    fn from(err: BlobError) -> Self {
        match err {
            BlobError::Unauthorized { .. } => StorageError::Authorization {
                hint: CREDENTIALS_HINT,
                source: err,
            },
            BlobError::InvalidUri { .. } | BlobError::UnsupportedBackend { .. } => {
                StorageError::InvalidArgument(err.to_string())
            }
            _ => StorageError::RemoteTransport { source: err },
        }
    }
}
