//! Storage error types.
//!
//! Two layers of errors exist. [`BackendError`] is what a
//! [`StorageBackend`](crate::backend::StorageBackend) reports for a single
//! remote primitive. [`StorageError`] is what the façade hands back to its
//! callers: it records which operation failed and separates a failed
//! existence check from a bucket that is simply absent.
//!
//! # Usage
//!
//! ```
//! use ssostore_storage::error::StorageError;
//!
//! let err = StorageError::NoSuchBucket {
//!     bucket: "docs".to_owned(),
//! };
//! assert!(err.is_not_found());
//! ```

use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::context::Interrupted;

/// Boxed error produced by the underlying SDK.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Convenience result type for façade operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// The façade operation an error or event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Existence guard.
    BucketExists,
    /// Idempotent bucket creation.
    MakeBucket,
    /// Bucket listing.
    ListBuckets,
    /// Object listing.
    ListObjects,
    /// Open an object for reading.
    GetObject,
    /// Upload an in-memory payload.
    PutObject,
    /// Download an object to a local file.
    FGetObject,
    /// Upload a local file.
    FPutObject,
    /// Delete a bucket.
    RemoveBucket,
    /// Delete an object.
    RemoveObject,
}

impl Operation {
    /// Stable snake_case name used in logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BucketExists => "bucket_exists",
            Self::MakeBucket => "make_bucket",
            Self::ListBuckets => "list_buckets",
            Self::ListObjects => "list_objects",
            Self::GetObject => "get_object",
            Self::PutObject => "put_object",
            Self::FGetObject => "fget_object",
            Self::FPutObject => "fput_object",
            Self::RemoveBucket => "remove_bucket",
            Self::RemoveObject => "remove_object",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a single remote primitive.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The remote store reports that the bucket does not exist.
    #[error("the specified bucket does not exist")]
    NoSuchBucket,

    /// The remote store reports that the key does not exist.
    #[error("the specified key does not exist")]
    NoSuchKey,

    /// The bucket still holds objects.
    #[error("the bucket is not empty")]
    BucketNotEmpty,

    /// Reading or writing a local file failed.
    #[error("local file {}: {source}", path.display())]
    Io {
        /// The local path involved.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Transport or service error from the SDK.
    #[error(transparent)]
    Sdk(BoxError),
}

impl BackendError {
    /// Wrap an SDK error.
    pub fn sdk(err: impl Into<BoxError>) -> Self {
        Self::Sdk(err.into())
    }

    /// Wrap a local I/O error.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Error returned by [`GuardedStorage`](crate::GuardedStorage) operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The client configuration is unusable.
    #[error("invalid storage configuration: {0}")]
    Config(String),

    /// The bucket name breaks the naming rules; nothing was sent.
    #[error("invalid bucket name {name:?}: {reason}")]
    InvalidBucketName {
        /// The rejected name.
        name: String,
        /// Which rule was broken.
        reason: String,
    },

    /// The object name breaks the naming rules; nothing was sent.
    #[error("invalid object name {key:?}: {reason}")]
    InvalidObjectName {
        /// The rejected key.
        key: String,
        /// Which rule was broken.
        reason: String,
    },

    /// The existence query itself failed.
    #[error("failed to check whether bucket {bucket} exists: {source}")]
    ExistenceCheck {
        /// The bucket being checked.
        bucket: String,
        /// The underlying failure.
        #[source]
        source: BackendError,
    },

    /// The guard failed: the bucket does not exist.
    #[error("bucket {bucket} does not exist")]
    NoSuchBucket {
        /// The missing bucket.
        bucket: String,
    },

    /// The object does not exist.
    #[error("object {key} does not exist in bucket {bucket}")]
    NoSuchKey {
        /// The bucket that was searched.
        bucket: String,
        /// The missing key.
        key: String,
    },

    /// The bucket cannot be removed while it holds objects.
    #[error("bucket {bucket} is not empty")]
    BucketNotEmpty {
        /// The bucket that still holds objects.
        bucket: String,
    },

    /// The guarded action failed after the guard passed.
    #[error("{operation} failed: {source}")]
    Remote {
        /// The operation that failed.
        operation: Operation,
        /// The underlying failure.
        #[source]
        source: BackendError,
    },

    /// The call context was cancelled.
    #[error("{operation} was cancelled")]
    Cancelled {
        /// The interrupted operation.
        operation: Operation,
    },

    /// The call context deadline elapsed.
    #[error("{operation} exceeded its deadline")]
    DeadlineExceeded {
        /// The interrupted operation.
        operation: Operation,
    },
}

impl StorageError {
    /// Whether the error means the bucket or object is absent.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NoSuchBucket { .. } | Self::NoSuchKey { .. })
    }

    /// Whether the error came from the call context rather than the store.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        matches!(
            self,
            Self::Cancelled { .. } | Self::DeadlineExceeded { .. }
        )
    }

    /// Classify a backend failure of a guarded action.
    pub(crate) fn from_backend(
        operation: Operation,
        bucket: &str,
        key: Option<&str>,
        err: BackendError,
    ) -> Self {
        match (err, key) {
            (BackendError::NoSuchBucket, _) => Self::NoSuchBucket {
                bucket: bucket.to_owned(),
            },
            (BackendError::NoSuchKey, Some(key)) => Self::NoSuchKey {
                bucket: bucket.to_owned(),
                key: key.to_owned(),
            },
            (BackendError::BucketNotEmpty, _) => Self::BucketNotEmpty {
                bucket: bucket.to_owned(),
            },
            (source, _) => Self::Remote { operation, source },
        }
    }

    /// Build the error reported when `operation` is interrupted by its context.
    #[must_use]
    pub fn interrupted(operation: Operation, reason: Interrupted) -> Self {
        match reason {
            Interrupted::Cancelled => Self::Cancelled { operation },
            Interrupted::DeadlineExceeded => Self::DeadlineExceeded { operation },
        }
    }
}
