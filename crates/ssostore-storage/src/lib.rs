//! Guarded object storage for ssostore.
//!
//! [`GuardedStorage`] is the entry point. It wraps a [`StorageBackend`] and
//! runs every operation behind a bucket-existence check, under a
//! caller-supplied [`CallContext`] that carries cancellation and a deadline.
//! [`S3Backend`] talks to MinIO or any other S3-compatible endpoint;
//! [`MemoryBackend`] keeps everything in process.

pub mod backend;
pub mod context;
pub mod error;
pub mod facade;
pub mod memory;
pub mod s3;
pub mod types;
pub mod validation;

pub use backend::{DEFAULT_PART_SIZE, MIN_PART_SIZE, PARTIAL_SUFFIX, StorageBackend};
pub use context::{CallContext, Interrupted, ObjectReader};
pub use error::{BackendError, Operation, StorageError, StorageResult};
pub use facade::{GuardedStorage, ObjectStream};
pub use memory::MemoryBackend;
pub use s3::S3Backend;
pub use types::{BucketCreated, BucketInfo, ObjectInfo, UploadInfo};
