//! The guarded storage façade.
//!
//! [`GuardedStorage`] runs every operation behind a bucket-existence check,
//! under the caller's [`CallContext`], and reports the outcome through a
//! single observation point.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use ssostore_core::StorageConfig;
use tracing::{debug, warn};

use crate::backend::{BackendObjectStream, DEFAULT_PART_SIZE, MIN_PART_SIZE, StorageBackend};
use crate::context::{CallContext, ObjectReader};
use crate::error::{BackendError, Operation, StorageError, StorageResult};
use crate::s3::S3Backend;
use crate::types::{BucketCreated, BucketInfo, ObjectInfo, UploadInfo};
use crate::validation::{validate_bucket_name, validate_object_name};

/// Lazily paged object listing.
///
/// Pages are pulled from the store only as the stream is polled, and every
/// pull is raced against the context the listing was opened with.
pub type ObjectStream = BoxStream<'static, StorageResult<ObjectInfo>>;

/// Object storage with bucket-existence guards.
///
/// Every operation except [`make_bucket`](Self::make_bucket) fails with
/// [`StorageError::NoSuchBucket`] when the bucket is absent. Clones share
/// the same backend.
///
/// # Examples
///
/// ```
/// use ssostore_storage::{CallContext, GuardedStorage, MemoryBackend};
///
/// # tokio_test::block_on(async {
/// let storage = GuardedStorage::new(MemoryBackend::new());
/// let ctx = CallContext::new();
///
/// let created = storage.make_bucket(&ctx, "docs").await.unwrap();
/// assert!(created.created);
/// storage.put_object(&ctx, "docs", "a.txt", "hello").await.unwrap();
///
/// let body = storage.get_object(&ctx, "docs", "a.txt").await.unwrap();
/// assert_eq!(body.read_to_vec().await.unwrap(), b"hello");
/// # });
/// ```
#[derive(Debug)]
pub struct GuardedStorage<B = S3Backend> {
    backend: Arc<B>,
    part_size: usize,
}

impl<B> Clone for GuardedStorage<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            part_size: self.part_size,
        }
    }
}

impl GuardedStorage<S3Backend> {
    /// Build a façade over an S3-compatible endpoint.
    ///
    /// The configuration is validated but the endpoint is not contacted.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Config`] when the endpoint or credentials are
    /// unusable.
    pub fn connect(config: &StorageConfig) -> StorageResult<Self> {
        Ok(Self::new(S3Backend::from_config(config)?))
    }
}

impl<B: StorageBackend> GuardedStorage<B> {
    /// Wrap an existing backend.
    pub fn new(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
            part_size: DEFAULT_PART_SIZE,
        }
    }

    /// Override the size above which uploads go multipart.
    ///
    /// Values below [`MIN_PART_SIZE`] are raised to it.
    #[must_use]
    pub fn with_part_size(mut self, part_size: usize) -> Self {
        self.part_size = part_size.max(MIN_PART_SIZE);
        self
    }

    /// Size above which uploads go multipart.
    #[must_use]
    pub fn part_size(&self) -> usize {
        self.part_size
    }

    /// The underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Create `bucket` unless it already exists.
    ///
    /// # Errors
    ///
    /// Fails on an invalid name, a failed existence check, an interrupted
    /// context or a rejected create.
    pub async fn make_bucket(&self, ctx: &CallContext, bucket: &str) -> StorageResult<BucketCreated> {
        const OP: Operation = Operation::MakeBucket;
        let result = async {
            if self.bucket_exists(ctx, OP, bucket).await? {
                return Ok(BucketCreated::new(bucket, false));
            }
            self.call(ctx, OP, bucket, None, self.backend.make_bucket(bucket))
                .await?;
            Ok::<_, StorageError>(BucketCreated::new(bucket, true))
        }
        .await;
        observe(OP, Some(bucket), None, result)
    }

    /// List every bucket, sorted by name.
    ///
    /// # Errors
    ///
    /// Fails on an interrupted context or a remote failure.
    pub async fn list_buckets(&self, ctx: &CallContext) -> StorageResult<Vec<BucketInfo>> {
        const OP: Operation = Operation::ListBuckets;
        let result = match ctx.run(self.backend.list_buckets()).await {
            Err(reason) => Err(StorageError::interrupted(OP, reason)),
            Ok(Err(source)) => Err(StorageError::Remote {
                operation: OP,
                source,
            }),
            Ok(Ok(mut buckets)) => {
                buckets.sort_by(|a, b| a.name.cmp(&b.name));
                Ok(buckets)
            }
        };
        observe(OP, None, None, result)
    }

    /// Open a lazy listing of every object version in `bucket`.
    ///
    /// # Errors
    ///
    /// Fails when the guard fails. Errors met while paging are yielded by
    /// the stream, after which it ends.
    pub async fn list_objects(&self, ctx: &CallContext, bucket: &str) -> StorageResult<ObjectStream> {
        const OP: Operation = Operation::ListObjects;
        let result = self
            .ensure_bucket(ctx, OP, bucket)
            .await
            .map(|()| guarded_listing(ctx.clone(), bucket, self.backend.list_objects(bucket)));
        observe(OP, Some(bucket), None, result)
    }

    /// Open `key` for reading.
    ///
    /// The returned reader keeps honouring `ctx`.
    ///
    /// # Errors
    ///
    /// Fails when the guard fails, the key is missing, or the context is
    /// interrupted.
    pub async fn get_object(
        &self,
        ctx: &CallContext,
        bucket: &str,
        key: &str,
    ) -> StorageResult<ObjectReader> {
        const OP: Operation = Operation::GetObject;
        let result = async {
            validate_object_name(key)?;
            self.ensure_bucket(ctx, OP, bucket).await?;
            let body = self
                .call(ctx, OP, bucket, Some(key), self.backend.get_object(bucket, key))
                .await?;
            Ok::<_, StorageError>(ObjectReader::new(body, ctx))
        }
        .await;
        observe(OP, Some(bucket), Some(key), result)
    }

    /// Upload `data` as `key`. Payloads above the part size go multipart.
    ///
    /// # Errors
    ///
    /// Fails when the guard fails, the upload is rejected, or the context is
    /// interrupted.
    pub async fn put_object(
        &self,
        ctx: &CallContext,
        bucket: &str,
        key: &str,
        data: impl Into<Bytes>,
    ) -> StorageResult<UploadInfo> {
        const OP: Operation = Operation::PutObject;
        let data = data.into();
        let result = async {
            validate_object_name(key)?;
            self.ensure_bucket(ctx, OP, bucket).await?;
            self.call(
                ctx,
                OP,
                bucket,
                Some(key),
                self.backend.put_object(bucket, key, data, self.part_size),
            )
            .await
        }
        .await;
        observe(OP, Some(bucket), Some(key), result)
    }

    /// Download `key` into the file at `path`.
    ///
    /// The body lands in a partial file next to `path` first and is renamed
    /// into place once complete. An interrupted download removes only the
    /// partial file it created.
    ///
    /// # Errors
    ///
    /// Fails when the guard fails, the key is missing, a local write fails,
    /// or the context is interrupted.
    pub async fn fget_object(
        &self,
        ctx: &CallContext,
        bucket: &str,
        key: &str,
        path: impl AsRef<Path>,
    ) -> StorageResult<()> {
        const OP: Operation = Operation::FGetObject;
        let path = path.as_ref();
        let result = async {
            validate_object_name(key)?;
            self.ensure_bucket(ctx, OP, bucket).await?;
            self.call(ctx, OP, bucket, Some(key), self.backend.fget_object(bucket, key, path))
                .await
        }
        .await;
        observe(OP, Some(bucket), Some(key), result)
    }

    /// Upload the file at `path` as `key`.
    ///
    /// # Errors
    ///
    /// Fails when the guard fails, the file cannot be read, the upload is
    /// rejected, or the context is interrupted.
    pub async fn fput_object(
        &self,
        ctx: &CallContext,
        bucket: &str,
        key: &str,
        path: impl AsRef<Path>,
    ) -> StorageResult<UploadInfo> {
        const OP: Operation = Operation::FPutObject;
        let path = path.as_ref();
        let result = async {
            validate_object_name(key)?;
            self.ensure_bucket(ctx, OP, bucket).await?;
            self.call(
                ctx,
                OP,
                bucket,
                Some(key),
                self.backend.fput_object(bucket, key, path, self.part_size),
            )
            .await
        }
        .await;
        observe(OP, Some(bucket), Some(key), result)
    }

    /// Delete `bucket`. It must be empty.
    ///
    /// # Errors
    ///
    /// Fails when the guard fails, the bucket still holds objects, or the
    /// context is interrupted.
    pub async fn remove_bucket(&self, ctx: &CallContext, bucket: &str) -> StorageResult<()> {
        const OP: Operation = Operation::RemoveBucket;
        let result = async {
            self.ensure_bucket(ctx, OP, bucket).await?;
            self.call(ctx, OP, bucket, None, self.backend.remove_bucket(bucket))
                .await
        }
        .await;
        observe(OP, Some(bucket), None, result)
    }

    /// Delete `key` from `bucket`, all versions included.
    ///
    /// # Errors
    ///
    /// Fails when the guard fails, the delete is rejected, or the context is
    /// interrupted.
    pub async fn remove_object(&self, ctx: &CallContext, bucket: &str, key: &str) -> StorageResult<()> {
        const OP: Operation = Operation::RemoveObject;
        let result = async {
            validate_object_name(key)?;
            self.ensure_bucket(ctx, OP, bucket).await?;
            self.call(ctx, OP, bucket, Some(key), self.backend.remove_object(bucket, key))
                .await
        }
        .await;
        observe(OP, Some(bucket), Some(key), result)
    }

    /// Validate `bucket` and ask the store whether it exists.
    async fn bucket_exists(
        &self,
        ctx: &CallContext,
        operation: Operation,
        bucket: &str,
    ) -> StorageResult<bool> {
        validate_bucket_name(bucket)?;
        ctx.run(self.backend.bucket_exists(bucket))
            .await
            .map_err(|reason| StorageError::interrupted(operation, reason))?
            .map_err(|source| StorageError::ExistenceCheck {
                bucket: bucket.to_owned(),
                source,
            })
    }

    async fn ensure_bucket(
        &self,
        ctx: &CallContext,
        operation: Operation,
        bucket: &str,
    ) -> StorageResult<()> {
        if self.bucket_exists(ctx, operation, bucket).await? {
            Ok(())
        } else {
            Err(StorageError::NoSuchBucket {
                bucket: bucket.to_owned(),
            })
        }
    }

    /// Run one guarded backend call under `ctx` and classify its failure.
    async fn call<T, F>(
        &self,
        ctx: &CallContext,
        operation: Operation,
        bucket: &str,
        key: Option<&str>,
        fut: F,
    ) -> StorageResult<T>
    where
        F: Future<Output = Result<T, BackendError>>,
    {
        ctx.run(fut)
            .await
            .map_err(|reason| StorageError::interrupted(operation, reason))?
            .map_err(|err| StorageError::from_backend(operation, bucket, key, err))
    }
}

/// Race every page pull of `inner` against `ctx`. The stream ends after the
/// first error.
fn guarded_listing(ctx: CallContext, bucket: &str, inner: BackendObjectStream) -> ObjectStream {
    let bucket = bucket.to_owned();
    futures::stream::unfold(Some(inner), move |state| {
        let ctx = ctx.clone();
        let bucket = bucket.clone();
        async move {
            let Some(mut inner) = state else {
                return None;
            };
            let item = match ctx.run(inner.next()).await {
                Ok(None) => return None,
                Ok(Some(Ok(info))) => return Some((Ok(info), Some(inner))),
                Ok(Some(Err(err))) => {
                    StorageError::from_backend(Operation::ListObjects, &bucket, None, err)
                }
                Err(reason) => StorageError::interrupted(Operation::ListObjects, reason),
            };
            warn!(operation = %Operation::ListObjects, bucket = %bucket, error = %item, "listing stopped");
            Some((Err(item), None))
        }
    })
    .boxed()
}

/// Report the outcome of one façade operation.
fn observe<T>(
    operation: Operation,
    bucket: Option<&str>,
    key: Option<&str>,
    result: StorageResult<T>,
) -> StorageResult<T> {
    match &result {
        Ok(_) => debug!(operation = %operation, bucket, key, "storage operation succeeded"),
        Err(err) => warn!(operation = %operation, bucket, key, error = %err, "storage operation failed"),
    }
    result
}
