//! In-process backend.
//!
//! Keeps buckets and objects in a map guarded by a `parking_lot` lock. It
//! follows S3 semantics closely enough to stand in for a real endpoint in
//! tests and local development: deleting a non-empty bucket fails and so
//! does reading a missing key. Every primitive call is counted, and an
//! artificial latency can be injected to exercise cancellation.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use md5::{Digest, Md5};
use parking_lot::{Mutex, RwLock};

use crate::backend::{BackendObjectStream, BackendReader, StorageBackend, write_via_partial};
use crate::error::{BackendError, Operation};
use crate::types::{BucketInfo, ObjectInfo, UploadInfo};

#[derive(Debug)]
struct StoredObject {
    data: Bytes,
    etag: String,
    last_modified: DateTime<Utc>,
}

#[derive(Debug)]
struct StoredBucket {
    created_at: DateTime<Utc>,
    objects: BTreeMap<String, StoredObject>,
}

/// Backend that keeps all state in memory.
///
/// # Examples
///
/// ```
/// use ssostore_storage::memory::MemoryBackend;
/// use ssostore_storage::error::Operation;
///
/// let backend = MemoryBackend::new().with_bucket("docs");
/// assert_eq!(backend.calls(Operation::MakeBucket), 0);
/// ```
#[derive(Debug, Default)]
pub struct MemoryBackend {
    buckets: RwLock<BTreeMap<String, StoredBucket>>,
    calls: Mutex<HashMap<Operation, usize>>,
    latency: Option<Duration>,
}

impl MemoryBackend {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every primitive by `latency` before it touches state.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Seed an empty bucket without counting a call.
    #[must_use]
    pub fn with_bucket(self, name: &str) -> Self {
        self.buckets.write().insert(
            name.to_owned(),
            StoredBucket {
                created_at: Utc::now(),
                objects: BTreeMap::new(),
            },
        );
        self
    }

    /// How many times the primitive behind `operation` was invoked.
    #[must_use]
    pub fn calls(&self, operation: Operation) -> usize {
        self.calls.lock().get(&operation).copied().unwrap_or(0)
    }

    /// Total number of primitive invocations.
    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.calls.lock().values().sum()
    }

    async fn enter(&self, operation: Operation) {
        *self.calls.lock().entry(operation).or_default() += 1;
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn store(&self, bucket: &str, key: &str, data: Bytes) -> Result<UploadInfo, BackendError> {
        let mut buckets = self.buckets.write();
        let entry = buckets.get_mut(bucket).ok_or(BackendError::NoSuchBucket)?;

        let size = data.len() as u64;
        let etag = content_etag(&data);
        entry.objects.insert(
            key.to_owned(),
            StoredObject {
                data,
                etag: etag.clone(),
                last_modified: Utc::now(),
            },
        );

        Ok(UploadInfo {
            bucket: bucket.to_owned(),
            key: key.to_owned(),
            etag: Some(etag),
            size,
            version_id: None,
        })
    }

    fn load(&self, bucket: &str, key: &str) -> Result<Bytes, BackendError> {
        let buckets = self.buckets.read();
        let entry = buckets.get(bucket).ok_or(BackendError::NoSuchBucket)?;
        entry
            .objects
            .get(key)
            .map(|o| o.data.clone())
            .ok_or(BackendError::NoSuchKey)
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, BackendError> {
        self.enter(Operation::BucketExists).await;
        Ok(self.buckets.read().contains_key(bucket))
    }

    async fn make_bucket(&self, bucket: &str) -> Result<(), BackendError> {
        self.enter(Operation::MakeBucket).await;
        self.buckets
            .write()
            .entry(bucket.to_owned())
            .or_insert_with(|| StoredBucket {
                created_at: Utc::now(),
                objects: BTreeMap::new(),
            });
        Ok(())
    }

    async fn list_buckets(&self) -> Result<Vec<BucketInfo>, BackendError> {
        self.enter(Operation::ListBuckets).await;
        Ok(self
            .buckets
            .read()
            .iter()
            .map(|(name, b)| BucketInfo {
                name: name.clone(),
                created_at: Some(b.created_at),
            })
            .collect())
    }

    fn list_objects(&self, bucket: &str) -> BackendObjectStream {
        *self.calls.lock().entry(Operation::ListObjects).or_default() += 1;

        // Snapshot at call time; the stream itself holds no lock.
        let snapshot: Result<Vec<ObjectInfo>, BackendError> = self
            .buckets
            .read()
            .get(bucket)
            .map(|b| {
                b.objects
                    .iter()
                    .map(|(key, o)| ObjectInfo {
                        key: key.clone(),
                        version_id: None,
                        is_latest: true,
                        is_delete_marker: false,
                        size: o.data.len() as u64,
                        etag: Some(o.etag.clone()),
                        last_modified: Some(o.last_modified),
                        storage_class: Some("STANDARD".to_owned()),
                    })
                    .collect()
            })
            .ok_or(BackendError::NoSuchBucket);

        let latency = self.latency;
        futures::stream::once(async move {
            if let Some(latency) = latency {
                tokio::time::sleep(latency).await;
            }
            snapshot
        })
        .flat_map(|page| match page {
            Ok(items) => futures::stream::iter(items.into_iter().map(Ok)).boxed(),
            Err(err) => futures::stream::iter([Err(err)]).boxed(),
        })
        .boxed()
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<BackendReader, BackendError> {
        self.enter(Operation::GetObject).await;
        let reader: BackendReader = Box::pin(std::io::Cursor::new(self.load(bucket, key)?));
        Ok(reader)
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        _part_size: usize,
    ) -> Result<UploadInfo, BackendError> {
        self.enter(Operation::PutObject).await;
        self.store(bucket, key, data)
    }

    async fn fget_object(&self, bucket: &str, key: &str, path: &Path) -> Result<(), BackendError> {
        self.enter(Operation::FGetObject).await;
        let mut body = std::io::Cursor::new(self.load(bucket, key)?);
        write_via_partial(&mut body, path).await
    }

    async fn fput_object(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        _part_size: usize,
    ) -> Result<UploadInfo, BackendError> {
        self.enter(Operation::FPutObject).await;
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| BackendError::io(path, e))?;
        self.store(bucket, key, Bytes::from(data))
    }

    async fn remove_bucket(&self, bucket: &str) -> Result<(), BackendError> {
        self.enter(Operation::RemoveBucket).await;
        let mut buckets = self.buckets.write();
        match buckets.get(bucket) {
            None => Err(BackendError::NoSuchBucket),
            Some(b) if !b.objects.is_empty() => Err(BackendError::BucketNotEmpty),
            Some(_) => {
                buckets.remove(bucket);
                Ok(())
            }
        }
    }

    async fn remove_object(&self, bucket: &str, key: &str) -> Result<(), BackendError> {
        self.enter(Operation::RemoveObject).await;
        let mut buckets = self.buckets.write();
        let entry = buckets.get_mut(bucket).ok_or(BackendError::NoSuchBucket)?;
        entry.objects.remove(key);
        Ok(())
    }
}

/// Entity tag as S3 computes it for single-part uploads: the hex MD5 digest.
fn content_etag(data: &[u8]) -> String {
    hex::encode(Md5::digest(data))
}
