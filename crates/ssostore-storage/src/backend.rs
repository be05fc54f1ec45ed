//! The remote-store seam.
//!
//! [`StorageBackend`] has one method per remote primitive and no policy of its
//! own: no guards, no logging, no cancellation. The façade layers those on
//! top. [`S3Backend`](crate::s3::S3Backend) talks to a real endpoint and
//! [`MemoryBackend`](crate::memory::MemoryBackend) keeps everything in process.

use std::path::Path;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use tokio::io::AsyncRead;

use crate::error::BackendError;
use crate::types::{BucketInfo, ObjectInfo, UploadInfo};

/// Part size used for uploads: payloads above it go multipart.
pub const DEFAULT_PART_SIZE: usize = 5 * 1024 * 1024;

/// Smallest part size S3 accepts for every part but the last.
pub const MIN_PART_SIZE: usize = 5 * 1024 * 1024;

/// Object body as produced by a backend.
pub type BackendReader = Pin<Box<dyn AsyncRead + Send>>;

/// Lazily paged listing as produced by a backend.
pub type BackendObjectStream = BoxStream<'static, Result<ObjectInfo, BackendError>>;

/// Remote object-store primitives.
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// Whether the bucket exists. A missing bucket is `Ok(false)`.
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, BackendError>;

    /// Create a bucket.
    async fn make_bucket(&self, bucket: &str) -> Result<(), BackendError>;

    /// List every bucket visible to the credentials.
    async fn list_buckets(&self) -> Result<Vec<BucketInfo>, BackendError>;

    /// List object versions. Pages are fetched only as the stream is polled.
    fn list_objects(&self, bucket: &str) -> BackendObjectStream;

    /// Open an object for reading.
    async fn get_object(&self, bucket: &str, key: &str) -> Result<BackendReader, BackendError>;

    /// Upload an in-memory payload.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        part_size: usize,
    ) -> Result<UploadInfo, BackendError>;

    /// Download an object into `path`.
    ///
    /// The body is written to a partial file next to `path` first and renamed
    /// into place once complete.
    async fn fget_object(&self, bucket: &str, key: &str, path: &Path) -> Result<(), BackendError>;

    /// Upload the file at `path`.
    async fn fput_object(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        part_size: usize,
    ) -> Result<UploadInfo, BackendError>;

    /// Delete an empty bucket.
    async fn remove_bucket(&self, bucket: &str) -> Result<(), BackendError>;

    /// Delete an object, including all of its versions where supported.
    async fn remove_object(&self, bucket: &str, key: &str) -> Result<(), BackendError>;
}

/// Suffix of the temporary file a download is written to.
pub const PARTIAL_SUFFIX: &str = ".part";

/// Write `reader` to `path` through a uniquely named partial file.
///
/// The partial file lives next to `path` as `<name>.<random>.part` and is
/// renamed into place once the copy completes. It is deleted when the copy
/// fails or the future is dropped, so files the caller already owns are
/// never touched.
pub(crate) async fn write_via_partial<R>(reader: &mut R, path: &Path) -> Result<(), BackendError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let parent = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| BackendError::io(parent, e))?;
            parent
        }
        None => Path::new("."),
    };

    let mut prefix = path.file_name().unwrap_or_default().to_owned();
    prefix.push(".");
    let (file, tmp) = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(PARTIAL_SUFFIX)
        .tempfile_in(parent)
        .map_err(|e| BackendError::io(parent, e))?
        .into_parts();

    let mut file = tokio::fs::File::from_std(file);
    let copied = async {
        tokio::io::copy(reader, &mut file).await?;
        file.sync_all().await
    }
    .await;
    // `tmp` removes the partial file on every early return and on drop.
    copied.map_err(|e| BackendError::io(tmp.to_path_buf(), e))?;
    drop(file);

    tmp.persist(path).map_err(|e| BackendError::io(path, e.error))
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    async fn dir_entries(dir: &Path) -> Vec<String> {
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(dir).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_should_write_through_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("a.txt");
        let mut body = std::io::Cursor::new(b"hello".to_vec());

        write_via_partial(&mut body, &path).await.unwrap();

        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"hello");
        assert_eq!(dir_entries(&dir.path().join("nested")).await, ["a.txt"]);
    }

    #[tokio::test]
    async fn test_should_remove_own_partial_file_on_failed_copy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        let mut body = tokio_test::io::Builder::new()
            .read(b"hel")
            .read_error(io::Error::other("connection reset"))
            .build();

        let err = write_via_partial(&mut body, &path).await.unwrap_err();

        assert!(matches!(err, BackendError::Io { .. }), "{err}");
        assert!(dir_entries(dir.path()).await.is_empty());
    }

    #[tokio::test]
    async fn test_should_leave_existing_part_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        let foreign = dir.path().join("report.pdf.part");
        tokio::fs::write(&foreign, b"not ours").await.unwrap();
        let mut body = std::io::Cursor::new(b"pdf".to_vec());

        write_via_partial(&mut body, &path).await.unwrap();

        assert_eq!(tokio::fs::read(&foreign).await.unwrap(), b"not ours");
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"pdf");
    }
}
