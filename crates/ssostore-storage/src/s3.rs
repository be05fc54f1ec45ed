//! S3-compatible backend built on `aws-sdk-s3`.
//!
//! Talks to MinIO or any other S3 endpoint with static credentials and
//! path-style addressing. Uploads above the part size go through the
//! multipart API; listings page through `ListObjectVersions`.

use std::collections::VecDeque;
use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{
    BehaviorVersion, Credentials, Region, RequestChecksumCalculation,
};
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::operation::head_bucket::HeadBucketError;
use aws_sdk_s3::primitives::{ByteStream, DateTime as SmithyDateTime, Length};
use aws_sdk_s3::types::{
    BucketLocationConstraint, CompletedMultipartUpload, CompletedPart, CreateBucketConfiguration,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use ssostore_core::StorageConfig;

use crate::backend::{BackendObjectStream, BackendReader, StorageBackend, write_via_partial};
use crate::error::{BackendError, StorageError};
use crate::types::{BucketInfo, ObjectInfo, UploadInfo, trim_etag};

/// Header that makes MinIO delete every version of an object at once.
const FORCE_DELETE_HEADER: &str = "x-minio-force-delete";

/// Provider name attached to the static credentials.
const CREDENTIALS_PROVIDER: &str = "ssostore-static";

/// Backend that talks to a remote S3-compatible endpoint.
///
/// Cloning is cheap: the SDK client shares its connection pool.
#[derive(Debug, Clone)]
pub struct S3Backend {
    client: Client,
}

impl S3Backend {
    /// Build a client from configuration.
    ///
    /// Validates the endpoint and credentials but does not contact the store.
    pub fn from_config(config: &StorageConfig) -> Result<Self, StorageError> {
        validate_endpoint(&config.endpoint)?;
        if config.access_key.trim().is_empty() {
            return Err(StorageError::Config("access key must not be empty".to_owned()));
        }
        if config.secret_key.trim().is_empty() {
            return Err(StorageError::Config("secret key must not be empty".to_owned()));
        }
        if config.region.trim().is_empty() {
            return Err(StorageError::Config("region must not be empty".to_owned()));
        }

        let credentials = Credentials::new(
            config.access_key.clone(),
            config.secret_key.clone(),
            None,
            None,
            CREDENTIALS_PROVIDER,
        );
        let scheme = if config.secure { "https" } else { "http" };

        let sdk_config = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .endpoint_url(format!("{scheme}://{}", config.endpoint))
            .force_path_style(true)
            .request_checksum_calculation(RequestChecksumCalculation::WhenRequired)
            .build();

        Ok(Self::from_client(Client::from_conf(sdk_config)))
    }

    /// Wrap an already configured SDK client.
    #[must_use]
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    /// The underlying SDK client.
    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }

    async fn put_single(
        &self,
        bucket: &str,
        key: &str,
        body: ByteStream,
        size: u64,
    ) -> Result<UploadInfo, BackendError> {
        let output = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .set_content_length(i64::try_from(size).ok())
            .body(body)
            .send()
            .await
            .map_err(classify)?;

        Ok(UploadInfo {
            bucket: bucket.to_owned(),
            key: key.to_owned(),
            etag: output.e_tag().map(trim_etag),
            size,
            version_id: output.version_id().map(ToOwned::to_owned),
        })
    }

    async fn put_multipart(
        &self,
        bucket: &str,
        key: &str,
        source: PartSource<'_>,
        size: u64,
        part_size: usize,
    ) -> Result<UploadInfo, BackendError> {
        let created = self
            .client
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(classify)?;
        let upload_id = created
            .upload_id()
            .ok_or_else(|| BackendError::sdk("multipart upload started without an upload id"))?
            .to_owned();

        let result = self
            .upload_parts(bucket, key, &upload_id, &source, size, part_size as u64)
            .await;

        if result.is_err() {
            let _ = self
                .client
                .abort_multipart_upload()
                .bucket(bucket)
                .key(key)
                .upload_id(&upload_id)
                .send()
                .await;
        }

        result
    }

    async fn upload_parts(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        source: &PartSource<'_>,
        size: u64,
        part_size: u64,
    ) -> Result<UploadInfo, BackendError> {
        let mut parts = Vec::new();

        for (part_number, offset, len) in part_ranges(size, part_size) {
            let output = self
                .client
                .upload_part()
                .bucket(bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .set_content_length(i64::try_from(len).ok())
                .body(source.part(offset, len).await?)
                .send()
                .await
                .map_err(classify)?;

            parts.push(
                CompletedPart::builder()
                    .set_e_tag(output.e_tag().map(ToOwned::to_owned))
                    .part_number(part_number)
                    .build(),
            );
        }

        let output = self
            .client
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await
            .map_err(classify)?;

        Ok(UploadInfo {
            bucket: bucket.to_owned(),
            key: key.to_owned(),
            etag: output.e_tag().map(trim_etag),
            size,
            version_id: output.version_id().map(ToOwned::to_owned),
        })
    }
}

#[async_trait]
impl StorageBackend for S3Backend {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, BackendError> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(HeadBucketError::is_not_found)
                    || http_status(&err) == Some(404) =>
            {
                Ok(false)
            }
            Err(err) => Err(BackendError::sdk(err)),
        }
    }

    async fn make_bucket(&self, bucket: &str) -> Result<(), BackendError> {
        let region = self
            .client
            .config()
            .region()
            .map(|r| r.as_ref().to_owned())
            .unwrap_or_default();

        let mut request = self.client.create_bucket().bucket(bucket);
        // us-east-1 is the implicit default and must not be sent explicitly.
        if !region.is_empty() && region != "us-east-1" {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(region.as_str()))
                    .build(),
            );
        }

        match request.send().await {
            Ok(_) => Ok(()),
            Err(err) if service_code(&err).as_deref() == Some("BucketAlreadyOwnedByYou") => Ok(()),
            Err(err) => Err(classify(err)),
        }
    }

    async fn list_buckets(&self) -> Result<Vec<BucketInfo>, BackendError> {
        let mut buckets = Vec::new();
        let mut continuation = None;

        loop {
            let output = self
                .client
                .list_buckets()
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(classify)?;

            buckets.extend(output.buckets().iter().filter_map(|b| {
                Some(BucketInfo {
                    name: b.name()?.to_owned(),
                    created_at: b.creation_date().and_then(to_chrono),
                })
            }));

            match output.continuation_token() {
                Some(token) if !token.is_empty() => continuation = Some(token.to_owned()),
                _ => break,
            }
        }

        Ok(buckets)
    }

    fn list_objects(&self, bucket: &str) -> BackendObjectStream {
        let pager = VersionPager {
            client: self.client.clone(),
            bucket: bucket.to_owned(),
            key_marker: None,
            version_id_marker: None,
            buffered: VecDeque::new(),
            exhausted: false,
        };

        futures::stream::try_unfold(pager, |mut pager| async move {
            loop {
                if let Some(info) = pager.buffered.pop_front() {
                    return Ok(Some((info, pager)));
                }
                if pager.exhausted {
                    return Ok(None);
                }
                if let Err(err) = pager.fetch_page().await {
                    return Err(err);
                }
            }
        })
        .boxed()
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<BackendReader, BackendError> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(classify)?;

        let reader: BackendReader = Box::pin(output.body.into_async_read());
        Ok(reader)
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        part_size: usize,
    ) -> Result<UploadInfo, BackendError> {
        let size = data.len() as u64;
        if data.len() <= part_size {
            return self
                .put_single(bucket, key, ByteStream::from(data), size)
                .await;
        }
        self.put_multipart(bucket, key, PartSource::Memory(&data), size, part_size)
            .await
    }

    async fn fget_object(&self, bucket: &str, key: &str, path: &Path) -> Result<(), BackendError> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(classify)?;

        let mut body = Box::pin(output.body.into_async_read());
        write_via_partial(&mut body, path).await
    }

    async fn fput_object(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        part_size: usize,
    ) -> Result<UploadInfo, BackendError> {
        let size = tokio::fs::metadata(path)
            .await
            .map_err(|e| BackendError::io(path, e))?
            .len();

        if size <= part_size as u64 {
            let body = ByteStream::from_path(path)
                .await
                .map_err(BackendError::sdk)?;
            return self.put_single(bucket, key, body, size).await;
        }
        self.put_multipart(bucket, key, PartSource::File(path), size, part_size)
            .await
    }

    async fn remove_bucket(&self, bucket: &str) -> Result<(), BackendError> {
        self.client
            .delete_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn remove_object(&self, bucket: &str, key: &str) -> Result<(), BackendError> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .customize()
            .mutate_request(|req| {
                req.headers_mut().insert(FORCE_DELETE_HEADER, "true");
            })
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }
}

/// Split `size` bytes into `(part_number, offset, len)` triples.
///
/// Part numbers start at 1. Every part is `part_size` long except the last,
/// which carries the remainder.
fn part_ranges(size: u64, part_size: u64) -> impl Iterator<Item = (i32, u64, u64)> {
    let part_size = part_size.max(1);
    (0..size.div_ceil(part_size)).zip(1..).map(move |(index, number)| {
        let offset = index * part_size;
        (number, offset, part_size.min(size - offset))
    })
}

/// Where multipart bodies are read from.
enum PartSource<'a> {
    Memory(&'a Bytes),
    File(&'a Path),
}

impl PartSource<'_> {
    // Offsets into an in-memory payload always fit in usize.
    #[allow(clippy::cast_possible_truncation)]
    async fn part(&self, offset: u64, len: u64) -> Result<ByteStream, BackendError> {
        match self {
            Self::Memory(data) => {
                let start = offset as usize;
                let end = start + len as usize;
                Ok(ByteStream::from(data.slice(start..end)))
            }
            Self::File(path) => ByteStream::read_from()
                .path(path)
                .offset(offset)
                .length(Length::Exact(len))
                .build()
                .await
                .map_err(BackendError::sdk),
        }
    }
}

/// Paging state for `ListObjectVersions`.
struct VersionPager {
    client: Client,
    bucket: String,
    key_marker: Option<String>,
    version_id_marker: Option<String>,
    buffered: VecDeque<ObjectInfo>,
    exhausted: bool,
}

impl VersionPager {
    async fn fetch_page(&mut self) -> Result<(), BackendError> {
        let output = self
            .client
            .list_object_versions()
            .bucket(&self.bucket)
            .set_key_marker(self.key_marker.take())
            .set_version_id_marker(self.version_id_marker.take())
            .send()
            .await
            .map_err(classify)?;

        let mut page: Vec<ObjectInfo> = output
            .versions()
            .iter()
            .filter_map(|v| {
                Some(ObjectInfo {
                    key: v.key()?.to_owned(),
                    version_id: v.version_id().filter(|id| *id != "null").map(ToOwned::to_owned),
                    is_latest: v.is_latest().unwrap_or(true),
                    is_delete_marker: false,
                    size: v.size().and_then(|s| u64::try_from(s).ok()).unwrap_or(0),
                    etag: v.e_tag().map(trim_etag),
                    last_modified: v.last_modified().and_then(to_chrono),
                    storage_class: v.storage_class().map(|c| c.as_str().to_owned()),
                })
            })
            .collect();

        page.extend(output.delete_markers().iter().filter_map(|m| {
            Some(ObjectInfo {
                key: m.key()?.to_owned(),
                version_id: m.version_id().map(ToOwned::to_owned),
                is_latest: m.is_latest().unwrap_or(false),
                is_delete_marker: true,
                size: 0,
                etag: None,
                last_modified: m.last_modified().and_then(to_chrono),
                storage_class: None,
            })
        }));
        page.sort_by(|a, b| a.key.cmp(&b.key).then(b.is_latest.cmp(&a.is_latest)));
        self.buffered.extend(page);

        let truncated = output.is_truncated().unwrap_or(false);
        self.key_marker = output.next_key_marker().map(ToOwned::to_owned);
        self.version_id_marker = output.next_version_id_marker().map(ToOwned::to_owned);
        // A truncated page without a marker would loop forever.
        self.exhausted = !truncated || self.key_marker.is_none();

        Ok(())
    }
}

/// Check that an endpoint is a bare `host[:port]`.
fn validate_endpoint(endpoint: &str) -> Result<(), StorageError> {
    let endpoint = endpoint.trim();
    let invalid = |reason: &str| Err(StorageError::Config(format!("endpoint {endpoint:?} {reason}")));

    if endpoint.is_empty() {
        return invalid("must not be empty");
    }
    if endpoint.contains("://") {
        return invalid("must not include a scheme; use the secure flag for TLS");
    }
    if endpoint.contains('/') || endpoint.chars().any(char::is_whitespace) {
        return invalid("must be a bare host[:port]");
    }

    // Bracketed IPv6 hosts carry colons of their own.
    let (host, port) = match endpoint.rsplit_once(':') {
        Some((host, port)) if !host.ends_with(':') && (!host.starts_with('[') || host.ends_with(']')) => {
            (host, Some(port))
        }
        _ => (endpoint, None),
    };
    if host.is_empty() {
        return invalid("must name a host");
    }
    if let Some(port) = port {
        if port.parse::<u16>().map_or(true, |p| p == 0) {
            return invalid("has an invalid port");
        }
    }

    Ok(())
}

/// Map an SDK failure onto the backend taxonomy.
fn classify<E>(err: SdkError<E>) -> BackendError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    match service_code(&err).as_deref() {
        Some("NoSuchBucket") => BackendError::NoSuchBucket,
        Some("NoSuchKey") => BackendError::NoSuchKey,
        Some("BucketNotEmpty") => BackendError::BucketNotEmpty,
        _ => BackendError::sdk(err),
    }
}

fn service_code<E: ProvideErrorMetadata>(err: &SdkError<E>) -> Option<String> {
    err.as_service_error()
        .and_then(|e| e.code())
        .map(ToOwned::to_owned)
}

fn http_status<E>(err: &SdkError<E>) -> Option<u16> {
    err.raw_response().map(|r| r.status().as_u16())
}

fn to_chrono(dt: &SmithyDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(dt.secs(), dt.subsec_nanos())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(endpoint: &str) -> StorageConfig {
        StorageConfig::builder()
            .endpoint(endpoint.into())
            .access_key("minio".into())
            .secret_key("minio123".into())
            .build()
    }

    #[test]
    fn test_should_accept_host_and_port_endpoints() {
        for endpoint in ["localhost:9000", "minio", "10.0.0.5:9000", "[::1]:9000", "s3.example.com"] {
            assert!(validate_endpoint(endpoint).is_ok(), "{endpoint} should be valid");
        }
    }

    #[test]
    fn test_should_reject_malformed_endpoints() {
        for endpoint in ["", "http://localhost:9000", "localhost:9000/path", "localhost:port", "localhost:0", ":9000"] {
            assert!(validate_endpoint(endpoint).is_err(), "{endpoint:?} should be rejected");
        }
    }

    #[tokio::test]
    async fn test_should_build_backend_from_valid_config() {
        let backend = S3Backend::from_config(&config("localhost:9000")).unwrap();
        assert_eq!(
            backend.client().config().region().map(|r| r.as_ref().to_owned()),
            Some("us-east-1".to_owned())
        );
    }

    #[test]
    fn test_should_surface_configuration_errors() {
        let err = S3Backend::from_config(&config("https://localhost:9000")).unwrap_err();
        assert!(matches!(err, StorageError::Config(_)));

        let mut cfg = config("localhost:9000");
        cfg.secret_key = String::new();
        let err = S3Backend::from_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("secret key"));
    }

    #[test]
    fn test_should_split_exact_multiple_into_full_parts() {
        let parts: Vec<_> = part_ranges(10, 5).collect();
        assert_eq!(parts, [(1, 0, 5), (2, 5, 5)]);
    }

    #[test]
    fn test_should_put_remainder_in_short_last_part() {
        let parts: Vec<_> = part_ranges(11, 5).collect();
        assert_eq!(parts, [(1, 0, 5), (2, 5, 5), (3, 10, 1)]);

        let parts: Vec<_> = part_ranges(6, 5).collect();
        assert_eq!(parts, [(1, 0, 5), (2, 5, 1)]);
    }

    #[test]
    fn test_should_yield_single_part_when_size_matches_part_size() {
        let parts: Vec<_> = part_ranges(5, 5).collect();
        assert_eq!(parts, [(1, 0, 5)]);
        assert_eq!(part_ranges(0, 5).count(), 0);
    }

    #[test]
    fn test_should_cover_every_byte_exactly_once() {
        let size = 3 * 1024 + 17;
        let parts: Vec<_> = part_ranges(size, 1024).collect();
        assert_eq!(parts.iter().map(|(_, _, len)| len).sum::<u64>(), size);
        for pair in parts.windows(2) {
            assert_eq!(pair[0].1 + pair[0].2, pair[1].1);
        }
    }

    async fn collect_part(source: &PartSource<'_>, offset: u64, len: u64) -> Vec<u8> {
        source
            .part(offset, len)
            .await
            .unwrap()
            .collect()
            .await
            .unwrap()
            .into_bytes()
            .to_vec()
    }

    #[tokio::test]
    async fn test_should_slice_memory_parts() {
        let data = Bytes::from_static(b"0123456789a");
        let source = PartSource::Memory(&data);
        let mut joined = Vec::new();
        for (_, offset, len) in part_ranges(data.len() as u64, 5) {
            joined.extend(collect_part(&source, offset, len).await);
        }
        assert_eq!(collect_part(&source, 10, 1).await, b"a");
        assert_eq!(joined, data.as_ref());
    }

    #[tokio::test]
    async fn test_should_read_file_parts_at_offsets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payload.bin");
        tokio::fs::write(&path, b"0123456789a").await.unwrap();

        let source = PartSource::File(&path);
        assert_eq!(collect_part(&source, 0, 5).await, b"01234");
        assert_eq!(collect_part(&source, 5, 5).await, b"56789");
        assert_eq!(collect_part(&source, 10, 1).await, b"a");
    }

    #[test]
    fn test_should_convert_smithy_timestamps() {
        let dt = SmithyDateTime::from_secs(1_700_000_000);
        let converted = to_chrono(&dt).unwrap();
        assert_eq!(converted.timestamp(), 1_700_000_000);
    }
}
