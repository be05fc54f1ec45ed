//! Integration tests for ssostore.
//!
//! These tests need a running S3-compatible endpoint (MinIO by default at
//! `localhost:9000`) and, for the HTTP tests, a running `ssostore-server`.
//! They are marked `#[ignore]` so they don't run during normal `cargo test`.
//!
//! Run them with:
//! ```text
//! cargo test -p ssostore-integration -- --ignored
//! ```

use std::sync::Once;

use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use ssostore_core::StorageConfig;
use ssostore_storage::{CallContext, GuardedStorage};

static INIT: Once = Once::new();

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_owned())
}

/// Storage configuration for the test endpoint.
///
/// Reads the same `MINIO_*` variables as the server and falls back to the
/// MinIO defaults.
#[must_use]
pub fn storage_config() -> StorageConfig {
    StorageConfig::builder()
        .endpoint(env_or("MINIO_ENDPOINT", "localhost:9000"))
        .access_key(env_or("MINIO_ACCESS_KEY_ID", "minioadmin"))
        .secret_key(env_or("MINIO_SECRET_ACCESS_KEY", "minioadmin"))
        .build()
}

/// Guarded storage pointing at the test endpoint.
#[must_use]
pub fn storage() -> GuardedStorage {
    init_tracing();
    GuardedStorage::connect(&storage_config()).expect("valid test storage config")
}

/// Raw S3 client for checking state behind the façade's back.
#[must_use]
pub fn s3_client() -> aws_sdk_s3::Client {
    init_tracing();

    let config = storage_config();
    let creds = Credentials::new(
        config.access_key,
        config.secret_key,
        None,
        None,
        "integration-test",
    );

    let config = aws_sdk_s3::config::Builder::new()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new(config.region))
        .credentials_provider(creds)
        .endpoint_url(format!("http://{}", config.endpoint))
        .force_path_style(true)
        .build();

    aws_sdk_s3::Client::from_conf(config)
}

/// Base URL of a running `ssostore-server`.
#[must_use]
pub fn server_url() -> String {
    env_or("SSOSTORE_URL", "http://127.0.0.1:4000")
}

/// Generate a unique bucket name for a test.
#[must_use]
pub fn test_bucket_name(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().to_string()[..8].to_owned();
    format!("test-{prefix}-{id}")
}

/// Create a bucket through the façade and return its name. Caller is
/// responsible for cleanup.
pub async fn create_test_bucket(storage: &GuardedStorage, prefix: &str) -> String {
    let name = test_bucket_name(prefix);
    storage
        .make_bucket(&CallContext::new(), &name)
        .await
        .unwrap_or_else(|e| panic!("failed to create bucket {name}: {e}"));
    name
}

/// Delete every object version in a bucket, then delete the bucket.
pub async fn cleanup_bucket(client: &aws_sdk_s3::Client, bucket: &str) {
    let Ok(resp) = client.list_object_versions().bucket(bucket).send().await else {
        return; // Bucket may not exist.
    };

    let versions = resp
        .versions()
        .iter()
        .map(|v| (v.key(), v.version_id()))
        .chain(
            resp.delete_markers()
                .iter()
                .map(|m| (m.key(), m.version_id())),
        );
    for (key, version_id) in versions {
        if let Some(key) = key {
            let _ = client
                .delete_object()
                .bucket(bucket)
                .key(key)
                .set_version_id(version_id.map(ToOwned::to_owned))
                .send()
                .await;
        }
    }

    let _ = client.delete_bucket().bucket(bucket).send().await;
}

mod test_bucket;
mod test_cancel;
mod test_http;
mod test_object;
