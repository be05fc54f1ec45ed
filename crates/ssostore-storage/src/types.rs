//! Values returned by storage operations.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Outcome of an idempotent bucket creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketCreated {
    /// The bucket name.
    pub bucket: String,
    /// `false` when the bucket already existed and nothing was created.
    pub created: bool,
    /// Human-readable confirmation.
    pub message: String,
}

impl BucketCreated {
    pub(crate) fn new(bucket: &str, created: bool) -> Self {
        let message = if created {
            format!("Created bucket name {bucket} success")
        } else {
            format!("Bucket name {bucket} already exists")
        };
        Self {
            bucket: bucket.to_owned(),
            created,
            message,
        }
    }
}

/// A bucket as reported by a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketInfo {
    /// Bucket name.
    pub name: String,
    /// Creation time, when the store reports one.
    pub created_at: Option<DateTime<Utc>>,
}

/// One object version as reported by a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectInfo {
    /// Object key.
    pub key: String,
    /// Version id; `None` on unversioned buckets.
    pub version_id: Option<String>,
    /// Whether this is the current version.
    pub is_latest: bool,
    /// Whether this entry is a delete marker.
    pub is_delete_marker: bool,
    /// Size in bytes.
    pub size: u64,
    /// Entity tag, without surrounding quotes.
    pub etag: Option<String>,
    /// Last modification time.
    pub last_modified: Option<DateTime<Utc>>,
    /// Storage class reported by the store.
    pub storage_class: Option<String>,
}

/// Descriptor of a completed upload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadInfo {
    /// Target bucket.
    pub bucket: String,
    /// Target key.
    pub key: String,
    /// Entity tag, without surrounding quotes.
    pub etag: Option<String>,
    /// Number of bytes uploaded.
    pub size: u64,
    /// Version id assigned by a versioned bucket.
    pub version_id: Option<String>,
}

/// Strip the quotes S3 puts around entity tags.
pub(crate) fn trim_etag(etag: &str) -> String {
    etag.trim_matches('"').to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_describe_created_bucket() {
        let out = BucketCreated::new("docs", true);
        assert!(out.created);
        assert_eq!(out.message, "Created bucket name docs success");
    }

    #[test]
    fn test_should_describe_existing_bucket() {
        let out = BucketCreated::new("docs", false);
        assert!(!out.created);
        assert!(out.message.contains("docs"));
    }

    #[test]
    fn test_should_trim_etag_quotes() {
        assert_eq!(trim_etag("\"abc123\""), "abc123");
        assert_eq!(trim_etag("abc123"), "abc123");
    }

    #[test]
    fn test_should_serialize_upload_info() {
        let info = UploadInfo {
            bucket: "docs".into(),
            key: "a.txt".into(),
            etag: Some("abc".into()),
            size: 5,
            version_id: None,
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["key"], "a.txt");
        assert_eq!(json["size"], 5);
    }
}
