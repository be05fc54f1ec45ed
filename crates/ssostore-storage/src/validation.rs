//! Local validation of bucket and object names.
//!
//! Names are checked before any remote call so an obviously bad name never
//! costs a round trip. The rules follow the
//! [Amazon S3 bucket naming rules](https://docs.aws.amazon.com/AmazonS3/latest/userguide/bucketnamingrules.html),
//! which MinIO enforces as well.

use std::net::Ipv4Addr;

use crate::error::StorageError;

/// Minimum bucket name length.
const MIN_BUCKET_NAME_LEN: usize = 3;

/// Maximum bucket name length.
const MAX_BUCKET_NAME_LEN: usize = 63;

/// Maximum object key length in bytes.
const MAX_KEY_BYTES: usize = 1024;

/// Validate a bucket name.
///
/// Rules:
/// - 3-63 characters long
/// - Only lowercase letters, numbers, hyphens, and dots
/// - Must start and end with a letter or number
/// - No consecutive dots (`..`)
/// - Not formatted as an IPv4 address (e.g. `192.168.0.1`)
/// - Must not start with `xn--` or end with `-s3alias`
///
/// # Examples
///
/// ```
/// use ssostore_storage::validation::validate_bucket_name;
///
/// assert!(validate_bucket_name("docs").is_ok());
/// assert!(validate_bucket_name("").is_err());
/// ```
pub fn validate_bucket_name(name: &str) -> Result<(), StorageError> {
    let reject = |reason: &str| {
        Err(StorageError::InvalidBucketName {
            name: name.to_owned(),
            reason: reason.to_owned(),
        })
    };

    let len = name.len();
    if !(MIN_BUCKET_NAME_LEN..=MAX_BUCKET_NAME_LEN).contains(&len) {
        return reject(&format!(
            "must be between {MIN_BUCKET_NAME_LEN} and {MAX_BUCKET_NAME_LEN} characters long"
        ));
    }

    if !name
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'.')
    {
        return reject("must only contain lowercase letters, numbers, hyphens, and dots");
    }

    let first = name.as_bytes()[0];
    let last = name.as_bytes()[len - 1];
    if !first.is_ascii_alphanumeric() || !last.is_ascii_alphanumeric() {
        return reject("must start and end with a letter or number");
    }

    if name.contains("..") {
        return reject("must not contain consecutive dots");
    }

    if name.parse::<Ipv4Addr>().is_ok() {
        return reject("must not be formatted as an IP address");
    }

    if name.starts_with("xn--") {
        return reject("must not start with 'xn--'");
    }

    if name.ends_with("-s3alias") {
        return reject("must not end with '-s3alias'");
    }

    Ok(())
}

/// Validate an object key: 1-1024 bytes, no NUL bytes.
pub fn validate_object_name(key: &str) -> Result<(), StorageError> {
    let reason = if key.is_empty() {
        "must not be empty"
    } else if key.len() > MAX_KEY_BYTES {
        "must be at most 1024 bytes long"
    } else if key.contains('\0') {
        "must not contain NUL characters"
    } else {
        return Ok(());
    };

    Err(StorageError::InvalidObjectName {
        key: key.to_owned(),
        reason: reason.to_owned(),
    })
}
