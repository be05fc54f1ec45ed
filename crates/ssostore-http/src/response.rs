//! Response envelopes and error formatting.
//!
//! Every JSON response shares one envelope:
//!
//! ```json
//! {
//!   "stat_code": 404,
//!   "stat_msg": "bucket docs does not exist"
//! }
//! ```
//!
//! `data` is added when the operation returns a payload.

use http::{HeaderValue, Response, StatusCode, header};
use serde::Serialize;
use ssostore_storage::{ObjectReader, StorageError};

use crate::body::{self, ResponseBody};

/// Content type for envelope responses.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Content type for object downloads.
pub const OBJECT_CONTENT_TYPE: &str = "application/octet-stream";

/// The JSON envelope wrapping every non-object response.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    /// Mirrors the HTTP status code.
    pub stat_code: u16,
    /// Human-readable outcome.
    pub stat_msg: String,
    /// Operation payload, omitted when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

/// Build an envelope response carrying `data`.
#[must_use]
pub fn envelope<T: Serialize>(
    status: StatusCode,
    message: impl Into<String>,
    data: Option<T>,
) -> Response<ResponseBody> {
    let envelope = Envelope {
        stat_code: status.as_u16(),
        stat_msg: message.into(),
        data,
    };

    match serde_json::to_vec(&envelope) {
        Ok(json) => with_content_type(status, body::full(json), JSON_CONTENT_TYPE),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode response envelope");
            with_content_type(
                StatusCode::INTERNAL_SERVER_ERROR,
                body::full(r#"{"stat_code":500,"stat_msg":"failed to encode response"}"#),
                JSON_CONTENT_TYPE,
            )
        }
    }
}

/// Build an envelope response without a payload.
#[must_use]
pub fn message(status: StatusCode, message: impl Into<String>) -> Response<ResponseBody> {
    envelope::<()>(status, message, None)
}

/// Status code reported for a storage failure.
#[must_use]
pub fn error_status(error: &StorageError) -> StatusCode {
    match error {
        StorageError::InvalidBucketName { .. } | StorageError::InvalidObjectName { .. } => {
            StatusCode::BAD_REQUEST
        }
        StorageError::NoSuchBucket { .. } | StorageError::NoSuchKey { .. } => StatusCode::NOT_FOUND,
        StorageError::BucketNotEmpty { .. } => StatusCode::CONFLICT,
        StorageError::DeadlineExceeded { .. } => StatusCode::GATEWAY_TIMEOUT,
        StorageError::Cancelled { .. } => StatusCode::SERVICE_UNAVAILABLE,
        StorageError::ExistenceCheck { .. } | StorageError::Remote { .. } => StatusCode::BAD_GATEWAY,
        StorageError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Convert a storage failure into an envelope response.
#[must_use]
pub fn error_to_response(error: &StorageError) -> Response<ResponseBody> {
    message(error_status(error), error.to_string())
}

/// Stream an object body back to the client.
#[must_use]
pub fn object(reader: ObjectReader) -> Response<ResponseBody> {
    with_content_type(StatusCode::OK, body::from_reader(reader), OBJECT_CONTENT_TYPE)
}

fn with_content_type(
    status: StatusCode,
    body: ResponseBody,
    content_type: &'static str,
) -> Response<ResponseBody> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}
