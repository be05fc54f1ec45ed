//! Request router.
//!
//! Routes are matched on method and path:
//!
//! ```text
//! GET    /
//! GET    /api/v1/students
//! GET    /health | /_health
//! GET    /api/v1/storage/buckets
//! PUT    /api/v1/storage/buckets/{bucket}
//! DELETE /api/v1/storage/buckets/{bucket}
//! GET    /api/v1/storage/buckets/{bucket}/objects
//! PUT    /api/v1/storage/buckets/{bucket}/objects/{key...}
//! GET    /api/v1/storage/buckets/{bucket}/objects/{key...}
//! DELETE /api/v1/storage/buckets/{bucket}/objects/{key...}
//! ```
//!
//! Bucket names and keys are percent-decoded. Keys may contain `/`.

use http::Method;
use percent_encoding::percent_decode_str;

/// Path prefix of the storage API.
const BUCKETS_PREFIX: &str = "/api/v1/storage/buckets";

/// A resolved route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Liveness ping.
    Ping,
    /// Placeholder for the student directory.
    Students,
    /// Health report.
    Health,
    /// List all buckets.
    ListBuckets,
    /// Create a bucket.
    MakeBucket { bucket: String },
    /// Delete a bucket.
    RemoveBucket { bucket: String },
    /// List the objects of a bucket.
    ListObjects { bucket: String },
    /// Upload the request body as an object.
    PutObject { bucket: String, key: String },
    /// Download an object.
    GetObject { bucket: String, key: String },
    /// Delete an object.
    RemoveObject { bucket: String, key: String },
}

/// Why a request did not resolve to a route.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    /// No route has this path.
    #[error("route {0} not found")]
    NotFound(String),
    /// The path exists but not for this method.
    #[error("method {method} not allowed on {path}")]
    MethodNotAllowed { method: Method, path: String },
    /// A path segment is not valid percent-encoded UTF-8.
    #[error("malformed path segment {0:?}")]
    Malformed(String),
}

/// Resolve `method` and `path` to a [`Route`].
pub fn resolve_route(method: &Method, path: &str) -> Result<Route, RouteError> {
    let not_allowed = || RouteError::MethodNotAllowed {
        method: method.clone(),
        path: path.to_owned(),
    };

    let storage_path = path
        .strip_prefix(BUCKETS_PREFIX)
        .filter(|rest| rest.is_empty() || rest.starts_with('/'));

    let Some(rest) = storage_path else {
        let route = match path {
            "/" => Route::Ping,
            "/api/v1/students" => Route::Students,
            "/health" | "/_health" => Route::Health,
            _ => return Err(RouteError::NotFound(path.to_owned())),
        };
        return if *method == Method::GET {
            Ok(route)
        } else {
            Err(not_allowed())
        };
    };

    let rest = rest.strip_prefix('/').unwrap_or(rest);
    if rest.is_empty() {
        return match *method {
            Method::GET => Ok(Route::ListBuckets),
            _ => Err(not_allowed()),
        };
    }

    let (bucket, tail) = match rest.split_once('/') {
        Some((bucket, tail)) => (bucket, Some(tail)),
        None => (rest, None),
    };
    let bucket = decode(bucket)?;

    match tail {
        None | Some("") => match *method {
            Method::PUT => Ok(Route::MakeBucket { bucket }),
            Method::DELETE => Ok(Route::RemoveBucket { bucket }),
            _ => Err(not_allowed()),
        },
        Some("objects" | "objects/") => match *method {
            Method::GET => Ok(Route::ListObjects { bucket }),
            _ => Err(not_allowed()),
        },
        Some(tail) => {
            let Some(key) = tail.strip_prefix("objects/") else {
                return Err(RouteError::NotFound(path.to_owned()));
            };
            let key = decode(key)?;
            match *method {
                Method::PUT => Ok(Route::PutObject { bucket, key }),
                Method::GET => Ok(Route::GetObject { bucket, key }),
                Method::DELETE => Ok(Route::RemoveObject { bucket, key }),
                _ => Err(not_allowed()),
            }
        }
    }
}

fn decode(segment: &str) -> Result<String, RouteError> {
    percent_decode_str(segment)
        .decode_utf8()
        .map(std::borrow::Cow::into_owned)
        .map_err(|_| RouteError::Malformed(segment.to_owned()))
}
