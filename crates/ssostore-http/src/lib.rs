//! HTTP service layer for ssostore.
//!
//! This crate exposes a [`GuardedStorage`](ssostore_storage::GuardedStorage)
//! over a small JSON API:
//!
//! - **Router**: Maps method and path to a [`Route`](router::Route)
//! - **Service**: Hyper `Service` implementation running each route under a
//!   per-request call context
//! - **Response helpers**: `{stat_code, stat_msg, data}` envelopes and
//!   error-to-status mapping

pub mod body;
pub mod response;
pub mod router;
pub mod service;

pub use body::ResponseBody;
pub use service::{REQUEST_ID_HEADER, StorageHttpConfig, StorageHttpService};
