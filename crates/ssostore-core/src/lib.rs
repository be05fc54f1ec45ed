//! Shared configuration and error types for ssostore.
//!
//! Both the storage façade and the host process read their settings through
//! this crate so every component agrees on variable names and defaults.

mod config;
mod error;

pub use config::{ServerConfig, StorageConfig};
pub use error::{CoreError, CoreResult};
