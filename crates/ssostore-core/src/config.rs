//! Configuration management for ssostore.
//!
//! All configuration is driven by environment variables. The variable names
//! for the object store keep the `MINIO_*` prefix used by existing
//! deployments. Loaders take a lookup function so they can be exercised
//! without touching the process environment.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::error::{CoreError, CoreResult};

/// Connection settings for the remote object store.
///
/// # Examples
///
/// ```
/// use ssostore_core::StorageConfig;
///
/// let config = StorageConfig::builder()
///     .endpoint("localhost:9000".into())
///     .access_key("minio".into())
///     .secret_key("minio123".into())
///     .build();
/// assert!(!config.secure);
/// assert_eq!(config.region, "us-east-1");
/// ```
#[derive(Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    /// Endpoint as `host[:port]`, without scheme.
    pub endpoint: String,

    /// Access key id.
    pub access_key: String,

    /// Secret access key.
    pub secret_key: String,

    /// Whether to talk to the endpoint over TLS.
    #[builder(default = false)]
    pub secure: bool,

    /// Region used for request signing.
    #[builder(default = String::from(StorageConfig::DEFAULT_REGION))]
    pub region: String,
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key)
            .field("secret_key", &"***")
            .field("secure", &self.secure)
            .field("region", &self.region)
            .finish()
    }
}

impl StorageConfig {
    /// Region used when `MINIO_REGION` is not set.
    pub const DEFAULT_REGION: &str = "us-east-1";

    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `MINIO_ENDPOINT` | *(required)* |
    /// | `MINIO_ACCESS_KEY_ID` | *(required)* |
    /// | `MINIO_SECRET_ACCESS_KEY` | *(required)* |
    /// | `MINIO_SECURE` | `false` |
    /// | `MINIO_REGION` | `us-east-1` |
    pub fn from_env() -> CoreResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> CoreResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(CoreError::MissingVar(name))
        };

        let mut config = Self::builder()
            .endpoint(required("MINIO_ENDPOINT")?)
            .access_key(required("MINIO_ACCESS_KEY_ID")?)
            .secret_key(required("MINIO_SECRET_ACCESS_KEY")?)
            .build();

        if let Some(v) = lookup("MINIO_SECURE") {
            config.secure = parse_bool(&v);
        }
        if let Some(v) = lookup("MINIO_REGION").filter(|v| !v.is_empty()) {
            config.region = v;
        }

        Ok(config)
    }
}

/// Settings for the HTTP host process.
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Bind address (e.g. `"127.0.0.1:4000"`).
    #[builder(default = String::from("127.0.0.1:4000"))]
    pub listen_addr: String,

    /// Log level filter string (e.g. `"info"`, `"debug"`).
    #[builder(default = String::from("info"))]
    pub log_level: String,

    /// Deadline applied to every storage call made on behalf of a request.
    #[builder(default = 30)]
    pub request_timeout_secs: u64,

    /// Whether the process runs in development mode.
    #[builder(default = false)]
    pub development: bool,

    /// Whether every served request is logged. Off only in production.
    #[builder(default = true)]
    pub request_logging: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `LISTEN_ADDR` | `127.0.0.1:4000` |
    /// | `GO_PORT` / `PORT` | *(unset)*, only the port of the default address |
    /// | `LOG_LEVEL` | `info`, `debug` in development |
    /// | `REQUEST_TIMEOUT_SECS` | `30` |
    /// | `GO_ENV` | *(unset)*, `development` enables development mode, `production` disables request logging |
    pub fn from_env() -> CoreResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> CoreResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("GO_ENV") {
            let env = v.trim();
            config.development = env == "development";
            config.request_logging = env != "production";
            if config.development {
                config.log_level = String::from("debug");
            }
        }
        if let Some(port) = lookup("GO_PORT").or_else(|| lookup("PORT")) {
            let port: u16 = port.trim().parse().map_err(|_| CoreError::InvalidVar {
                name: "PORT",
                value: port.clone(),
            })?;
            config.listen_addr = format!("127.0.0.1:{port}");
        }
        if let Some(v) = lookup("LISTEN_ADDR") {
            config.listen_addr = v;
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            config.log_level = v;
        }
        if let Some(v) = lookup("REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = v.trim().parse().map_err(|_| CoreError::InvalidVar {
                name: "REQUEST_TIMEOUT_SECS",
                value: v.clone(),
            })?;
        }

        Ok(config)
    }

    /// The per-request storage deadline as a [`Duration`].
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Parse a string as a boolean, accepting `"1"` and `"true"` (case-insensitive).
fn parse_bool(value: &str) -> bool {
    let value = value.trim();
    value == "1" || value.eq_ignore_ascii_case("true")
}
