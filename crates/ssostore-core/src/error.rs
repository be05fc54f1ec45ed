//! Error types for the ssostore core.

/// Configuration error raised while loading settings.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A required environment variable is missing or blank.
    #[error("missing required configuration variable: {0}")]
    MissingVar(&'static str),

    /// An environment variable holds a value that cannot be parsed.
    #[error("invalid value for {name}: {value:?}")]
    InvalidVar {
        /// Variable name.
        name: &'static str,
        /// The rejected value.
        value: String,
    },
}

/// Convenience result type for configuration loading.
pub type CoreResult<T> = Result<T, CoreError>;
