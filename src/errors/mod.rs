use thiserror::Error;

/// Typed error hierarchy for maturation.
///
/// Use at module boundaries (provider calls, content generation, config validation,
/// run lifecycle). Internal/leaf functions can continue using `anyhow::Result`; the
/// `Internal` variant allows seamless conversion via the `?` operator.
#[derive(Debug, Error)]
pub enum MaturationError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Provider error: {message}")]
    Provider { message: String, retryable: bool },

    #[error("Rate limit exceeded")]
    RateLimit { retry_after: Option<u64> },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Convenience alias for results using `MaturationError`.
pub type MaturationResult<T> = std::result::Result<T, MaturationError>;

impl MaturationError {
    /// Whether this error is transient and the operation could be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Provider { retryable, .. } => *retryable,
            Self::RateLimit { .. } | Self::Internal(_) => true,
            Self::Auth(_)
            | Self::Config(_)
            | Self::Validation(_)
            | Self::NotFound(_)
            | Self::Conflict(_) => false,
        }
    }
}
