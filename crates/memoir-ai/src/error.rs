//! Error types for the capability layer

use thiserror::Error;

/// Errors produced by the completion and embedding capabilities.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The provider could not be reached or returned a server-side
    /// failure. Retryable.
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    /// The provider throttled the request. Retryable, optionally after
    /// the duration the provider asked for.
    #[error("Rate limited by provider")]
    RateLimited { retry_after_secs: Option<u64> },

    /// The provider answered with a non-retryable API error (bad auth,
    /// malformed request, ...).
    #[error("Provider API error {status}: {message}")]
    Api { status: u16, message: String },

    /// The provider answered but the payload could not be interpreted.
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProviderError {
    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Unavailable(_) | ProviderError::RateLimited { .. } => true,
            ProviderError::Http(err) => err.is_timeout() || err.is_connect(),
            ProviderError::Api { .. }
            | ProviderError::InvalidResponse(_)
            | ProviderError::Json(_) => false,
        }
    }

    /// Provider-suggested retry delay, if any.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            ProviderError::RateLimited { retry_after_secs } => *retry_after_secs,
            _ => None,
        }
    }
}

/// Result type alias for capability operations
pub type Result<T> = std::result::Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ProviderError::Unavailable("down".to_string()).is_retryable());
        assert!(ProviderError::RateLimited {
            retry_after_secs: Some(2)
        }
        .is_retryable());
        assert!(!ProviderError::Api {
            status: 401,
            message: "unauthorized".to_string()
        }
        .is_retryable());
        assert!(!ProviderError::InvalidResponse("garbage".to_string()).is_retryable());
    }

    #[test]
    fn test_retry_after_passthrough() {
        let err = ProviderError::RateLimited {
            retry_after_secs: Some(10),
        };
        assert_eq!(err.retry_after_secs(), Some(10));
        assert_eq!(
            ProviderError::Unavailable("down".to_string()).retry_after_secs(),
            None
        );
    }
}
