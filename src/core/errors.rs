//! Custom error types for translation operations

use thiserror::Error;

/// Failures reported by a translation provider
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Provider signalled quota exhaustion (HTTP 429 or equivalent)
    #[error("Rate limit exceeded. Retry after {retry_after:?} seconds")]
    RateLimited {
        retry_after: Option<u64>,
    },

    /// Network or provider-side failure other than rate limiting
    #[error("Transport failure: {message}")]
    TransportFailure {
        message: String,
    },
}

impl ProviderError {
    /// Build a transport failure from anything printable
    pub fn transport(message: impl Into<String>) -> Self {
        ProviderError::TransportFailure {
            message: message.into(),
        }
    }

    /// Whether this failure is a rate-limit signal
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ProviderError::RateLimited { .. })
    }
}

/// Translation-related errors
#[derive(Error, Debug)]
pub enum TranslationError {
    /// Missing credential, model or other setup problem
    #[error("Configuration error: {message}")]
    ConfigurationInvalid {
        message: String,
    },

    /// A run was started while another one is still active
    #[error("A translation run is already in progress")]
    AlreadyRunning,

    /// Provider call failed after all retries
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Response could not be parsed into translations
    #[error("Malformed response: {message}")]
    MalformedResponse {
        message: String,
    },

    /// The run was cancelled by the user
    #[error("Translation cancelled")]
    Cancelled,

    /// File operation error
    #[error("File error: {path} - {message}")]
    FileError {
        path: String,
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Reqwest error
    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl TranslationError {
    /// Shorthand for a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        TranslationError::ConfigurationInvalid {
            message: message.into(),
        }
    }
}

/// Result type for translation operations
pub type Result<T> = std::result::Result<T, TranslationError>;
