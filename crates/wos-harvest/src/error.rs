//! Error types for the harvester.
//!
//! Uses `thiserror` for structured error handling with automatic `From` implementations.

use std::time::Duration;

/// Errors from the HTTP client layer.
#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    /// No API key configured; raised before any request is made.
    #[error("WOS_API_KEY is not set")]
    MissingApiKey,

    /// Configuration value rejected.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// HTTP transport error (connection, DNS, TLS, etc.)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Rate limited by the API (429 response)
    #[error("Rate limited after {attempts} attempts")]
    RateLimited {
        /// Attempts made before giving up
        attempts: u32,
    },

    /// Any other non-success status
    #[error("Unexpected status {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body or message
        message: String,
    },

    /// Response body was not a valid search response
    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ClientError {
    /// Create a status error.
    #[must_use]
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status { status, message: message.into() }
    }

    /// Returns true if this error is retryable.
    ///
    /// Only rate limiting is retried; everything else drops the page.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Status { status: 429, .. })
    }
}

/// Errors from harvesting and exporting.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    /// Error from the API client
    #[error("API error: {0}")]
    Client(#[from] ClientError),

    /// The metadata request for an organization failed; the organization is skipped.
    #[error("First page for {organization} failed: {source}")]
    FirstPage {
        /// Organization display name
        organization: String,
        /// Underlying client failure
        #[source]
        source: ClientError,
    },

    /// Organization not in the catalog
    #[error("Unknown organization: {0}")]
    UnknownOrganization(String),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV writer error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Errors surfaced by the question loop.
#[derive(thiserror::Error, Debug)]
pub enum AskError {
    /// Error from the hosted model endpoint
    #[error("Model request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Model returned an error status
    #[error("Model returned status {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body
        message: String,
    },

    /// Model returned no choices
    #[error("Model returned an empty answer")]
    EmptyAnswer,

    /// Reading questions failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Result type alias for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// How long a caller should wait before asking a still-loading service again.
pub const NOT_READY_RETRY_AFTER: Duration = Duration::from_secs(5);
