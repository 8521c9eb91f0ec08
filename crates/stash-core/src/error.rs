//! Error types for Stash.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Upstream errors
    #[error("Upstream timed out: {target}")]
    Timeout { target: String },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Request rejected: {0}")]
    Rejected(String),

    // Cache errors
    #[error("Cache store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("No fetcher registered for {provider}/{endpoint}")]
    NoFetcherRegistered { provider: String, endpoint: String },

    // Infrastructure errors
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // Generic
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether a failed upstream call is worth another attempt.
    ///
    /// Timeouts, connection failures, 5xx and 429 are transient. Any other
    /// 4xx, a 404 or an explicitly rejected request is terminal.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Timeout { .. } | Error::Connection(_) => true,
            Error::Upstream { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Short label for the variant, for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Timeout { .. } => "timeout",
            Error::Connection(_) => "connection",
            Error::Upstream { .. } => "upstream",
            Error::NotFound(_) => "not_found",
            Error::Rejected(_) => "rejected",
            Error::StoreUnavailable(_) => "store_unavailable",
            Error::NoFetcherRegistered { .. } => "no_fetcher_registered",
            Error::Database(_) => "database",
            Error::Serialization(_) => "serialization",
            Error::Config(_) => "config",
            Error::Internal(_) => "internal",
        }
    }

    /// HTTP status carried by the error, if it came from an upstream response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Upstream { status, .. } => Some(*status),
            Error::NotFound(_) => Some(404),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
