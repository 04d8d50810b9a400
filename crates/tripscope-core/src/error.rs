//! Error types for TripScope

use thiserror::Error;

/// Result type alias using TripScope's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for TripScope operations
#[derive(Error, Debug)]
pub enum Error {
    /// Bad or missing caller input
    #[error("Validation error: {0}")]
    Validation(String),

    /// A time window that cannot be resolved
    #[error("Invalid time range: {0}")]
    InvalidRange(String),

    /// A custom time window wider than the allowed span
    #[error("Time range too large: {days} days requested, at most {max_days} allowed")]
    RangeTooLarge { days: i64, max_days: i64 },

    /// Entity lookup returned no hits
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Search backend call failed or answered with something unreadable
    #[error("Search backend error: {0}")]
    SearchBackend(String),

    /// Search backend did not answer in time
    #[error("Search timed out after {timeout_ms}ms")]
    SearchTimeout { timeout_ms: u64 },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a not found error
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an invalid range error
    pub fn invalid_range(msg: impl Into<String>) -> Self {
        Self::InvalidRange(msg.into())
    }

    /// Create a search backend error
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::SearchBackend(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Short machine-readable name of the error class
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::InvalidRange(_) => "invalid_range",
            Self::RangeTooLarge { .. } => "range_too_large",
            Self::NotFound { .. } => "not_found",
            Self::SearchBackend(_) => "search_backend",
            Self::SearchTimeout { .. } => "search_timeout",
            Self::Config(_) => "config",
            Self::Serialization(_) => "serialization",
            Self::Internal(_) => "internal",
        }
    }

    /// HTTP-equivalent status class for the boundary layer
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::InvalidRange(_) | Self::RangeTooLarge { .. } => 400,
            Self::NotFound { .. } => 404,
            Self::SearchBackend(_) => 502,
            Self::SearchTimeout { .. } => 504,
            Self::Config(_) | Self::Serialization(_) | Self::Internal(_) => 500,
        }
    }

    /// Whether a caller may reasonably retry the same request
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::SearchTimeout { .. })
    }

    /// Whether the error was caused by the caller's input
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::validation("size").status_code(), 400);
        assert_eq!(Error::invalid_range("custom").status_code(), 400);
        assert_eq!(
            Error::RangeTooLarge {
                days: 400,
                max_days: 365
            }
            .status_code(),
            400
        );
        assert_eq!(Error::not_found("Trip", "t1").status_code(), 404);
        assert_eq!(Error::backend("boom").status_code(), 502);
        assert_eq!(Error::SearchTimeout { timeout_ms: 30_000 }.status_code(), 504);
    }

    #[test]
    fn test_only_timeouts_are_retryable() {
        assert!(Error::SearchTimeout { timeout_ms: 1 }.is_retryable());
        assert!(!Error::backend("boom").is_retryable());
        assert!(!Error::validation("bad").is_retryable());
    }

    #[test]
    fn test_not_found_message() {
        let err = Error::not_found("Trip", "abc");
        assert_eq!(err.to_string(), "Trip not found: abc");
        assert!(err.is_client_error());
    }
}
