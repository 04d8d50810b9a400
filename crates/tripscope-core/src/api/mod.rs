//! Boundary layer
//!
//! Entry points never return `Err` across this boundary. Every call resolves to an
//! [`ApiResponse`] carrying either the payload or a described error.

pub mod handlers;

pub use handlers::AppState;

use serde::Serialize;
use serde_with::skip_serializing_none;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Error description carried by a failed response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiError {
    /// Human-readable description
    pub message: String,
    /// Stable error category
    pub kind: &'static str,
    /// HTTP-style status code
    pub status: u16,
    /// Whether retrying may succeed
    pub retryable: bool,
}

impl From<&Error> for ApiError {
    fn from(err: &Error) -> Self {
        Self {
            message: err.to_string(),
            kind: err.kind(),
            status: err.status_code(),
            retryable: err.is_retryable(),
        }
    }
}

/// Discriminated result of an entry point
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse<T> {
    /// Discriminant
    pub success: bool,
    /// Payload on success
    pub data: Option<T>,
    /// Description on failure
    pub error: Option<ApiError>,
}

impl<T> ApiResponse<T> {
    /// Successful response
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Failed response
    pub fn err(error: &Error) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    /// Wrap a service result, logging failures by severity
    pub fn from_result(operation: &str, result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) if e.is_client_error() => {
                debug!(operation, error = %e, "Request rejected");
                Self::err(&e)
            }
            Err(e) => {
                warn!(operation, kind = e.kind(), error = %e, "Request failed");
                Self::err(&e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_success_envelope() {
        let response = ApiResponse::from_result("fetch_trips", Ok(json!({"n": 1})));
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"success": true, "data": {"n": 1}})
        );
    }

    #[test]
    fn test_error_envelope() {
        let response: ApiResponse<()> =
            ApiResponse::from_result("fetch_trips", Err(Error::SearchTimeout { timeout_ms: 30_000 }));
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "success": false,
                "error": {
                    "message": "Search timed out after 30000ms",
                    "kind": "search_timeout",
                    "status": 504,
                    "retryable": true
                }
            })
        );

        let missing: ApiResponse<()> = ApiResponse::err(&Error::not_found("trip", "t9"));
        let error = missing.error.unwrap();
        assert_eq!(error.status, 404);
        assert!(!error.retryable);
    }
}
