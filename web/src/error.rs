//! Error types for web handlers.
//!
//! [`AppError`] bridges allocation errors and HTTP responses. Every error body has the
//! same shape so clients can automate retry decisions:
//!
//! ```json
//! { "success": false, "code": "CONFLICT_EXHAUSTED", "message": "...", "retryable": true }
//! ```

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use seqalloc_core::error::{AllocationError, ValidationError};
use serde::Serialize;
use std::fmt;

/// Seconds a client should wait before retrying a transient failure.
const RETRY_AFTER_SECS: u64 = 1;

/// Application error type for web handlers.
///
/// Implements Axum's `IntoResponse`, so handlers can return `Result<_, AppError>` and
/// use `?` on allocation results.
#[derive(Debug)]
pub struct AppError {
    /// HTTP status code
    status: StatusCode,
    /// Error message (user-facing)
    message: String,
    /// Error code (for client error handling)
    code: &'static str,
    /// Whether the same request may succeed if sent again
    retryable: bool,
    /// Internal error (for logging, not exposed to client)
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub const fn new(
        status: StatusCode,
        message: String,
        code: &'static str,
        retryable: bool,
    ) -> Self {
        Self {
            status,
            message,
            code,
            retryable,
            source: None,
        }
    }

    /// Attach the underlying error for logging.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// Create a 422 Unprocessable Entity error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            message.into(),
            "VALIDATION_ERROR",
            false,
        )
    }

    /// Create a 404 Not Found error.
    #[must_use]
    pub fn not_found(path: impl fmt::Display) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            format!("No route for {path}"),
            "NOT_FOUND",
            false,
        )
    }

    /// Create a 503 error for contention that outlasted the retry budget.
    #[must_use]
    pub fn conflict_exhausted(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            message.into(),
            "CONFLICT_EXHAUSTED",
            true,
        )
    }

    /// Create a 503 error for an unreachable counter store.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            message.into(),
            "STORE_UNAVAILABLE",
            true,
        )
    }

    /// Create a 500 Internal Server Error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            message.into(),
            "INTERNAL_SERVER_ERROR",
            false,
        )
    }

    /// HTTP status code of this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }

    /// Whether the request may succeed if sent again.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.retryable
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    success: bool,
    code: &'static str,
    message: String,
    retryable: bool,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            if let Some(source) = &self.source {
                tracing::error!(
                    status = %self.status,
                    code = self.code,
                    message = %self.message,
                    error = %source,
                    "Request failed"
                );
            } else {
                tracing::error!(
                    status = %self.status,
                    code = self.code,
                    message = %self.message,
                    "Request failed"
                );
            }
        } else {
            tracing::debug!(status = %self.status, code = self.code, message = %self.message, "Request rejected");
        }

        let status = self.status;
        let retryable = self.retryable;
        let body = ErrorResponse {
            success: false,
            code: self.code,
            message: self.message,
            retryable,
        };

        let mut response = (status, Json(body)).into_response();
        if retryable {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(RETRY_AFTER_SECS));
        }
        response
    }
}

impl From<AllocationError> for AppError {
    fn from(err: AllocationError) -> Self {
        match err {
            AllocationError::Validation(validation) => validation.into(),
            AllocationError::ConflictExhausted { .. } => {
                Self::conflict_exhausted("Identifier allocation is contended, retry shortly")
                    .with_source(err.into())
            }
            AllocationError::StoreUnavailable(_) => {
                Self::unavailable("Counter store is unavailable").with_source(err.into())
            }
            AllocationError::CounterOverflow { .. } => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                err.to_string(),
                "COUNTER_OVERFLOW",
                false,
            ),
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        Self::validation(err.to_string())
    }
}

/// Convert `anyhow::Error` to `AppError`.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal("An internal error occurred").with_source(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seqalloc_core::identifier::IdentifierKind;
    use seqalloc_core::namespace::Namespace;

    #[test]
    fn test_error_display() {
        let err = AppError::validation("scopeCode is required");
        assert_eq!(err.to_string(), "[VALIDATION_ERROR] scopeCode is required");
    }

    #[test]
    fn test_validation_maps_to_422() {
        let err = AppError::from(AllocationError::from(ValidationError::MissingScope {
            kind: IdentifierKind::Driver,
        }));
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_transient_failures_map_to_503() {
        let exhausted = AppError::from(AllocationError::ConflictExhausted {
            namespace: Namespace::new("adminId"),
            attempts: 5,
        });
        assert_eq!(exhausted.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(exhausted.code(), "CONFLICT_EXHAUSTED");
        assert!(exhausted.is_retryable());

        let unavailable = AppError::from(AllocationError::StoreUnavailable("down".to_string()));
        assert_eq!(unavailable.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(unavailable.code(), "STORE_UNAVAILABLE");
    }

    #[test]
    fn test_overflow_maps_to_500() {
        let err = AppError::from(AllocationError::CounterOverflow {
            namespace: Namespace::new("adminId"),
        });
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), "COUNTER_OVERFLOW");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_retry_after_only_on_retryable() {
        let response = AppError::unavailable("down").into_response();
        assert_eq!(response.headers().get(header::RETRY_AFTER).map(HeaderValue::as_bytes), Some(&b"1"[..]));

        let response = AppError::validation("bad").into_response();
        assert!(response.headers().get(header::RETRY_AFTER).is_none());
    }
}
