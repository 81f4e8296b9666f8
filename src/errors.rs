use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Request-level and startup errors.
///
/// Probe failures never show up here; they are folded into the record as
/// degraded `ProbeResult`s.
#[derive(Debug, Clone)]
pub enum OsintError {
    /// Input could not be parsed into a valid number.
    InvalidNumber(String),
    /// Malformed configuration (fatal at startup).
    Configuration(String),
    /// Result cache storage failed.
    CacheUnavailable(String),
    /// Malformed request payload.
    BadRequest(String),
    /// Broken internal precondition.
    Internal(String),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<OsintError>,
        /// Additional context message.
        context: String,
    },
}

impl fmt::Display for OsintError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OsintError::InvalidNumber(msg) => write!(f, "Invalid number: {}", msg),
            OsintError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            OsintError::CacheUnavailable(msg) => write!(f, "Cache unavailable: {}", msg),
            OsintError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            OsintError::Internal(msg) => write!(f, "Internal error: {}", msg),
            OsintError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl std::error::Error for OsintError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            OsintError::WithContext { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl IntoResponse for OsintError {
    /// Maps each variant to an HTTP status and JSON body.
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            OsintError::InvalidNumber(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            OsintError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            OsintError::Configuration(msg) => {
                tracing::error!("Configuration error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Configuration error".to_string(),
                )
            }
            OsintError::CacheUnavailable(msg) => {
                tracing::error!("Cache unavailable: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Result cache unavailable".to_string(),
                )
            }
            OsintError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            OsintError::WithContext { source, context } => {
                tracing::error!("Error with context: {} -> {}", context, source);
                return (**source).clone().into_response();
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for OsintError {
    fn from(err: sqlx::Error) -> Self {
        OsintError::CacheUnavailable(err.to_string())
    }
}

impl From<reqwest::Error> for OsintError {
    fn from(err: reqwest::Error) -> Self {
        OsintError::Configuration(format!("HTTP client error: {}", err))
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `OsintError` type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T, OsintError>;

    /// Add context lazily (only evaluated on error).
    fn with_context<F>(self, f: F) -> Result<T, OsintError>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T, OsintError> {
    fn context(self, context: impl Into<String>) -> Result<T, OsintError> {
        self.map_err(|e| OsintError::WithContext {
            source: Box::new(e),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, OsintError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| OsintError::WithContext {
            source: Box::new(e),
            context: f(),
        })
    }
}

/// Extension for sqlx::Error to add context
impl<T> ResultExt<T> for Result<T, sqlx::Error> {
    fn context(self, context: impl Into<String>) -> Result<T, OsintError> {
        self.map_err(|e| OsintError::WithContext {
            source: Box::new(OsintError::from(e)),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, OsintError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| OsintError::WithContext {
            source: Box::new(OsintError::from(e)),
            context: f(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_wraps_and_displays_chain() {
        let err: Result<(), OsintError> =
            Err(OsintError::CacheUnavailable("disk full".to_string()));
        let wrapped = err.context("writing probe result").unwrap_err();
        assert_eq!(
            wrapped.to_string(),
            "writing probe result: Cache unavailable: disk full"
        );
        assert!(std::error::Error::source(&wrapped).is_some());
    }

    #[test]
    fn invalid_number_is_bad_request() {
        let response = OsintError::InvalidNumber("nope".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn nested_context_keeps_inner_status() {
        let err = OsintError::WithContext {
            source: Box::new(OsintError::CacheUnavailable("locked".to_string())),
            context: "clearing cache".to_string(),
        };
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
