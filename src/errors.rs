use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Errors surfaced by the enrichment service.
///
/// Provider and model failures normally stay inside the pipeline as failed
/// payloads or fallback content. Only invalid input, missing records and
/// storage failures on the finalize path reach a caller.
#[derive(Debug)]
pub enum AppError {
    /// Postgres query or connection failure.
    Database(sqlx::Error),
    /// No record for the requested key.
    NotFound(String),
    /// Caller input rejected before any work started.
    BadRequest(String),
    /// A third-party data provider or the model API misbehaved.
    Upstream {
        service: String,
        message: String,
    },
    Internal(String),
    /// Error with a context message prepended.
    WithContext {
        source: Box<AppError>,
        context: String,
    },
}

impl AppError {
    pub fn upstream(service: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Upstream {
            service: service.into(),
            message: message.into(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            AppError::WithContext { source, .. } => source.status(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Database(e) => write!(f, "Database error: {}", e),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::Upstream { service, message } => write!(f, "{} error: {}", service, message),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::WithContext { source, context } => write!(f, "{}: {}", context, source),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Database(e) => Some(e),
            AppError::WithContext { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    /// Client errors keep their message; server-side detail is logged, not returned.
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::NotFound(msg) | AppError::BadRequest(msg) => msg.clone(),
            AppError::WithContext { source, .. } if source.status().is_client_error() => {
                source.to_string()
            }
            other => {
                tracing::error!("❌ Request failed: {}", other);
                if status == StatusCode::BAD_GATEWAY {
                    "Upstream service error".to_string()
                } else {
                    "Enrichment processing failed".to_string()
                }
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(format!("Serialization failed: {}", err))
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `AppError` type.
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError>;

    /// Add context lazily (only evaluated on error).
    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String;
}

impl<T, E: Into<AppError>> ResultExt<T> for Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e.into()),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e.into()),
            context: f(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_wraps_and_keeps_status() {
        let err: Result<(), AppError> = Err(AppError::BadRequest("bad email".to_string()));
        let wrapped = err.context("validating request").unwrap_err();
        assert_eq!(wrapped.to_string(), "validating request: Bad request: bad email");
        assert_eq!(wrapped.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_sqlx_errors_convert_with_context() {
        let err: Result<(), sqlx::Error> = Err(sqlx::Error::RowNotFound);
        let wrapped = err.with_context(|| "loading profile".to_string()).unwrap_err();
        assert!(wrapped.to_string().starts_with("loading profile: Database error"));
        assert_eq!(wrapped.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_upstream_maps_to_bad_gateway() {
        let err = AppError::upstream("Hunter", "returned status 503");
        assert_eq!(err.to_string(), "Hunter error: returned status 503");
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }
}
