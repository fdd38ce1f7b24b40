// Error handling types for the API

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error};

use super::validation::ValidationResult;

/// API error types
///
/// Store operations return these directly; the HTTP boundary turns them into
/// `{ "ok": false, "errors": [...] }` bodies.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Validation Error: {}", .0.join(", "))]
    Validation(Vec<String>),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Not Found: {0}")]
    NotFound(String),
    #[error("Internal Server Error: {0}")]
    InternalServer(String),
    #[error("Database Error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(vec![message.into()])
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InternalServer(_) | ApiError::DatabaseError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Messages safe to show to the caller.
    pub fn messages(&self) -> Vec<String> {
        match self {
            ApiError::Validation(errors) => errors.clone(),
            ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::Conflict(msg)
            | ApiError::NotFound(msg) => vec![msg.clone()],
            ApiError::InternalServer(_) | ApiError::DatabaseError(_) => {
                vec!["Something went wrong. Please try again later.".to_string()]
            }
        }
    }
}

/// JSON error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub ok: bool,
    pub errors: Vec<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        match &self {
            ApiError::DatabaseError(e) => error!(error = %e, "Database error occurred"),
            ApiError::InternalServer(msg) => error!(error = %msg, "Internal error occurred"),
            _ => {}
        }

        let body = ErrorResponse {
            ok: false,
            errors: self.messages(),
        };

        (self.status(), Json(body)).into_response()
    }
}

/// Helper function to convert ValidationResult to ApiError
impl From<ValidationResult> for ApiError {
    fn from(result: ValidationResult) -> Self {
        if result.is_valid {
            ApiError::InternalServer(
                "Validation result was valid but converted to error".to_string(),
            )
        } else {
            let fields: Vec<&str> = result.errors.iter().map(|e| e.field.as_str()).collect();
            debug!(fields = ?fields, "Validation failed");
            ApiError::Validation(result.errors.into_iter().map(|e| e.message).collect())
        }
    }
}

/// Maps a UNIQUE constraint failure onto `Conflict`, anything else stays a database error.
pub fn map_unique_violation(e: sqlx::Error, message: &str) -> ApiError {
    match &e {
        sqlx::Error::Database(db) if db.message().contains("UNIQUE constraint failed") => {
            ApiError::Conflict(message.to_string())
        }
        _ => ApiError::DatabaseError(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::validation("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::Unauthorized("x".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ApiError::Forbidden("x".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::Conflict("x".into()).status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::DatabaseError(sqlx::Error::RowNotFound).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_database_errors_are_not_leaked() {
        let err = ApiError::DatabaseError(sqlx::Error::Protocol("secret table layout".into()));
        let messages = err.messages();
        assert_eq!(messages.len(), 1);
        assert!(!messages[0].contains("secret"));
    }

    #[test]
    fn test_validation_result_batches_all_errors() {
        let mut result = ValidationResult::new();
        result.add_error("title", "Title is required");
        result.add_error("price", "Price is required");

        match ApiError::from(result) {
            ApiError::Validation(errors) => {
                assert_eq!(errors, vec!["Title is required", "Price is required"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let response = ApiError::Conflict("Username already taken".into()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["ok"], false);
        assert_eq!(body["errors"][0], "Username already taken");
    }
}
