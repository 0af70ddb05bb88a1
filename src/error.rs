//! API error type

use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not found")]
    NotFound,

    #[error("authentication required")]
    Unauthorized,

    #[error("you do not have permission to perform this action")]
    Forbidden,

    #[error("{0}")]
    Validation(String),

    #[error("validation failed")]
    Invalid(#[from] validator::ValidationErrors),

    #[error("{0}")]
    DeleteBlocked(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::NotFound => (StatusCode::NOT_FOUND, json!({"error": self.to_string()})),
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, json!({"error": self.to_string()})),
            Self::Forbidden => (StatusCode::FORBIDDEN, json!({"error": self.to_string()})),
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, json!({"error": msg})),
            Self::Invalid(errors) => {
                (StatusCode::BAD_REQUEST, json!({"error": "validation failed", "details": errors}))
            }
            Self::DeleteBlocked(msg) => (StatusCode::METHOD_NOT_ALLOWED, json!({"error": msg})),
            Self::Database(sqlx::Error::RowNotFound) => {
                (StatusCode::NOT_FOUND, json!({"error": "not found"}))
            }
            Self::Database(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => {
                (StatusCode::BAD_REQUEST, json!({"error": "referenced record does not exist"}))
            }
            Self::Database(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                (StatusCode::CONFLICT, json!({"error": "record already exists"}))
            }
            Self::Database(e) => {
                tracing::error!("database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, json!({"error": "internal server error"}))
            }
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(ApiError::NotFound.into_response().status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Unauthorized.into_response().status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Forbidden.into_response().status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::Validation("bad".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::DeleteBlocked("in use".into()).into_response().status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
    }

    #[test]
    fn row_not_found_maps_to_404() {
        let err = ApiError::Database(sqlx::Error::RowNotFound);
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }
}
