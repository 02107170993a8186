use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::{DbErr, SqlErr};
use serde_json::json;
use thiserror::Error;

pub type AccountResult<T> = Result<T, AccountError>;

/// Errors returned by the account repository.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Username is already taken")]
    DuplicateUsername,

    #[error("Email is already registered")]
    DuplicateEmail,

    #[error("Account not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl AccountError {
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound(key.into())
    }

    /// Maps a failed insert onto the duplicate errors when the store rejected it
    /// for a unique column.
    #[must_use]
    pub fn from_insert(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) if detail.contains("username") => {
                Self::DuplicateUsername
            }
            Some(SqlErr::UniqueConstraintViolation(detail)) if detail.contains("email") => {
                Self::DuplicateEmail
            }
            _ => Self::Database(err),
        }
    }

    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::DuplicateUsername => StatusCode::BAD_REQUEST,
            Self::DuplicateEmail => StatusCode::CONFLICT,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

impl IntoResponse for AccountError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            Self::Database(err) => {
                tracing::error!("Database error: {}", err);
                "A database error occurred".to_string()
            }
            other => other.to_string(),
        };

        let body = json!({
            "success": false,
            "error": message,
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[test]
    fn test_duplicate_username_is_a_bad_request() {
        let err = AccountError::DuplicateUsername;
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.is_client_error());
        assert_eq!(err.to_string(), "Username is already taken");
    }

    #[test]
    fn test_database_errors_are_server_errors() {
        let err = AccountError::from(DbErr::Custom("connection reset".to_string()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_from_insert_keeps_unrelated_errors() {
        let err = AccountError::from_insert(DbErr::Custom("disk full".to_string()));
        assert!(matches!(err, AccountError::Database(_)));
    }

    #[tokio::test]
    async fn test_response_hides_database_details() {
        let response =
            AccountError::Database(DbErr::Custom("secret dsn".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "A database error occurred");
    }

    #[tokio::test]
    async fn test_response_carries_not_found_message() {
        let response = AccountError::not_found("ghost@example.com").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Account not found: ghost@example.com");
    }
}
