use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use google::GoogleError;
use sea_orm::{DbErr, SqlErr};
use thiserror::Error;
use tracing::{error, warn};

use crate::schemas::ErrorResponse;

/// Any failure a handler can report to the client.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{message}")]
    Conflict { code: &'static str, message: String },

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Upstream(#[from] GoogleError),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("{0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn conflict(code: &'static str, message: impl Into<String>) -> Self {
        ApiError::Conflict {
            code,
            message: message.into(),
        }
    }

    /// A unique-constraint violation becomes a 409 with `code`; anything else
    /// stays a database error.
    pub fn unique_violation(err: DbErr, code: &'static str, message: impl Into<String>) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => ApiError::conflict(code, message),
            _ => ApiError::Database(err),
        }
    }

    fn parts(&self) -> (StatusCode, &'static str, String, String) {
        match self {
            ApiError::Validation(detail) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                "Invalid request".to_string(),
                detail.clone(),
            ),
            ApiError::Conflict { code, message } => {
                (StatusCode::CONFLICT, *code, message.clone(), message.clone())
            }
            ApiError::Unauthorized(detail) => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                detail.clone(),
                detail.clone(),
            ),
            ApiError::Forbidden(detail) => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                detail.clone(),
                detail.clone(),
            ),
            ApiError::NotFound(detail) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                detail.clone(),
                detail.clone(),
            ),
            ApiError::Upstream(GoogleError::ReauthenticationRequired) => (
                StatusCode::UNAUTHORIZED,
                "REAUTHENTICATION_REQUIRED",
                GoogleError::ReauthenticationRequired.to_string(),
                "The Google account must be connected again".to_string(),
            ),
            ApiError::Upstream(e @ (GoogleError::Unauthorized | GoogleError::InvalidGrant(_))) => (
                StatusCode::UNAUTHORIZED,
                "GOOGLE_UNAUTHORIZED",
                "Google rejected the stored credentials".to_string(),
                e.to_string(),
            ),
            ApiError::Upstream(e @ GoogleError::InvalidState(_)) => (
                StatusCode::BAD_REQUEST,
                "INVALID_OAUTH_STATE",
                "Invalid OAuth state".to_string(),
                e.to_string(),
            ),
            ApiError::Upstream(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "UPSTREAM_ERROR",
                "Google request failed".to_string(),
                e.to_string(),
            ),
            ApiError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                "Internal server error".to_string(),
                "A database error occurred".to_string(),
            ),
            ApiError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Internal server error".to_string(),
                "An unexpected error occurred".to_string(),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, error) = self.parts();
        if status.is_server_error() {
            error!("Request failed with {}: {}", status, self);
        } else {
            warn!("Request rejected with {}: {}", status, self);
        }

        let body = ErrorResponse {
            message,
            error,
            code: code.to_string(),
            success: false,
        };
        (status, Json(body)).into_response()
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::Validation(errors.to_string().replace('\n', ", "))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<crate::hasher::HashError> for ApiError {
    fn from(e: crate::hasher::HashError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ApiError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (ApiError::conflict("EMAIL_ALREADY_EXISTS", "taken"), StatusCode::CONFLICT),
            (ApiError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (ApiError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (ApiError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (
                ApiError::Upstream(GoogleError::ReauthenticationRequired),
                StatusCode::UNAUTHORIZED,
            ),
            (
                ApiError::Upstream(GoogleError::Api {
                    status: 403,
                    detail: "insufficient scope".into(),
                }),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (ApiError::Database(DbErr::Custom("boom".into())), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, status) in cases {
            assert_eq!(error.parts().0, status);
        }
    }

    #[test]
    fn test_reauthentication_has_distinct_code() {
        let (_, code, _, _) = ApiError::Upstream(GoogleError::ReauthenticationRequired).parts();
        assert_eq!(code, "REAUTHENTICATION_REQUIRED");
        let (_, code, _, _) = ApiError::Upstream(GoogleError::Unauthorized).parts();
        assert_ne!(code, "REAUTHENTICATION_REQUIRED");
    }

    #[test]
    fn test_upstream_detail_is_attached() {
        let (_, _, _, error) = ApiError::Upstream(GoogleError::Api {
            status: 400,
            detail: "Invalid To header".into(),
        })
        .parts();
        assert!(error.contains("Invalid To header"));
    }
}
