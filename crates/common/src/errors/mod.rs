//! Error types shared by the ingestion pipeline and the query API.
//!
//! A single closed taxonomy crosses every component boundary: Planner, Executor, and HTTP
//! handlers all report failures as `AppError`, which maps deterministically to a stable
//! `ErrorCode` and an HTTP status.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Closed, stable error code enumeration (API contract; do not renumber or rename variants).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidParameter,
    PaperNotFound,
    ResourceNotFound,
    ForbiddenSql,
    EmbeddingServiceUnavailable,
    QueryTimeout,
    DatabaseUnavailable,
    InternalPlanError,
    InternalError,
}

/// Application error types. Every fallible path in the query engine funnels into this enum.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("invalid parameter {parameter}: {reason}")]
    InvalidParameter { parameter: String, reason: String },

    #[error("paper not found: {paper_id}")]
    PaperNotFound { paper_id: String },

    #[error("unknown {resource_type}: {id}")]
    ResourceNotFound { resource_type: String, id: String },

    #[error("sql_filter rejected: {reason}")]
    ForbiddenSql { reason: String },

    #[error("embedding service unavailable: {message}")]
    EmbeddingServiceUnavailable { message: String },

    #[error("query exceeded its deadline")]
    QueryTimeout,

    #[error("database unavailable: {message}")]
    DatabaseUnavailable { message: String },

    #[error("planner self-check failed: {message}")]
    InternalPlanError { message: String },

    #[error("internal error: {message}")]
    InternalError { message: String },
}

impl AppError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::InvalidParameter { .. } => ErrorCode::InvalidParameter,
            AppError::PaperNotFound { .. } => ErrorCode::PaperNotFound,
            AppError::ResourceNotFound { .. } => ErrorCode::ResourceNotFound,
            AppError::ForbiddenSql { .. } => ErrorCode::ForbiddenSql,
            AppError::EmbeddingServiceUnavailable { .. } => ErrorCode::EmbeddingServiceUnavailable,
            AppError::QueryTimeout => ErrorCode::QueryTimeout,
            AppError::DatabaseUnavailable { .. } => ErrorCode::DatabaseUnavailable,
            AppError::InternalPlanError { .. } => ErrorCode::InternalPlanError,
            AppError::InternalError { .. } => ErrorCode::InternalError,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidParameter { .. } | AppError::ForbiddenSql { .. } => {
                StatusCode::BAD_REQUEST
            }
            AppError::PaperNotFound { .. } | AppError::ResourceNotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            AppError::QueryTimeout => StatusCode::GATEWAY_TIMEOUT,
            AppError::DatabaseUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AppError::EmbeddingServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AppError::InternalPlanError { .. } | AppError::InternalError { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Attach a request id, producing the wire error payload directly.
    pub fn into_response_with_request_id(self, request_id: String) -> Response {
        let status = self.status_code();
        let error_code = self.code();
        let message = self.to_string();

        if self.is_server_error() {
            tracing::error!(error = %message, code = ?error_code, request_id = %request_id, "server error");
        } else {
            tracing::warn!(error = %message, code = ?error_code, request_id = %request_id, "client error");
        }

        let body = ErrorPayload {
            error_code,
            message,
            detail: None,
            request_id,
        };
        (status, Json(body)).into_response()
    }
}

/// Wire error payload, per the external-interfaces contract.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub error_code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub request_id: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // No request id available at this call site; handlers that have one on hand should
        // prefer `into_response_with_request_id`. This impl exists so `?` works from contexts
        // (e.g. tests) with no request context at all.
        self.into_response_with_request_id(uuid::Uuid::new_v4().to_string())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                AppError::DatabaseUnavailable {
                    message: err.to_string(),
                }
            }
            _ => AppError::InternalError {
                message: format!("database error: {err}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_mapping() {
        let err = AppError::PaperNotFound {
            paper_id: "abc".into(),
        };
        assert_eq!(err.code(), ErrorCode::PaperNotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert!(err.is_client_error());
    }

    #[test]
    fn plan_error_is_server_error() {
        let err = AppError::InternalPlanError {
            message: "placeholder count mismatch".into(),
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.is_server_error());
    }

    #[test]
    fn forbidden_sql_is_bad_request() {
        let err = AppError::ForbiddenSql {
            reason: "DROP keyword".into(),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn error_code_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&ErrorCode::ForbiddenSql).unwrap();
        assert_eq!(json, "\"FORBIDDEN_SQL\"");
    }
}
