// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for rp-server.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rp_database::DatabaseError;
use serde_json::json;
use thiserror::Error;

/// Server errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration loading failed.
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Document store operation failed.
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Connecting to PostgreSQL failed.
    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),

    /// Applying migrations failed.
    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

/// Result type using the server Error.
pub type Result<T> = std::result::Result<T, Error>;

/// An error rendered to API callers as `{"error": {"code", "message"}}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "ResourceNotFound", message)
    }

    pub fn request_not_allowed(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "RequestNotAllowed", message)
    }

    pub fn invalid_subscription_state(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "InvalidSubscriptionState", message)
    }

    pub fn draining() -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "ServiceUnavailable",
            "The service is shutting down.",
        )
    }

    pub fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "InternalServerError",
            "Internal server error.",
        )
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match &err {
            DatabaseError::NotFound { .. } => Self::not_found(err.to_string()),
            DatabaseError::Validation { .. } => {
                Self::new(StatusCode::BAD_REQUEST, "InvalidParameter", err.to_string())
            }
            DatabaseError::Rejected { reason } => {
                Self::new(StatusCode::BAD_REQUEST, "InvalidRequestContent", reason.clone())
            }
            DatabaseError::PreconditionFailed { .. } => {
                Self::new(StatusCode::PRECONDITION_FAILED, "PreconditionFailed", err.to_string())
            }
            DatabaseError::AlreadyExists { .. } | DatabaseError::InvalidTransition { .. } => {
                Self::new(StatusCode::CONFLICT, "Conflict", err.to_string())
            }
            _ => {
                tracing::error!(error = %err, code = err.error_code(), "Request failed");
                Self::internal()
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": {
                "code": self.code,
                "message": self.message,
            }
        });
        (self.status, Json(body)).into_response()
    }
}
