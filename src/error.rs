// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::time::Duration;

use crate::models::Role;

/// Application error type that converts to HTTP responses.
///
/// The profile-layer variants form the bootstrap taxonomy: only
/// `ProfileNotFound` triggers profile creation, every other profile error
/// degrades the session to the fallback role.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authority unavailable: {0}")]
    AuthorityUnavailable(String),

    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    #[error("Profile load timed out after {0:?}")]
    ProfileFetchTimeout(Duration),

    #[error("Profile fetch failed: {0}")]
    ProfileFetchError(String),

    #[error("Profile already exists: {0}")]
    ProfileCreateConflict(String),

    #[error("Profile creation failed: {0}")]
    ProfileCreateError(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Requires {required} role")]
    Forbidden { required: Role },

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// True for the one profile failure that means "new user".
    pub fn is_profile_not_found(&self) -> bool {
        matches!(self, AppError::ProfileNotFound(_))
    }

    /// True when the error came from a concurrent creator winning the race.
    pub fn is_create_conflict(&self) -> bool {
        matches!(self, AppError::ProfileCreateConflict(_))
    }

    /// Short machine-readable code, shared by HTTP bodies and diagnostics.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::AuthorityUnavailable(_) => "authority_unavailable",
            AppError::ProfileNotFound(_) => "profile_not_found",
            AppError::ProfileFetchTimeout(_) => "profile_fetch_timeout",
            AppError::ProfileFetchError(_) => "profile_fetch_error",
            AppError::ProfileCreateConflict(_) => "profile_create_conflict",
            AppError::ProfileCreateError(_) => "profile_create_error",
            AppError::Unauthorized => "unauthorized",
            AppError::InvalidToken => "invalid_token",
            AppError::Forbidden { .. } => "forbidden",
            AppError::BadRequest(_) => "bad_request",
            AppError::Validation(_) => "validation_error",
            AppError::Database(_) => "database_error",
            AppError::Internal(_) => "internal_error",
        }
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, details) = match &self {
            AppError::Unauthorized | AppError::InvalidToken => (StatusCode::UNAUTHORIZED, None),
            AppError::Forbidden { .. } => (StatusCode::FORBIDDEN, Some(self.to_string())),
            AppError::ProfileNotFound(msg) => (StatusCode::NOT_FOUND, Some(msg.clone())),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, Some(msg.clone())),
            AppError::Validation(errors) => {
                (StatusCode::UNPROCESSABLE_ENTITY, Some(errors.to_string()))
            }
            AppError::ProfileCreateConflict(msg) => (StatusCode::CONFLICT, Some(msg.clone())),
            AppError::AuthorityUnavailable(msg) => {
                tracing::warn!(error = %msg, "Authority unavailable");
                (StatusCode::BAD_GATEWAY, None)
            }
            AppError::ProfileFetchTimeout(_) => (StatusCode::GATEWAY_TIMEOUT, None),
            AppError::ProfileFetchError(msg)
            | AppError::ProfileCreateError(msg)
            | AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, None)
            }
        };

        let body = ErrorResponse {
            error: self.code().to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
