// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Role-gated access middleware.

use crate::auth::{Access, AccessGuard, AccessRequirement, RecoveryAction};
use crate::models::Role;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

/// Body returned when a request is not let through.
#[derive(Debug, Serialize)]
pub struct AccessRejection {
    pub error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login_path: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<Role>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<RecoveryAction>,
}

impl AccessRejection {
    fn new(error: &'static str) -> Self {
        Self {
            error,
            login_path: None,
            required: None,
            current: None,
            actions: Vec::new(),
        }
    }
}

/// Requires a signed-in user.
pub async fn require_signed_in(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    guard(&state, AccessRequirement::Any, request, next).await
}

pub async fn require_student(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    guard(&state, AccessRequirement::AtLeast(Role::Student), request, next).await
}

pub async fn require_teacher(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    guard(&state, AccessRequirement::AtLeast(Role::Teacher), request, next).await
}

pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    guard(&state, AccessRequirement::AtLeast(Role::Admin), request, next).await
}

/// Wait for the auth state to settle and apply `requirement`.
///
/// On success the settled `AuthState` is inserted as a request extension.
async fn guard(
    state: &AppState,
    requirement: AccessRequirement,
    mut request: Request,
    next: Next,
) -> Response {
    let guard = AccessGuard::new(state.auth.subscribe(), state.config.loading_backstop);

    match guard.check(&requirement).await {
        Access::Granted(auth) => {
            request.extensions_mut().insert(auth);
            next.run(request).await
        }
        Access::RedirectToLogin { login_path } => {
            let body = AccessRejection {
                login_path: Some(login_path),
                ..AccessRejection::new("unauthorized")
            };
            (StatusCode::UNAUTHORIZED, Json(body)).into_response()
        }
        Access::Denied { required, current } => {
            tracing::info!(required = %required, current = ?current, "Access denied");
            let body = AccessRejection {
                required: Some(required),
                current,
                ..AccessRejection::new("forbidden")
            };
            (StatusCode::FORBIDDEN, Json(body)).into_response()
        }
        Access::ConnectionIssue { actions } => connection_issue(actions),
    }
}

/// 503 for a state that did not settle in time, with the recovery offers.
pub fn connection_issue(actions: Vec<RecoveryAction>) -> Response {
    let body = AccessRejection {
        actions,
        ..AccessRejection::new("connection_issue")
    };
    (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
}
