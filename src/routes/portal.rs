// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Role portals, each behind its own access guard.

use crate::auth::AuthState;
use crate::middleware::{require_admin, require_signed_in, require_student, require_teacher};
use crate::models::Role;
use crate::AppState;
use axum::{middleware, response::Redirect, routing::get, Extension, Json, Router};
use serde::Serialize;
use std::sync::Arc;

pub fn routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let landing = Router::new()
        .route("/portal", get(portal_landing))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_signed_in));
    let student = Router::new()
        .route("/portal/student", get(portal_page))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_student));
    let teacher = Router::new()
        .route("/portal/teacher", get(portal_page))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_teacher));
    let admin = Router::new()
        .route("/portal/admin", get(portal_page))
        .route_layer(middleware::from_fn_with_state(state, require_admin));

    landing.merge(student).merge(teacher).merge(admin)
}

/// Send the user to the portal for their role.
async fn portal_landing(Extension(auth): Extension<AuthState>) -> Redirect {
    Redirect::temporary(&format!("/portal{}", auth.redirect_path()))
}

#[derive(Serialize)]
pub struct PortalResponse {
    pub role: Role,
    pub display_name: Option<String>,
    pub role_confirmed: bool,
    pub dashboard_ready: bool,
}

async fn portal_page(Extension(auth): Extension<AuthState>) -> Json<PortalResponse> {
    Json(PortalResponse {
        role: auth.effective_role(),
        display_name: auth.profile.as_ref().and_then(|p| p.display_name()),
        role_confirmed: auth.role_confirmed(),
        dashboard_ready: auth.dashboard.is_some(),
    })
}
