// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for signed-in users.

use crate::auth::{AuthState, Permissions};
use crate::error::{AppError, Result};
use crate::models::{DashboardSnapshot, Profile, ProfileUpdate};
use crate::AppState;
use axum::{
    extract::State,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// API routes (require a signed-in user).
/// The access middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/profile", get(get_profile).patch(update_profile))
        .route("/api/dashboard/refresh", post(refresh_dashboard))
        .route("/api/permissions", get(get_permissions))
}

// ─── Profile ─────────────────────────────────────────────────

/// Current user's stored profile.
///
/// Users running on the fallback role have no stored profile yet.
async fn get_profile(Extension(auth): Extension<AuthState>) -> Result<Json<Profile>> {
    let user_id = auth
        .session
        .as_ref()
        .map(|s| s.user.id.clone())
        .unwrap_or_default();
    auth.profile
        .map(Json)
        .ok_or(AppError::ProfileNotFound(user_id))
}

/// Apply a partial profile edit.
async fn update_profile(
    State(state): State<Arc<AppState>>,
    Json(partial): Json<ProfileUpdate>,
) -> Result<Json<Profile>> {
    if partial.is_empty() {
        return Err(AppError::BadRequest("No profile fields to update".to_string()));
    }
    let profile = state.auth.update_profile(partial).await?;
    Ok(Json(profile))
}

// ─── Dashboard ───────────────────────────────────────────────

#[derive(Serialize)]
pub struct DashboardResponse {
    pub dashboard: Option<DashboardSnapshot>,
}

/// Recompute the dashboard snapshot now.
async fn refresh_dashboard(State(state): State<Arc<AppState>>) -> Result<Json<DashboardResponse>> {
    state.auth.refresh_dashboard().await?;
    Ok(Json(DashboardResponse {
        dashboard: state.auth.dashboard(),
    }))
}

// ─── Permissions ─────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PermissionsResponse {
    #[serde(flatten)]
    #[cfg_attr(feature = "binding-generation", ts(flatten))]
    pub permissions: Permissions,
    pub redirect_path: String,
}

async fn get_permissions(Extension(auth): Extension<AuthState>) -> Json<PermissionsResponse> {
    Json(PermissionsResponse {
        permissions: auth.permissions(),
        redirect_path: auth.redirect_path().to_string(),
    })
}
