// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sign-in, callback, sign-out and auth-state routes.

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::auth::{AuthPhase, AuthState, Diagnostic, LOGIN_PATH, RECOVERY_ACTIONS};
use crate::error::{AppError, Result};
use crate::middleware::auth::connection_issue;
use crate::models::{Identity, OAuthProvider, Profile, Role, SessionTokens, SignInRedirect};
use crate::services::storage::RECENT_SEARCHES_KEY;
use crate::AppState;

/// Where users without a stored profile finish onboarding.
pub const PROFILE_SETUP_PATH: &str = "/profile-setup";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/state", get(get_state))
        .route("/auth/sign-in/{provider}", post(sign_in))
        .route("/auth/callback", post(auth_callback))
        .route("/auth/logout", post(logout))
}

// ─── State ───────────────────────────────────────────────────

/// Auth state as the frontend sees it.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AuthStateResponse {
    pub phase: AuthPhase,
    pub loading: bool,
    #[cfg_attr(feature = "binding-generation", ts(skip))]
    pub user: Option<Identity>,
    #[cfg_attr(feature = "binding-generation", ts(skip))]
    pub profile: Option<Profile>,
    pub role: Option<Role>,
    /// False while the role is a fallback rather than a stored value
    pub role_confirmed: bool,
    pub redirect_path: String,
    pub error: Option<String>,
    pub diagnostic: Option<Diagnostic>,
}

impl From<AuthState> for AuthStateResponse {
    fn from(state: AuthState) -> Self {
        Self {
            role_confirmed: state.role_confirmed(),
            redirect_path: state.redirect_path().to_string(),
            phase: state.phase,
            loading: state.loading,
            user: state.session.map(|s| s.user),
            profile: state.profile,
            role: state.role,
            error: state.error,
            diagnostic: state.diagnostic,
        }
    }
}

async fn get_state(State(state): State<Arc<AppState>>) -> Json<AuthStateResponse> {
    Json(state.auth.snapshot().into())
}

// ─── Sign-in ─────────────────────────────────────────────────

/// Start an OAuth sign-in; the frontend navigates to the returned URL.
async fn sign_in(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
) -> Result<Json<SignInRedirect>> {
    let provider: OAuthProvider = provider.parse()?;
    let redirect = state.auth.sign_in(provider).await?;
    Ok(Json(redirect))
}

/// Tokens (or an error) forwarded by the frontend from the OAuth redirect.
#[derive(Deserialize)]
pub struct CallbackPayload {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CallbackResponse {
    pub redirect_path: String,
}

/// OAuth callback - adopt the session and wait for its profile to settle.
///
/// Only states published after the session was handed over count, so an
/// earlier settlement for the same identity cannot answer for this sign-in.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CallbackPayload>,
) -> Result<Response> {
    if let Some(error) = payload.error {
        let description = payload.error_description.unwrap_or_default();
        tracing::warn!(error = %error, description = %description, "OAuth error from provider");
        return Ok(Json(CallbackResponse {
            redirect_path: format!("{}?error={}", LOGIN_PATH, urlencoding::encode(&error)),
        })
        .into_response());
    }

    let (Some(access_token), Some(refresh_token)) = (payload.access_token, payload.refresh_token)
    else {
        return Err(AppError::BadRequest(
            "Callback carries neither tokens nor an error".to_string(),
        ));
    };

    let since = state.auth.generation();
    let session = state
        .sessions
        .establish_session(SessionTokens {
            access_token,
            refresh_token,
        })
        .await?;
    let user_id = session.user.id;

    let settled = tokio::time::timeout(
        state.config.loading_backstop,
        state.auth.settled_after(since, |s| {
            s.session.as_ref().is_some_and(|current| current.user.id == user_id)
        }),
    )
    .await;

    let Ok(Some(settled)) = settled else {
        tracing::warn!(user_id = %user_id, "Auth state did not settle after sign-in");
        return Ok(connection_issue(RECOVERY_ACTIONS.to_vec()));
    };

    let redirect_path = if settled.profile.is_some() {
        settled.redirect_path()
    } else {
        PROFILE_SETUP_PATH
    };
    tracing::info!(user_id = %user_id, redirect_path, "Sign-in complete");

    Ok(Json(CallbackResponse {
        redirect_path: redirect_path.to_string(),
    })
    .into_response())
}

// ─── Sign-out ────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub signed_out: bool,
    /// Set when the remote sign-out failed; local state is cleared regardless
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_error: Option<String>,
}

/// Sign out and expire client-side cached artifacts.
async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> (CookieJar, Json<LogoutResponse>) {
    let remote = state.auth.sign_out();
    let jar = jar.remove(Cookie::build(RECENT_SEARCHES_KEY).path("/"));

    let remote_error = remote.await.err().map(|e| e.to_string());
    (
        jar,
        Json(LogoutResponse {
            signed_out: true,
            remote_error,
        }),
    )
}
