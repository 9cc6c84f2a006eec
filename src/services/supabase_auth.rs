// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Supabase auth adapter implementing the `Authority` contract.
//!
//! Handles:
//! - OAuth authorize URLs for the login providers
//! - Session establishment from the OAuth callback tokens
//! - Token refresh when the access token is about to expire
//! - Broadcasting auth-state changes to subscribers

use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

use crate::db::postgrest::{check_response, check_response_json};
use crate::db::{PostgrestError, PostgrestErrorKind, SupabaseClient};
use crate::error::{AppError, Result};
use crate::models::{
    AuthChange, AuthEvent, Identity, OAuthProvider, Session, SessionTokens, SignInRedirect,
};
use crate::services::ports::{AuthSubscription, Authority, SessionExchange, Unsubscribe};
use crate::time_utils::from_unix_seconds;

/// Margin before token expiration when we proactively refresh (5 minutes).
const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Buffered auth-change events per subscriber.
const AUTH_EVENT_CAPACITY: usize = 16;

/// Audience Supabase stamps on user access tokens.
const AUTHENTICATED_AUDIENCE: &str = "authenticated";

/// Claims carried by a Supabase access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject (identity id)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    #[serde(default)]
    pub aud: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// Database role (`authenticated`), not the portal role
    #[serde(default)]
    pub role: Option<String>,
}

/// Verify an access token against the project JWT secret.
pub fn decode_access_token(token: &str, secret: &[u8]) -> Result<AccessTokenClaims> {
    let key = DecodingKey::from_secret(secret);
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[AUTHENTICATED_AUDIENCE]);

    decode::<AccessTokenClaims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!(error = %e, "Access token rejected");
            AppError::InvalidToken
        })
}

/// Token grant response from `/auth/v1/token`.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    expires_in: Option<i64>,
    user: Identity,
}

/// Supabase-backed authority.
pub struct SupabaseAuth {
    client: SupabaseClient,
    jwt_secret: Vec<u8>,
    /// Where the provider sends the browser after consent
    redirect_to: String,
    changes: broadcast::Sender<AuthChange>,
    subscribers: Arc<AtomicUsize>,
    /// Serializes token refreshes so one refresh token is spent once.
    refresh_lock: Mutex<()>,
}

impl SupabaseAuth {
    pub fn new(client: SupabaseClient, jwt_secret: &[u8], frontend_url: &str) -> Self {
        let (changes, _) = broadcast::channel(AUTH_EVENT_CAPACITY);
        Self {
            client,
            jwt_secret: jwt_secret.to_vec(),
            redirect_to: format!("{}/auth/callback", frontend_url.trim_end_matches('/')),
            changes,
            subscribers: Arc::new(AtomicUsize::new(0)),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.load(Ordering::SeqCst)
    }

    /// OAuth authorize URL for a provider.
    pub fn authorize_url(&self, provider: OAuthProvider) -> String {
        format!(
            "{}?provider={}&redirect_to={}",
            self.client.auth_url("authorize"),
            provider.as_str(),
            urlencoding::encode(&self.redirect_to)
        )
    }

    /// Fetch the account behind an access token.
    async fn fetch_user(&self, access_token: &str) -> Result<Identity> {
        let response = self
            .client
            .http()
            .get(self.client.auth_url("user"))
            .headers(self.client.headers(Some(access_token)))
            .send()
            .await
            .map_err(|e| AppError::AuthorityUnavailable(e.to_string()))?;

        check_response_json(response).await.map_err(authority_error)
    }

    /// Exchange the refresh token for a new session.
    async fn refresh(&self, session: &Session) -> Result<Session> {
        let response = self
            .client
            .http()
            .post(self.client.auth_url("token"))
            .headers(self.client.headers(None))
            .query(&[("grant_type", "refresh_token")])
            .json(&serde_json::json!({ "refresh_token": session.refresh_token }))
            .send()
            .await
            .map_err(|e| AppError::AuthorityUnavailable(e.to_string()))?;

        let grant: TokenResponse = check_response_json(response)
            .await
            .map_err(authority_error)?;

        let expires_at = grant
            .expires_at
            .or_else(|| grant.expires_in.map(|secs| Utc::now().timestamp() + secs))
            .and_then(from_unix_seconds)
            .ok_or_else(|| AppError::AuthorityUnavailable("Token grant without expiry".into()))?;

        Ok(Session {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            expires_at,
            user: grant.user,
        })
    }

    fn emit(&self, event: AuthEvent, session: Option<Session>) {
        // No subscribers is not an error
        let _ = self.changes.send(AuthChange { event, session });
    }
}

fn authority_error(err: PostgrestError) -> AppError {
    match err.kind() {
        PostgrestErrorKind::Unauthorized => AppError::InvalidToken,
        // Auth API reports a spent or revoked refresh token as 400
        _ if err.status == 400 => AppError::InvalidToken,
        _ => AppError::AuthorityUnavailable(err.to_string()),
    }
}

#[async_trait]
impl Authority for SupabaseAuth {
    async fn get_session(&self) -> Result<Option<Session>> {
        let margin = Duration::seconds(TOKEN_REFRESH_MARGIN_SECS);

        let Some(current) = self.client.current_session() else {
            return Ok(None);
        };
        if !current.expires_within(Utc::now(), margin) {
            return Ok(Some(current));
        }

        let _guard = self.refresh_lock.lock().await;

        // Another task may have refreshed while we were waiting.
        let Some(current) = self.client.current_session() else {
            return Ok(None);
        };
        if !current.expires_within(Utc::now(), margin) {
            return Ok(Some(current));
        }

        tracing::info!(user_id = %current.user.id, "Access token expiring, refreshing");
        match self.refresh(&current).await {
            Ok(session) => {
                self.client.store_session(Some(session.clone()));
                self.emit(AuthEvent::TokenRefreshed, Some(session.clone()));
                Ok(Some(session))
            }
            Err(AppError::InvalidToken) => {
                tracing::warn!(user_id = %current.user.id, "Refresh token rejected, signing out");
                self.client.store_session(None);
                self.emit(AuthEvent::SignedOut, None);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn get_current_user(&self) -> Result<Option<Identity>> {
        match self.get_session().await? {
            Some(session) => self.fetch_user(&session.access_token).await.map(Some),
            None => Ok(None),
        }
    }

    fn subscribe(&self) -> AuthSubscription {
        let live = self.subscribers.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(subscribers = live, "Auth change subscriber added");

        let subscribers = self.subscribers.clone();
        AuthSubscription {
            changes: self.changes.subscribe(),
            handle: Unsubscribe::new(move || {
                let left = subscribers.fetch_sub(1, Ordering::SeqCst) - 1;
                tracing::debug!(subscribers = left, "Auth change subscriber released");
            }),
        }
    }

    async fn sign_in_with_provider(&self, provider: OAuthProvider) -> Result<SignInRedirect> {
        let url = self.authorize_url(provider);
        tracing::info!(provider = provider.as_str(), "Starting OAuth flow");
        Ok(SignInRedirect { provider, url })
    }

    async fn sign_out(&self) -> Result<()> {
        let previous = self.client.current_session();
        self.client.store_session(None);
        self.emit(AuthEvent::SignedOut, None);

        let Some(previous) = previous else {
            return Ok(());
        };

        let response = self
            .client
            .http()
            .post(self.client.auth_url("logout"))
            .headers(self.client.headers(Some(&previous.access_token)))
            .send()
            .await
            .map_err(|e| AppError::AuthorityUnavailable(e.to_string()))?;

        check_response(response).await.map_err(authority_error)?;
        tracing::info!(user_id = %previous.user.id, "Signed out");
        Ok(())
    }
}

#[async_trait]
impl SessionExchange for SupabaseAuth {
    /// Adopt the tokens returned by the OAuth callback as the current session.
    async fn establish_session(&self, tokens: SessionTokens) -> Result<Session> {
        let claims = decode_access_token(&tokens.access_token, &self.jwt_secret)?;
        let user = self.fetch_user(&tokens.access_token).await?;

        if user.id != claims.sub {
            tracing::warn!(sub = %claims.sub, user = %user.id, "Token subject does not match user");
            return Err(AppError::InvalidToken);
        }

        let session = Session {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_at: from_unix_seconds(claims.exp as i64).ok_or(AppError::InvalidToken)?,
            user,
        };

        self.client.store_session(Some(session.clone()));
        tracing::info!(user_id = %session.user.id, "Session established");
        self.emit(AuthEvent::SignedIn, Some(session.clone()));
        Ok(session)
    }
}
