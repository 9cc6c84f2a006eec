// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Collaborator contracts consumed by the session bootstrapper.
//!
//! Each trait is a port onto an external system; the Supabase adapters in
//! this module tree implement them, tests substitute scripted doubles.

use async_trait::async_trait;
use std::fmt;
use tokio::sync::broadcast;

use crate::error::Result;
use crate::models::{
    AuthChange, DashboardSnapshot, Identity, NewProfile, OAuthProvider, Profile, ProfileUpdate,
    Session, SessionMetadata, SessionTokens, SignInRedirect,
};

/// Handle that releases an auth-change subscription.
///
/// The release action runs exactly once: on `unsubscribe()` or on drop,
/// whichever comes first.
pub struct Unsubscribe {
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Unsubscribe {
    pub fn new(release: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// A handle with nothing to release.
    pub fn noop() -> Self {
        Self { release: None }
    }

    pub fn unsubscribe(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Unsubscribe {
    fn drop(&mut self) {
        self.release_once();
    }
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unsubscribe")
            .field("released", &self.release.is_none())
            .finish()
    }
}

/// Live subscription to auth-state changes.
pub struct AuthSubscription {
    pub changes: broadcast::Receiver<AuthChange>,
    pub handle: Unsubscribe,
}

/// The external identity/session provider.
#[async_trait]
pub trait Authority: Send + Sync {
    /// Current session, or `None` when signed out.
    async fn get_session(&self) -> Result<Option<Session>>;

    /// Raw account record for the current session.
    async fn get_current_user(&self) -> Result<Option<Identity>>;

    /// Subscribe to auth-state changes.
    fn subscribe(&self) -> AuthSubscription;

    /// Begin an OAuth sign-in; the client navigates to the returned URL.
    async fn sign_in_with_provider(&self, provider: OAuthProvider) -> Result<SignInRedirect>;

    async fn sign_out(&self) -> Result<()>;
}

/// Completes an OAuth redirect by adopting the tokens it carried.
#[async_trait]
pub trait SessionExchange: Send + Sync {
    async fn establish_session(&self, tokens: SessionTokens) -> Result<Session>;
}

/// Application profile records.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Fetch a profile; a missing row is `AppError::ProfileNotFound`.
    async fn get_by_id(&self, id: &str) -> Result<Profile>;

    /// Create a profile; a concurrent creator surfaces as `ProfileCreateConflict`.
    async fn create(&self, id: &str, defaults: &NewProfile) -> Result<Profile>;

    async fn upsert(&self, id: &str, partial: &ProfileUpdate) -> Result<Profile>;
}

/// Read-side dashboard aggregation (best effort).
#[async_trait]
pub trait DashboardAggregator: Send + Sync {
    async fn compute_snapshot(&self, id: &str) -> Result<DashboardSnapshot>;
}

/// Write-only session telemetry.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn record_session(&self, id: &str, metadata: &SessionMetadata) -> Result<()>;

    async fn touch_activity(&self, id: &str) -> Result<()>;
}

/// Achievement rules; must be idempotent.
#[async_trait]
pub trait AchievementEvaluator: Send + Sync {
    /// Award every newly earned achievement, returning the badges granted.
    async fn evaluate_and_award(&self, id: &str) -> Result<Vec<String>>;
}
