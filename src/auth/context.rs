// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session/profile bootstrapper.
//!
//! One `AuthContext` is built at the application root and shared by
//! reference. It follows the authority's auth-state changes, resolves the
//! profile for every new session and publishes a consistent `AuthState`
//! through a watch channel that consumers subscribe to.
//!
//! Every state-changing sequence takes a generation number under the state
//! lock. Writes from a sequence are applied only while its generation is
//! current and the context is alive, so a slow, stale load can never
//! overwrite a newer resolution and nothing is written after `unmount`.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use validator::Validate;

use crate::auth::loader::{resolve_profile, Resolution};
use crate::auth::state::{AuthPhase, AuthState, Permissions};
use crate::config::DEFAULT_PROFILE_FETCH_TIMEOUT_SECS;
use crate::error::{AppError, Result};
use crate::models::{
    redirect_path_for, AuthChange, DashboardSnapshot, OAuthProvider, Profile, ProfileUpdate,
    Role, Session, SessionMetadata, SignInRedirect,
};
use crate::services::background::BackgroundTasks;
use crate::services::ports::{
    AchievementEvaluator, AuthSubscription, Authority, DashboardAggregator, ProfileStore,
    TelemetrySink, Unsubscribe,
};
use crate::services::storage::{clear_signed_out_artifacts, LocalStorage};

/// External collaborators of the bootstrapper.
#[derive(Clone)]
pub struct AuthServices {
    pub authority: Arc<dyn Authority>,
    pub profiles: Arc<dyn ProfileStore>,
    pub dashboard: Arc<dyn DashboardAggregator>,
    pub telemetry: Arc<dyn TelemetrySink>,
    pub achievements: Arc<dyn AchievementEvaluator>,
    pub storage: Arc<dyn LocalStorage>,
}

/// Tunables for the bootstrap sequence.
#[derive(Debug, Clone)]
pub struct BootstrapSettings {
    /// Upper bound on the profile fetch
    pub profile_fetch_timeout: Duration,
    /// Recorded with each session telemetry row
    pub device_info: String,
}

impl Default for BootstrapSettings {
    fn default() -> Self {
        Self {
            profile_fetch_timeout: Duration::from_secs(DEFAULT_PROFILE_FETCH_TIMEOUT_SECS),
            device_info: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"))
                .to_string(),
        }
    }
}

/// Shared handle to the bootstrapper.
#[derive(Clone)]
pub struct AuthContext {
    inner: Arc<Inner>,
}

struct Inner {
    services: AuthServices,
    settings: BootstrapSettings,
    state: watch::Sender<AuthState>,
    generation: AtomicU64,
    alive: AtomicBool,
    mounted: AtomicBool,
    background: BackgroundTasks,
    subscription: Mutex<Option<Unsubscribe>>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl AuthContext {
    pub fn new(services: AuthServices, settings: BootstrapSettings) -> Self {
        let (state, _) = watch::channel(AuthState::default());
        Self {
            inner: Arc::new(Inner {
                services,
                settings,
                state,
                generation: AtomicU64::new(0),
                alive: AtomicBool::new(true),
                mounted: AtomicBool::new(false),
                background: BackgroundTasks::new(),
                subscription: Mutex::new(None),
                listener: Mutex::new(None),
            }),
        }
    }

    // ─── Lifecycle ───────────────────────────────────────────────

    /// Start following the authority: subscribe to changes and fetch the
    /// current session. Only the first call has an effect.
    pub fn mount(&self) {
        if self.inner.mounted.swap(true, Ordering::SeqCst) || !self.is_alive() {
            return;
        }

        let AuthSubscription { changes, handle } = self.inner.services.authority.subscribe();
        *lock(&self.inner.subscription) = Some(handle);

        let listener = tokio::spawn(listen(Arc::downgrade(&self.inner), changes));
        *lock(&self.inner.listener) = Some(listener);

        tracing::debug!("Auth context mounted");
        self.start_session_fetch();
    }

    /// Tear down: stop all state writes, release the subscription once.
    pub fn unmount(&self) {
        let inner = &self.inner;
        let mut first = false;
        inner.state.send_if_modified(|state| {
            if !inner.alive.swap(false, Ordering::SeqCst) {
                return false;
            }
            first = true;
            inner.generation.fetch_add(1, Ordering::SeqCst);
            state.phase = AuthPhase::Terminated;
            state.loading = false;
            true
        });
        if !first {
            return;
        }

        if let Some(handle) = lock(&inner.subscription).take() {
            handle.unsubscribe();
        }
        if let Some(listener) = lock(&inner.listener).take() {
            listener.abort();
        }
        tracing::debug!("Auth context unmounted");
    }

    pub fn is_alive(&self) -> bool {
        self.inner.alive.load(Ordering::SeqCst)
    }

    // ─── Observation ─────────────────────────────────────────────

    /// Receiver for every published state.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.inner.state.subscribe()
    }

    pub fn snapshot(&self) -> AuthState {
        self.inner.state.borrow().clone()
    }

    pub fn session(&self) -> Option<Session> {
        self.inner.state.borrow().session.clone()
    }

    pub fn profile(&self) -> Option<Profile> {
        self.inner.state.borrow().profile.clone()
    }

    pub fn dashboard(&self) -> Option<DashboardSnapshot> {
        self.inner.state.borrow().dashboard.clone()
    }

    pub fn loading(&self) -> bool {
        self.inner.state.borrow().loading
    }

    pub fn error(&self) -> Option<String> {
        self.inner.state.borrow().error.clone()
    }

    pub fn has_role(&self, required: Role) -> bool {
        self.inner.state.borrow().has_role(required)
    }

    pub fn permissions(&self) -> Permissions {
        self.inner.state.borrow().permissions()
    }

    /// Sequence number of the latest state-changing sequence.
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    /// Wait for a settled state from a sequence opened after `since` that
    /// also satisfies `accept`. `None` once the context is gone.
    pub async fn settled_after(
        &self,
        since: u64,
        mut accept: impl FnMut(&AuthState) -> bool + Send,
    ) -> Option<AuthState> {
        let inner = &self.inner;
        let mut rx = self.subscribe();
        let settled = rx
            .wait_for(|s| {
                !s.loading && inner.generation.load(Ordering::SeqCst) > since && accept(s)
            })
            .await
            .ok()
            .map(|s| (*s).clone());
        settled
    }

    /// Landing path for a role.
    pub fn redirect_path_for(role: Role) -> &'static str {
        redirect_path_for(Some(role))
    }

    /// Landing path for the current role.
    pub fn redirect_path(&self) -> &'static str {
        self.inner.state.borrow().redirect_path()
    }

    /// Queue used for post-login side effects.
    pub fn background(&self) -> &BackgroundTasks {
        &self.inner.background
    }

    // ─── Operations ──────────────────────────────────────────────

    /// Begin an OAuth sign-in with a provider.
    pub async fn sign_in(&self, provider: OAuthProvider) -> Result<SignInRedirect> {
        self.set_error(None);
        match self
            .inner
            .services
            .authority
            .sign_in_with_provider(provider)
            .await
        {
            Ok(redirect) => Ok(redirect),
            Err(e) => {
                tracing::warn!(provider = provider.as_str(), error = %e, "Sign-in failed");
                self.set_error(Some(e.to_string()));
                Err(e)
            }
        }
    }

    /// Sign out.
    ///
    /// Local state is cleared before this returns, so the next observable
    /// state is signed out whether or not the returned future (the remote
    /// sign-out) has completed.
    pub fn sign_out(&self) -> impl Future<Output = Result<()>> + Send + 'static {
        let inner = &self.inner;
        inner.state.send_if_modified(|state| {
            if !inner.alive.load(Ordering::SeqCst) {
                return false;
            }
            inner.generation.fetch_add(1, Ordering::SeqCst);
            *state = AuthState::anonymous(None);
            true
        });
        clear_signed_out_artifacts(inner.services.storage.as_ref());

        let ctx = self.clone();
        async move {
            match ctx.inner.services.authority.sign_out().await {
                Ok(()) => Ok(()),
                Err(e) => {
                    tracing::warn!(error = %e, "Remote sign-out failed");
                    ctx.set_error(Some(e.to_string()));
                    Err(e)
                }
            }
        }
    }

    /// Apply a partial profile edit for the signed-in user.
    pub async fn update_profile(&self, partial: ProfileUpdate) -> Result<Profile> {
        let (generation, session) = {
            let state = self.inner.state.borrow();
            (
                self.inner.generation.load(Ordering::SeqCst),
                state.session.clone(),
            )
        };
        let Some(session) = session else {
            self.set_error(Some("No user logged in".to_string()));
            return Err(AppError::Unauthorized);
        };

        self.set_error(None);
        if let Err(e) = partial.validate() {
            let err = AppError::from(e);
            self.set_error(Some(err.to_string()));
            return Err(err);
        }

        let user_id = session.user.id.clone();
        let profile = match self
            .inner
            .services
            .profiles
            .upsert(&user_id, &partial)
            .await
        {
            Ok(profile) => profile,
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Profile update failed");
                self.set_error(Some(e.to_string()));
                return Err(e);
            }
        };

        let applied = self.commit(generation, |state| {
            state.role = Some(profile.role);
            state.profile = Some(profile.clone());
            state.diagnostic = None;
        });
        if applied {
            tracing::info!(user_id = %user_id, role = %profile.role, "Profile updated");
            self.spawn_dashboard_refresh(generation, user_id);
        }
        Ok(profile)
    }

    /// Recompute the dashboard snapshot for the signed-in user.
    pub async fn refresh_dashboard(&self) -> Result<()> {
        let (generation, user_id) = {
            let state = self.inner.state.borrow();
            (
                self.inner.generation.load(Ordering::SeqCst),
                state.session.as_ref().map(|s| s.user.id.clone()),
            )
        };
        let Some(user_id) = user_id else {
            return Ok(());
        };

        let snapshot = self
            .inner
            .services
            .dashboard
            .compute_snapshot(&user_id)
            .await?;
        self.commit(generation, |state| state.dashboard = Some(snapshot));
        Ok(())
    }

    // ─── Sequences ───────────────────────────────────────────────

    /// React to one auth-state change from the authority.
    fn on_auth_change(&self, change: AuthChange) {
        tracing::info!(
            event = ?change.event,
            user_id = change.session.as_ref().map(|s| s.user.id.as_str()),
            "Auth state changed"
        );

        match change.session {
            Some(session) => {
                if let Some(generation) = self.begin(Some(&session)) {
                    let ctx = self.clone();
                    tokio::spawn(async move { ctx.settle_session(generation, session).await });
                }
            }
            None => {
                let inner = &self.inner;
                inner.state.send_if_modified(|state| {
                    if !inner.alive.load(Ordering::SeqCst) {
                        return false;
                    }
                    inner.generation.fetch_add(1, Ordering::SeqCst);
                    let error = state.error.take();
                    *state = AuthState::anonymous(error);
                    true
                });
            }
        }
    }

    /// Ask the authority for the current session and settle on it.
    fn start_session_fetch(&self) {
        let Some(generation) = self.begin(None) else {
            return;
        };

        let ctx = self.clone();
        tokio::spawn(async move {
            match ctx.inner.services.authority.get_session().await {
                Ok(Some(session)) => {
                    let adopted = ctx.commit(generation, |state| adopt_session(state, &session));
                    if adopted {
                        ctx.settle_session(generation, session).await;
                    }
                }
                Ok(None) => {
                    ctx.commit(generation, |state| *state = AuthState::anonymous(None));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to fetch current session");
                    ctx.commit(generation, |state| {
                        *state = AuthState::anonymous(Some(e.to_string()))
                    });
                }
            }
        });
    }

    /// Open a new sequence; returns its generation, or `None` after unmount.
    fn begin(&self, session: Option<&Session>) -> Option<u64> {
        let inner = &self.inner;
        let mut generation = None;
        inner.state.send_if_modified(|state| {
            if !inner.alive.load(Ordering::SeqCst) {
                return false;
            }
            generation = Some(inner.generation.fetch_add(1, Ordering::SeqCst) + 1);
            state.phase = AuthPhase::Initializing;
            state.loading = true;
            if let Some(session) = session {
                adopt_session(state, session);
            }
            true
        });
        generation
    }

    /// Apply `update` if `generation` is still current and the context alive.
    fn commit(&self, generation: u64, update: impl FnOnce(&mut AuthState)) -> bool {
        let inner = &self.inner;
        inner.state.send_if_modified(|state| {
            if !inner.alive.load(Ordering::SeqCst)
                || inner.generation.load(Ordering::SeqCst) != generation
            {
                return false;
            }
            update(state);
            true
        })
    }

    fn set_error(&self, error: Option<String>) {
        let inner = &self.inner;
        inner.state.send_if_modified(|state| {
            if !inner.alive.load(Ordering::SeqCst) || state.error == error {
                return false;
            }
            state.error = error;
            true
        });
    }

    /// Resolve the profile for `session` and publish the settled state.
    async fn settle_session(&self, generation: u64, session: Session) {
        let user_id = session.user_id().to_string();
        let services = &self.inner.services;
        let resolution = resolve_profile(
            services.authority.as_ref(),
            services.profiles.as_ref(),
            &user_id,
            self.inner.settings.profile_fetch_timeout,
        )
        .await;

        let applied = self.commit(generation, |state| {
            state.phase = AuthPhase::Authenticated;
            state.loading = false;
            state.role = Some(resolution.role());
            state.profile = resolution.profile().cloned();
            state.diagnostic = resolution.diagnostic().cloned();
        });

        if !applied {
            tracing::debug!(user_id = %user_id, generation, "Discarded stale profile load");
            return;
        }

        tracing::info!(
            user_id = %user_id,
            role = %resolution.role(),
            degraded = resolution.diagnostic().is_some(),
            "Session settled"
        );

        if !matches!(resolution, Resolution::Fallback(_)) {
            self.spawn_post_load(generation, user_id);
        }
    }

    /// Fire-and-forget side effects after a profile settles.
    fn spawn_post_load(&self, generation: u64, user_id: String) {
        self.spawn_dashboard_refresh(generation, user_id.clone());

        let services = &self.inner.services;
        let background = &self.inner.background;

        let telemetry = services.telemetry.clone();
        let id = user_id.clone();
        background.spawn("touch_activity", async move { telemetry.touch_activity(&id).await });

        let telemetry = services.telemetry.clone();
        let id = user_id.clone();
        let metadata = SessionMetadata {
            device_info: self.inner.settings.device_info.clone(),
            ip_address: "auto".to_string(),
        };
        background.spawn("record_session", async move {
            telemetry.record_session(&id, &metadata).await
        });

        let achievements = services.achievements.clone();
        background.spawn("achievements", async move {
            let granted = achievements.evaluate_and_award(&user_id).await?;
            if !granted.is_empty() {
                tracing::info!(user_id = %user_id, badges = ?granted, "Achievements unlocked");
            }
            Ok(())
        });
    }

    fn spawn_dashboard_refresh(&self, generation: u64, user_id: String) {
        let ctx = self.clone();
        self.inner.background.spawn("dashboard", async move {
            let snapshot = ctx
                .inner
                .services
                .dashboard
                .compute_snapshot(&user_id)
                .await?;
            ctx.commit(generation, |state| state.dashboard = Some(snapshot));
            Ok(())
        });
    }
}

/// Put `session` in place; a different identity drops the old profile.
fn adopt_session(state: &mut AuthState, session: &Session) {
    let same_identity = state
        .session
        .as_ref()
        .is_some_and(|current| current.user.id == session.user.id);
    if !same_identity {
        state.profile = None;
        state.role = None;
        state.dashboard = None;
        state.diagnostic = None;
    }
    state.session = Some(session.clone());
}

/// Listener loop for auth-state changes; ends with the context.
async fn listen(inner: Weak<Inner>, mut changes: broadcast::Receiver<AuthChange>) {
    loop {
        let received = changes.recv().await;
        let Some(inner) = inner.upgrade() else {
            return;
        };
        let ctx = AuthContext { inner };
        if !ctx.is_alive() {
            return;
        }

        match received {
            Ok(change) => ctx.on_auth_change(change),
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                tracing::warn!(missed, "Auth changes dropped, re-reading session");
                ctx.start_session_fetch();
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
