// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Scripted collaborator doubles shared by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use prep_portal::auth::{AuthContext, AuthServices, AuthState, BootstrapSettings};
use prep_portal::config::Config;
use prep_portal::error::{AppError, Result};
use prep_portal::models::{
    AuthChange, AuthEvent, DashboardSnapshot, Identity, IdentityMetadata, NewProfile,
    OAuthProvider, Profile, ProfileUpdate, Role, Session, SessionMetadata, SessionTokens,
    SignInRedirect,
};
use prep_portal::routes::create_router;
use prep_portal::services::{
    AchievementEvaluator, AuthSubscription, Authority, DashboardAggregator, MemoryStorage,
    ProfileStore, SessionExchange, TelemetrySink, Unsubscribe,
};
use prep_portal::AppState;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, oneshot};

/// Check if a Supabase project is configured for live tests.
pub fn supabase_available() -> bool {
    std::env::var("SUPABASE_URL").is_ok() && std::env::var("SUPABASE_ANON_KEY").is_ok()
}

/// Skip test with message if no Supabase project is configured.
#[macro_export]
macro_rules! require_supabase {
    () => {
        if !crate::common::supabase_available() {
            eprintln!("⚠️  Skipping: SUPABASE_URL / SUPABASE_ANON_KEY not set");
            return;
        }
    };
}

// ─── Scripted replies ────────────────────────────────────────

/// How a scripted call answers.
pub enum Reply<T> {
    Now(Result<T>),
    /// Answers when the paired sender fires
    Later(oneshot::Receiver<Result<T>>),
    /// Never answers
    Never,
}

impl<T> Reply<T> {
    pub fn later() -> (oneshot::Sender<Result<T>>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Reply::Later(rx))
    }

    async fn resolve(self) -> Result<T> {
        match self {
            Reply::Now(result) => result,
            Reply::Later(rx) => rx
                .await
                .unwrap_or_else(|_| Err(AppError::Database("reply dropped".to_string()))),
            Reply::Never => std::future::pending().await,
        }
    }
}

fn pop<T>(queue: &Mutex<VecDeque<Reply<T>>>) -> Option<Reply<T>> {
    queue.lock().unwrap().pop_front()
}

// ─── Fixtures ────────────────────────────────────────────────

pub fn identity(id: &str) -> Identity {
    Identity {
        id: id.to_string(),
        email: Some(format!("{}@example.org", id)),
        metadata: IdentityMetadata {
            full_name: Some("Ada Lovelace".to_string()),
            avatar_url: Some("https://cdn.example.org/ada.png".to_string()),
        },
    }
}

pub fn session_for(id: &str) -> Session {
    Session {
        access_token: format!("access-{}", id),
        refresh_token: format!("refresh-{}", id),
        expires_at: Utc::now() + chrono::Duration::hours(1),
        user: identity(id),
    }
}

pub fn profile(id: &str, role: Role) -> Profile {
    Profile {
        id: id.to_string(),
        email: Some(format!("{}@example.org", id)),
        full_name: Some(format!("User {}", id)),
        first_name: Some("User".to_string()),
        last_name: Some(id.to_string()),
        role,
        avatar_url: None,
        organization: None,
        phone: None,
        profile_completion: 80,
        academic_credits: 12,
        current_streak_days: 3,
        last_active: None,
        last_activity_date: None,
        achievement_badges: Vec::new(),
        created_at: None,
        updated_at: None,
    }
}

fn profile_from_new(id: &str, new: &NewProfile) -> Profile {
    Profile {
        id: id.to_string(),
        email: new.email.clone(),
        full_name: Some(new.full_name.clone()),
        first_name: new.first_name.clone(),
        last_name: new.last_name.clone(),
        role: new.role,
        avatar_url: Some(new.avatar_url.clone()),
        organization: None,
        phone: None,
        profile_completion: new.profile_completion,
        academic_credits: new.academic_credits,
        current_streak_days: new.current_streak_days,
        last_active: Some(new.last_active.clone()),
        last_activity_date: None,
        achievement_badges: Vec::new(),
        created_at: Some(new.last_active.clone()),
        updated_at: None,
    }
}

// ─── Authority ───────────────────────────────────────────────

pub struct MockAuthority {
    changes: broadcast::Sender<AuthChange>,
    session: Mutex<Option<Session>>,
    session_replies: Mutex<VecDeque<Reply<Option<Session>>>>,
    sign_out_replies: Mutex<VecDeque<Reply<()>>>,
    pub user_unavailable: AtomicBool,
    pub get_session_calls: AtomicUsize,
    pub sign_out_calls: AtomicUsize,
    pub subscribe_calls: AtomicUsize,
    pub unsubscribe_calls: Arc<AtomicUsize>,
}

impl MockAuthority {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(16);
        Self {
            changes,
            session: Mutex::new(None),
            session_replies: Mutex::new(VecDeque::new()),
            sign_out_replies: Mutex::new(VecDeque::new()),
            user_unavailable: AtomicBool::new(false),
            get_session_calls: AtomicUsize::new(0),
            sign_out_calls: AtomicUsize::new(0),
            subscribe_calls: AtomicUsize::new(0),
            unsubscribe_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn set_session(&self, session: Option<Session>) {
        *self.session.lock().unwrap() = session;
    }

    pub fn script_session(&self, reply: Reply<Option<Session>>) {
        self.session_replies.lock().unwrap().push_back(reply);
    }

    pub fn script_sign_out(&self, reply: Reply<()>) {
        self.sign_out_replies.lock().unwrap().push_back(reply);
    }

    /// Make `session` current and broadcast the change.
    pub fn emit(&self, event: AuthEvent, session: Option<Session>) {
        self.set_session(session.clone());
        let _ = self.changes.send(AuthChange { event, session });
    }

    pub fn unsubscribes(&self) -> usize {
        self.unsubscribe_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Authority for MockAuthority {
    async fn get_session(&self) -> Result<Option<Session>> {
        self.get_session_calls.fetch_add(1, Ordering::SeqCst);
        match pop(&self.session_replies) {
            Some(reply) => reply.resolve().await,
            None => Ok(self.session.lock().unwrap().clone()),
        }
    }

    async fn get_current_user(&self) -> Result<Option<Identity>> {
        if self.user_unavailable.load(Ordering::SeqCst) {
            return Err(AppError::AuthorityUnavailable("user endpoint down".to_string()));
        }
        Ok(self.session.lock().unwrap().as_ref().map(|s| s.user.clone()))
    }

    fn subscribe(&self) -> AuthSubscription {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        let released = self.unsubscribe_calls.clone();
        AuthSubscription {
            changes: self.changes.subscribe(),
            handle: Unsubscribe::new(move || {
                released.fetch_add(1, Ordering::SeqCst);
            }),
        }
    }

    async fn sign_in_with_provider(&self, provider: OAuthProvider) -> Result<SignInRedirect> {
        Ok(SignInRedirect {
            provider,
            url: format!("https://auth.test/authorize?provider={}", provider.as_str()),
        })
    }

    async fn sign_out(&self) -> Result<()> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        match pop(&self.sign_out_replies) {
            Some(reply) => reply.resolve().await,
            None => Ok(()),
        }
    }
}

/// The access token doubles as the identity id; `"bad"` is rejected.
#[async_trait]
impl SessionExchange for MockAuthority {
    async fn establish_session(&self, tokens: SessionTokens) -> Result<Session> {
        if tokens.access_token == "bad" {
            return Err(AppError::InvalidToken);
        }
        let session = session_for(&tokens.access_token);
        self.emit(AuthEvent::SignedIn, Some(session.clone()));
        Ok(session)
    }
}

// ─── Profile store ───────────────────────────────────────────

#[derive(Default)]
pub struct MockProfileStore {
    rows: Mutex<HashMap<String, Profile>>,
    fetch_replies: Mutex<HashMap<String, VecDeque<Reply<Profile>>>>,
    create_replies: Mutex<VecDeque<Reply<Profile>>>,
    pub fetch_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
}

impl MockProfileStore {
    pub fn insert(&self, profile: Profile) {
        self.rows.lock().unwrap().insert(profile.id.clone(), profile);
    }

    pub fn script_fetch(&self, id: &str, reply: Reply<Profile>) {
        self.fetch_replies
            .lock()
            .unwrap()
            .entry(id.to_string())
            .or_default()
            .push_back(reply);
    }

    pub fn script_create(&self, reply: Reply<Profile>) {
        self.create_replies.lock().unwrap().push_back(reply);
    }

    pub fn fetches(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn creates(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProfileStore for MockProfileStore {
    async fn get_by_id(&self, id: &str) -> Result<Profile> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self
            .fetch_replies
            .lock()
            .unwrap()
            .get_mut(id)
            .and_then(VecDeque::pop_front);
        if let Some(reply) = scripted {
            return reply.resolve().await;
        }
        self.rows
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::ProfileNotFound(id.to_string()))
    }

    async fn create(&self, id: &str, defaults: &NewProfile) -> Result<Profile> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(reply) = pop(&self.create_replies) {
            return reply.resolve().await;
        }
        let created = profile_from_new(id, defaults);
        self.insert(created.clone());
        Ok(created)
    }

    async fn upsert(&self, id: &str, partial: &ProfileUpdate) -> Result<Profile> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .entry(id.to_string())
            .or_insert_with(|| profile(id, Role::Student));
        if let Some(v) = &partial.full_name {
            row.full_name = Some(v.clone());
        }
        if let Some(v) = &partial.organization {
            row.organization = Some(v.clone());
        }
        if let Some(v) = &partial.phone {
            row.phone = Some(v.clone());
        }
        if let Some(role) = partial.role {
            row.role = role;
        }
        Ok(row.clone())
    }
}

// ─── Post-load collaborators ─────────────────────────────────

#[derive(Default)]
pub struct RecordingDashboard {
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
}

#[async_trait]
impl DashboardAggregator for RecordingDashboard {
    async fn compute_snapshot(&self, _id: &str) -> Result<DashboardSnapshot> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Database("dashboard view missing".to_string()));
        }
        Ok(DashboardSnapshot::assemble(None, Vec::new(), Vec::new(), Vec::new()))
    }
}

#[derive(Default)]
pub struct RecordingTelemetry {
    pub sessions: Mutex<Vec<(String, SessionMetadata)>>,
    pub touches: Mutex<Vec<String>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl TelemetrySink for RecordingTelemetry {
    async fn record_session(&self, id: &str, metadata: &SessionMetadata) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Database("user_sessions unavailable".to_string()));
        }
        self.sessions
            .lock()
            .unwrap()
            .push((id.to_string(), metadata.clone()));
        Ok(())
    }

    async fn touch_activity(&self, id: &str) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Database("profiles unavailable".to_string()));
        }
        self.touches.lock().unwrap().push(id.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingAchievements {
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
}

#[async_trait]
impl AchievementEvaluator for RecordingAchievements {
    async fn evaluate_and_award(&self, _id: &str) -> Result<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Database("rules table locked".to_string()));
        }
        Ok(Vec::new())
    }
}

// ─── Harness ─────────────────────────────────────────────────

pub struct Harness {
    pub authority: Arc<MockAuthority>,
    pub profiles: Arc<MockProfileStore>,
    pub dashboard: Arc<RecordingDashboard>,
    pub telemetry: Arc<RecordingTelemetry>,
    pub achievements: Arc<RecordingAchievements>,
    pub storage: Arc<MemoryStorage>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            authority: Arc::new(MockAuthority::new()),
            profiles: Arc::new(MockProfileStore::default()),
            dashboard: Arc::new(RecordingDashboard::default()),
            telemetry: Arc::new(RecordingTelemetry::default()),
            achievements: Arc::new(RecordingAchievements::default()),
            storage: Arc::new(MemoryStorage::new()),
        }
    }

    /// Harness whose authority already holds a session for `id`.
    pub fn signed_in(id: &str) -> Self {
        let h = Self::new();
        h.authority.set_session(Some(session_for(id)));
        h
    }

    pub fn services(&self) -> AuthServices {
        AuthServices {
            authority: self.authority.clone(),
            profiles: self.profiles.clone(),
            dashboard: self.dashboard.clone(),
            telemetry: self.telemetry.clone(),
            achievements: self.achievements.clone(),
            storage: self.storage.clone(),
        }
    }

    /// Unmounted context with the default 10 second fetch timeout.
    pub fn context(&self) -> AuthContext {
        AuthContext::new(self.services(), BootstrapSettings::default())
    }

    pub fn mounted(&self) -> AuthContext {
        let ctx = self.context();
        ctx.mount();
        ctx
    }
}

/// Wait for the next state with `loading == false`.
pub async fn settled(ctx: &AuthContext) -> AuthState {
    let mut rx = ctx.subscribe();
    let state = rx.wait_for(|s| !s.loading).await.unwrap().clone();
    state
}

/// Wait for a settled state belonging to `user_id`.
pub async fn settled_as(ctx: &AuthContext, user_id: &str) -> AuthState {
    let mut rx = ctx.subscribe();
    let state = rx
        .wait_for(|s| {
            !s.loading && s.session.as_ref().is_some_and(|x| x.user.id == user_id)
        })
        .await
        .unwrap()
        .clone();
    state
}

/// Poll `condition` until it holds.
pub async fn wait_until(condition: impl Fn() -> bool) {
    while !condition() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

/// Create a test app around a mounted context.
/// Returns the router and the shared state.
pub fn create_test_app(h: &Harness) -> (axum::Router, Arc<AppState>) {
    create_test_app_with(h, Config::test_default())
}

pub fn create_test_app_with(h: &Harness, config: Config) -> (axum::Router, Arc<AppState>) {
    let state = Arc::new(AppState {
        config,
        auth: h.mounted(),
        sessions: h.authority.clone(),
    });

    (create_router(state.clone()), state)
}
