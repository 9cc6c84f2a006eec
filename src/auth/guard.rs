// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Consumer-side access checks with a loading backstop.
//!
//! A consumer never waits on the bootstrapper indefinitely: if the state is
//! still loading when the backstop expires, the outcome is a recoverable
//! connection issue instead of an endless spinner.

use serde::Serialize;
use std::time::Duration;
use tokio::sync::watch;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::auth::state::{AuthPhase, AuthState};
use crate::config::DEFAULT_LOADING_BACKSTOP_SECS;
use crate::models::Role;

/// Where unauthenticated consumers are sent.
pub const LOGIN_PATH: &str = "/login";

/// What a consumer requires before rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessRequirement {
    /// Any signed-in user
    Any,
    /// Hierarchical: the role or anything above it
    AtLeast(Role),
    /// Exact membership; an unresolved role counts as student.
    /// An empty list admits every signed-in user.
    OneOf(Vec<Role>),
}

/// Offered when the state could not be resolved in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
pub enum RecoveryAction {
    Reload,
    Relogin,
}

/// Everything a consumer can offer when the state never settled.
pub const RECOVERY_ACTIONS: [RecoveryAction; 2] = [RecoveryAction::Reload, RecoveryAction::Relogin];

/// Outcome of an access check.
#[derive(Debug, Clone, PartialEq)]
pub enum Access {
    Granted(AuthState),
    RedirectToLogin { login_path: &'static str },
    Denied { required: String, current: Option<Role> },
    ConnectionIssue { actions: Vec<RecoveryAction> },
}

impl Access {
    pub fn is_granted(&self) -> bool {
        matches!(self, Access::Granted(_))
    }

    fn connection_issue() -> Self {
        Access::ConnectionIssue {
            actions: RECOVERY_ACTIONS.to_vec(),
        }
    }
}

/// Waits for the auth state to settle, then applies a requirement.
#[derive(Clone)]
pub struct AccessGuard {
    state: watch::Receiver<AuthState>,
    backstop: Duration,
}

impl AccessGuard {
    pub fn new(state: watch::Receiver<AuthState>, backstop: Duration) -> Self {
        Self { state, backstop }
    }

    /// Guard with the default 15 second backstop.
    pub fn with_default_backstop(state: watch::Receiver<AuthState>) -> Self {
        Self::new(state, Duration::from_secs(DEFAULT_LOADING_BACKSTOP_SECS))
    }

    pub async fn check(&self, requirement: &AccessRequirement) -> Access {
        let mut rx = self.state.clone();
        let settled = match tokio::time::timeout(self.backstop, rx.wait_for(|s| !s.loading)).await
        {
            Ok(Ok(state)) => state.clone(),
            Ok(Err(_)) => {
                tracing::warn!("Auth state channel closed while waiting");
                return Access::connection_issue();
            }
            Err(_) => {
                tracing::warn!(
                    backstop_secs = self.backstop.as_secs(),
                    "Auth state still loading at backstop"
                );
                return Access::connection_issue();
            }
        };

        evaluate(settled, requirement)
    }
}

/// Apply `requirement` to a settled state.
pub fn evaluate(state: AuthState, requirement: &AccessRequirement) -> Access {
    if state.phase == AuthPhase::Terminated {
        return Access::connection_issue();
    }
    if !state.is_authenticated() {
        return Access::RedirectToLogin {
            login_path: LOGIN_PATH,
        };
    }

    let allowed = match requirement {
        AccessRequirement::Any => true,
        AccessRequirement::AtLeast(role) => state.has_role(*role),
        AccessRequirement::OneOf(roles) => {
            roles.is_empty() || roles.contains(&state.effective_role())
        }
    };

    if allowed {
        return Access::Granted(state);
    }

    let required = match requirement {
        AccessRequirement::AtLeast(role) => role.to_string(),
        AccessRequirement::OneOf(roles) => roles
            .iter()
            .map(|r| r.as_str())
            .collect::<Vec<_>>()
            .join(" or "),
        AccessRequirement::Any => String::new(),
    };
    Access::Denied {
        required,
        current: state.role,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_in(role: Option<Role>) -> AuthState {
        use crate::models::{Identity, Session};
        AuthState {
            phase: AuthPhase::Authenticated,
            session: Some(Session {
                access_token: "a".to_string(),
                refresh_token: "r".to_string(),
                expires_at: chrono::Utc::now(),
                user: Identity {
                    id: "u1".to_string(),
                    email: Some("u1@example.org".to_string()),
                    metadata: Default::default(),
                },
            }),
            role,
            loading: false,
            ..AuthState::default()
        }
    }

    #[test]
    fn test_one_of_defaults_unresolved_role_to_student() {
        let req = AccessRequirement::OneOf(vec![Role::Student]);
        assert!(evaluate(signed_in(None), &req).is_granted());

        let req = AccessRequirement::OneOf(vec![Role::Teacher, Role::Admin]);
        assert_eq!(
            evaluate(signed_in(Some(Role::Student)), &req),
            Access::Denied {
                required: "teacher or admin".to_string(),
                current: Some(Role::Student),
            }
        );
    }

    #[test]
    fn test_one_of_is_exact_membership() {
        let req = AccessRequirement::OneOf(vec![Role::Teacher]);
        assert!(!evaluate(signed_in(Some(Role::Admin)), &req).is_granted());
        assert!(evaluate(signed_in(Some(Role::Admin)), &AccessRequirement::OneOf(vec![]))
            .is_granted());
    }

    #[test]
    fn test_terminated_is_connection_issue() {
        let state = AuthState {
            phase: AuthPhase::Terminated,
            ..signed_in(Some(Role::Admin))
        };
        assert!(matches!(
            evaluate(state, &AccessRequirement::Any),
            Access::ConnectionIssue { .. }
        ));
    }
}
