// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client-visible auth state published by the bootstrapper.

use serde::Serialize;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::{redirect_path_for, DashboardSnapshot, Profile, Role, Session};

/// Lifecycle phase of the bootstrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
pub enum AuthPhase {
    Idle,
    Initializing,
    Authenticated,
    Anonymous,
    Terminated,
}

/// Why the current role is a fallback rather than a persisted value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
pub struct Diagnostic {
    /// `AppError::code()` of the failure that forced the fallback
    pub code: String,
    pub message: String,
}

/// One consistent view of the auth state.
///
/// Written whole under the state lock, so `session`, `profile` and `role`
/// always belong to the same resolution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthState {
    pub phase: AuthPhase,
    pub session: Option<Session>,
    pub profile: Option<Profile>,
    /// Resolved role; `Some(Student)` without a profile means fallback.
    pub role: Option<Role>,
    pub dashboard: Option<DashboardSnapshot>,
    pub loading: bool,
    /// Last user-facing error (sign-in, sign-out, profile edits, session fetch)
    pub error: Option<String>,
    /// Set when role resolution degraded to the fallback role
    pub diagnostic: Option<Diagnostic>,
}

impl Default for AuthState {
    fn default() -> Self {
        Self {
            phase: AuthPhase::Idle,
            session: None,
            profile: None,
            role: None,
            dashboard: None,
            loading: true,
            error: None,
            diagnostic: None,
        }
    }
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    /// The resolved role is backed by a stored profile.
    pub fn role_confirmed(&self) -> bool {
        self.profile.is_some() && self.diagnostic.is_none()
    }

    /// Hierarchical role check; false while no role is resolved.
    pub fn has_role(&self, required: Role) -> bool {
        self.role.is_some_and(|role| role.satisfies(required))
    }

    /// Role used for display and routing; unknown means student.
    pub fn effective_role(&self) -> Role {
        self.role.unwrap_or_default()
    }

    pub fn redirect_path(&self) -> &'static str {
        redirect_path_for(self.role)
    }

    pub fn permissions(&self) -> Permissions {
        Permissions {
            can_access_admin: self.has_role(Role::Admin),
            can_access_teacher: self.has_role(Role::Teacher),
            can_access_student: self.has_role(Role::Student),
            is_admin: self.role == Some(Role::Admin),
            is_teacher: self.role == Some(Role::Teacher),
            is_student: self.role == Some(Role::Student),
            role: self.effective_role(),
        }
    }

    /// Cleared, signed-out state.
    pub(crate) fn anonymous(error: Option<String>) -> Self {
        Self {
            phase: AuthPhase::Anonymous,
            loading: false,
            error,
            ..Self::default()
        }
    }
}

/// Feature gates derived from the current role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Permissions {
    pub can_access_admin: bool,
    pub can_access_teacher: bool,
    pub can_access_student: bool,
    pub is_admin: bool,
    pub is_teacher: bool,
    pub is_student: bool,
    pub role: Role,
}
