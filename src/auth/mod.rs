// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session/profile bootstrap and role-based access.

pub mod context;
pub mod guard;
pub mod loader;
pub mod state;

pub use context::{AuthContext, AuthServices, BootstrapSettings};
pub use guard::{
    Access, AccessGuard, AccessRequirement, RecoveryAction, LOGIN_PATH, RECOVERY_ACTIONS,
};
pub use loader::{resolve_profile, Resolution};
pub use state::{AuthPhase, AuthState, Diagnostic, Permissions};
