// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer (Supabase REST gateway).

pub mod postgrest;

pub use postgrest::{PostgrestError, PostgrestErrorKind, SupabaseClient};

/// Table names as constants.
pub mod tables {
    pub const PROFILES: &str = "profiles";
    pub const MODULE_PROGRESS: &str = "user_module_progress";
    pub const ACHIEVEMENTS: &str = "user_achievements";
    pub const DRILL_PARTICIPATION: &str = "user_drill_participation";
    /// Session telemetry rows (one per bootstrap)
    pub const SESSIONS: &str = "user_sessions";
}
