// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod dashboard;
pub mod profile;
pub mod role;
pub mod session;

pub use dashboard::{
    Achievement, AchievementAward, DashboardSnapshot, DashboardStatistics, DrillParticipation,
    ModuleProgress, SessionMetadata,
};
pub use profile::{NewProfile, Profile, ProfileUpdate};
pub use role::{redirect_path_for, Role};
pub use session::{
    AuthChange, AuthEvent, Identity, IdentityMetadata, OAuthProvider, Session, SessionTokens,
    SignInRedirect,
};
