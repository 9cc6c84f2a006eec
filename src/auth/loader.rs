// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profile resolution for a freshly observed session.
//!
//! 1. Fetch the profile, bounded by a timeout (a timeout is a failure)
//! 2. On "not found" only: read the identity, synthesize defaults, create once
//! 3. Any other failure: fall back to the student role
//!
//! Resolution never fails outright; degraded outcomes carry a diagnostic.

use std::time::Duration;

use crate::auth::state::Diagnostic;
use crate::error::AppError;
use crate::models::{NewProfile, Profile, Role};
use crate::services::ports::{Authority, ProfileStore};
use crate::time_utils::now_rfc3339;

/// Outcome of resolving the profile for one identity.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Existing profile row
    Fetched(Profile),
    /// Row created by this bootstrap
    Created(Profile),
    /// No usable profile; the identity is treated as a student
    Fallback(Diagnostic),
}

impl Resolution {
    pub fn profile(&self) -> Option<&Profile> {
        match self {
            Resolution::Fetched(p) | Resolution::Created(p) => Some(p),
            Resolution::Fallback(_) => None,
        }
    }

    pub fn role(&self) -> Role {
        self.profile().map_or(Role::Student, |p| p.role)
    }

    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            Resolution::Fallback(d) => Some(d),
            _ => None,
        }
    }
}

fn fallback(user_id: &str, err: &AppError) -> Resolution {
    tracing::warn!(
        user_id,
        code = err.code(),
        error = %err,
        "Profile unavailable, using fallback role"
    );
    Resolution::Fallback(Diagnostic {
        code: err.code().to_string(),
        message: err.to_string(),
    })
}

/// Resolve the profile for `user_id`.
pub async fn resolve_profile(
    authority: &dyn Authority,
    profiles: &dyn ProfileStore,
    user_id: &str,
    fetch_timeout: Duration,
) -> Resolution {
    let fetched = match tokio::time::timeout(fetch_timeout, profiles.get_by_id(user_id)).await {
        Ok(result) => result,
        Err(_) => Err(AppError::ProfileFetchTimeout(fetch_timeout)),
    };

    match fetched {
        Ok(profile) => Resolution::Fetched(profile),
        Err(e) if e.is_profile_not_found() => create_default(authority, profiles, user_id).await,
        Err(e) => fallback(user_id, &e),
    }
}

async fn create_default(
    authority: &dyn Authority,
    profiles: &dyn ProfileStore,
    user_id: &str,
) -> Resolution {
    let identity = match authority.get_current_user().await {
        Ok(Some(identity)) if identity.id == user_id => identity,
        Ok(Some(other)) => {
            let err = AppError::ProfileCreateError(format!(
                "authority reports user {} while resolving {}",
                other.id, user_id
            ));
            return fallback(user_id, &err);
        }
        Ok(None) => {
            let err = AppError::ProfileCreateError("no current user".to_string());
            return fallback(user_id, &err);
        }
        Err(e) => return fallback(user_id, &e),
    };

    let defaults = NewProfile::for_identity(&identity, &now_rfc3339());
    match profiles.create(user_id, &defaults).await {
        Ok(profile) => {
            tracing::info!(user_id, role = %profile.role, "New profile created");
            Resolution::Created(profile)
        }
        Err(e) => {
            if e.is_create_conflict() {
                tracing::info!(user_id, "Profile created concurrently elsewhere");
            }
            fallback(user_id, &e)
        }
    }
}
