// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Profile model: the application record extending an identity.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

use crate::models::{Identity, Role};

/// Completion percentage assigned to freshly created profiles.
pub const INITIAL_PROFILE_COMPLETION: u8 = 20;

/// Profile row stored in the `profiles` table (keyed by identity id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Profile {
    /// Identity id (also the primary key)
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub profile_completion: u8,
    #[serde(default)]
    pub academic_credits: u32,
    #[serde(default)]
    pub current_streak_days: u32,
    /// Set when the profile was created or last signed in (ISO 8601)
    #[serde(default)]
    pub last_active: Option<String>,
    /// Touched on every bootstrap (ISO 8601)
    #[serde(default)]
    pub last_activity_date: Option<String>,
    #[serde(default)]
    pub achievement_badges: Vec<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl Profile {
    /// Best display name available.
    pub fn display_name(&self) -> Option<String> {
        if let Some(name) = self.full_name.as_deref().filter(|n| !n.is_empty()) {
            return Some(name.to_string());
        }
        match (self.first_name.as_deref(), self.last_name.as_deref()) {
            (Some(first), Some(last)) => Some(format!("{} {}", first, last)),
            (Some(first), None) => Some(first.to_string()),
            _ => self.email.clone(),
        }
    }
}

/// Defaults written when a profile is lazily created for a new identity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewProfile {
    pub email: Option<String>,
    pub full_name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Role,
    pub avatar_url: String,
    pub profile_completion: u8,
    pub academic_credits: u32,
    pub current_streak_days: u32,
    pub last_active: String,
}

impl NewProfile {
    /// Synthesize the default student profile for an identity.
    ///
    /// The display name comes from provider metadata when present, otherwise
    /// from the local part of the e-mail address.
    pub fn for_identity(identity: &Identity, now: &str) -> Self {
        let full_name = identity
            .metadata
            .full_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .or_else(|| {
                identity
                    .email
                    .as_deref()
                    .and_then(|e| e.split('@').next())
                    .filter(|local| !local.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_default();

        let mut parts = full_name.splitn(2, char::is_whitespace);
        let first_name = parts
            .next()
            .filter(|p| !p.is_empty())
            .map(str::to_string);
        let last_name = parts
            .next()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);

        Self {
            email: identity.email.clone(),
            full_name,
            first_name,
            last_name,
            role: Role::Student,
            avatar_url: identity.metadata.avatar_url.clone().unwrap_or_default(),
            profile_completion: INITIAL_PROFILE_COMPLETION,
            academic_credits: 0,
            current_streak_days: 0,
            last_active: now.to_string(),
        }
    }
}

/// Partial profile edit submitted by the user (profile setup / profile page).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 120))]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 60))]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 60))]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 120))]
    pub organization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    /// Requested role; elevated roles are reviewed by administrators.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(url)]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(email)]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_completion: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_activity_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub achievement_badges: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        *self == ProfileUpdate::default()
    }
}
