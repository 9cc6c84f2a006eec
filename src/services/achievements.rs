// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Achievement rules and the evaluator that awards them.
//!
//! Rules are pure functions of the profile, its module progress and the
//! badges already granted, so evaluation is idempotent: running it twice
//! never awards the same badge twice.

use async_trait::async_trait;
use std::collections::HashSet;

use crate::db::postgrest::eq;
use crate::db::tables;
use crate::error::{AppError, Result};
use crate::models::dashboard::completed_modules;
use crate::models::{Achievement, AchievementAward, ModuleProgress, Profile};
use crate::services::dashboard::PortalTables;
use crate::services::ports::AchievementEvaluator;
use crate::time_utils::now_rfc3339;

pub const BADGE_MODULE_MASTER_5: &str = "module_master_5";
pub const BADGE_STREAK_WEEK: &str = "streak_week";

const MODULE_MASTER_THRESHOLD: u32 = 5;
const STREAK_WEEK_DAYS: u32 = 7;

/// Awards earned by the current state that are not yet held.
pub fn pending_awards(
    profile: &Profile,
    progress: &[ModuleProgress],
    existing: &[Achievement],
) -> Vec<AchievementAward> {
    let held: HashSet<&str> = profile
        .achievement_badges
        .iter()
        .map(String::as_str)
        .chain(existing.iter().filter_map(|a| a.badge_awarded.as_deref()))
        .collect();

    let mut awards = Vec::new();

    let modules_completed = completed_modules(progress);
    if modules_completed >= MODULE_MASTER_THRESHOLD && !held.contains(BADGE_MODULE_MASTER_5) {
        awards.push(AchievementAward {
            achievement_type: "module_completion".to_string(),
            achievement_data: serde_json::json!({ "modules_completed": modules_completed }),
            points_earned: 50,
            badge_awarded: BADGE_MODULE_MASTER_5.to_string(),
        });
    }

    if profile.current_streak_days >= STREAK_WEEK_DAYS && !held.contains(BADGE_STREAK_WEEK) {
        awards.push(AchievementAward {
            achievement_type: "streak_milestone".to_string(),
            achievement_data: serde_json::json!({ "streak_days": profile.current_streak_days }),
            points_earned: 30,
            badge_awarded: BADGE_STREAK_WEEK.to_string(),
        });
    }

    awards
}

/// Evaluator writing awards to `user_achievements` and the profile badge set.
#[derive(Clone)]
pub struct PostgrestAchievements {
    tables: PortalTables,
}

impl PostgrestAchievements {
    pub fn new(tables: PortalTables) -> Self {
        Self { tables }
    }
}

#[async_trait]
impl AchievementEvaluator for PostgrestAchievements {
    async fn evaluate_and_award(&self, id: &str) -> Result<Vec<String>> {
        let (profile, progress, existing) = tokio::try_join!(
            self.tables.profile(id),
            self.tables.progress(id),
            self.tables.achievements(id),
        )?;

        let awards = pending_awards(&profile, &progress, &existing);
        if awards.is_empty() {
            return Ok(Vec::new());
        }

        let client = self.tables.client();
        let mut badges = profile.achievement_badges.clone();
        let mut granted = Vec::with_capacity(awards.len());

        for award in &awards {
            let mut row = serde_json::to_value(award)
                .map_err(|e| AppError::Internal(anyhow::anyhow!("Award encoding failed: {}", e)))?;
            row["user_id"] = serde_json::Value::String(id.to_string());

            client
                .insert(tables::ACHIEVEMENTS, &row)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;

            tracing::info!(
                user_id = id,
                badge = %award.badge_awarded,
                points = award.points_earned,
                "Achievement awarded"
            );
            badges.push(award.badge_awarded.clone());
            granted.push(award.badge_awarded.clone());
        }

        client
            .update(
                tables::PROFILES,
                &[eq("id", id)],
                &serde_json::json!({ "achievement_badges": badges, "updated_at": now_rfc3339() }),
            )
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(granted)
    }
}
