// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Dashboard snapshot: a derived, non-persisted read model.
//!
//! Assembled from the profile plus progress, achievement and drill rows.
//! Nothing invalidates it; consumers reload on demand.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::Profile;

/// Status value marking a finished module or drill.
pub const STATUS_COMPLETED: &str = "completed";

/// Row from `user_module_progress`, joined with its module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
pub struct ModuleProgress {
    pub module_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub progress_percentage: Option<f64>,
    #[serde(default)]
    pub last_accessed_at: Option<String>,
    #[serde(default)]
    pub learning_modules: Option<ModuleSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
pub struct ModuleSummary {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub difficulty_level: Option<String>,
    #[serde(default)]
    pub estimated_duration: Option<u32>,
}

/// Row from `user_achievements`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
pub struct Achievement {
    pub achievement_type: String,
    #[serde(default)]
    #[cfg_attr(feature = "binding-generation", ts(type = "unknown"))]
    pub achievement_data: serde_json::Value,
    #[serde(default)]
    pub points_earned: u32,
    #[serde(default)]
    pub badge_awarded: Option<String>,
    #[serde(default)]
    pub earned_at: Option<String>,
}

/// Row from `user_drill_participation`, joined with its drill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
pub struct DrillParticipation {
    pub drill_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub emergency_drills: Option<DrillSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
pub struct DrillSummary {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub drill_type: Option<String>,
    #[serde(default)]
    pub difficulty_level: Option<String>,
}

/// Headline numbers shown on every portal dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
pub struct DashboardStatistics {
    pub modules_completed: u32,
    pub total_progress: u32,
    pub achievement_count: u32,
    pub drills_completed: u32,
    pub total_credits: u32,
    pub current_streak: u32,
}

/// Aggregate of everything a dashboard renders for one user.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DashboardSnapshot {
    pub profile: Option<Profile>,
    pub progress: Vec<ModuleProgress>,
    pub achievements: Vec<Achievement>,
    pub drills: Vec<DrillParticipation>,
    pub statistics: DashboardStatistics,
}

impl DashboardSnapshot {
    /// Build a snapshot and its statistics from the individual reads.
    pub fn assemble(
        profile: Option<Profile>,
        progress: Vec<ModuleProgress>,
        achievements: Vec<Achievement>,
        drills: Vec<DrillParticipation>,
    ) -> Self {
        let statistics = DashboardStatistics {
            modules_completed: completed_modules(&progress),
            total_progress: progress.len() as u32,
            achievement_count: achievements.len() as u32,
            drills_completed: drills.iter().filter(|d| d.status == STATUS_COMPLETED).count()
                as u32,
            total_credits: profile.as_ref().map_or(0, |p| p.academic_credits),
            current_streak: profile.as_ref().map_or(0, |p| p.current_streak_days),
        };

        Self {
            profile,
            progress,
            achievements,
            drills,
            statistics,
        }
    }
}

/// Number of modules in the completed state.
pub fn completed_modules(progress: &[ModuleProgress]) -> u32 {
    progress
        .iter()
        .filter(|p| p.status == STATUS_COMPLETED)
        .count() as u32
}

/// Achievement about to be written to `user_achievements`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AchievementAward {
    pub achievement_type: String,
    pub achievement_data: serde_json::Value,
    pub points_earned: u32,
    pub badge_awarded: String,
}

/// Telemetry row written to `user_sessions` on every bootstrap.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionMetadata {
    pub device_info: String,
    /// Resolved by the backend; `auto` asks it to record the caller's address.
    pub ip_address: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(status: &str) -> ModuleProgress {
        ModuleProgress {
            module_id: "m".to_string(),
            status: status.to_string(),
            progress_percentage: None,
            last_accessed_at: None,
            learning_modules: None,
        }
    }

    #[test]
    fn test_assemble_without_profile_defaults_counters() {
        let snapshot = DashboardSnapshot::assemble(
            None,
            vec![progress("completed"), progress("in_progress")],
            vec![],
            vec![],
        );
        assert_eq!(snapshot.statistics.modules_completed, 1);
        assert_eq!(snapshot.statistics.total_progress, 2);
        assert_eq!(snapshot.statistics.total_credits, 0);
        assert_eq!(snapshot.statistics.current_streak, 0);
    }

    #[test]
    fn test_progress_row_with_module_join() {
        let row = serde_json::json!({
            "module_id": "flood-101",
            "status": "completed",
            "learning_modules": {
                "id": "flood-101",
                "title": "Flood Safety",
                "category": "flood",
                "estimated_duration": 30
            }
        });
        let parsed: ModuleProgress = serde_json::from_value(row).unwrap();
        assert_eq!(parsed.learning_modules.unwrap().title, "Flood Safety");
    }
}
