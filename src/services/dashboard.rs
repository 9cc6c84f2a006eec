// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Dashboard aggregation over the progress, achievement and drill tables.

use async_trait::async_trait;

use crate::db::postgrest::eq;
use crate::db::{tables, SupabaseClient};
use crate::error::Result;
use crate::models::{Achievement, DashboardSnapshot, DrillParticipation, ModuleProgress, Profile};
use crate::services::ports::DashboardAggregator;

const PROGRESS_SELECT: &str =
    "*,learning_modules(id,title,category,difficulty_level,estimated_duration)";
const DRILL_SELECT: &str = "*,emergency_drills(id,title,drill_type,difficulty_level)";

/// Reads shared by the aggregator and the achievement evaluator.
#[derive(Clone)]
pub struct PortalTables {
    client: SupabaseClient,
}

impl PortalTables {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &SupabaseClient {
        &self.client
    }

    pub async fn profile(&self, user_id: &str) -> Result<Profile> {
        self.client
            .select_one(tables::PROFILES, &[eq("id", user_id)])
            .await
            .map_err(|e| crate::services::profiles::fetch_error(user_id, e))
    }

    pub async fn progress(&self, user_id: &str) -> Result<Vec<ModuleProgress>> {
        self.client
            .select_many(
                tables::MODULE_PROGRESS,
                &[("select", PROGRESS_SELECT.to_string()), eq("user_id", user_id)],
            )
            .await
            .map_err(|e| crate::error::AppError::Database(e.to_string()))
    }

    /// Achievements, newest first.
    pub async fn achievements(&self, user_id: &str) -> Result<Vec<Achievement>> {
        self.client
            .select_many(
                tables::ACHIEVEMENTS,
                &[
                    ("select", "*".to_string()),
                    eq("user_id", user_id),
                    ("order", "earned_at.desc".to_string()),
                ],
            )
            .await
            .map_err(|e| crate::error::AppError::Database(e.to_string()))
    }

    pub async fn drills(&self, user_id: &str) -> Result<Vec<DrillParticipation>> {
        self.client
            .select_many(
                tables::DRILL_PARTICIPATION,
                &[("select", DRILL_SELECT.to_string()), eq("user_id", user_id)],
            )
            .await
            .map_err(|e| crate::error::AppError::Database(e.to_string()))
    }
}

/// Best-effort dashboard: each part that fails to load is left empty.
#[derive(Clone)]
pub struct PostgrestDashboard {
    tables: PortalTables,
}

impl PostgrestDashboard {
    pub fn new(tables: PortalTables) -> Self {
        Self { tables }
    }
}

fn or_empty<T: Default>(part: &'static str, user_id: &str, result: Result<T>) -> T {
    result.unwrap_or_else(|e| {
        tracing::warn!(part, user_id, error = %e, "Dashboard part unavailable");
        T::default()
    })
}

#[async_trait]
impl DashboardAggregator for PostgrestDashboard {
    async fn compute_snapshot(&self, id: &str) -> Result<DashboardSnapshot> {
        let (profile, progress, achievements, drills) = tokio::join!(
            self.tables.profile(id),
            self.tables.progress(id),
            self.tables.achievements(id),
            self.tables.drills(id),
        );

        let profile = match profile {
            Ok(p) => Some(p),
            Err(e) => {
                tracing::warn!(user_id = id, error = %e, "Dashboard profile unavailable");
                None
            }
        };

        let snapshot = DashboardSnapshot::assemble(
            profile,
            or_empty("progress", id, progress),
            or_empty("achievements", id, achievements),
            or_empty("drills", id, drills),
        );

        tracing::debug!(
            user_id = id,
            modules_completed = snapshot.statistics.modules_completed,
            drills_completed = snapshot.statistics.drills_completed,
            "Dashboard snapshot computed"
        );
        Ok(snapshot)
    }
}
