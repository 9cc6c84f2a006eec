// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session telemetry: activity timestamps and one row per bootstrap.

use async_trait::async_trait;
use serde::Serialize;

use crate::db::postgrest::eq;
use crate::db::{tables, SupabaseClient};
use crate::error::{AppError, Result};
use crate::models::SessionMetadata;
use crate::services::ports::TelemetrySink;
use crate::time_utils::now_rfc3339;

#[derive(Clone)]
pub struct PostgrestTelemetry {
    client: SupabaseClient,
}

impl PostgrestTelemetry {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }
}

#[derive(Serialize)]
struct SessionRow<'a> {
    user_id: &'a str,
    #[serde(flatten)]
    metadata: &'a SessionMetadata,
}

#[async_trait]
impl TelemetrySink for PostgrestTelemetry {
    async fn record_session(&self, id: &str, metadata: &SessionMetadata) -> Result<()> {
        self.client
            .insert(
                tables::SESSIONS,
                &SessionRow {
                    user_id: id,
                    metadata,
                },
            )
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn touch_activity(&self, id: &str) -> Result<()> {
        self.client
            .update(
                tables::PROFILES,
                &[eq("id", id)],
                &serde_json::json!({ "last_activity_date": now_rfc3339() }),
            )
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
