// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profile store backed by the `profiles` table.

use async_trait::async_trait;
use serde::Serialize;

use crate::db::postgrest::eq;
use crate::db::{tables, PostgrestError, PostgrestErrorKind, SupabaseClient};
use crate::error::{AppError, Result};
use crate::models::{NewProfile, Profile, ProfileUpdate};
use crate::services::ports::ProfileStore;

/// PostgREST-backed profile store.
#[derive(Clone)]
pub struct PostgrestProfiles {
    client: SupabaseClient,
}

impl PostgrestProfiles {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }
}

/// Row body: the key plus the payload's columns.
#[derive(Serialize)]
struct Keyed<'a, T: Serialize> {
    id: &'a str,
    #[serde(flatten)]
    body: &'a T,
}

/// Map a failed read; only a missing row means "new user".
pub fn fetch_error(id: &str, err: PostgrestError) -> AppError {
    match err.kind() {
        PostgrestErrorKind::NotFound => AppError::ProfileNotFound(id.to_string()),
        _ => AppError::ProfileFetchError(err.to_string()),
    }
}

/// Map a failed insert; a duplicate key means another bootstrap won.
pub fn create_error(id: &str, err: PostgrestError) -> AppError {
    match err.kind() {
        PostgrestErrorKind::Conflict => AppError::ProfileCreateConflict(id.to_string()),
        _ => AppError::ProfileCreateError(err.to_string()),
    }
}

#[async_trait]
impl ProfileStore for PostgrestProfiles {
    async fn get_by_id(&self, id: &str) -> Result<Profile> {
        self.client
            .select_one(tables::PROFILES, &[eq("id", id)])
            .await
            .map_err(|e| fetch_error(id, e))
    }

    async fn create(&self, id: &str, defaults: &NewProfile) -> Result<Profile> {
        let row = Keyed { id, body: defaults };
        let profile: Profile = self
            .client
            .insert_one(tables::PROFILES, &row)
            .await
            .map_err(|e| create_error(id, e))?;

        tracing::info!(user_id = id, "Created default profile");
        Ok(profile)
    }

    async fn upsert(&self, id: &str, partial: &ProfileUpdate) -> Result<Profile> {
        let row = Keyed { id, body: partial };
        self.client
            .upsert_one(tables::PROFILES, &row)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
