// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Live PostgREST integration tests.
//!
//! These tests require a Supabase project (local `supabase start` works):
//! set SUPABASE_URL and SUPABASE_ANON_KEY. Without them they are skipped.

use prep_portal::db::SupabaseClient;
use prep_portal::error::AppError;
use prep_portal::services::{PortalTables, PostgrestDashboard, PostgrestProfiles};
use prep_portal::services::{DashboardAggregator, ProfileStore};

mod common;

/// Identity id that cannot exist.
fn unique_user_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("00000000-0000-4000-8000-{:012x}", nanos % (1 << 48))
}

fn client() -> SupabaseClient {
    SupabaseClient::new(
        &std::env::var("SUPABASE_URL").unwrap(),
        &std::env::var("SUPABASE_ANON_KEY").unwrap(),
    )
}

#[tokio::test]
async fn test_missing_profile_is_not_found() {
    require_supabase!();

    let profiles = PostgrestProfiles::new(client());
    let err = profiles.get_by_id(&unique_user_id()).await.unwrap_err();

    assert!(
        matches!(err, AppError::ProfileNotFound(_)),
        "expected not found, got {:?}",
        err
    );
}

#[tokio::test]
async fn test_dashboard_for_unknown_user_is_empty() {
    require_supabase!();

    let dashboard = PostgrestDashboard::new(PortalTables::new(client()));
    let snapshot = dashboard
        .compute_snapshot(&unique_user_id())
        .await
        .unwrap();

    assert_eq!(snapshot.profile, None);
    assert!(snapshot.progress.is_empty());
    assert_eq!(snapshot.statistics.modules_completed, 0);
}
