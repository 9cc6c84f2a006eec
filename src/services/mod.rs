// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - collaborator ports and their Supabase adapters.

pub mod achievements;
pub mod background;
pub mod dashboard;
pub mod ports;
pub mod profiles;
pub mod storage;
pub mod supabase_auth;
pub mod telemetry;

pub use achievements::PostgrestAchievements;
pub use background::BackgroundTasks;
pub use dashboard::{PortalTables, PostgrestDashboard};
pub use ports::{
    AchievementEvaluator, AuthSubscription, Authority, DashboardAggregator, ProfileStore,
    SessionExchange, TelemetrySink, Unsubscribe,
};
pub use profiles::PostgrestProfiles;
pub use storage::{LocalStorage, MemoryStorage};
pub use supabase_auth::SupabaseAuth;
pub use telemetry::PostgrestTelemetry;
