// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Prep-Portal gateway
//!
//! Application root for the preparedness portal: owns the single auth
//! context, follows the Supabase session and serves the resolved state to
//! the frontend.

use prep_portal::{
    auth::{AuthContext, AuthServices, BootstrapSettings},
    config::Config,
    db::SupabaseClient,
    services::{
        MemoryStorage, PortalTables, PostgrestAchievements, PostgrestDashboard, PostgrestProfiles,
        PostgrestTelemetry, SupabaseAuth,
    },
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Prep-Portal gateway");

    // One client: the auth adapter and the table adapters share its session
    let client = SupabaseClient::new(&config.supabase_url, &config.supabase_anon_key);
    let authority = Arc::new(SupabaseAuth::new(
        client.clone(),
        &config.supabase_jwt_secret,
        &config.frontend_url,
    ));
    let tables = PortalTables::new(client.clone());

    let services = AuthServices {
        authority: authority.clone(),
        profiles: Arc::new(PostgrestProfiles::new(client.clone())),
        dashboard: Arc::new(PostgrestDashboard::new(tables.clone())),
        telemetry: Arc::new(PostgrestTelemetry::new(client)),
        achievements: Arc::new(PostgrestAchievements::new(tables)),
        storage: Arc::new(MemoryStorage::new()),
    };
    let settings = BootstrapSettings {
        profile_fetch_timeout: config.profile_fetch_timeout,
        ..BootstrapSettings::default()
    };

    let auth = AuthContext::new(services, settings);
    auth.mount();
    tracing::info!(
        supabase_url = %config.supabase_url,
        fetch_timeout_secs = config.profile_fetch_timeout.as_secs(),
        "Auth context mounted"
    );

    let state = Arc::new(AppState {
        config: config.clone(),
        auth: auth.clone(),
        sessions: authority,
    });

    // Build router
    let app = prep_portal::routes::create_router(state);

    // Start server
    let addr = std::net::SocketAddr::new(config.bind_addr, config.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    auth.unmount();
    auth.background().flush().await;
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("prep_portal=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
