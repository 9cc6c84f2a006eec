// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.

use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

/// Upper bound on a single profile fetch before falling back to the default role.
pub const DEFAULT_PROFILE_FETCH_TIMEOUT_SECS: u64 = 10;

/// How long access guards wait on `loading` before offering recovery.
pub const DEFAULT_LOADING_BACKSTOP_SECS: u64 = 15;

/// Interface the gateway listens on unless `BIND_ADDR` says otherwise.
///
/// The gateway serves a single process-wide session, so it is only
/// reachable from the local machine by default.
pub const DEFAULT_BIND_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Supabase project URL, e.g. `https://abc.supabase.co`
    pub supabase_url: String,
    /// Supabase anonymous API key (public, sent as `apikey`)
    pub supabase_anon_key: String,
    /// Frontend URL for OAuth redirects
    pub frontend_url: String,
    /// Listen address
    pub bind_addr: IpAddr,
    /// Server port
    pub port: u16,
    /// Bound on profile fetches during bootstrap
    pub profile_fetch_timeout: Duration,
    /// Consumer-side backstop on the loading flag
    pub loading_backstop: Duration,

    // --- Secrets ---
    /// JWT secret used by the project to sign access tokens (raw bytes)
    pub supabase_jwt_secret: Vec<u8>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// A `.env` file in the working directory is honored for local development.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            supabase_url: env::var("SUPABASE_URL")
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .map_err(|_| ConfigError::Missing("SUPABASE_URL"))?,
            supabase_anon_key: env::var("SUPABASE_ANON_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("SUPABASE_ANON_KEY"))?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            bind_addr: match env::var("BIND_ADDR") {
                Ok(raw) => raw
                    .trim()
                    .parse::<IpAddr>()
                    .map_err(|_| ConfigError::Invalid("BIND_ADDR", raw))?,
                Err(_) => DEFAULT_BIND_ADDR,
            },
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            profile_fetch_timeout: seconds_var(
                "PROFILE_FETCH_TIMEOUT_SECS",
                DEFAULT_PROFILE_FETCH_TIMEOUT_SECS,
            )?,
            loading_backstop: seconds_var(
                "AUTH_LOADING_BACKSTOP_SECS",
                DEFAULT_LOADING_BACKSTOP_SECS,
            )?,
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .map_err(|_| ConfigError::Missing("SUPABASE_JWT_SECRET"))?
                .trim()
                .as_bytes()
                .to_vec(),
        })
    }

    /// Config for tests: local URLs and the default timeouts.
    pub fn test_default() -> Self {
        Self {
            supabase_url: "http://127.0.0.1:54321".to_string(),
            supabase_anon_key: "test_anon_key".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            bind_addr: DEFAULT_BIND_ADDR,
            port: 8080,
            profile_fetch_timeout: Duration::from_secs(DEFAULT_PROFILE_FETCH_TIMEOUT_SECS),
            loading_backstop: Duration::from_secs(DEFAULT_LOADING_BACKSTOP_SECS),
            supabase_jwt_secret: b"test_jwt_secret_32_bytes_minimum!".to_vec(),
        }
    }
}

fn seconds_var(name: &'static str, default: u64) -> Result<Duration, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .ok_or(ConfigError::Invalid(name, raw)),
        Err(_) => Ok(Duration::from_secs(default)),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}
