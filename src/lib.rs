// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Prep-Portal: session and profile core of a disaster-preparedness
//! education portal.
//!
//! This crate resolves who the signed-in user is and what they may do
//! (student, teacher or admin), keeps that state consistent across
//! auth-state changes, and serves it to the portal frontend.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use auth::AuthContext;
use config::Config;
use services::SessionExchange;
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub auth: AuthContext,
    pub sessions: Arc<dyn SessionExchange>,
}
