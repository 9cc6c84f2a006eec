// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client-local cached artifacts (recent searches, per-session scratch data).

use dashmap::DashMap;

/// Key under which the search box keeps its recent queries.
pub const RECENT_SEARCHES_KEY: &str = "recentSearches";

/// Client-local storage cleared on sign-out.
///
/// Mirrors the two scopes a browser offers: durable entries that survive
/// restarts and session entries dropped wholesale.
pub trait LocalStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String);
    fn remove(&self, key: &str);

    fn session_get(&self, key: &str) -> Option<String>;
    fn session_set(&self, key: &str, value: String);
    /// Drop every session-scoped entry.
    fn clear_session(&self);
}

/// In-process storage used by the gateway and tests.
#[derive(Default)]
pub struct MemoryStorage {
    durable: DashMap<String, String>,
    session: DashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.durable.get(key).map(|v| v.clone())
    }

    fn set(&self, key: &str, value: String) {
        self.durable.insert(key.to_string(), value);
    }

    fn remove(&self, key: &str) {
        self.durable.remove(key);
    }

    fn session_get(&self, key: &str) -> Option<String> {
        self.session.get(key).map(|v| v.clone())
    }

    fn session_set(&self, key: &str, value: String) {
        self.session.insert(key.to_string(), value);
    }

    fn clear_session(&self) {
        self.session.clear();
    }
}

/// Remove everything sign-out must not leave behind.
pub fn clear_signed_out_artifacts(storage: &dyn LocalStorage) {
    storage.remove(RECENT_SEARCHES_KEY);
    storage.clear_session();
}
