// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Supabase client wrapper with typed REST operations.
//!
//! Provides:
//! - Auth endpoints (`/auth/v1/...`) used by the authority adapter
//! - PostgREST table access (`/rest/v1/...`) used by the profile, dashboard,
//!   telemetry and achievement adapters
//!
//! Requests carry the project `apikey` and, once signed in, the user's access
//! token so row-level security applies.

use crate::models::Session;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};

/// PostgREST code for "single object requested, zero rows returned".
pub const PGRST_NO_ROWS: &str = "PGRST116";
/// Postgres unique-violation code.
pub const PG_UNIQUE_VIOLATION: &str = "23505";

const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

/// Session shared between the auth adapter (writer) and table adapters (readers).
pub type SessionSlot = Arc<RwLock<Option<Session>>>;

/// Coarse classification of a failed REST call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostgrestErrorKind {
    NotFound,
    Conflict,
    Unauthorized,
    Transport,
    Other,
}

/// Error returned by the REST layer before it is mapped to an `AppError`.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message} (status {status}, code {code:?})")]
pub struct PostgrestError {
    pub status: u16,
    pub code: Option<String>,
    pub message: String,
}

impl PostgrestError {
    fn transport(err: reqwest::Error) -> Self {
        Self {
            status: 0,
            code: None,
            message: err.to_string(),
        }
    }

    /// Build from a non-success response status and body.
    pub fn from_response(status: u16, body: &str) -> Self {
        #[derive(Deserialize)]
        struct Body {
            code: Option<String>,
            message: Option<String>,
            #[serde(alias = "error_description", alias = "msg")]
            details: Option<String>,
        }

        match serde_json::from_str::<Body>(body) {
            Ok(parsed) => Self {
                status,
                code: parsed.code,
                message: parsed
                    .message
                    .or(parsed.details)
                    .unwrap_or_else(|| format!("HTTP {}", status)),
            },
            Err(_) => Self {
                status,
                code: None,
                message: if body.is_empty() {
                    format!("HTTP {}", status)
                } else {
                    format!("HTTP {}: {}", status, body)
                },
            },
        }
    }

    pub fn kind(&self) -> PostgrestErrorKind {
        match (self.status, self.code.as_deref()) {
            (0, _) => PostgrestErrorKind::Transport,
            (_, Some(PGRST_NO_ROWS)) => PostgrestErrorKind::NotFound,
            (_, Some(PG_UNIQUE_VIOLATION)) | (409, _) => PostgrestErrorKind::Conflict,
            (401, _) | (403, _) => PostgrestErrorKind::Unauthorized,
            _ => PostgrestErrorKind::Other,
        }
    }
}

/// Supabase HTTP client.
#[derive(Clone)]
pub struct SupabaseClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    session: SessionSlot,
}

impl SupabaseClient {
    /// Create a client for a project URL and anonymous key.
    pub fn new(base_url: &str, anon_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            session: Arc::new(RwLock::new(None)),
        }
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn current_session(&self) -> Option<Session> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn store_session(&self, session: Option<Session>) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = session;
    }

    pub fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    /// Standard headers; bearer is the user token when signed in, else the anon key.
    pub fn headers(&self, access_token: Option<&str>) -> HeaderMap {
        let token = access_token
            .map(str::to_string)
            .or_else(|| self.current_session().map(|s| s.access_token))
            .unwrap_or_else(|| self.anon_key.clone());

        let mut headers = HeaderMap::new();
        if let Ok(v) = HeaderValue::from_str(&self.anon_key) {
            headers.insert("apikey", v);
        }
        if let Ok(v) = HeaderValue::from_str(&format!("Bearer {}", token)) {
            headers.insert(reqwest::header::AUTHORIZATION, v);
        }
        headers
    }

    // ─── Table Operations ────────────────────────────────────────

    /// Select exactly one row; zero rows surfaces as `PGRST116`.
    pub async fn select_one<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[(&str, String)],
    ) -> Result<T, PostgrestError> {
        let response = self
            .http
            .get(self.rest_url(table))
            .headers(self.headers(None))
            .header(ACCEPT, SINGLE_OBJECT)
            .query(&[("select", "*")])
            .query(filters)
            .send()
            .await
            .map_err(PostgrestError::transport)?;

        check_response_json(response).await
    }

    /// Select rows with arbitrary PostgREST query parameters.
    pub async fn select_many<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, PostgrestError> {
        let response = self
            .http
            .get(self.rest_url(table))
            .headers(self.headers(None))
            .query(query)
            .send()
            .await
            .map_err(PostgrestError::transport)?;

        check_response_json(response).await
    }

    /// Insert one row and return the stored representation.
    pub async fn insert_one<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        table: &str,
        body: &B,
    ) -> Result<T, PostgrestError> {
        let response = self
            .http
            .post(self.rest_url(table))
            .headers(self.headers(None))
            .header(ACCEPT, SINGLE_OBJECT)
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await
            .map_err(PostgrestError::transport)?;

        check_response_json(response).await
    }

    /// Insert without reading the row back.
    pub async fn insert<B: Serialize + ?Sized>(
        &self,
        table: &str,
        body: &B,
    ) -> Result<(), PostgrestError> {
        let response = self
            .http
            .post(self.rest_url(table))
            .headers(self.headers(None))
            .header("Prefer", "return=minimal")
            .json(body)
            .send()
            .await
            .map_err(PostgrestError::transport)?;

        check_response(response).await
    }

    /// Insert-or-merge one row keyed by its primary key.
    pub async fn upsert_one<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        table: &str,
        body: &B,
    ) -> Result<T, PostgrestError> {
        let response = self
            .http
            .post(self.rest_url(table))
            .headers(self.headers(None))
            .header(ACCEPT, SINGLE_OBJECT)
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(body)
            .send()
            .await
            .map_err(PostgrestError::transport)?;

        check_response_json(response).await
    }

    /// Patch rows matching `filters`.
    pub async fn update<B: Serialize + ?Sized>(
        &self,
        table: &str,
        filters: &[(&str, String)],
        body: &B,
    ) -> Result<(), PostgrestError> {
        let response = self
            .http
            .patch(self.rest_url(table))
            .headers(self.headers(None))
            .header("Prefer", "return=minimal")
            .query(filters)
            .json(body)
            .send()
            .await
            .map_err(PostgrestError::transport)?;

        check_response(response).await
    }
}

/// `column=eq.value` filter.
pub fn eq(column: &'static str, value: &str) -> (&'static str, String) {
    (column, format!("eq.{}", value))
}

/// Check response status and return error if not successful.
pub async fn check_response(response: reqwest::Response) -> Result<(), PostgrestError> {
    if response.status().is_success() {
        return Ok(());
    }

    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(PostgrestError::from_response(status, &body))
}

/// Check response and parse JSON body.
pub async fn check_response_json<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, PostgrestError> {
    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(PostgrestError::from_response(status, &body));
    }

    let status = response.status().as_u16();
    response.json().await.map_err(|e| PostgrestError {
        status,
        code: None,
        message: format!("JSON parse error: {}", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_rows_is_not_found() {
        let err = PostgrestError::from_response(
            406,
            r#"{"code":"PGRST116","details":"The result contains 0 rows","hint":null,"message":"JSON object requested, multiple (or no) rows returned"}"#,
        );
        assert_eq!(err.kind(), PostgrestErrorKind::NotFound);
        assert_eq!(err.code.as_deref(), Some(PGRST_NO_ROWS));
    }

    #[test]
    fn test_unique_violation_is_conflict() {
        let err = PostgrestError::from_response(
            409,
            r#"{"code":"23505","message":"duplicate key value violates unique constraint \"profiles_pkey\""}"#,
        );
        assert_eq!(err.kind(), PostgrestErrorKind::Conflict);
        assert!(err.message.contains("duplicate key"));
    }

    #[test]
    fn test_other_statuses() {
        assert_eq!(
            PostgrestError::from_response(401, "").kind(),
            PostgrestErrorKind::Unauthorized
        );
        let err = PostgrestError::from_response(500, "upstream exploded");
        assert_eq!(err.kind(), PostgrestErrorKind::Other);
        assert!(err.message.contains("upstream exploded"));
        // A 406 without the no-rows code is not a missing profile
        assert_eq!(
            PostgrestError::from_response(406, r#"{"code":"PGRST102"}"#).kind(),
            PostgrestErrorKind::Other
        );
        // A 404 is a missing relation, not a missing row
        assert_eq!(
            PostgrestError::from_response(
                404,
                r#"{"code":"PGRST205","message":"Could not find the table 'public.profiles' in the schema cache"}"#
            )
            .kind(),
            PostgrestErrorKind::Other
        );
    }

    #[test]
    fn test_urls_and_filters() {
        let client = SupabaseClient::new("https://proj.supabase.co/", "anon");
        assert_eq!(
            client.rest_url("profiles"),
            "https://proj.supabase.co/rest/v1/profiles"
        );
        assert_eq!(
            client.auth_url("/user"),
            "https://proj.supabase.co/auth/v1/user"
        );
        assert_eq!(eq("id", "u1"), ("id", "eq.u1".to_string()));

        let headers = client.headers(None);
        assert_eq!(headers.get("apikey").unwrap(), "anon");
        assert_eq!(headers.get("authorization").unwrap(), "Bearer anon");
    }
}
