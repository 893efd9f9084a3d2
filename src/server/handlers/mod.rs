// src/server/handlers/mod.rs
//! HTTP request handlers

pub mod files;
pub mod index;
pub mod pr;

use crate::db;
use crate::index::RequestContext;
use crate::server::{ApiError, ServerConfig, ServerState};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Header an approver sends with the serial they reviewed
pub const PR_SERIAL_HEADER: &str = "X-Devpi-PR-Serial";

/// Build the request context from the trusted headers
pub fn request_context(headers: &HeaderMap, config: &ServerConfig) -> RequestContext {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    RequestContext::new(header(&config.user_header))
        .with_root_user(&config.root_user)
        .with_pr_serial(header(PR_SERIAL_HEADER))
}

/// Run a database job on the blocking pool with a fresh connection
pub async fn run_blocking<T, F>(state: &Arc<RwLock<ServerState>>, job: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&mut Connection) -> crate::Result<T> + Send + 'static,
{
    let db_path = state.read().await.config.db_path.clone();

    tokio::task::spawn_blocking(move || {
        let mut conn = db::open(&db_path.to_string_lossy())?;
        job(&mut conn)
    })
    .await
    .map_err(|e| ApiError::internal(format!("Task join error: {e}")))?
    .map_err(ApiError::from)
}

/// Request context for `headers` under the current configuration
pub async fn context_for(state: &Arc<RwLock<ServerState>>, headers: &HeaderMap) -> RequestContext {
    let state = state.read().await;
    request_context(headers, &state.config)
}

/// Successful JSON response: `{"type": kind, "result": result}`
pub fn api_ok<T: Serialize>(status: StatusCode, kind: &str, result: T) -> Response {
    (status, Json(json!({ "type": kind, "result": result }))).into_response()
}

/// Parse an optional JSON body, treating an empty body as `default`
pub fn parse_body<T: serde::de::DeserializeOwned>(body: &[u8], default: T) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(default);
    }
    serde_json::from_slice(body).map_err(|e| ApiError::bad_request(format!("invalid JSON body: {e}")))
}
