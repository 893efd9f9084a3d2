// src/server/handlers/index.rs
//! User and index configuration handlers

use super::{api_ok, context_for, parse_body, run_blocking};
use crate::db::models::IndexEntry;
use crate::index::service;
use crate::index::ConfigPatch;
use crate::server::{ApiError, ServerState};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Response,
};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Index configuration as returned to clients
fn index_json(entry: &IndexEntry) -> Result<Value, ApiError> {
    let mut value = serde_json::to_value(&entry.config).map_err(|e| ApiError(e.into()))?;
    if let Value::Object(map) = &mut value {
        map.insert("name".to_string(), json!(entry.full_name()));
        map.insert("config_serial".to_string(), json!(entry.config_serial));
        map.insert("last_serial".to_string(), json!(entry.last_serial));
    }
    Ok(value)
}

/// PUT /:user
pub async fn put_user(
    State(state): State<Arc<RwLock<ServerState>>>,
    Path(user): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let ctx = context_for(&state, &headers).await;
    let created = run_blocking(&state, move |conn| service::create_user(conn, &ctx, &user)).await?;
    Ok(api_ok(
        StatusCode::CREATED,
        "userconfig",
        json!({ "username": created.name }),
    ))
}

/// GET /:user/:index
pub async fn get_index(
    State(state): State<Arc<RwLock<ServerState>>>,
    Path((user, index)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let entry = run_blocking(&state, move |conn| service::get_index(conn, &user, &index)).await?;
    Ok(api_ok(StatusCode::OK, "indexconfig", index_json(&entry)?))
}

/// PUT /:user/:index
pub async fn put_index(
    State(state): State<Arc<RwLock<ServerState>>>,
    Path((user, index)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let ctx = context_for(&state, &headers).await;
    let config: Map<String, Value> = parse_body(&body, Map::new())?;

    let entry = run_blocking(&state, move |conn| {
        service::create_index(conn, &ctx, &user, &index, &config)
    })
    .await?;
    info!("Created index {}", entry.full_name());
    Ok(api_ok(StatusCode::CREATED, "indexconfig", index_json(&entry)?))
}

/// PATCH /:user/:index
pub async fn patch_index(
    State(state): State<Arc<RwLock<ServerState>>>,
    Path((user, index)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let ctx = context_for(&state, &headers).await;
    let patch: ConfigPatch = parse_body(&body, ConfigPatch::Ops(Vec::new()))?;

    let entry = run_blocking(&state, move |conn| {
        service::patch_index(conn, &ctx, &user, &index, &patch)
    })
    .await?;
    Ok(api_ok(StatusCode::OK, "indexconfig", index_json(&entry)?))
}

/// DELETE /:user/:index
pub async fn delete_index(
    State(state): State<Arc<RwLock<ServerState>>>,
    Path((user, index)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let ctx = context_for(&state, &headers).await;
    let name = format!("{user}/{index}");
    run_blocking(&state, move |conn| service::delete_index(conn, &ctx, &user, &index)).await?;
    Ok(api_ok(
        StatusCode::OK,
        "deleted",
        json!({ "name": name }),
    ))
}
