// src/server/handlers/pr.rs
//! Push request listings

use super::{api_ok, run_blocking};
use crate::pr;
use crate::server::{ApiError, ServerState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Response,
};
use std::sync::Arc;
use tokio::sync::RwLock;

/// GET /:user/:index/+pr-list
pub async fn index_listing(
    State(state): State<Arc<RwLock<ServerState>>>,
    Path((user, index)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let listing = run_blocking(&state, move |conn| pr::index_listing(conn, &user, &index)).await?;
    Ok(api_ok(StatusCode::OK, "pr-list", listing))
}

/// GET /:user/+pr-list
pub async fn user_listing(
    State(state): State<Arc<RwLock<ServerState>>>,
    Path(user): Path<String>,
) -> Result<Response, ApiError> {
    let listing = run_blocking(&state, move |conn| pr::user_listing(conn, &user)).await?;
    Ok(api_ok(StatusCode::OK, "pr-list", listing))
}
