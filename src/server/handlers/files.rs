// src/server/handlers/files.rs
//! Release upload, push and link handlers

use super::{api_ok, context_for, parse_body, run_blocking};
use crate::db::models::FileRel;
use crate::index::service::{self, PushRequest, Upload};
use crate::server::{ApiError, ServerState};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Response,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Query parameters of an upload
#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    /// `releasefile` (default), `doczip` or `toxresult`
    pub rel: Option<String>,
    /// Release file a toxresult belongs to
    #[serde(rename = "for")]
    pub for_file: Option<String>,
}

/// POST /:user/:index/+upload/:project/:version/:filename
pub async fn upload(
    State(state): State<Arc<RwLock<ServerState>>>,
    Path((user, index, project, version, filename)): Path<(String, String, String, String, String)>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let ctx = context_for(&state, &headers).await;
    let rel: FileRel = match query.rel.as_deref() {
        None => FileRel::ReleaseFile,
        Some(rel) => rel.parse().map_err(ApiError::bad_request)?,
    };
    if rel == FileRel::ToxResult && query.for_file.is_none() {
        return Err(ApiError::bad_request("toxresult upload needs a 'for' release file"));
    }

    let file = run_blocking(&state, move |conn| {
        let upload = Upload {
            project: &project,
            version: &version,
            filename: &filename,
            rel,
            parent: query.for_file.as_deref(),
            content: &body,
        };
        service::upload(conn, &ctx, &user, &index, &upload)
    })
    .await?;

    Ok(api_ok(
        StatusCode::CREATED,
        "releasefile",
        json!({
            "basename": file.basename,
            "rel": file.rel.as_str(),
            "hash_spec": format!("sha256={}", file.blob_hash),
            "last_serial": file.last_serial,
        }),
    ))
}

/// POST /:user/:index/+push
pub async fn push(
    State(state): State<Arc<RwLock<ServerState>>>,
    Path((user, index)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let ctx = context_for(&state, &headers).await;
    let request: Option<PushRequest> = parse_body(&body, None)?;
    let request = request.ok_or_else(|| ApiError::bad_request("push needs a JSON body"))?;
    let summary = json!({
        "name": request.name,
        "version": request.version,
        "targetindex": request.targetindex,
    });

    let files = run_blocking(&state, move |conn| {
        service::push_release(conn, &ctx, &user, &index, &request)
    })
    .await?;

    let mut result = summary;
    result["files"] = json!(files);
    Ok(api_ok(StatusCode::OK, "push", result))
}

/// GET /:user/:index/+files/:project
pub async fn project_links(
    State(state): State<Arc<RwLock<ServerState>>>,
    Path((user, index, project)): Path<(String, String, String)>,
) -> Result<Response, ApiError> {
    let links = run_blocking(&state, move |conn| {
        service::project_links(conn, &user, &index, &project)
    })
    .await?;
    Ok(api_ok(StatusCode::OK, "projectlinks", links))
}
