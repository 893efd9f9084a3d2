// tests/server.rs

//! HTTP round trips through the axum router.

#![cfg(feature = "server")]

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use pushreq::server::{ServerConfig, ServerState, create_router, prepare_database};
use serde_json::{Value, json};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::RwLock;
use tower::ServiceExt;

fn setup() -> (TempDir, Router) {
    let dir = tempfile::tempdir().unwrap();
    let config = ServerConfig {
        db_path: dir.path().join("pushreq.db"),
        ..ServerConfig::default()
    };
    prepare_database(&config).unwrap();
    let state = Arc::new(RwLock::new(ServerState::new(config)));
    (dir, create_router(state))
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    user: Option<&str>,
    headers: &[(&str, &str)],
    body: Body,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("X-Pushreq-User", user);
    }
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

fn json_body(value: Value) -> Body {
    Body::from(value.to_string())
}

async fn setup_pending() -> (TempDir, Router) {
    let (dir, app) = setup();
    for user in ["alice", "bob"] {
        let (status, _) = send(&app, "PUT", &format!("/{user}"), Some(user), &[], Body::empty()).await;
        assert_eq!(status, StatusCode::CREATED);
    }
    let (status, _) = send(
        &app,
        "PUT",
        "/alice/prod",
        Some("alice"),
        &[],
        json_body(json!({"push_requests_allowed": true})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &app,
        "PUT",
        "/bob/+pr-fix",
        Some("bob"),
        &[],
        json_body(json!({"type": "merge", "bases": "alice/prod"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["result"]["states"], json!(["new"]));

    let (status, _) = send(
        &app,
        "POST",
        "/bob/+pr-fix/+upload/pkg/1.0/pkg-1.0.tar.gz",
        Some("bob"),
        &[],
        Body::from("pkg 1.0 sdist"),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &app,
        "PATCH",
        "/bob/+pr-fix",
        Some("bob"),
        &[],
        json_body(json!(["states+=pending", "messages+=Please approve"])),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    (dir, app)
}

#[tokio::test]
async fn test_review_and_approve_over_http() {
    let (_dir, app) = setup_pending().await;

    let (status, listing) = send(&app, "GET", "/alice/prod/+pr-list", None, &[], Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing["type"], "pr-list");
    let summary = &listing["result"]["pending"]["bob"][0];
    assert_eq!(summary["name"], "+pr-fix");
    assert_eq!(summary["base"], "alice/prod");
    let serial = summary["last_serial"].as_i64().unwrap().to_string();

    let approve = json!(["states+=approved", "messages+=Looks good"]);
    let (status, body) = send(&app, "PATCH", "/bob/+pr-fix", Some("alice"), &[], json_body(approve.clone())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "missing X-Devpi-PR-Serial request header");

    let (status, body) = send(
        &app,
        "PATCH",
        "/bob/+pr-fix",
        Some("alice"),
        &[("X-Devpi-PR-Serial", &serial)],
        json_body(approve),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["result"]["states"], json!(["new", "pending", "approved"]));

    let (status, links) = send(&app, "GET", "/alice/prod/+files/pkg", None, &[], Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    let log = links["result"]["links"][0]["log"].as_array().unwrap();
    assert_eq!(log.last().unwrap()["what"], "push");
    assert_eq!(log.last().unwrap()["message"], "Looks good");

    let (status, _) = send(&app, "DELETE", "/bob/+pr-fix", Some("alice"), &[], Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "GET", "/bob/+pr-fix", None, &[], Body::empty()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_error_statuses() {
    let (_dir, app) = setup_pending().await;

    // Owner lacks upload rights on the target
    let (status, body) = send(
        &app,
        "PATCH",
        "/bob/+pr-fix",
        Some("bob"),
        &[("X-Devpi-PR-Serial", "1")],
        json_body(json!(["states+=approved", "messages+=mine"])),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().starts_with("got X-Devpi-PR-Serial 1, expected"));

    let (status, body) = send(
        &app,
        "PATCH",
        "/bob/+pr-fix",
        Some("bob"),
        &[],
        json_body(json!(["states+=approved"])),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["errors"],
        json!(["The number of states and messages must match for a merge index", "A state change on a merge index requires a message"])
    );

    let (status, _) = send(
        &app,
        "PATCH",
        "/bob/+pr-fix",
        None,
        &[],
        json_body(json!(["states+=new", "messages+=x"])),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, "PUT", "/carol", Some("bob"), &[], Body::empty()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, "PUT", "/alice/prod", Some("alice"), &[], Body::empty()).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_listing_on_closed_index() {
    let (_dir, app) = setup();
    send(&app, "PUT", "/alice", Some("alice"), &[], Body::empty()).await;
    send(&app, "PUT", "/alice/dev", Some("alice"), &[], Body::empty()).await;

    let (status, body) = send(&app, "GET", "/alice/dev/+pr-list", None, &[], Body::empty()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Push requests to 'alice/dev' not allowed");

    let (status, body) = send(&app, "GET", "/alice/+pr-list", None, &[], Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], json!({}));

    let (status, _) = send(&app, "GET", "/nobody/+pr-list", None, &[], Body::empty()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
