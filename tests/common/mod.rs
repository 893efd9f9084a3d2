// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use pushreq::db;
use pushreq::db::models::FileRel;
use pushreq::index::service::{self, Upload};
use pushreq::index::{ConfigPatch, RequestContext};
use rusqlite::Connection;
use serde_json::{Map, Value, json};
use tempfile::TempDir;

/// Owner of the target index
pub const TARGET_OWNER: &str = "alice";
/// Owner of the staging index
pub const REQUESTER: &str = "bob";
/// Target of every push request
pub const TARGET: &str = "alice/prod";
/// Staging index created by [`create_push_request`]
pub const PR_INDEX: &str = "+pr-fix";
pub const PR_FULL_NAME: &str = "bob/+pr-fix";

/// Create an empty store with the root user.
///
/// Returns (TempDir, db_path) - keep the TempDir alive to prevent cleanup.
pub fn setup_store() -> (TempDir, String) {
    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir
        .path()
        .join("pushreq.db")
        .to_str()
        .unwrap()
        .to_string();

    db::init(&db_path).unwrap();
    let mut conn = db::open(&db_path).unwrap();
    service::ensure_root_user(&mut conn, "root").unwrap();
    (temp_dir, db_path)
}

pub fn ctx(user: &str) -> RequestContext {
    RequestContext::user(user)
}

pub fn body(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

pub fn ops(items: &[&str]) -> ConfigPatch {
    ConfigPatch::Ops(items.iter().map(|s| s.to_string()).collect())
}

/// Users alice, bob and carol; alice owns `alice/prod`
pub fn setup_users_and_target(conn: &mut Connection, push_requests_allowed: bool, volatile: bool) {
    for user in ["alice", "bob", "carol"] {
        service::create_user(conn, &ctx(user), user).unwrap();
    }
    service::create_index(
        conn,
        &ctx(TARGET_OWNER),
        TARGET_OWNER,
        "prod",
        &body(json!({
            "push_requests_allowed": push_requests_allowed,
            "volatile": volatile,
        })),
    )
    .unwrap();
}

/// bob creates `bob/+pr-fix` targeting `alice/prod`
pub fn create_push_request(conn: &mut Connection) {
    service::create_index(
        conn,
        &ctx(REQUESTER),
        REQUESTER,
        PR_INDEX,
        &body(json!({
            "type": "merge",
            "bases": TARGET,
            "states": ["new"],
            "messages": ["New push request"],
        })),
    )
    .unwrap();
}

pub fn release_upload<'a>(project: &'a str, version: &'a str, filename: &'a str, content: &'a [u8]) -> Upload<'a> {
    Upload {
        project,
        version,
        filename,
        rel: FileRel::ReleaseFile,
        parent: None,
        content,
    }
}

/// bob uploads `pkg-1.0.tar.gz` into the staging index
pub fn upload_package(conn: &mut Connection) {
    let upload = release_upload("pkg", "1.0", "pkg-1.0.tar.gz", b"pkg 1.0 sdist");
    service::upload(conn, &ctx(REQUESTER), REQUESTER, PR_INDEX, &upload).unwrap();
}

/// bob submits the staging index with "Please approve"
pub fn submit(conn: &mut Connection) {
    service::patch_index(
        conn,
        &ctx(REQUESTER),
        REQUESTER,
        PR_INDEX,
        &ops(&["states+=pending", "messages+=Please approve"]),
    )
    .unwrap();
}

/// A pending push request with one uploaded release
pub fn pending_push_request(push_requests_allowed: bool, volatile: bool) -> (TempDir, String, Connection) {
    let (dir, db_path) = setup_store();
    let mut conn = db::open(&db_path).unwrap();
    setup_users_and_target(&mut conn, push_requests_allowed, volatile);
    create_push_request(&mut conn);
    upload_package(&mut conn);
    submit(&mut conn);
    (dir, db_path, conn)
}
