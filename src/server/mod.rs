// src/server/mod.rs
//! HTTP server for indexes and push requests
//!
//! The server exposes the index layer over a small REST surface:
//! - `PUT /:user` creates a user
//! - `GET|PUT|PATCH|DELETE /:user/:index` manages an index
//! - `POST /:user/:index/+upload/...` and `+push` store releases
//! - `GET .../+pr-list` returns the push request listings
//!
//! Authentication happens in front of the server; the acting principal is
//! read from a trusted request header.

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;

pub use config::PushreqConfig;
pub use error::ApiError;
pub use routes::create_router;

use crate::db;
use crate::index::DEFAULT_ROOT_USER;
use crate::index::service;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,
    /// SQLite database holding users, indexes and releases
    pub db_path: PathBuf,
    /// Header carrying the authenticated principal
    pub user_header: String,
    /// Superuser holding every capability
    pub root_user: String,
    /// CORS allowed origins (empty = no cross-origin access)
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3141)),
            db_path: PathBuf::from(db::paths::DEFAULT_DB_PATH),
            user_header: "X-Pushreq-User".to_string(),
            root_user: DEFAULT_ROOT_USER.to_string(),
            cors_allowed_origins: Vec::new(),
        }
    }
}

/// Shared server state
pub struct ServerState {
    pub config: ServerConfig,
}

impl ServerState {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }
}

/// Prepare the database and make sure the root user exists
pub fn prepare_database(config: &ServerConfig) -> crate::Result<()> {
    let db_path = config.db_path.to_string_lossy();
    db::init(&db_path)?;
    let mut conn = db::open(&db_path)?;
    service::ensure_root_user(&mut conn, &config.root_user)
}

/// Run the server until it is shut down
pub async fn run_server(config: ServerConfig) -> Result<()> {
    prepare_database(&config)
        .with_context(|| format!("Failed to prepare database {}", config.db_path.display()))?;

    info!("Starting pushreq server on {}", config.bind_addr);
    info!("Database: {}", config.db_path.display());
    info!("Principal header: {}", config.user_header);

    let bind_addr = config.bind_addr;
    let state = Arc::new(RwLock::new(ServerState::new(config)));
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind {bind_addr}"))?;
    axum::serve(listener, app).await?;

    Ok(())
}
