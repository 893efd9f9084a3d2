// src/server/config.rs
//! Configuration file parsing for the pushreq server
//!
//! Supports TOML configuration files with the following sections:
//! - [server] - Bind address, CORS origins
//! - [storage] - Data root and database location
//! - [auth] - Trusted principal header, superuser name

use crate::db::paths::DEFAULT_DB_PATH;
use crate::index::DEFAULT_ROOT_USER;
use crate::name::is_valid_name;
use crate::server::ServerConfig;
use anyhow::{Context, Result};
use axum::http::HeaderName;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// TOML configuration file structure
#[derive(Debug, Default, Deserialize)]
pub struct PushreqConfig {
    /// Server settings
    #[serde(default)]
    pub server: ServerSection,

    /// Storage settings
    #[serde(default)]
    pub storage: StorageSection,

    /// Authentication settings
    #[serde(default)]
    pub auth: AuthSection,
}

/// Server configuration section
#[derive(Debug, Deserialize)]
pub struct ServerSection {
    /// API bind address
    #[serde(default = "default_bind")]
    pub bind: String,

    /// CORS allowed origins (empty = same-origin only)
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            cors_origins: Vec::new(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:3141".to_string()
}

/// Storage configuration section
#[derive(Debug, Deserialize)]
pub struct StorageSection {
    /// Root directory for all storage
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Database file, defaults to `<root>/pushreq.db`
    #[serde(default)]
    pub db_path: Option<PathBuf>,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            root: default_root(),
            db_path: None,
        }
    }
}

fn default_root() -> PathBuf {
    crate::db::paths::db_dir(DEFAULT_DB_PATH)
}

/// Authentication configuration section
#[derive(Debug, Deserialize)]
pub struct AuthSection {
    /// Header carrying the authenticated principal, set by a fronting proxy
    #[serde(default = "default_user_header")]
    pub user_header: String,

    /// Name of the superuser
    #[serde(default = "default_root_user")]
    pub root_user: String,
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            user_header: default_user_header(),
            root_user: default_root_user(),
        }
    }
}

fn default_user_header() -> String {
    "X-Pushreq-User".to_string()
}

fn default_root_user() -> String {
    DEFAULT_ROOT_USER.to_string()
}

impl PushreqConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: PushreqConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.server
            .bind
            .parse::<SocketAddr>()
            .with_context(|| format!("Invalid server.bind address: {}", self.server.bind))?;

        HeaderName::from_bytes(self.auth.user_header.as_bytes())
            .with_context(|| format!("Invalid auth.user_header: {}", self.auth.user_header))?;

        if !is_valid_name(&self.auth.root_user) {
            anyhow::bail!("Invalid auth.root_user: '{}'", self.auth.root_user);
        }

        Ok(())
    }

    /// Database file location
    pub fn db_path(&self) -> PathBuf {
        self.storage
            .db_path
            .clone()
            .unwrap_or_else(|| self.storage.root.join("pushreq.db"))
    }

    /// Convert to the internal ServerConfig structure
    pub fn to_server_config(&self) -> Result<ServerConfig> {
        let bind_addr = self.server.bind.parse()?;

        Ok(ServerConfig {
            bind_addr,
            db_path: self.db_path(),
            user_header: self.auth.user_header.clone(),
            root_user: self.auth.root_user.clone(),
            cors_allowed_origins: self.server.cors_origins.clone(),
        })
    }
}
