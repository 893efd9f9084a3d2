// src/index/acl.rs

//! Capabilities and the permission check
//!
//! Authentication happens in front of the server; a request arrives with an
//! already trusted principal name (or none). Capabilities are derived from
//! the index configuration and, for modify/delete, from the principals the
//! index's customizer grants on top of the owner.

use crate::db::models::IndexEntry;
use crate::error::{Error, Result};
use crate::index::customizer::customizer_for;
use rusqlite::Connection;
use std::fmt;

/// Default name of the superuser
pub const DEFAULT_ROOT_USER: &str = "root";

/// What a principal wants to do with an index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Store releases in the index
    Upload,
    /// Change the index configuration
    Modify,
    /// Remove the index
    Delete,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Upload => "upload",
            Capability::Modify => "modify",
            Capability::Delete => "delete",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-request facts the index layer needs
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Authenticated principal, `None` for anonymous requests
    pub user: Option<String>,
    /// Name of the superuser
    pub root_user: String,
    /// Raw `X-Devpi-PR-Serial` header value
    pub pr_serial: Option<String>,
}

impl RequestContext {
    pub fn new(user: Option<&str>) -> Self {
        Self {
            user: user.map(String::from),
            root_user: DEFAULT_ROOT_USER.to_string(),
            pr_serial: None,
        }
    }

    /// Context acting as `user`
    pub fn user(user: &str) -> Self {
        Self::new(Some(user))
    }

    pub fn anonymous() -> Self {
        Self::new(None)
    }

    pub fn with_root_user(mut self, root_user: &str) -> Self {
        self.root_user = root_user.to_string();
        self
    }

    pub fn with_pr_serial(mut self, serial: Option<&str>) -> Self {
        self.pr_serial = serial.map(String::from);
        self
    }

    pub fn is_root(&self) -> bool {
        self.user.as_deref() == Some(self.root_user.as_str())
    }

    /// The principal name, or an authentication error
    pub fn require_user(&self) -> Result<&str> {
        self.user
            .as_deref()
            .ok_or_else(|| Error::Unauthorized("authentication required".to_string()))
    }

    /// Principal name for messages and logs
    pub fn display_user(&self) -> &str {
        self.user.as_deref().unwrap_or("anonymous")
    }
}

/// Whether the request's principal holds `capability` on `index`
pub fn has_permission(
    conn: &Connection,
    ctx: &RequestContext,
    index: &IndexEntry,
    capability: Capability,
) -> Result<bool> {
    if ctx.is_root() {
        return Ok(true);
    }
    let Some(user) = ctx.user.as_deref() else {
        return Ok(false);
    };

    let customizer = customizer_for(index.kind());
    let allowed = match capability {
        Capability::Upload => index.config.acl_upload.iter().any(|u| u == user),
        Capability::Modify => {
            index.user == user
                || customizer
                    .modify_principals_for(conn, index)?
                    .iter()
                    .any(|u| u == user)
        }
        Capability::Delete => {
            index.user == user
                || customizer
                    .delete_principals_for(conn, index)?
                    .iter()
                    .any(|u| u == user)
        }
    };
    Ok(allowed)
}

/// Fail with 403 unless the principal holds `capability`
///
/// Anonymous requests fail with 401 instead.
pub fn require_permission(
    conn: &Connection,
    ctx: &RequestContext,
    index: &IndexEntry,
    capability: Capability,
) -> Result<()> {
    ctx.require_user()?;
    if has_permission(conn, ctx, index, capability)? {
        Ok(())
    } else {
        Err(Error::Forbidden(format!(
            "user '{}' is not allowed to {} index '{}'",
            ctx.display_user(),
            capability,
            index.full_name()
        )))
    }
}
