// src/index/customizer.rs

//! Per-type index behavior
//!
//! The generic index layer knows nothing about push requests. Everything
//! that differs between index types goes through a [`StageCustomizer`]
//! selected by the index's type tag with [`customizer_for`].

use crate::db::models::IndexEntry;
use crate::error::Result;
use crate::index::acl::RequestContext;
use crate::index::config::{IndexConfig, IndexKind};
use crate::index::stage::Stage;
use crate::name::{IndexName, is_valid_name};
use crate::pr::StagingIndexPolicy;
use rusqlite::Connection;

/// Lookups the transition validation needs from the store
pub trait PolicyEnv {
    /// Whether the index named `target` accepts push requests
    fn target_allows_push_requests(&self, target: &str) -> Result<bool>;

    /// Whether the index being validated hosts no release files
    fn stage_is_empty(&self) -> Result<bool>;
}

/// [`PolicyEnv`] backed by the database
pub struct StoreEnv<'a> {
    conn: &'a Connection,
    stage: Option<&'a IndexEntry>,
}

impl<'a> StoreEnv<'a> {
    /// Environment for validating `stage`; `None` while it is being created
    pub fn new(conn: &'a Connection, stage: Option<&'a IndexEntry>) -> Self {
        Self { conn, stage }
    }
}

impl PolicyEnv for StoreEnv<'_> {
    fn target_allows_push_requests(&self, target: &str) -> Result<bool> {
        let Ok(name) = IndexName::parse(target) else {
            return Ok(false);
        };
        Ok(IndexEntry::find(self.conn, &name.user, &name.index)?
            .is_some_and(|entry| entry.config.allows_push_requests()))
    }

    fn stage_is_empty(&self) -> Result<bool> {
        match self.stage {
            Some(entry) => Stage::new(self.conn, entry.clone()).is_empty(),
            None => Ok(true),
        }
    }
}

/// Strategy object attached to an index by its type tag
pub trait StageCustomizer: Send + Sync {
    fn kind(&self) -> IndexKind;

    /// Check the index name at creation
    fn verify_name(&self, name: &str) -> Result<()>;

    /// Fill in creation defaults for an index owned by `owner`
    fn prepare_config(&self, owner: &str, config: &mut IndexConfig) -> Result<()>;

    /// Every rule `new` violates, given the previous configuration
    /// (`None` at creation)
    fn validate_transition(
        &self,
        env: &dyn PolicyEnv,
        old: Option<&IndexConfig>,
        new: &IndexConfig,
    ) -> Result<Vec<String>>;

    /// Permission checks and bookkeeping that must happen before `new` is
    /// written
    fn authorize_transition(
        &self,
        _conn: &Connection,
        _ctx: &RequestContext,
        _stage: &IndexEntry,
        _new: &mut IndexConfig,
    ) -> Result<()> {
        Ok(())
    }

    /// Side effects after the new configuration of `stage` was written at
    /// `serial`
    fn on_modified(
        &self,
        _conn: &Connection,
        _serial: i64,
        _ctx: &RequestContext,
        _stage: &IndexEntry,
        _old: &IndexConfig,
    ) -> Result<()> {
        Ok(())
    }

    /// Principals besides the owner that may modify `stage`
    fn modify_principals_for(&self, _conn: &Connection, _stage: &IndexEntry) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    /// Principals besides the owner that may delete `stage`
    fn delete_principals_for(&self, _conn: &Connection, _stage: &IndexEntry) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Customizer of regular `stage` indexes
pub struct PlainStage;

impl StageCustomizer for PlainStage {
    fn kind(&self) -> IndexKind {
        IndexKind::Stage
    }

    fn verify_name(&self, name: &str) -> Result<()> {
        if is_valid_name(name) {
            Ok(())
        } else {
            Err(crate::error::Error::InvalidIndexName(format!(
                "indexname '{name}' contains characters that aren't allowed. \
                 Any ascii symbol besides -.@_ is blocked."
            )))
        }
    }

    fn prepare_config(&self, owner: &str, config: &mut IndexConfig) -> Result<()> {
        if config.acl_upload.is_empty() {
            config.acl_upload.push(owner.to_string());
        }
        config.push_requests_allowed.get_or_insert(false);
        Ok(())
    }

    fn validate_transition(
        &self,
        _env: &dyn PolicyEnv,
        _old: Option<&IndexConfig>,
        new: &IndexConfig,
    ) -> Result<Vec<String>> {
        let mut errors = Vec::new();
        if !new.states.is_empty() || !new.messages.is_empty() || !new.changers.is_empty() {
            errors.push("Only merge indexes have states, messages and changers".to_string());
        }
        Ok(errors)
    }
}

/// The customizer for an index type
pub fn customizer_for(kind: IndexKind) -> &'static dyn StageCustomizer {
    match kind {
        IndexKind::Stage => &PlainStage,
        IndexKind::Merge => &StagingIndexPolicy,
    }
}
