// src/index/service.rs

//! Request-level index operations
//!
//! Each public function is one write or read request. Writes run in a
//! single database transaction and allocate exactly one changelog serial,
//! so a request either commits completely or leaves the store untouched.

use crate::db::models::{Changelog, FileRel, IndexEntry, LogEntry, ReleaseFile, User};
use crate::db;
use crate::error::{Error, Result};
use crate::index::acl::{Capability, RequestContext, has_permission, require_permission};
use crate::index::config::{ConfigPatch, IndexConfig, apply_patch};
use crate::index::customizer::{StoreEnv, customizer_for};
use crate::index::stage::{ProjectLinks, Stage};
use crate::name::{IndexName, is_valid_name};
use crate::pr::copy_release;
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

/// A file upload into an index
#[derive(Debug, Clone, Copy)]
pub struct Upload<'a> {
    pub project: &'a str,
    pub version: &'a str,
    pub filename: &'a str,
    pub rel: FileRel,
    /// Release file a toxresult belongs to
    pub parent: Option<&'a str>,
    pub content: &'a [u8],
}

/// Body of a `+push` request
#[derive(Debug, Clone, Deserialize)]
pub struct PushRequest {
    pub name: String,
    pub version: String,
    pub targetindex: String,
}

fn index_not_found(user: &str, index: &str) -> Error {
    Error::NotFound(format!("index '{user}/{index}' does not exist"))
}

fn find_index(conn: &Connection, user: &str, index: &str) -> Result<IndexEntry> {
    IndexEntry::find(conn, user, index)?.ok_or_else(|| index_not_found(user, index))
}

fn reject_if_invalid(index: &str, errors: Vec<String>) -> Result<()> {
    if errors.is_empty() {
        return Ok(());
    }
    warn!("Rejected configuration of {}: {}", index, errors.join("; "));
    Err(Error::InvalidIndexConfig(errors))
}

/// Every base must name another existing index
fn check_bases(conn: &Connection, index: &str, bases: &[String]) -> Result<Vec<String>> {
    let mut errors = Vec::new();
    for base in bases {
        if base == index {
            errors.push(format!("index '{index}' can't be its own base"));
            continue;
        }
        match IndexName::parse(base) {
            Ok(name) => {
                if IndexEntry::find(conn, &name.user, &name.index)?.is_none() {
                    errors.push(format!("base index '{base}' does not exist"));
                }
            }
            Err(e) => errors.push(e.to_string()),
        }
    }
    Ok(errors)
}

/// Create the superuser if it does not exist yet
pub fn ensure_root_user(conn: &mut Connection, root_user: &str) -> Result<()> {
    db::transaction(conn, |tx| {
        if User::find_by_name(tx, root_user)?.is_none() {
            let serial = Changelog::record(tx, &format!("create user {root_user}"), None)?;
            User::new(root_user.to_string(), serial).insert(tx)?;
            info!("Created root user {}", root_user);
        }
        Ok(())
    })
}

/// Create a user
///
/// Users create themselves; root may create anyone.
pub fn create_user(conn: &mut Connection, ctx: &RequestContext, name: &str) -> Result<User> {
    db::transaction(conn, |tx| {
        if !is_valid_name(name) {
            return Err(Error::BadRequest(format!(
                "username '{name}' contains characters that aren't allowed"
            )));
        }
        if !ctx.is_root() && ctx.user.as_deref() != Some(name) {
            return Err(Error::Forbidden(format!(
                "user '{}' may not create user '{}'",
                ctx.display_user(),
                name
            )));
        }
        if User::find_by_name(tx, name)?.is_some() {
            return Err(Error::AlreadyExists(format!("user '{name}' already exists")));
        }

        let serial = Changelog::record(tx, &format!("create user {name}"), ctx.user.as_deref())?;
        let mut user = User::new(name.to_string(), serial);
        user.insert(tx)?;
        info!("Created user {}", name);
        Ok(user)
    })
}

/// Read an index
pub fn get_index(conn: &Connection, user: &str, index: &str) -> Result<IndexEntry> {
    find_index(conn, user, index)
}

/// Create an index from a request body
pub fn create_index(
    conn: &mut Connection,
    ctx: &RequestContext,
    user: &str,
    index: &str,
    body: &Map<String, Value>,
) -> Result<IndexEntry> {
    db::transaction(conn, |tx| {
        let principal = ctx.require_user()?;
        if !ctx.is_root() && principal != user {
            return Err(Error::Forbidden(format!(
                "user '{principal}' may not create indexes for '{user}'"
            )));
        }
        let owner = User::find_by_name(tx, user)?
            .ok_or_else(|| Error::NotFound(format!("user '{user}' does not exist")))?;
        let owner_id = owner
            .id
            .ok_or_else(|| Error::InitError(format!("user {user} has no ID")))?;
        let full_name = format!("{user}/{index}");
        if IndexEntry::find(tx, user, index)?.is_some() {
            return Err(Error::AlreadyExists(format!("index '{full_name}' already exists")));
        }

        let mut config = IndexConfig::from_request(body)?;
        let customizer = customizer_for(config.kind);
        customizer.verify_name(index)?;
        customizer.prepare_config(user, &mut config)?;

        let mut errors = check_bases(tx, &full_name, &config.bases)?;
        errors.extend(customizer.validate_transition(&StoreEnv::new(tx, None), None, &config)?);
        reject_if_invalid(&full_name, errors)?;

        let serial = Changelog::record(tx, &format!("create index {full_name}"), Some(principal))?;
        let mut entry = IndexEntry::new(owner_id, user.to_string(), index.to_string(), config, serial);
        entry.insert(tx)?;
        info!("Created {} index {} at serial {}", entry.kind(), full_name, serial);
        Ok(entry)
    })
}

/// Apply a configuration patch to an index
///
/// The customizer of the index validates the complete old and new
/// configurations, authorizes the change, and runs its side effects after
/// the write. `changers` is maintained by the server; client values are
/// discarded.
pub fn patch_index(
    conn: &mut Connection,
    ctx: &RequestContext,
    user: &str,
    index: &str,
    patch: &ConfigPatch,
) -> Result<IndexEntry> {
    db::transaction(conn, |tx| {
        let mut entry = find_index(tx, user, index)?;
        require_permission(tx, ctx, &entry, Capability::Modify)?;
        let full_name = entry.full_name();

        let old = entry.config.clone();
        let mut new = apply_patch(&old, patch)?;
        if new.kind != old.kind {
            return Err(Error::InvalidIndexConfig(vec![
                "The type of an index can't be changed".to_string(),
            ]));
        }
        new.changers = old.changers.clone();

        let customizer = customizer_for(old.kind);
        let mut errors = if new.bases != old.bases {
            check_bases(tx, &full_name, &new.bases)?
        } else {
            Vec::new()
        };
        errors.extend(customizer.validate_transition(
            &StoreEnv::new(tx, Some(&entry)),
            Some(&old),
            &new,
        )?);
        reject_if_invalid(&full_name, errors)?;

        customizer.authorize_transition(tx, ctx, &entry, &mut new)?;

        let serial = Changelog::record(tx, &format!("modify index {full_name}"), ctx.user.as_deref())?;
        entry.update_config(tx, new, serial)?;
        customizer.on_modified(tx, serial, ctx, &entry, &old)?;

        debug!("Modified {} at serial {}", full_name, serial);
        Ok(entry)
    })
}

/// Delete an index with everything it hosts
pub fn delete_index(conn: &mut Connection, ctx: &RequestContext, user: &str, index: &str) -> Result<()> {
    db::transaction(conn, |tx| {
        let entry = find_index(tx, user, index)?;
        require_permission(tx, ctx, &entry, Capability::Delete)?;
        let id = entry
            .id
            .ok_or_else(|| Error::InitError(format!("index {} has no ID", entry.full_name())))?;

        Changelog::record(tx, &format!("delete index {}", entry.full_name()), ctx.user.as_deref())?;
        IndexEntry::delete(tx, id)?;
        info!("Deleted index {}", entry.full_name());
        Ok(())
    })
}

/// Store an uploaded file
pub fn upload(
    conn: &mut Connection,
    ctx: &RequestContext,
    user: &str,
    index: &str,
    upload: &Upload<'_>,
) -> Result<ReleaseFile> {
    db::transaction(conn, |tx| {
        let principal = ctx.require_user()?;
        let entry = find_index(tx, user, index)?;
        let full_name = entry.full_name();
        if !has_permission(tx, ctx, &entry, Capability::Upload)? {
            return Err(Error::Forbidden(format!(
                "user '{principal}' cannot upload to '{full_name}'"
            )));
        }

        let serial = Changelog::record(
            tx,
            &format!("upload {} to {}", upload.filename, full_name),
            Some(principal),
        )?;
        let mut stage = Stage::new(tx, entry);
        let file = match upload.rel {
            FileRel::ReleaseFile => stage.store_releasefile(
                upload.project,
                upload.version,
                upload.filename,
                upload.content,
                None,
                serial,
            )?,
            FileRel::DocZip => {
                stage.store_doczip(upload.project, upload.version, upload.content, serial)?
            }
            FileRel::ToxResult => {
                let parent = upload.parent.ok_or_else(|| {
                    Error::BadRequest(
                        "a toxresult upload must name the release file it belongs to".to_string(),
                    )
                })?;
                stage.store_toxresult(upload.project, upload.version, parent, upload.content, serial)?
            }
        };
        stage.append_log(&file, &LogEntry::new("upload", Some(principal)).with_dst(&full_name))?;

        info!("Uploaded {} {} to {}", file.rel, file.basename, full_name);
        Ok(file)
    })
}

/// Copy one release from `user/index` into another index
///
/// Returns the number of files copied.
pub fn push_release(
    conn: &mut Connection,
    ctx: &RequestContext,
    user: &str,
    index: &str,
    request: &PushRequest,
) -> Result<usize> {
    db::transaction(conn, |tx| {
        let principal = ctx.require_user()?;
        let source = Stage::open(tx, user, index)?;
        let version = source.get_version(&request.name, &request.version)?.ok_or_else(|| {
            Error::NotFound(format!(
                "{}=={} not found on {}",
                request.name,
                request.version,
                source.name()
            ))
        })?;

        let target_name = IndexName::parse(&request.targetindex)?;
        let target_entry = find_index(tx, &target_name.user, &target_name.index)?;
        if !has_permission(tx, ctx, &target_entry, Capability::Upload)? {
            return Err(Error::Unauthorized(format!(
                "user '{}' cannot upload to '{}'",
                principal,
                target_entry.full_name()
            )));
        }

        let serial = Changelog::record(
            tx,
            &format!("push {}=={} to {}", request.name, request.version, target_name),
            Some(principal),
        )?;
        let mut target = Stage::new(tx, target_entry);
        let count = copy_release(serial, &source, &mut target, &request.name, &version, principal, None)?;
        info!(
            "Pushed {}=={} from {} to {} ({} file(s))",
            request.name,
            request.version,
            source.name(),
            target.name(),
            count
        );
        Ok(count)
    })
}

/// Latest version of a project with its links
pub fn project_links(conn: &Connection, user: &str, index: &str, project: &str) -> Result<ProjectLinks> {
    let stage = Stage::open(conn, user, index)?;
    stage.project_links(project)?.ok_or_else(|| {
        Error::NotFound(format!("project '{project}' not found on {}", stage.name()))
    })
}
