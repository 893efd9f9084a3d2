// src/pr/views.rs

//! Push request listings
//!
//! Both listings group staging indexes by current state, then by owner.
//! `last_serial` is the index's own change serial, not the reference
//! serial approval checks against.

use crate::db::models::{IndexEntry, User};
use crate::error::{Error, Result};
use crate::index::IndexKind;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One staging index in a listing
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrSummary {
    /// Index name, including the `+pr-` prefix
    pub name: String,
    /// Target index
    pub base: String,
    pub last_serial: i64,
    pub states: Vec<String>,
    pub messages: Vec<String>,
    /// Principal of each state change
    pub by: Vec<String>,
}

impl PrSummary {
    pub fn from_entry(entry: &IndexEntry) -> Self {
        Self {
            name: entry.name.clone(),
            base: entry.config.target().unwrap_or_default().to_string(),
            last_serial: entry.last_serial,
            states: entry.config.states.clone(),
            messages: entry.config.messages.clone(),
            by: entry.config.changers.clone(),
        }
    }
}

/// state -> owner -> summaries
pub type PrListing = BTreeMap<String, BTreeMap<String, Vec<PrSummary>>>;

fn add_to_listing(listing: &mut PrListing, entry: &IndexEntry) {
    let state = entry.config.current_state().unwrap_or_default().to_string();
    listing
        .entry(state)
        .or_default()
        .entry(entry.user.clone())
        .or_default()
        .push(PrSummary::from_entry(entry));
}

/// Listing for one index
///
/// On a staging index this lists the index itself. On a regular index it
/// lists every staging index targeting it, provided the index accepts push
/// requests.
pub fn index_listing(conn: &Connection, user: &str, index: &str) -> Result<PrListing> {
    let entry = IndexEntry::find(conn, user, index)?
        .ok_or_else(|| Error::NotFound(format!("index '{user}/{index}' does not exist")))?;

    let mut listing = PrListing::new();
    if entry.kind() == IndexKind::Merge {
        add_to_listing(&mut listing, &entry);
        return Ok(listing);
    }

    if !entry.config.allows_push_requests() {
        return Err(Error::BadRequest(format!(
            "Push requests to '{}' not allowed",
            entry.full_name()
        )));
    }

    let name = entry.full_name();
    for staging in IndexEntry::list_by_kind(conn, IndexKind::Merge)? {
        if staging.config.bases.iter().any(|base| *base == name) {
            add_to_listing(&mut listing, &staging);
        }
    }
    Ok(listing)
}

/// Listing of all staging indexes owned by `user`
pub fn user_listing(conn: &Connection, user: &str) -> Result<PrListing> {
    if User::find_by_name(conn, user)?.is_none() {
        return Err(Error::NotFound(format!("user '{user}' does not exist")));
    }

    let mut listing = PrListing::new();
    for entry in IndexEntry::list_by_user(conn, user)? {
        if entry.kind() == IndexKind::Merge {
            add_to_listing(&mut listing, &entry);
        }
    }
    Ok(listing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Changelog;
    use crate::db::schema;
    use crate::index::IndexConfig;
    use tempfile::NamedTempFile;

    fn create_test_db() -> (NamedTempFile, Connection) {
        let temp_file = NamedTempFile::new().unwrap();
        let conn = Connection::open(temp_file.path()).unwrap();
        conn.execute("PRAGMA foreign_keys = ON", []).unwrap();
        schema::migrate(&conn).unwrap();
        (temp_file, conn)
    }

    fn insert(conn: &Connection, user: &str, name: &str, config: IndexConfig) {
        let serial = Changelog::record(conn, "setup", None).unwrap();
        let user_id = match User::find_by_name(conn, user).unwrap() {
            Some(u) => u.id.unwrap(),
            None => User::new(user.to_string(), serial).insert(conn).unwrap(),
        };
        IndexEntry::new(user_id, user.to_string(), name.to_string(), config, serial)
            .insert(conn)
            .unwrap();
    }

    fn staging(target: &str, states: &[&str]) -> IndexConfig {
        let mut config = IndexConfig::new(IndexKind::Merge);
        config.bases = vec![target.to_string()];
        config.states = states.iter().map(|s| s.to_string()).collect();
        config.messages = states.iter().map(|s| format!("to {s}")).collect();
        config.changers = vec!["alice".to_string(); states.len()];
        config
    }

    fn setup(allow: bool) -> (NamedTempFile, Connection) {
        let (temp, conn) = create_test_db();
        let mut target = IndexConfig::new(IndexKind::Stage);
        target.push_requests_allowed = Some(allow);
        insert(&conn, "target", "prod", target);
        insert(&conn, "alice", "dev", IndexConfig::new(IndexKind::Stage));
        insert(&conn, "alice", "+pr-one", staging("target/prod", &["new", "pending"]));
        insert(&conn, "alice", "+pr-two", staging("target/prod", &["new"]));
        insert(&conn, "bob", "+pr-three", staging("target/prod", &["new", "pending"]));
        insert(&conn, "bob", "+pr-other", staging("alice/dev", &["new"]));
        (temp, conn)
    }

    #[test]
    fn test_target_listing_groups_by_state_and_user() {
        let (_temp, conn) = setup(true);
        let listing = index_listing(&conn, "target", "prod").unwrap();

        let pending = &listing["pending"];
        assert_eq!(pending["alice"].len(), 1);
        assert_eq!(pending["alice"][0].name, "+pr-one");
        assert_eq!(pending["alice"][0].base, "target/prod");
        assert_eq!(pending["alice"][0].by, vec!["alice", "alice"]);
        assert_eq!(pending["bob"][0].name, "+pr-three");
        assert_eq!(listing["new"]["alice"][0].name, "+pr-two");
        assert!(!listing["new"].contains_key("bob"));
    }

    #[test]
    fn test_target_listing_requires_policy_flag() {
        let (_temp, conn) = setup(false);
        let err = index_listing(&conn, "target", "prod").unwrap_err();
        assert_eq!(err.to_string(), "Push requests to 'target/prod' not allowed");
    }

    #[test]
    fn test_staging_index_lists_itself() {
        let (_temp, conn) = setup(false);
        let listing = index_listing(&conn, "alice", "+pr-one").unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing["pending"]["alice"][0].name, "+pr-one");
    }

    #[test]
    fn test_user_listing() {
        let (_temp, conn) = setup(true);
        let listing = user_listing(&conn, "bob").unwrap();
        assert_eq!(listing["pending"]["bob"][0].name, "+pr-three");
        assert_eq!(listing["new"]["bob"][0].name, "+pr-other");
        assert!(user_listing(&conn, "nobody").is_err());
    }
}
