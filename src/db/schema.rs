// src/db/schema.rs

//! Database schema definitions and migrations for pushreq
//!
//! This module defines the SQLite schema for the index store and provides
//! a migration system to evolve the schema over time.

use crate::error::{Error, Result};
use rusqlite::Connection;
use tracing::{debug, info};

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the schema version tracking table
fn init_schema_version(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    init_schema_version(conn)?;

    let version = conn
        .query_row(
            "SELECT version FROM schema_version ORDER BY version DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    Ok(version)
}

/// Set the schema version
fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

/// Apply all pending migrations to bring the database up to date
pub fn migrate(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;
    debug!("Current schema version: {}", current_version);

    if current_version >= SCHEMA_VERSION {
        debug!("Schema is up to date");
        return Ok(());
    }

    for version in (current_version + 1)..=SCHEMA_VERSION {
        info!("Applying migration to version {}", version);
        apply_migration(conn, version)?;
        set_schema_version(conn, version)?;
    }

    info!(
        "Schema migration complete. Now at version {}",
        SCHEMA_VERSION
    );
    Ok(())
}

/// Apply a specific migration version
fn apply_migration(conn: &Connection, version: i32) -> Result<()> {
    match version {
        1 => migrate_v1(conn),
        _ => Err(Error::InitError(format!(
            "Unknown migration version: {}",
            version
        ))),
    }
}

/// Initial schema - Version 1
///
/// - changelog: one serial per committed write request
/// - users / indexes: index ownership and configuration
/// - projects / versions / release_files: hosted releases
/// - blobs: content-addressed file bodies
/// - file_logs: provenance log of every release file
fn migrate_v1(conn: &Connection) -> Result<()> {
    debug!("Creating schema version 1");

    conn.execute_batch(
        "
        -- Changelog: every write request allocates exactly one serial
        CREATE TABLE changelog (
            serial INTEGER PRIMARY KEY AUTOINCREMENT,
            description TEXT NOT NULL,
            principal TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            created_serial INTEGER NOT NULL,
            FOREIGN KEY (created_serial) REFERENCES changelog(serial)
        );

        -- Indexes: config is the JSON encoded index configuration
        CREATE TABLE indexes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            type TEXT NOT NULL CHECK(type IN ('stage', 'merge')),
            config TEXT NOT NULL,
            config_serial INTEGER NOT NULL,
            last_serial INTEGER NOT NULL,
            UNIQUE(user_id, name),
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        );

        CREATE INDEX idx_indexes_type ON indexes(type);

        CREATE TABLE projects (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            index_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            last_serial INTEGER NOT NULL,
            UNIQUE(index_id, name),
            FOREIGN KEY (index_id) REFERENCES indexes(id) ON DELETE CASCADE
        );

        CREATE TABLE versions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            project_id INTEGER NOT NULL,
            version TEXT NOT NULL,
            metadata TEXT NOT NULL DEFAULT '{}',
            last_serial INTEGER NOT NULL,
            UNIQUE(project_id, version),
            FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE
        );

        CREATE TABLE blobs (
            hash TEXT PRIMARY KEY,
            size INTEGER NOT NULL,
            content BLOB NOT NULL
        );

        CREATE TABLE release_files (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            version_id INTEGER NOT NULL,
            rel TEXT NOT NULL CHECK(rel IN ('releasefile', 'doczip', 'toxresult')),
            basename TEXT NOT NULL,
            blob_hash TEXT NOT NULL,
            last_modified TEXT NOT NULL,
            parent_id INTEGER,
            last_serial INTEGER NOT NULL,
            UNIQUE(version_id, rel, basename),
            FOREIGN KEY (version_id) REFERENCES versions(id) ON DELETE CASCADE,
            FOREIGN KEY (parent_id) REFERENCES release_files(id) ON DELETE CASCADE,
            FOREIGN KEY (blob_hash) REFERENCES blobs(hash)
        );

        CREATE INDEX idx_release_files_version ON release_files(version_id);
        CREATE INDEX idx_release_files_parent ON release_files(parent_id);

        CREATE TABLE file_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            file_id INTEGER NOT NULL,
            entry TEXT NOT NULL,
            FOREIGN KEY (file_id) REFERENCES release_files(id) ON DELETE CASCADE
        );

        CREATE INDEX idx_file_logs_file ON file_logs(file_id);
        ",
    )?;

    info!("Schema version 1 created successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_migrate_fresh_database() {
        let temp_file = NamedTempFile::new().unwrap();
        let conn = Connection::open(temp_file.path()).unwrap();

        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                 AND name IN ('changelog', 'users', 'indexes', 'projects', 'versions',
                              'blobs', 'release_files', 'file_logs')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 8);
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let temp_file = NamedTempFile::new().unwrap();
        let conn = Connection::open(temp_file.path()).unwrap();

        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }
}
