// src/db/models/changelog.rs

//! Changelog model - one serial per committed write request

use crate::error::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};

/// A committed write request
#[derive(Debug, Clone)]
pub struct Changelog {
    pub serial: i64,
    pub description: String,
    pub principal: Option<String>,
    pub created_at: Option<String>,
}

impl Changelog {
    /// Allocate the serial for the current write request
    ///
    /// Every entity written by the request records the returned serial as
    /// its `last_serial`, so serials grow monotonically across requests and
    /// are shared within one.
    pub fn record(conn: &Connection, description: &str, principal: Option<&str>) -> Result<i64> {
        conn.execute(
            "INSERT INTO changelog (description, principal) VALUES (?1, ?2)",
            params![description, principal],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// The most recently committed serial, 0 for an empty store
    pub fn latest_serial(conn: &Connection) -> Result<i64> {
        let serial: Option<i64> =
            conn.query_row("SELECT MAX(serial) FROM changelog", [], |row| row.get(0))?;
        Ok(serial.unwrap_or(0))
    }

    /// Find a changelog entry by serial
    pub fn find_by_serial(conn: &Connection, serial: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT serial, description, principal, created_at FROM changelog WHERE serial = ?1",
        )?;
        let entry = stmt.query_row([serial], Self::from_row).optional()?;
        Ok(entry)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            serial: row.get(0)?,
            description: row.get(1)?,
            principal: row.get(2)?,
            created_at: row.get(3)?,
        })
    }
}
