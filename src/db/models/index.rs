// src/db/models/index.rs

//! Index model - configuration and serial bookkeeping of one index

use crate::error::{Error, Result};
use crate::index::{IndexConfig, IndexKind};
use rusqlite::{Connection, OptionalExtension, Row, params};

const SELECT_INDEX: &str = "SELECT i.id, i.user_id, u.name, i.name, i.type, i.config,
        i.config_serial, i.last_serial
     FROM indexes i JOIN users u ON u.id = i.user_id";

/// An index owned by a user
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub id: Option<i64>,
    pub user_id: i64,
    /// Owner name (joined from `users`)
    pub user: String,
    pub name: String,
    pub config: IndexConfig,
    /// Serial of the last configuration write
    pub config_serial: i64,
    /// Serial of the last write of any kind touching this index
    pub last_serial: i64,
}

impl IndexEntry {
    /// Create a new index entry created at `serial`
    pub fn new(user_id: i64, user: String, name: String, config: IndexConfig, serial: i64) -> Self {
        Self {
            id: None,
            user_id,
            user,
            name,
            config,
            config_serial: serial,
            last_serial: serial,
        }
    }

    pub fn kind(&self) -> IndexKind {
        self.config.kind
    }

    /// `user/index`
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.user, self.name)
    }

    /// Insert this index into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO indexes (user_id, name, type, config, config_serial, last_serial)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                self.user_id,
                &self.name,
                self.config.kind.as_str(),
                self.config.to_json()?,
                self.config_serial,
                self.last_serial,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Find an index by owner and name
    pub fn find(conn: &Connection, user: &str, name: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!("{SELECT_INDEX} WHERE u.name = ?1 AND i.name = ?2"))?;
        let entry = stmt.query_row([user, name], Self::from_row).optional()?;
        Ok(entry)
    }

    /// Find an index by ID
    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!("{SELECT_INDEX} WHERE i.id = ?1"))?;
        let entry = stmt.query_row([id], Self::from_row).optional()?;
        Ok(entry)
    }

    /// List all indexes of one user
    pub fn list_by_user(conn: &Connection, user: &str) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!("{SELECT_INDEX} WHERE u.name = ?1 ORDER BY i.name"))?;
        let entries = stmt
            .query_map([user], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// List all indexes of one type across all users
    pub fn list_by_kind(conn: &Connection, kind: IndexKind) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "{SELECT_INDEX} WHERE i.type = ?1 ORDER BY u.name, i.name"
        ))?;
        let entries = stmt
            .query_map([kind.as_str()], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Persist a new configuration written at `serial`
    pub fn update_config(&mut self, conn: &Connection, config: IndexConfig, serial: i64) -> Result<()> {
        let id = self.require_id()?;
        conn.execute(
            "UPDATE indexes SET config = ?1, config_serial = ?2, last_serial = ?2 WHERE id = ?3",
            params![config.to_json()?, serial, id],
        )?;
        self.config = config;
        self.config_serial = serial;
        self.last_serial = serial;
        Ok(())
    }

    /// Record a non-configuration write (upload, push) at `serial`
    pub fn touch(&mut self, conn: &Connection, serial: i64) -> Result<()> {
        let id = self.require_id()?;
        conn.execute(
            "UPDATE indexes SET last_serial = ?1 WHERE id = ?2",
            params![serial, id],
        )?;
        self.last_serial = serial;
        Ok(())
    }

    /// Delete an index (projects, versions and files cascade)
    pub fn delete(conn: &Connection, id: i64) -> Result<()> {
        conn.execute("DELETE FROM indexes WHERE id = ?1", [id])?;
        Ok(())
    }

    fn require_id(&self) -> Result<i64> {
        self.id
            .ok_or_else(|| Error::InitError("Cannot update index without ID".to_string()))
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let config_json: String = row.get(5)?;
        let config = IndexConfig::from_json(&config_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                5,
                rusqlite::types::Type::Text,
                Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())),
            )
        })?;

        Ok(Self {
            id: Some(row.get(0)?),
            user_id: row.get(1)?,
            user: row.get(2)?,
            name: row.get(3)?,
            config,
            config_serial: row.get(6)?,
            last_serial: row.get(7)?,
        })
    }
}
