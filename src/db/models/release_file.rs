// src/db/models/release_file.rs

//! Release file model - release files, documentation archives and test
//! results attached to a project version, with content-addressed bodies

use crate::error::{Error, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Relation of a file to its version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileRel {
    ReleaseFile,
    DocZip,
    ToxResult,
}

impl FileRel {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileRel::ReleaseFile => "releasefile",
            FileRel::DocZip => "doczip",
            FileRel::ToxResult => "toxresult",
        }
    }
}

impl FromStr for FileRel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "releasefile" => Ok(FileRel::ReleaseFile),
            "doczip" => Ok(FileRel::DocZip),
            "toxresult" => Ok(FileRel::ToxResult),
            _ => Err(format!("Invalid file relation: {s}")),
        }
    }
}

impl fmt::Display for FileRel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const SELECT_FILE: &str = "SELECT id, version_id, rel, basename, blob_hash, last_modified,
        parent_id, last_serial
     FROM release_files";

/// A stored file of a project version
#[derive(Debug, Clone)]
pub struct ReleaseFile {
    pub id: Option<i64>,
    pub version_id: i64,
    pub rel: FileRel,
    pub basename: String,
    pub blob_hash: String,
    pub last_modified: String,
    /// Release file a toxresult is attached to
    pub parent_id: Option<i64>,
    pub last_serial: i64,
}

impl ReleaseFile {
    pub fn new(
        version_id: i64,
        rel: FileRel,
        basename: String,
        blob_hash: String,
        last_modified: String,
        serial: i64,
    ) -> Self {
        Self {
            id: None,
            version_id,
            rel,
            basename,
            blob_hash,
            last_modified,
            parent_id: None,
            last_serial: serial,
        }
    }

    /// Insert this file into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO release_files
                (version_id, rel, basename, blob_hash, last_modified, parent_id, last_serial)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                self.version_id,
                self.rel.as_str(),
                &self.basename,
                &self.blob_hash,
                &self.last_modified,
                self.parent_id,
                self.last_serial,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Find a file of a version by relation and basename
    pub fn find(conn: &Connection, version_id: i64, rel: FileRel, basename: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!(
            "{SELECT_FILE} WHERE version_id = ?1 AND rel = ?2 AND basename = ?3"
        ))?;
        let file = stmt
            .query_row(params![version_id, rel.as_str(), basename], Self::from_row)
            .optional()?;
        Ok(file)
    }

    /// List all files of a version, parents before their attachments
    pub fn list_by_version(conn: &Connection, version_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "{SELECT_FILE} WHERE version_id = ?1 ORDER BY parent_id IS NOT NULL, id"
        ))?;
        let files = stmt
            .query_map([version_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(files)
    }

    /// Files attached to this one
    pub fn attachments(&self, conn: &Connection) -> Result<Vec<Self>> {
        let id = self.require_id()?;
        let mut stmt = conn.prepare(&format!("{SELECT_FILE} WHERE parent_id = ?1 ORDER BY id"))?;
        let files = stmt
            .query_map([id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(files)
    }

    /// Point this file at new content
    pub fn replace_content(
        &mut self,
        conn: &Connection,
        blob_hash: String,
        last_modified: String,
        serial: i64,
    ) -> Result<()> {
        let id = self.require_id()?;
        conn.execute(
            "UPDATE release_files SET blob_hash = ?1, last_modified = ?2, last_serial = ?3
             WHERE id = ?4",
            params![&blob_hash, &last_modified, serial, id],
        )?;
        self.blob_hash = blob_hash;
        self.last_modified = last_modified;
        self.last_serial = serial;
        Ok(())
    }

    /// Read the file body
    pub fn content(&self, conn: &Connection) -> Result<Vec<u8>> {
        Blob::load(conn, &self.blob_hash)
    }

    fn require_id(&self) -> Result<i64> {
        self.id
            .ok_or_else(|| Error::InitError("Release file has no ID".to_string()))
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let rel_str: String = row.get(2)?;
        let rel = rel_str.parse::<FileRel>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
            )
        })?;

        Ok(Self {
            id: Some(row.get(0)?),
            version_id: row.get(1)?,
            rel,
            basename: row.get(3)?,
            blob_hash: row.get(4)?,
            last_modified: row.get(5)?,
            parent_id: row.get(6)?,
            last_serial: row.get(7)?,
        })
    }
}

/// Content-addressed file bodies
pub struct Blob;

impl Blob {
    /// SHA-256 hex digest of `content`
    pub fn digest(content: &[u8]) -> String {
        hex::encode(Sha256::digest(content))
    }

    /// Store `content` once and return its digest
    pub fn store(conn: &Connection, content: &[u8]) -> Result<String> {
        let hash = Self::digest(content);
        conn.execute(
            "INSERT OR IGNORE INTO blobs (hash, size, content) VALUES (?1, ?2, ?3)",
            params![&hash, content.len() as i64, content],
        )?;
        Ok(hash)
    }

    /// Load a stored body
    pub fn load(conn: &Connection, hash: &str) -> Result<Vec<u8>> {
        conn.query_row("SELECT content FROM blobs WHERE hash = ?1", [hash], |row| row.get(0))
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("blob {hash} not found")))
    }
}
