// src/db/models/project.rs

//! Project and version models - releases hosted on an index

use crate::error::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};

/// A project hosted on one index
#[derive(Debug, Clone)]
pub struct ProjectEntry {
    pub id: Option<i64>,
    pub index_id: i64,
    pub name: String,
    /// Serial of the last change to this project's links
    pub last_serial: i64,
}

impl ProjectEntry {
    /// Fetch a project, registering it at `serial` if absent
    pub fn get_or_create(conn: &Connection, index_id: i64, name: &str, serial: i64) -> Result<Self> {
        if let Some(existing) = Self::find(conn, index_id, name)? {
            return Ok(existing);
        }
        conn.execute(
            "INSERT INTO projects (index_id, name, last_serial) VALUES (?1, ?2, ?3)",
            params![index_id, name, serial],
        )?;
        Ok(Self {
            id: Some(conn.last_insert_rowid()),
            index_id,
            name: name.to_string(),
            last_serial: serial,
        })
    }

    /// Find a project on an index
    pub fn find(conn: &Connection, index_id: i64, name: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, index_id, name, last_serial FROM projects WHERE index_id = ?1 AND name = ?2",
        )?;
        let project = stmt
            .query_row(params![index_id, name], Self::from_row)
            .optional()?;
        Ok(project)
    }

    /// List all projects of an index ordered by name
    pub fn list_by_index(conn: &Connection, index_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, index_id, name, last_serial FROM projects WHERE index_id = ?1 ORDER BY name",
        )?;
        let projects = stmt
            .query_map([index_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(projects)
    }

    /// Record a change to this project's links at `serial`
    pub fn touch(&mut self, conn: &Connection, serial: i64) -> Result<()> {
        if let Some(id) = self.id {
            conn.execute(
                "UPDATE projects SET last_serial = ?1 WHERE id = ?2",
                params![serial, id],
            )?;
        }
        self.last_serial = serial;
        Ok(())
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            index_id: row.get(1)?,
            name: row.get(2)?,
            last_serial: row.get(3)?,
        })
    }
}

/// One version of a project with its metadata
#[derive(Debug, Clone)]
pub struct VersionEntry {
    pub id: Option<i64>,
    pub project_id: i64,
    pub version: String,
    pub metadata: serde_json::Value,
    pub last_serial: i64,
}

impl VersionEntry {
    /// Insert or replace the metadata of a version
    pub fn upsert(
        conn: &Connection,
        project_id: i64,
        version: &str,
        metadata: &serde_json::Value,
        serial: i64,
    ) -> Result<Self> {
        let metadata_json = serde_json::to_string(metadata)?;
        conn.execute(
            "INSERT INTO versions (project_id, version, metadata, last_serial)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(project_id, version)
             DO UPDATE SET metadata = excluded.metadata, last_serial = excluded.last_serial",
            params![project_id, version, metadata_json, serial],
        )?;
        Self::find(conn, project_id, version)?.ok_or_else(|| {
            crate::error::Error::InitError(format!("version {version} vanished after upsert"))
        })
    }

    /// Find a version of a project
    pub fn find(conn: &Connection, project_id: i64, version: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, project_id, version, metadata, last_serial
             FROM versions WHERE project_id = ?1 AND version = ?2",
        )?;
        let entry = stmt
            .query_row(params![project_id, version], Self::from_row)
            .optional()?;
        Ok(entry)
    }

    /// List all versions of a project
    pub fn list_by_project(conn: &Connection, project_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, project_id, version, metadata, last_serial
             FROM versions WHERE project_id = ?1",
        )?;
        let versions = stmt
            .query_map([project_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(versions)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let metadata_json: String = row.get(3)?;
        let metadata = serde_json::from_str(&metadata_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(Self {
            id: Some(row.get(0)?),
            project_id: row.get(1)?,
            version: row.get(2)?,
            metadata,
            last_serial: row.get(4)?,
        })
    }
}
