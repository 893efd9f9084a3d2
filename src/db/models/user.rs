// src/db/models/user.rs

//! User model - owners of indexes

use crate::error::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};

#[derive(Debug, Clone)]
pub struct User {
    pub id: Option<i64>,
    pub name: String,
    pub created_serial: i64,
}

impl User {
    pub fn new(name: String, created_serial: i64) -> Self {
        Self {
            id: None,
            name,
            created_serial,
        }
    }

    /// Insert this user into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO users (name, created_serial) VALUES (?1, ?2)",
            params![&self.name, self.created_serial],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Find a user by name
    pub fn find_by_name(conn: &Connection, name: &str) -> Result<Option<Self>> {
        let mut stmt =
            conn.prepare("SELECT id, name, created_serial FROM users WHERE name = ?1")?;
        let user = stmt.query_row([name], Self::from_row).optional()?;
        Ok(user)
    }

    /// List all users ordered by name
    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare("SELECT id, name, created_serial FROM users ORDER BY name")?;
        let users = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(users)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            name: row.get(1)?,
            created_serial: row.get(2)?,
        })
    }
}
