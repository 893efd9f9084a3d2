// src/db/mod.rs

//! SQLite storage for indexes, releases and the changelog
//!
//! Every write request runs inside a single [`transaction`], so a failure at
//! any point (a rejected validation, a serial mismatch, a file conflict in
//! the middle of an approval) leaves no trace in the database.

pub mod models;
pub mod paths;
pub mod schema;

use crate::error::Result;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Create the database file (and its directory) and apply all migrations
pub fn init(db_path: &str) -> Result<()> {
    if let Some(parent) = Path::new(db_path).parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let conn = open(db_path)?;
    schema::migrate(&conn)?;
    info!("Database ready at {}", db_path);
    Ok(())
}

/// Open a connection with the pragmas the store relies on
pub fn open(db_path: &str) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA journal_mode = WAL;")?;
    conn.busy_timeout(Duration::from_secs(5))?;
    Ok(conn)
}

/// Run `f` inside a transaction, committing only if it succeeds
///
/// The write lock is taken up front, so a request that reads a serial and
/// then writes cannot be overtaken by another writer in between.
pub fn transaction<T, F>(conn: &mut Connection, f: F) -> Result<T>
where
    F: FnOnce(&Transaction) -> Result<T>,
{
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let value = f(&tx)?;
    tx.commit()?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested/store.db");
        let db_path = db_path.to_str().unwrap();
        init(db_path).unwrap();
        let mut conn = open(db_path).unwrap();

        let result: Result<()> = transaction(&mut conn, |tx| {
            models::Changelog::record(tx, "doomed", None)?;
            Err(Error::BadRequest("abort".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(models::Changelog::latest_serial(&conn).unwrap(), 0);

        transaction(&mut conn, |tx| {
            models::Changelog::record(tx, "kept", None)?;
            Ok(())
        })
        .unwrap();
        assert_eq!(models::Changelog::latest_serial(&conn).unwrap(), 1);
    }

    #[test]
    fn test_transaction_holds_write_lock_from_the_start() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("store.db");
        let db_path = db_path.to_str().unwrap();
        init(db_path).unwrap();
        let mut conn = open(db_path).unwrap();
        let other = open(db_path).unwrap();
        other.busy_timeout(Duration::ZERO).unwrap();

        transaction(&mut conn, |_tx| {
            assert!(other.execute_batch("BEGIN IMMEDIATE").is_err());
            Ok(())
        })
        .unwrap();
        other.execute_batch("BEGIN IMMEDIATE; COMMIT;").unwrap();
    }
}
