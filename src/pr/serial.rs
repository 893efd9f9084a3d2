// src/pr/serial.rs

//! Reference serial of a staging index
//!
//! Uploads and configuration edits are separate write streams. The
//! reference serial is the newest serial of either: the configuration's
//! last write, or the link list of any project on the index. An approver
//! sends the value they reviewed; approval goes ahead only if it still
//! matches.

use crate::db::models::{IndexEntry, ProjectEntry};
use crate::error::{Error, Result};
use rusqlite::Connection;

/// Compute the reference serial of `stage`
///
/// Pure read, linear in the number of projects on the index.
pub fn compute_reference_serial(conn: &Connection, stage: &IndexEntry) -> Result<i64> {
    let id = stage
        .id
        .ok_or_else(|| Error::InitError(format!("index {} has no ID", stage.full_name())))?;

    let serial = ProjectEntry::list_by_index(conn, id)?
        .iter()
        .map(|project| project.last_serial)
        .fold(stage.config_serial, i64::max);
    Ok(serial)
}

/// Parse the raw `X-Devpi-PR-Serial` header value
pub fn parse_serial_header(raw: Option<&str>) -> Result<i64> {
    let raw = raw.ok_or(Error::MissingSerialHeader)?;
    raw.trim()
        .parse::<i64>()
        .map_err(|_| Error::InvalidSerialHeader(raw.to_string()))
}

/// Fail unless the submitted serial equals the current reference serial
pub fn check_reference_serial(got: i64, expected: i64) -> Result<()> {
    if got == expected {
        Ok(())
    } else {
        Err(Error::SerialMismatch { got, expected })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{Changelog, User};
    use crate::db::schema;
    use crate::index::{IndexConfig, IndexKind, Stage};
    use tempfile::NamedTempFile;

    fn setup() -> (NamedTempFile, Connection, IndexEntry) {
        let temp_file = NamedTempFile::new().unwrap();
        let conn = Connection::open(temp_file.path()).unwrap();
        conn.execute("PRAGMA foreign_keys = ON", []).unwrap();
        schema::migrate(&conn).unwrap();

        let serial = Changelog::record(&conn, "setup", None).unwrap();
        let user_id = User::new("alice".to_string(), serial).insert(&conn).unwrap();
        let mut entry = IndexEntry::new(
            user_id,
            "alice".to_string(),
            "+pr-fix".to_string(),
            IndexConfig::new(IndexKind::Merge),
            serial,
        );
        entry.insert(&conn).unwrap();
        (temp_file, conn, entry)
    }

    #[test]
    fn test_empty_index_uses_config_serial() {
        let (_temp, conn, entry) = setup();
        let serial = compute_reference_serial(&conn, &entry).unwrap();
        assert_eq!(serial, entry.config_serial);
        assert_eq!(compute_reference_serial(&conn, &entry).unwrap(), serial);
    }

    #[test]
    fn test_uploads_raise_the_serial() {
        let (_temp, conn, entry) = setup();
        let before = compute_reference_serial(&conn, &entry).unwrap();

        let mut stage = Stage::new(&conn, entry);
        let upload = Changelog::record(&conn, "upload", None).unwrap();
        stage
            .store_releasefile("pkg", "1.0", "pkg-1.0.tar.gz", b"x", None, upload)
            .unwrap();
        let entry = stage.into_entry();

        let after = compute_reference_serial(&conn, &entry).unwrap();
        assert!(after > before);
        assert_eq!(after, upload);
    }

    #[test]
    fn test_header_parsing() {
        assert_eq!(parse_serial_header(Some("42")).unwrap(), 42);
        assert!(matches!(parse_serial_header(None), Err(Error::MissingSerialHeader)));
        assert!(matches!(
            parse_serial_header(Some("abc")),
            Err(Error::InvalidSerialHeader(_))
        ));
    }

    #[test]
    fn test_mismatch_reports_both_values() {
        assert!(check_reference_serial(5, 5).is_ok());
        let err = check_reference_serial(4, 5).unwrap_err();
        assert_eq!(err.to_string(), "got X-Devpi-PR-Serial 4, expected 5");
    }
}
