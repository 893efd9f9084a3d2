// src/db/models/file_log.rs

//! Provenance log entries of release files

use crate::error::Result;
use chrono::Utc;
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};

/// One provenance log entry
///
/// Known keys are typed; anything else a log carries is kept verbatim in
/// `extra` so copying a log never loses information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub what: String,
    #[serde(default)]
    pub who: Option<String>,
    pub when: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dst: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl LogEntry {
    /// New entry stamped with the current time
    pub fn new(what: &str, who: Option<&str>) -> Self {
        Self {
            what: what.to_string(),
            who: who.map(String::from),
            when: timestamp(),
            src: None,
            dst: None,
            message: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_src(mut self, src: &str) -> Self {
        self.src = Some(src.to_string());
        self
    }

    pub fn with_dst(mut self, dst: &str) -> Self {
        self.dst = Some(dst.to_string());
        self
    }

    pub fn with_message(mut self, message: &str) -> Self {
        self.message = Some(message.to_string());
        self
    }
}

/// Current UTC time in the format used by logs and modification times
pub fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Log storage for release files
pub struct FileLog;

impl FileLog {
    /// Append one entry to a file's log
    pub fn append(conn: &Connection, file_id: i64, entry: &LogEntry) -> Result<()> {
        conn.execute(
            "INSERT INTO file_logs (file_id, entry) VALUES (?1, ?2)",
            params![file_id, serde_json::to_string(entry)?],
        )?;
        Ok(())
    }

    /// All entries of a file's log, oldest first
    pub fn list(conn: &Connection, file_id: i64) -> Result<Vec<LogEntry>> {
        let mut stmt =
            conn.prepare("SELECT entry FROM file_logs WHERE file_id = ?1 ORDER BY id")?;
        let raw = stmt
            .query_map([file_id], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        raw.iter()
            .map(|json| Ok(serde_json::from_str(json)?))
            .collect()
    }
}
