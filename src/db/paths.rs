// src/db/paths.rs
//! Centralized path derivation for pushreq directories

use std::path::{Path, PathBuf};

/// Default location of the server database
pub const DEFAULT_DB_PATH: &str = "/var/lib/pushreq/pushreq.db";

/// Get the directory containing the database
pub fn db_dir(db_path: &str) -> PathBuf {
    Path::new(db_path)
        .parent()
        .unwrap_or(Path::new("/var/lib/pushreq"))
        .to_path_buf()
}

/// Get the per-user client data directory (review bookmarks live here)
///
/// `PUSHREQ_DATA_DIR` overrides the platform data directory.
pub fn client_data_dir() -> PathBuf {
    std::env::var("PUSHREQ_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("pushreq")
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_dir() {
        assert_eq!(
            db_dir("/var/lib/pushreq/pushreq.db"),
            PathBuf::from("/var/lib/pushreq")
        );
    }

    #[test]
    fn test_db_dir_relative() {
        assert_eq!(db_dir("data/pushreq.db"), PathBuf::from("data"));
    }
}
