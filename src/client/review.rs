// src/client/review.rs

//! Review bookmarks
//!
//! A reviewer bookmarks the serial of a staging index when they start
//! looking at it; approving later sends that serial so the server can tell
//! whether the index changed in the meantime. Bookmarks live in
//! `reviews.json` next to a `reviews.lock` file which guards every
//! read-modify-write cycle. The lock is advisory and never waited on.

use crate::db::paths::client_data_dir;
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

const LOCK_FILE: &str = "reviews.lock";
const DATA_FILE: &str = "reviews.json";

/// Failures while accessing the review bookmarks
#[derive(Debug, Error)]
pub enum ReviewLockError {
    /// Another command holds the lock
    #[error(
        "There is an existing lock at {}\nThis can happen if a previous pushreq command crashed. \
         If you are sure there is no other pushreq command still running, you can remove the file.",
        .0.display()
    )]
    Locked(PathBuf),

    #[error("Failed to access review data at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Review data at {} is corrupt: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> ReviewLockError + '_ {
    move |source| ReviewLockError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Exclusive hold on the review data directory, released on drop
#[derive(Debug)]
pub struct ReviewLock {
    path: PathBuf,
}

impl ReviewLock {
    /// Acquire the lock in `dir`, failing immediately if it is held
    pub fn acquire(dir: &Path) -> Result<Self, ReviewLockError> {
        fs::create_dir_all(dir).map_err(io_error(dir))?;
        let path = dir.join(LOCK_FILE);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => {
                debug!("Acquired review lock {}", path.display());
                Ok(Self { path })
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(ReviewLockError::Locked(path)),
            Err(e) => Err(io_error(&path)(e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ReviewLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path)
            && e.kind() != ErrorKind::NotFound
        {
            warn!("Failed to remove review lock {}: {}", self.path.display(), e);
        }
    }
}

/// Bookmarked serials, keyed by full staging index name
pub type Reviews = BTreeMap<String, i64>;

/// Review bookmarks loaded under the lock
///
/// Changes are written back by [`ReviewData::save`]; the file is only
/// rewritten when the bookmarks differ from what was loaded.
#[derive(Debug)]
pub struct ReviewData {
    dir: PathBuf,
    original: Option<Reviews>,
    pub reviews: Reviews,
    _lock: ReviewLock,
}

impl ReviewData {
    /// Open the bookmarks in the default client data directory
    pub fn open_default() -> Result<Self, ReviewLockError> {
        Self::open(&client_data_dir())
    }

    /// Lock `dir` and load its bookmarks
    pub fn open(dir: &Path) -> Result<Self, ReviewLockError> {
        let lock = ReviewLock::acquire(dir)?;
        let path = dir.join(DATA_FILE);

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => return Err(io_error(&path)(e)),
        };
        let original: Option<Reviews> = if content.trim().is_empty() {
            None
        } else {
            Some(
                serde_json::from_str(&content)
                    .map_err(|source| ReviewLockError::Corrupt { path: path.clone(), source })?,
            )
        };

        Ok(Self {
            dir: dir.to_path_buf(),
            reviews: original.clone().unwrap_or_default(),
            original,
            _lock: lock,
        })
    }

    pub fn get(&self, index: &str) -> Option<i64> {
        self.reviews.get(index).copied()
    }

    pub fn contains(&self, index: &str) -> bool {
        self.reviews.contains_key(index)
    }

    pub fn set(&mut self, index: &str, serial: i64) {
        self.reviews.insert(index.to_string(), serial);
    }

    pub fn remove(&mut self, index: &str) -> Option<i64> {
        self.reviews.remove(index)
    }

    /// Whether the bookmarks differ from the file
    pub fn is_changed(&self) -> bool {
        self.original.as_ref() != Some(&self.reviews)
    }

    /// Write the bookmarks back if they changed, then release the lock
    pub fn save(self) -> Result<bool, ReviewLockError> {
        if !self.is_changed() {
            return Ok(false);
        }
        let path = self.dir.join(DATA_FILE);
        let content = serde_json::to_string(&self.reviews)
            .map_err(|source| ReviewLockError::Corrupt { path: path.clone(), source })?;
        fs::write(&path, content).map_err(io_error(&path))?;
        debug!("Saved {} review bookmark(s)", self.reviews.len());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_initial_access_creates_empty_file() {
        let dir = tempdir().unwrap();
        let data = ReviewData::open(dir.path()).unwrap();
        assert!(data.reviews.is_empty());
        assert!(dir.path().join(LOCK_FILE).exists());
        assert!(data.save().unwrap());

        assert_eq!(fs::read_to_string(dir.path().join(DATA_FILE)).unwrap(), "{}");
        assert!(!dir.path().join(LOCK_FILE).exists());
    }

    #[test]
    fn test_nested_access_fails() {
        let dir = tempdir().unwrap();
        let _held = ReviewData::open(dir.path()).unwrap();

        let err = ReviewData::open(dir.path()).unwrap_err();
        assert!(matches!(err, ReviewLockError::Locked(_)));
        let message = err.to_string();
        assert!(message.starts_with("There is an existing lock at"));
        assert!(message.ends_with("you can remove the file."));
    }

    #[test]
    fn test_unchanged_data_is_not_rewritten() {
        let dir = tempdir().unwrap();
        let file = dir.path().join(DATA_FILE);
        fs::write(&file, r#"{"bob/+pr-fix": 7}"#).unwrap();

        let data = ReviewData::open(dir.path()).unwrap();
        assert_eq!(data.get("bob/+pr-fix"), Some(7));
        assert!(!data.save().unwrap());
        // Original formatting untouched
        assert_eq!(fs::read_to_string(&file).unwrap(), r#"{"bob/+pr-fix": 7}"#);
    }

    #[test]
    fn test_changes_persist() {
        let dir = tempdir().unwrap();
        {
            let mut data = ReviewData::open(dir.path()).unwrap();
            data.set("bob/+pr-fix", 11);
            data.save().unwrap();
        }
        let mut data = ReviewData::open(dir.path()).unwrap();
        assert_eq!(data.get("bob/+pr-fix"), Some(11));
        assert_eq!(data.remove("bob/+pr-fix"), Some(11));
        assert!(data.save().unwrap());

        let data = ReviewData::open(dir.path()).unwrap();
        assert!(!data.contains("bob/+pr-fix"));
    }

    #[test]
    fn test_lock_released_on_drop() {
        let dir = tempdir().unwrap();
        {
            let lock = ReviewLock::acquire(dir.path()).unwrap();
            assert!(lock.path().exists());
        }
        assert!(ReviewLock::acquire(dir.path()).is_ok());
    }
}
