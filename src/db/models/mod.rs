// src/db/models/mod.rs

//! Data models for pushreq database entities
//!
//! This module defines Rust structs that correspond to database tables
//! and provides methods for creating, reading, updating, and deleting records.

mod changelog;
mod file_log;
mod index;
mod project;
mod release_file;
mod user;

pub use changelog::Changelog;
pub use file_log::{FileLog, LogEntry, timestamp};
pub use index::IndexEntry;
pub use project::{ProjectEntry, VersionEntry};
pub use release_file::{Blob, FileRel, ReleaseFile};
pub use user::User;
