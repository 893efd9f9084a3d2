// src/lib.rs

//! Push requests for package indexes
//!
//! A user stages releases in a dedicated `merge` index (named `+pr-...`)
//! that targets a regular index. The staging index moves through a small
//! state machine: `new`, `pending`, then `approved` or `rejected`. Approval
//! copies the staged releases into the target, guarded by the serial the
//! reviewer looked at.
//!
//! # Architecture
//!
//! - Database-first: users, indexes, releases and the changelog live in SQLite
//! - One serial per write request, one transaction per write request
//! - Index types plug in through the `StageCustomizer` trait
//! - The HTTP server (feature `server`) and the CLI client are thin layers

pub mod client;
pub mod db;
mod error;
pub mod index;
pub mod name;
pub mod pr;
pub mod version;

#[cfg(feature = "server")]
pub mod server;

pub use error::{Error, Result};
pub use index::{IndexConfig, IndexKind, RequestContext, Stage};
pub use name::{IndexName, NameParseError};
pub use pr::{PrState, StagingIndexPolicy};
