// src/client/mod.rs

//! Client side of the push request workflow
//!
//! The `pushreq` subcommands talk to a server through [`PushreqClient`],
//! keep review bookmarks locally and render listings.

pub mod api;
pub mod listing;
pub mod message;
pub mod review;

pub use api::{PR_SERIAL_HEADER, PushreqClient, RemoteIndex};
pub use listing::{create_pr_list_output, merge_pr_data};
pub use message::get_message;
pub use review::{ReviewData, ReviewLock, ReviewLockError};
