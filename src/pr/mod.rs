// src/pr/mod.rs

//! Push requests
//!
//! A push request is a `merge` index whose single base is the target
//! index. Its configuration carries the request's history: `states`,
//! `messages` and `changers`, all append-only. This module holds the
//! state graph, the reference serial used for optimistic concurrency on
//! approval, the staging-index customizer, the transfer of approved
//! releases and the listing views.

pub mod policy;
pub mod serial;
pub mod state;
pub mod transfer;
pub mod views;

pub use policy::StagingIndexPolicy;
pub use serial::compute_reference_serial;
pub use state::{CREATION_MESSAGE, PrState};
pub use transfer::{TransferSummary, copy_release, transfer};
pub use views::{PrListing, PrSummary, index_listing, user_listing};
