// src/commands/mod.rs
//! Command handlers for the pushreq CLI

mod pr;
mod server;

pub use pr::{
    Session, cmd_abort_pr_review, cmd_approve_pr, cmd_cancel_pr, cmd_delete_pr, cmd_list_prs,
    cmd_new_pr, cmd_reject_pr, cmd_review_pr, cmd_submit_pr,
};
pub use server::cmd_init;
#[cfg(feature = "server")]
pub use server::cmd_serve;
