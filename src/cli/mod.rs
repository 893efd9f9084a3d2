// src/cli/mod.rs
//! CLI definitions for pushreq
//!
//! This module contains all command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.
//!
//! Server side:
//! - `init` - Create or migrate the database
//! - `serve` - Run the HTTP server
//!
//! Push request workflow:
//! - `new-pr`, `submit-pr`, `cancel-pr`, `delete-pr` - Requester commands
//! - `review-pr`, `abort-pr-review`, `approve-pr`, `reject-pr` - Reviewer commands
//! - `list-prs` - Show push requests of an index and of the current user

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "pushreq")]
#[command(author = "Pushreq Contributors")]
#[command(version)]
#[command(about = "Push requests for package indexes: stage, review, approve", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub remote: RemoteArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Connection settings shared by the workflow commands
#[derive(Args, Debug, Clone)]
pub struct RemoteArgs {
    /// Server URL
    #[arg(long, global = true, env = "PUSHREQ_URL", default_value = "http://localhost:3141")]
    pub url: String,

    /// Acting user
    #[arg(long, global = true, env = "PUSHREQ_USER")]
    pub user: Option<String>,

    /// Current index, as USER/NAME
    #[arg(long, global = true, env = "PUSHREQ_INDEX")]
    pub index: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create or migrate the server database
    Init {
        /// Path to the database file
        #[arg(short, long, default_value = "/var/lib/pushreq/pushreq.db")]
        db_path: String,
    },

    /// Run the HTTP server
    #[cfg(feature = "server")]
    Serve {
        /// TOML configuration file
        #[arg(short, long)]
        config: Option<String>,

        /// Address to bind to, overrides the configuration file
        #[arg(long)]
        bind: Option<String>,

        /// Path to the database file, overrides the configuration file
        #[arg(short, long)]
        db_path: Option<String>,
    },

    /// Create a push request
    NewPr {
        /// Push request name
        name: String,

        /// Target index of form USER/NAME
        target: String,

        /// Releases in format name==version which are added to this push request
        pkgspec: Vec<String>,
    },

    /// Submit a push request for review
    SubmitPr {
        /// Push request name
        name: String,

        /// Message to add on submit
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Withdraw a submitted or rejected push request
    CancelPr {
        /// Push request name
        name: String,

        /// Message to add on cancel
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Reject a push request
    RejectPr {
        /// Push request name
        name: String,

        /// Message to add on reject
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Approve a push request, transferring its releases
    ApprovePr {
        /// Push request name
        name: String,

        /// Push request serial, only required if not using review-pr first
        #[arg(short, long)]
        serial: Option<String>,

        /// Message to add on approve
        #[arg(short, long)]
        message: Option<String>,

        /// Keep the staging index instead of deleting it after approval
        #[arg(short, long)]
        keep_index: bool,
    },

    /// Start reviewing a push request
    ReviewPr {
        /// Push request name
        name: String,

        /// Update the serial of the review
        #[arg(short, long)]
        update: bool,
    },

    /// Abort the review of a push request
    AbortPrReview {
        /// Push request name
        name: String,
    },

    /// List push requests
    ListPrs {
        /// Index name as NAME or USER/NAME, defaults to the current index
        indexname: Option<String>,

        /// Output normally hidden states
        #[arg(short, long)]
        all_states: bool,

        /// Include state change messages in output
        #[arg(short, long)]
        messages: bool,
    },

    /// Delete a push request
    DeletePr {
        /// Push request name
        name: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_approve() {
        let cli = Cli::try_parse_from([
            "pushreq", "--user", "alice", "approve-pr", "bob/fix", "-s", "12", "-m", "ok", "-k",
        ])
        .unwrap();
        assert_eq!(cli.remote.user.as_deref(), Some("alice"));
        match cli.command {
            Commands::ApprovePr {
                name,
                serial,
                message,
                keep_index,
            } => {
                assert_eq!(name, "bob/fix");
                assert_eq!(serial.as_deref(), Some("12"));
                assert_eq!(message.as_deref(), Some("ok"));
                assert!(keep_index);
            }
            _ => panic!("expected approve-pr"),
        }
    }

    #[test]
    fn test_parse_new_pr_specs() {
        let cli = Cli::try_parse_from([
            "pushreq", "new-pr", "fix", "alice/prod", "pkg==1.0", "other==2.0",
        ])
        .unwrap();
        match cli.command {
            Commands::NewPr { name, target, pkgspec } => {
                assert_eq!(name, "fix");
                assert_eq!(target, "alice/prod");
                assert_eq!(pkgspec, vec!["pkg==1.0", "other==2.0"]);
            }
            _ => panic!("expected new-pr"),
        }
    }
}
