// src/main.rs

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { db_path } => commands::cmd_init(&db_path),

        #[cfg(feature = "server")]
        Commands::Serve {
            config,
            bind,
            db_path,
        } => commands::cmd_serve(config.as_deref(), bind.as_deref(), db_path.as_deref()),

        Commands::NewPr {
            name,
            target,
            pkgspec,
        } => {
            let session = commands::Session::new(&cli.remote)?;
            commands::cmd_new_pr(&session, &name, &target, &pkgspec)
        }

        Commands::SubmitPr { name, message } => {
            let session = commands::Session::new(&cli.remote)?;
            commands::cmd_submit_pr(&session, &name, message.as_deref())
        }

        Commands::CancelPr { name, message } => {
            let session = commands::Session::new(&cli.remote)?;
            commands::cmd_cancel_pr(&session, &name, message.as_deref())
        }

        Commands::RejectPr { name, message } => {
            let session = commands::Session::new(&cli.remote)?;
            commands::cmd_reject_pr(&session, &name, message.as_deref())
        }

        Commands::ApprovePr {
            name,
            serial,
            message,
            keep_index,
        } => {
            let session = commands::Session::new(&cli.remote)?;
            commands::cmd_approve_pr(
                &session,
                &name,
                serial.as_deref(),
                message.as_deref(),
                keep_index,
            )
        }

        Commands::ReviewPr { name, update } => {
            let session = commands::Session::new(&cli.remote)?;
            commands::cmd_review_pr(&session, &name, update)
        }

        Commands::AbortPrReview { name } => {
            let session = commands::Session::new(&cli.remote)?;
            commands::cmd_abort_pr_review(&session, &name)
        }

        Commands::ListPrs {
            indexname,
            all_states,
            messages,
        } => {
            let session = commands::Session::new(&cli.remote)?;
            commands::cmd_list_prs(&session, indexname.as_deref(), all_states, messages)
        }

        Commands::DeletePr { name } => {
            let session = commands::Session::new(&cli.remote)?;
            commands::cmd_delete_pr(&session, &name)
        }
    }
}
