//! docqa - question answering over local documents
#![allow(
    missing_docs,
    reason = "CLI arguments are documented through clap help attributes"
)]
#![cfg_attr(
    test,
    allow(
        dead_code,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        clippy::missing_errors_doc,
        clippy::print_stdout,
        clippy::print_stderr,
        reason = "Allow for tests"
    )
)]

use anyhow::Result;
use clap::Parser as _;
use cli::{Cli, Commands};

mod cli;
mod handlers;
mod interactive;
mod utils;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Chat owns the terminal, so its logs go to a file
    if matches!(cli.command, Commands::Chat { .. }) {
        let debug_log = utils::init_file_logging(&utils::state_dir()?)?;
        tracing::debug!("Logging to {}", debug_log.display());
    } else {
        utils::init_stderr_logging();
    }

    let config = utils::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Ingest {
            data,
            pattern,
            index,
        } => handlers::handle_ingest(config, data, pattern, index).await,
        Commands::Ask {
            question,
            top_k,
            no_stream,
        } => handlers::handle_ask(&config, &question, top_k, no_stream).await,
        Commands::Chat { session, ephemeral } => {
            handlers::handle_chat(&config, session, ephemeral).await
        }
        Commands::Sessions { action } => handlers::handle_sessions(&config, action),
    }
}
