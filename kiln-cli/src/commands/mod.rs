//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod history;
mod job;

pub use job::JobCommands;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Job management and builds
    Job {
        #[command(subcommand)]
        command: JobCommands,
    },
    /// Show build history
    History {
        /// Only builds of this job
        #[arg(long)]
        job: Option<String>,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    let client = config.client();

    match command {
        Commands::Job { command } => job::handle_job_command(command, &client).await,
        Commands::History { job } => history::show_history(&client, job.as_deref()).await,
    }
}
