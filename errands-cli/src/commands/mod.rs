//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod errand;

pub use errand::{DeleteArgs, ListFilter};

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// List errands, optionally filtered by status or type
    List(ListFilter),
    /// Delete an errand by ID, or errands by type and status
    Delete(DeleteArgs),
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::List(filter) => errand::list_errands(config, filter).await,
        Commands::Delete(args) => errand::delete_errands(config, args).await,
    }
}
