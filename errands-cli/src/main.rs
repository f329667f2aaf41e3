//! Errands CLI
//!
//! Command-line interface for inspecting and cleaning up errands.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;

#[derive(Parser)]
#[command(name = "errands")]
#[command(about = "CLI for interacting with the errands service", long_about = None)]
struct Cli {
    /// Errands service endpoint
    #[arg(
        long,
        global = true,
        env = "ERRANDS_ENDPOINT",
        default_value = "http://localhost:5555"
    )]
    endpoint: String,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config {
        endpoint: cli.endpoint,
    };

    handle_command(cli.command, &config).await
}
