//! CLI module for Convoy
//!
//! - `serve`: start the HTTP server (default)
//! - `reset`: delete every tracked run

use crate::server::config::AppConfig;
use clap::{Parser, Subcommand};

/// Convoy CLI
#[derive(Parser, Debug)]
#[command(name = "convoy")]
#[command(about = "Run reconciliation and live event fan-out")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the server (default)
    Serve {
        /// Override the configured bind host
        #[arg(long)]
        host: Option<String>,
        /// Override the configured port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Delete every tracked run (incidents and their logs are kept)
    Reset,
}

/// Run the CLI command
pub async fn run(cli: Cli, mut config: AppConfig) -> anyhow::Result<()> {
    match cli.command {
        Some(Commands::Reset) => {
            let removed = crate::server::reset_runs(&config).await?;
            println!("Removed {removed} run(s)");
            Ok(())
        }
        Some(Commands::Serve { host, port }) => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            crate::server::run(config).await
        }
        None => crate::server::run(config).await,
    }
}
