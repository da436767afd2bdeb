//! CLI for keepfetch.

mod commands;
mod manifest;

use anyhow::Result;
use clap::{Parser, Subcommand};
use keepfetch_core::config;
use std::path::PathBuf;

use commands::{run_config, run_fetch, FetchArgs};

/// Top-level CLI for keepfetch.
#[derive(Debug, Parser)]
#[command(name = "keepfetch")]
#[command(about = "keepfetch: bulk downloads from one host over reused keep-alive connections", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download files from one host through a bounded pool of connections.
    Fetch {
        /// Source URLs; every one must name the same host.
        urls: Vec<String>,

        /// File of `URL [DEST]` lines; `#` starts a comment.
        #[arg(long, value_name = "FILE")]
        manifest: Option<PathBuf>,

        /// Directory for downloads (default: current directory).
        #[arg(long, value_name = "DIR")]
        dest_dir: Option<PathBuf>,

        /// Maximum persistent connections (default: max_connections from config).
        #[arg(short = 'c', long, value_name = "N")]
        connections: Option<usize>,

        /// Plain TCP instead of TLS (for local test servers).
        #[arg(long)]
        plain: bool,

        /// Print the run report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show the config file path and effective settings.
    Config,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Fetch {
                urls,
                manifest,
                dest_dir,
                connections,
                plain,
                json,
            } => {
                let dest_dir = match dest_dir {
                    Some(dir) => dir,
                    None => std::env::current_dir()?,
                };
                let args = FetchArgs {
                    urls,
                    manifest,
                    dest_dir,
                    connections,
                    plain,
                    json,
                };
                run_fetch(&cfg, args).await?;
            }
            CliCommand::Config => run_config(&cfg)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
