//! CLI command definitions and handlers.

use anyhow::{Context, Result};
use boardsync_core::SyncConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod config;
pub mod serve;
pub mod task;
pub mod watch;

/// Real-time board sync client
#[derive(Parser)]
#[command(name = "boardsync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// API base URL, e.g. http://127.0.0.1:8000
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Access token
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Board ID
    #[arg(short, long, global = true)]
    pub board: Option<String>,

    /// Also write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Follow a board live
    Watch(watch::WatchArgs),

    /// Send task changes to a board
    #[command(subcommand)]
    Task(task::TaskCommands),

    /// Run a local in-memory relay
    Serve(serve::ServeArgs),

    /// Inspect configuration
    #[command(subcommand)]
    Config(config::ConfigCommands),
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let config = self.resolve_config()?;

        match self.command {
            Commands::Watch(args) => watch::execute(args, &config).await,
            Commands::Task(cmd) => task::execute(cmd, &config).await,
            Commands::Serve(args) => serve::execute(args).await,
            Commands::Config(cmd) => config::execute(cmd, &config, self.config.as_deref()),
        }
    }

    /// Defaults, then the config file, then environment, then flags.
    fn resolve_config(&self) -> Result<SyncConfig> {
        let mut config = SyncConfig::load(self.config.as_deref()).with_context(|| {
            match &self.config {
                Some(path) => format!("Failed to load config from {}", path.display()),
                None => "Failed to load config".to_string(),
            }
        })?;

        if let Some(url) = &self.api_url {
            config.api_url = url.clone();
        }
        if let Some(token) = &self.token {
            config.token = Some(token.clone());
        }
        if let Some(board) = &self.board {
            config.board_id = board.clone();
        }
        Ok(config)
    }
}
