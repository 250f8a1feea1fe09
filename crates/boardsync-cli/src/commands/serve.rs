//! Local relay command.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use boardsync_relay::RelayState;
use clap::Args;
use colored::Colorize;

#[derive(Args)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(long, default_value = "8000")]
    pub port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Board to host (repeatable)
    #[arg(long = "host-board", value_name = "BOARD_ID", default_value = "demo")]
    pub boards: Vec<String>,

    /// Accepted token (repeatable). With none, any non-empty token is accepted.
    #[arg(long = "accept-token", value_name = "TOKEN")]
    pub tokens: Vec<String>,

    /// Fill each board with demo tasks
    #[arg(long)]
    pub seed_demo: bool,
}

pub async fn execute(args: ServeArgs) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", args.host, args.port))?;

    let state = RelayState::new(args.tokens.iter().cloned());
    for board in &args.boards {
        let tasks = if args.seed_demo {
            boardsync_relay::demo_tasks(board)
        } else {
            Vec::new()
        };
        state.put_board(board, tasks).await;
    }

    println!();
    println!("  {} {}", "boardsync".cyan().bold(), "Relay".bold());
    println!();
    println!("  {}       http://{}/api/v1", "API".green(), addr);
    for board in &args.boards {
        println!("  {}      ws://{}/ws/board/{}/sync", "Board".green(), addr, board);
    }
    if args.tokens.is_empty() {
        println!("  {}", "Any non-empty token is accepted".yellow());
    }
    println!();
    println!("  {}", "Ctrl+C to stop".dimmed());
    println!();

    tokio::select! {
        result = boardsync_relay::run_server(addr, state) => result?,
        _ = tokio::signal::ctrl_c() => {}
    }

    Ok(())
}
