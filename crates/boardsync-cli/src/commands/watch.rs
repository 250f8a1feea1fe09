//! Follow a board live.

use anyhow::Result;
use boardsync_client::{BoardSession, SnapshotClient};
use boardsync_core::SyncConfig;
use clap::Args;
use colored::Colorize;
use tracing::warn;

use crate::output;

#[derive(Args)]
pub struct WatchArgs {
    /// Seed the board over REST before the socket delivers its snapshot
    #[arg(long)]
    pub seed: bool,
}

pub async fn execute(args: WatchArgs, config: &SyncConfig) -> Result<()> {
    if !config.is_active() {
        anyhow::bail!("Board sync is not configured. Set a token with --token or BOARDSYNC_TOKEN.");
    }

    let initial = if args.seed {
        match SnapshotClient::new().fetch_tasks(config).await {
            Ok(tasks) => Some(tasks),
            Err(e) => {
                warn!(error = %e, "Could not seed board, waiting for the socket snapshot");
                None
            }
        }
    } else {
        None
    };

    let session = BoardSession::start(config, initial)?;
    let mut states = session.subscribe_state();
    let mut board = session.subscribe_board();

    println!(
        "  {} {}  {}",
        "boardsync".cyan().bold(),
        session.board_id().bold(),
        "Ctrl+C to stop".dimmed()
    );
    println!();

    loop {
        tokio::select! {
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *states.borrow_and_update();
                output::print_state(session.board_id(), state);
            }
            changed = board.changed() => {
                if changed.is_err() {
                    break;
                }
                let store = board.borrow_and_update().clone();
                println!();
                output::print_board(&store);
                println!();
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    session.shutdown().await;
    Ok(())
}
