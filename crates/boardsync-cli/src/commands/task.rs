//! Task commands sent over the sync socket.

use std::time::Duration;

use anyhow::{Context, Result};
use boardsync_client::{BoardSession, SnapshotClient};
use boardsync_core::{BoardSyncTask, ConnectionState, SyncConfig, TaskStatus};
use clap::{Args, Subcommand};
use colored::Colorize;

use crate::output;

#[derive(Subcommand)]
pub enum TaskCommands {
    /// List the board's tasks
    List,

    /// Move a task to a different status
    Move(MoveTaskArgs),

    /// Ask the server to create a task
    Create(CreateTaskArgs),
}

#[derive(Args)]
pub struct MoveTaskArgs {
    /// Task ID, or a prefix matching one task
    pub task_id: String,

    /// Target status (inbox, in_progress, review, done)
    pub status: String,

    /// Seconds to wait for the server to confirm
    #[arg(long, default_value = "10")]
    pub timeout: u64,
}

#[derive(Args)]
pub struct CreateTaskArgs {
    /// Task title
    pub title: String,

    /// Initial status
    #[arg(long, default_value = "inbox")]
    pub status: String,

    /// Agent to assign
    #[arg(long)]
    pub assignee: Option<String>,

    /// Seconds to wait for the server to confirm
    #[arg(long, default_value = "10")]
    pub timeout: u64,
}

fn parse_status(raw: &str) -> Result<TaskStatus> {
    TaskStatus::parse(raw).with_context(|| {
        format!("Unknown status '{}'. Use inbox, in_progress, review or done.", raw)
    })
}

pub async fn execute(cmd: TaskCommands, config: &SyncConfig) -> Result<()> {
    match cmd {
        TaskCommands::List => {
            let tasks = SnapshotClient::new().fetch_tasks(config).await?;
            output::print_tasks_table(&tasks);
        }

        TaskCommands::Move(args) => {
            let status = parse_status(&args.status)?;
            let timeout = Duration::from_secs(args.timeout);
            let session = connected_session(config, timeout).await?;

            let before = match resolve_task(&session.tasks(), &args.task_id) {
                Ok(task) => task,
                Err(e) => {
                    session.shutdown().await;
                    return Err(e);
                }
            };
            let task_id = before.id.clone();
            if before.status == status {
                session.shutdown().await;
                println!("{} {} is already {}", "✓".green().bold(), task_id.cyan(), status);
                return Ok(());
            }

            session.move_task(&task_id, status);
            // The local move is optimistic; the server's echo bumps updated_at.
            let confirmed = session
                .wait_for_board(timeout, |store| {
                    store.task(&task_id).is_some_and(|t| {
                        t.status == status && t.updated_at != before.updated_at
                    })
                })
                .await;
            session.shutdown().await;

            if !confirmed {
                anyhow::bail!("Move was not confirmed within {}s", args.timeout);
            }
            println!(
                "{} Moved {} to {}",
                "✓".green().bold(),
                task_id.cyan(),
                status.as_str().bold()
            );
        }

        TaskCommands::Create(args) => {
            let status = parse_status(&args.status)?;
            let timeout = Duration::from_secs(args.timeout);
            let session = connected_session(config, timeout).await?;

            let before: Vec<String> = session.tasks().into_iter().map(|t| t.id).collect();
            session.create_task(&args.title, status, args.assignee.clone());

            let title = args.title.clone();
            let appeared = session
                .wait_for_board(timeout, |store| {
                    store
                        .tasks()
                        .iter()
                        .any(|t| t.title == title && !before.contains(&t.id))
                })
                .await;
            let created = session
                .tasks()
                .into_iter()
                .find(|t| t.title == args.title && !before.contains(&t.id));
            session.shutdown().await;

            match created {
                Some(task) if appeared => println!(
                    "{} Created task: {} ({})",
                    "✓".green().bold(),
                    task.title.cyan(),
                    task.id.dimmed()
                ),
                _ => anyhow::bail!("Create was not confirmed within {}s", args.timeout),
            }
        }
    }

    Ok(())
}

/// Find a task by full id or by a prefix matching exactly one task.
fn resolve_task(tasks: &[BoardSyncTask], id: &str) -> Result<BoardSyncTask> {
    if let Some(task) = tasks.iter().find(|t| t.id == id) {
        return Ok(task.clone());
    }
    let mut matches = tasks.iter().filter(|t| !id.is_empty() && t.id.starts_with(id));
    match (matches.next(), matches.next()) {
        (Some(task), None) => Ok(task.clone()),
        (Some(_), Some(_)) => anyhow::bail!("Task id '{}' is ambiguous, use more characters", id),
        _ => anyhow::bail!("Task not found: {}", id),
    }
}

/// Start a session and wait for the first authoritative snapshot.
async fn connected_session(config: &SyncConfig, timeout: Duration) -> Result<BoardSession> {
    if !config.is_active() {
        anyhow::bail!("Board sync is not configured. Set a token with --token or BOARDSYNC_TOKEN.");
    }

    let session = BoardSession::start(config, None)?;
    let ready = session.wait_for_state(ConnectionState::Connected, timeout).await
        && session
            .wait_for_board(timeout, |store| store.has_authoritative_snapshot())
            .await;

    if !ready {
        let state = session.connection_state();
        session.shutdown().await;
        anyhow::bail!("Could not sync board {} (state: {})", config.board_id, state);
    }
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str) -> BoardSyncTask {
        BoardSyncTask {
            id: id.to_string(),
            board_id: "b".to_string(),
            title: id.to_string(),
            description: None,
            status: TaskStatus::Inbox,
            priority: "medium".to_string(),
            due_at: None,
            assigned_agent_id: None,
            created_by_user_id: None,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn test_resolve_task_by_prefix() {
        let tasks = vec![
            task("7c9e6679-7425-40de-944b-e07fc1f90ae7"),
            task("7c9e0000-0000-0000-0000-000000000000"),
            task("demo"),
            task("demo-1"),
        ];

        let found = resolve_task(&tasks, "7c9e6679").unwrap();
        assert_eq!(found.id, "7c9e6679-7425-40de-944b-e07fc1f90ae7");

        // An exact id wins over a longer id sharing it as prefix.
        assert_eq!(resolve_task(&tasks, "demo").unwrap().id, "demo");

        let err = resolve_task(&tasks, "7c9e").unwrap_err();
        assert!(err.to_string().contains("ambiguous"));

        let err = resolve_task(&tasks, "ffff").unwrap_err();
        assert!(err.to_string().contains("not found"));
        assert!(resolve_task(&tasks, "").is_err());
    }
}
