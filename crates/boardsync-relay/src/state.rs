//! Relay state: boards held in memory, each with its own broadcast channel.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use boardsync_core::protocol::{BoardSnapshot, TaskCreated, TaskDeleted, TaskUpdate};
use boardsync_core::{AgentSuggestion, BoardSyncTask, ServerMessage, TaskChanges, TaskStatus};
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

/// Per-board broadcast capacity.
const CHANNEL_CAPACITY: usize = 100;

/// Why a client may not join a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinError {
    Unauthorized,
    BoardNotFound,
}

struct BoardRoom {
    tasks: Vec<BoardSyncTask>,
    tx: broadcast::Sender<ServerMessage>,
}

impl BoardRoom {
    fn new(tasks: Vec<BoardSyncTask>) -> Self {
        let (tx, _rx) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tasks, tx }
    }

    fn broadcast(&self, msg: ServerMessage) {
        let _ = self.tx.send(msg);
    }
}

/// Application state shared across handlers.
#[derive(Clone)]
pub struct RelayState {
    boards: Arc<RwLock<HashMap<String, BoardRoom>>>,
    tokens: Arc<HashSet<String>>,
}

impl RelayState {
    /// With no tokens configured, any non-empty token is accepted.
    pub fn new<I>(tokens: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self {
            boards: Arc::new(RwLock::new(HashMap::new())),
            tokens: Arc::new(tokens.into_iter().collect()),
        }
    }

    pub fn is_authorized(&self, token: Option<&str>) -> bool {
        match token.map(str::trim).filter(|t| !t.is_empty()) {
            Some(token) => self.tokens.is_empty() || self.tokens.contains(token),
            None => false,
        }
    }

    /// Create a board, or replace its tasks if it exists.
    pub async fn put_board(&self, board_id: &str, tasks: Vec<BoardSyncTask>) {
        let mut boards = self.boards.write().await;
        match boards.get_mut(board_id) {
            Some(room) => {
                room.tasks = tasks;
                let snapshot = ServerMessage::BoardState(BoardSnapshot {
                    tasks: room.tasks.clone(),
                    timestamp: now(),
                });
                room.broadcast(snapshot);
            }
            None => {
                boards.insert(board_id.to_string(), BoardRoom::new(tasks));
            }
        }
    }

    pub async fn tasks(&self, board_id: &str) -> Option<Vec<BoardSyncTask>> {
        let boards = self.boards.read().await;
        boards.get(board_id).map(|room| room.tasks.clone())
    }

    /// Authorize and subscribe in one step, so no broadcast between the
    /// snapshot and the subscription is lost.
    pub async fn join(
        &self,
        board_id: &str,
        token: Option<&str>,
    ) -> Result<(BoardSnapshot, broadcast::Receiver<ServerMessage>), JoinError> {
        if !self.is_authorized(token) {
            return Err(JoinError::Unauthorized);
        }
        let boards = self.boards.read().await;
        let room = boards.get(board_id).ok_or(JoinError::BoardNotFound)?;
        let rx = room.tx.subscribe();
        let snapshot = BoardSnapshot {
            tasks: room.tasks.clone(),
            timestamp: now(),
        };
        Ok((snapshot, rx))
    }

    pub async fn snapshot(&self, board_id: &str) -> Option<BoardSnapshot> {
        self.tasks(board_id).await.map(|tasks| BoardSnapshot {
            tasks,
            timestamp: now(),
        })
    }

    /// Apply `task.move` and broadcast the resulting `task.updated`.
    pub async fn move_task(
        &self,
        board_id: &str,
        task_id: &str,
        status: TaskStatus,
        updated_by: Option<String>,
    ) -> bool {
        let mut boards = self.boards.write().await;
        let Some(room) = boards.get_mut(board_id) else {
            return false;
        };
        let Some(task) = room.tasks.iter_mut().find(|t| t.id == task_id) else {
            debug!(board_id, task_id, "Move for unknown task ignored");
            return false;
        };

        let timestamp = now();
        let changes = TaskChanges {
            status: Some(status),
            previous_status: Some(task.status),
            updated_at: Some(timestamp.clone()),
            ..TaskChanges::default()
        };
        task.apply_changes(&changes);
        room.broadcast(ServerMessage::TaskUpdated(TaskUpdate {
            task_id: task_id.to_string(),
            changes,
            updated_by,
            timestamp,
        }));
        true
    }

    /// Apply `task.create`: assign an id and broadcast `task.created`.
    pub async fn create_task(
        &self,
        board_id: &str,
        title: &str,
        status: TaskStatus,
        assignee_id: Option<String>,
        created_by: Option<String>,
    ) -> Option<BoardSyncTask> {
        let mut boards = self.boards.write().await;
        let room = boards.get_mut(board_id)?;

        let timestamp = now();
        let task = BoardSyncTask {
            id: uuid::Uuid::new_v4().to_string(),
            board_id: board_id.to_string(),
            title: title.to_string(),
            description: None,
            status,
            priority: "medium".to_string(),
            due_at: None,
            assigned_agent_id: assignee_id,
            created_by_user_id: created_by,
            created_at: timestamp.clone(),
            updated_at: timestamp.clone(),
        };
        room.tasks.insert(0, task.clone());
        room.broadcast(ServerMessage::TaskCreated(TaskCreated {
            task: task.clone(),
            timestamp,
        }));
        Some(task)
    }

    pub async fn delete_task(&self, board_id: &str, task_id: &str) -> bool {
        let mut boards = self.boards.write().await;
        let Some(room) = boards.get_mut(board_id) else {
            return false;
        };
        let before = room.tasks.len();
        room.tasks.retain(|t| t.id != task_id);
        if room.tasks.len() == before {
            return false;
        }
        room.broadcast(ServerMessage::TaskDeleted(TaskDeleted {
            task_id: task_id.to_string(),
            timestamp: now(),
        }));
        true
    }

    pub async fn push_suggestion(&self, board_id: &str, suggestion: AgentSuggestion) -> bool {
        let boards = self.boards.read().await;
        let Some(room) = boards.get(board_id) else {
            return false;
        };
        room.broadcast(ServerMessage::SuggestionNew { suggestion });
        true
    }

    /// Broadcast an arbitrary message to a board's clients.
    pub async fn broadcast(&self, board_id: &str, msg: ServerMessage) -> Option<usize> {
        let boards = self.boards.read().await;
        let room = boards.get(board_id)?;
        let receivers = room.tx.receiver_count();
        room.broadcast(msg);
        Some(receivers)
    }
}

pub(crate) fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}
