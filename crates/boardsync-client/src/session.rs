//! One board sync session: a [`SharedBoard`] fed by a [`SyncTransport`].

use std::time::Duration;

use boardsync_core::{
    AgentSuggestion, BoardSyncTask, ClientMessage, ConnectionState, SyncConfig, TaskStatus,
};
use tokio::sync::watch;
use tracing::debug;

use crate::error::ClientResult;
use crate::reconcile::{BoardStore, SharedBoard};
use crate::transport::SyncTransport;

pub struct BoardSession {
    board_id: String,
    board: SharedBoard,
    transport: SyncTransport,
}

impl BoardSession {
    /// Build the session and start connecting.
    ///
    /// `initial` seeds the task list until the server's first snapshot.
    pub fn start(config: &SyncConfig, initial: Option<Vec<BoardSyncTask>>) -> ClientResult<Self> {
        let board = match initial {
            Some(tasks) => SharedBoard::new(BoardStore::seeded(tasks)),
            None => SharedBoard::default(),
        };
        let transport = SyncTransport::spawn(config, board.clone())?;
        transport.connect();

        Ok(Self {
            board_id: config.board_id.clone(),
            board,
            transport,
        })
    }

    pub fn board_id(&self) -> &str {
        &self.board_id
    }

    /// Re-seed from an external fetch. Ignored once the server has sent a
    /// snapshot.
    pub fn seed(&self, tasks: Vec<BoardSyncTask>) -> bool {
        self.board.seed(tasks)
    }

    /// Move a task: apply the status locally right away, then send
    /// `task.move`. The local change stands until a later `task.updated` or
    /// `board.state` says otherwise; it is not rolled back if the send is
    /// dropped while offline.
    pub fn move_task(&self, task_id: &str, status: TaskStatus) -> bool {
        let changed = self
            .board
            .update(|store| store.apply_local_move(task_id, status));
        debug!(task_id, status = %status, changed, "Moving task");
        self.transport.send(ClientMessage::TaskMove {
            task_id: task_id.to_string(),
            status,
        });
        changed
    }

    /// Ask the server to create a task. Nothing is added locally; the task
    /// appears when the server broadcasts `task.created`.
    pub fn create_task(&self, title: &str, status: TaskStatus, assignee_id: Option<String>) {
        self.transport.send(ClientMessage::TaskCreate {
            title: title.to_string(),
            status,
            assignee_id,
        });
    }

    pub fn tasks(&self) -> Vec<BoardSyncTask> {
        self.board.tasks()
    }

    pub fn task(&self, task_id: &str) -> Option<BoardSyncTask> {
        self.board.read(|store| store.task(task_id).cloned())
    }

    pub fn suggestions(&self) -> Vec<AgentSuggestion> {
        self.board.suggestions()
    }

    pub fn board(&self) -> &SharedBoard {
        &self.board
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.transport.state()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.transport.subscribe_state()
    }

    pub fn subscribe_board(&self) -> watch::Receiver<BoardStore> {
        self.board.subscribe()
    }

    pub fn connect(&self) {
        self.transport.connect();
    }

    pub fn disconnect(&self) {
        self.transport.disconnect();
    }

    /// Wait until the connection reaches `target`. False on timeout.
    pub async fn wait_for_state(&self, target: ConnectionState, timeout: Duration) -> bool {
        let mut rx = self.transport.subscribe_state();
        let reached = tokio::time::timeout(timeout, rx.wait_for(|state| *state == target))
            .await
            .is_ok_and(|result| result.is_ok());
        reached
    }

    /// Wait until `predicate` holds for the board. False on timeout.
    pub async fn wait_for_board<F>(&self, timeout: Duration, mut predicate: F) -> bool
    where
        F: FnMut(&BoardStore) -> bool,
    {
        let mut rx = self.board.subscribe();
        let held = tokio::time::timeout(timeout, rx.wait_for(|store| predicate(store)))
            .await
            .is_ok_and(|result| result.is_ok());
        held
    }

    /// Tear the session down. No listener call happens afterwards.
    pub async fn shutdown(self) {
        self.transport.shutdown().await;
    }
}
