//! Local task collection and suggestion buffer, kept consistent with the
//! server-authoritative board.
//!
//! The collection may be seeded from an external snapshot (e.g. a REST fetch)
//! until the first `board.state` arrives. From then on seeding is ignored and
//! the collection is only patched by server messages and local optimistic
//! moves. A later `board.state` replaces everything again, which is how the
//! store recovers after a reconnect.

use std::collections::HashSet;
use std::sync::Arc;

use boardsync_core::protocol::{BoardSnapshot, TaskCreated, TaskDeleted, TaskUpdate};
use boardsync_core::task::count_by_status;
use boardsync_core::{AgentSuggestion, BoardSyncTask, SuggestionBuffer, TaskStatus};
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::listener::SyncListener;

#[derive(Debug, Clone, Default)]
pub struct BoardStore {
    tasks: Vec<BoardSyncTask>,
    suggestions: SuggestionBuffer,
    authoritative: bool,
    snapshot_at: Option<String>,
}

impl BoardStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded from an external snapshot.
    pub fn seeded(tasks: Vec<BoardSyncTask>) -> Self {
        let mut store = Self::default();
        store.seed(tasks);
        store
    }

    /// Replace the tasks with an externally fetched list, unless the server
    /// has already sent an authoritative snapshot.
    pub fn seed(&mut self, tasks: Vec<BoardSyncTask>) -> bool {
        if self.authoritative {
            debug!("Ignoring external seed after authoritative snapshot");
            return false;
        }
        self.tasks = dedup_by_id(tasks);
        true
    }

    /// `board.state`: replace the whole collection.
    pub fn apply_board_state(&mut self, snapshot: BoardSnapshot) -> bool {
        debug!(tasks = snapshot.tasks.len(), "Applying board snapshot");
        self.tasks = dedup_by_id(snapshot.tasks);
        self.authoritative = true;
        self.snapshot_at = Some(snapshot.timestamp);
        true
    }

    /// `task.updated`: patch the present fields of one task.
    pub fn apply_task_update(&mut self, update: &TaskUpdate) -> bool {
        match self.tasks.iter_mut().find(|t| t.id == update.task_id) {
            Some(task) => {
                task.apply_changes(&update.changes);
                true
            }
            None => {
                trace!(task_id = %update.task_id, "Update for unknown task ignored");
                false
            }
        }
    }

    /// `task.created`: prepend unless the id is already known.
    pub fn apply_task_created(&mut self, task: BoardSyncTask) -> bool {
        if self.contains(&task.id) {
            trace!(task_id = %task.id, "Duplicate task.created ignored");
            return false;
        }
        self.tasks.insert(0, task);
        true
    }

    /// `task.deleted`: remove the task if present.
    pub fn apply_task_deleted(&mut self, task_id: &str) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != task_id);
        self.tasks.len() != before
    }

    /// `suggestion.new`: prepend into the bounded buffer.
    pub fn apply_suggestion(&mut self, suggestion: AgentSuggestion) -> bool {
        self.suggestions.push(suggestion)
    }

    /// Optimistic status change made before the server confirms a move.
    pub fn apply_local_move(&mut self, task_id: &str, status: TaskStatus) -> bool {
        match self.tasks.iter_mut().find(|t| t.id == task_id) {
            Some(task) if task.status != status => {
                task.status = status;
                true
            }
            _ => false,
        }
    }

    pub fn tasks(&self) -> &[BoardSyncTask] {
        &self.tasks
    }

    pub fn task(&self, task_id: &str) -> Option<&BoardSyncTask> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.task(task_id).is_some()
    }

    pub fn suggestions(&self) -> &SuggestionBuffer {
        &self.suggestions
    }

    /// Whether a `board.state` has been received.
    pub fn has_authoritative_snapshot(&self) -> bool {
        self.authoritative
    }

    /// Timestamp of the last `board.state`.
    pub fn snapshot_at(&self) -> Option<&str> {
        self.snapshot_at.as_deref()
    }

    pub fn counts(&self) -> [(TaskStatus, usize); 4] {
        count_by_status(&self.tasks)
    }
}

/// Keep the first task for each id, in order.
fn dedup_by_id(tasks: Vec<BoardSyncTask>) -> Vec<BoardSyncTask> {
    let mut seen = HashSet::with_capacity(tasks.len());
    tasks
        .into_iter()
        .filter(|task| seen.insert(task.id.clone()))
        .collect()
}

/// A [`BoardStore`] behind a watch channel.
///
/// Writers go through [`SharedBoard::update`]; subscribers are woken only
/// when an update reports a change.
#[derive(Clone)]
pub struct SharedBoard {
    inner: Arc<watch::Sender<BoardStore>>,
}

impl SharedBoard {
    pub fn new(store: BoardStore) -> Self {
        let (tx, _rx) = watch::channel(store);
        Self { inner: Arc::new(tx) }
    }

    /// Mutate the store. `f` returns whether anything changed.
    pub fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut BoardStore) -> bool,
    {
        self.inner.send_if_modified(f)
    }

    pub fn read<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&BoardStore) -> R,
    {
        f(&self.inner.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<BoardStore> {
        self.inner.subscribe()
    }

    pub fn seed(&self, tasks: Vec<BoardSyncTask>) -> bool {
        self.update(|store| store.seed(tasks))
    }

    pub fn tasks(&self) -> Vec<BoardSyncTask> {
        self.read(|store| store.tasks().to_vec())
    }

    pub fn suggestions(&self) -> Vec<AgentSuggestion> {
        self.read(|store| store.suggestions().to_vec())
    }
}

impl Default for SharedBoard {
    fn default() -> Self {
        Self::new(BoardStore::default())
    }
}

impl SyncListener for SharedBoard {
    fn on_board_state(&mut self, snapshot: BoardSnapshot) {
        self.update(|store| store.apply_board_state(snapshot));
    }

    fn on_task_updated(&mut self, update: TaskUpdate) {
        self.update(|store| store.apply_task_update(&update));
    }

    fn on_task_created(&mut self, created: TaskCreated) {
        self.update(|store| store.apply_task_created(created.task));
    }

    fn on_task_deleted(&mut self, deleted: TaskDeleted) {
        self.update(|store| store.apply_task_deleted(&deleted.task_id));
    }

    fn on_suggestion_new(&mut self, suggestion: AgentSuggestion) {
        self.update(|store| store.apply_suggestion(suggestion));
    }
}
