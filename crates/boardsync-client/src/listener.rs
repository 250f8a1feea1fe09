//! Callback surface for inbound sync messages.

use boardsync_core::protocol::{BoardSnapshot, TaskCreated, TaskDeleted, TaskUpdate};
use boardsync_core::{AgentSuggestion, ConnectionState, ServerMessage};
use tracing::trace;

/// Receives parsed server messages and connection state changes.
///
/// Every hook has a no-op default, so an implementor only overrides the
/// messages it cares about. Hooks run on the transport's driver task, one at
/// a time, in the order the socket delivered the frames.
pub trait SyncListener: Send + 'static {
    fn on_board_state(&mut self, _snapshot: BoardSnapshot) {}

    fn on_task_updated(&mut self, _update: TaskUpdate) {}

    fn on_task_created(&mut self, _created: TaskCreated) {}

    fn on_task_deleted(&mut self, _deleted: TaskDeleted) {}

    fn on_suggestion_new(&mut self, _suggestion: AgentSuggestion) {}

    fn on_heartbeat_ack(&mut self, _id: Option<String>) {}

    fn on_connection_state(&mut self, _state: ConnectionState) {}
}

/// Route one server message to the matching hook.
pub fn dispatch<L>(listener: &mut L, message: ServerMessage)
where
    L: SyncListener + ?Sized,
{
    match message {
        ServerMessage::BoardState(snapshot) => listener.on_board_state(snapshot),
        ServerMessage::TaskUpdated(update) => listener.on_task_updated(update),
        ServerMessage::TaskCreated(created) => listener.on_task_created(created),
        ServerMessage::TaskDeleted(deleted) => listener.on_task_deleted(deleted),
        ServerMessage::SuggestionNew { suggestion } => listener.on_suggestion_new(suggestion),
        ServerMessage::HeartbeatAck { id } => listener.on_heartbeat_ack(id),
        ServerMessage::Unknown => trace!("Ignoring message of unknown type"),
    }
}

impl<L> SyncListener for Box<L>
where
    L: SyncListener + ?Sized,
{
    fn on_board_state(&mut self, snapshot: BoardSnapshot) {
        (**self).on_board_state(snapshot)
    }

    fn on_task_updated(&mut self, update: TaskUpdate) {
        (**self).on_task_updated(update)
    }

    fn on_task_created(&mut self, created: TaskCreated) {
        (**self).on_task_created(created)
    }

    fn on_task_deleted(&mut self, deleted: TaskDeleted) {
        (**self).on_task_deleted(deleted)
    }

    fn on_suggestion_new(&mut self, suggestion: AgentSuggestion) {
        (**self).on_suggestion_new(suggestion)
    }

    fn on_heartbeat_ack(&mut self, id: Option<String>) {
        (**self).on_heartbeat_ack(id)
    }

    fn on_connection_state(&mut self, state: ConnectionState) {
        (**self).on_connection_state(state)
    }
}
