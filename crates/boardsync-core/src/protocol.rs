//! Wire protocol for board synchronization.
//!
//! Every frame is a single JSON object tagged by its `type` field. Server
//! frames with a `type` this client does not know decode to
//! [`ServerMessage::Unknown`] and are ignored by dispatch.

use serde::{Deserialize, Serialize};

use crate::suggestion::AgentSuggestion;
use crate::task::{BoardSyncTask, TaskChanges, TaskStatus};

/// Messages sent by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Authoritative full snapshot of the board.
    #[serde(rename = "board.state")]
    BoardState(BoardSnapshot),
    /// Sparse update of a single task.
    #[serde(rename = "task.updated")]
    TaskUpdated(TaskUpdate),
    /// A task was created; carries the full task.
    #[serde(rename = "task.created")]
    TaskCreated(TaskCreated),
    /// A task was deleted.
    #[serde(rename = "task.deleted")]
    TaskDeleted(TaskDeleted),
    /// An agent produced a new suggestion.
    #[serde(rename = "suggestion.new")]
    SuggestionNew { suggestion: AgentSuggestion },
    /// Reply to a client heartbeat.
    #[serde(rename = "heartbeat_ack")]
    HeartbeatAck {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
    /// Any `type` this client does not understand.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    pub tasks: Vec<BoardSyncTask>,
    #[serde(default)]
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskUpdate {
    pub task_id: String,
    pub changes: TaskChanges,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
    #[serde(default)]
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskCreated {
    pub task: BoardSyncTask,
    #[serde(default)]
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDeleted {
    pub task_id: String,
    #[serde(default)]
    pub timestamp: String,
}

impl ServerMessage {
    /// Decode one text frame.
    pub fn decode(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Wire name of the message, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BoardState(_) => "board.state",
            Self::TaskUpdated(_) => "task.updated",
            Self::TaskCreated(_) => "task.created",
            Self::TaskDeleted(_) => "task.deleted",
            Self::SuggestionNew { .. } => "suggestion.new",
            Self::HeartbeatAck { .. } => "heartbeat_ack",
            Self::Unknown => "unknown",
        }
    }
}

/// Messages sent by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "task.move")]
    TaskMove { task_id: String, status: TaskStatus },
    #[serde(rename = "task.create")]
    TaskCreate {
        title: String,
        status: TaskStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        assignee_id: Option<String>,
    },
    #[serde(rename = "heartbeat")]
    Heartbeat {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
}

impl ClientMessage {
    /// Heartbeat stamped with the current wall clock in milliseconds.
    pub fn heartbeat_now() -> Self {
        Self::Heartbeat {
            id: Some(chrono::Utc::now().timestamp_millis().to_string()),
        }
    }

    pub fn decode(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::TaskMove { .. } => "task.move",
            Self::TaskCreate { .. } => "task.create",
            Self::Heartbeat { .. } => "heartbeat",
        }
    }
}
