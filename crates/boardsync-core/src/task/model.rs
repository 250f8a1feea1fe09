//! Task domain models.

use serde::{Deserialize, Deserializer, Serialize};

/// A task as held by a sync client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardSyncTask {
    pub id: String,
    pub board_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: String,
    #[serde(default)]
    pub due_at: Option<String>,
    #[serde(default)]
    pub assigned_agent_id: Option<String>,
    #[serde(default)]
    pub created_by_user_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl BoardSyncTask {
    /// Overwrite every field present in `changes`, leaving the rest untouched.
    pub fn apply_changes(&mut self, changes: &TaskChanges) {
        if let Some(board_id) = &changes.board_id {
            self.board_id = board_id.clone();
        }
        if let Some(title) = &changes.title {
            self.title = title.clone();
        }
        if let Some(description) = &changes.description {
            self.description = description.clone();
        }
        if let Some(status) = changes.status {
            self.status = status;
        }
        if let Some(priority) = &changes.priority {
            self.priority = priority.clone();
        }
        if let Some(due_at) = &changes.due_at {
            self.due_at = due_at.clone();
        }
        if let Some(agent) = &changes.assigned_agent_id {
            self.assigned_agent_id = agent.clone();
        }
        if let Some(created_by) = &changes.created_by_user_id {
            self.created_by_user_id = created_by.clone();
        }
        if let Some(created_at) = &changes.created_at {
            self.created_at = created_at.clone();
        }
        if let Some(updated_at) = &changes.updated_at {
            self.updated_at = updated_at.clone();
        }
    }
}

/// Task status (board column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Inbox,
    InProgress,
    Review,
    Done,
}

impl TaskStatus {
    /// All statuses in board order.
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::Inbox,
        TaskStatus::InProgress,
        TaskStatus::Review,
        TaskStatus::Done,
    ];

    /// Parse from string. Unlike the wire format this accepts a few aliases.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "inbox" => Some(Self::Inbox),
            "in_progress" | "inprogress" | "doing" => Some(Self::InProgress),
            "review" => Some(Self::Review),
            "done" => Some(Self::Done),
            _ => None,
        }
    }

    /// Convert to the wire string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inbox => "inbox",
            Self::InProgress => "in_progress",
            Self::Review => "review",
            Self::Done => "done",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sparse patch carried by `task.updated`.
///
/// Outer `None` means the key was absent. For optional task fields an inner
/// `None` means the key was present with `null`, which clears the field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub board_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub due_at: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub assigned_agent_id: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_by_user_id: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl TaskChanges {
    /// A patch that only moves a task.
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// True when no task field would change.
    pub fn is_empty(&self) -> bool {
        self.board_id.is_none()
            && self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.due_at.is_none()
            && self.assigned_agent_id.is_none()
            && self.created_by_user_id.is_none()
            && self.created_at.is_none()
            && self.updated_at.is_none()
    }
}

/// Marks a key as present, so `null` deserializes to `Some(None)`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}
