//! Agent suggestion models.

use serde::{Deserialize, Serialize};

/// A recommendation generated by an agent, shown alongside the board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSuggestion {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub suggestion_type: String,
    pub priority: String,
    pub confidence: f64,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    pub created_at: String,
}
