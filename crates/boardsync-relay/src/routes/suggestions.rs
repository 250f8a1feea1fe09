//! Agent suggestion route handlers.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use boardsync_core::AgentSuggestion;
use serde::Deserialize;
use tracing::info;

use super::{board_not_found, require_token};
use crate::state::{self, RelayState};

#[derive(Deserialize)]
pub struct CreateSuggestionRequest {
    pub title: String,
    pub description: Option<String>,
    pub suggestion_type: Option<String>,
    pub priority: Option<String>,
    pub confidence: Option<f64>,
    pub payload: Option<serde_json::Value>,
}

/// Publish a suggestion to every client of the board.
pub async fn create_suggestion(
    State(state): State<RelayState>,
    headers: HeaderMap,
    Path(board_id): Path<String>,
    Json(req): Json<CreateSuggestionRequest>,
) -> Result<(StatusCode, Json<AgentSuggestion>), (StatusCode, String)> {
    require_token(&state, &headers)?;

    let confidence = req.confidence.unwrap_or(0.5);
    if !(0.0..=1.0).contains(&confidence) {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            "confidence must be between 0 and 1".to_string(),
        ));
    }

    let suggestion = AgentSuggestion {
        id: uuid::Uuid::new_v4().to_string(),
        title: req.title,
        description: req.description,
        suggestion_type: req.suggestion_type.unwrap_or_else(|| "task".to_string()),
        priority: req.priority.unwrap_or_else(|| "medium".to_string()),
        confidence,
        status: "pending".to_string(),
        payload: req.payload,
        created_at: state::now(),
    };

    if !state.push_suggestion(&board_id, suggestion.clone()).await {
        return Err(board_not_found(&board_id));
    }

    info!(board_id = %board_id, suggestion_id = %suggestion.id, "Suggestion published");
    Ok((StatusCode::CREATED, Json(suggestion)))
}
