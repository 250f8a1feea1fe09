//! Task route handlers.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use boardsync_core::BoardSyncTask;
use tracing::info;

use super::{board_not_found, require_token};
use crate::state::RelayState;

pub async fn list_tasks(
    State(state): State<RelayState>,
    headers: HeaderMap,
    Path(board_id): Path<String>,
) -> Result<Json<Vec<BoardSyncTask>>, (StatusCode, String)> {
    require_token(&state, &headers)?;

    let tasks = state
        .tasks(&board_id)
        .await
        .ok_or_else(|| board_not_found(&board_id))?;

    Ok(Json(tasks))
}

pub async fn delete_task(
    State(state): State<RelayState>,
    headers: HeaderMap,
    Path((board_id, task_id)): Path<(String, String)>,
) -> Result<StatusCode, (StatusCode, String)> {
    require_token(&state, &headers)?;

    if state.tasks(&board_id).await.is_none() {
        return Err(board_not_found(&board_id));
    }
    if !state.delete_task(&board_id, &task_id).await {
        return Err((StatusCode::NOT_FOUND, format!("Task not found: {}", task_id)));
    }

    info!(board_id = %board_id, task_id = %task_id, "Task deleted");
    Ok(StatusCode::NO_CONTENT)
}
