//! Internal notification endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use boardsync_core::ServerMessage;
use tracing::{debug, info};

use crate::state::RelayState;

/// Receive a server message and broadcast it to the board's clients as-is.
pub async fn notify(
    State(state): State<RelayState>,
    Path(board_id): Path<String>,
    Json(msg): Json<ServerMessage>,
) -> StatusCode {
    info!(board_id = %board_id, kind = msg.kind(), "Received internal notification, broadcasting");
    match state.broadcast(&board_id, msg).await {
        Some(receiver_count) => {
            debug!(receiver_count, "Active sync receivers");
            StatusCode::OK
        }
        None => StatusCode::NOT_FOUND,
    }
}
