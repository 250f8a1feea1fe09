//! Route handlers.

pub mod internal;
pub mod suggestions;
pub mod tasks;

use axum::http::{header, HeaderMap, StatusCode};

use crate::state::RelayState;

/// Reject requests without an accepted `Authorization: Bearer` token.
pub(crate) fn require_token(
    state: &RelayState,
    headers: &HeaderMap,
) -> Result<(), (StatusCode, String)> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    if state.is_authorized(token) {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "Invalid or missing token".to_string()))
    }
}

pub(crate) fn board_not_found(board_id: &str) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, format!("Board not found: {}", board_id))
}
