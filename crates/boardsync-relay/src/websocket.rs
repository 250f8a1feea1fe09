//! WebSocket handler for board sync sessions.

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    response::IntoResponse,
};
use boardsync_core::{CloseCode, ClientMessage, ServerMessage};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::state::{JoinError, RelayState};

#[derive(Debug, Deserialize)]
pub struct SyncQuery {
    pub token: Option<String>,
}

/// WebSocket upgrade handler for `/ws/board/{board_id}/sync`.
///
/// The upgrade always succeeds; a bad token or unknown board is reported
/// with a close code once the socket is open.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(board_id): Path<String>,
    Query(query): Query<SyncQuery>,
    State(state): State<RelayState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, board_id, query.token))
}

async fn handle_socket(
    mut socket: WebSocket,
    state: RelayState,
    board_id: String,
    token: Option<String>,
) {
    let (snapshot, mut rx) = match state.join(&board_id, token.as_deref()).await {
        Ok(joined) => joined,
        Err(err) => {
            let (code, reason) = match err {
                JoinError::Unauthorized => (CloseCode::UNAUTHORIZED, "unauthorized"),
                JoinError::BoardNotFound => (CloseCode::BOARD_NOT_FOUND, "board not found"),
            };
            info!(board_id = %board_id, code, "Rejecting sync client");
            let frame = CloseFrame {
                code,
                reason: reason.into(),
            };
            let _ = socket.send(Message::Close(Some(frame))).await;
            return;
        }
    };

    let client_id = format!("ws-{}", uuid::Uuid::new_v4().simple());
    info!(board_id = %board_id, client_id = %client_id, "Sync client connected");

    let (mut sender, mut receiver) = socket.split();
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<ServerMessage>();

    // Snapshot goes first, ahead of any broadcast.
    let _ = reply_tx.send(ServerMessage::BoardState(snapshot));

    let send_state = state.clone();
    let send_board = board_id.clone();
    let mut send_task = tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                biased;
                reply = reply_rx.recv() => match reply {
                    Some(msg) => msg,
                    None => break,
                },
                broadcast = rx.recv() => match broadcast {
                    Ok(msg) => msg,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Sync client lagged, resending board state");
                        match send_state.snapshot(&send_board).await {
                            Some(snapshot) => ServerMessage::BoardState(snapshot),
                            None => break,
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            };

            let json = match msg.encode() {
                Ok(json) => json,
                Err(e) => {
                    warn!(error = %e, "Failed to encode server message");
                    continue;
                }
            };
            debug!(kind = msg.kind(), "Sending message to sync client");
            if sender.send(Message::Text(json.into())).await.is_err() {
                debug!("WebSocket send failed, client disconnected");
                break;
            }
        }
    });

    let recv_state = state.clone();
    let recv_board = board_id.clone();
    let recv_client = client_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    let Ok(msg) = ClientMessage::decode(text.as_str()) else {
                        debug!(frame = %text.as_str(), "Ignoring malformed client frame");
                        continue;
                    };
                    handle_client_message(&recv_state, &recv_board, &recv_client, msg, &reply_tx)
                        .await;
                }
                Message::Close(_) => {
                    debug!("Sync client sent close frame");
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    info!(board_id = %board_id, client_id = %client_id, "Sync client disconnected");
}

async fn handle_client_message(
    state: &RelayState,
    board_id: &str,
    client_id: &str,
    msg: ClientMessage,
    reply: &mpsc::UnboundedSender<ServerMessage>,
) {
    debug!(kind = msg.kind(), client_id, "Received client message");
    match msg {
        ClientMessage::TaskMove { task_id, status } => {
            state
                .move_task(board_id, &task_id, status, Some(client_id.to_string()))
                .await;
        }
        ClientMessage::TaskCreate {
            title,
            status,
            assignee_id,
        } => {
            state
                .create_task(board_id, &title, status, assignee_id, Some(client_id.to_string()))
                .await;
        }
        ClientMessage::Heartbeat { id } => {
            let _ = reply.send(ServerMessage::HeartbeatAck { id });
        }
    }
}
