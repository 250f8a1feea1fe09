//! Transport driver against a bare WebSocket server: reconnect after a drop,
//! heartbeat cadence, malformed frames, and TLS failures.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use boardsync_client::{BoardSession, SyncListener, SyncTransport};
use boardsync_core::protocol::BoardSnapshot;
use boardsync_core::{
    BackoffPolicy, BoardSyncTask, ClientMessage, ConnectionState, ServerMessage, SyncConfig,
    TaskStatus,
};
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};

const WAIT: Duration = Duration::from_secs(10);
const BASE_MS: u64 = 50;

type ServerSocket = WebSocketStream<TcpStream>;

/// Accept WebSocket connections, handing each to `handler` with its index.
async fn ws_server<F, Fut>(handler: F) -> anyhow::Result<SocketAddr>
where
    F: Fn(usize, ServerSocket) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let handler = Arc::new(handler);
    let accepted = Arc::new(AtomicUsize::new(0));

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let handler = handler.clone();
            let index = accepted.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                if let Ok(socket) = accept_async(stream).await {
                    handler(index, socket).await;
                }
            });
        }
    });
    Ok(addr)
}

fn config(base: String, heartbeat_ms: u64) -> SyncConfig {
    let mut config = SyncConfig::new(base, "board-1").with_token("t");
    config.heartbeat_interval_ms = heartbeat_ms;
    config.backoff = BackoffPolicy {
        base_ms: BASE_MS,
        multiplier: 2,
        max_ms: 1_000,
    };
    config
}

fn task(id: &str) -> BoardSyncTask {
    BoardSyncTask {
        id: id.to_string(),
        board_id: "board-1".to_string(),
        title: id.to_string(),
        description: None,
        status: TaskStatus::Inbox,
        priority: "medium".to_string(),
        due_at: None,
        assigned_agent_id: None,
        created_by_user_id: None,
        created_at: "2026-01-01T00:00:00Z".to_string(),
        updated_at: "2026-01-01T00:00:00Z".to_string(),
    }
}

fn board_state(ids: &[&str]) -> Message {
    let snapshot = ServerMessage::BoardState(BoardSnapshot {
        tasks: ids.iter().map(|id| task(id)).collect(),
        timestamp: "2026-01-01T00:00:01Z".to_string(),
    });
    Message::text(snapshot.encode().unwrap())
}

/// Records every connection state with the time it was reported.
#[derive(Clone, Default)]
struct StateRecorder(Arc<Mutex<Vec<(Instant, ConnectionState)>>>);

impl StateRecorder {
    fn states(&self) -> Vec<ConnectionState> {
        self.0.lock().unwrap().iter().map(|(_, s)| *s).collect()
    }

    fn first_at(&self, state: ConnectionState, nth: usize) -> Option<Instant> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, s)| *s == state)
            .nth(nth)
            .map(|(at, _)| *at)
    }

    async fn wait_until<F>(&self, mut done: F) -> bool
    where
        F: FnMut(&[ConnectionState]) -> bool,
    {
        let deadline = Instant::now() + WAIT;
        while Instant::now() < deadline {
            if done(&self.states()) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }
}

impl SyncListener for StateRecorder {
    fn on_connection_state(&mut self, state: ConnectionState) {
        self.0.lock().unwrap().push((Instant::now(), state));
    }
}

fn count(states: &[ConnectionState], target: ConnectionState) -> usize {
    states.iter().filter(|s| **s == target).count()
}

#[tokio::test]
async fn test_dropped_connection_reconnects_after_backoff() -> anyhow::Result<()> {
    let addr = ws_server(|index, mut socket| async move {
        let _ = socket.send(board_state(&["a"])).await;
        if index == 0 {
            // Vanish without a close frame.
            drop(socket);
            return;
        }
        while let Some(Ok(_)) = socket.next().await {}
    })
    .await?;

    let recorder = StateRecorder::default();
    let transport = SyncTransport::spawn(&config(format!("http://{addr}"), 30_000), recorder.clone())?;
    transport.connect();

    assert!(
        recorder
            .wait_until(|states| count(states, ConnectionState::Connected) == 2)
            .await,
        "states: {:?}",
        recorder.states()
    );
    assert_eq!(
        recorder.states(),
        vec![
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Reconnecting,
            ConnectionState::Connecting,
            ConnectionState::Connected,
        ]
    );

    let dropped = recorder.first_at(ConnectionState::Reconnecting, 0).unwrap();
    let retried = recorder.first_at(ConnectionState::Connecting, 1).unwrap();
    assert!(retried - dropped >= Duration::from_millis(BASE_MS));

    transport.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_heartbeats_follow_configured_interval() -> anyhow::Result<()> {
    let frames: Arc<Mutex<Vec<ClientMessage>>> = Arc::default();
    let seen = frames.clone();
    let addr = ws_server(move |_, mut socket| {
        let seen = seen.clone();
        async move {
            while let Some(Ok(msg)) = socket.next().await {
                if let Message::Text(text) = msg {
                    if let Ok(msg) = ClientMessage::decode(text.as_str()) {
                        seen.lock().unwrap().push(msg);
                    }
                }
            }
        }
    })
    .await?;

    let recorder = StateRecorder::default();
    let transport = SyncTransport::spawn(&config(format!("http://{addr}"), 100), recorder.clone())?;
    transport.connect();
    assert!(
        recorder
            .wait_until(|states| states.contains(&ConnectionState::Connected))
            .await
    );

    tokio::time::sleep(Duration::from_millis(450)).await;
    let heartbeats: Vec<String> = frames
        .lock()
        .unwrap()
        .iter()
        .filter_map(|msg| match msg {
            ClientMessage::Heartbeat { id } => id.clone(),
            _ => None,
        })
        .collect();

    assert!(heartbeats.len() >= 2, "heartbeats: {heartbeats:?}");
    assert!(heartbeats.len() <= 5, "heartbeats: {heartbeats:?}");
    for id in &heartbeats {
        assert!(id.parse::<i64>().is_ok(), "heartbeat id {id} is not epoch millis");
    }

    transport.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_malformed_frame_keeps_connection() -> anyhow::Result<()> {
    let addr = ws_server(|_, mut socket| async move {
        let _ = socket.send(Message::text("{not json")).await;
        let _ = socket.send(Message::text(r#"{"type":"task.updated"}"#)).await;
        let _ = socket.send(board_state(&["a", "b"])).await;
        while let Some(Ok(_)) = socket.next().await {}
    })
    .await?;

    let session = BoardSession::start(&config(format!("http://{addr}"), 30_000), None)?;
    assert!(
        session
            .wait_for_board(WAIT, |store| store.has_authoritative_snapshot())
            .await
    );
    assert_eq!(session.tasks().len(), 2);
    assert_eq!(session.connection_state(), ConnectionState::Connected);

    session.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_https_base_without_tls_server_retries() -> anyhow::Result<()> {
    // Plain TCP: every TLS handshake fails.
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            drop(stream);
        }
    });

    let recorder = StateRecorder::default();
    let transport = SyncTransport::spawn(&config(format!("https://{addr}"), 30_000), recorder.clone())?;
    transport.connect();

    assert!(
        recorder
            .wait_until(|states| count(states, ConnectionState::Reconnecting) >= 2)
            .await,
        "states: {:?}",
        recorder.states()
    );
    assert!(!recorder.states().contains(&ConnectionState::Connected));

    transport.shutdown().await;
    Ok(())
}
