//! End-to-end sync against an in-process relay on a loopback port.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use boardsync_client::{BoardSession, SnapshotClient, SyncListener, SyncTransport};
use boardsync_core::{ConnectionState, ServerMessage, SyncConfig, TaskStatus};
use boardsync_relay::{demo_tasks, RelayState};
use tokio::net::TcpListener;

const TOKEN: &str = "test-token";
const BOARD: &str = "board-1";
const WAIT: Duration = Duration::from_secs(10);

async fn start_relay() -> anyhow::Result<(SocketAddr, RelayState)> {
    let state = RelayState::new([TOKEN.to_string()]);
    state.put_board(BOARD, demo_tasks(BOARD)).await;

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(boardsync_relay::serve(listener, state.clone()));
    Ok((addr, state))
}

fn config(addr: SocketAddr, board: &str, token: &str) -> SyncConfig {
    SyncConfig::new(format!("http://{addr}"), board).with_token(token)
}

#[tokio::test]
async fn test_connect_receives_board_state() -> anyhow::Result<()> {
    let (addr, _state) = start_relay().await?;
    let session = BoardSession::start(&config(addr, BOARD, TOKEN), None)?;

    assert!(session.wait_for_state(ConnectionState::Connected, WAIT).await);
    assert!(
        session
            .wait_for_board(WAIT, |store| store.has_authoritative_snapshot())
            .await
    );
    assert_eq!(session.tasks().len(), 5);
    assert_eq!(session.task("demo-3").unwrap().status, TaskStatus::InProgress);

    session.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_move_is_echoed_to_other_sessions() -> anyhow::Result<()> {
    let (addr, state) = start_relay().await?;
    let cfg = config(addr, BOARD, TOKEN);
    let mover = BoardSession::start(&cfg, None)?;
    let watcher = BoardSession::start(&cfg, None)?;

    for session in [&mover, &watcher] {
        assert!(
            session
                .wait_for_board(WAIT, |store| store.has_authoritative_snapshot())
                .await
        );
    }

    assert!(mover.move_task("demo-1", TaskStatus::Done));
    assert_eq!(mover.task("demo-1").unwrap().status, TaskStatus::Done);

    assert!(
        watcher
            .wait_for_board(WAIT, |store| {
                store.task("demo-1").map(|t| t.status) == Some(TaskStatus::Done)
            })
            .await
    );
    assert_eq!(state.tasks(BOARD).await.unwrap()[0].status, TaskStatus::Done);

    mover.shutdown().await;
    watcher.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_create_appears_after_server_echo() -> anyhow::Result<()> {
    let (addr, _state) = start_relay().await?;
    let session = BoardSession::start(&config(addr, BOARD, TOKEN), None)?;
    assert!(
        session
            .wait_for_board(WAIT, |store| store.has_authoritative_snapshot())
            .await
    );

    session.create_task("Draft release notes", TaskStatus::Inbox, None);
    assert!(
        session
            .wait_for_board(WAIT, |store| store.tasks().len() == 6)
            .await
    );
    let tasks = session.tasks();
    assert_eq!(tasks[0].title, "Draft release notes");
    assert_eq!(tasks[0].board_id, BOARD);

    session.shutdown().await;
    Ok(())
}

/// Records every connection state the transport reports.
#[derive(Clone, Default)]
struct StateRecorder(Arc<Mutex<Vec<ConnectionState>>>);

impl StateRecorder {
    fn states(&self) -> Vec<ConnectionState> {
        self.0.lock().unwrap().clone()
    }
}

impl SyncListener for StateRecorder {
    fn on_connection_state(&mut self, state: ConnectionState) {
        self.0.lock().unwrap().push(state);
    }
}

/// Connect with a recording listener and return the states seen once the
/// transport has settled back into `Disconnected`.
async fn settle_rejected(cfg: SyncConfig) -> anyhow::Result<Vec<ConnectionState>> {
    let recorder = StateRecorder::default();
    let transport = SyncTransport::spawn(&cfg, recorder.clone())?;
    transport.connect();

    let deadline = tokio::time::Instant::now() + WAIT;
    while recorder.states().last() != Some(&ConnectionState::Disconnected) {
        assert!(tokio::time::Instant::now() < deadline, "never closed");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    // A terminal close must not schedule a retry.
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(transport.state(), ConnectionState::Disconnected);

    transport.shutdown().await;
    Ok(recorder.states())
}

#[tokio::test]
async fn test_bad_token_stays_disconnected() -> anyhow::Result<()> {
    let (addr, _state) = start_relay().await?;
    let states = settle_rejected(config(addr, BOARD, "wrong")).await?;

    assert_eq!(states.first(), Some(&ConnectionState::Connecting));
    assert!(!states.contains(&ConnectionState::Reconnecting));
    Ok(())
}

#[tokio::test]
async fn test_unknown_board_stays_disconnected() -> anyhow::Result<()> {
    let (addr, _state) = start_relay().await?;
    let states = settle_rejected(config(addr, "missing", TOKEN)).await?;

    assert_eq!(states.first(), Some(&ConnectionState::Connecting));
    assert!(!states.contains(&ConnectionState::Reconnecting));
    Ok(())
}

#[tokio::test]
async fn test_suggestions_are_capped() -> anyhow::Result<()> {
    let (addr, state) = start_relay().await?;
    let session = BoardSession::start(&config(addr, BOARD, TOKEN), None)?;
    assert!(
        session
            .wait_for_board(WAIT, |store| store.has_authoritative_snapshot())
            .await
    );

    for i in 0..7 {
        let suggestion = serde_json::from_value(serde_json::json!({
            "id": format!("s-{i}"),
            "title": format!("Suggestion {i}"),
            "description": null,
            "suggestion_type": "task",
            "priority": "low",
            "confidence": 0.4,
            "status": "pending",
            "created_at": "2026-01-01T00:00:00Z"
        }))?;
        assert!(state.push_suggestion(BOARD, suggestion).await);
    }

    assert!(
        session
            .wait_for_board(WAIT, |store| {
                store.suggestions().iter().next().map(|s| s.id.as_str()) == Some("s-6")
            })
            .await
    );
    let suggestions = session.suggestions();
    assert_eq!(suggestions.len(), 5);
    assert_eq!(suggestions[4].id, "s-2");

    session.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_pushed_board_state_replaces_tasks() -> anyhow::Result<()> {
    let (addr, state) = start_relay().await?;
    let session = BoardSession::start(&config(addr, BOARD, TOKEN), None)?;
    assert!(
        session
            .wait_for_board(WAIT, |store| store.has_authoritative_snapshot())
            .await
    );

    let mut tasks = demo_tasks(BOARD);
    tasks.truncate(2);
    state.put_board(BOARD, tasks).await;

    assert!(
        session
            .wait_for_board(WAIT, |store| store.tasks().len() == 2)
            .await
    );

    // Unknown frame types are ignored without dropping the connection.
    let receivers = state.broadcast(BOARD, ServerMessage::Unknown).await;
    assert_eq!(receivers, Some(1));
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(session.connection_state(), ConnectionState::Connected);

    session.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_disconnect_then_reconnect_resyncs() -> anyhow::Result<()> {
    let (addr, state) = start_relay().await?;
    let session = BoardSession::start(&config(addr, BOARD, TOKEN), None)?;
    assert!(session.wait_for_state(ConnectionState::Connected, WAIT).await);

    session.disconnect();
    assert!(
        session
            .wait_for_state(ConnectionState::Disconnected, WAIT)
            .await
    );

    // Offline sends are dropped; the relay never sees this move.
    session.move_task("demo-2", TaskStatus::Review);
    assert!(state.delete_task(BOARD, "demo-5").await);

    session.connect();
    assert!(
        session
            .wait_for_board(WAIT, |store| !store.contains("demo-5"))
            .await
    );
    assert_eq!(session.task("demo-2").unwrap().status, TaskStatus::Inbox);

    session.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_snapshot_client_seeds_session() -> anyhow::Result<()> {
    let (addr, _state) = start_relay().await?;
    let cfg = config(addr, BOARD, TOKEN);

    let tasks = SnapshotClient::new().fetch_tasks(&cfg).await?;
    assert_eq!(tasks.len(), 5);

    let denied = SnapshotClient::new()
        .fetch_tasks(&config(addr, BOARD, "wrong"))
        .await;
    assert!(denied.is_err());
    Ok(())
}
