//! Boardsync Relay
//!
//! In-memory board server speaking the sync protocol, for local
//! development and integration tests.

pub mod routes;
pub mod state;
pub mod websocket;

use std::net::SocketAddr;

use axum::{
    routing::{delete, get, post},
    Router,
};
use boardsync_core::{BoardSyncTask, TaskStatus};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub use state::{JoinError, RelayState};

/// Create the application router.
pub fn create_router(state: RelayState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/boards/{board_id}/tasks", get(routes::tasks::list_tasks))
        .route(
            "/boards/{board_id}/tasks/{task_id}",
            delete(routes::tasks::delete_task),
        )
        .route(
            "/boards/{board_id}/suggestions",
            post(routes::suggestions::create_suggestion),
        )
        .with_state(state.clone());

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/ws/board/{board_id}/sync", get(websocket::ws_handler))
        .route(
            "/internal/boards/{board_id}/notify",
            post(routes::internal::notify),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve on an already bound listener.
pub async fn serve(listener: TcpListener, state: RelayState) -> anyhow::Result<()> {
    let app = create_router(state);
    axum::serve(listener, app).await?;
    Ok(())
}

/// Bind `addr` and run the relay until the process exits.
pub async fn run_server(addr: SocketAddr, state: RelayState) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Relay listening on http://{}", listener.local_addr()?);
    serve(listener, state).await
}

/// A handful of tasks spread over every column.
pub fn demo_tasks(board_id: &str) -> Vec<BoardSyncTask> {
    let now = state::now();
    let titles = [
        ("Triage incoming alerts", TaskStatus::Inbox, "high"),
        ("Write onboarding guide", TaskStatus::Inbox, "low"),
        ("Migrate billing worker", TaskStatus::InProgress, "high"),
        ("Review retry policy", TaskStatus::Review, "medium"),
        ("Rotate API keys", TaskStatus::Done, "medium"),
    ];

    titles
        .into_iter()
        .enumerate()
        .map(|(i, (title, status, priority))| BoardSyncTask {
            id: format!("demo-{}", i + 1),
            board_id: board_id.to_string(),
            title: title.to_string(),
            description: None,
            status,
            priority: priority.to_string(),
            due_at: None,
            assigned_agent_id: None,
            created_by_user_id: None,
            created_at: now.clone(),
            updated_at: now.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use boardsync_core::ServerMessage;
    use tower::ServiceExt;

    async fn relay() -> RelayState {
        let state = RelayState::new(["secret".to_string()]);
        state.put_board("b-1", demo_tasks("b-1")).await;
        state
    }

    fn authed(method: &str, uri: &str, body: Body) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, "Bearer secret")
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .unwrap()
    }

    #[tokio::test]
    async fn test_list_tasks_requires_token() {
        let app = create_router(relay().await);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/boards/b-1/tasks")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_list_tasks() {
        let app = create_router(relay().await);
        let response = app
            .oneshot(authed("GET", "/api/v1/boards/b-1/tasks", Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let tasks: Vec<BoardSyncTask> = serde_json::from_slice(&body).unwrap();
        assert_eq!(tasks.len(), 5);
        assert_eq!(tasks[0].id, "demo-1");
    }

    #[tokio::test]
    async fn test_unknown_board_is_404() {
        let app = create_router(relay().await);
        let response = app
            .oneshot(authed("GET", "/api/v1/boards/nope/tasks", Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_task_broadcasts() {
        let state = relay().await;
        let (_, mut rx) = state.join("b-1", Some("secret")).await.unwrap();
        let app = create_router(state.clone());

        let response = app
            .clone()
            .oneshot(authed("DELETE", "/api/v1/boards/b-1/tasks/demo-2", Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(matches!(
            rx.recv().await.unwrap(),
            ServerMessage::TaskDeleted(d) if d.task_id == "demo-2"
        ));

        let again = app
            .oneshot(authed("DELETE", "/api/v1/boards/b-1/tasks/demo-2", Body::empty()))
            .await
            .unwrap();
        assert_eq!(again.status(), StatusCode::NOT_FOUND);
        assert_eq!(state.tasks("b-1").await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_create_suggestion_broadcasts() {
        let state = relay().await;
        let (_, mut rx) = state.join("b-1", Some("secret")).await.unwrap();
        let app = create_router(state);

        let body = serde_json::json!({"title": "Split the billing epic", "confidence": 0.8});
        let response = app
            .oneshot(authed(
                "POST",
                "/api/v1/boards/b-1/suggestions",
                Body::from(body.to_string()),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        match rx.recv().await.unwrap() {
            ServerMessage::SuggestionNew { suggestion } => {
                assert_eq!(suggestion.title, "Split the billing epic");
                assert_eq!(suggestion.status, "pending");
            }
            other => panic!("unexpected broadcast: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_notify_unknown_board() {
        let app = create_router(relay().await);
        let body = serde_json::json!({"type": "heartbeat_ack", "id": "1"});
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/internal/boards/nope/notify")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
