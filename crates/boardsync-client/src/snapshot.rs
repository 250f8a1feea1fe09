//! REST fetch of a board's task list, used to seed a session before the
//! first `board.state` arrives.

use std::time::Duration;

use boardsync_core::{BoardSyncTask, SyncConfig};
use tracing::{debug, warn};

use crate::error::{ClientError, ClientResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct SnapshotClient {
    client: reqwest::Client,
}

impl SnapshotClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }

    /// `GET {api_url}/api/v1/boards/{board_id}/tasks` with the bearer token.
    pub async fn fetch_tasks(&self, config: &SyncConfig) -> ClientResult<Vec<BoardSyncTask>> {
        let url = config.tasks_url()?;
        debug!(url = %url, "Fetching board snapshot");

        let mut request = self.client.get(url.as_str());
        if let Some(token) = config.bearer_token() {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(url = %url, status_code = %status, "Board snapshot request failed");
            return Err(ClientError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let tasks: Vec<BoardSyncTask> = response.json().await?;
        debug!(tasks = tasks.len(), "Board snapshot fetched");
        Ok(tasks)
    }
}

impl Default for SnapshotClient {
    fn default() -> Self {
        Self::new()
    }
}
