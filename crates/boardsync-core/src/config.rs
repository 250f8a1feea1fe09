//! Sync session configuration.
//!
//! Values are layered: built-in defaults, then a TOML file, then the
//! `BOARDSYNC_*` environment variables. Command-line flags are applied on top
//! by the binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::backoff::BackoffPolicy;
use crate::error::{SyncError, SyncResult};

/// Default API base URL.
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";

/// Heartbeat cadence while connected.
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 30_000;

pub const ENV_API_URL: &str = "BOARDSYNC_API_URL";
pub const ENV_TOKEN: &str = "BOARDSYNC_TOKEN";
pub const ENV_BOARD: &str = "BOARDSYNC_BOARD";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Base URL of the REST API (`http` or `https`).
    pub api_url: String,
    pub board_id: String,
    /// Bearer token. `None` or empty keeps the connection disabled.
    pub token: Option<String>,
    pub enabled: bool,
    pub heartbeat_interval_ms: u64,
    pub backoff: BackoffPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            board_id: String::new(),
            token: None,
            enabled: true,
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
            backoff: BackoffPolicy::default(),
        }
    }
}

impl SyncConfig {
    pub fn new(api_url: impl Into<String>, board_id: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            board_id: board_id.into(),
            ..Self::default()
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Load from `path`, or from the default location when it exists, then
    /// apply environment overrides.
    pub fn load(path: Option<&Path>) -> SyncResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> SyncResult<Self> {
        debug!(path = %path.display(), "Loading sync config");
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> SyncResult<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject timings that would spin the heartbeat or reconnect loop.
    pub fn validate(&self) -> SyncResult<()> {
        if self.heartbeat_interval_ms == 0 {
            return Err(SyncError::config("heartbeat_interval_ms must be greater than 0"));
        }
        if self.backoff.base_ms == 0 {
            return Err(SyncError::config("backoff.base_ms must be greater than 0"));
        }
        if self.backoff.max_ms < self.backoff.base_ms {
            return Err(SyncError::config("backoff.max_ms must not be below backoff.base_ms"));
        }
        Ok(())
    }

    /// `$XDG_CONFIG_HOME/boardsync/config.toml` or the platform equivalent.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("boardsync").join("config.toml"))
    }

    /// Apply `BOARDSYNC_*` overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            self.api_url = url;
        }
        if let Some(token) = lookup(ENV_TOKEN).filter(|v| !v.trim().is_empty()) {
            self.token = Some(token);
        }
        if let Some(board) = lookup(ENV_BOARD).filter(|v| !v.trim().is_empty()) {
            self.board_id = board;
        }
    }

    /// Token, if set and non-empty.
    pub fn bearer_token(&self) -> Option<&str> {
        self.token.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    /// Whether a session built from this config may connect at all.
    pub fn is_active(&self) -> bool {
        self.enabled && self.bearer_token().is_some()
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms.max(1))
    }

    /// `{ws|wss}://{host}/ws/board/{board_id}/sync?token={token}`.
    pub fn endpoint(&self) -> SyncResult<Url> {
        let token = self.bearer_token().ok_or(SyncError::MissingToken)?;
        if self.board_id.trim().is_empty() {
            return Err(SyncError::MissingBoard);
        }

        let base = self.api_url.trim().trim_end_matches('/');
        let ws_base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            return Err(SyncError::invalid_api_url(
                &self.api_url,
                "expected an http:// or https:// URL",
            ));
        };

        let mut url = Url::parse(&ws_base)?;
        url.path_segments_mut()
            .map_err(|_| SyncError::invalid_api_url(&self.api_url, "URL cannot be a base"))?
            .pop_if_empty()
            .extend(["ws", "board", self.board_id.as_str(), "sync"]);
        url.query_pairs_mut().clear().append_pair("token", token);
        Ok(url)
    }

    /// REST URL of the board's task list.
    pub fn tasks_url(&self) -> SyncResult<Url> {
        if self.board_id.trim().is_empty() {
            return Err(SyncError::MissingBoard);
        }
        let mut url = Url::parse(self.api_url.trim())?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SyncError::invalid_api_url(
                &self.api_url,
                "expected an http:// or https:// URL",
            ));
        }
        url.path_segments_mut()
            .map_err(|_| SyncError::invalid_api_url(&self.api_url, "URL cannot be a base"))?
            .pop_if_empty()
            .extend(["api", "v1", "boards", self.board_id.as_str(), "tasks"]);
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_endpoint_from_http() {
        let config = SyncConfig::new("http://localhost:8000", "board-1").with_token("abc");
        assert_eq!(
            config.endpoint().unwrap().as_str(),
            "ws://localhost:8000/ws/board/board-1/sync?token=abc"
        );
    }

    #[test]
    fn test_endpoint_from_https_with_path_and_slash() {
        let config = SyncConfig::new("https://ops.example.com/mc/", "b 2").with_token("a+b/c");
        assert_eq!(
            config.endpoint().unwrap().as_str(),
            "wss://ops.example.com/mc/ws/board/b%202/sync?token=a%2Bb%2Fc"
        );
    }

    #[test]
    fn test_endpoint_requires_token_and_http_scheme() {
        let config = SyncConfig::new("http://localhost:8000", "board-1");
        assert!(matches!(config.endpoint(), Err(SyncError::MissingToken)));
        assert!(!config.is_active());

        let blank = config.clone().with_token("   ");
        assert!(matches!(blank.endpoint(), Err(SyncError::MissingToken)));

        let ftp = SyncConfig::new("ftp://host", "board-1").with_token("t");
        assert!(matches!(ftp.endpoint(), Err(SyncError::InvalidApiUrl { .. })));
    }

    #[test]
    fn test_disabled_config_is_inactive() {
        let mut config = SyncConfig::new("http://localhost", "b").with_token("t");
        assert!(config.is_active());
        config.enabled = false;
        assert!(!config.is_active());
    }

    #[test]
    fn test_tasks_url() {
        let config = SyncConfig::new("http://localhost:8000/", "board-1");
        assert_eq!(
            config.tasks_url().unwrap().as_str(),
            "http://localhost:8000/api/v1/boards/board-1/tasks"
        );
    }

    #[test]
    fn test_toml_file_and_env_layering() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
api_url = "https://api.example.com"
board_id = "from-file"
heartbeat_interval_ms = 5000

[backoff]
max_ms = 10000
"#
        )
        .unwrap();

        let mut config = SyncConfig::from_file(file.path()).unwrap();
        assert_eq!(config.board_id, "from-file");
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(5));
        assert_eq!(config.backoff.max_ms, 10_000);
        assert_eq!(config.backoff.base_ms, 1_000);
        assert!(config.enabled);

        let env: HashMap<&str, &str> =
            HashMap::from([(ENV_TOKEN, "secret"), (ENV_BOARD, "from-env"), (ENV_API_URL, "")]);
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.board_id, "from-env");
        assert_eq!(config.bearer_token(), Some("secret"));
        assert_eq!(config.api_url, "https://api.example.com");
    }

    #[test]
    fn test_zero_timings_are_rejected() {
        let err = SyncConfig::from_toml_str("heartbeat_interval_ms = 0").unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));

        let err = SyncConfig::from_toml_str("[backoff]\nbase_ms = 5000\nmax_ms = 100").unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
    }

    #[test]
    fn test_invalid_toml_is_reported() {
        let err = SyncConfig::from_toml_str("board_id = [").unwrap_err();
        assert!(matches!(err, SyncError::Toml(_)));
    }
}
