//! Connection state and close code classification.

use serde::{Deserialize, Serialize};

/// Connectivity of a sync session. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Connecting,
    Connected,
    Reconnecting,
    Disconnected,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Disconnected => "disconnected",
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// WebSocket close codes with meaning to the sync protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCode {
    Unauthorized,
    BoardNotFound,
    Other(u16),
}

impl CloseCode {
    pub const UNAUTHORIZED: u16 = 4001;
    pub const BOARD_NOT_FOUND: u16 = 4004;
    /// Reported when a connection drops without a close frame.
    pub const ABNORMAL: u16 = 1006;

    pub fn from_code(code: u16) -> Self {
        match code {
            Self::UNAUTHORIZED => Self::Unauthorized,
            Self::BOARD_NOT_FOUND => Self::BoardNotFound,
            other => Self::Other(other),
        }
    }

    /// Map a rejected WebSocket handshake's HTTP status onto a close code.
    pub fn from_handshake_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::Unauthorized,
            404 => Self::BoardNotFound,
            _ => Self::Other(Self::ABNORMAL),
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            Self::Unauthorized => Self::UNAUTHORIZED,
            Self::BoardNotFound => Self::BOARD_NOT_FOUND,
            Self::Other(code) => *code,
        }
    }

    /// Terminal codes stop the reconnect loop.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Unauthorized | Self::BoardNotFound)
    }
}

impl From<u16> for CloseCode {
    fn from(code: u16) -> Self {
        Self::from_code(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_codes() {
        assert!(CloseCode::from(4001).is_terminal());
        assert!(CloseCode::from(4004).is_terminal());
        assert!(!CloseCode::from(1000).is_terminal());
        assert!(!CloseCode::from(1006).is_terminal());
        assert!(!CloseCode::from(4000).is_terminal());
        assert_eq!(CloseCode::from(4004).code(), 4004);
    }

    #[test]
    fn test_handshake_status_mapping() {
        assert_eq!(CloseCode::from_handshake_status(401), CloseCode::Unauthorized);
        assert_eq!(CloseCode::from_handshake_status(404), CloseCode::BoardNotFound);
        assert_eq!(CloseCode::from_handshake_status(502), CloseCode::Other(1006));
    }
}
