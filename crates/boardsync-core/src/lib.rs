//! Boardsync Core Library
//!
//! Data model, wire protocol and reconnect policy for real-time board
//! synchronization. Nothing in this crate performs I/O.

pub mod backoff;
pub mod config;
pub mod connection;
pub mod error;
pub mod protocol;
pub mod suggestion;
pub mod task;

pub use backoff::{reconnect_delay, BackoffPolicy, ExponentialBackoff};
pub use config::SyncConfig;
pub use connection::{CloseCode, ConnectionState};
pub use error::{SyncError, SyncResult};
pub use protocol::{ClientMessage, ServerMessage};
pub use suggestion::{AgentSuggestion, SuggestionBuffer};
pub use task::{BoardSyncTask, TaskChanges, TaskStatus};
