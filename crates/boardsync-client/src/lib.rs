//! Boardsync Client
//!
//! Keeps a local task list consistent with a server-authoritative board over
//! a WebSocket, across drops and reconnects.

pub mod error;
pub mod listener;
pub mod machine;
pub mod reconcile;
pub mod session;
pub mod snapshot;
pub mod transport;

pub use error::{ClientError, ClientResult};
pub use listener::{dispatch, SyncListener};
pub use reconcile::{BoardStore, SharedBoard};
pub use session::BoardSession;
pub use snapshot::SnapshotClient;
pub use transport::SyncTransport;
