//! WebSocket transport for one board sync session.
//!
//! A single driver task owns the socket, the heartbeat interval and the
//! reconnect timer. Socket events, timer ticks and caller commands are all
//! serialized through one `select!` loop, so the listener is never called
//! concurrently and never after teardown.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use boardsync_core::{ClientMessage, CloseCode, ConnectionState, ServerMessage, SyncConfig};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior, Sleep};
use tokio_tungstenite::tungstenite::handshake::client::Response;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::error::ClientResult;
use crate::listener::{dispatch, SyncListener};
use crate::machine::{ConnectionMachine, Effect, Event};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type ConnectFuture = Pin<Box<dyn Future<Output = Result<(WsStream, Response), WsError>> + Send>>;

/// Upper bound on waiting for our close frame to be flushed.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

enum Command {
    Connect,
    Disconnect,
    Send(ClientMessage),
    Shutdown,
}

/// Handle to a running transport driver.
///
/// Dropping every handle tears the connection down the same way
/// [`SyncTransport::shutdown`] does.
pub struct SyncTransport {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    driver: JoinHandle<()>,
}

impl SyncTransport {
    /// Spawn the driver task. The transport starts `Disconnected`; call
    /// [`connect`](Self::connect) to open the socket.
    ///
    /// A disabled config, or one without a token, yields a transport that
    /// stays disconnected. An unusable API URL is an error.
    pub fn spawn<L>(config: &SyncConfig, listener: L) -> ClientResult<Self>
    where
        L: SyncListener,
    {
        let endpoint = if config.is_active() {
            Some(config.endpoint()?)
        } else {
            debug!(board_id = %config.board_id, "Board sync inactive, no endpoint");
            None
        };

        install_crypto_provider();

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

        let driver = Driver {
            machine: ConnectionMachine::new(config.backoff, endpoint.is_some()),
            endpoint,
            board_id: config.board_id.clone(),
            heartbeat_period: config.heartbeat_interval(),
            listener,
            state_tx,
            commands: commands_rx,
            socket: None,
            pending_connect: None,
            heartbeat: None,
            reconnect: None,
        };
        let driver = tokio::spawn(driver.run());

        Ok(Self {
            commands: commands_tx,
            state: state_rx,
            driver,
        })
    }

    pub fn connect(&self) {
        let _ = self.commands.send(Command::Connect);
    }

    pub fn disconnect(&self) {
        let _ = self.commands.send(Command::Disconnect);
    }

    /// Send a message if the socket is open. Otherwise it is dropped: nothing
    /// is queued for a later connection.
    pub fn send(&self, message: ClientMessage) {
        if !self.state().is_connected() {
            debug!(kind = message.kind(), "Not connected, dropping outbound message");
            return;
        }
        let _ = self.commands.send(Command::Send(message));
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Close the socket, stop both timers and wait for the driver to exit.
    pub async fn shutdown(self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Err(e) = self.driver.await {
            warn!(error = %e, "Board sync driver ended abnormally");
        }
    }
}

struct PendingConnect {
    epoch: u64,
    future: ConnectFuture,
}

struct PendingReconnect {
    epoch: u64,
    sleep: Pin<Box<Sleep>>,
}

enum Wake {
    Command(Option<Command>),
    Frame(Option<Result<Message, WsError>>),
    Handshake(u64, Result<(WsStream, Response), WsError>),
    Heartbeat,
    ReconnectDue(u64),
}

struct Driver<L> {
    machine: ConnectionMachine,
    endpoint: Option<Url>,
    board_id: String,
    heartbeat_period: Duration,
    listener: L,
    state_tx: watch::Sender<ConnectionState>,
    commands: mpsc::UnboundedReceiver<Command>,
    socket: Option<WsStream>,
    pending_connect: Option<PendingConnect>,
    heartbeat: Option<Interval>,
    reconnect: Option<PendingReconnect>,
}

impl<L: SyncListener> Driver<L> {
    async fn run(mut self) {
        debug!(board_id = %self.board_id, "Board sync driver started");
        loop {
            let wake = tokio::select! {
                command = self.commands.recv() => Wake::Command(command),
                frame = next_frame(&mut self.socket) => Wake::Frame(frame),
                (epoch, result) = handshake(&mut self.pending_connect) => Wake::Handshake(epoch, result),
                _ = heartbeat_tick(&mut self.heartbeat) => Wake::Heartbeat,
                epoch = reconnect_due(&mut self.reconnect) => Wake::ReconnectDue(epoch),
            };
            if !self.on_wake(wake).await {
                break;
            }
        }
        debug!(board_id = %self.board_id, "Board sync driver stopped");
    }

    /// Returns false once the driver should exit.
    async fn on_wake(&mut self, wake: Wake) -> bool {
        match wake {
            Wake::Command(None) | Wake::Command(Some(Command::Shutdown)) => {
                self.apply(Event::Shutdown).await;
                return false;
            }
            Wake::Command(Some(Command::Connect)) => self.apply(Event::Connect).await,
            Wake::Command(Some(Command::Disconnect)) => self.apply(Event::Disconnect).await,
            Wake::Command(Some(Command::Send(message))) => self.send(message).await,
            Wake::Frame(frame) => self.on_frame(frame).await,
            Wake::Handshake(epoch, result) => {
                self.pending_connect = None;
                self.on_handshake(epoch, result).await;
            }
            Wake::Heartbeat => {
                if self.machine.state().is_connected() {
                    self.send(ClientMessage::heartbeat_now()).await;
                }
            }
            Wake::ReconnectDue(epoch) => {
                self.reconnect = None;
                self.apply(Event::ReconnectDue { epoch }).await;
            }
        }
        true
    }

    async fn on_handshake(&mut self, epoch: u64, result: Result<(WsStream, Response), WsError>) {
        match result {
            Ok((socket, _response)) => {
                if epoch != self.machine.epoch() {
                    debug!(epoch, "Dropping socket from superseded attempt");
                    return;
                }
                self.socket = Some(socket);
                self.apply(Event::Opened { epoch }).await;
            }
            Err(e) => {
                let code = match &e {
                    WsError::Http(response) => {
                        CloseCode::from_handshake_status(response.status().as_u16()).code()
                    }
                    _ => CloseCode::ABNORMAL,
                };
                warn!(board_id = %self.board_id, error = %e, code, "Board sync handshake failed");
                self.apply(Event::Closed { epoch, code }).await;
            }
        }
    }

    async fn on_frame(&mut self, frame: Option<Result<Message, WsError>>) {
        let code = match frame {
            Some(Ok(Message::Text(text))) => {
                self.on_text(text.as_str());
                return;
            }
            Some(Ok(Message::Close(close))) => {
                let code = close
                    .as_ref()
                    .map(|frame| u16::from(frame.code))
                    .unwrap_or(CloseCode::ABNORMAL);
                info!(board_id = %self.board_id, code, "Board sync socket closed by server");
                code
            }
            Some(Ok(other)) => {
                trace!(?other, "Ignoring non-text frame");
                return;
            }
            Some(Err(e)) => {
                warn!(board_id = %self.board_id, error = %e, "Board sync socket error");
                CloseCode::ABNORMAL
            }
            None => {
                debug!(board_id = %self.board_id, "Board sync stream ended");
                CloseCode::ABNORMAL
            }
        };
        self.socket = None;
        let epoch = self.machine.epoch();
        self.apply(Event::Closed { epoch, code }).await;
    }

    fn on_text(&mut self, text: &str) {
        match ServerMessage::decode(text) {
            Ok(message) => {
                trace!(kind = message.kind(), "Board sync message received");
                dispatch(&mut self.listener, message);
            }
            Err(e) => {
                debug!(error = %e, "Dropping malformed board sync frame");
            }
        }
    }

    async fn send(&mut self, message: ClientMessage) {
        if !self.machine.state().is_connected() {
            debug!(kind = message.kind(), "Socket not open, dropping outbound message");
            return;
        }
        let Some(socket) = self.socket.as_mut() else {
            debug!(kind = message.kind(), "Socket not open, dropping outbound message");
            return;
        };
        let json = match message.encode() {
            Ok(json) => json,
            Err(e) => {
                warn!(kind = message.kind(), error = %e, "Failed to encode outbound message");
                return;
            }
        };
        trace!(kind = message.kind(), "Sending board sync message");
        if let Err(e) = socket.send(Message::text(json)).await {
            warn!(board_id = %self.board_id, error = %e, "Board sync send failed");
            self.socket = None;
            let epoch = self.machine.epoch();
            self.apply(Event::Closed {
                epoch,
                code: CloseCode::ABNORMAL,
            })
            .await;
        }
    }

    async fn apply(&mut self, event: Event) {
        for effect in self.machine.handle(event) {
            self.execute(effect).await;
        }
    }

    async fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::OpenSocket { epoch } => {
                self.socket = None;
                if let Some(endpoint) = &self.endpoint {
                    debug!(board_id = %self.board_id, epoch, "Connecting board sync socket");
                    let request = endpoint.as_str().to_owned();
                    self.pending_connect = Some(PendingConnect {
                        epoch,
                        future: Box::pin(connect_async(request)),
                    });
                }
            }
            Effect::CloseSocket => {
                self.pending_connect = None;
                if let Some(mut socket) = self.socket.take() {
                    match tokio::time::timeout(CLOSE_TIMEOUT, socket.close(None)).await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => debug!(error = %e, "Close handshake failed"),
                        Err(_) => debug!("Close handshake timed out"),
                    }
                }
            }
            Effect::StartHeartbeat => {
                let period = self.heartbeat_period;
                let mut interval = tokio::time::interval_at(Instant::now() + period, period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                self.heartbeat = Some(interval);
            }
            Effect::StopHeartbeat => self.heartbeat = None,
            Effect::ScheduleReconnect { epoch, delay } => {
                self.reconnect = Some(PendingReconnect {
                    epoch,
                    sleep: Box::pin(tokio::time::sleep(delay)),
                });
            }
            Effect::CancelReconnect => self.reconnect = None,
            Effect::StateChanged(state) => {
                info!(board_id = %self.board_id, state = %state, "Board sync state changed");
                self.state_tx.send_replace(state);
                self.listener.on_connection_state(state);
            }
        }
    }
}

/// `wss://` needs a process-wide rustls provider. Installing fails harmlessly
/// when the embedding application already chose one.
fn install_crypto_provider() {
    if rustls::crypto::CryptoProvider::get_default().is_none() {
        let _ = rustls::crypto::ring::default_provider().install_default();
    }
}

async fn next_frame(socket: &mut Option<WsStream>) -> Option<Result<Message, WsError>> {
    match socket {
        Some(socket) => socket.next().await,
        None => std::future::pending().await,
    }
}

async fn handshake(
    pending: &mut Option<PendingConnect>,
) -> (u64, Result<(WsStream, Response), WsError>) {
    match pending {
        Some(pending) => {
            let result = (&mut pending.future).await;
            (pending.epoch, result)
        }
        None => std::future::pending().await,
    }
}

async fn heartbeat_tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn reconnect_due(reconnect: &mut Option<PendingReconnect>) -> u64 {
    match reconnect {
        Some(pending) => {
            (&mut pending.sleep).await;
            pending.epoch
        }
        None => std::future::pending().await,
    }
}
