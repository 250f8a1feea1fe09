//! Connection lifecycle as a pure state machine.
//!
//! The machine never touches a socket or a clock. It consumes [`Event`]s and
//! returns the [`Effect`]s the driver must perform, which keeps the reconnect
//! rules testable without a network.
//!
//! Every socket attempt gets a new epoch. Events tagged with an older epoch
//! come from a connection or timer that has since been replaced or torn down
//! and are ignored. After [`Event::Shutdown`] every event is ignored.

use std::time::Duration;

use boardsync_core::{BackoffPolicy, CloseCode, ConnectionState};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Explicit request to connect.
    Connect,
    /// The socket for `epoch` finished its handshake.
    Opened { epoch: u64 },
    /// The socket for `epoch` closed or failed to open.
    Closed { epoch: u64, code: u16 },
    /// The reconnect timer scheduled for `epoch` fired.
    ReconnectDue { epoch: u64 },
    /// Explicit request to disconnect. `Connect` may follow.
    Disconnect,
    /// Owner is going away; nothing may happen afterwards.
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    OpenSocket { epoch: u64 },
    CloseSocket,
    StartHeartbeat,
    StopHeartbeat,
    ScheduleReconnect { epoch: u64, delay: Duration },
    CancelReconnect,
    StateChanged(ConnectionState),
}

#[derive(Debug, Clone)]
pub struct ConnectionMachine {
    state: ConnectionState,
    policy: BackoffPolicy,
    active: bool,
    alive: bool,
    attempt: u32,
    epoch: u64,
    heartbeat_live: bool,
    reconnect_pending: bool,
}

impl ConnectionMachine {
    /// `active` is false when the session is disabled or has no token; such a
    /// machine never leaves `Disconnected`.
    pub fn new(policy: BackoffPolicy, active: bool) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            policy,
            active,
            alive: true,
            attempt: 0,
            epoch: 0,
            heartbeat_live: false,
            reconnect_pending: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Reconnect attempts started since the last successful open.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Delay the next transient close would schedule.
    pub fn next_delay(&self) -> Duration {
        self.policy.delay(self.attempt + 1)
    }

    pub fn handle(&mut self, event: Event) -> Vec<Effect> {
        let mut effects = Vec::new();
        if !self.alive {
            debug!(?event, "Connection torn down, ignoring event");
            return effects;
        }

        match event {
            Event::Connect => self.on_connect(&mut effects),
            Event::Opened { epoch } => self.on_opened(epoch, &mut effects),
            Event::Closed { epoch, code } => self.on_closed(epoch, code, &mut effects),
            Event::ReconnectDue { epoch } => self.on_reconnect_due(epoch, &mut effects),
            Event::Disconnect => self.on_disconnect(&mut effects),
            Event::Shutdown => {
                self.on_disconnect(&mut effects);
                self.alive = false;
            }
        }
        effects
    }

    fn on_connect(&mut self, effects: &mut Vec<Effect>) {
        if !self.active {
            debug!("Sync disabled or no token, staying disconnected");
            return;
        }
        if self.state != ConnectionState::Disconnected {
            debug!(state = %self.state, "Connect ignored, session already live");
            return;
        }
        self.attempt = 0;
        self.begin_connect(effects);
    }

    fn on_opened(&mut self, epoch: u64, effects: &mut Vec<Effect>) {
        if epoch != self.epoch || self.state != ConnectionState::Connecting {
            debug!(epoch, current = self.epoch, "Stale open ignored");
            return;
        }
        info!(epoch, "Board sync connected");
        self.attempt = 0;
        self.transition(ConnectionState::Connected, effects);
        self.stop_timers(effects);
        self.heartbeat_live = true;
        effects.push(Effect::StartHeartbeat);
    }

    fn on_closed(&mut self, epoch: u64, code: u16, effects: &mut Vec<Effect>) {
        if epoch != self.epoch
            || !matches!(
                self.state,
                ConnectionState::Connecting | ConnectionState::Connected
            )
        {
            debug!(epoch, code, current = self.epoch, "Stale close ignored");
            return;
        }

        self.stop_timers(effects);
        let close = CloseCode::from_code(code);
        if close.is_terminal() {
            warn!(code, ?close, "Board sync closed with terminal code, not reconnecting");
            self.transition(ConnectionState::Disconnected, effects);
            return;
        }

        let delay = self.policy.delay(self.attempt + 1);
        warn!(
            code,
            attempt = self.attempt + 1,
            delay_ms = delay.as_millis() as u64,
            "Board sync connection lost, scheduling reconnect"
        );
        self.transition(ConnectionState::Reconnecting, effects);
        self.reconnect_pending = true;
        effects.push(Effect::ScheduleReconnect {
            epoch: self.epoch,
            delay,
        });
    }

    fn on_reconnect_due(&mut self, epoch: u64, effects: &mut Vec<Effect>) {
        if epoch != self.epoch
            || self.state != ConnectionState::Reconnecting
            || !self.reconnect_pending
        {
            debug!(epoch, current = self.epoch, "Stale reconnect timer ignored");
            return;
        }
        self.reconnect_pending = false;
        self.attempt = self.attempt.saturating_add(1);
        self.begin_connect(effects);
    }

    fn on_disconnect(&mut self, effects: &mut Vec<Effect>) {
        self.stop_timers(effects);
        if matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Connected
        ) {
            effects.push(Effect::CloseSocket);
        }
        self.epoch += 1;
        self.attempt = 0;
        self.transition(ConnectionState::Disconnected, effects);
    }

    fn begin_connect(&mut self, effects: &mut Vec<Effect>) {
        self.stop_timers(effects);
        self.epoch += 1;
        debug!(epoch = self.epoch, attempt = self.attempt, "Opening board sync socket");
        self.transition(ConnectionState::Connecting, effects);
        effects.push(Effect::OpenSocket { epoch: self.epoch });
    }

    fn stop_timers(&mut self, effects: &mut Vec<Effect>) {
        if self.heartbeat_live {
            self.heartbeat_live = false;
            effects.push(Effect::StopHeartbeat);
        }
        if self.reconnect_pending {
            self.reconnect_pending = false;
            effects.push(Effect::CancelReconnect);
        }
    }

    fn transition(&mut self, to: ConnectionState, effects: &mut Vec<Effect>) {
        if self.state != to {
            self.state = to;
            effects.push(Effect::StateChanged(to));
        }
    }
}
