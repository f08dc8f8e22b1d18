//! Connection lifecycle
//!
//! A single supervisor task owns the socket for the whole life of a client:
//! it establishes the connection, reads every inbound frame, tears the
//! session down on loss and runs the reconnect schedule. The rest of the
//! engine only ever talks to it through the shared send half, the
//! correlator, and a small control channel.
//!
//! State transitions:
//!
//! ```text
//!  Disconnected -> Connecting -> Connected
//!                      ^            |
//!                      |        (loss, failed resync)
//!                      v            v
//!                  Reconnecting <---+
//!                      |
//!                 (policy gives up)
//!                      v
//!                   Failed -- restart() --> Connecting
//! ```
//!
//! Failed is terminal until the host calls restart. Every arrival in
//! Connected triggers a background `getState` resync so the mirror catches
//! up on whatever was missed while the socket was down.

use crate::client::issue_call;
use crate::correlator::Correlator;
use crate::metrics::ClientMetrics;
use crate::reconnect::ReconnectPolicy;
use crate::router;
use crate::store::StateStore;
use crate::transport::{self, Inbound, SendHalf, WsStream};
use playlink_core::codec;
use playlink_core::envelope::InboundFrame;
use playlink_core::player::{PlayerError, PlayerState};
use playlink_core::protocol::methods;
use playlink_core::Error;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

/// Where the connection currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection and none being attempted
    Disconnected,
    /// A connection attempt is in progress
    Connecting,
    /// Healthy; calls go through
    Connected,
    /// Waiting out the backoff delay before attempt `attempt`
    Reconnecting { attempt: u32 },
    /// The reconnect policy gave up; only a restart leaves this state
    Failed,
}

impl ConnectionState {
    /// True while calls can be issued.
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    /// Stable label for metrics attributes.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting { .. } => "reconnecting",
            ConnectionState::Failed => "failed",
        }
    }

    /// Numeric encoding for the connection state gauge.
    pub fn metric_code(&self) -> i64 {
        match self {
            ConnectionState::Disconnected => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Connected => 2,
            ConnectionState::Reconnecting { .. } => 3,
            ConnectionState::Failed => 4,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Reconnecting { attempt } => write!(f, "reconnecting(attempt {attempt})"),
            other => f.write_str(other.as_label()),
        }
    }
}

/// Observable connection state, shared between the supervisor and the
/// client API surface.
#[derive(Debug)]
pub struct ConnectionMonitor {
    tx: watch::Sender<ConnectionState>,
}

impl Default for ConnectionMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionMonitor {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ConnectionState::Disconnected);
        Self { tx }
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        *self.tx.borrow()
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.tx.subscribe()
    }

    /// Move to `next`, waking subscribers unless nothing changed.
    pub(crate) fn transition(&self, next: ConnectionState) {
        self.tx.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            tracing::info!(from = %state, to = %next, "connection state changed");
            *state = next;
            true
        });
    }
}

/// What to do when the post-connect resync fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResyncFailure {
    /// Treat the connection as unusable and reconnect
    #[default]
    Reconnect,
    /// Keep the connection, leave the mirror marked stale
    KeepStale,
}

/// Instructions the client API sends the supervisor.
#[derive(Debug)]
pub(crate) enum Control {
    /// Drop the current socket and run the reconnect schedule. Carries the
    /// session epoch it refers to so a late recycle cannot kill a newer
    /// session.
    Recycle { epoch: u64 },
    /// Leave Failed (or skip a backoff delay) and try connecting now
    Restart,
    /// Tear everything down for good
    Shutdown,
}

enum Session {
    Lost(String),
    Shutdown,
}

/// Owns the socket and drives the lifecycle. Spawned once per client.
pub(crate) struct Supervisor {
    pub(crate) endpoint: String,
    pub(crate) call_timeout: Duration,
    pub(crate) resync_failure: ResyncFailure,
    pub(crate) policy: Box<dyn ReconnectPolicy>,
    pub(crate) attempt: u32,
    pub(crate) epoch: u64,
    pub(crate) send_half: Arc<SendHalf>,
    pub(crate) correlator: Correlator,
    pub(crate) store: StateStore,
    pub(crate) errors: broadcast::Sender<PlayerError>,
    pub(crate) monitor: Arc<ConnectionMonitor>,
    pub(crate) metrics: ClientMetrics,
    pub(crate) control: mpsc::Receiver<Control>,
    pub(crate) control_weak: mpsc::WeakSender<Control>,
}

impl Supervisor {
    /// Start the supervisor task. `initial` carries the read half of a
    /// connection the builder already established, if any.
    pub(crate) fn spawn(self, initial: Option<WsStream>) -> JoinHandle<()> {
        tokio::spawn(self.run(initial))
    }

    async fn run(mut self, initial: Option<WsStream>) {
        let mut pending = initial;
        let mut lost_previous = false;

        loop {
            let mut stream = match pending.take() {
                Some(stream) => {
                    // Builder-established session: sink installed, ids fresh.
                    self.begin_session();
                    stream
                }
                None => match self.establish(lost_previous).await {
                    Some(stream) => stream,
                    None => break,
                },
            };

            match self.serve(&mut stream).await {
                Session::Lost(reason) => {
                    self.teardown(&reason).await;
                    lost_previous = true;
                }
                Session::Shutdown => break,
            }
        }

        self.shutdown().await;
    }

    /// Connect, retrying per the policy. `delay_first` runs the backoff
    /// schedule before the first attempt, which is how a lost connection
    /// differs from a fresh start. Returns `None` on shutdown.
    async fn establish(&mut self, delay_first: bool) -> Option<WsStream> {
        if delay_first && !self.backoff().await {
            return None;
        }

        loop {
            self.set_state(ConnectionState::Connecting);
            match transport::connect(&self.endpoint).await {
                Ok((sink, stream)) => {
                    self.correlator.reset_ids();
                    self.send_half.install(sink).await;
                    self.begin_session();
                    return Some(stream);
                }
                Err(e) => {
                    tracing::warn!(error = %e, endpoint = %self.endpoint, "connect attempt failed");
                    if !self.backoff().await {
                        return None;
                    }
                }
            }
        }
    }

    /// Session bookkeeping on every arrival in Connected.
    fn begin_session(&mut self) {
        if self.attempt > 0 {
            self.metrics.record_reconnect_success();
            tracing::info!(attempts = self.attempt, "reconnected");
        }
        self.attempt = 0;
        self.epoch += 1;
        self.policy.reset();
        self.set_state(ConnectionState::Connected);
        self.spawn_resync();
    }

    /// Wait out the next backoff delay. Returns false when shutdown was
    /// requested; a restart request skips the remaining delay.
    async fn backoff(&mut self) -> bool {
        match self.policy.next_delay() {
            Some(delay) => {
                self.attempt += 1;
                self.set_state(ConnectionState::Reconnecting {
                    attempt: self.attempt,
                });
                self.metrics.record_reconnect_attempt();
                tracing::info!(
                    attempt = self.attempt,
                    delay_ms = delay.as_millis() as u64,
                    "waiting before reconnect"
                );

                let sleep = tokio::time::sleep(delay);
                tokio::pin!(sleep);
                loop {
                    tokio::select! {
                        _ = &mut sleep => return true,
                        msg = self.control.recv() => match msg {
                            Some(Control::Restart) => return true,
                            Some(Control::Recycle { .. }) => {}
                            Some(Control::Shutdown) | None => return false,
                        },
                    }
                }
            }
            None => {
                self.set_state(ConnectionState::Failed);
                tracing::error!(endpoint = %self.endpoint, "reconnect policy gave up");
                self.park().await
            }
        }
    }

    /// Sit in Failed until the host restarts or shuts down.
    async fn park(&mut self) -> bool {
        loop {
            match self.control.recv().await {
                Some(Control::Restart) => {
                    tracing::info!("restart requested");
                    self.policy.reset();
                    self.attempt = 0;
                    return true;
                }
                Some(Control::Recycle { .. }) => {}
                Some(Control::Shutdown) | None => return false,
            }
        }
    }

    /// Pump frames until the connection dies or we are told to stop.
    async fn serve(&mut self, stream: &mut WsStream) -> Session {
        loop {
            tokio::select! {
                inbound = transport::next_inbound(stream) => match inbound {
                    Inbound::Frame(text) => self.dispatch_frame(&text).await,
                    Inbound::Closed(reason) => return Session::Lost(reason.to_string()),
                },
                msg = self.control.recv() => match msg {
                    Some(Control::Recycle { epoch }) if epoch == self.epoch => {
                        return Session::Lost("resynchronization failed".to_string());
                    }
                    Some(Control::Recycle { epoch }) => {
                        tracing::debug!(epoch, current = self.epoch, "ignoring stale recycle");
                    }
                    Some(Control::Restart) => {
                        tracing::debug!("restart requested while connected, ignoring");
                    }
                    Some(Control::Shutdown) | None => return Session::Shutdown,
                },
            }
        }
    }

    /// Demultiplex one inbound frame: responses go to the correlator,
    /// notifications to the router, garbage to the log.
    async fn dispatch_frame(&self, text: &str) {
        match codec::decode_inbound(text) {
            Ok(InboundFrame::Response(response)) => {
                let id = response.id.clone();
                if !self.correlator.complete(response).await {
                    tracing::warn!(id = %id, "response does not match any pending call");
                }
            }
            Ok(InboundFrame::Notification(note)) => {
                router::dispatch(note, &self.store, &self.errors, &self.metrics);
            }
            Err(e) => {
                self.metrics.record_violation();
                tracing::warn!(error = %e, "dropping invalid frame");
            }
        }
    }

    async fn teardown(&mut self, reason: &str) {
        tracing::warn!(reason = %reason, "connection lost");
        self.send_half.clear().await;
        let failed = self.correlator.fail_all(Error::Disconnected).await;
        if failed > 0 {
            tracing::warn!(calls = failed, "failed calls pending on the lost connection");
        }
        self.store.mark_stale();
    }

    async fn shutdown(&mut self) {
        self.send_half.close().await;
        self.correlator.fail_all(Error::Disconnected).await;
        self.store.mark_stale();
        self.set_state(ConnectionState::Disconnected);
        tracing::info!("client shut down");
    }

    fn set_state(&self, next: ConnectionState) {
        self.monitor.transition(next);
        self.metrics.update_connection_state(&next);
    }

    /// Fetch the authoritative state in the background so the read loop
    /// keeps running while we wait for the answer.
    fn spawn_resync(&self) {
        let correlator = self.correlator.clone();
        let send_half = Arc::clone(&self.send_half);
        let store = self.store.clone();
        let metrics = self.metrics.clone();
        let control = self.control_weak.clone();
        let call_timeout = self.call_timeout;
        let on_failure = self.resync_failure;
        let epoch = self.epoch;

        tokio::spawn(async move {
            let result = issue_call(
                &correlator,
                &send_half,
                &metrics,
                methods::GET_STATE,
                None,
                call_timeout,
            )
            .await;

            match result.and_then(PlayerState::from_value) {
                Ok(player) => {
                    store.update(player);
                    tracing::info!("player state synchronized");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "state resync failed");
                    if on_failure == ResyncFailure::Reconnect {
                        if let Some(control) = control.upgrade() {
                            let _ = control.send(Control::Recycle { epoch }).await;
                        }
                    }
                }
            }
        });
    }
}
