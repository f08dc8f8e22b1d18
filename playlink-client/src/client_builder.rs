//! Client construction
//!
//! Two ways in: [`ClientBuilder::connect`] performs the first connection
//! inline and fails fast if the server is unreachable, which suits
//! interactive flows. [`ClientBuilder::start`] returns a client
//! immediately and lets the supervisor work through the reconnect policy
//! in the background, which suits long-running hosts that want the engine
//! to chase a server that may not be up yet.

use crate::client::{ClientShared, PlaylinkClient};
use crate::connection::{ConnectionMonitor, ConnectionState, ResyncFailure, Supervisor};
use crate::correlator::Correlator;
use crate::metrics::ClientMetrics;
use crate::reconnect::{ExponentialBackoff, NoReconnect, ReconnectPolicy};
use crate::store::StateStore;
use crate::transport::{self, SendHalf};
use playlink_core::protocol::{self, DEFAULT_PORT};
use playlink_core::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Mutex, Semaphore};

const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_MAX_IN_FLIGHT: usize = 32;

/// Configures and creates a [`PlaylinkClient`].
///
/// # Examples
///
/// ```
/// use playlink_client::ClientBuilder;
/// use playlink_client::reconnect::ExponentialBackoff;
/// use std::time::Duration;
///
/// let builder = ClientBuilder::for_host("192.168.1.50")
///     .with_call_timeout(Duration::from_secs(5))
///     .with_reconnect(ExponentialBackoff::default().with_unlimited_attempts());
/// # drop(builder);
/// ```
pub struct ClientBuilder {
    endpoint: String,
    call_timeout: Duration,
    max_in_flight: usize,
    policy: Box<dyn ReconnectPolicy>,
    resync_failure: ResyncFailure,
}

impl ClientBuilder {
    /// Build a client for a full WebSocket endpoint, e.g.
    /// `ws://192.168.1.50:9300/ws`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            policy: Box::new(ExponentialBackoff::default()),
            resync_failure: ResyncFailure::default(),
        }
    }

    /// Build a client for a host using the default port and path.
    pub fn for_host(host: &str) -> Self {
        Self::new(protocol::endpoint(host, DEFAULT_PORT))
    }

    /// How long to wait for each call's response before giving up on it.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Cap on concurrently outstanding calls. Calls beyond the cap wait
    /// for a slot instead of failing. Clamped to at least 1.
    pub fn with_max_in_flight(mut self, max: usize) -> Self {
        self.max_in_flight = max.max(1);
        self
    }

    /// Replace the reconnect policy.
    pub fn with_reconnect(mut self, policy: impl ReconnectPolicy + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    /// Fail permanently on the first connection loss.
    pub fn without_reconnect(mut self) -> Self {
        self.policy = Box::new(NoReconnect);
        self
    }

    /// What to do when the post-connect state resync fails.
    pub fn on_resync_failure(mut self, behavior: ResyncFailure) -> Self {
        self.resync_failure = behavior;
        self
    }

    /// Connect now, failing fast if the first attempt does not succeed.
    /// Reconnection still applies to later losses.
    pub async fn connect(self) -> Result<PlaylinkClient> {
        let (sink, stream) = transport::connect(&self.endpoint).await?;

        let (client, supervisor) = self.build();
        client.shared.send_half.install(sink).await;
        client.shared.monitor.transition(ConnectionState::Connected);
        client
            .shared
            .metrics
            .update_connection_state(&ConnectionState::Connected);

        let handle = supervisor.spawn(Some(stream));
        *client.shared.supervisor.lock().await = Some(handle);
        Ok(client)
    }

    /// Return a client immediately and connect in the background. A failed
    /// first attempt runs through the reconnect policy like any later
    /// loss; watch [`PlaylinkClient::subscribe_connection`] to follow it.
    pub async fn start(self) -> PlaylinkClient {
        let (client, supervisor) = self.build();
        let handle = supervisor.spawn(None);
        *client.shared.supervisor.lock().await = Some(handle);
        client
    }

    fn build(self) -> (PlaylinkClient, Supervisor) {
        let (control_tx, control_rx) = mpsc::channel(8);
        let send_half = Arc::new(SendHalf::new());
        let correlator = Correlator::new();
        let store = StateStore::new();
        let (errors, _) = broadcast::channel(16);
        let monitor = Arc::new(ConnectionMonitor::new());
        let metrics = ClientMetrics::new();

        let supervisor = Supervisor {
            endpoint: self.endpoint.clone(),
            call_timeout: self.call_timeout,
            resync_failure: self.resync_failure,
            policy: self.policy,
            attempt: 0,
            epoch: 0,
            send_half: Arc::clone(&send_half),
            correlator: correlator.clone(),
            store: store.clone(),
            errors: errors.clone(),
            monitor: Arc::clone(&monitor),
            metrics: metrics.clone(),
            control: control_rx,
            control_weak: control_tx.downgrade(),
        };

        let client = PlaylinkClient {
            shared: Arc::new(ClientShared {
                endpoint: self.endpoint,
                call_timeout: self.call_timeout,
                in_flight: Semaphore::new(self.max_in_flight),
                correlator,
                send_half,
                store,
                errors,
                monitor,
                metrics,
                control: control_tx,
                supervisor: Mutex::new(None),
            }),
        };

        (client, supervisor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let builder = ClientBuilder::new("ws://localhost:9300/ws");
        assert_eq!(builder.endpoint, "ws://localhost:9300/ws");
        assert_eq!(builder.call_timeout, Duration::from_secs(10));
        assert_eq!(builder.max_in_flight, 32);
        assert_eq!(builder.resync_failure, ResyncFailure::Reconnect);
    }

    #[test]
    fn for_host_builds_the_endpoint() {
        let builder = ClientBuilder::for_host("192.168.1.50");
        assert_eq!(builder.endpoint, "ws://192.168.1.50:9300/ws");
    }

    #[test]
    fn settings_are_applied() {
        let builder = ClientBuilder::new("ws://h:9300/ws")
            .with_call_timeout(Duration::from_millis(500))
            .with_max_in_flight(4)
            .on_resync_failure(ResyncFailure::KeepStale);

        assert_eq!(builder.call_timeout, Duration::from_millis(500));
        assert_eq!(builder.max_in_flight, 4);
        assert_eq!(builder.resync_failure, ResyncFailure::KeepStale);
    }

    #[test]
    fn max_in_flight_is_clamped() {
        let builder = ClientBuilder::new("ws://h:9300/ws").with_max_in_flight(0);
        assert_eq!(builder.max_in_flight, 1);
    }

    #[test]
    fn without_reconnect_gives_up_immediately() {
        let mut builder = ClientBuilder::new("ws://h:9300/ws").without_reconnect();
        assert_eq!(builder.policy.next_delay(), None);
    }
}
