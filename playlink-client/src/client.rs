//! Client API surface
//!
//! [`PlaylinkClient`] is a cheap-to-clone handle over the shared engine
//! pieces. Calls flow through one path: acquire an in-flight permit, check
//! the connection, allocate an id, park a waiter in the correlator, send the
//! frame, and wait for the response or the timeout. The typed methods
//! (`play`, `load`, `set_volume`, ...) validate locally first so that bad
//! arguments never reach the wire.

use crate::connection::{ConnectionMonitor, ConnectionState, Control};
use crate::correlator::Correlator;
use crate::metrics::ClientMetrics;
use crate::store::StateStore;
use crate::transport::SendHalf;
use playlink_core::codec;
use playlink_core::envelope::RpcRequest;
use playlink_core::player::{
    LoadOptions, MediaType, PlayerError, PlayerSnapshot, PlayerState,
};
use playlink_core::protocol::methods;
use playlink_core::{Error, Result};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc, watch, Mutex, Semaphore};
use tokio::task::JoinHandle;

/// Pieces every clone of the client shares.
pub(crate) struct ClientShared {
    pub(crate) endpoint: String,
    pub(crate) call_timeout: Duration,
    pub(crate) in_flight: Semaphore,
    pub(crate) correlator: Correlator,
    pub(crate) send_half: Arc<SendHalf>,
    pub(crate) store: StateStore,
    pub(crate) errors: broadcast::Sender<PlayerError>,
    pub(crate) monitor: Arc<ConnectionMonitor>,
    pub(crate) metrics: ClientMetrics,
    pub(crate) control: mpsc::Sender<Control>,
    pub(crate) supervisor: Mutex<Option<JoinHandle<()>>>,
}

/// Handle to a remote media player.
///
/// Obtained from [`crate::ClientBuilder`]. Clones share one connection,
/// one state mirror and one in-flight budget.
#[derive(Clone)]
pub struct PlaylinkClient {
    pub(crate) shared: Arc<ClientShared>,
}

impl std::fmt::Debug for PlaylinkClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaylinkClient")
            .field("endpoint", &self.shared.endpoint)
            .finish_non_exhaustive()
    }
}

impl PlaylinkClient {
    /// Connect to `endpoint` with default settings. Shorthand for
    /// [`crate::ClientBuilder::new`] followed by `connect()`.
    pub async fn connect(endpoint: impl Into<String>) -> Result<Self> {
        crate::ClientBuilder::new(endpoint).connect().await
    }

    /// The endpoint this client talks to.
    pub fn endpoint(&self) -> &str {
        &self.shared.endpoint
    }

    /// Issue a raw call and return its result value.
    ///
    /// The typed methods below cover the whole protocol; this is the escape
    /// hatch for servers with extensions.
    #[tracing::instrument(skip(self, params), fields(method = %method))]
    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let _permit = self
            .shared
            .in_flight
            .acquire()
            .await
            .map_err(|_| Error::Disconnected)?;

        if !self.shared.monitor.state().is_connected() {
            self.shared
                .metrics
                .record_call(method, "disconnected", 0.0);
            return Err(Error::Disconnected);
        }

        issue_call(
            &self.shared.correlator,
            &self.shared.send_half,
            &self.shared.metrics,
            method,
            params,
            self.shared.call_timeout,
        )
        .await
    }

    /// Start or resume playback of the loaded media.
    pub async fn play(&self) -> Result<()> {
        self.command(methods::PLAY, None).await
    }

    /// Pause playback, keeping the position.
    pub async fn pause(&self) -> Result<()> {
        self.command(methods::PAUSE, None).await
    }

    /// Stop playback and unload the media.
    pub async fn stop(&self) -> Result<()> {
        self.command(methods::STOP, None).await
    }

    /// Load media from `url`. With default options the server starts
    /// playing it immediately.
    pub async fn load(&self, url: &str, options: LoadOptions) -> Result<()> {
        validate_url(url)?;
        if let Some(position) = options.start_position {
            validate_position(position)?;
        }

        let Ok(Value::Object(opts)) = serde_json::to_value(&options) else {
            return Err(Error::Protocol(
                "load options did not serialize to an object".to_string(),
            ));
        };
        let mut params = serde_json::Map::new();
        params.insert("url".to_string(), Value::String(url.to_string()));
        // The options object is omitted entirely when every field is unset.
        if !opts.is_empty() {
            params.insert("options".to_string(), Value::Object(opts));
        }

        self.command(methods::LOAD, Some(Value::Object(params))).await
    }

    /// Set the volume. `volume` must be finite and within `0.0..=1.0`.
    pub async fn set_volume(&self, volume: f64) -> Result<()> {
        validate_volume(volume)?;
        self.command(methods::SET_VOLUME, Some(json!({ "level": volume })))
            .await
    }

    /// Seek to an absolute position in seconds.
    pub async fn seek(&self, position: f64) -> Result<()> {
        validate_position(position)?;
        self.command(methods::SEEK, Some(json!({ "position": position })))
            .await
    }

    /// Fetch the authoritative player state from the server. The local
    /// mirror is refreshed with the answer as a side effect.
    pub async fn get_state(&self) -> Result<PlayerState> {
        let value = self.call(methods::GET_STATE, None).await?;
        let player = PlayerState::from_value(value)?;
        self.shared.store.update(player.clone());
        Ok(player)
    }

    /// Ask the server which media types it can present. Types this crate
    /// does not know are skipped.
    pub async fn supported_media_types(&self) -> Result<Vec<MediaType>> {
        let value = self.call(methods::GET_SUPPORTED_MEDIA_TYPES, None).await?;
        let names: Vec<String> = serde_json::from_value(value)
            .map_err(|e| Error::Protocol(format!("malformed media type list: {e}")))?;

        Ok(names
            .iter()
            .filter_map(|name| match name.parse::<MediaType>() {
                Ok(media_type) => Some(media_type),
                Err(_) => {
                    tracing::debug!(media_type = %name, "server advertises a media type we do not know");
                    None
                }
            })
            .collect())
    }

    /// Latest snapshot of the mirrored player state.
    pub fn snapshot(&self) -> PlayerSnapshot {
        self.shared.store.get()
    }

    /// Subscribe to player state changes.
    pub fn subscribe(&self) -> watch::Receiver<PlayerSnapshot> {
        self.shared.store.subscribe()
    }

    /// Subscribe to asynchronous player errors.
    pub fn subscribe_errors(&self) -> broadcast::Receiver<PlayerError> {
        self.shared.errors.subscribe()
    }

    /// Current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.shared.monitor.state()
    }

    /// Subscribe to connection state changes.
    pub fn subscribe_connection(&self) -> watch::Receiver<ConnectionState> {
        self.shared.monitor.subscribe()
    }

    /// Number of calls currently awaiting a response.
    pub async fn pending_calls(&self) -> usize {
        self.shared.correlator.pending_count().await
    }

    /// Leave the failed state and try connecting again. Also skips the
    /// remaining backoff delay when called while reconnecting. No effect
    /// while connected.
    pub async fn restart(&self) {
        let _ = self.shared.control.send(Control::Restart).await;
    }

    /// Shut the client down: close the socket, fail pending calls, and
    /// stop the supervisor. Waits for the supervisor to finish, so the
    /// connection state reads Disconnected afterwards. Idempotent.
    pub async fn close(&self) {
        let _ = self.shared.control.send(Control::Shutdown).await;
        let handle = self.shared.supervisor.lock().await.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    async fn command(&self, method: &str, params: Option<Value>) -> Result<()> {
        let result = self.call(method, params).await?;
        if result == Value::Bool(true) {
            Ok(())
        } else {
            Err(Error::Protocol(format!(
                "{method} returned unexpected result: {result}"
            )))
        }
    }
}

/// The raw call path, shared with the supervisor's resync task.
///
/// The caller is responsible for gating on connection state; here the send
/// simply fails if no sink is installed.
pub(crate) async fn issue_call(
    correlator: &Correlator,
    send_half: &SendHalf,
    metrics: &ClientMetrics,
    method: &str,
    params: Option<Value>,
    call_timeout: Duration,
) -> Result<Value> {
    let started = Instant::now();
    let result = issue_call_inner(correlator, send_half, method, params, call_timeout).await;

    let outcome = match &result {
        Ok(_) => "ok",
        Err(Error::Remote(_)) => "remote_error",
        Err(Error::Timeout) => "timeout",
        Err(Error::Disconnected) => "disconnected",
        Err(_) => "error",
    };
    metrics.record_call(method, outcome, started.elapsed().as_secs_f64());

    result
}

async fn issue_call_inner(
    correlator: &Correlator,
    send_half: &SendHalf,
    method: &str,
    params: Option<Value>,
    call_timeout: Duration,
) -> Result<Value> {
    let id = correlator.next_id();
    let rx = correlator.register(id, method).await;
    let request = RpcRequest::new(method, params, id);

    let frame = match codec::encode(&request) {
        Ok(frame) => frame,
        Err(e) => {
            correlator.abandon(id).await;
            return Err(e);
        }
    };

    if let Err(e) = send_half.send(frame).await {
        correlator.abandon(id).await;
        tracing::debug!(method = %method, id, error = %e, "send failed");
        return Err(Error::Disconnected);
    }

    match tokio::time::timeout(call_timeout, rx).await {
        Err(_) => {
            correlator.abandon(id).await;
            tracing::warn!(
                method = %method,
                id,
                timeout_ms = call_timeout.as_millis() as u64,
                "call timed out"
            );
            Err(Error::Timeout)
        }
        // Waiter dropped without a value only happens on teardown races.
        Ok(Err(_)) => Err(Error::Disconnected),
        Ok(Ok(Err(e))) => Err(e),
        Ok(Ok(Ok(response))) => match response.into_result() {
            Ok(value) => Ok(value),
            Err(Error::Remote(e)) => {
                tracing::error!(
                    method = %method,
                    id,
                    code = e.code,
                    message = %e.message,
                    "server rejected call"
                );
                Err(Error::Remote(e))
            }
            Err(other) => Err(other),
        },
    }
}

fn validate_url(url: &str) -> Result<()> {
    if url.trim().is_empty() {
        return Err(Error::InvalidArgument("url must not be empty".to_string()));
    }
    Ok(())
}

fn validate_volume(volume: f64) -> Result<()> {
    if !volume.is_finite() || !(0.0..=1.0).contains(&volume) {
        return Err(Error::InvalidArgument(format!(
            "volume must be within 0.0..=1.0, got {volume}"
        )));
    }
    Ok(())
}

fn validate_position(position: f64) -> Result<()> {
    if !position.is_finite() || position < 0.0 {
        return Err(Error::InvalidArgument(format!(
            "position must be a non-negative number of seconds, got {position}"
        )));
    }
    Ok(())
}
