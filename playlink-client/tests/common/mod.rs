#![allow(dead_code)]

//! Shared mock media-player server for integration tests
//!
//! Speaks just enough of the protocol to exercise the client: it answers
//! the standard methods, pushes `stateChanged` after every command the way
//! real servers do, and can be scripted with a custom responder for fault
//! injection. Connections can be dropped or rejected on demand to drive
//! the reconnect machinery.

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// Maps one parsed request to the frames sent back, in order.
pub type Responder = Arc<dyn Fn(&Value) -> Vec<String> + Send + Sync>;

#[derive(Debug, Clone)]
enum ServerCmd {
    Send(String),
    Close,
}

pub struct MockPlayerServer {
    addr: SocketAddr,
    requests: mpsc::UnboundedReceiver<Value>,
    cmds: broadcast::Sender<ServerCmd>,
    shutdown: watch::Sender<bool>,
    reject: Arc<AtomicBool>,
    accepted: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl MockPlayerServer {
    /// Start a server with realistic player behavior.
    pub async fn spawn() -> Self {
        Self::spawn_with(player_responder()).await
    }

    /// Start a server that answers via the given responder.
    pub async fn spawn_with(responder: Responder) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let addr = listener.local_addr().expect("mock server address");

        let (request_tx, requests) = mpsc::unbounded_channel();
        let (cmds, _) = broadcast::channel(32);
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let reject = Arc::new(AtomicBool::new(false));
        let accepted = Arc::new(AtomicUsize::new(0));

        let cmd_tx = cmds.clone();
        let reject_flag = Arc::clone(&reject);
        let conn_count = Arc::clone(&accepted);
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => return,
                    incoming = listener.accept() => {
                        let Ok((stream, _)) = incoming else { return };
                        if reject_flag.load(Ordering::SeqCst) {
                            // Dropping before the handshake makes the
                            // client's connect attempt fail.
                            drop(stream);
                            continue;
                        }
                        conn_count.fetch_add(1, Ordering::SeqCst);
                        tokio::spawn(serve_connection(
                            stream,
                            Arc::clone(&responder),
                            request_tx.clone(),
                            cmd_tx.subscribe(),
                        ));
                    }
                }
            }
        });

        Self {
            addr,
            requests,
            cmds,
            shutdown,
            reject,
            accepted,
            task,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    /// Next request any connection received, parsed. Panics after 5s.
    pub async fn next_request(&mut self) -> Value {
        tokio::time::timeout(Duration::from_secs(5), self.requests.recv())
            .await
            .expect("timed out waiting for a request")
            .expect("mock server stopped")
    }

    /// Skip requests until one for `method` arrives.
    pub async fn next_request_named(&mut self, method: &str) -> Value {
        loop {
            let request = self.next_request().await;
            if request["method"] == method {
                return request;
            }
        }
    }

    /// Send a raw frame on every open connection.
    pub fn push(&self, frame: String) {
        let _ = self.cmds.send(ServerCmd::Send(frame));
    }

    /// Send a notification on every open connection.
    pub fn push_notification(&self, method: &str, params: Value) {
        self.push(notification_frame(method, params));
    }

    /// Close every open connection at the WebSocket level. The listener
    /// keeps running, so clients can reconnect.
    pub fn drop_connections(&self) {
        let _ = self.cmds.send(ServerCmd::Close);
    }

    /// While set, new TCP connections are dropped before the handshake.
    pub fn set_reject(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    /// Number of connections accepted so far.
    pub fn connections(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

async fn serve_connection(
    stream: TcpStream,
    responder: Responder,
    requests: mpsc::UnboundedSender<Value>,
    mut cmds: broadcast::Receiver<ServerCmd>,
) {
    let Ok(mut ws) = accept_async(stream).await else {
        return;
    };

    loop {
        tokio::select! {
            msg = ws.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let Ok(request) = serde_json::from_str::<Value>(&text) else {
                        continue;
                    };
                    let _ = requests.send(request.clone());
                    for frame in responder(&request) {
                        if ws.send(Message::Text(frame)).await.is_err() {
                            return;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => return,
                Some(Ok(_)) => {}
                Some(Err(_)) => return,
            },
            cmd = cmds.recv() => match cmd {
                Ok(ServerCmd::Send(frame)) => {
                    if ws.send(Message::Text(frame)).await.is_err() {
                        return;
                    }
                }
                Ok(ServerCmd::Close) => {
                    let _ = ws.close(None).await;
                    return;
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return,
            },
        }
    }
}

/// Scripted player that behaves like a real server: commands answer `true`
/// and are followed by a `stateChanged` push reflecting the new state.
pub fn player_responder() -> Responder {
    let model = Arc::new(Mutex::new(PlayerModel::default()));

    Arc::new(move |request: &Value| {
        let id = request.get("id").cloned().unwrap_or(Value::Null);
        let method = request["method"].as_str().unwrap_or("");
        let params = request.get("params");
        let mut model = model.lock().unwrap();

        match method {
            "getState" => vec![result_frame(&id, model.state_json())],
            "getSupportedMediaTypes" => {
                vec![result_frame(&id, json!(["video", "music", "url"]))]
            }
            "play" => {
                if model.url.is_some() {
                    model.state = "playing";
                }
                model.ack_and_notify(&id)
            }
            "pause" => {
                if model.state == "playing" {
                    model.state = "paused";
                }
                model.ack_and_notify(&id)
            }
            "stop" => {
                model.state = "idle";
                model.url = None;
                model.media_type = None;
                model.position = 0.0;
                model.duration = 0.0;
                model.ack_and_notify(&id)
            }
            "load" => {
                let params = params.cloned().unwrap_or_else(|| json!({}));
                let options = &params["options"];
                model.url = params["url"].as_str().map(str::to_string);
                model.media_type = options["media_type"].as_str().map(str::to_string);
                model.position = options["startPosition"].as_f64().unwrap_or(0.0);
                model.duration = 180.0;
                model.state = if options["autoplay"].as_bool().unwrap_or(true) {
                    "playing"
                } else {
                    "paused"
                };
                model.ack_and_notify(&id)
            }
            "setVolume" => {
                if let Some(volume) = params.and_then(|p| p["level"].as_f64()) {
                    model.volume = volume;
                }
                model.ack_and_notify(&id)
            }
            "seek" => {
                if let Some(position) = params.and_then(|p| p["position"].as_f64()) {
                    model.position = position;
                }
                model.ack_and_notify(&id)
            }
            other => vec![error_frame(&id, -32601, &format!("Method {other} not found"))],
        }
    })
}

struct PlayerModel {
    state: &'static str,
    url: Option<String>,
    media_type: Option<String>,
    position: f64,
    duration: f64,
    volume: f64,
}

impl Default for PlayerModel {
    fn default() -> Self {
        Self {
            state: "idle",
            url: None,
            media_type: None,
            position: 0.0,
            duration: 0.0,
            volume: 1.0,
        }
    }
}

impl PlayerModel {
    /// Wire shape real servers use: the media object is always present,
    /// with a null url while nothing is loaded, and no muted field.
    fn state_json(&self) -> Value {
        json!({
            "state": self.state,
            "media": {
                "url": self.url,
                "media_type": self.media_type,
                "duration": self.duration,
                "position": self.position,
                "title": null,
                "artist": null,
                "album": null,
                "thumbnail": null,
            },
            "volume": self.volume,
        })
    }

    fn ack_and_notify(&self, id: &Value) -> Vec<String> {
        vec![
            result_frame(id, json!(true)),
            notification_frame("stateChanged", self.state_json()),
        ]
    }
}

pub fn result_frame(id: &Value, result: Value) -> String {
    json!({"jsonrpc": "2.0", "result": result, "id": id}).to_string()
}

pub fn error_frame(id: &Value, code: i32, message: &str) -> String {
    json!({"jsonrpc": "2.0", "error": {"code": code, "message": message}, "id": id}).to_string()
}

pub fn notification_frame(method: &str, params: Value) -> String {
    json!({"jsonrpc": "2.0", "method": method, "params": params}).to_string()
}

/// The idle payload the scripted server reports before anything loads.
pub fn idle_state() -> Value {
    json!({
        "state": "idle",
        "media": {
            "url": null,
            "media_type": null,
            "duration": 0.0,
            "position": 0.0,
            "title": null,
            "artist": null,
            "album": null,
            "thumbnail": null,
        },
        "volume": 1.0,
    })
}

/// Wait until a watch channel holds a value matching `pred`, with a 5s cap.
pub async fn wait_watch<T, F>(rx: &mut tokio::sync::watch::Receiver<T>, pred: F) -> T
where
    T: Clone,
    F: Fn(&T) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            {
                let current = rx.borrow_and_update();
                if pred(&current) {
                    return current.clone();
                }
            }
            rx.changed().await.expect("watch channel closed");
        }
    })
    .await
    .expect("timed out waiting for watched condition")
}

/// Poll a plain predicate until it holds, with a 5s cap.
pub async fn wait_until<F: Fn() -> bool>(pred: F) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !pred() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("timed out waiting for condition")
}

/// Best-effort log output for debugging test runs; respects RUST_LOG.
pub fn init_logging() {
    let _ = playlink_core::init_logging(&playlink_core::LogConfig::new("info"));
}
