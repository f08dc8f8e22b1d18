//! Wire-protocol constants
//!
//! Method names, notification names, well-known error codes and the default
//! endpoint shape. Servers listen on [`DEFAULT_PORT`] and serve the protocol
//! on a single WebSocket path.

/// Default TCP port media-player servers listen on.
pub const DEFAULT_PORT: u16 = 9300;

/// WebSocket path the protocol is served on.
pub const WS_PATH: &str = "/ws";

/// Build the WebSocket URL for a host and port.
///
/// # Examples
///
/// ```
/// use playlink_core::protocol;
///
/// let url = protocol::endpoint("192.168.1.50", protocol::DEFAULT_PORT);
/// assert_eq!(url, "ws://192.168.1.50:9300/ws");
/// ```
pub fn endpoint(host: &str, port: u16) -> String {
    format!("ws://{host}:{port}{WS_PATH}")
}

/// Methods the client may call.
pub mod methods {
    pub const PLAY: &str = "play";
    pub const PAUSE: &str = "pause";
    pub const STOP: &str = "stop";
    pub const LOAD: &str = "load";
    pub const SET_VOLUME: &str = "setVolume";
    pub const SEEK: &str = "seek";
    pub const GET_STATE: &str = "getState";
    pub const GET_SUPPORTED_MEDIA_TYPES: &str = "getSupportedMediaTypes";
}

/// Notifications the server pushes.
pub mod notifications {
    /// Full player state after any observable change
    pub const STATE_CHANGED: &str = "stateChanged";
    /// Asynchronous playback failure
    pub const ERROR: &str = "error";
}

/// Application error codes player servers use beyond the standard JSON-RPC
/// set. All live in the implementation-defined -32000..=-32099 range.
pub mod error_codes {
    pub const MEDIA_LOAD_FAILED: i32 = -32000;
    pub const INVALID_MEDIA_URL: i32 = -32001;
    pub const NETWORK_ERROR: i32 = -32002;
    pub const PLAYER_ERROR: i32 = -32003;
    pub const UNSUPPORTED_MEDIA_TYPE: i32 = -32004;
}
