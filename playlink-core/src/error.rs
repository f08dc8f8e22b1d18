//! Error taxonomy shared by the protocol crates
//!
//! Callers of the client API only ever see [`Error`]. The variants separate
//! the things a host genuinely handles differently: transport trouble the
//! reconnect machinery deals with, server-reported call failures, timeouts,
//! and local argument validation. [`RpcError`] is the wire-level JSON-RPC
//! error object and folds into [`Error::Remote`].
//!
//! `Error` is `Clone` so a single disconnect can fail every pending call with
//! the same value.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error as ThisError;

/// Convenient result alias used throughout the crates.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong issuing calls against a media-player server.
#[derive(Debug, Clone, ThisError)]
pub enum Error {
    /// Socket-level failure: connect, read or write. Calls never surface
    /// this directly; the connection supervisor consumes it and reports
    /// [`Error::Disconnected`] to callers instead.
    #[error("transport error: {0}")]
    Transport(String),

    /// A frame that violates the wire contract, or a response whose shape
    /// does not match the method's documented result.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The server answered a call with a JSON-RPC error object.
    #[error("remote error: {0}")]
    Remote(#[from] RpcError),

    /// No response arrived within the per-call timeout.
    #[error("call timed out")]
    Timeout,

    /// No usable connection: the call was issued while disconnected, or the
    /// connection dropped while the call was in flight.
    #[error("not connected")]
    Disconnected,

    /// A local precondition on the arguments failed. Nothing was sent.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// True for the variants a caller can reasonably retry once the
    /// connection is reported healthy again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Timeout | Error::Disconnected)
    }
}

/// JSON-RPC 2.0 error object as it appears on the wire.
///
/// # Examples
///
/// ```
/// use playlink_core::error::RpcError;
///
/// let err = RpcError::new(-32001, "Invalid media URL");
/// assert_eq!(err.to_string(), "[-32001] Invalid media URL");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    /// Numeric error code. Standard JSON-RPC codes are negative; the player
    /// protocol adds its own in the -32000..=-32099 range.
    pub code: i32,
    /// Human-readable message
    pub message: String,
    /// Optional structured detail
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    /// Create an error with code and message.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Attach structured detail data.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Standard "method not found" error (-32601), phrased the way player
    /// servers phrase it.
    pub fn method_not_found(method: &str) -> Self {
        Self::new(-32601, format!("Method {method} not found"))
    }

    /// Standard "invalid params" error (-32602).
    pub fn invalid_params(detail: impl Into<String>) -> Self {
        Self::new(-32602, format!("Invalid params: {}", detail.into()))
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for RpcError {}
