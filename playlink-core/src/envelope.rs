//! JSON-RPC 2.0 envelopes exchanged with a media-player server
//!
//! Everything on the wire is one of three frames: a [`RpcRequest`] the client
//! sends, a [`RpcResponse`] the server returns for it, or a
//! [`RpcNotification`] the server pushes on its own. Batches (top-level
//! arrays) and server-to-client requests are not part of this protocol;
//! [`crate::codec::decode_inbound`] rejects them.
//!
//! Outbound call ids are always integers, but inbound frames are parsed
//! leniently: [`Id`] accepts the string and null forms the JSON-RPC spec
//! allows, so a response from an unusual server still correlates (or is
//! cleanly reported as uncorrelated) instead of failing to parse.

use crate::error::{Error, Result, RpcError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Protocol version string carried by every frame.
pub const VERSION: &str = "2.0";

/// A JSON-RPC 2.0 id value.
///
/// This client only ever sends [`Id::Number`], allocated from a per-session
/// counter. The other forms exist so inbound frames with non-integer ids can
/// still be decoded and logged rather than dropped as parse errors.
///
/// # Examples
///
/// ```
/// use playlink_core::envelope::Id;
///
/// let id = Id::from(7u64);
/// assert_eq!(id.as_call_id(), Some(7));
/// assert_eq!(Id::String("abc".into()).as_call_id(), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
    /// String identifier
    String(String),
    /// Numeric identifier
    Number(i64),
    /// Explicit null id
    Null,
}

impl Id {
    /// Interpret this id as one of our own call ids.
    ///
    /// Returns `None` for strings, nulls and negative numbers, none of which
    /// the client ever allocates.
    pub fn as_call_id(&self) -> Option<u64> {
        match self {
            Id::Number(n) if *n >= 0 => Some(*n as u64),
            _ => None,
        }
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Id::String(s) => write!(f, "{s}"),
            Id::Number(n) => write!(f, "{n}"),
            Id::Null => write!(f, "null"),
        }
    }
}

impl From<u64> for Id {
    fn from(n: u64) -> Self {
        // Session counters start at 1 and never get anywhere near i64::MAX.
        Id::Number(n as i64)
    }
}

impl From<i64> for Id {
    fn from(n: i64) -> Self {
        Id::Number(n)
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Id::String(s.to_string())
    }
}

impl From<String> for Id {
    fn from(s: String) -> Self {
        Id::String(s)
    }
}

/// A method call sent to the server.
///
/// # Examples
///
/// ```
/// use playlink_core::envelope::RpcRequest;
/// use serde_json::json;
///
/// let req = RpcRequest::new("setVolume", Some(json!({"level": 0.5})), 3u64);
/// let wire = serde_json::to_string(&req).unwrap();
/// assert!(wire.contains("\"jsonrpc\":\"2.0\""));
/// assert!(wire.contains("\"id\":3"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Always "2.0"
    pub jsonrpc: String,
    /// Method name, e.g. `"play"` or `"getState"`
    pub method: String,
    /// Call parameters, omitted from the wire when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// Correlation id for the matching response
    pub id: Id,
}

impl RpcRequest {
    /// Create a request for `method` with the given call id.
    pub fn new(method: impl Into<String>, params: Option<Value>, id: impl Into<Id>) -> Self {
        Self {
            jsonrpc: VERSION.to_string(),
            method: method.into(),
            params,
            id: id.into(),
        }
    }
}

/// A server push. Identical to a request on the wire except it carries no id
/// and expects no reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcNotification {
    /// Always "2.0"
    pub jsonrpc: String,
    /// Notification name, e.g. `"stateChanged"`
    pub method: String,
    /// Payload, omitted from the wire when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl RpcNotification {
    /// Create a notification. Mostly useful in tests and mock servers.
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: VERSION.to_string(),
            method: method.into(),
            params,
        }
    }
}

/// The server's answer to a [`RpcRequest`], carrying either a result or an
/// error, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    /// Always "2.0"
    pub jsonrpc: String,
    /// Result payload on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error object on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    /// Id of the request being answered
    pub id: Id,
}

impl RpcResponse {
    /// Create a success response.
    pub fn success(result: Value, id: impl Into<Id>) -> Self {
        Self {
            jsonrpc: VERSION.to_string(),
            result: Some(result),
            error: None,
            id: id.into(),
        }
    }

    /// Create an error response.
    pub fn error(error: RpcError, id: impl Into<Id>) -> Self {
        Self {
            jsonrpc: VERSION.to_string(),
            result: None,
            error: Some(error),
            id: id.into(),
        }
    }

    /// True if this response carries an error object.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Collapse the response into the caller-facing result.
    ///
    /// An error object becomes [`Error::Remote`]; otherwise the result value
    /// is returned, with an absent result read as JSON `null`.
    pub fn into_result(self) -> Result<Value> {
        if let Some(error) = self.error {
            return Err(Error::Remote(error));
        }
        Ok(self.result.unwrap_or(Value::Null))
    }
}

/// A classified inbound frame, produced by [`crate::codec::decode_inbound`].
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// Reply to one of our calls
    Response(RpcResponse),
    /// Unsolicited server push
    Notification(RpcNotification),
}

impl InboundFrame {
    /// True if this frame is a response to a call.
    pub fn is_response(&self) -> bool {
        matches!(self, InboundFrame::Response(_))
    }

    /// True if this frame is a server push.
    pub fn is_notification(&self) -> bool {
        matches!(self, InboundFrame::Notification(_))
    }
}
