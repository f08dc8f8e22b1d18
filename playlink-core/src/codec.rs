//! Frame encoding and inbound classification
//!
//! One text frame carries exactly one JSON-RPC object. [`decode_inbound`]
//! sorts inbound frames into responses and notifications and rejects
//! everything else the protocol forbids: batches, server-to-client requests,
//! and non-object payloads. Classification happens once, here, so the demux
//! loop downstream only matches on [`InboundFrame`].

use crate::envelope::{InboundFrame, RpcNotification, RpcResponse};
use crate::error::{Error, Result};
use serde::Serialize;
use serde_json::Value;

/// Serialize an outbound frame to its wire form.
pub fn encode<T: Serialize>(frame: &T) -> Result<String> {
    serde_json::to_string(frame).map_err(|e| Error::Protocol(format!("encode failed: {e}")))
}

/// Classify and decode a single inbound text frame.
///
/// A frame with an `id` and a `result` or `error` member is a response;
/// a frame with a `method` and no `id` is a notification. Anything else is a
/// protocol violation and the caller is expected to log and drop it.
///
/// # Examples
///
/// ```
/// use playlink_core::codec::decode_inbound;
///
/// let frame = decode_inbound(r#"{"jsonrpc":"2.0","result":true,"id":1}"#).unwrap();
/// assert!(frame.is_response());
///
/// let frame = decode_inbound(r#"{"jsonrpc":"2.0","method":"stateChanged","params":{}}"#).unwrap();
/// assert!(frame.is_notification());
/// ```
pub fn decode_inbound(data: &str) -> Result<InboundFrame> {
    let value: Value =
        serde_json::from_str(data).map_err(|e| Error::Protocol(format!("invalid JSON: {e}")))?;

    if value.is_array() {
        return Err(Error::Protocol("batch frames are not supported".to_string()));
    }

    let obj = value
        .as_object()
        .ok_or_else(|| Error::Protocol("frame is not a JSON object".to_string()))?;

    let has_id = obj.contains_key("id");
    let has_outcome = obj.contains_key("result") || obj.contains_key("error");
    let has_method = obj.contains_key("method");

    if has_id && has_outcome {
        let response: RpcResponse = serde_json::from_value(value)
            .map_err(|e| Error::Protocol(format!("malformed response: {e}")))?;
        return Ok(InboundFrame::Response(response));
    }

    if has_method && !has_id {
        let notification: RpcNotification = serde_json::from_value(value)
            .map_err(|e| Error::Protocol(format!("malformed notification: {e}")))?;
        return Ok(InboundFrame::Notification(notification));
    }

    if has_method {
        // A method with an id is the server trying to call us.
        return Err(Error::Protocol(
            "unexpected inbound request frame".to_string(),
        ));
    }

    Err(Error::Protocol(
        "frame is neither a response nor a notification".to_string(),
    ))
}
