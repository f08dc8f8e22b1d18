//! Core protocol types for playlink
//!
//! This crate holds everything about the media-player wire protocol that is
//! independent of any particular transport or runtime:
//!
//! - [`envelope`]: JSON-RPC 2.0 request, response and notification frames
//! - [`codec`]: frame encoding and inbound classification
//! - [`player`]: the player domain model and payload normalization
//! - [`protocol`]: method names, error codes and endpoint constants
//! - [`error`]: the shared error taxonomy
//! - [`observability`]: optional logging setup for hosts and tests
//!
//! The connection engine lives in `playlink-client`; this crate compiles
//! without tokio and is usable from mock servers and tooling as well.

pub mod codec;
pub mod envelope;
pub mod error;
pub mod observability;
pub mod player;
pub mod protocol;

pub use codec::{decode_inbound, encode};
pub use envelope::{Id, InboundFrame, RpcNotification, RpcRequest, RpcResponse};
pub use error::{Error, Result, RpcError};
pub use observability::{init_logging, LogConfig};
pub use player::{
    LoadOptions, MediaInfo, MediaType, PlaybackState, PlayerError, PlayerSnapshot, PlayerState,
};
pub use protocol::DEFAULT_PORT;
