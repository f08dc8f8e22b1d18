//! Playlink - remote media-player control over JSON-RPC 2.0 / WebSocket
//!
//! This is the main convenience crate that re-exports all playlink
//! sub-crates. Use this crate if you want a single dependency that provides
//! the full client engine plus the wire-level types.
//!
//! # Architecture
//!
//! Playlink is organized into modular crates:
//!
//! - **playlink-core**: JSON-RPC envelopes, codec, error taxonomy, player model
//! - **playlink-client**: WebSocket client with correlation, state mirroring
//!   and automatic reconnection
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use playlink::PlaylinkClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = PlaylinkClient::connect("ws://192.168.1.50:9300/ws").await?;
//!
//!     client.load("http://example.com/song.mp3", Default::default()).await?;
//!     client.set_volume(0.4).await?;
//!
//!     let mut states = client.subscribe();
//!     while states.changed().await.is_ok() {
//!         let snapshot = states.borrow_and_update().clone();
//!         println!("player: {:?} (stale: {})", snapshot.player.state, snapshot.stale);
//!     }
//!     Ok(())
//! }
//! ```

// Re-export all public APIs from sub-crates
// This allows users to access everything through `playlink::` prefix
pub use playlink_client as client;
pub use playlink_core as core;

// Convenience re-exports of the most commonly used types
// This avoids needing to write `playlink::client::PlaylinkClient`
pub use playlink_client::{ClientBuilder, PlaylinkClient};
pub use playlink_core::player::{LoadOptions, MediaType, PlayerSnapshot, PlayerState};
pub use playlink_core::Error;
