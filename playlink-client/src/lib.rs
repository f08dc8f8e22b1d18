//! WebSocket client engine for remote media-player servers
//!
//! Maintains one persistent JSON-RPC 2.0 connection per client: calls go
//! out with correlation ids and per-call timeouts, server pushes keep a
//! local mirror of the player state, and a supervisor task reconnects with
//! backoff when the link drops.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use playlink_client::PlaylinkClient;
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
//!         let snap = states.borrow_and_update().clone();
//!         println!("{:?} (stale: {})", snap.player.state, snap.stale);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Tuning
//!
//! ```rust,no_run
//! use playlink_client::{ClientBuilder, ResyncFailure};
//! use playlink_client::reconnect::FixedDelay;
//! use std::time::Duration;
//!
//! # async fn demo() -> Result<(), playlink_core::Error> {
//! let client = ClientBuilder::for_host("192.168.1.50")
//!     .with_call_timeout(Duration::from_secs(5))
//!     .with_reconnect(FixedDelay::new(Duration::from_secs(1)))
//!     .on_resync_failure(ResyncFailure::KeepStale)
//!     .connect()
//!     .await?;
//! # drop(client);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod client_builder;
pub mod connection;
pub mod correlator;
pub mod metrics;
pub mod reconnect;
pub mod router;
pub mod store;
pub mod transport;

pub use client::PlaylinkClient;
pub use client_builder::ClientBuilder;
pub use connection::{ConnectionMonitor, ConnectionState, ResyncFailure};
pub use metrics::ClientMetrics;
pub use reconnect::{ExponentialBackoff, FixedDelay, NoReconnect, ReconnectPolicy};
pub use store::StateStore;
