//! Pending-call bookkeeping
//!
//! Every outbound call parks a oneshot sender here under its numeric id.
//! The demux loop completes entries as responses arrive, in whatever order
//! the server answers. Ids are allocated from a counter that starts at 1
//! and is reset for every new connection, matching the per-session id
//! scoping of the protocol.

use playlink_core::{Error, Result, RpcResponse};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, Mutex};

/// One call waiting for its response.
struct PendingCall {
    method: String,
    submitted_at: Instant,
    tx: oneshot::Sender<Result<RpcResponse>>,
}

/// Table of in-flight calls plus the session id counter.
///
/// Clones share the same table, so the client API surface and the
/// connection supervisor see one view of what is outstanding.
#[derive(Clone, Default)]
pub struct Correlator {
    pending: Arc<Mutex<HashMap<u64, PendingCall>>>,
    counter: Arc<AtomicU64>,
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next call id. The first id of a session is 1.
    pub fn next_id(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Restart id allocation at 1. Called when a new connection is
    /// established; the pending table must already be empty by then.
    pub fn reset_ids(&self) {
        self.counter.store(0, Ordering::SeqCst);
    }

    /// Park a call and hand back the receiver its response will arrive on.
    ///
    /// A call that raced the disconnect teardown can still hold an id from
    /// the previous session when it lands here after the counter reset. The
    /// displaced entry belongs to a connection that is gone, so it is failed
    /// with `Disconnected` rather than silently dropped.
    pub async fn register(&self, id: u64, method: &str) -> oneshot::Receiver<Result<RpcResponse>> {
        let (tx, rx) = oneshot::channel();
        let call = PendingCall {
            method: method.to_string(),
            submitted_at: Instant::now(),
            tx,
        };
        if let Some(displaced) = self.pending.lock().await.insert(id, call) {
            tracing::warn!(
                id,
                method = %displaced.method,
                "reused call id displaced a stale pending call"
            );
            let _ = displaced.tx.send(Err(Error::Disconnected));
        }
        rx
    }

    /// Deliver a response to the call that is waiting for it.
    ///
    /// Returns false when nothing matches: a non-integer id, an id we never
    /// allocated, or a call already timed out and abandoned. The caller is
    /// expected to log and move on.
    pub async fn complete(&self, response: RpcResponse) -> bool {
        let Some(id) = response.id.as_call_id() else {
            return false;
        };
        let Some(call) = self.pending.lock().await.remove(&id) else {
            return false;
        };
        tracing::trace!(
            id,
            method = %call.method,
            elapsed_ms = call.submitted_at.elapsed().as_millis() as u64,
            "call completed"
        );
        // The receiver may have given up in the meantime; that is fine.
        let _ = call.tx.send(Ok(response));
        true
    }

    /// Drop a call that will no longer be waited on, typically after its
    /// timeout fired. Returns the method name for logging.
    pub async fn abandon(&self, id: u64) -> Option<String> {
        self.pending
            .lock()
            .await
            .remove(&id)
            .map(|call| call.method)
    }

    /// Fail every outstanding call with the same error. Used when the
    /// connection drops or the client shuts down. Returns how many calls
    /// were failed.
    pub async fn fail_all(&self, error: Error) -> usize {
        let drained: Vec<(u64, PendingCall)> = self.pending.lock().await.drain().collect();
        let count = drained.len();
        for (id, call) in drained {
            tracing::debug!(
                id,
                method = %call.method,
                waited_ms = call.submitted_at.elapsed().as_millis() as u64,
                "failing pending call"
            );
            let _ = call.tx.send(Err(error.clone()));
        }
        count
    }

    /// Number of calls currently awaiting a response.
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Age of the oldest outstanding call, if any. Diagnostic only.
    pub async fn oldest_pending(&self) -> Option<Duration> {
        self.pending
            .lock()
            .await
            .values()
            .map(|call| call.submitted_at.elapsed())
            .max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use playlink_core::envelope::{Id, RpcResponse};
    use serde_json::json;

    #[tokio::test]
    async fn ids_start_at_one_and_increment() {
        let correlator = Correlator::new();
        assert_eq!(correlator.next_id(), 1);
        assert_eq!(correlator.next_id(), 2);
        assert_eq!(correlator.next_id(), 3);
    }

    #[tokio::test]
    async fn reset_restarts_allocation() {
        let correlator = Correlator::new();
        correlator.next_id();
        correlator.next_id();
        correlator.reset_ids();
        assert_eq!(correlator.next_id(), 1);
    }

    #[tokio::test]
    async fn complete_delivers_response() {
        let correlator = Correlator::new();
        let id = correlator.next_id();
        let rx = correlator.register(id, "getState").await;

        let delivered = correlator
            .complete(RpcResponse::success(json!({"state": "idle"}), id))
            .await;
        assert!(delivered);

        let response = rx.await.unwrap().unwrap();
        assert_eq!(response.result, Some(json!({"state": "idle"})));
        assert_eq!(correlator.pending_count().await, 0);
    }

    #[tokio::test]
    async fn completes_out_of_order() {
        let correlator = Correlator::new();
        let first = correlator.next_id();
        let second = correlator.next_id();
        let rx_first = correlator.register(first, "play").await;
        let rx_second = correlator.register(second, "pause").await;

        assert!(correlator.complete(RpcResponse::success(json!(2), second)).await);
        assert!(correlator.complete(RpcResponse::success(json!(1), first)).await);

        assert_eq!(rx_first.await.unwrap().unwrap().result, Some(json!(1)));
        assert_eq!(rx_second.await.unwrap().unwrap().result, Some(json!(2)));
    }

    #[tokio::test]
    async fn unknown_id_is_reported() {
        let correlator = Correlator::new();
        let delivered = correlator.complete(RpcResponse::success(json!(true), 99u64)).await;
        assert!(!delivered);
    }

    #[tokio::test]
    async fn non_integer_id_is_reported() {
        let correlator = Correlator::new();
        let response = RpcResponse::success(json!(true), Id::String("abc".to_string()));
        assert!(!correlator.complete(response).await);
    }

    #[tokio::test]
    async fn abandon_removes_entry() {
        let correlator = Correlator::new();
        let id = correlator.next_id();
        let rx = correlator.register(id, "seek").await;

        assert_eq!(correlator.abandon(id).await.as_deref(), Some("seek"));
        assert_eq!(correlator.pending_count().await, 0);

        // A response landing after abandonment finds nothing.
        assert!(!correlator.complete(RpcResponse::success(json!(true), id)).await);
        assert!(rx.await.is_err());
    }

    #[tokio::test]
    async fn reused_id_fails_the_displaced_call() {
        let correlator = Correlator::new();
        let stale_id = correlator.next_id();
        let rx_stale = correlator.register(stale_id, "play").await;

        // A new session reuses the id before the stale call resolved.
        correlator.reset_ids();
        let fresh_id = correlator.next_id();
        assert_eq!(fresh_id, stale_id);
        let rx_fresh = correlator.register(fresh_id, "pause").await;

        assert!(matches!(rx_stale.await.unwrap(), Err(Error::Disconnected)));
        assert_eq!(correlator.pending_count().await, 1);

        // The fresh call owns the id and correlates normally.
        assert!(correlator.complete(RpcResponse::success(json!(true), fresh_id)).await);
        assert_eq!(rx_fresh.await.unwrap().unwrap().result, Some(json!(true)));
    }

    #[tokio::test]
    async fn fail_all_drains_everything() {
        let correlator = Correlator::new();
        let a = correlator.next_id();
        let b = correlator.next_id();
        let rx_a = correlator.register(a, "play").await;
        let rx_b = correlator.register(b, "stop").await;

        assert_eq!(correlator.fail_all(Error::Disconnected).await, 2);
        assert_eq!(correlator.pending_count().await, 0);

        assert!(matches!(rx_a.await.unwrap(), Err(Error::Disconnected)));
        assert!(matches!(rx_b.await.unwrap(), Err(Error::Disconnected)));
    }

    #[tokio::test]
    async fn oldest_pending_reports_age() {
        let correlator = Correlator::new();
        assert!(correlator.oldest_pending().await.is_none());

        let id = correlator.next_id();
        let _rx = correlator.register(id, "getState").await;
        assert!(correlator.oldest_pending().await.is_some());
    }
}
