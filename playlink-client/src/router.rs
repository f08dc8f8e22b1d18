//! Notification routing
//!
//! Server pushes fan out from here: `stateChanged` payloads feed the state
//! mirror, `error` pushes additionally reach host subscribers as events.
//! Anything malformed is logged and dropped; a bad push must never take
//! the connection down.

use crate::metrics::ClientMetrics;
use crate::store::StateStore;
use playlink_core::envelope::RpcNotification;
use playlink_core::player::{PlayerError, PlayerState};
use playlink_core::protocol::notifications;
use serde_json::Value;
use tokio::sync::broadcast;

/// Route one server push to its handler.
pub fn dispatch(
    note: RpcNotification,
    store: &StateStore,
    errors: &broadcast::Sender<PlayerError>,
    metrics: &ClientMetrics,
) {
    metrics.record_notification(&note.method);
    match note.method.as_str() {
        notifications::STATE_CHANGED => apply_state_changed(note.params, store),
        notifications::ERROR => apply_error(note.params, store, errors),
        other => tracing::debug!(method = %other, "ignoring unknown notification"),
    }
}

fn apply_state_changed(params: Option<Value>, store: &StateStore) {
    let Some(params) = params else {
        tracing::warn!("stateChanged push without params");
        return;
    };
    match PlayerState::from_value(params) {
        Ok(player) => {
            if store.update(player) {
                tracing::debug!("player state updated");
            }
        }
        Err(e) => tracing::warn!(error = %e, "dropping malformed stateChanged payload"),
    }
}

fn apply_error(params: Option<Value>, store: &StateStore, errors: &broadcast::Sender<PlayerError>) {
    let Some(params) = params else {
        tracing::warn!("error push without params");
        return;
    };
    let error: PlayerError = match serde_json::from_value(params) {
        Ok(error) => error,
        Err(e) => {
            tracing::warn!(error = %e, "dropping malformed error payload");
            return;
        }
    };

    tracing::warn!(code = error.code, message = %error.message, "player reported an error");
    store.apply_error(&error.message);
    // No subscribers is fine; the mirror already reflects the failure.
    let _ = errors.send(error);
}
