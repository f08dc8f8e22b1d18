//! Mirrored player state
//!
//! The engine keeps the last known server state in a watch channel so any
//! number of host tasks can observe it without polling the server. Updates
//! are applied atomically and coalesced: a push that changes nothing does
//! not wake subscribers and does not advance the revision counter.

use playlink_core::player::{PlaybackState, PlayerSnapshot, PlayerState};
use tokio::sync::watch;

/// Holds the mirror and hands out subscriptions.
///
/// Clones share the same channel. The initial snapshot is a default player
/// marked stale at revision 0, replaced by the first resync.
#[derive(Clone)]
pub struct StateStore {
    tx: watch::Sender<PlayerSnapshot>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(PlayerSnapshot::default());
        Self { tx }
    }

    /// Replace the mirrored state with a fresh server report.
    ///
    /// Returns true if subscribers were notified. A report identical to the
    /// current non-stale mirror is coalesced away; the same report while
    /// stale still counts as a change because it re-establishes freshness.
    pub fn update(&self, player: PlayerState) -> bool {
        self.tx.send_if_modified(|snap| {
            if !snap.stale && snap.player == player {
                return false;
            }
            snap.player = player;
            snap.stale = false;
            snap.revision += 1;
            true
        })
    }

    /// Flag the mirror as possibly behind the server. Idempotent.
    pub fn mark_stale(&self) -> bool {
        self.tx.send_if_modified(|snap| {
            if snap.stale {
                return false;
            }
            snap.stale = true;
            snap.revision += 1;
            true
        })
    }

    /// Fold an asynchronous player error into the mirror: playback has
    /// stopped, media is gone, and the error text is retained. Volume and
    /// mute settings are kept since the server did not report them changed.
    pub fn apply_error(&self, message: &str) {
        self.tx.send_if_modified(|snap| {
            let mut player = snap.player.clone();
            player.state = PlaybackState::Error;
            player.media = None;
            player.error = Some(message.to_string());

            if !snap.stale && snap.player == player {
                return false;
            }
            snap.player = player;
            snap.stale = false;
            snap.revision += 1;
            true
        });
    }

    /// Current snapshot by value.
    pub fn get(&self) -> PlayerSnapshot {
        self.tx.borrow().clone()
    }

    /// Subscribe to snapshot changes.
    pub fn subscribe(&self) -> watch::Receiver<PlayerSnapshot> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use playlink_core::player::MediaInfo;

    fn playing(url: &str) -> PlayerState {
        PlayerState {
            state: PlaybackState::Playing,
            media: Some(MediaInfo {
                url: url.to_string(),
                media_type: None,
                duration: 100.0,
                position: 0.0,
                title: None,
                artist: None,
                album: None,
                thumbnail: None,
            }),
            volume: 1.0,
            muted: false,
            error: None,
        }
    }

    #[test]
    fn first_update_clears_stale_and_bumps_revision() {
        let store = StateStore::new();
        assert!(store.get().stale);

        assert!(store.update(PlayerState::default()));

        let snap = store.get();
        assert!(!snap.stale);
        assert_eq!(snap.revision, 1);
    }

    #[test]
    fn identical_update_is_coalesced() {
        let store = StateStore::new();
        store.update(playing("http://h/a.mp3"));
        let before = store.get().revision;

        assert!(!store.update(playing("http://h/a.mp3")));
        assert_eq!(store.get().revision, before);

        assert!(store.update(playing("http://h/b.mp3")));
        assert_eq!(store.get().revision, before + 1);
    }

    #[test]
    fn identical_update_while_stale_still_counts() {
        let store = StateStore::new();
        store.update(playing("http://h/a.mp3"));
        store.mark_stale();
        let before = store.get().revision;

        assert!(store.update(playing("http://h/a.mp3")));

        let snap = store.get();
        assert!(!snap.stale);
        assert_eq!(snap.revision, before + 1);
    }

    #[test]
    fn mark_stale_is_idempotent() {
        let store = StateStore::new();
        store.update(PlayerState::default());
        let before = store.get().revision;

        assert!(store.mark_stale());
        assert!(!store.mark_stale());
        assert_eq!(store.get().revision, before + 1);
    }

    #[test]
    fn apply_error_replaces_playback_keeps_settings() {
        let store = StateStore::new();
        let mut state = playing("http://h/a.mp3");
        state.volume = 0.4;
        state.muted = true;
        store.update(state);

        store.apply_error("Network error");

        let snap = store.get();
        assert_eq!(snap.player.state, PlaybackState::Error);
        assert!(snap.player.media.is_none());
        assert_eq!(snap.player.error.as_deref(), Some("Network error"));
        assert_eq!(snap.player.volume, 0.4);
        assert!(snap.player.muted);
        assert!(!snap.stale);
    }

    #[tokio::test]
    async fn subscribers_see_updates() {
        let store = StateStore::new();
        let mut rx = store.subscribe();

        store.update(playing("http://h/a.mp3"));

        rx.changed().await.unwrap();
        let snap = rx.borrow_and_update().clone();
        assert_eq!(snap.player.state, PlaybackState::Playing);
        assert_eq!(snap.revision, 1);
    }

    #[tokio::test]
    async fn coalesced_update_does_not_wake_subscribers() {
        let store = StateStore::new();
        store.update(playing("http://h/a.mp3"));

        let mut rx = store.subscribe();
        rx.mark_unchanged();

        store.update(playing("http://h/a.mp3"));
        assert!(!rx.has_changed().unwrap());
    }
}
