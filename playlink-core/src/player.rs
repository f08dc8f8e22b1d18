//! Player domain model
//!
//! [`PlayerState`] is the client's picture of the remote player. Server
//! payloads arrive via [`PlayerState::from_value`], which parses leniently
//! and then normalizes, so the rest of the engine can rely on a few hard
//! rules:
//!
//! - `media` is `Some` only while playing or paused
//! - `error` is `Some` exactly when `state` is [`PlaybackState::Error`]
//! - `volume` is finite and within `0.0..=1.0`
//! - media `position` and `duration` are finite and non-negative
//!
//! Real servers bend the shape in small ways. The common reference server
//! reports a `media` object with a `null` url while idle, omits `muted`
//! entirely, and third-party servers have been seen inventing media type
//! strings. All of that degrades gracefully here instead of failing the
//! whole payload.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Playback state reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    /// Nothing loaded
    #[default]
    Idle,
    /// Media loaded and advancing
    Playing,
    /// Media loaded, position frozen
    Paused,
    /// Playback failed; see [`PlayerState::error`]
    Error,
}

impl PlaybackState {
    /// Wire spelling of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
            PlaybackState::Error => "error",
        }
    }

    /// True for the states in which media is loaded.
    pub fn has_media(&self) -> bool {
        matches!(self, PlaybackState::Playing | PlaybackState::Paused)
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Media type identifiers the protocol defines.
///
/// The set is closed. Servers advertising anything else are tolerated by
/// parsing code (the unknown type is dropped, the media kept), but the
/// client never sends a type outside this list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Video,
    Music,
    Playlist,
    Tvshow,
    Episode,
    Channel,
    Movie,
    Podcast,
    Url,
    Image,
    Game,
}

impl MediaType {
    /// Wire spelling of the type.
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Video => "video",
            MediaType::Music => "music",
            MediaType::Playlist => "playlist",
            MediaType::Tvshow => "tvshow",
            MediaType::Episode => "episode",
            MediaType::Channel => "channel",
            MediaType::Movie => "movie",
            MediaType::Podcast => "podcast",
            MediaType::Url => "url",
            MediaType::Image => "image",
            MediaType::Game => "game",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "video" => Ok(MediaType::Video),
            "music" => Ok(MediaType::Music),
            "playlist" => Ok(MediaType::Playlist),
            "tvshow" => Ok(MediaType::Tvshow),
            "episode" => Ok(MediaType::Episode),
            "channel" => Ok(MediaType::Channel),
            "movie" => Ok(MediaType::Movie),
            "podcast" => Ok(MediaType::Podcast),
            "url" => Ok(MediaType::Url),
            "image" => Ok(MediaType::Image),
            "game" => Ok(MediaType::Game),
            other => Err(Error::Protocol(format!("unknown media type: {other}"))),
        }
    }
}

/// Description of the currently loaded media.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaInfo {
    /// Source the media was loaded from
    pub url: String,
    /// Declared type, if the server sent one we recognize
    pub media_type: Option<MediaType>,
    /// Total length in seconds, `0.0` when unknown (e.g. live streams)
    pub duration: f64,
    /// Current playback offset in seconds
    pub position: f64,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub thumbnail: Option<String>,
}

/// Full snapshot of the remote player.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerState {
    /// Current playback state
    pub state: PlaybackState,
    /// Loaded media, present only while playing or paused
    pub media: Option<MediaInfo>,
    /// Volume level in `0.0..=1.0`
    pub volume: f64,
    /// Mute flag; servers that never report it read as unmuted
    pub muted: bool,
    /// Failure description, present exactly when `state` is `Error`
    pub error: Option<String>,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            state: PlaybackState::Idle,
            media: None,
            volume: 1.0,
            muted: false,
            error: None,
        }
    }
}

/// Raw wire shape of a state payload. Everything beyond `state` is optional
/// and nulls are tolerated wherever servers have been seen sending them.
#[derive(Debug, Deserialize)]
struct WireState {
    state: PlaybackState,
    #[serde(default)]
    media: Option<WireMedia>,
    #[serde(default)]
    volume: Option<f64>,
    #[serde(default)]
    muted: Option<bool>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireMedia {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    media_type: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    position: Option<f64>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    artist: Option<String>,
    #[serde(default)]
    album: Option<String>,
    #[serde(default)]
    thumbnail: Option<String>,
}

impl WireMedia {
    /// A media object without a url string means nothing is loaded.
    fn into_media(self) -> Option<MediaInfo> {
        let url = self.url?;
        let media_type = self.media_type.and_then(|raw| match raw.parse() {
            Ok(t) => Some(t),
            Err(_) => {
                tracing::debug!(media_type = %raw, "dropping unrecognized media type");
                None
            }
        });
        Some(MediaInfo {
            url,
            media_type,
            duration: self.duration.unwrap_or(0.0),
            position: self.position.unwrap_or(0.0),
            title: self.title,
            artist: self.artist,
            album: self.album,
            thumbnail: self.thumbnail,
        })
    }
}

impl PlayerState {
    /// Parse a server state payload, as carried by `getState` results and
    /// `stateChanged` notifications.
    ///
    /// Fails only when the payload is structurally unusable (not an object,
    /// unknown `state` value, wrong field types). Recoverable oddities are
    /// normalized away instead.
    ///
    /// # Examples
    ///
    /// ```
    /// use playlink_core::player::{PlaybackState, PlayerState};
    /// use serde_json::json;
    ///
    /// let state = PlayerState::from_value(json!({
    ///     "state": "playing",
    ///     "media": {"url": "http://h/a.mp3", "media_type": "music",
    ///               "duration": 180.0, "position": 4.5},
    ///     "volume": 0.8,
    ///     "muted": false,
    /// })).unwrap();
    ///
    /// assert_eq!(state.state, PlaybackState::Playing);
    /// assert_eq!(state.media.unwrap().url, "http://h/a.mp3");
    /// ```
    pub fn from_value(value: Value) -> Result<Self> {
        let wire: WireState = serde_json::from_value(value)
            .map_err(|e| Error::Protocol(format!("malformed player state: {e}")))?;

        let state = PlayerState {
            state: wire.state,
            media: wire.media.and_then(WireMedia::into_media),
            volume: wire.volume.unwrap_or(1.0),
            muted: wire.muted.unwrap_or(false),
            error: wire.error,
        };
        Ok(state.normalized())
    }

    /// Enforce the documented field invariants on a parsed state.
    pub fn normalized(mut self) -> Self {
        if !self.state.has_media() {
            self.media = None;
        }
        if self.state == PlaybackState::Error {
            if self.error.is_none() {
                self.error = Some("unknown error".to_string());
            }
        } else {
            self.error = None;
        }
        if !self.volume.is_finite() {
            self.volume = 1.0;
        }
        self.volume = self.volume.clamp(0.0, 1.0);
        if let Some(media) = self.media.as_mut() {
            if !media.duration.is_finite() || media.duration < 0.0 {
                media.duration = 0.0;
            }
            if !media.position.is_finite() || media.position < 0.0 {
                media.position = 0.0;
            }
        }
        self
    }
}

/// Options for the `load` call.
///
/// Field spellings follow the wire protocol, which mixes conventions:
/// `media_type` is snake case, `startPosition` camel case.
///
/// # Examples
///
/// ```
/// use playlink_core::player::{LoadOptions, MediaType};
///
/// let opts = LoadOptions::default()
///     .with_media_type(MediaType::Music)
///     .with_start_position(30.0);
/// assert_eq!(opts.media_type, Some(MediaType::Music));
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct LoadOptions {
    /// Hint for how the server should present the media
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<MediaType>,
    /// Initial playback offset in seconds
    #[serde(rename = "startPosition", skip_serializing_if = "Option::is_none")]
    pub start_position: Option<f64>,
    /// Whether playback starts immediately; servers default this to true
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autoplay: Option<bool>,
}

impl LoadOptions {
    pub fn with_media_type(mut self, media_type: MediaType) -> Self {
        self.media_type = Some(media_type);
        self
    }

    pub fn with_start_position(mut self, seconds: f64) -> Self {
        self.start_position = Some(seconds);
        self
    }

    pub fn with_autoplay(mut self, autoplay: bool) -> Self {
        self.autoplay = Some(autoplay);
        self
    }
}

/// Application-level error pushed by the server as an `error` notification.
///
/// Distinct from a call failure: these arrive unprompted when playback
/// breaks on its own, e.g. a stream dying mid-play.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerError {
    /// Application error code, e.g. -32002 for a network failure
    pub code: i32,
    /// Human-readable description
    pub message: String,
}

impl fmt::Display for PlayerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// What the client's state mirror hands out: the last known player state
/// plus enough bookkeeping for hosts to reason about freshness.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerSnapshot {
    /// Last known player state
    pub player: PlayerState,
    /// True while the mirror may be behind the server: before the first
    /// sync, and from disconnect until the post-reconnect resync lands
    pub stale: bool,
    /// Bumped on every accepted change, including stale transitions
    pub revision: u64,
}

impl Default for PlayerSnapshot {
    fn default() -> Self {
        Self {
            player: PlayerState::default(),
            stale: true,
            revision: 0,
        }
    }
}
