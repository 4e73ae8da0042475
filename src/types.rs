use serde::{Deserialize, Serialize};

/// Client credentials shipped alongside the app. Loaded once, immutable for
/// the process lifetime.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub client_id: String,
    pub redirect_uri: String,
}

/// Mirror of the provider token response. Round-trips through the on-disk
/// token cache unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenInfo {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Minimal comparable summary of current playback. Change detection is plain
/// value comparison against the previous snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackSnapshot {
    pub is_playing: bool,
    pub track_name: String,
    pub artist_name: String,
}

/// What a playback query saw. A playing context can carry no track item
/// (ads, transitions), which the UI reports differently from paused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackState {
    /// No playback context on any device.
    Idle,
    Track(PlaybackSnapshot),
    NoItem { is_playing: bool },
}

impl PlaybackState {
    pub fn is_playing(&self) -> bool {
        match self {
            PlaybackState::Idle => false,
            PlaybackState::Track(snapshot) => snapshot.is_playing,
            PlaybackState::NoItem { is_playing } => *is_playing,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayIcon {
    Play,
    Pause,
}

/// User or hotkey intents, dispatched through an explicit handler table
/// instead of lambda-bound button callbacks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    PlayPause,
    NextTrack,
    PrevTrack,
    VolumeUp,
    VolumeDown,
    SetVolume(f32),
    Connect,
    Disconnect,
    Quit,
}

/// Events the embedding UI consumes. Snapshot-derived events fire only when
/// the underlying value actually changed, never once per poll.
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    Status(String),
    /// The authorization URL to open in the user's browser.
    AuthorizeUrl(String),
    NowPlaying(PlaybackSnapshot),
    TrackCleared,
    PlayIcon(PlayIcon),
    Volume(f32),
    Notice(String),
    Connection(ConnectionState),
}

/// Widget-wide mutable state, owned by the controller and touched only from
/// the single event-loop task.
#[derive(Debug, Default)]
pub struct WidgetState {
    pub connection: ConnectionState,
    pub process_running: bool,
    pub last_snapshot: Option<PlaybackSnapshot>,
    pub last_status: Option<String>,
    pub last_icon: Option<PlayIcon>,
}
