use log::{debug, error, info};

use crate::error::WidgetError;
use crate::spotify::PlaybackControl;
use crate::types::{Command, PlayIcon, UiEvent};

pub const VOLUME_STEP: f32 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKey {
    PlayPause,
    NextTrack,
    PrevTrack,
}

/// OS-level media-key injection seam.
pub trait MediaKeys {
    fn send(&self, key: MediaKey) -> Result<(), WidgetError>;
}

/// System master-volume seam, 0.0-1.0 scalar.
pub trait SystemVolume {
    fn set_master(&self, level: f32) -> Result<(), WidgetError>;
}

/// Everything a single dispatch needs to know about the world.
pub struct DispatchContext {
    pub process_running: bool,
    /// What the play button currently shows; ground truth for the optimistic
    /// toggle on the media-key fallback path.
    pub icon_shows_pause: bool,
    pub volume: f32,
}

/// Routes user and hotkey intents to either the playback API or an OS-level
/// fallback. API faults are logged and surfaced as a transient notice, never
/// retried and never fatal.
pub struct CommandDispatcher<K: MediaKeys, V: SystemVolume> {
    media_keys: K,
    volume: V,
}

impl<K: MediaKeys, V: SystemVolume> CommandDispatcher<K, V> {
    pub fn new(media_keys: K, volume: V) -> Self {
        Self { media_keys, volume }
    }

    pub async fn dispatch<P: PlaybackControl>(
        &self,
        cmd: Command,
        ctx: &DispatchContext,
        api: Option<&P>,
    ) -> Vec<UiEvent> {
        if !ctx.process_running {
            debug!("Ignoring {:?}: media process not running", cmd);
            return vec![UiEvent::Notice("Spotify is not running".into())];
        }

        match cmd {
            Command::PrevTrack => self.skip(api, SkipDirection::Previous).await,
            Command::NextTrack => self.skip(api, SkipDirection::Next).await,
            Command::PlayPause => self.toggle_playback(ctx, api).await,
            Command::VolumeUp => self.set_volume(ctx.volume + VOLUME_STEP),
            Command::VolumeDown => self.set_volume(ctx.volume - VOLUME_STEP),
            Command::SetVolume(level) => self.set_volume(level),
            // Session lifecycle is the controller's job, not a playback
            // intent.
            Command::Connect | Command::Disconnect | Command::Quit => Vec::new(),
        }
    }

    async fn skip<P: PlaybackControl>(
        &self,
        api: Option<&P>,
        direction: SkipDirection,
    ) -> Vec<UiEvent> {
        if let Some(api) = api {
            let result = match direction {
                SkipDirection::Next => api.next_track().await,
                SkipDirection::Previous => api.previous_track().await,
            };
            if let Err(e) = result {
                error!("Error skipping track: {}", e);
                return vec![UiEvent::Notice("Failed to skip track".into())];
            }
            Vec::new()
        } else {
            let key = match direction {
                SkipDirection::Next => MediaKey::NextTrack,
                SkipDirection::Previous => MediaKey::PrevTrack,
            };
            self.fallback_key(key)
        }
    }

    async fn toggle_playback<P: PlaybackControl>(
        &self,
        ctx: &DispatchContext,
        api: Option<&P>,
    ) -> Vec<UiEvent> {
        if let Some(api) = api {
            // Icon state is authoritative here: derived from the queried
            // playback state, not from what the button happened to show.
            let result = match api.current_playback().await {
                Ok(current) if current.is_playing() => {
                    api.pause_playback().await.map(|_| PlayIcon::Play)
                }
                Ok(_) => api.start_playback().await.map(|_| PlayIcon::Pause),
                Err(e) => Err(e),
            };
            match result {
                Ok(icon) => vec![UiEvent::PlayIcon(icon)],
                Err(e) => {
                    error!("Error toggling playback: {}", e);
                    vec![UiEvent::Notice("Failed to control playback".into())]
                }
            }
        } else {
            let mut events = self.fallback_key(MediaKey::PlayPause);
            // No ground truth on the OS channel; toggle optimistically.
            let next = if ctx.icon_shows_pause {
                PlayIcon::Play
            } else {
                PlayIcon::Pause
            };
            events.push(UiEvent::PlayIcon(next));
            events
        }
    }

    fn fallback_key(&self, key: MediaKey) -> Vec<UiEvent> {
        match self.media_keys.send(key) {
            Ok(()) => {
                info!("Sent media key {:?}", key);
                Vec::new()
            }
            Err(e) => {
                error!("Error sending media key {:?}: {}", key, e);
                vec![UiEvent::Notice("Failed to send media command".into())]
            }
        }
    }

    /// Volume always goes through the system endpoint, independent of
    /// authentication.
    fn set_volume(&self, level: f32) -> Vec<UiEvent> {
        let level = level.clamp(0.0, 1.0);
        match self.volume.set_master(level) {
            Ok(()) => {
                info!("Volume set to {:.0}%", level * 100.0);
                vec![UiEvent::Volume(level)]
            }
            Err(e) => {
                error!("Error setting volume: {}", e);
                vec![UiEvent::Notice("Failed to set volume".into())]
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum SkipDirection {
    Next,
    Previous,
}
