use std::time::Duration;

use log::{info, warn};

use crate::error::WidgetError;
use crate::types::{ConnectionState, PlayIcon, PlaybackState, UiEvent, WidgetState};

/// Poll cadence while playback is active.
pub const ACTIVE_POLL_INTERVAL: Duration = Duration::from_millis(2000);
/// Wider cadence once idle. Power-saving heuristic, not correctness-critical.
pub const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(5000);

pub const STATUS_NOT_RUNNING: &str = "Spotify is not running";
pub const STATUS_NEEDS_LOGIN: &str = "Spotify not connected";
pub const STATUS_NOW_PLAYING: &str = "Now playing on Spotify";
pub const STATUS_NO_TRACK: &str = "No track playing";
pub const STATUS_PAUSED: &str = "Spotify is paused";
pub const STATUS_API_ERROR: &str = "Error connecting to Spotify";

/// What one poll tick observed. `playback` is `None` when the playback query
/// was skipped (process gone or no session).
#[derive(Debug)]
pub struct Observation {
    pub process_running: bool,
    pub authenticated: bool,
    pub playback: Option<Result<PlaybackState, WidgetError>>,
}

#[derive(Debug, Default)]
pub struct TickOutcome {
    pub events: Vec<UiEvent>,
    /// Set when the playback query faulted; the caller tears down the
    /// session and hands control to the reconnect supervisor.
    pub fault: bool,
}

/// Reconciles one observation against last-known state. Pure with respect to
/// IO: all querying happens in the controller, so every transition here is
/// unit-testable. Events are emitted only on change, never once per tick.
pub fn reconcile(state: &mut WidgetState, obs: Observation) -> TickOutcome {
    let mut out = TickOutcome::default();
    state.process_running = obs.process_running;

    if !obs.process_running {
        push_status(state, &mut out.events, STATUS_NOT_RUNNING);
        clear_track(state, &mut out.events);
        return out;
    }

    if !obs.authenticated {
        push_status(state, &mut out.events, STATUS_NEEDS_LOGIN);
        clear_track(state, &mut out.events);
        return out;
    }

    match obs.playback {
        Some(Ok(PlaybackState::Track(snapshot))) if snapshot.is_playing => {
            if state.last_snapshot.as_ref() != Some(&snapshot) {
                info!(
                    "Now playing: {} - {}",
                    snapshot.track_name, snapshot.artist_name
                );
                push_status(state, &mut out.events, STATUS_NOW_PLAYING);
                push_icon(state, &mut out.events, PlayIcon::Pause);
                out.events.push(UiEvent::NowPlaying(snapshot.clone()));
                state.last_snapshot = Some(snapshot);
            }
        }
        Some(Ok(PlaybackState::NoItem { is_playing: true })) => {
            // Playing but no track item (ads, transitions). Status only;
            // the icon and labels keep their last value.
            push_status(state, &mut out.events, STATUS_NO_TRACK);
        }
        Some(Ok(_)) => {
            // Paused, or no playback context at all. The last snapshot is
            // kept so resuming the same track does not re-emit it.
            push_status(state, &mut out.events, STATUS_PAUSED);
            push_icon(state, &mut out.events, PlayIcon::Play);
        }
        Some(Err(e)) => {
            warn!("Error checking playback status: {}", e);
            push_status(state, &mut out.events, STATUS_API_ERROR);
            clear_track(state, &mut out.events);
            set_connection(state, &mut out.events, ConnectionState::Error);
            out.fault = true;
        }
        None => {
            // Authenticated but the query was skipped; nothing to reconcile.
        }
    }

    out
}

/// Interval for the next tick, widened once there is nothing to watch.
pub fn poll_interval(state: &WidgetState) -> Duration {
    if state.process_running && state.last_snapshot.is_some() {
        ACTIVE_POLL_INTERVAL
    } else {
        IDLE_POLL_INTERVAL
    }
}

pub fn push_status(state: &mut WidgetState, events: &mut Vec<UiEvent>, text: &str) {
    if state.last_status.as_deref() != Some(text) {
        state.last_status = Some(text.to_string());
        events.push(UiEvent::Status(text.to_string()));
    }
}

pub fn push_icon(state: &mut WidgetState, events: &mut Vec<UiEvent>, icon: PlayIcon) {
    if state.last_icon != Some(icon) {
        state.last_icon = Some(icon);
        events.push(UiEvent::PlayIcon(icon));
    }
}

pub fn clear_track(state: &mut WidgetState, events: &mut Vec<UiEvent>) {
    if state.last_snapshot.take().is_some() {
        events.push(UiEvent::TrackCleared);
    }
}

pub fn set_connection(state: &mut WidgetState, events: &mut Vec<UiEvent>, next: ConnectionState) {
    if state.connection != next {
        state.connection = next;
        events.push(UiEvent::Connection(next));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PlaybackSnapshot;

    fn playing(track: &str, artist: &str) -> PlaybackSnapshot {
        PlaybackSnapshot {
            is_playing: true,
            track_name: track.to_string(),
            artist_name: artist.to_string(),
        }
    }

    fn observed(playback: Result<PlaybackState, WidgetError>) -> Observation {
        Observation {
            process_running: true,
            authenticated: true,
            playback: Some(playback),
        }
    }

    #[test]
    fn process_gone_clears_track_and_reports_once() {
        let mut state = WidgetState::default();
        state.last_snapshot = Some(playing("Weird Fishes", "Radiohead"));

        let obs = || Observation {
            process_running: false,
            authenticated: true,
            playback: None,
        };

        let out = reconcile(&mut state, obs());
        assert!(out.events.contains(&UiEvent::Status(STATUS_NOT_RUNNING.into())));
        assert!(out.events.contains(&UiEvent::TrackCleared));

        // Second identical tick is a no-op.
        let out = reconcile(&mut state, obs());
        assert!(out.events.is_empty());
    }

    #[test]
    fn unauthenticated_reports_needs_login() {
        let mut state = WidgetState::default();
        let out = reconcile(
            &mut state,
            Observation {
                process_running: true,
                authenticated: false,
                playback: None,
            },
        );
        assert_eq!(out.events, vec![UiEvent::Status(STATUS_NEEDS_LOGIN.into())]);
        assert!(!out.fault);
    }

    #[test]
    fn identical_snapshots_emit_at_most_once() {
        let mut state = WidgetState::default();

        let out = reconcile(&mut state, observed(Ok(PlaybackState::Track(playing("A", "X")))));
        let updates: Vec<_> = out
            .events
            .iter()
            .filter(|e| matches!(e, UiEvent::NowPlaying(_)))
            .collect();
        assert_eq!(updates.len(), 1);

        for _ in 0..5 {
            let out = reconcile(&mut state, observed(Ok(PlaybackState::Track(playing("A", "X")))));
            assert!(out.events.is_empty(), "unchanged snapshot must be a no-op");
        }
    }

    #[test]
    fn track_change_emits_exactly_one_update() {
        let mut state = WidgetState::default();
        reconcile(&mut state, observed(Ok(PlaybackState::Track(playing("A", "X")))));

        let out = reconcile(&mut state, observed(Ok(PlaybackState::Track(playing("B", "X")))));
        let updates: Vec<_> = out
            .events
            .iter()
            .filter_map(|e| match e {
                UiEvent::NowPlaying(s) => Some(s.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(updates, vec![playing("B", "X")]);
    }

    #[test]
    fn paused_flips_icon_once() {
        let mut state = WidgetState::default();
        reconcile(&mut state, observed(Ok(PlaybackState::Track(playing("A", "X")))));
        assert_eq!(state.last_icon, Some(PlayIcon::Pause));

        let mut paused = playing("A", "X");
        paused.is_playing = false;
        let out = reconcile(&mut state, observed(Ok(PlaybackState::Track(paused.clone()))));
        assert!(out.events.contains(&UiEvent::PlayIcon(PlayIcon::Play)));
        assert!(out.events.contains(&UiEvent::Status(STATUS_PAUSED.into())));

        let out = reconcile(&mut state, observed(Ok(PlaybackState::Track(paused))));
        assert!(out.events.is_empty());
    }

    #[test]
    fn resuming_same_track_does_not_reemit() {
        let mut state = WidgetState::default();
        reconcile(&mut state, observed(Ok(PlaybackState::Track(playing("A", "X")))));

        let mut paused = playing("A", "X");
        paused.is_playing = false;
        reconcile(&mut state, observed(Ok(PlaybackState::Track(paused))));

        let out = reconcile(&mut state, observed(Ok(PlaybackState::Track(playing("A", "X")))));
        assert!(!out
            .events
            .iter()
            .any(|e| matches!(e, UiEvent::NowPlaying(_))));
    }

    #[test]
    fn playing_without_item_is_no_track_not_paused() {
        let mut state = WidgetState::default();
        reconcile(&mut state, observed(Ok(PlaybackState::Track(playing("A", "X")))));

        let out = reconcile(
            &mut state,
            observed(Ok(PlaybackState::NoItem { is_playing: true })),
        );
        assert!(out.events.contains(&UiEvent::Status(STATUS_NO_TRACK.into())));
        // Not the paused presentation: icon and labels stay put.
        assert!(!out.events.contains(&UiEvent::PlayIcon(PlayIcon::Play)));
        assert!(!out.events.contains(&UiEvent::TrackCleared));

        let out = reconcile(
            &mut state,
            observed(Ok(PlaybackState::NoItem { is_playing: true })),
        );
        assert!(out.events.is_empty());
    }

    #[test]
    fn idle_context_shows_paused() {
        let mut state = WidgetState::default();
        reconcile(&mut state, observed(Ok(PlaybackState::Track(playing("A", "X")))));

        let out = reconcile(&mut state, observed(Ok(PlaybackState::Idle)));
        assert!(out.events.contains(&UiEvent::Status(STATUS_PAUSED.into())));
        assert!(out.events.contains(&UiEvent::PlayIcon(PlayIcon::Play)));
    }

    #[test]
    fn api_fault_degrades_to_error_state() {
        let mut state = WidgetState::default();
        state.connection = ConnectionState::Connected;
        reconcile(&mut state, observed(Ok(PlaybackState::Track(playing("A", "X")))));

        let out = reconcile(
            &mut state,
            observed(Err(WidgetError::ApiFault("503".into()))),
        );
        assert!(out.fault);
        assert_eq!(state.connection, ConnectionState::Error);
        assert!(out.events.contains(&UiEvent::Status(STATUS_API_ERROR.into())));
        assert!(out.events.contains(&UiEvent::TrackCleared));
        assert!(out
            .events
            .contains(&UiEvent::Connection(ConnectionState::Error)));
    }

    #[test]
    fn interval_widens_when_idle() {
        let mut state = WidgetState::default();
        assert_eq!(poll_interval(&state), IDLE_POLL_INTERVAL);

        reconcile(&mut state, observed(Ok(PlaybackState::Track(playing("A", "X")))));
        assert_eq!(poll_interval(&state), ACTIVE_POLL_INTERVAL);

        reconcile(
            &mut state,
            Observation {
                process_running: false,
                authenticated: true,
                playback: None,
            },
        );
        assert_eq!(poll_interval(&state), IDLE_POLL_INTERVAL);
    }
}
