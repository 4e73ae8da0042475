use log::{debug, info};
use serde::Deserialize;

use crate::error::WidgetError;
use crate::types::{PlaybackSnapshot, PlaybackState};

const API_BASE: &str = "https://api.spotify.com/v1";

/// Remote playback surface the controller talks to. A trait so the
/// dispatcher and its tests do not need a live session. Everything runs on
/// the single event-loop task, so no Send bound is required.
#[allow(async_fn_in_trait)]
pub trait PlaybackControl {
    async fn current_playback(&self) -> Result<PlaybackState, WidgetError>;
    async fn start_playback(&self) -> Result<(), WidgetError>;
    async fn pause_playback(&self) -> Result<(), WidgetError>;
    async fn next_track(&self) -> Result<(), WidgetError>;
    async fn previous_track(&self) -> Result<(), WidgetError>;
}

#[derive(Debug, Deserialize)]
struct PlaybackContext {
    is_playing: bool,
    item: Option<PlaybackItem>,
}

#[derive(Debug, Deserialize)]
struct PlaybackItem {
    name: String,
    #[serde(default)]
    artists: Vec<Artist>,
}

#[derive(Debug, Deserialize)]
struct Artist {
    name: String,
}

/// Builds a playback state from a response body. An empty body means no
/// context anywhere; a context with no track item is kept distinct so the
/// poller can report it as "no track" rather than paused.
pub fn playback_from_json(body: &str) -> Result<PlaybackState, WidgetError> {
    if body.trim().is_empty() {
        return Ok(PlaybackState::Idle);
    }
    let ctx: PlaybackContext =
        serde_json::from_str(body).map_err(|e| WidgetError::ApiFault(e.to_string()))?;
    let Some(item) = ctx.item else {
        return Ok(PlaybackState::NoItem {
            is_playing: ctx.is_playing,
        });
    };
    let artist_name = item
        .artists
        .first()
        .map(|a| a.name.clone())
        .unwrap_or_default();
    Ok(PlaybackState::Track(PlaybackSnapshot {
        is_playing: ctx.is_playing,
        track_name: item.name,
        artist_name,
    }))
}

/// Thin reqwest wrapper around the Spotify Web API, bound to one access
/// token. The API itself is a black box; every failure maps to `ApiFault`.
pub struct SpotifyClient {
    http: reqwest::Client,
    access_token: String,
}

impl SpotifyClient {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            access_token: access_token.into(),
        }
    }

    async fn command(&self, method: reqwest::Method, path: &str) -> Result<(), WidgetError> {
        let url = format!("{}{}", API_BASE, path);
        let resp = self
            .http
            .request(method, &url)
            .bearer_auth(&self.access_token)
            .header(reqwest::header::CONTENT_LENGTH, 0)
            .send()
            .await
            .map_err(|e| WidgetError::ApiFault(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(WidgetError::ApiFault(format!(
                "{} returned HTTP {}",
                path,
                resp.status()
            )));
        }
        debug!("Playback command {} accepted", path);
        Ok(())
    }
}

impl PlaybackControl for SpotifyClient {
    async fn current_playback(&self) -> Result<PlaybackState, WidgetError> {
        let url = format!("{}/me/player", API_BASE);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| WidgetError::ApiFault(e.to_string()))?;

        // 204: nothing is playing on any device.
        if resp.status() == reqwest::StatusCode::NO_CONTENT {
            return Ok(PlaybackState::Idle);
        }
        if !resp.status().is_success() {
            return Err(WidgetError::ApiFault(format!(
                "/me/player returned HTTP {}",
                resp.status()
            )));
        }
        let body = resp
            .text()
            .await
            .map_err(|e| WidgetError::ApiFault(e.to_string()))?;
        playback_from_json(&body)
    }

    async fn start_playback(&self) -> Result<(), WidgetError> {
        info!("Starting playback");
        self.command(reqwest::Method::PUT, "/me/player/play").await
    }

    async fn pause_playback(&self) -> Result<(), WidgetError> {
        info!("Pausing playback");
        self.command(reqwest::Method::PUT, "/me/player/pause").await
    }

    async fn next_track(&self) -> Result<(), WidgetError> {
        info!("Skipping to next track");
        self.command(reqwest::Method::POST, "/me/player/next").await
    }

    async fn previous_track(&self) -> Result<(), WidgetError> {
        info!("Skipping to previous track");
        self.command(reqwest::Method::POST, "/me/player/previous")
            .await
    }
}
