use std::path::PathBuf;

use log::{error, info, warn};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;

use crate::auth::PkceAuthFlow;
use crate::autostart;
use crate::credentials::CredentialStore;
use crate::dispatch::{CommandDispatcher, DispatchContext, MediaKeys, SystemVolume};
use crate::error::WidgetError;
use crate::hotkeys;
use crate::os::{self, NativeMediaKeys, NativeVolume};
use crate::poller::{self, Observation, STATUS_NEEDS_LOGIN};
use crate::reconnect::{ReconnectSupervisor, RECONNECT_DELAY};
use crate::settings::{self, Settings};
use crate::spotify::{PlaybackControl, SpotifyClient};
use crate::types::{Command, ConnectionState, PlayIcon, TokenInfo, UiEvent, WidgetState};

/// Owns all widget-wide mutable state and drives it from a single
/// event-loop task: the poll timer, incoming commands, auth completion, and
/// reconnect retries are serialized through one `select!`, so ticks never
/// overlap and no locking is needed.
pub struct Controller<K: MediaKeys, V: SystemVolume> {
    store: CredentialStore,
    settings_path: PathBuf,
    settings: Settings,
    dispatcher: CommandDispatcher<K, V>,
    state: WidgetState,
    reconnect: ReconnectSupervisor,
    notified_exhausted: bool,
    client: Option<SpotifyClient>,
    auth_cancel: Option<CancellationToken>,
    auth_tx: UnboundedSender<Result<TokenInfo, WidgetError>>,
    auth_rx: UnboundedReceiver<Result<TokenInfo, WidgetError>>,
    retry_tx: UnboundedSender<()>,
    retry_rx: UnboundedReceiver<()>,
    cmd_rx: UnboundedReceiver<Command>,
    ui_tx: UnboundedSender<UiEvent>,
}

impl Controller<NativeMediaKeys, NativeVolume> {
    /// Controller wired to the native OS seams and the default data
    /// directory. Returns the command sender and UI event receiver for the
    /// embedding shell.
    pub fn new() -> Result<
        (
            Self,
            UnboundedSender<Command>,
            UnboundedReceiver<UiEvent>,
        ),
        WidgetError,
    > {
        let store = CredentialStore::new()?;
        let settings_path = settings::settings_path()?;
        Ok(Self::with_parts(
            store,
            settings_path,
            CommandDispatcher::new(NativeMediaKeys, NativeVolume),
        ))
    }
}

impl<K: MediaKeys, V: SystemVolume> Controller<K, V> {
    pub fn with_parts(
        store: CredentialStore,
        settings_path: PathBuf,
        dispatcher: CommandDispatcher<K, V>,
    ) -> (
        Self,
        UnboundedSender<Command>,
        UnboundedReceiver<UiEvent>,
    ) {
        let settings = settings::load(&settings_path);
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (ui_tx, ui_rx) = mpsc::unbounded_channel();
        let (auth_tx, auth_rx) = mpsc::unbounded_channel();
        let (retry_tx, retry_rx) = mpsc::unbounded_channel();
        let controller = Self {
            store,
            settings_path,
            settings,
            dispatcher,
            state: WidgetState::default(),
            reconnect: ReconnectSupervisor::new(),
            notified_exhausted: false,
            client: None,
            auth_cancel: None,
            auth_tx,
            auth_rx,
            retry_tx,
            retry_rx,
            cmd_rx,
            ui_tx,
        };
        (controller, cmd_tx, ui_rx)
    }

    pub fn has_cached_token(&self) -> bool {
        matches!(self.store.load_token(), Ok(Some(_)))
    }

    pub fn connection(&self) -> ConnectionState {
        self.state.connection
    }

    pub fn volume(&self) -> f32 {
        self.settings.volume
    }

    pub async fn run(mut self) -> anyhow::Result<()> {
        let autostart_result = if self.settings.launch_at_login {
            autostart::register()
        } else {
            autostart::unregister()
        };
        if let Err(e) = autostart_result {
            warn!("Failed to update launch-at-login registration: {}", e);
        }
        for (action, combo) in self.settings.hotkeys.entries() {
            if let Err(e) = hotkeys::parse_combo(combo) {
                warn!("Ignoring saved hotkey for {}: {}", action, e);
            }
        }

        self.initialize();

        let mut tick_rate = poller::poll_interval(&self.state);
        let mut interval = tokio::time::interval(tick_rate);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick().await;
                    let desired = poller::poll_interval(&self.state);
                    if desired != tick_rate {
                        tick_rate = desired;
                        interval = tokio::time::interval_at(
                            tokio::time::Instant::now() + desired,
                            desired,
                        );
                        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                    }
                }
                Some(cmd) = self.cmd_rx.recv() => {
                    if matches!(cmd, Command::Quit) {
                        info!("Quit requested");
                        break;
                    }
                    self.handle_command(cmd).await;
                }
                Some(result) = self.auth_rx.recv() => {
                    self.on_auth_result(result);
                }
                Some(()) = self.retry_rx.recv() => {
                    self.on_retry();
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted, shutting down");
                    break;
                }
            }
        }

        if let Some(cancel) = self.auth_cancel.take() {
            cancel.cancel();
        }
        if let Err(e) = settings::save(&self.settings_path, &self.settings) {
            error!("Failed to save settings: {}", e);
        }
        Ok(())
    }

    /// One poll tick: probe the process, query playback when a session is
    /// live, reconcile against last-known state.
    async fn tick(&mut self) {
        let process_running = os::is_process_running(os::SPOTIFY_PROCESS);
        let authenticated = self.client.is_some();
        let playback = match (&self.client, process_running) {
            (Some(client), true) => Some(client.current_playback().await),
            _ => None,
        };

        let outcome = poller::reconcile(
            &mut self.state,
            Observation {
                process_running,
                authenticated,
                playback,
            },
        );
        self.emit(outcome.events);

        if outcome.fault {
            self.client = None;
            self.schedule_reconnect();
        }
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Connect => self.start_auth(),
            Command::Disconnect => self.disconnect(),
            Command::Quit => {}
            _ => {
                let ctx = DispatchContext {
                    process_running: self.state.process_running,
                    icon_shows_pause: self.state.last_icon == Some(PlayIcon::Pause),
                    volume: self.settings.volume,
                };
                let events = self.dispatcher.dispatch(cmd, &ctx, self.client.as_ref()).await;
                self.emit(events);
            }
        }
    }

    /// Builds a client from the cached token if one exists. Returns whether
    /// a session came up.
    fn initialize(&mut self) -> bool {
        let mut events = Vec::new();
        if let Err(e) = self.store.load_credentials() {
            error!("Error initializing Spotify client: {}", e);
            poller::push_status(&mut self.state, &mut events, STATUS_NEEDS_LOGIN);
            self.emit(events);
            return false;
        }

        match self.store.load_token() {
            Ok(Some(token)) => {
                info!("Loaded existing token");
                self.client = Some(SpotifyClient::new(token.access_token));
                poller::set_connection(&mut self.state, &mut events, ConnectionState::Connected);
                self.emit(events);
                true
            }
            Ok(None) => {
                poller::push_status(&mut self.state, &mut events, STATUS_NEEDS_LOGIN);
                self.emit(events);
                false
            }
            Err(e) => {
                error!("Error loading token: {}", e);
                poller::push_status(&mut self.state, &mut events, STATUS_NEEDS_LOGIN);
                self.emit(events);
                false
            }
        }
    }

    /// Kicks off a browser-based PKCE attempt. The relay poll and exchange
    /// run on a spawned task so the event loop stays responsive; completion
    /// comes back through `auth_rx`.
    fn start_auth(&mut self) {
        if self.auth_cancel.is_some() {
            self.emit(vec![UiEvent::Notice(
                "Authorization already in progress".into(),
            )]);
            return;
        }

        let creds = match self.store.load_credentials() {
            Ok(creds) => creds,
            Err(e) => {
                error!("Error during Spotify authentication: {}", e);
                let mut events = vec![UiEvent::Notice(
                    "Error: Spotify credentials not found. Please contact support.".into(),
                )];
                poller::push_status(&mut self.state, &mut events, STATUS_NEEDS_LOGIN);
                self.emit(events);
                return;
            }
        };

        let flow = PkceAuthFlow::new(creds);
        let (session, url) = flow.begin();
        let cancel = CancellationToken::new();
        self.auth_cancel = Some(cancel.clone());

        let mut events = Vec::new();
        poller::set_connection(&mut self.state, &mut events, ConnectionState::Connecting);
        events.push(UiEvent::AuthorizeUrl(url));
        self.emit(events);

        let auth_tx = self.auth_tx.clone();
        tokio::spawn(async move {
            let result = async {
                let code = flow.poll_for_code(&session, &cancel).await?;
                flow.exchange(&code, &session.code_verifier).await
            }
            .await;
            let _ = auth_tx.send(result);
        });
    }

    fn on_auth_result(&mut self, result: Result<TokenInfo, WidgetError>) {
        // A result arriving after disconnect cancelled the attempt is stale.
        if self.auth_cancel.take().is_none() {
            return;
        }

        match result {
            Ok(token) => {
                if let Err(e) = self.store.save_token(&token) {
                    error!("Failed to persist token cache: {}", e);
                }
                self.client = Some(SpotifyClient::new(token.access_token));
                self.reconnect.record_success();
                self.notified_exhausted = false;
                info!("Spotify authentication successful");

                let mut events = Vec::new();
                poller::set_connection(&mut self.state, &mut events, ConnectionState::Connected);
                events.push(UiEvent::Notice("Successfully connected to Spotify!".into()));
                self.emit(events);
            }
            Err(e) => {
                error!("Spotify authentication failed: {}", e);
                let mut events = Vec::new();
                poller::set_connection(
                    &mut self.state,
                    &mut events,
                    ConnectionState::Disconnected,
                );
                events.push(UiEvent::Notice(
                    "Failed to connect to Spotify. Please try again.".into(),
                ));
                self.emit(events);
            }
        }
    }

    /// Clears the cached token and resets to `Disconnected`; the next poll
    /// tick reports "needs login".
    fn disconnect(&mut self) {
        if let Some(cancel) = self.auth_cancel.take() {
            cancel.cancel();
        }
        if let Err(e) = self.store.clear_token() {
            error!("Error clearing token cache: {}", e);
        }
        self.client = None;

        let mut events = Vec::new();
        poller::clear_track(&mut self.state, &mut events);
        poller::push_status(&mut self.state, &mut events, "Spotify disconnected");
        poller::set_connection(&mut self.state, &mut events, ConnectionState::Disconnected);
        events.push(UiEvent::Notice("Disconnected from Spotify".into()));
        self.emit(events);
        info!("Successfully disconnected from Spotify");
    }

    /// Arms a single-shot retry timer, or surfaces the persistent failure
    /// notice once the supervisor is exhausted.
    fn schedule_reconnect(&mut self) {
        match self.reconnect.next_attempt() {
            Some(_) => {
                let retry_tx = self.retry_tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(RECONNECT_DELAY).await;
                    let _ = retry_tx.send(());
                });
            }
            None => {
                if !self.notified_exhausted {
                    self.notified_exhausted = true;
                    self.emit(vec![UiEvent::Notice(
                        "Failed to connect to Spotify. Please check your connection.".into(),
                    )]);
                }
            }
        }
    }

    fn on_retry(&mut self) {
        // Rebuilding a client from the cached token is not a proven
        // connection; the attempt counter resets only when an explicit auth
        // completes. Otherwise a persistent outage with a cached token would
        // restart every episode at attempt one and never exhaust.
        if !self.initialize() {
            self.schedule_reconnect();
        }
    }

    /// Forwards events to the UI channel, folding icon and volume changes
    /// back into controller state so change detection stays coherent.
    fn emit(&mut self, events: Vec<UiEvent>) {
        for event in events {
            match &event {
                UiEvent::PlayIcon(icon) => self.state.last_icon = Some(*icon),
                UiEvent::Volume(level) => self.settings.volume = *level,
                _ => {}
            }
            let _ = self.ui_tx.send(event);
        }
    }
}
