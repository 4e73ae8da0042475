use anyhow::Context;
use log::{debug, info};

// Module declarations
pub mod auth;
pub mod autostart;
pub mod controller;
pub mod credentials;
pub mod dispatch;
pub mod error;
pub mod hotkeys;
pub mod os;
pub mod poller;
pub mod reconnect;
pub mod settings;
pub mod spotify;
pub mod types;

pub use controller::Controller;
pub use error::WidgetError;
pub use types::{Command, ConnectionState, PlaybackSnapshot, UiEvent};

/// Headless entry point: runs the controller on a current-thread runtime
/// and mirrors UI events to the log. A GUI shell embeds [`Controller`]
/// directly instead and drives it through the returned channels.
pub fn run() -> anyhow::Result<()> {
    // Initialize logger
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    info!("Starting Spotlet controller...");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(async {
        let (controller, cmd_tx, mut ui_rx) = Controller::new()?;

        tokio::spawn(async move {
            while let Some(event) = ui_rx.recv().await {
                match event {
                    UiEvent::AuthorizeUrl(url) => info!("Authorize in your browser: {}", url),
                    UiEvent::Notice(msg) => info!("{}", msg),
                    UiEvent::Status(text) => info!("{}", text),
                    other => debug!("UI event: {:?}", other),
                }
            }
        });

        // Without a cached session the widget would sit at the login prompt;
        // headless mode goes straight to the browser flow.
        if !controller.has_cached_token() {
            let _ = cmd_tx.send(Command::Connect);
        }

        controller.run().await
    })
}
