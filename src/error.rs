use thiserror::Error;

/// Boundary errors. Remote-call failures degrade to a safe UI state and
/// OS-call failures surface a transient notice; none of them crash the
/// process.
#[derive(Debug, Error)]
pub enum WidgetError {
    #[error("credentials file missing or malformed: {0}")]
    ConfigMissing(String),

    #[error("authorization failed: {0}")]
    AuthFailed(String),

    #[error("token exchange failed")]
    TokenExchangeFailed,

    #[error("playback API fault: {0}")]
    ApiFault(String),

    #[error("media process is not running")]
    ProcessNotRunning,

    #[error("invalid hotkey combo: {0}")]
    InvalidHotkey(String),

    #[error("OS call failed: {0}")]
    OsCall(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
