use std::fs;
use std::path::{Path, PathBuf};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::credentials::APP_DIR;
use crate::error::WidgetError;
use crate::hotkeys::HotkeyBindings;

const SETTINGS_FILE: &str = "settings.json";

/// Persisted UI settings: window position, volume slider, hotkey bindings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub window_x: i32,
    pub window_y: i32,
    pub volume: f32,
    pub launch_at_login: bool,
    pub hotkeys: HotkeyBindings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            window_x: 100,
            window_y: 100,
            volume: 0.5,
            launch_at_login: true,
            hotkeys: HotkeyBindings::default(),
        }
    }
}

pub fn settings_path() -> Result<PathBuf, WidgetError> {
    let dir = dirs::data_dir()
        .ok_or_else(|| WidgetError::ConfigMissing("no user data directory".into()))?
        .join(APP_DIR);
    Ok(dir.join(SETTINGS_FILE))
}

/// Loads settings, falling back to defaults when the file is absent or
/// unreadable. Settings are never a reason to refuse startup.
pub fn load(path: &Path) -> Settings {
    match fs::read_to_string(path) {
        Ok(data) => match serde_json::from_str(&data) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Unreadable settings file, using defaults: {}", e);
                Settings::default()
            }
        },
        Err(_) => Settings::default(),
    }
}

pub fn save(path: &Path, settings: &Settings) -> Result<(), WidgetError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let data = serde_json::to_string_pretty(settings)?;
    fs::write(path, data)?;
    Ok(())
}
