use log::{error, info};
use serde::{Deserialize, Serialize};

use crate::error::WidgetError;
use crate::types::Command;

pub const ACTION_PLAY_PAUSE: &str = "play_pause";
pub const ACTION_NEXT_TRACK: &str = "next_track";
pub const ACTION_PREV_TRACK: &str = "prev_track";
pub const ACTION_VOLUME_UP: &str = "volume_up";
pub const ACTION_VOLUME_DOWN: &str = "volume_down";

/// Persisted hotkey bindings, action name to combo string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotkeyBindings {
    pub play_pause: String,
    pub next_track: String,
    pub prev_track: String,
    pub volume_up: String,
    pub volume_down: String,
}

impl Default for HotkeyBindings {
    fn default() -> Self {
        Self {
            play_pause: "ctrl+alt+p".into(),
            next_track: "ctrl+alt+n".into(),
            prev_track: "ctrl+alt+b".into(),
            volume_up: "ctrl+alt+up".into(),
            volume_down: "ctrl+alt+down".into(),
        }
    }
}

impl HotkeyBindings {
    pub fn entries(&self) -> [(&'static str, &str); 5] {
        [
            (ACTION_PLAY_PAUSE, self.play_pause.as_str()),
            (ACTION_NEXT_TRACK, self.next_track.as_str()),
            (ACTION_PREV_TRACK, self.prev_track.as_str()),
            (ACTION_VOLUME_UP, self.volume_up.as_str()),
            (ACTION_VOLUME_DOWN, self.volume_down.as_str()),
        ]
    }

    pub fn set(&mut self, action: &str, combo: &str) -> Result<(), WidgetError> {
        parse_combo(combo)?;
        let slot = match action {
            ACTION_PLAY_PAUSE => &mut self.play_pause,
            ACTION_NEXT_TRACK => &mut self.next_track,
            ACTION_PREV_TRACK => &mut self.prev_track,
            ACTION_VOLUME_UP => &mut self.volume_up,
            ACTION_VOLUME_DOWN => &mut self.volume_down,
            other => {
                return Err(WidgetError::InvalidHotkey(format!(
                    "unknown action '{}'",
                    other
                )))
            }
        };
        *slot = combo.to_ascii_lowercase();
        Ok(())
    }
}

/// Intent behind a named hotkey action.
pub fn command_for_action(action: &str) -> Option<Command> {
    match action {
        ACTION_PLAY_PAUSE => Some(Command::PlayPause),
        ACTION_NEXT_TRACK => Some(Command::NextTrack),
        ACTION_PREV_TRACK => Some(Command::PrevTrack),
        ACTION_VOLUME_UP => Some(Command::VolumeUp),
        ACTION_VOLUME_DOWN => Some(Command::VolumeDown),
        _ => None,
    }
}

/// A parsed key combination, toolkit-agnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCombo {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub key: String,
}

/// Parses strings like `ctrl+alt+p` or `ctrl+alt+up`. The final token is the
/// key, everything before it must be a known modifier.
pub fn parse_combo(combo: &str) -> Result<KeyCombo, WidgetError> {
    let tokens: Vec<&str> = combo
        .split('+')
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect();
    let Some((key, modifiers)) = tokens.split_last() else {
        return Err(WidgetError::InvalidHotkey("empty combo".into()));
    };

    let mut parsed = KeyCombo {
        ctrl: false,
        alt: false,
        shift: false,
        key: key.to_ascii_lowercase(),
    };

    for modifier in modifiers {
        match modifier.to_ascii_lowercase().as_str() {
            "ctrl" | "control" => parsed.ctrl = true,
            "alt" => parsed.alt = true,
            "shift" => parsed.shift = true,
            other => {
                return Err(WidgetError::InvalidHotkey(format!(
                    "unknown modifier '{}'",
                    other
                )))
            }
        }
    }

    if !is_known_key(&parsed.key) {
        return Err(WidgetError::InvalidHotkey(format!(
            "unknown key '{}'",
            parsed.key
        )));
    }
    Ok(parsed)
}

fn is_known_key(key: &str) -> bool {
    if key.len() == 1 {
        let c = key.chars().next().unwrap_or(' ');
        return c.is_ascii_alphanumeric();
    }
    matches!(
        key,
        "up" | "down" | "left" | "right" | "space" | "tab" | "home" | "end" | "pageup"
            | "pagedown"
    ) || (key.starts_with('f') && key[1..].parse::<u8>().map_or(false, |n| (1..=24).contains(&n)))
}

/// OS hook registration seam. The actual global hook lives outside this
/// crate; the GUI shell plugs its implementation in here.
pub trait HotkeyBackend {
    fn register(&mut self, action: &str, combo: &KeyCombo) -> Result<(), WidgetError>;
    fn unregister_all(&mut self);
}

/// Registers every binding, logging failures instead of aborting; a single
/// bad binding must not take the rest down.
pub fn register_all(bindings: &HotkeyBindings, backend: &mut dyn HotkeyBackend) {
    for (action, combo) in bindings.entries() {
        match parse_combo(combo) {
            Ok(parsed) => {
                if let Err(e) = backend.register(action, &parsed) {
                    error!("Error registering hotkey {} ({}): {}", action, combo, e);
                } else {
                    info!("Registered hotkey {} -> {}", combo, action);
                }
            }
            Err(e) => error!("Skipping hotkey {}: {}", action, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_action() {
        let bindings = HotkeyBindings::default();
        for (action, combo) in bindings.entries() {
            assert!(parse_combo(combo).is_ok(), "default {} must parse", action);
            assert!(command_for_action(action).is_some());
        }
    }

    #[test]
    fn combo_parsing() {
        let combo = parse_combo("ctrl+alt+p").unwrap();
        assert!(combo.ctrl && combo.alt && !combo.shift);
        assert_eq!(combo.key, "p");

        let combo = parse_combo("Ctrl+Shift+Up").unwrap();
        assert!(combo.ctrl && combo.shift);
        assert_eq!(combo.key, "up");

        assert!(parse_combo("").is_err());
        assert!(parse_combo("hyper+p").is_err());
        assert!(parse_combo("ctrl+alt+??").is_err());
    }

    #[test]
    fn action_commands() {
        assert_eq!(command_for_action("play_pause"), Some(Command::PlayPause));
        assert_eq!(command_for_action("volume_down"), Some(Command::VolumeDown));
        assert_eq!(command_for_action("self_destruct"), None);
    }

    #[test]
    fn rebinding_validates_first() {
        let mut bindings = HotkeyBindings::default();
        bindings.set(ACTION_NEXT_TRACK, "ctrl+shift+n").unwrap();
        assert_eq!(bindings.next_track, "ctrl+shift+n");

        assert!(bindings.set(ACTION_NEXT_TRACK, "bogus+n").is_err());
        assert_eq!(bindings.next_track, "ctrl+shift+n");

        assert!(bindings.set("no_such_action", "ctrl+alt+x").is_err());
    }

    #[test]
    fn registration_survives_a_bad_binding() {
        struct Recorder {
            registered: Vec<String>,
        }
        impl HotkeyBackend for Recorder {
            fn register(&mut self, action: &str, _combo: &KeyCombo) -> Result<(), WidgetError> {
                if action == ACTION_PREV_TRACK {
                    return Err(WidgetError::OsCall("hook busy".into()));
                }
                self.registered.push(action.to_string());
                Ok(())
            }
            fn unregister_all(&mut self) {
                self.registered.clear();
            }
        }

        let mut backend = Recorder {
            registered: Vec::new(),
        };
        register_all(&HotkeyBindings::default(), &mut backend);
        assert_eq!(
            backend.registered,
            vec![
                ACTION_PLAY_PAUSE,
                ACTION_NEXT_TRACK,
                ACTION_VOLUME_UP,
                ACTION_VOLUME_DOWN
            ]
        );
    }
}
