//! OS integration: process probe, media-key injection, master volume.
//! Everything here fails soft; a broken OS call surfaces a notice upstream
//! and never blocks the rest of the control flow.

use crate::dispatch::{MediaKey, MediaKeys, SystemVolume};
use crate::error::WidgetError;

#[cfg(windows)]
pub const SPOTIFY_PROCESS: &str = "spotify.exe";
#[cfg(not(windows))]
pub const SPOTIFY_PROCESS: &str = "spotify";

pub struct NativeMediaKeys;
pub struct NativeVolume;

#[cfg(windows)]
mod platform {
    use super::*;
    use std::mem::size_of;
    use windows::Win32::Foundation::CloseHandle;
    use windows::Win32::Media::Audio::Endpoints::IAudioEndpointVolume;
    use windows::Win32::Media::Audio::{eConsole, eRender, IMMDeviceEnumerator, MMDeviceEnumerator};
    use windows::Win32::System::Com::{
        CoCreateInstance, CoInitializeEx, CLSCTX_ALL, COINIT_APARTMENTTHREADED,
    };
    use windows::Win32::System::Diagnostics::ToolHelp::{
        CreateToolhelp32Snapshot, Process32FirstW, Process32NextW, PROCESSENTRY32W,
        TH32CS_SNAPPROCESS,
    };
    use windows::Win32::UI::Input::KeyboardAndMouse::{
        SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, KEYBDINPUT, KEYBD_EVENT_FLAGS,
        KEYEVENTF_KEYUP, VIRTUAL_KEY, VK_MEDIA_NEXT_TRACK, VK_MEDIA_PLAY_PAUSE,
        VK_MEDIA_PREV_TRACK,
    };

    pub fn is_process_running(name: &str) -> bool {
        unsafe {
            let Ok(snapshot) = CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0) else {
                return false;
            };
            let mut entry = PROCESSENTRY32W {
                dwSize: size_of::<PROCESSENTRY32W>() as u32,
                ..Default::default()
            };
            let mut found = false;
            if Process32FirstW(snapshot, &mut entry).is_ok() {
                loop {
                    let len = entry
                        .szExeFile
                        .iter()
                        .position(|&c| c == 0)
                        .unwrap_or(entry.szExeFile.len());
                    let exe = String::from_utf16_lossy(&entry.szExeFile[..len]);
                    if exe.eq_ignore_ascii_case(name) {
                        found = true;
                        break;
                    }
                    if Process32NextW(snapshot, &mut entry).is_err() {
                        break;
                    }
                }
            }
            let _ = CloseHandle(snapshot);
            found
        }
    }

    fn virtual_key(key: MediaKey) -> VIRTUAL_KEY {
        match key {
            MediaKey::PlayPause => VK_MEDIA_PLAY_PAUSE,
            MediaKey::NextTrack => VK_MEDIA_NEXT_TRACK,
            MediaKey::PrevTrack => VK_MEDIA_PREV_TRACK,
        }
    }

    pub fn send_media_key(key: MediaKey) -> Result<(), WidgetError> {
        let vk = virtual_key(key);
        let keyboard_input = |flags: KEYBD_EVENT_FLAGS| INPUT {
            r#type: INPUT_KEYBOARD,
            Anonymous: INPUT_0 {
                ki: KEYBDINPUT {
                    wVk: vk,
                    wScan: 0,
                    dwFlags: flags,
                    time: 0,
                    dwExtraInfo: 0,
                },
            },
        };
        // Key down, then key up.
        let inputs = [
            keyboard_input(KEYBD_EVENT_FLAGS(0)),
            keyboard_input(KEYEVENTF_KEYUP),
        ];
        let sent = unsafe { SendInput(&inputs, size_of::<INPUT>() as i32) };
        if sent != inputs.len() as u32 {
            return Err(WidgetError::OsCall(format!(
                "SendInput delivered {}/{} events",
                sent,
                inputs.len()
            )));
        }
        Ok(())
    }

    pub fn set_master_volume(level: f32) -> Result<(), WidgetError> {
        unsafe {
            let _ = CoInitializeEx(None, COINIT_APARTMENTTHREADED);
            let enumerator: IMMDeviceEnumerator =
                CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)
                    .map_err(|e| WidgetError::OsCall(e.to_string()))?;
            let device = enumerator
                .GetDefaultAudioEndpoint(eRender, eConsole)
                .map_err(|e| WidgetError::OsCall(e.to_string()))?;
            let endpoint: IAudioEndpointVolume = device
                .Activate(CLSCTX_ALL, None)
                .map_err(|e| WidgetError::OsCall(e.to_string()))?;
            endpoint
                .SetMasterVolumeLevelScalar(level, std::ptr::null())
                .map_err(|e| WidgetError::OsCall(e.to_string()))?;
        }
        Ok(())
    }
}

#[cfg(not(windows))]
mod platform {
    use super::*;
    use log::debug;
    use std::fs;

    pub fn is_process_running(name: &str) -> bool {
        let Ok(entries) = fs::read_dir("/proc") else {
            return false;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let is_pid = path
                .file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |n| n.chars().all(|c| c.is_ascii_digit()));
            if !is_pid {
                continue;
            }
            if let Ok(comm) = fs::read_to_string(path.join("comm")) {
                if comm.trim().eq_ignore_ascii_case(name) {
                    return true;
                }
            }
        }
        false
    }

    pub fn send_media_key(key: MediaKey) -> Result<(), WidgetError> {
        debug!("Media key injection not wired on this platform: {:?}", key);
        Ok(())
    }

    pub fn set_master_volume(level: f32) -> Result<(), WidgetError> {
        debug!(
            "Master volume control not wired on this platform: {:.2}",
            level
        );
        Ok(())
    }
}

pub fn is_process_running(name: &str) -> bool {
    platform::is_process_running(name)
}

impl MediaKeys for NativeMediaKeys {
    fn send(&self, key: MediaKey) -> Result<(), WidgetError> {
        platform::send_media_key(key)
    }
}

impl SystemVolume for NativeVolume {
    fn set_master(&self, level: f32) -> Result<(), WidgetError> {
        platform::set_master_volume(level)
    }
}
