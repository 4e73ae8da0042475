use auto_launch::AutoLaunchBuilder;
use log::info;

use crate::error::WidgetError;

const APP_NAME: &str = "Spotlet";

fn launcher() -> Result<auto_launch::AutoLaunch, WidgetError> {
    let exe = std::env::current_exe()?;
    AutoLaunchBuilder::new()
        .set_app_name(APP_NAME)
        .set_app_path(&exe.to_string_lossy())
        .set_use_launch_agent(true)
        .build()
        .map_err(|e| WidgetError::OsCall(e.to_string()))
}

/// Registers the widget to start with the OS session. Failure is surfaced to
/// the caller as a notice; it never blocks startup.
pub fn register() -> Result<(), WidgetError> {
    let auto = launcher()?;
    let enabled = auto.is_enabled().map_err(|e| WidgetError::OsCall(e.to_string()))?;
    if !enabled {
        auto.enable().map_err(|e| WidgetError::OsCall(e.to_string()))?;
        info!("Registered for launch at login");
    }
    Ok(())
}

/// Drops the registration when the user turns the setting off.
pub fn unregister() -> Result<(), WidgetError> {
    let auto = launcher()?;
    if auto.is_enabled().map_err(|e| WidgetError::OsCall(e.to_string()))? {
        auto.disable().map_err(|e| WidgetError::OsCall(e.to_string()))?;
        info!("Removed launch-at-login registration");
    }
    Ok(())
}
