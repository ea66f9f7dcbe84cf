//! Launch-on-login registration through `auto-launch`.
//!
//! Linux writes an XDG autostart entry, macOS a launch agent, and Windows a
//! `Run` registry value.

use auto_launch::{AutoLaunch, AutoLaunchBuilder};

const APP_NAME: &str = "Unishot";

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("cannot locate the unishot executable: {0}")]
    Executable(#[from] std::io::Error),

    #[error("{0}")]
    Platform(String),
}

/// What to do with the login entry given the desired and current setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Change {
    Enable,
    Disable,
    Keep,
}

fn plan(desired: bool, enabled: bool) -> Change {
    match (desired, enabled) {
        (true, false) => Change::Enable,
        (false, true) => Change::Disable,
        _ => Change::Keep,
    }
}

fn launcher() -> Result<AutoLaunch, StartupError> {
    let exe = std::env::current_exe()?;
    AutoLaunchBuilder::new()
        .set_app_name(APP_NAME)
        .set_app_path(&exe.to_string_lossy())
        .set_use_launch_agent(true)
        .build()
        .map_err(|e| StartupError::Platform(format!("failed to create auto-launch: {e}")))
}

/// Makes the login entry match `enabled`.
pub fn apply(enabled: bool) -> Result<(), StartupError> {
    let auto = launcher()?;
    let current = auto
        .is_enabled()
        .map_err(|e| StartupError::Platform(format!("failed to check auto-start: {e}")))?;

    match plan(enabled, current) {
        Change::Enable => {
            auto.enable()
                .map_err(|e| StartupError::Platform(format!("failed to enable auto-start: {e}")))?;
            tracing::info!("launch on startup enabled");
        }
        Change::Disable => {
            auto.disable()
                .map_err(|e| StartupError::Platform(format!("failed to disable auto-start: {e}")))?;
            tracing::info!("launch on startup disabled");
        }
        Change::Keep => tracing::debug!(enabled, "launch on startup unchanged"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_only_touches_mismatched_entries() {
        assert_eq!(plan(true, false), Change::Enable);
        assert_eq!(plan(false, true), Change::Disable);
        assert_eq!(plan(true, true), Change::Keep);
        assert_eq!(plan(false, false), Change::Keep);
    }

    #[test]
    fn platform_error_message_is_passed_through() {
        let err = StartupError::Platform("failed to enable auto-start: denied".into());
        assert_eq!(err.to_string(), "failed to enable auto-start: denied");
    }
}
