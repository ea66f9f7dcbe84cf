//! Unishot configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/unishot/config.toml`
//! - macOS: `~/Library/Application Support/unishot/config.toml`
//! - Windows: `%APPDATA%/unishot/config.toml`
//!
//! `UNISHOT_CONFIG` overrides the location.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Which tray implementation to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Operating-system tray icon.
    ///
    /// On Linux the appindicator tray reports menu selections only. Icon
    /// clicks never arrive, so screenshots cannot be triggered from the icon
    /// there. The `console` backend accepts `click` instead.
    #[default]
    Native,
    /// Text commands on stdin.
    Console,
}

/// Unishot configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Tooltip shown on the tray icon.
    #[serde(default = "default_tooltip")]
    pub tooltip: String,

    /// PNG used as the tray icon (bundled image when unset).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_path: Option<PathBuf>,

    #[serde(default)]
    pub backend: BackendKind,

    /// Program and arguments run on a screenshot request.
    #[serde(default = "default_screenshot_command")]
    pub screenshot_command: Vec<String>,

    /// Program and arguments run when "Options" is selected.
    /// Empty opens this file with the platform opener.
    #[serde(default)]
    pub options_command: Vec<String>,

    /// Register Unishot to start at login.
    #[serde(default)]
    pub launch_on_startup: bool,
}

fn default_tooltip() -> String {
    unishot_tray::DEFAULT_TOOLTIP.into()
}

fn default_screenshot_command() -> Vec<String> {
    let argv: &[&str] = if cfg!(target_os = "windows") {
        &["explorer", "ms-screenclip:"]
    } else if cfg!(target_os = "macos") {
        &["screencapture", "-i", "-c"]
    } else {
        &["flameshot", "gui"]
    };
    argv.iter().map(|s| s.to_string()).collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tooltip: default_tooltip(),
            icon_path: None,
            backend: BackendKind::default(),
            screenshot_command: default_screenshot_command(),
            options_command: Vec::new(),
            launch_on_startup: false,
        }
    }
}

impl Config {
    /// Loads configuration from disk, or creates a default if not found.
    pub fn load() -> anyhow::Result<(Self, PathBuf)> {
        let path = config_path()?;
        let config = Self::load_from(&path)?;
        Ok((config, path))
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Saves the configuration to `path`.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        // Restrict permissions on Unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Command that opens the options, resolved against the config file.
    pub fn resolved_options_command(&self, config_path: &Path) -> Vec<String> {
        if !self.options_command.is_empty() {
            return self.options_command.clone();
        }
        let opener: &[&str] = if cfg!(target_os = "windows") {
            &["notepad"]
        } else if cfg!(target_os = "macos") {
            &["open"]
        } else {
            &["xdg-open"]
        };
        opener
            .iter()
            .map(|s| s.to_string())
            .chain(std::iter::once(config_path.display().to_string()))
            .collect()
    }
}

/// Returns the platform-specific configuration file path.
fn config_path() -> anyhow::Result<PathBuf> {
    if let Some(path) = std::env::var_os("UNISHOT_CONFIG") {
        return Ok(PathBuf::from(path));
    }

    #[cfg(target_os = "linux")]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        Ok(PathBuf::from(home)
            .join(".config")
            .join("unishot")
            .join("config.toml"))
    }

    #[cfg(target_os = "macos")]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        Ok(PathBuf::from(home)
            .join("Library")
            .join("Application Support")
            .join("unishot")
            .join("config.toml"))
    }

    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        Ok(PathBuf::from(appdata).join("unishot").join("config.toml"))
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        Ok(PathBuf::from("/tmp/unishot/config.toml"))
    }
}
