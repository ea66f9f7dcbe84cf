//! Tray configuration and the icon descriptor handed to backends.

use std::path::PathBuf;

use crate::menu::{Activation, MenuItem, build_menu};

/// Tooltip used when none is configured.
pub const DEFAULT_TOOLTIP: &str = "Unishot";

/// Where the tray image comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IconResource {
    /// The image bundled with the backend.
    Bundled,
    /// A PNG on disk.
    File(PathBuf),
}

/// Configuration for the system tray.
#[derive(Debug, Clone)]
pub struct TrayConfig {
    /// Tooltip shown when hovering the icon.
    pub tooltip: String,
    /// Optional icon file; the bundled image is used otherwise.
    pub icon_path: Option<PathBuf>,
}

impl Default for TrayConfig {
    fn default() -> Self {
        Self {
            tooltip: DEFAULT_TOOLTIP.into(),
            icon_path: None,
        }
    }
}

/// Everything a backend needs to create the tray.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrayIcon {
    pub icon: IconResource,
    pub tooltip: String,
    pub menu: Vec<MenuItem>,
    pub on_icon_activate: Option<Activation>,
}

impl TrayIcon {
    pub fn new(config: &TrayConfig) -> Self {
        let icon = match &config.icon_path {
            Some(path) => IconResource::File(path.clone()),
            None => IconResource::Bundled,
        };
        Self {
            icon,
            tooltip: config.tooltip.clone(),
            menu: build_menu(),
            on_icon_activate: Some(Activation::Icon),
        }
    }

    /// Resolves a 0-based menu position to its dispatch target.
    pub fn target_at(&self, index: usize) -> Option<Activation> {
        self.menu.get(index).and_then(MenuItem::dispatch_target)
    }
}

impl Default for TrayIcon {
    fn default() -> Self {
        Self::new(&TrayConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tray_config_default() {
        let config = TrayConfig::default();
        assert_eq!(config.tooltip, "Unishot");
        assert!(config.icon_path.is_none());
    }

    #[test]
    fn icon_defaults_to_bundled() {
        let icon = TrayIcon::default();
        assert_eq!(icon.icon, IconResource::Bundled);
        assert_eq!(icon.on_icon_activate, Some(Activation::Icon));
        assert_eq!(icon.menu.len(), 3);
    }

    #[test]
    fn icon_from_path() {
        let config = TrayConfig {
            icon_path: Some(PathBuf::from("/tmp/icon.png")),
            ..TrayConfig::default()
        };
        let icon = TrayIcon::new(&config);
        assert_eq!(icon.icon, IconResource::File(PathBuf::from("/tmp/icon.png")));
    }

    #[test]
    fn target_at_skips_separator() {
        let icon = TrayIcon::default();
        assert_eq!(icon.target_at(0), Some(Activation::Options));
        assert_eq!(icon.target_at(1), None);
        assert_eq!(icon.target_at(2), Some(Activation::Quit));
        assert_eq!(icon.target_at(7), None);
    }
}
