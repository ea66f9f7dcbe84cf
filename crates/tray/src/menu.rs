//! Fixed context menu for the tray.

/// Dispatch target of a native activation.
///
/// Menu items are bound to one of these, never to a handler, so handlers can
/// be swapped after the menu has been handed to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Activation {
    /// "Options" menu item.
    Options,
    /// "Quit" menu item.
    Quit,
    /// Click on the tray icon itself.
    Icon,
}

/// Kind of a menu entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuItemKind {
    Action,
    Separator,
}

/// A single menu item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItem {
    /// Display text.
    pub label: String,
    pub kind: MenuItemKind,
    /// Whether the item is enabled (clickable).
    pub enabled: bool,
    pub checked: bool,
    /// Trampoline target triggered on click.
    pub on_activate: Option<Activation>,
}

impl MenuItem {
    /// An enabled action item.
    pub fn action(label: impl Into<String>, target: Activation) -> Self {
        Self {
            label: label.into(),
            kind: MenuItemKind::Action,
            enabled: true,
            checked: false,
            on_activate: Some(target),
        }
    }

    pub fn separator() -> Self {
        Self {
            label: String::new(),
            kind: MenuItemKind::Separator,
            enabled: false,
            checked: false,
            on_activate: None,
        }
    }

    pub fn is_separator(&self) -> bool {
        self.kind == MenuItemKind::Separator
    }

    /// Target to dispatch when this item is activated, if any.
    pub fn dispatch_target(&self) -> Option<Activation> {
        match self.kind {
            MenuItemKind::Separator => None,
            MenuItemKind::Action if self.enabled => self.on_activate,
            MenuItemKind::Action => None,
        }
    }
}

/// Builds the tray menu: `Options`, separator, `Quit`.
pub fn build_menu() -> Vec<MenuItem> {
    vec![
        MenuItem::action("Options", Activation::Options),
        MenuItem::separator(),
        MenuItem::action("Quit", Activation::Quit),
    ]
}
