//! OS tray backend built on `tray-icon`.
//!
//! The loop thread pumps the platform event queue itself: GTK on Linux and a
//! Win32 message loop on Windows. Menu and icon events collected by
//! `tray-icon` during the pump are then forwarded to the trampoline.
//!
//! # Platform notes
//! - Linux: libappindicator does not report icon clicks, only menu items.
//! - macOS needs an `NSApplication` run loop and is not supported here.

use std::sync::atomic::{AtomicBool, Ordering};

use tray_icon::menu::{CheckMenuItem, Menu, MenuEvent, MenuId, PredefinedMenuItem};
use tray_icon::{Icon, MouseButton, MouseButtonState, TrayIconBuilder, TrayIconEvent};

use crate::backend::{LoopSignal, LoopStep, TrayBackend};
use crate::controller::Trampoline;
use crate::error::BackendError;
use crate::menu::{MenuItem, MenuItemKind};
use crate::tray::{IconResource, TrayIcon};

/// Only one native icon may exist per process.
static NATIVE_ACTIVE: AtomicBool = AtomicBool::new(false);

const BUNDLED_ICON_SIZE: u32 = 32;

/// System tray backed by the operating system.
pub struct NativeBackend {
    tray: Option<tray_icon::TrayIcon>,
    items: Vec<(MenuId, MenuItem)>,
    icon: Option<TrayIcon>,
    trampoline: Option<Trampoline>,
    signal: Option<LoopSignal>,
}

impl Default for NativeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeBackend {
    pub fn new() -> Self {
        Self {
            tray: None,
            items: Vec::new(),
            icon: None,
            trampoline: None,
            signal: None,
        }
    }

    fn build(&mut self, icon: &TrayIcon) -> Result<tray_icon::TrayIcon, BackendError> {
        let menu = Menu::new();
        for item in &icon.menu {
            match item.kind {
                MenuItemKind::Separator => menu
                    .append(&PredefinedMenuItem::separator())
                    .map_err(|e| BackendError::Menu(e.to_string()))?,
                MenuItemKind::Action if item.checked => {
                    let native = CheckMenuItem::new(&item.label, item.enabled, true, None);
                    self.items.push((native.id().clone(), item.clone()));
                    menu.append(&native)
                        .map_err(|e| BackendError::Menu(e.to_string()))?;
                }
                MenuItemKind::Action => {
                    let native = tray_icon::menu::MenuItem::new(&item.label, item.enabled, None);
                    self.items.push((native.id().clone(), item.clone()));
                    menu.append(&native)
                        .map_err(|e| BackendError::Menu(e.to_string()))?;
                }
            }
        }

        TrayIconBuilder::new()
            .with_menu(Box::new(menu))
            .with_menu_on_left_click(false)
            .with_tooltip(&icon.tooltip)
            .with_icon(load_icon(&icon.icon)?)
            .build()
            .map_err(|e| BackendError::Platform(e.to_string()))
    }

    fn drain_events(&self) {
        let (Some(trampoline), Some(icon)) = (&self.trampoline, &self.icon) else {
            return;
        };

        while let Ok(event) = MenuEvent::receiver().try_recv() {
            match self.items.iter().find(|(id, _)| *id == event.id) {
                Some((_, item)) => trampoline.activate_item(item),
                None => tracing::debug!(id = ?event.id, "unknown menu event"),
            }
        }

        while let Ok(event) = TrayIconEvent::receiver().try_recv() {
            if let TrayIconEvent::Click {
                button: MouseButton::Left,
                button_state: MouseButtonState::Up,
                ..
            } = event
            {
                if let Some(target) = icon.on_icon_activate {
                    trampoline.activate(target);
                }
            }
        }
    }
}

impl TrayBackend for NativeBackend {
    fn init(
        &mut self,
        icon: &TrayIcon,
        trampoline: Trampoline,
        signal: LoopSignal,
    ) -> Result<(), BackendError> {
        if NATIVE_ACTIVE
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(BackendError::Platform(
                "a native tray already exists in this process".into(),
            ));
        }

        let result = platform::init(&signal).and_then(|()| self.build(icon));
        match result {
            Ok(tray) => {
                self.tray = Some(tray);
                self.icon = Some(icon.clone());
                self.trampoline = Some(trampoline);
                self.signal = Some(signal);
                tracing::debug!(items = self.items.len(), "native tray created");
                Ok(())
            }
            Err(e) => {
                self.items.clear();
                signal.clear_waker();
                NATIVE_ACTIVE.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    fn run_loop_step(&mut self, block: bool) -> LoopStep {
        let exit_requested = self
            .signal
            .as_ref()
            .is_none_or(LoopSignal::exit_requested);
        if exit_requested {
            return LoopStep::Terminated;
        }

        let alive = platform::pump(block);
        self.drain_events();

        if alive {
            LoopStep::Continue
        } else {
            tracing::info!("platform closed the tray");
            LoopStep::Terminated
        }
    }

    fn update(&mut self, icon: &TrayIcon) -> Result<(), BackendError> {
        let Some(tray) = &self.tray else {
            return Ok(());
        };
        tray.set_tooltip(Some(&icon.tooltip))
            .map_err(|e| BackendError::Platform(e.to_string()))?;
        if self.icon.as_ref().map(|i| &i.icon) != Some(&icon.icon) {
            tray.set_icon(Some(load_icon(&icon.icon)?))
                .map_err(|e| BackendError::Platform(e.to_string()))?;
        }
        self.icon = Some(icon.clone());
        Ok(())
    }

    fn teardown(&mut self) {
        if let Some(signal) = self.signal.take() {
            signal.clear_waker();
        }
        // Dropping the tray removes the icon from the status area.
        self.tray = None;
        self.items.clear();
        self.trampoline = None;
        self.icon = None;
        NATIVE_ACTIVE.store(false, Ordering::SeqCst);
        tracing::debug!("native tray destroyed");
    }
}

impl Drop for NativeBackend {
    fn drop(&mut self) {
        // Covers a loop that unwound before teardown ran.
        if self.tray.is_some() {
            self.teardown();
        }
    }
}

fn load_icon(resource: &IconResource) -> Result<Icon, BackendError> {
    let (rgba, width, height) = match resource {
        IconResource::Bundled => (bundled_icon_rgba(), BUNDLED_ICON_SIZE, BUNDLED_ICON_SIZE),
        IconResource::File(path) => {
            let image = image::open(path)
                .map_err(|e| BackendError::Icon(format!("{}: {e}", path.display())))?
                .into_rgba8();
            let (width, height) = image.dimensions();
            (image.into_raw(), width, height)
        }
    };
    Icon::from_rgba(rgba, width, height).map_err(|e| BackendError::Icon(e.to_string()))
}

/// Draws the default icon: a filled disc with a lens ring.
fn bundled_icon_rgba() -> Vec<u8> {
    let size = BUNDLED_ICON_SIZE as i32;
    let center = size / 2;
    let mut rgba = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let dx = x - center;
            let dy = y - center;
            let d2 = dx * dx + dy * dy;
            let pixel = if d2 <= 5 * 5 {
                [0xff, 0xff, 0xff, 0xff]
            } else if d2 <= 8 * 8 {
                [0x20, 0x20, 0x28, 0xff]
            } else if d2 <= 14 * 14 {
                [0x3a, 0x7b, 0xd5, 0xff]
            } else {
                [0, 0, 0, 0]
            };
            rgba.extend_from_slice(&pixel);
        }
    }
    rgba
}

#[cfg(target_os = "linux")]
mod platform {
    use crate::backend::LoopSignal;
    use crate::error::BackendError;

    pub(super) fn init(signal: &LoopSignal) -> Result<(), BackendError> {
        gtk::init().map_err(|e| BackendError::Platform(e.to_string()))?;
        tracing::warn!("appindicator reports no icon clicks; only menu items are active");
        signal.set_waker(|| gtk::glib::MainContext::default().wakeup());
        Ok(())
    }

    pub(super) fn pump(block: bool) -> bool {
        gtk::main_iteration_do(block);
        true
    }
}

#[cfg(target_os = "windows")]
mod platform {
    use windows_sys::Win32::System::Threading::GetCurrentThreadId;
    use windows_sys::Win32::UI::WindowsAndMessaging::{
        DispatchMessageW, GetMessageW, MSG, PM_REMOVE, PeekMessageW, PostThreadMessageW,
        TranslateMessage, WM_NULL,
    };

    use crate::backend::LoopSignal;
    use crate::error::BackendError;

    pub(super) fn init(signal: &LoopSignal) -> Result<(), BackendError> {
        // SAFETY: no preconditions.
        let thread_id = unsafe { GetCurrentThreadId() };
        signal.set_waker(move || {
            // SAFETY: posting to a thread id is safe even if the thread is gone.
            unsafe {
                PostThreadMessageW(thread_id, WM_NULL, 0, 0);
            }
        });
        Ok(())
    }

    /// Returns `false` once `WM_QUIT` has been received.
    pub(super) fn pump(block: bool) -> bool {
        // SAFETY: MSG is plain data and every call gets a valid pointer to it.
        unsafe {
            let mut msg: MSG = std::mem::zeroed();
            if block {
                if GetMessageW(&mut msg, std::ptr::null_mut(), 0, 0) <= 0 {
                    return false;
                }
            } else if PeekMessageW(&mut msg, std::ptr::null_mut(), 0, 0, PM_REMOVE) == 0 {
                return true;
            }
            TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
        true
    }
}

#[cfg(not(any(target_os = "linux", target_os = "windows")))]
mod platform {
    use crate::backend::LoopSignal;
    use crate::error::BackendError;

    pub(super) fn init(_signal: &LoopSignal) -> Result<(), BackendError> {
        Err(BackendError::Unsupported)
    }

    pub(super) fn pump(_block: bool) -> bool {
        false
    }
}
