//! System tray icon for Unishot.
//!
//! Registers host handlers for a fixed tray menu (Options, Quit) and for
//! clicks on the icon itself, then runs the tray's blocking event loop and
//! dispatches native activations to those handlers.
//!
//! - [`Controller`] owns the lifecycle: `Idle → Initialized → Running →
//!   Exiting → Terminated`.
//! - [`Registry`] stores [`HandlerRef`]s per [`Slot`] and releases them on
//!   replacement and at teardown.
//! - [`TrayBackend`] is the native side; [`ConsoleBackend`] is always
//!   available, [`NativeBackend`] needs the `native` feature.
//!
//! # Platform notes
//! - The thread that calls [`start`] becomes the loop thread and blocks until
//!   the tray is closed.
//! - Handlers run on the loop thread and may be replaced from any thread.

mod backend;
mod console;
mod controller;
mod error;
mod handler;
mod menu;
#[cfg(feature = "native")]
mod native;
mod registry;
#[cfg(test)]
mod testing;
mod tray;

pub use backend::{LoopSignal, LoopStep, TrayBackend};
pub use console::ConsoleBackend;
pub use controller::{Controller, ControllerState, ErrorSink, Handlers, Trampoline};
pub use error::{BackendError, HostErrorKind, TrayError};
pub use handler::{FnHandler, HandlerError, HandlerRef, HostCallable};
pub use menu::{Activation, MenuItem, MenuItemKind, build_menu};
#[cfg(feature = "native")]
pub use native::NativeBackend;
pub use registry::{Registry, Slot};
pub use tray::{DEFAULT_TOOLTIP, IconResource, TrayConfig, TrayIcon};

/// The backend used by [`start`]: the OS tray when built with `native`,
/// the console tray otherwise.
pub fn default_backend() -> Box<dyn TrayBackend> {
    #[cfg(feature = "native")]
    {
        Box::new(NativeBackend::new())
    }
    #[cfg(not(feature = "native"))]
    {
        Box::new(ConsoleBackend::stdin())
    }
}

/// Runs the process-wide tray with the given handlers until it is closed.
///
/// Fails with a `TypeError`-class error if a handler is not callable and a
/// `RuntimeError`-class error if the tray cannot be created or is already
/// running (see [`TrayError::host_kind`]).
pub fn start(screenshot: HandlerRef, options: HandlerRef, quit: HandlerRef) -> Result<(), TrayError> {
    Controller::global().start(Handlers::new(screenshot, options, quit), default_backend())
}
