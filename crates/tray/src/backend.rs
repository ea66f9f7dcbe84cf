//! Contract between the controller and a native tray implementation.
//!
//! A backend owns the OS icon and menu and pumps their events. It never sees
//! host handlers: activations are forwarded to the [`Trampoline`] it receives
//! in [`TrayBackend::init`], and termination is observed through the shared
//! [`LoopSignal`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::controller::Trampoline;
use crate::error::BackendError;
use crate::tray::TrayIcon;

/// Result of a single loop step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopStep {
    /// Zero or one event was dispatched; keep pumping.
    Continue,
    /// Termination has completed; no more events will arrive.
    Terminated,
}

/// A native tray implementation.
pub trait TrayBackend {
    /// Creates the icon and menu.
    fn init(
        &mut self,
        icon: &TrayIcon,
        trampoline: Trampoline,
        signal: LoopSignal,
    ) -> Result<(), BackendError>;

    /// Pumps one native event.
    ///
    /// Must return [`LoopStep::Terminated`] once exit has been requested on
    /// the signal, and must return (with `Continue`) when the signal is woken.
    fn run_loop_step(&mut self, block: bool) -> LoopStep;

    /// Applies a changed descriptor (tooltip, icon) to the live tray.
    fn update(&mut self, icon: &TrayIcon) -> Result<(), BackendError>;

    /// Destroys the icon and menu. Called once after the loop ends.
    fn teardown(&mut self);
}

impl<B: TrayBackend + ?Sized> TrayBackend for &mut B {
    fn init(
        &mut self,
        icon: &TrayIcon,
        trampoline: Trampoline,
        signal: LoopSignal,
    ) -> Result<(), BackendError> {
        (**self).init(icon, trampoline, signal)
    }

    fn run_loop_step(&mut self, block: bool) -> LoopStep {
        (**self).run_loop_step(block)
    }

    fn update(&mut self, icon: &TrayIcon) -> Result<(), BackendError> {
        (**self).update(icon)
    }

    fn teardown(&mut self) {
        (**self).teardown()
    }
}

impl<B: TrayBackend + ?Sized> TrayBackend for Box<B> {
    fn init(
        &mut self,
        icon: &TrayIcon,
        trampoline: Trampoline,
        signal: LoopSignal,
    ) -> Result<(), BackendError> {
        (**self).init(icon, trampoline, signal)
    }

    fn run_loop_step(&mut self, block: bool) -> LoopStep {
        (**self).run_loop_step(block)
    }

    fn update(&mut self, icon: &TrayIcon) -> Result<(), BackendError> {
        (**self).update(icon)
    }

    fn teardown(&mut self) {
        (**self).teardown()
    }
}

type Waker = Box<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct SignalInner {
    exit: AtomicBool,
    waker: Mutex<Option<Waker>>,
}

/// Exit flag plus loop waker shared by the controller and the backend.
#[derive(Clone, Default)]
pub struct LoopSignal {
    inner: Arc<SignalInner>,
}

impl LoopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks the loop to unwind. Returns `true` only for the first request.
    ///
    /// Safe to call from inside a backend callback.
    pub fn request_exit(&self) -> bool {
        let first = !self.inner.exit.swap(true, Ordering::SeqCst);
        if first {
            self.wake();
        }
        first
    }

    pub fn exit_requested(&self) -> bool {
        self.inner.exit.load(Ordering::SeqCst)
    }

    /// Installs the function that interrupts a blocked loop step.
    pub fn set_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        *self.lock_waker() = Some(Box::new(waker));
    }

    pub fn clear_waker(&self) {
        self.lock_waker().take();
    }

    /// Interrupts a blocked loop step, if a waker is installed.
    pub fn wake(&self) {
        if let Some(waker) = self.lock_waker().as_ref() {
            waker();
        }
    }

    fn lock_waker(&self) -> std::sync::MutexGuard<'_, Option<Waker>> {
        self.inner.waker.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for LoopSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopSignal")
            .field("exit_requested", &self.exit_requested())
            .finish()
    }
}
