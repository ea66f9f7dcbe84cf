//! Tray lifecycle: init, blocking loop, teardown, and activation dispatch.
//!
//! The controller owns the handler registry and the lifecycle state. A
//! [`Trampoline`] is the only thing handed to a backend; every native
//! activation goes through it, is resolved to a registry slot, and has its
//! errors contained before control returns to the backend.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard};

use crate::backend::{LoopSignal, LoopStep, TrayBackend};
use crate::error::TrayError;
use crate::handler::HandlerRef;
use crate::menu::{Activation, MenuItem};
use crate::registry::{Registry, Slot};
use crate::tray::{TrayConfig, TrayIcon};

/// Host hook receiving handler failures.
pub type ErrorSink = Arc<dyn Fn(&TrayError) + Send + Sync>;

/// Lifecycle state of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Initialized,
    Running,
    Exiting,
    Terminated,
}

impl ControllerState {
    /// Whether `start` may be called from this state.
    pub fn can_start(self) -> bool {
        matches!(self, ControllerState::Idle | ControllerState::Terminated)
    }
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ControllerState::Idle => "idle",
            ControllerState::Initialized => "initialized",
            ControllerState::Running => "running",
            ControllerState::Exiting => "exiting",
            ControllerState::Terminated => "terminated",
        };
        f.write_str(s)
    }
}

/// Handlers supplied to [`Controller::start`].
#[derive(Debug, Clone)]
pub struct Handlers {
    pub screenshot: HandlerRef,
    pub options: HandlerRef,
    pub quit: HandlerRef,
    /// Separate icon-click handler; icon clicks go to `screenshot` when unset.
    pub icon: Option<HandlerRef>,
}

impl Handlers {
    pub fn new(screenshot: HandlerRef, options: HandlerRef, quit: HandlerRef) -> Self {
        Self {
            screenshot,
            options,
            quit,
            icon: None,
        }
    }

    pub fn with_icon(mut self, icon: HandlerRef) -> Self {
        self.icon = Some(icon);
        self
    }

    fn into_entries(self) -> Vec<(Slot, HandlerRef)> {
        let mut entries = vec![
            (Slot::Screenshot, self.screenshot),
            (Slot::Options, self.options),
            (Slot::Quit, self.quit),
        ];
        if let Some(icon) = self.icon {
            entries.push((Slot::Icon, icon));
        }
        entries
    }
}

struct Shared {
    state: Mutex<ControllerState>,
    registry: Registry,
    config: Mutex<TrayConfig>,
    error_sink: Mutex<Option<ErrorSink>>,
    pending_tooltip: Mutex<Option<String>>,
    signal: Mutex<Option<LoopSignal>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl Shared {
    fn state(&self) -> ControllerState {
        *lock(&self.state)
    }

    fn set_state(&self, next: ControllerState) {
        let mut state = lock(&self.state);
        let from = *state;
        tracing::debug!(from = %from, to = %next, "tray state");
        *state = next;
    }

    /// Moves `from -> to` atomically. Returns whether the move happened.
    fn transition(&self, from: ControllerState, to: ControllerState) -> bool {
        let mut state = lock(&self.state);
        if *state != from {
            return false;
        }
        tracing::debug!(from = %from, to = %to, "tray state");
        *state = to;
        true
    }

    fn report(&self, err: &TrayError) {
        tracing::warn!(error = %err, "tray handler failed");
        let sink = lock(&self.error_sink).clone();
        if let Some(sink) = sink {
            if catch_unwind(AssertUnwindSafe(|| sink(err))).is_err() {
                tracing::warn!("error sink panicked");
            }
        }
    }
}

/// Native-facing dispatch entry point.
///
/// Backends call [`Trampoline::activate`] from inside their loop step.
/// Activations outside the `Running` state are dropped.
#[derive(Clone)]
pub struct Trampoline {
    shared: Arc<Shared>,
    signal: LoopSignal,
}

impl Trampoline {
    pub fn activate(&self, target: Activation) {
        if self.shared.state() != ControllerState::Running {
            tracing::debug!(?target, "activation ignored, tray not running");
            return;
        }
        match target {
            Activation::Options => self.dispatch(Slot::Options),
            Activation::Icon => {
                let slot = if self.shared.registry.is_bound(Slot::Icon) {
                    Slot::Icon
                } else {
                    Slot::Screenshot
                };
                self.dispatch(slot);
            }
            Activation::Quit => {
                if !self
                    .shared
                    .transition(ControllerState::Running, ControllerState::Exiting)
                {
                    return;
                }
                tracing::info!("quit selected");
                self.signal.request_exit();
                // Exit is already requested, so the handler cannot re-enter the loop.
                self.dispatch(Slot::Quit);
            }
        }
    }

    /// Dispatches a menu item, ignoring separators and disabled items.
    pub fn activate_item(&self, item: &MenuItem) {
        match item.dispatch_target() {
            Some(target) => self.activate(target),
            None => tracing::debug!(label = %item.label, "item not dispatchable"),
        }
    }

    fn dispatch(&self, slot: Slot) {
        tracing::debug!(%slot, "dispatching");
        if let Err(e) = self.shared.registry.invoke(slot) {
            self.shared.report(&e);
        }
    }
}

impl fmt::Debug for Trampoline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trampoline")
            .field("state", &self.shared.state())
            .finish()
    }
}

/// Releases the registry and marks the controller terminated on every exit
/// path of `start`, including unwinding out of a backend.
struct RunGuard<'a> {
    shared: &'a Shared,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if let Some(signal) = lock(&self.shared.signal).take() {
            signal.clear_waker();
        }
        self.shared.registry.release_all();
        self.shared.set_state(ControllerState::Terminated);
        tracing::info!("tray terminated");
    }
}

static GLOBAL: LazyLock<Controller> = LazyLock::new(Controller::new);

/// Owner of the tray lifecycle.
pub struct Controller {
    shared: Arc<Shared>,
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}

impl Controller {
    pub fn new() -> Self {
        Self::with_config(TrayConfig::default())
    }

    pub fn with_config(config: TrayConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(ControllerState::Idle),
                registry: Registry::new(),
                config: Mutex::new(config),
                error_sink: Mutex::new(None),
                pending_tooltip: Mutex::new(None),
                signal: Mutex::new(None),
            }),
        }
    }

    /// The process-wide controller.
    pub fn global() -> &'static Controller {
        &GLOBAL
    }

    pub fn state(&self) -> ControllerState {
        self.shared.state()
    }

    /// Replaces the tray configuration used by the next `start`.
    pub fn configure(&self, config: TrayConfig) {
        *lock(&self.shared.config) = config;
    }

    pub fn set_error_sink(&self, sink: impl Fn(&TrayError) + Send + Sync + 'static) {
        *lock(&self.shared.error_sink) = Some(Arc::new(sink));
    }

    /// Binds a handler to one slot. Allowed from any thread, in any state.
    pub fn register(&self, slot: Slot, handler: HandlerRef) -> Result<(), TrayError> {
        self.shared.registry.register(slot, handler)
    }

    pub fn is_bound(&self, slot: Slot) -> bool {
        self.shared.registry.is_bound(slot)
    }

    /// Changes the tooltip, live if the tray is running.
    pub fn set_tooltip(&self, tooltip: impl Into<String>) {
        let tooltip = tooltip.into();
        lock(&self.shared.config).tooltip = tooltip.clone();
        if let Some(signal) = lock(&self.shared.signal).as_ref() {
            *lock(&self.shared.pending_tooltip) = Some(tooltip);
            signal.wake();
        }
    }

    /// Runs the tray until it is closed.
    ///
    /// Blocks the calling thread, which becomes the loop thread, for the
    /// whole lifetime of the tray.
    pub fn start<B: TrayBackend>(&self, handlers: Handlers, mut backend: B) -> Result<(), TrayError> {
        let previous = {
            let mut state = lock(&self.shared.state);
            let previous = *state;
            if !previous.can_start() {
                tracing::warn!(state = %previous, "tray start rejected");
                return Err(TrayError::AlreadyRunning);
            }
            *state = ControllerState::Initialized;
            previous
        };

        if let Err(e) = self.shared.registry.register_all(handlers.into_entries()) {
            self.shared.set_state(previous);
            return Err(e);
        }

        let guard = RunGuard {
            shared: &self.shared,
        };

        let signal = LoopSignal::new();
        *lock(&self.shared.signal) = Some(signal.clone());
        lock(&self.shared.pending_tooltip).take();

        let mut icon = TrayIcon::new(&lock(&self.shared.config));
        let trampoline = Trampoline {
            shared: Arc::clone(&self.shared),
            signal: signal.clone(),
        };

        if let Err(e) = backend.init(&icon, trampoline, signal) {
            tracing::error!(error = %e, "tray init failed");
            return Err(TrayError::Init(e));
        }

        self.shared.set_state(ControllerState::Running);
        tracing::info!(tooltip = %icon.tooltip, "tray running");

        while backend.run_loop_step(true) == LoopStep::Continue {
            self.apply_pending(&mut backend, &mut icon);
        }

        if self
            .shared
            .transition(ControllerState::Running, ControllerState::Exiting)
        {
            tracing::info!("tray loop ended externally");
        }

        backend.teardown();
        drop(guard);
        Ok(())
    }

    fn apply_pending<B: TrayBackend>(&self, backend: &mut B, icon: &mut TrayIcon) {
        let Some(tooltip) = lock(&self.shared.pending_tooltip).take() else {
            return;
        };
        icon.tooltip = tooltip;
        if let Err(e) = backend.update(icon) {
            tracing::warn!(error = %e, "failed to update tray");
        }
    }
}
