//! Scripted backend used by the controller tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, mpsc};

use crate::backend::{LoopSignal, LoopStep, TrayBackend};
use crate::controller::Trampoline;
use crate::error::BackendError;
use crate::menu::Activation;
use crate::tray::TrayIcon;

/// One loop step worth of native behaviour.
pub(crate) enum Script {
    Activate(Activation),
    /// Activates the menu item at a 0-based position.
    ActivateItem(usize),
    /// Several activations delivered within the same step.
    Burst(Vec<Activation>),
    /// Signals `entered`, then blocks until `resume` fires.
    Pause {
        entered: mpsc::Sender<()>,
        resume: mpsc::Receiver<()>,
    },
    /// The platform tore the tray down on its own.
    ExternalExit,
}

#[derive(Default)]
struct ProbeInner {
    inits: AtomicUsize,
    steps: AtomicUsize,
    teardowns: AtomicUsize,
    wakes: Arc<AtomicUsize>,
    exit_seen: AtomicBool,
    tooltips: Mutex<Vec<String>>,
}

/// Observations of what the controller did to the backend.
#[derive(Clone, Default)]
pub(crate) struct Probe(Arc<ProbeInner>);

impl Probe {
    pub(crate) fn inits(&self) -> usize {
        self.0.inits.load(Ordering::SeqCst)
    }

    pub(crate) fn steps(&self) -> usize {
        self.0.steps.load(Ordering::SeqCst)
    }

    pub(crate) fn teardowns(&self) -> usize {
        self.0.teardowns.load(Ordering::SeqCst)
    }

    pub(crate) fn wakes(&self) -> usize {
        self.0.wakes.load(Ordering::SeqCst)
    }

    pub(crate) fn exit_seen(&self) -> bool {
        self.0.exit_seen.load(Ordering::SeqCst)
    }

    pub(crate) fn tooltips(&self) -> Vec<String> {
        self.0.tooltips.lock().unwrap().clone()
    }
}

pub(crate) struct ScriptedBackend {
    script: VecDeque<Script>,
    fail_init: bool,
    probe: Probe,
    icon: Option<TrayIcon>,
    trampoline: Option<Trampoline>,
    signal: Option<LoopSignal>,
}

impl ScriptedBackend {
    pub(crate) fn new(script: Vec<Script>) -> (Self, Probe) {
        let probe = Probe::default();
        let backend = Self {
            script: script.into(),
            fail_init: false,
            probe: probe.clone(),
            icon: None,
            trampoline: None,
            signal: None,
        };
        (backend, probe)
    }

    pub(crate) fn failing_init() -> (Self, Probe) {
        let (mut backend, probe) = Self::new(vec![]);
        backend.fail_init = true;
        (backend, probe)
    }
}

impl TrayBackend for ScriptedBackend {
    fn init(
        &mut self,
        icon: &TrayIcon,
        trampoline: Trampoline,
        signal: LoopSignal,
    ) -> Result<(), BackendError> {
        if self.fail_init {
            return Err(BackendError::Platform("no status area".into()));
        }
        self.probe.0.inits.fetch_add(1, Ordering::SeqCst);
        let wakes = Arc::clone(&self.probe.0.wakes);
        signal.set_waker(move || {
            wakes.fetch_add(1, Ordering::SeqCst);
        });
        self.icon = Some(icon.clone());
        self.trampoline = Some(trampoline);
        self.signal = Some(signal);
        Ok(())
    }

    fn run_loop_step(&mut self, _block: bool) -> LoopStep {
        self.probe.0.steps.fetch_add(1, Ordering::SeqCst);
        let (Some(trampoline), Some(signal), Some(icon)) =
            (&self.trampoline, &self.signal, &self.icon)
        else {
            return LoopStep::Terminated;
        };
        if signal.exit_requested() {
            self.probe.0.exit_seen.store(true, Ordering::SeqCst);
            return LoopStep::Terminated;
        }
        match self.script.pop_front() {
            Some(Script::Activate(target)) => trampoline.activate(target),
            Some(Script::ActivateItem(index)) => trampoline.activate_item(&icon.menu[index]),
            Some(Script::Burst(targets)) => {
                for target in targets {
                    trampoline.activate(target);
                }
            }
            Some(Script::Pause { entered, resume }) => {
                let _ = entered.send(());
                let _ = resume.recv();
            }
            Some(Script::ExternalExit) | None => return LoopStep::Terminated,
        }
        LoopStep::Continue
    }

    fn update(&mut self, icon: &TrayIcon) -> Result<(), BackendError> {
        self.probe
            .0
            .tooltips
            .lock()
            .unwrap()
            .push(icon.tooltip.clone());
        Ok(())
    }

    fn teardown(&mut self) {
        self.probe.0.teardowns.fetch_add(1, Ordering::SeqCst);
        self.trampoline = None;
    }
}
