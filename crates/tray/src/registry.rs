//! Slot-keyed storage for host handlers.
//!
//! One mutex guards every slot. Swaps happen under it, and `invoke` only
//! holds it long enough to clone the handle, so a handler replaced while it
//! runs finishes on its own reference and is released afterwards.

use std::fmt;
use std::sync::{Mutex, MutexGuard};

use crate::error::TrayError;
use crate::handler::HandlerRef;

/// A logical action slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Screenshot,
    Options,
    Quit,
    /// Left-click on the icon itself. Falls back to `Screenshot` when unbound.
    Icon,
}

impl Slot {
    pub const ALL: [Slot; 4] = [Slot::Screenshot, Slot::Options, Slot::Quit, Slot::Icon];

    pub fn as_str(self) -> &'static str {
        match self {
            Slot::Screenshot => "screenshot",
            Slot::Options => "options",
            Slot::Quit => "quit",
            Slot::Icon => "icon",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Default)]
struct Slots {
    screenshot: Option<HandlerRef>,
    options: Option<HandlerRef>,
    quit: Option<HandlerRef>,
    icon: Option<HandlerRef>,
}

impl Slots {
    fn get_mut(&mut self, slot: Slot) -> &mut Option<HandlerRef> {
        match slot {
            Slot::Screenshot => &mut self.screenshot,
            Slot::Options => &mut self.options,
            Slot::Quit => &mut self.quit,
            Slot::Icon => &mut self.icon,
        }
    }
}

/// Handler registry shared between the host and the loop thread.
#[derive(Default)]
pub struct Registry {
    slots: Mutex<Slots>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        // A poisoned lock only means a panic elsewhere; the slots are still
        // consistent because every mutation is a single assignment.
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Binds `handler` to `slot`, releasing the previous occupant.
    pub fn register(&self, slot: Slot, handler: HandlerRef) -> Result<(), TrayError> {
        if !handler.is_callable() {
            return Err(TrayError::InvalidHandler(slot));
        }
        let previous = {
            let mut slots = self.lock();
            slots.get_mut(slot).replace(handler)
        };
        // Released outside the lock; an in-flight call still holds its clone.
        drop(previous);
        tracing::debug!(%slot, "handler registered");
        Ok(())
    }

    /// Binds several slots at once, or none of them.
    pub fn register_all(&self, entries: Vec<(Slot, HandlerRef)>) -> Result<(), TrayError> {
        let invalid: Vec<Slot> = entries
            .iter()
            .filter(|(_, h)| !h.is_callable())
            .map(|(slot, _)| *slot)
            .collect();
        if !invalid.is_empty() {
            return Err(TrayError::Registration { invalid });
        }

        let mut released = Vec::with_capacity(entries.len());
        {
            let mut slots = self.lock();
            for (slot, handler) in entries {
                if let Some(prev) = slots.get_mut(slot).replace(handler) {
                    released.push(prev);
                }
            }
        }
        drop(released);
        Ok(())
    }

    /// Returns a new reference to the handler bound to `slot`.
    pub fn get(&self, slot: Slot) -> Option<HandlerRef> {
        self.lock().get_mut(slot).clone()
    }

    pub fn is_bound(&self, slot: Slot) -> bool {
        self.lock().get_mut(slot).is_some()
    }

    pub fn is_empty(&self) -> bool {
        Slot::ALL.iter().all(|s| !self.is_bound(*s))
    }

    /// Invokes the handler bound to `slot`. Unbound slots are a no-op.
    pub fn invoke(&self, slot: Slot) -> Result<(), TrayError> {
        let Some(handler) = self.get(slot) else {
            tracing::debug!(%slot, "no handler bound");
            return Ok(());
        };
        handler
            .invoke()
            .map_err(|source| TrayError::HandlerInvocation { slot, source })
    }

    /// Releases every bound handler. Safe to call repeatedly.
    pub fn release_all(&self) {
        let released: Vec<HandlerRef> = {
            let mut slots = self.lock();
            Slot::ALL
                .iter()
                .filter_map(|s| slots.get_mut(*s).take())
                .collect()
        };
        if !released.is_empty() {
            tracing::debug!(count = released.len(), "handlers released");
        }
    }
}
