//! Error types for the tray core.

use crate::handler::HandlerError;
use crate::registry::Slot;

/// Errors produced by a tray backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("tray backend not supported on this platform")]
    Unsupported,

    #[error("icon error: {0}")]
    Icon(String),

    #[error("menu error: {0}")]
    Menu(String),

    #[error("platform error: {0}")]
    Platform(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors produced by registration and the tray lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum TrayError {
    #[error("handler for `{0}` is not callable")]
    InvalidHandler(Slot),

    #[error("registration failed, not callable: {}", join_slots(.invalid))]
    Registration { invalid: Vec<Slot> },

    #[error("failed to create tray: {0}")]
    Init(#[from] BackendError),

    #[error("tray already running")]
    AlreadyRunning,

    #[error("handler for `{slot}` failed: {source}")]
    HandlerInvocation {
        slot: Slot,
        #[source]
        source: HandlerError,
    },
}

/// Error class a host runtime should raise for a [`TrayError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostErrorKind {
    TypeError,
    RuntimeError,
}

impl TrayError {
    pub fn host_kind(&self) -> HostErrorKind {
        match self {
            TrayError::InvalidHandler(_) | TrayError::Registration { .. } => {
                HostErrorKind::TypeError
            }
            _ => HostErrorKind::RuntimeError,
        }
    }
}

fn join_slots(slots: &[Slot]) -> String {
    slots
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_message_lists_slots() {
        let err = TrayError::Registration {
            invalid: vec![Slot::Options, Slot::Quit],
        };
        assert_eq!(
            err.to_string(),
            "registration failed, not callable: options, quit"
        );
    }

    #[test]
    fn host_kind_mapping() {
        assert_eq!(
            TrayError::InvalidHandler(Slot::Screenshot).host_kind(),
            HostErrorKind::TypeError
        );
        assert_eq!(
            TrayError::Init(BackendError::Unsupported).host_kind(),
            HostErrorKind::RuntimeError
        );
        assert_eq!(
            TrayError::AlreadyRunning.host_kind(),
            HostErrorKind::RuntimeError
        );
    }
}
