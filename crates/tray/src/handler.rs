//! Owned handles to host-supplied callables.
//!
//! A [`HandlerRef`] is the crate's view of a callable that lives in the host
//! runtime. Cloning it acquires a reference, dropping it releases one; the
//! registry is the only long-term owner, and the native backend never sees
//! a handler at all.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

/// Errors raised by a host handler while it runs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandlerError {
    #[error("{0}")]
    Raised(String),

    #[error("handler panicked: {0}")]
    Panicked(String),
}

/// A no-argument callable owned by the host runtime.
pub trait HostCallable: Send + Sync {
    /// Whether the object can be invoked at all.
    ///
    /// Host runtimes hand over arbitrary objects; the registry rejects the
    /// ones that report `false` before touching any slot.
    fn is_callable(&self) -> bool {
        true
    }

    /// Invokes the callable with no arguments.
    fn call(&self) -> Result<(), HandlerError>;

    /// Short description used in log lines.
    fn describe(&self) -> String {
        "<handler>".into()
    }
}

/// Adapter turning a Rust closure into a [`HostCallable`].
pub struct FnHandler<F> {
    name: String,
    f: F,
}

impl<F> FnHandler<F>
where
    F: Fn() -> Result<(), HandlerError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> HostCallable for FnHandler<F>
where
    F: Fn() -> Result<(), HandlerError> + Send + Sync,
{
    fn call(&self) -> Result<(), HandlerError> {
        (self.f)()
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

/// Reference-counted handle to a host callable.
#[derive(Clone)]
pub struct HandlerRef(Arc<dyn HostCallable>);

impl HandlerRef {
    /// Wraps a host object.
    pub fn new(callable: impl HostCallable + 'static) -> Self {
        Self(Arc::new(callable))
    }

    /// Wraps an infallible closure.
    pub fn from_fn<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::new(FnHandler::new(name, move || {
            f();
            Ok(())
        }))
    }

    pub fn is_callable(&self) -> bool {
        self.0.is_callable()
    }

    pub fn describe(&self) -> String {
        self.0.describe()
    }

    /// Calls the handler, converting a panic into [`HandlerError::Panicked`].
    ///
    /// Nothing raised here may unwind into the backend's callback stack.
    pub fn invoke(&self) -> Result<(), HandlerError> {
        match catch_unwind(AssertUnwindSafe(|| self.0.call())) {
            Ok(result) => result,
            Err(payload) => Err(HandlerError::Panicked(panic_message(payload.as_ref()))),
        }
    }

    /// Number of live references to the underlying callable.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    pub fn ptr_eq(&self, other: &HandlerRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for HandlerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HandlerRef").field(&self.describe()).finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".into()
    }
}
