//! Propagated errors.
//!
//! # Responsibilities
//! - Carry an opaque error value through continuations
//! - Convert handler faults (returned errors, panics) into that value
//! - Offer an optional HTTP status hint to the terminal collaborator
//!
//! # Design Decisions
//! - The engine never inspects the payload; only the terminal collaborator reads it
//! - Cheap to clone (`Arc`), since skipped layers carry it forward unchanged
//! - Does not implement `std::error::Error` itself so any error converts via `From`

use std::any::Any;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use axum::http::StatusCode;
use thiserror::Error;

/// Errors synthesized by the dispatch engine itself.
#[derive(Debug, Error)]
pub enum Fault {
    /// Free-form message raised by a handler.
    #[error("{0}")]
    Message(String),

    /// A handler panicked while it was being polled.
    #[error("handler panicked: {0}")]
    Panic(String),
}

impl Fault {
    /// Build a `Fault::Panic` from a caught panic payload.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Fault::Panic(message)
    }
}

/// The error value threaded through `Next` until cleared or surfaced.
#[derive(Clone)]
pub struct DispatchError {
    source: Arc<dyn StdError + Send + Sync>,
    status: Option<StatusCode>,
}

impl DispatchError {
    /// Wrap any error.
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            source: Arc::new(error),
            status: None,
        }
    }

    /// Error carrying only a message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(Fault::Message(message.into()))
    }

    /// Attach an HTTP status hint.
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    /// The status hint, if any.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Borrow the wrapped error.
    pub fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
        &*self.source
    }

    /// Downcast the wrapped error to a concrete type.
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.source.downcast_ref::<E>()
    }

    /// Whether this error came from a caught panic.
    pub fn is_panic(&self) -> bool {
        matches!(self.downcast_ref::<Fault>(), Some(Fault::Panic(_)))
    }

    /// Display string including the `source()` chain, outermost first.
    pub fn chain(&self) -> String {
        let mut out = self.source.to_string();
        let mut cause = self.source.source();
        while let Some(err) = cause {
            out.push_str(": ");
            out.push_str(&err.to_string());
            cause = err.source();
        }
        out
    }
}

impl<E> From<E> for DispatchError
where
    E: StdError + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        Self::new(error)
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.source, f)
    }
}

impl fmt::Debug for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchError")
            .field("source", &self.source)
            .field("status", &self.status)
            .finish()
    }
}
