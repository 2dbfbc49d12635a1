//! Traversal state machine.
//!
//! # Data Flow
//! ```text
//! Next::run / Next::fail
//!     → undo this frame's last trim (restore)
//!     → scan layers from `index` (prefix, boundary, mode filters)
//!     → trim the matched mount prefix
//!     → invoke handler with a fresh Next
//!     → handler Err / panic → resume with that error
//!     → registry exhausted → spawn the outer continuation
//! ```
//!
//! # Design Decisions
//! - A frame is owned by exactly one `Next`; taking it out is what makes the
//!   continuation one-shot
//! - Skips are a loop, never recursion
//! - Exhaustion always yields to the runtime before the outer continuation runs

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tracing::Instrument;

use crate::http::error::{DispatchError, Fault};
use crate::http::request::Request;
use crate::http::response::Response;
use crate::http::terminal::Terminal;
use crate::observability::metrics;
use crate::routing::layer::Layer;
use crate::routing::path::{self, Trim};
use crate::routing::router::Dispatcher;

/// Where control goes once a frame runs out of layers.
pub(crate) enum Done {
    /// Back into the enclosing dispatcher's chain.
    Parent(Next),
    /// Top level: hand the request to the terminal collaborator.
    Terminal(Arc<dyn Terminal>),
}

/// Per-dispatcher traversal state.
pub(crate) struct Frame {
    dispatcher: Arc<Dispatcher>,
    index: usize,
    proto_host: Option<String>,
    trim: Option<Trim>,
    res: Response,
    done: Done,
}

impl Frame {
    pub(crate) fn enter(
        dispatcher: Arc<Dispatcher>,
        req: &Request,
        res: Response,
        done: Done,
    ) -> Self {
        Self {
            dispatcher,
            index: 0,
            proto_host: path::proto_host(req.url()).map(str::to_owned),
            trim: None,
            res,
            done,
        }
    }
}

/// Continuation handed to every handler.
///
/// Consumed by `run`, `fail` or `resume`. Dropping it without calling any of
/// them ends the traversal; the response must then have been completed.
pub struct Next {
    slot: Arc<Mutex<Option<Frame>>>,
}

impl Next {
    fn new(frame: Frame) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(frame))),
        }
    }

    /// Second handle onto the same continuation, kept by the engine.
    fn share(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }

    fn take(&self) -> Option<Frame> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    /// Whether this continuation has already been used.
    pub fn is_spent(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Continue with no error. Inside an error handler this clears the error.
    pub async fn run(self, req: Request) {
        self.resume(req, None).await
    }

    /// Continue with an error; only error handlers run until it is cleared.
    pub fn fail(
        self,
        req: Request,
        err: impl Into<DispatchError>,
    ) -> impl Future<Output = ()> + Send {
        let err = err.into();
        self.resume(req, Some(err))
    }

    /// Continue with an optional error.
    pub async fn resume(self, req: Request, err: Option<DispatchError>) {
        match self.take() {
            Some(frame) => advance(frame, req, err).await,
            None => tracing::warn!(
                request_id = %req.id(),
                "continuation invoked more than once; ignoring"
            ),
        }
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next").field("spent", &self.is_spent()).finish()
    }
}

/// Restore, scan, trim, invoke.
pub(crate) fn advance(
    mut frame: Frame,
    mut req: Request,
    err: Option<DispatchError>,
) -> BoxFuture<'static, ()> {
    Box::pin(async move {
        if let Some(trim) = frame.trim.take() {
            req.ascend(&trim, frame.proto_host.as_deref());
        }

        let dispatcher = Arc::clone(&frame.dispatcher);
        loop {
            let Some(layer) = dispatcher.layers().get(frame.index) else {
                exhaust(frame, req, err);
                return;
            };
            frame.index += 1;

            if !layer.matcher().matches(req.path()) {
                tracing::trace!(
                    mount = layer.mount_path(),
                    path = req.path(),
                    "mount did not match"
                );
                continue;
            }
            if !layer.kind().accepts(err.is_some()) {
                tracing::trace!(
                    layer = layer.name(),
                    kind = layer.kind().label(),
                    "skipped for propagation mode"
                );
                continue;
            }

            frame.trim = req.descend(layer.matcher().prefix_len(), frame.proto_host.as_deref());
            invoke(layer.clone(), frame, req, err).await;
            return;
        }
    })
}

async fn invoke(layer: Layer, frame: Frame, req: Request, err: Option<DispatchError>) {
    tracing::debug!(
        layer = layer.name(),
        mount = layer.mount_path(),
        original_url = req.original_url(),
        "invoking layer"
    );
    metrics::record_layer_invoked(layer.kind().label());

    let res = frame.res.clone();
    let next = Next::new(frame);
    let recovery = next.share();
    let recovery_req = req.clone();

    let call = async move { layer.call(err, req, res, next).await };
    let fault = match AssertUnwindSafe(call).catch_unwind().await {
        Ok(Ok(())) => return,
        Ok(Err(err)) => {
            metrics::record_fault("error");
            err
        }
        Err(payload) => {
            metrics::record_fault("panic");
            DispatchError::from(Fault::from_panic(payload))
        }
    };

    match recovery.take() {
        Some(frame) => advance(frame, recovery_req, Some(fault)).await,
        None => tracing::error!(
            request_id = %recovery_req.id(),
            error = %fault,
            "handler failed after passing control on; error dropped"
        ),
    }
}

fn exhaust(frame: Frame, req: Request, err: Option<DispatchError>) {
    tracing::trace!(
        dispatcher = %frame.dispatcher.id(),
        error = err.is_some(),
        "registry exhausted"
    );
    metrics::record_exhausted(err.is_some());

    let Frame { res, done, .. } = frame;
    let outer = async move {
        match done {
            Done::Parent(next) => next.resume(req, err).await,
            Done::Terminal(terminal) => terminal.finish(req, res, err).await,
        }
    };
    tokio::spawn(outer.instrument(tracing::Span::current()));
}
