//! Dispatcher: layer registry plus traversal entry points.
//!
//! # Responsibilities
//! - Append layers in registration order
//! - Mount sub-dispatchers and fix their absolute mount path
//! - Start a traversal at index 0, top level or nested
//!
//! # Design Decisions
//! - Registration takes `&mut self`; dispatch takes `Arc<Self>`, so the registry
//!   cannot change while a traversal is running
//! - Handler kind comes from which method registered it, never from inspection
//! - No reordering by specificity: first structural match in order wins

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use tracing::Instrument;

use crate::http::handler::{ErrorHandler, Handler};
use crate::http::request::Request;
use crate::http::response::Response;
use crate::http::terminal::{FinalHandler, Terminal};
use crate::observability::spans;
use crate::routing::frame::{self, Done, Frame, Next};
use crate::routing::layer::{Layer, LayerKind};
use crate::routing::matcher::{self, MountMatcher};

/// Global counter for dispatcher IDs.
static DISPATCHER_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a dispatcher, used as a layer's owner reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DispatcherId(u64);

impl DispatcherId {
    fn next() -> Self {
        Self(DISPATCHER_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for DispatcherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dispatcher-{}", self.0)
    }
}

/// An ordered chain of mount-scoped layers.
pub struct Dispatcher {
    id: DispatcherId,
    mount_path: String,
    full_mount_path: String,
    layers: Vec<Layer>,
    terminal: Arc<dyn Terminal>,
}

impl Dispatcher {
    /// Empty dispatcher mounted at `/`, finishing with the default `FinalHandler`.
    pub fn new() -> Self {
        Self::with_terminal(FinalHandler::default())
    }

    /// Empty dispatcher with a custom terminal collaborator.
    pub fn with_terminal(terminal: impl Terminal) -> Self {
        Self {
            id: DispatcherId::next(),
            mount_path: "/".to_string(),
            full_mount_path: "/".to_string(),
            layers: Vec::new(),
            terminal: Arc::new(terminal),
        }
    }

    /// Replace the terminal collaborator used by top-level dispatch.
    pub fn set_terminal(&mut self, terminal: impl Terminal) -> &mut Self {
        self.terminal = Arc::new(terminal);
        self
    }

    pub fn id(&self) -> DispatcherId {
        self.id
    }

    /// Mount path relative to the parent, `/` until mounted.
    pub fn mount_path(&self) -> &str {
        &self.mount_path
    }

    /// Absolute mount path, fixed when this dispatcher was mounted.
    pub fn full_mount_path(&self) -> &str {
        &self.full_mount_path
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Register a normal handler at `/`.
    pub fn register(&mut self, handler: impl Handler) -> &mut Self {
        self.register_at("/", handler)
    }

    /// Register a normal handler at `mount`.
    pub fn register_at(&mut self, mount: &str, handler: impl Handler) -> &mut Self {
        self.push(mount, LayerKind::Plain(Arc::new(handler)))
    }

    /// Register an error handler at `/`.
    pub fn register_error(&mut self, handler: impl ErrorHandler) -> &mut Self {
        self.register_error_at("/", handler)
    }

    /// Register an error handler at `mount`.
    pub fn register_error_at(&mut self, mount: &str, handler: impl ErrorHandler) -> &mut Self {
        self.push(mount, LayerKind::ErrorHandling(Arc::new(handler)))
    }

    /// Mount a sub-dispatcher; its own layers run against the trimmed path.
    pub fn mount(&mut self, mount: &str, mut sub: Dispatcher) -> &mut Self {
        let mount_path = matcher::normalize(mount);
        sub.full_mount_path = matcher::join(&self.full_mount_path, &mount_path);
        sub.mount_path = mount_path;
        tracing::debug!(
            parent = %self.id,
            child = %sub.id,
            full_mount_path = %sub.full_mount_path,
            "dispatcher mounted"
        );
        self.push(mount, LayerKind::Nested(Arc::new(sub)))
    }

    fn push(&mut self, mount: &str, kind: LayerKind) -> &mut Self {
        let layer = Layer::new(MountMatcher::new(mount), kind, self.id);
        self.layers.push(layer);
        self
    }

    /// Top-level entry: exhaustion goes to this dispatcher's terminal collaborator.
    pub async fn dispatch(self: &Arc<Self>, req: Request, res: Response) {
        self.dispatch_with(req, res, None).await
    }

    /// Entry with an optional outer continuation.
    ///
    /// With `Some(out)`, exhaustion resumes `out` instead of finishing the request,
    /// which is how an adapter embeds this dispatcher inside another chain.
    pub async fn dispatch_with(self: &Arc<Self>, req: Request, res: Response, out: Option<Next>) {
        match out {
            Some(out) => Arc::clone(self).traverse(req, res, Done::Parent(out)).await,
            None => {
                let span = spans::dispatch_span(&req);
                let done = Done::Terminal(Arc::clone(&self.terminal));
                Arc::clone(self).traverse(req, res, done).instrument(span).await
            }
        }
    }

    pub(crate) fn traverse(
        self: Arc<Self>,
        req: Request,
        res: Response,
        done: Done,
    ) -> BoxFuture<'static, ()> {
        let frame = Frame::enter(self, &req, res, done);
        frame::advance(frame, req, None)
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("id", &self.id)
            .field("mount_path", &self.mount_path)
            .field("full_mount_path", &self.full_mount_path)
            .field("layers", &self.layers)
            .finish_non_exhaustive()
    }
}
