//! Registry entries.
//!
//! # Responsibilities
//! - Pair a normalized mount path with one handler
//! - Record which kind of handler it is, decided at registration
//! - Decide whether the layer runs in the current propagation mode

use std::fmt;
use std::sync::Arc;

use crate::http::error::DispatchError;
use crate::http::handler::{ErrorHandler, Handler};
use crate::http::request::Request;
use crate::http::response::Response;
use crate::routing::frame::{Done, Next};
use crate::routing::matcher::MountMatcher;
use crate::routing::router::{Dispatcher, DispatcherId};

/// What a layer invokes when it matches.
#[derive(Clone)]
pub enum LayerKind {
    /// Runs while no error is propagating.
    Plain(Arc<dyn Handler>),
    /// Runs only while an error is propagating.
    ErrorHandling(Arc<dyn ErrorHandler>),
    /// A sub-dispatcher; counts as a normal handler.
    Nested(Arc<Dispatcher>),
}

impl LayerKind {
    /// Whether this kind runs in the given propagation mode.
    pub fn accepts(&self, error_live: bool) -> bool {
        match self {
            LayerKind::ErrorHandling(_) => error_live,
            LayerKind::Plain(_) | LayerKind::Nested(_) => !error_live,
        }
    }

    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            LayerKind::Plain(_) => "plain",
            LayerKind::ErrorHandling(_) => "error",
            LayerKind::Nested(_) => "nested",
        }
    }
}

impl fmt::Debug for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerKind::Plain(h) => f.debug_tuple("Plain").field(&h.name()).finish(),
            LayerKind::ErrorHandling(h) => f.debug_tuple("ErrorHandling").field(&h.name()).finish(),
            LayerKind::Nested(d) => f.debug_tuple("Nested").field(&d.id()).finish(),
        }
    }
}

/// One (mount path, handler) entry of a dispatcher's registry.
#[derive(Debug, Clone)]
pub struct Layer {
    matcher: MountMatcher,
    kind: LayerKind,
    owner: DispatcherId,
    name: Arc<str>,
}

impl Layer {
    pub(crate) fn new(matcher: MountMatcher, kind: LayerKind, owner: DispatcherId) -> Self {
        let name: Arc<str> = match &kind {
            LayerKind::Plain(h) => h.name().into(),
            LayerKind::ErrorHandling(h) => h.name().into(),
            LayerKind::Nested(d) => format!("dispatcher {}", d.full_mount_path()).into(),
        };
        Self {
            matcher,
            kind,
            owner,
            name,
        }
    }

    /// Normalized mount path.
    pub fn mount_path(&self) -> &str {
        self.matcher.path()
    }

    pub fn matcher(&self) -> &MountMatcher {
        &self.matcher
    }

    pub fn kind(&self) -> &LayerKind {
        &self.kind
    }

    /// Dispatcher that registered this layer.
    pub fn owner(&self) -> DispatcherId {
        self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the handler. The caller has already checked `accepts`.
    pub(crate) async fn call(
        &self,
        err: Option<DispatchError>,
        req: Request,
        res: Response,
        next: Next,
    ) -> Result<(), DispatchError> {
        match (&self.kind, err) {
            (LayerKind::Plain(handler), _) => handler.call(req, res, next).await,
            (LayerKind::ErrorHandling(handler), Some(err)) => {
                handler.call(err, req, res, next).await
            }
            (LayerKind::ErrorHandling(_), None) => {
                next.run(req).await;
                Ok(())
            }
            (LayerKind::Nested(dispatcher), _) => {
                Arc::clone(dispatcher)
                    .traverse(req, res, Done::Parent(next))
                    .await;
                Ok(())
            }
        }
    }
}
