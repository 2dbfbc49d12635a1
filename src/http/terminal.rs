//! Terminal collaborator: what happens when no layer is left.
//!
//! # Responsibilities
//! - Receive the final outcome of a top-level traversal exactly once
//! - Write a minimal not-found or error response if nothing else did
//! - Report propagated errors to a pluggable sink
//!
//! # Design Decisions
//! - Behavior is driven by an explicit `TerminalConfig`, never by process environment
//! - A response that is already finished is left alone
//! - Error detail is only exposed in the development environment

use std::future::Future;
use std::sync::Arc;

use axum::http::{header, HeaderValue, StatusCode};
use futures_util::future::{self, BoxFuture};
use futures_util::FutureExt;

use crate::config::{Environment, TerminalConfig};
use crate::http::error::DispatchError;
use crate::http::request::Request;
use crate::http::response::Response;
use crate::routing::path;

/// Receives `(request, response, error)` once the registry is exhausted.
pub trait Terminal: Send + Sync + 'static {
    fn finish(
        &self,
        req: Request,
        res: Response,
        err: Option<DispatchError>,
    ) -> BoxFuture<'static, ()>;
}

/// Terminal built from a closure. See [`terminal_fn`].
pub struct TerminalFn<F> {
    f: F,
}

/// Wrap an async closure `(req, res, err)` as a [`Terminal`].
pub fn terminal_fn<F, Fut>(f: F) -> TerminalFn<F>
where
    F: Fn(Request, Response, Option<DispatchError>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    TerminalFn { f }
}

impl<F, Fut> Terminal for TerminalFn<F>
where
    F: Fn(Request, Response, Option<DispatchError>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn finish(
        &self,
        req: Request,
        res: Response,
        err: Option<DispatchError>,
    ) -> BoxFuture<'static, ()> {
        Box::pin((self.f)(req, res, err))
    }
}

/// Destination for errors that reach the end of the chain.
pub trait ErrorSink: Send + Sync + 'static {
    fn report(&self, err: &DispatchError, req: &Request);
}

impl<F> ErrorSink for F
where
    F: Fn(&DispatchError, &Request) + Send + Sync + 'static,
{
    fn report(&self, err: &DispatchError, req: &Request) {
        self(err, req)
    }
}

/// Default sink: one `error` event per failed request.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ErrorSink for TracingSink {
    fn report(&self, err: &DispatchError, req: &Request) {
        tracing::error!(
            request_id = %req.id(),
            method = %req.method(),
            url = req.original_url(),
            error = %err.chain(),
            "unhandled error reached the end of the chain"
        );
    }
}

/// Default terminal collaborator.
pub struct FinalHandler {
    config: TerminalConfig,
    sink: Arc<dyn ErrorSink>,
}

impl FinalHandler {
    pub fn new(config: TerminalConfig) -> Self {
        Self {
            config,
            sink: Arc::new(TracingSink),
        }
    }

    /// Replace the error sink.
    pub fn with_sink(mut self, sink: impl ErrorSink) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    pub fn config(&self) -> &TerminalConfig {
        &self.config
    }

    fn should_report(&self) -> bool {
        self.config.log_errors && self.config.environment != Environment::Test
    }

    fn render(&self, req: &Request, err: Option<&DispatchError>) -> (StatusCode, String) {
        match err {
            Some(err) => {
                let status = err
                    .status()
                    .filter(|s| s.is_client_error() || s.is_server_error())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                let body = match self.config.environment {
                    Environment::Development => err.chain(),
                    Environment::Production | Environment::Test => {
                        status.canonical_reason().unwrap_or("Error").to_string()
                    }
                };
                (status, body)
            }
            None => (
                StatusCode::NOT_FOUND,
                format!("Cannot {} {}", req.method(), path::pathname(req.original_url())),
            ),
        }
    }
}

impl Default for FinalHandler {
    fn default() -> Self {
        Self::new(TerminalConfig::default())
    }
}

impl Terminal for FinalHandler {
    fn finish(
        &self,
        req: Request,
        res: Response,
        err: Option<DispatchError>,
    ) -> BoxFuture<'static, ()> {
        if let Some(err) = &err {
            if self.should_report() {
                self.sink.report(err, &req);
            }
        }

        if res.is_finished() {
            tracing::debug!(request_id = %req.id(), "response already finished");
            return future::ready(()).boxed();
        }

        let (status, body) = self.render(&req, err.as_ref());
        res.insert_header(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        res.insert_header(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        );
        res.send_status(status, body);
        future::ready(()).boxed()
    }
}
