//! Handler contracts.
//!
//! Two explicit traits instead of one polymorphic callable: the registration
//! call decides whether a layer is a normal handler or an error handler.

use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::http::error::DispatchError;
use crate::http::request::Request;
use crate::http::response::Response;
use crate::routing::Next;

/// Future returned by every handler.
pub type HandlerFuture = BoxFuture<'static, Result<(), DispatchError>>;

/// A layer that runs while no error is propagating.
///
/// Returning `Err` is equivalent to calling `next.fail(req, err)`.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, req: Request, res: Response, next: Next) -> HandlerFuture;

    /// Name used in dispatch logs.
    fn name(&self) -> &str {
        "<anonymous>"
    }
}

/// A layer that runs only while an error is propagating.
///
/// Calling `next.run(req)` clears the error; `next.fail(req, err)` keeps it going.
pub trait ErrorHandler: Send + Sync + 'static {
    fn call(&self, err: DispatchError, req: Request, res: Response, next: Next) -> HandlerFuture;

    fn name(&self) -> &str {
        "<anonymous>"
    }
}

impl<H: Handler + ?Sized> Handler for Arc<H> {
    fn call(&self, req: Request, res: Response, next: Next) -> HandlerFuture {
        (**self).call(req, res, next)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<H: ErrorHandler + ?Sized> ErrorHandler for Arc<H> {
    fn call(&self, err: DispatchError, req: Request, res: Response, next: Next) -> HandlerFuture {
        (**self).call(err, req, res, next)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Handler built from a closure. See [`handler_fn`].
#[derive(Clone)]
pub struct HandlerFn<F> {
    f: F,
}

/// Wrap an async closure `(req, res, next)` as a [`Handler`].
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(Request, Response, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), DispatchError>> + Send + 'static,
{
    HandlerFn { f }
}

impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(Request, Response, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), DispatchError>> + Send + 'static,
{
    fn call(&self, req: Request, res: Response, next: Next) -> HandlerFuture {
        Box::pin((self.f)(req, res, next))
    }

    fn name(&self) -> &str {
        std::any::type_name::<F>()
    }
}

/// Error handler built from a closure. See [`error_fn`].
#[derive(Clone)]
pub struct ErrorFn<F> {
    f: F,
}

/// Wrap an async closure `(err, req, res, next)` as an [`ErrorHandler`].
pub fn error_fn<F, Fut>(f: F) -> ErrorFn<F>
where
    F: Fn(DispatchError, Request, Response, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), DispatchError>> + Send + 'static,
{
    ErrorFn { f }
}

impl<F, Fut> ErrorHandler for ErrorFn<F>
where
    F: Fn(DispatchError, Request, Response, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), DispatchError>> + Send + 'static,
{
    fn call(&self, err: DispatchError, req: Request, res: Response, next: Next) -> HandlerFuture {
        Box::pin((self.f)(err, req, res, next))
    }

    fn name(&self) -> &str {
        std::any::type_name::<F>()
    }
}
