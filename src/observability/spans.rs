//! Dispatch spans.

use tracing::Span;

use crate::http::request::Request;

/// Span wrapping one top-level traversal; nested dispatchers and deferred
/// continuations inherit it.
pub fn dispatch_span(req: &Request) -> Span {
    tracing::debug_span!(
        "dispatch",
        request_id = %req.id(),
        method = %req.method(),
        url = req.original_url(),
    )
}
