//! Response handle shared by every layer of a traversal.
//!
//! # Responsibilities
//! - Accumulate status, headers and body written by handlers
//! - Signal completion to whoever owns the connection
//! - Convert the finished state into an HTTP response
//!
//! # Design Decisions
//! - One handle per request, cloned into every layer (`Arc`)
//! - The first `send` wins; later sends are ignored and reported
//! - Completion is a `watch` channel so late waiters still see it

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::Serialize;
use tokio::sync::watch;

#[derive(Debug)]
struct ResponseState {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

#[derive(Debug)]
struct ResponseInner {
    state: Mutex<ResponseState>,
    finished: watch::Sender<bool>,
}

/// Writable response shared across the layer chain.
#[derive(Debug, Clone)]
pub struct Response {
    inner: Arc<ResponseInner>,
}

impl Response {
    /// Fresh response: 200, no headers, empty body, not finished.
    pub fn new() -> Self {
        let (finished, _) = watch::channel(false);
        Self {
            inner: Arc::new(ResponseInner {
                state: Mutex::new(ResponseState {
                    status: StatusCode::OK,
                    headers: HeaderMap::new(),
                    body: Bytes::new(),
                }),
                finished,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, ResponseState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self) -> StatusCode {
        self.state().status
    }

    /// Set the status for a later `send`. Ignored once the response is finished.
    pub fn set_status(&self, status: StatusCode) {
        let mut state = self.state();
        if !self.is_finished() {
            state.status = status;
        }
    }

    /// Snapshot of the headers written so far.
    pub fn headers(&self) -> HeaderMap {
        self.state().headers.clone()
    }

    pub fn insert_header(&self, name: HeaderName, value: HeaderValue) {
        self.state().headers.insert(name, value);
    }

    /// Snapshot of the body.
    pub fn body(&self) -> Bytes {
        self.state().body.clone()
    }

    /// Whether a handler has completed the response.
    pub fn is_finished(&self) -> bool {
        *self.inner.finished.borrow()
    }

    /// Write the body and complete the response.
    ///
    /// Returns false if the response was already finished; the body is then dropped.
    pub fn send(&self, body: impl Into<Bytes>) -> bool {
        self.complete(None, body.into())
    }

    /// Serialize `value` as JSON and complete the response.
    pub fn send_json<T: Serialize>(&self, value: &T) -> Result<bool, serde_json::Error> {
        let body = serde_json::to_vec(value)?;
        self.insert_header(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        Ok(self.send(body))
    }

    /// Set status and body in one step.
    pub fn send_status(&self, status: StatusCode, body: impl Into<Bytes>) -> bool {
        self.complete(Some(status), body.into())
    }

    // The finished flag only flips while the state lock is held.
    fn complete(&self, status: Option<StatusCode>, body: Bytes) -> bool {
        let mut state = self.state();
        if self.is_finished() {
            return false;
        }
        if let Some(status) = status {
            state.status = status;
        }
        state.body = body;
        self.inner.finished.send_replace(true);
        true
    }

    /// Wait until a handler completes the response.
    pub async fn finished(&self) {
        let mut rx = self.inner.finished.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|done| *done).await;
    }

    /// Build the HTTP response from the current state.
    pub fn to_http(&self) -> axum::response::Response {
        let state = self.state();
        let mut response = axum::response::Response::new(Body::from(state.body.clone()));
        *response.status_mut() = state.status;
        *response.headers_mut() = state.headers.clone();
        response
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}
