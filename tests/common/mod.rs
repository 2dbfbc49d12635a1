//! Shared utilities for dispatch and server tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;

use mount_dispatch::http::{
    error_fn, handler_fn, terminal_fn, DispatchError, ErrorHandler, Handler, Request, Terminal,
};
use mount_dispatch::routing::Next;

/// Ordered log of events written by test handlers.
#[derive(Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

/// What the terminal collaborator was handed.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub url: String,
    pub original_url: String,
    pub base_url: String,
    pub error: Option<String>,
}

/// Plain handler that records `label` and continues.
pub fn pass(rec: &Recorder, label: &'static str) -> impl Handler {
    let rec = rec.clone();
    handler_fn(move |req: Request, _res, next: Next| {
        let rec = rec.clone();
        async move {
            rec.push(label);
            next.run(req).await;
            Ok(())
        }
    })
}

/// Plain handler that records `label url base_url` and continues.
pub fn probe(rec: &Recorder, label: &'static str) -> impl Handler {
    let rec = rec.clone();
    handler_fn(move |req: Request, _res, next: Next| {
        let rec = rec.clone();
        async move {
            rec.push(format!("{label} {} base={}", req.url(), req.base_url()));
            next.run(req).await;
            Ok(())
        }
    })
}

/// Plain handler that records `label` and returns an error.
pub fn failing(rec: &Recorder, label: &'static str, message: &'static str) -> impl Handler {
    let rec = rec.clone();
    handler_fn(move |_req: Request, _res, _next: Next| {
        let rec = rec.clone();
        async move {
            rec.push(label);
            Err(DispatchError::msg(message))
        }
    })
}

/// Error handler that records `label: error` and passes the error on.
pub fn forward_error(rec: &Recorder, label: &'static str) -> impl ErrorHandler {
    let rec = rec.clone();
    error_fn(move |err: DispatchError, req: Request, _res, next: Next| {
        let rec = rec.clone();
        async move {
            rec.push(format!("{label}: {err}"));
            next.fail(req, err).await;
            Ok(())
        }
    })
}

/// Error handler that records `label: error` and clears the error.
pub fn clear_error(rec: &Recorder, label: &'static str) -> impl ErrorHandler {
    let rec = rec.clone();
    error_fn(move |err: DispatchError, req: Request, _res, next: Next| {
        let rec = rec.clone();
        async move {
            rec.push(format!("{label}: {err}"));
            next.run(req).await;
            Ok(())
        }
    })
}

/// Terminal that records `terminal` and reports what it was given, once.
pub fn capture(rec: &Recorder) -> (impl Terminal, oneshot::Receiver<Outcome>) {
    let (tx, rx) = oneshot::channel();
    let tx = Arc::new(Mutex::new(Some(tx)));
    let rec = rec.clone();
    let terminal = terminal_fn(move |req: Request, _res, err: Option<DispatchError>| {
        let tx = Arc::clone(&tx);
        let rec = rec.clone();
        async move {
            rec.push("terminal");
            let outcome = Outcome {
                url: req.url().to_string(),
                original_url: req.original_url().to_string(),
                base_url: req.base_url(),
                error: err.map(|e| e.to_string()),
            };
            if let Some(tx) = tx.lock().unwrap().take() {
                let _ = tx.send(outcome);
            }
        }
    });
    (terminal, rx)
}
