//! HTTP-facing subsystem: request/response handles, handler contracts,
//! the terminal collaborator and the listener adapter.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum setup, request ID, timeout, body buffering)
//!     → request.rs (immutable head + per-frame url)
//!     → [routing: dispatcher traversal]
//!     → handler.rs (plain and error handler contracts)
//!     → terminal.rs (not-found / error response on exhaustion)
//!     → response.rs (completion signal, conversion back to HTTP)
//!     → Send to client
//! ```

pub mod error;
pub mod handler;
pub mod request;
pub mod response;
pub mod server;
pub mod terminal;

pub use error::{DispatchError, Fault};
pub use handler::{error_fn, handler_fn, ErrorHandler, Handler, HandlerFuture};
pub use request::{Request, RequestId, X_REQUEST_ID};
pub use response::Response;
pub use server::HttpServer;
pub use terminal::{terminal_fn, ErrorSink, FinalHandler, Terminal, TracingSink};
