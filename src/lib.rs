//! Mount-path request dispatch library.
//!
//! A [`Dispatcher`] holds an ordered registry of layers. Each incoming
//! request walks the registry; layers whose mount path is a boundary-aware
//! prefix of the request path run with the prefix trimmed from the URL, and
//! errors skip ahead to the next error-handling layer. When the registry is
//! exhausted the request goes to the parent dispatcher or to a terminal
//! collaborator.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;

pub use config::schema::ServerConfig;
pub use http::{DispatchError, HttpServer, Request, Response};
pub use lifecycle::Shutdown;
pub use routing::{Dispatcher, Next};
