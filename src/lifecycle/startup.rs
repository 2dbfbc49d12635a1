//! Startup orchestration.
//!
//! # Responsibilities
//! - Install the metrics exporter when enabled
//! - Bind the listener and serve the dispatcher
//! - Stop on Ctrl+C or an external shutdown trigger
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Logging is initialized by the caller, before configuration is acted upon

use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::http::HttpServer;
use crate::lifecycle::{signals, Shutdown};
use crate::observability::metrics;
use crate::routing::Dispatcher;

/// Fatal startup failures.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid address `{address}`: {source}")]
    Address {
        address: String,
        source: std::net::AddrParseError,
    },

    #[error("failed to install metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: SocketAddr,
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

fn parse_addr(address: &str) -> Result<SocketAddr, StartupError> {
    address.parse().map_err(|source| StartupError::Address {
        address: address.to_string(),
        source,
    })
}

/// Serve `dispatcher` according to `config` until shutdown.
pub async fn run(
    config: ServerConfig,
    dispatcher: Dispatcher,
    shutdown: Shutdown,
) -> Result<(), StartupError> {
    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        environment = %config.terminal.environment,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr = parse_addr(&config.observability.metrics_address)?;
        metrics::init_metrics(addr)?;
    }

    let address = parse_addr(&config.listener.bind_address)?;
    let listener = TcpListener::bind(address)
        .await
        .map_err(|source| StartupError::Bind { address, source })?;
    tracing::info!(address = %address, "Listening for connections");

    tokio::spawn(signals::shutdown_on_ctrl_c(shutdown.clone()));

    let server = HttpServer::new(config, dispatcher);
    server
        .run(listener, shutdown.subscribe())
        .await
        .map_err(StartupError::Serve)?;

    shutdown.trigger();
    Ok(())
}
