//! mount-dispatch demo server.
//!
//! # Layer layout
//!
//! ```text
//!     Client Request
//!     ──────────────▶ access log          (/)
//!                     GET /health         (/health)
//!                     admin dispatcher    (/admin)
//!                       ├─ /settings
//!                       ├─ /fail          (returns an error)
//!                       └─ error handler  (admin-scoped JSON error)
//!                     error handler       (/, JSON error)
//!                     terminal            (404 / 500)
//! ```

use std::path::PathBuf;

use axum::http::{header, HeaderValue, Method, StatusCode};
use clap::Parser;
use serde_json::json;

use mount_dispatch::config::{self, Environment, ServerConfig};
use mount_dispatch::http::{error_fn, handler_fn, DispatchError, FinalHandler};
use mount_dispatch::lifecycle::{startup, Shutdown};
use mount_dispatch::observability::logging;
use mount_dispatch::routing::Dispatcher;

#[derive(Parser)]
#[command(name = "mount-dispatch")]
#[command(about = "Demo server for the mount-path dispatch engine", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,

    /// Override `terminal.environment`.
    #[arg(short, long)]
    environment: Option<Environment>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    if let Some(environment) = cli.environment {
        config.terminal.environment = environment;
    }

    logging::init_logging(&config.observability)?;
    tracing::info!("mount-dispatch v{} starting", env!("CARGO_PKG_VERSION"));

    let app = build_app(&config);
    startup::run(config, app, Shutdown::new()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn build_app(config: &ServerConfig) -> Dispatcher {
    let mut admin = Dispatcher::new();
    admin
        .register_at(
            "/settings",
            handler_fn(|req, res, next| async move {
                if *req.method() != Method::GET {
                    next.run(req).await;
                    return Ok(());
                }
                res.send_json(&json!({
                    "base_url": req.base_url(),
                    "url": req.url(),
                    "original_url": req.original_url(),
                }))?;
                Ok(())
            }),
        )
        .register_at(
            "/fail",
            handler_fn(|_req, _res, _next| async move {
                Err(DispatchError::msg("admin action failed")
                    .with_status(StatusCode::SERVICE_UNAVAILABLE))
            }),
        )
        .register_error(error_fn(|err, req, res, _next| async move {
            let status = err.status().unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            res.set_status(status);
            res.send_json(&json!({
                "scope": "admin",
                "error": err.to_string(),
                "request_id": req.id().as_str(),
            }))?;
            Ok(())
        }));

    let mut app = Dispatcher::with_terminal(FinalHandler::new(config.terminal.clone()));
    app.register(handler_fn(|req, _res, next| async move {
        tracing::info!(method = %req.method(), url = %req.url(), "request");
        next.run(req).await;
        Ok(())
    }))
    .register_at(
        "/health",
        handler_fn(|_req, res, _next| async move {
            res.insert_header(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
            res.send_json(&json!({ "status": "ok" }))?;
            Ok(())
        }),
    )
    .mount("/admin", admin)
    .register_error(error_fn(|err, _req, res, _next| async move {
        res.set_status(err.status().unwrap_or(StatusCode::INTERNAL_SERVER_ERROR));
        res.send_json(&json!({ "error": err.to_string() }))?;
        Ok(())
    }));
    app
}
