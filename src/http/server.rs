//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the axum Router that feeds every request into the dispatcher
//! - Wire up middleware (request ID, tracing, timeout)
//! - Buffer request bodies within the configured limit
//! - Wait for the layer chain to complete the response
//! - Serve on a listener until shutdown is signalled

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response as HttpResponse},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::http::handler::{Handler, HandlerFuture};
use crate::http::request::Request;
use crate::http::response::Response;
use crate::observability::metrics;
use crate::routing::{Dispatcher, Next};

/// Application state injected into the entry handler.
#[derive(Clone)]
struct AppState {
    dispatcher: Arc<Dispatcher>,
    max_body_size: usize,
}

/// Listener adapter: serves a dispatcher over HTTP/1.1.
pub struct HttpServer {
    router: Router,
    config: ServerConfig,
    dispatcher: Arc<Dispatcher>,
}

impl HttpServer {
    /// Create a new HTTP server around a configured dispatcher.
    pub fn new(config: ServerConfig, dispatcher: Dispatcher) -> Self {
        Self::from_shared(config, Arc::new(dispatcher))
    }

    /// Create a server around a dispatcher that is already shared.
    pub fn from_shared(config: ServerConfig, dispatcher: Arc<Dispatcher>) -> Self {
        let state = AppState {
            dispatcher: Arc::clone(&dispatcher),
            max_body_size: config.limits.max_body_size,
        };
        let router = Self::build_router(&config, state);
        Self {
            router,
            config,
            dispatcher,
        }
    }

    /// Build the axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ServerConfig, state: AppState) -> Router {
        Router::new()
            .fallback(entry)
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The axum router, for embedding or for driving with `tower::ServiceExt`.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// The dispatcher behind this server.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Run the server, accepting connections until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            layers = self.dispatcher.len(),
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Registering a server as a handler unwraps it to its dispatcher.
impl Handler for HttpServer {
    fn call(&self, req: Request, res: Response, next: Next) -> HandlerFuture {
        let dispatcher = Arc::clone(&self.dispatcher);
        Box::pin(async move {
            dispatcher.dispatch_with(req, res, Some(next)).await;
            Ok(())
        })
    }

    fn name(&self) -> &str {
        "HttpServer"
    }
}

/// Entry handler: one traversal per request.
async fn entry(State(state): State<AppState>, request: axum::extract::Request) -> HttpResponse {
    let start_time = Instant::now();
    let (parts, body) = request.into_parts();
    let method = parts.method.to_string();

    let body = match axum::body::to_bytes(body, state.max_body_size).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, limit = state.max_body_size, "Request body rejected");
            metrics::record_request(&method, 413, start_time);
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
        }
    };

    let req = Request::from_parts(parts, body);
    let res = Response::new();

    let dispatcher = Arc::clone(&state.dispatcher);
    let traversal_res = res.clone();
    tokio::spawn(async move {
        dispatcher.dispatch(req, traversal_res).await;
    });

    res.finished().await;

    let response = res.to_http();
    metrics::record_request(&method, response.status().as_u16(), start_time);
    response
}

impl std::fmt::Debug for HttpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpServer")
            .field("dispatcher", &self.dispatcher.id())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
