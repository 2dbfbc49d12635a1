//! Listener adapter tests: the dispatcher behind axum and tower-http.

use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request as HttpRequest, StatusCode};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower::ServiceExt;

use mount_dispatch::config::{Environment, ServerConfig};
use mount_dispatch::http::{
    handler_fn, DispatchError, FinalHandler, HttpServer, Request, X_REQUEST_ID,
};
use mount_dispatch::lifecycle::Shutdown;
use mount_dispatch::routing::{Dispatcher, Next};

fn config(environment: Environment) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.terminal.environment = environment;
    config.terminal.log_errors = false;
    config
}

fn app(config: &ServerConfig) -> Dispatcher {
    let mut api = Dispatcher::new();
    api.register_at(
        "/echo",
        handler_fn(|req: Request, res, _next: Next| async move {
            res.send_json(&json!({
                "id": req.id().as_str(),
                "url": req.url(),
                "base_url": req.base_url(),
                "body": String::from_utf8_lossy(req.body()),
            }))?;
            Ok(())
        }),
    )
    .register_at(
        "/broken",
        handler_fn(|_req, _res, _next| async move { Err(DispatchError::msg("database offline")) }),
    );

    let mut app = Dispatcher::with_terminal(FinalHandler::new(config.terminal.clone()));
    app.mount("/api", api);
    app
}

fn server(config: ServerConfig) -> HttpServer {
    let dispatcher = app(&config);
    HttpServer::new(config, dispatcher)
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn unmatched_request_is_not_found() {
    let router = server(config(Environment::Development)).router();

    let response = router
        .oneshot(HttpRequest::get("/nope?x=1").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.headers().contains_key(X_REQUEST_ID));
    assert_eq!(body_text(response).await, "Cannot GET /nope");
}

#[tokio::test]
async fn request_id_is_propagated() {
    let router = server(config(Environment::Development)).router();

    let response = router
        .oneshot(
            HttpRequest::post("/api/echo/more")
                .header(X_REQUEST_ID, "req-42")
                .body(Body::from("payload"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get(X_REQUEST_ID).unwrap(), "req-42");

    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(
        body,
        json!({"id": "req-42", "url": "/more", "base_url": "/api/echo", "body": "payload"})
    );
}

#[tokio::test]
async fn unhandled_error_detail_depends_on_environment() {
    let response = server(config(Environment::Development))
        .router()
        .oneshot(HttpRequest::get("/api/broken").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_text(response).await, "database offline");

    let response = server(config(Environment::Production))
        .router()
        .oneshot(HttpRequest::get("/api/broken").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_text(response).await, "Internal Server Error");
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let mut config = config(Environment::Test);
    config.limits.max_body_size = 4;

    let response = server(config)
        .router()
        .oneshot(
            HttpRequest::post("/api/echo")
                .body(Body::from("far too long"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn serves_over_tcp_until_shutdown() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();

    let server = server(config(Environment::Test));
    let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));

    let client = reqwest::Client::new();
    let body: Value = client
        .get(format!("http://{addr}/API/Echo/x?y=1"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["url"], "/x?y=1");
    assert_eq!(body["base_url"], "/API/Echo");

    let missing = client.get(format!("http://{addr}/gone")).send().await.unwrap();
    assert_eq!(missing.status().as_u16(), 404);

    drop(client);
    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}
