//! End-to-end traversal tests for the dispatch engine.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::{Method, StatusCode};

use mount_dispatch::config::ServerConfig;
use mount_dispatch::http::{
    error_fn, handler_fn, DispatchError, FinalHandler, HttpServer, Request, Response,
};
use mount_dispatch::routing::{Dispatcher, Next};

mod common;
use common::{capture, clear_error, failing, forward_error, pass, probe, Recorder};

fn get(url: &str) -> Request {
    Request::new(Method::GET, url)
}

async fn outcome(rx: tokio::sync::oneshot::Receiver<common::Outcome>) -> common::Outcome {
    tokio::time::timeout(Duration::from_secs(5), rx)
        .await
        .expect("terminal not reached in time")
        .expect("terminal dropped")
}

#[tokio::test]
async fn error_handlers_skipped_without_error() {
    let rec = Recorder::new();
    let (terminal, rx) = capture(&rec);

    let mut app = Dispatcher::with_terminal(terminal);
    app.register(pass(&rec, "a"))
        .register_error(forward_error(&rec, "b"))
        .register(pass(&rec, "c"));
    let app = Arc::new(app);

    app.dispatch(get("/"), Response::new()).await;
    let out = outcome(rx).await;

    assert_eq!(rec.events(), ["a", "c", "terminal"]);
    assert!(out.error.is_none());
}

#[tokio::test]
async fn error_skips_plain_handlers() {
    let rec = Recorder::new();
    let (terminal, rx) = capture(&rec);

    let mut app = Dispatcher::with_terminal(terminal);
    app.register(failing(&rec, "a", "boom"))
        .register(pass(&rec, "skipped"))
        .register_error(forward_error(&rec, "b"))
        .register(pass(&rec, "c"));
    let app = Arc::new(app);

    app.dispatch(get("/"), Response::new()).await;
    let out = outcome(rx).await;

    assert_eq!(rec.events(), ["a", "b: boom", "terminal"]);
    assert_eq!(out.error.as_deref(), Some("boom"));
}

#[tokio::test]
async fn error_handler_can_clear_error() {
    let rec = Recorder::new();
    let (terminal, rx) = capture(&rec);

    let mut app = Dispatcher::with_terminal(terminal);
    app.register(failing(&rec, "a", "boom"))
        .register_error(clear_error(&rec, "recover"))
        .register_error(forward_error(&rec, "unreached"))
        .register(pass(&rec, "c"));
    let app = Arc::new(app);

    app.dispatch(get("/"), Response::new()).await;
    let out = outcome(rx).await;

    assert_eq!(rec.events(), ["a", "recover: boom", "c", "terminal"]);
    assert!(out.error.is_none());
}

#[tokio::test]
async fn only_error_handlers_means_not_found() {
    let rec = Recorder::new();
    let (terminal, rx) = capture(&rec);

    let mut app = Dispatcher::with_terminal(terminal);
    app.register_error(forward_error(&rec, "e1"))
        .register_error(forward_error(&rec, "e2"));
    let app = Arc::new(app);

    app.dispatch(get("/anything"), Response::new()).await;
    let out = outcome(rx).await;

    assert_eq!(rec.events(), ["terminal"]);
    assert!(out.error.is_none());
    assert_eq!(out.url, "/anything");
}

#[tokio::test]
async fn mount_trims_and_restores_url() {
    let rec = Recorder::new();
    let (terminal, rx) = capture(&rec);

    let mut app = Dispatcher::with_terminal(terminal);
    app.register(probe(&rec, "root"))
        .register_at("/admin", probe(&rec, "admin"))
        .register(probe(&rec, "after"));
    let app = Arc::new(app);

    app.dispatch(get("/admin/users?page=2"), Response::new()).await;
    let out = outcome(rx).await;

    assert_eq!(
        rec.events(),
        [
            "root /admin/users?page=2 base=",
            "admin /users?page=2 base=/admin",
            "after /admin/users?page=2 base=",
            "terminal",
        ]
    );
    assert_eq!(out.url, "/admin/users?page=2");
    assert_eq!(out.original_url, "/admin/users?page=2");
    assert_eq!(out.base_url, "");
}

#[tokio::test]
async fn exact_mount_gets_root_path() {
    let rec = Recorder::new();
    let (terminal, rx) = capture(&rec);

    let mut app = Dispatcher::with_terminal(terminal);
    app.register_at("/admin", probe(&rec, "admin"));
    let app = Arc::new(app);

    app.dispatch(get("/admin?x=1"), Response::new()).await;
    let out = outcome(rx).await;

    assert_eq!(rec.events(), ["admin /?x=1 base=/admin", "terminal"]);
    assert_eq!(out.url, "/admin?x=1");
}

#[tokio::test]
async fn mount_respects_segment_boundary() {
    let rec = Recorder::new();
    let (terminal, rx) = capture(&rec);

    let mut app = Dispatcher::with_terminal(terminal);
    app.register_at("/adm", probe(&rec, "adm"))
        .register_at("/admin", probe(&rec, "admin"));
    let app = Arc::new(app);

    app.dispatch(get("/adminx"), Response::new()).await;
    outcome(rx).await;
    assert_eq!(rec.events(), ["terminal"]);
}

#[tokio::test]
async fn mount_matches_case_insensitively_and_keeps_casing() {
    let rec = Recorder::new();
    let (terminal, rx) = capture(&rec);

    let mut app = Dispatcher::with_terminal(terminal);
    app.register_at("/admin", probe(&rec, "admin"));
    let app = Arc::new(app);

    app.dispatch(get("/ADMIN/Users"), Response::new()).await;
    let out = outcome(rx).await;

    assert_eq!(rec.events(), ["admin /Users base=/ADMIN", "terminal"]);
    assert_eq!(out.url, "/ADMIN/Users");
}

#[tokio::test]
async fn nested_dispatchers_restore_every_level() {
    let rec = Recorder::new();
    let (terminal, rx) = capture(&rec);

    let mut v1 = Dispatcher::new();
    v1.register_at("/items", probe(&rec, "items"));

    let mut api = Dispatcher::new();
    api.register(probe(&rec, "api")).mount("/v1", v1);

    let mut app = Dispatcher::with_terminal(terminal);
    app.mount("/api", api).register(probe(&rec, "tail"));
    let app = Arc::new(app);

    app.dispatch(get("/api/v1/items/7?full=true"), Response::new()).await;
    let out = outcome(rx).await;

    assert_eq!(
        rec.events(),
        [
            "api /v1/items/7?full=true base=/api",
            "items /7?full=true base=/api/v1/items",
            "tail /api/v1/items/7?full=true base=",
            "terminal",
        ]
    );
    assert_eq!(out.url, "/api/v1/items/7?full=true");
    assert_eq!(out.base_url, "");
}

#[tokio::test]
async fn nested_dispatcher_not_entered_on_mismatch() {
    let rec = Recorder::new();
    let (terminal, rx) = capture(&rec);

    let mut api = Dispatcher::new();
    api.register(pass(&rec, "api"));

    let mut app = Dispatcher::with_terminal(terminal);
    app.mount("/api", api);
    let app = Arc::new(app);

    app.dispatch(get("/other"), Response::new()).await;
    let out = outcome(rx).await;

    assert_eq!(rec.events(), ["terminal"]);
    assert_eq!(out.url, "/other");
}

#[tokio::test]
async fn nested_dispatcher_matching_nothing_restores_url() {
    let rec = Recorder::new();
    let (terminal, rx) = capture(&rec);

    let mut api = Dispatcher::new();
    api.register_at("/x", pass(&rec, "x"));

    let mut app = Dispatcher::with_terminal(terminal);
    app.mount("/api", api).register(probe(&rec, "tail"));
    let app = Arc::new(app);

    app.dispatch(get("/api/y?z=1"), Response::new()).await;
    let out = outcome(rx).await;

    assert_eq!(rec.events(), ["tail /api/y?z=1 base=", "terminal"]);
    assert_eq!(out.url, "/api/y?z=1");
    assert_eq!(out.base_url, "");
}

#[tokio::test]
async fn nested_error_reaches_parent_error_handler() {
    let rec = Recorder::new();
    let (terminal, rx) = capture(&rec);

    let mut admin = Dispatcher::new();
    admin
        .register_at("/fail", failing(&rec, "fail", "denied"))
        .register(pass(&rec, "admin-rest"));

    let mut app = Dispatcher::with_terminal(terminal);
    app.mount("/admin", admin)
        .register(pass(&rec, "skipped"))
        .register_error(clear_error(&rec, "root-error"))
        .register(probe(&rec, "after"));
    let app = Arc::new(app);

    app.dispatch(get("/admin/fail"), Response::new()).await;
    let out = outcome(rx).await;

    assert_eq!(
        rec.events(),
        [
            "fail",
            "root-error: denied",
            "after /admin/fail base=",
            "terminal",
        ]
    );
    assert!(out.error.is_none());
}

#[tokio::test]
async fn absolute_form_url_keeps_host() {
    let rec = Recorder::new();
    let (terminal, rx) = capture(&rec);

    let mut app = Dispatcher::with_terminal(terminal);
    app.register_at("/admin", probe(&rec, "admin"));
    let app = Arc::new(app);

    app.dispatch(get("http://example.com/admin/users?q=1"), Response::new())
        .await;
    let out = outcome(rx).await;

    assert_eq!(
        rec.events(),
        ["admin http://example.com/users?q=1 base=/admin", "terminal"]
    );
    assert_eq!(out.url, "http://example.com/admin/users?q=1");
}

#[tokio::test]
async fn query_after_host_does_not_match_mount() {
    let rec = Recorder::new();
    let (terminal, rx) = capture(&rec);

    let mut app = Dispatcher::with_terminal(terminal);
    app.register_at("/admin", probe(&rec, "admin"));
    let app = Arc::new(app);

    app.dispatch(get("http://example.com?next=/admin"), Response::new())
        .await;
    let out = outcome(rx).await;

    assert_eq!(rec.events(), ["terminal"]);
    assert_eq!(out.url, "http://example.com?next=/admin");
}

#[tokio::test]
async fn traversal_order_is_deterministic() {
    let rec = Recorder::new();

    let mut app = Dispatcher::new();
    app.register(pass(&rec, "1"))
        .register_at("/a", pass(&rec, "2"))
        .register_at("/a/b", pass(&rec, "3"))
        .register_at("/b", pass(&rec, "x"))
        .register(handler_fn(|_req, res: Response, _next| async move {
            res.send("ok");
            Ok(())
        }));
    let app = Arc::new(app);

    for _ in 0..3 {
        app.dispatch(get("/a/b/c"), Response::new()).await;
    }

    let events = rec.events();
    assert_eq!(events.len(), 9);
    for run in events.chunks(3) {
        assert_eq!(run, ["1", "2", "3"]);
    }
}

#[tokio::test(flavor = "current_thread")]
async fn exhaustion_is_deferred() {
    let rec = Recorder::new();
    let (terminal, rx) = capture(&rec);

    let mut app = Dispatcher::with_terminal(terminal);
    app.register(pass(&rec, "only"));
    let app = Arc::new(app);

    app.dispatch(get("/"), Response::new()).await;
    rec.push("returned");
    outcome(rx).await;

    assert_eq!(rec.events(), ["only", "returned", "terminal"]);
}

#[tokio::test]
async fn panic_becomes_error() {
    let rec = Recorder::new();
    let (terminal, rx) = capture(&rec);
    let saw_panic = Arc::new(AtomicUsize::new(0));

    let seen = Arc::clone(&saw_panic);
    let mut app = Dispatcher::with_terminal(terminal);
    app.register(handler_fn(|_req, _res, _next| async move {
        if true {
            panic!("kaboom");
        }
        Ok(())
    }))
    .register_error(error_fn(move |err: DispatchError, req, _res, next: Next| {
        let seen = Arc::clone(&seen);
        async move {
            if err.is_panic() {
                seen.fetch_add(1, Ordering::SeqCst);
            }
            next.fail(req, err).await;
            Ok(())
        }
    }));
    let app = Arc::new(app);

    app.dispatch(get("/"), Response::new()).await;
    let out = outcome(rx).await;

    assert_eq!(saw_panic.load(Ordering::SeqCst), 1);
    assert_eq!(out.error.as_deref(), Some("handler panicked: kaboom"));
}

#[tokio::test]
async fn error_after_next_is_dropped() {
    let rec = Recorder::new();
    let (terminal, rx) = capture(&rec);

    let mut app = Dispatcher::with_terminal(terminal);
    app.register(handler_fn(|req: Request, _res, next: Next| async move {
        next.run(req).await;
        Err(DispatchError::msg("too late"))
    }))
    .register_error(forward_error(&rec, "unreached"));
    let app = Arc::new(app);

    app.dispatch(get("/"), Response::new()).await;
    let out = outcome(rx).await;
    tokio::task::yield_now().await;

    assert_eq!(rec.events(), ["terminal"]);
    assert!(out.error.is_none());
}

#[tokio::test]
async fn responding_handler_ends_traversal() {
    let rec = Recorder::new();

    let mut app = Dispatcher::new();
    app.register_at(
        "/hello",
        handler_fn(|_req, res: Response, _next| async move {
            res.send_status(StatusCode::CREATED, "hi");
            Ok(())
        }),
    )
    .register(pass(&rec, "unreached"));
    let app = Arc::new(app);

    let res = Response::new();
    app.dispatch(get("/hello"), res.clone()).await;

    assert!(res.is_finished());
    assert_eq!(res.status(), StatusCode::CREATED);
    assert_eq!(res.body(), "hi");
    assert!(rec.events().is_empty());
}

#[tokio::test]
async fn final_handler_answers_not_found() {
    let mut app = Dispatcher::with_terminal(FinalHandler::default());
    app.register_at("/admin", handler_fn(|req: Request, _res, next: Next| async move {
        next.run(req).await;
        Ok(())
    }));
    let app = Arc::new(app);

    let res = Response::new();
    app.dispatch(Request::new(Method::DELETE, "/admin/users?id=3"), res.clone())
        .await;
    tokio::time::timeout(Duration::from_secs(5), res.finished())
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(res.body(), "Cannot DELETE /admin/users");
}

#[tokio::test]
async fn server_registered_as_handler_resumes_outer_chain() {
    let rec = Recorder::new();
    let (terminal, rx) = capture(&rec);

    let mut inner = Dispatcher::new();
    inner.register(probe(&rec, "inner"));
    let server = HttpServer::new(ServerConfig::default(), inner);

    let mut app = Dispatcher::with_terminal(terminal);
    app.register_at("/svc", server).register(probe(&rec, "outer"));
    let app = Arc::new(app);

    app.dispatch(get("/svc/ping"), Response::new()).await;
    let out = outcome(rx).await;

    assert_eq!(
        rec.events(),
        [
            "inner /ping base=/svc",
            "outer /svc/ping base=",
            "terminal",
        ]
    );
    assert!(out.error.is_none());
}
