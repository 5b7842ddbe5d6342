use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use http::{HeaderValue, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};

use lift::middleware::{self, trace};
use lift::{
    BoxError, Config, ConfigError, Context, Controller, Controllers, Errors, HttpError, Lift, MiddlewareItem,
    MiddlewareSpec, OperationalError, Pipeline, Policies, RequestBody, RouteTable, Settings, TracePlacement,
    TracingLogger, policy,
};

// ── Fixtures ──────────────────────────────────────────────────────────────────

struct Health;

impl Health {
    async fn explode(&self, _ctx: &mut Context) -> Result<&'static str, BoxError> {
        panic!("boom")
    }
}

struct Users {
    touched: AtomicBool,
}

impl Users {
    async fn show(&self, ctx: &mut Context) -> Result<Value, BoxError> {
        self.touched.store(true, Ordering::SeqCst);
        Ok(json!({ "id": ctx.param("id") }))
    }

    async fn missing(&self, _ctx: &mut Context) -> Result<Value, BoxError> {
        Err(OperationalError::new("USER_NOT_FOUND", "no such user").into())
    }

    async fn conflict(&self, ctx: &mut Context) -> Result<Value, BoxError> {
        ctx.set_status(StatusCode::CONFLICT);
        Err(OperationalError::new("TAKEN", "name taken").into())
    }

    async fn broken(&self, _ctx: &mut Context) -> Result<Value, BoxError> {
        Err("database unreachable".into())
    }

    async fn create(&self, ctx: &mut Context) -> Result<Value, BoxError> {
        match ctx.request().body() {
            RequestBody::Json(input) => Ok(json!({ "created": input["name"] })),
            RequestBody::Form(pairs) => {
                let name = pairs.iter().find(|(k, _)| k == "name").map(|(_, v)| v.as_str());
                Ok(json!({ "created": name }))
            }
            _ => Err(OperationalError::new("INVALID_INPUT", "expected JSON").into()),
        }
    }
}

fn controllers(users: Arc<Users>) -> Controllers {
    Controllers::new()
        .register(
            "Health",
            Controller::new(Health)
                .action("ping", |_, _| Box::pin(async { Ok("pong") }))
                .action_sync("status", |_, _| Ok("up"))
                .action_sync("silent", |_, _| Ok(()))
                .action("preset", |_, ctx| Box::pin(async move {
                    ctx.set_body("set by action");
                    Ok("returned")
                }))
                .action("panics", |h, ctx| Box::pin(h.explode(ctx)))
                .action("trace", |_, _| Box::pin(async {
                    tokio::task::yield_now().await;
                    Ok(trace::current().map(|id| id.to_string()).unwrap_or_default())
                })),
        )
        .register(
            "Users",
            Controller::shared(users)
                .action("show", |u, ctx| Box::pin(u.show(ctx)))
                .action("missing", |u, ctx| Box::pin(u.missing(ctx)))
                .action("conflict", |u, ctx| Box::pin(u.conflict(ctx)))
                .action("broken", |u, ctx| Box::pin(u.broken(ctx)))
                .action("create", |u, ctx| Box::pin(u.create(ctx))),
        )
}

fn users() -> Arc<Users> {
    Arc::new(Users { touched: AtomicBool::new(false) })
}

fn routes() -> RouteTable {
    RouteTable::new()
        .route("GET /ping", "Health.ping")
        .route("GET /status", "Health.status")
        .route("DELETE /silent", "Health.silent")
        .route("GET /preset", "Health.preset")
        .route("GET /panics", "Health.panics")
        .route("GET /trace", "Health.trace")
        .route("GET /users/:id", "Users.show")
        .route("GET /missing", "Users.missing")
        .route("GET /conflict", "Users.conflict")
        .route("GET /broken", "Users.broken")
        .route("POST /users", "Users.create")
}

fn lift(config: Config, policies: Policies) -> Pipeline {
    build(config, policies).unwrap()
}

fn build(config: Config, policies: Policies) -> Result<Pipeline, ConfigError> {
    Lift::new(config)
        .controllers(controllers(users()))
        .policies(policies)
        .error_taxonomy(Errors)
        .logger(TracingLogger)
        .lift()
}

fn app() -> Pipeline {
    lift(Config::with_routes(routes()), Policies::new())
}

fn get(path: &str) -> http::Request<Bytes> {
    http::Request::get(path).body(Bytes::new()).unwrap()
}

async fn text(res: http::Response<http_body_util::Full<Bytes>>) -> String {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn json_of(res: http::Response<http_body_util::Full<Bytes>>) -> Value {
    serde_json::from_str(&text(res).await).unwrap()
}

// ── Happy path ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn ping_answers_pong_with_a_trace_id() {
    let res = app().handle(get("/ping")).await;

    assert_eq!(res.status(), StatusCode::OK);
    let id = res.headers()[trace::TRACE_HEADER].to_str().unwrap().to_owned();
    assert_eq!(id.len(), 32);
    assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(text(res).await, "pong");
}

#[tokio::test]
async fn sync_actions_behave_like_async_ones() {
    let res = app().handle(get("/status")).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(text(res).await, "up");
}

#[tokio::test]
async fn path_params_reach_the_action() {
    let res = app().handle(get("/users/42")).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_of(res).await, json!({ "id": "42" }));
}

#[tokio::test]
async fn no_reply_is_no_content() {
    let req = http::Request::delete("/silent").body(Bytes::new()).unwrap();
    let res = app().handle(req).await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert_eq!(text(res).await, "");
}

#[tokio::test]
async fn body_set_by_the_action_wins_over_its_return_value() {
    let res = app().handle(get("/preset")).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(text(res).await, "set by action");
}

#[tokio::test]
async fn json_request_bodies_are_parsed() {
    let req = http::Request::post("/users")
        .header("content-type", "application/json")
        .body(Bytes::from_static(br#"{"name":"alice"}"#))
        .unwrap();
    let res = app().handle(req).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_of(res).await, json!({ "created": "alice" }));
}

#[tokio::test]
async fn unmatched_paths_are_not_found() {
    let res = app().handle(get("/nowhere")).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(text(res).await, "Not Found");
}

#[tokio::test]
async fn routes_are_listed_in_table_order() {
    let patterns: Vec<_> = app().routes().iter().map(|r| r.pattern.clone()).collect();
    assert_eq!(patterns.first().map(String::as_str), Some("/ping"));
    assert_eq!(patterns.last().map(String::as_str), Some("/users"));
    assert_eq!(patterns.len(), 11);
}

// ── Failures ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn operational_failure_becomes_bad_request_with_its_rendering() {
    let res = app().handle(get("/missing")).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_of(res).await, json!({ "code": "USER_NOT_FOUND", "message": "no such user" }));
}

#[tokio::test]
async fn unknown_failure_becomes_bad_request_with_the_fallback() {
    let res = app().handle(get("/broken")).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_of(res).await, json!({ "code": "UNKNOWN", "message": "unknown error" }));
}

#[tokio::test]
async fn explicit_status_survives_a_failure() {
    let res = app().handle(get("/conflict")).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    assert_eq!(json_of(res).await, json!({ "code": "TAKEN", "message": "name taken" }));
}

#[tokio::test]
async fn panicking_action_is_an_unknown_failure() {
    let res = app().handle(get("/panics")).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_of(res).await["code"], "UNKNOWN");
}

#[tokio::test]
async fn malformed_json_is_rejected_before_the_action() {
    let req = http::Request::post("/users")
        .header("content-type", "application/json")
        .body(Bytes::from_static(b"{not json"))
        .unwrap();
    let res = app().handle(req).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(text(res).await.starts_with("invalid JSON body"));
}

#[tokio::test]
async fn form_request_bodies_are_parsed() {
    let req = http::Request::post("/users")
        .header("content-type", "application/x-www-form-urlencoded; charset=utf-8")
        .body(Bytes::from_static(b"name=alice+smith&role=admin"))
        .unwrap();
    let res = app().handle(req).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_of(res).await, json!({ "created": "alice smith" }));
}

#[tokio::test]
async fn bodies_over_the_limit_are_payload_too_large() {
    let mut config = Config::with_routes(routes());
    config.http.max_body_bytes = 8;
    let pipeline = lift(config, Policies::new());
    assert_eq!(pipeline.max_body_bytes(), 8);

    let req = http::Request::post("/users")
        .header("content-type", "application/json")
        .body(Bytes::from_static(br#"{"name":"alice"}"#))
        .unwrap();
    let res = pipeline.handle(req).await;
    assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(text(res).await, "request body too large");
}

// ── Policies ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn policies_run_in_order_before_the_action() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let record = |label: &'static str| {
        let seen = Arc::clone(&seen);
        policy::guard(move |_| {
            seen.lock().unwrap().push(label);
            Ok::<_, BoxError>(())
        })
    };
    let policies = Policies::new().insert("Users.show", vec![record("first"), record("second")]);

    let res = lift(Config::with_routes(routes()), policies).handle(get("/users/7")).await;

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(*seen.lock().unwrap(), ["first", "second"]);
}

#[tokio::test]
async fn failing_policy_short_circuits_the_action() {
    let users = users();
    let deny = policy::guard(|ctx| match ctx.header("authorization") {
        Some(_) => Ok(()),
        None => Err(OperationalError::new("UNAUTHORIZED", "login required")),
    });
    let mut config = Config::with_routes(routes());
    config.http.catch_all = true;

    let pipeline = Lift::new(config)
        .controllers(controllers(Arc::clone(&users)))
        .policies(Policies::new().insert("Users.show", vec![deny]))
        .error_taxonomy(Errors)
        .logger(TracingLogger)
        .lift()
        .unwrap();

    let res = pipeline.handle(get("/users/7")).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_of(res).await, json!({ "code": "UNAUTHORIZED", "message": "login required" }));
    assert!(!users.touched.load(Ordering::SeqCst));

    let authorized = http::Request::get("/users/7")
        .header("authorization", "Bearer t")
        .body(Bytes::new())
        .unwrap();
    assert_eq!(pipeline.handle(authorized).await.status(), StatusCode::OK);
    assert!(users.touched.load(Ordering::SeqCst));
}

#[tokio::test]
async fn policy_failures_are_classified_like_action_failures() {
    let deny = policy::guard(|_| Err(OperationalError::new("NOPE", "denied")));
    let policies = Policies::new().insert("Health.ping", vec![deny]);

    let res = lift(Config::with_routes(routes()), policies).handle(get("/ping")).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_of(res).await, json!({ "code": "NOPE", "message": "denied" }));
}

#[tokio::test]
async fn unknown_policy_failures_get_the_fallback() {
    let down = policy::guard(|_| Err("session store unreachable"));
    let policies = Policies::new().insert("Health.ping", vec![down]);

    let res = lift(Config::with_routes(routes()), policies).handle(get("/ping")).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_of(res).await, json!({ "code": "UNKNOWN", "message": "unknown error" }));
}

// ── Trace context ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn inbound_trace_id_is_echoed() {
    let req = http::Request::get("/trace")
        .header(trace::TRACE_HEADER, "abc-123")
        .body(Bytes::new())
        .unwrap();
    let res = app().handle(req).await;

    assert_eq!(res.headers()[trace::TRACE_HEADER], "abc-123");
    assert_eq!(text(res).await, "abc-123");
}

#[tokio::test]
async fn concurrent_requests_keep_their_own_trace_ids() {
    let pipeline = app();
    let (a, b) = tokio::join!(pipeline.handle(get("/trace")), pipeline.handle(get("/trace")));

    let header_a = a.headers()[trace::TRACE_HEADER].to_str().unwrap().to_owned();
    let header_b = b.headers()[trace::TRACE_HEADER].to_str().unwrap().to_owned();
    assert_ne!(header_a, header_b);
    assert_eq!(text(a).await, header_a);
    assert_eq!(text(b).await, header_b);
}

#[tokio::test]
async fn disabled_trace_sets_no_header() {
    let mut config = Config::with_routes(routes());
    config.trace.disabled = true;

    let res = lift(config, Policies::new()).handle(get("/trace")).await;
    assert!(res.headers().get(trace::TRACE_HEADER).is_none());
    assert_eq!(text(res).await, "");
}

#[tokio::test]
async fn custom_trace_header() {
    let settings = Settings::from_yaml_bytes(b"trace:\n  header: x-request-id\n").unwrap();
    let mut config = Config::from(settings);
    config.routes = routes();

    let req = http::Request::get("/ping").header("x-request-id", "r-1").body(Bytes::new()).unwrap();
    let res = lift(config, Policies::new()).handle(req).await;
    assert_eq!(res.headers()["x-request-id"], "r-1");
    assert!(res.headers().get(trace::TRACE_HEADER).is_none());
}

/// A user middleware that copies the current trace id into a response header.
fn echo_trace_id() -> MiddlewareSpec {
    MiddlewareSpec::factory(|| {
        middleware::from_fn(|ctx, next| Box::pin(async move {
            let seen = trace::current().map(|id| id.to_string()).unwrap_or_else(|| "none".to_owned());
            ctx.set_header(http::HeaderName::from_static("x-seen"), HeaderValue::from_str(&seen)?);
            next.run(ctx).await
        }))
    })
}

#[tokio::test]
async fn user_middlewares_see_no_trace_id_before_the_router() {
    let mut config = Config::with_routes(routes());
    config.http.middlewares.push(echo_trace_id());

    let res = lift(config, Policies::new()).handle(get("/ping")).await;
    assert_eq!(res.headers()["x-seen"], "none");
}

#[tokio::test]
async fn user_middlewares_see_the_trace_id_when_outermost() {
    let mut config = Config::with_routes(routes());
    config.trace.placement = TracePlacement::Outermost;
    config.http.middlewares.push(echo_trace_id());

    let res = lift(config, Policies::new()).handle(get("/ping")).await;
    assert_eq!(res.headers()["x-seen"], res.headers()[trace::TRACE_HEADER]);
}

// ── Middlewares ───────────────────────────────────────────────────────────────

fn tag(seen: &Arc<Mutex<Vec<&'static str>>>, label: &'static str) -> lift::middleware::BoxedMiddleware {
    let seen = Arc::clone(seen);
    middleware::from_fn(move |ctx, next| {
        seen.lock().unwrap().push(label);
        next.run(ctx)
    })
}

#[tokio::test]
async fn factories_and_groups_run_in_declaration_order() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut config = Config::with_routes(routes());

    let first = Arc::clone(&seen);
    config.http.middlewares.push(MiddlewareSpec::factory(move || tag(&first, "factory")));
    let grouped = Arc::clone(&seen);
    config.http.middlewares.push(MiddlewareSpec::group(vec![
        MiddlewareItem::from(tag(&seen, "built")),
        MiddlewareItem::factory(move || tag(&grouped, "group factory")),
    ]));

    let res = lift(config, Policies::new()).handle(get("/ping")).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(*seen.lock().unwrap(), ["factory", "built", "group factory"]);
}

#[tokio::test]
async fn raw_handlers_are_mounted_verbatim() {
    let handler = middleware::from_fn(|ctx, _next| Box::pin(async move {
        ctx.set_status(StatusCode::ACCEPTED);
        ctx.set_body("raw");
        Ok(())
    }));
    let config = Config::with_routes(RouteTable::new().route("/raw", handler));

    let req = http::Request::put("/raw").body(Bytes::new()).unwrap();
    let res = lift(config, Policies::new()).handle(req).await;
    assert_eq!(res.status(), StatusCode::ACCEPTED);
    assert_eq!(text(res).await, "raw");
}

#[tokio::test]
async fn failing_middleware_is_a_bare_500_by_default() {
    let mut config = Config::with_routes(routes());
    config.http.middlewares.push(MiddlewareSpec::factory(|| {
        middleware::from_fn(|_, _| Box::pin(async { Err("middleware exploded".into()) }))
    }));

    let res = lift(config, Policies::new()).handle(get("/ping")).await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(res.headers().get(trace::TRACE_HEADER).is_none());
}

#[tokio::test]
async fn catch_all_classifies_middleware_failures() {
    let mut config = Config::with_routes(routes());
    config.http.catch_all = true;
    config.http.middlewares.push(MiddlewareSpec::factory(|| {
        middleware::from_fn(|_, _| Box::pin(async { Err("middleware exploded".into()) }))
    }));

    let res = lift(config, Policies::new()).handle(get("/ping")).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_of(res).await, json!({ "code": "UNKNOWN", "message": "unknown error" }));
}

#[tokio::test]
async fn http_errors_keep_their_status_without_the_catch_all() {
    let mut config = Config::with_routes(routes());
    config.http.middlewares.push(MiddlewareSpec::factory(|| {
        middleware::from_fn(|_, _| {
            Box::pin(async { Err(HttpError::new(StatusCode::PAYLOAD_TOO_LARGE, "too big").into()) })
        })
    }));

    let res = lift(config, Policies::new()).handle(get("/ping")).await;
    assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(text(res).await, "too big");
}

// ── Method fallback ───────────────────────────────────────────────────────────

#[tokio::test]
async fn wrong_method_is_405_with_allow() {
    let req = http::Request::post("/ping").body(Bytes::new()).unwrap();
    let res = app().handle(req).await;
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(res.headers()[http::header::ALLOW], "GET, HEAD, OPTIONS");
}

#[tokio::test]
async fn options_lists_allowed_methods() {
    let req = http::Request::options("/ping").body(Bytes::new()).unwrap();
    let res = app().handle(req).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()[http::header::ALLOW], "GET, HEAD, OPTIONS");
}

#[tokio::test]
async fn head_is_served_by_get_routes() {
    let req = http::Request::head("/ping").body(Bytes::new()).unwrap();
    assert_eq!(app().handle(req).await.status(), StatusCode::OK);
}

// ── Startup errors ────────────────────────────────────────────────────────────

#[test]
fn invalid_method_fails_startup() {
    let err = build(Config::with_routes(RouteTable::new().route("FETCH /x", "Health.ping")), Policies::new())
        .err()
        .unwrap();
    assert!(matches!(err, ConfigError::InvalidMethod(m) if m == "fetch"));
}

#[test]
fn unknown_controller_fails_startup() {
    let err = build(Config::with_routes(RouteTable::new().route("GET /x", "Ghost.boo")), Policies::new())
        .err()
        .unwrap();
    assert_eq!(err.to_string(), "undefined controller: Ghost");
}

#[test]
fn unknown_action_fails_startup() {
    let err = build(Config::with_routes(RouteTable::new().route("GET /x", "Health.nope")), Policies::new())
        .err()
        .unwrap();
    assert_eq!(err.to_string(), "undefined action method: Health.nope");
}

#[test]
fn sync_actions_fail_startup_when_async_is_required() {
    let mut config = Config::with_routes(routes());
    config.require_async = true;
    let err = build(config, Policies::new()).err().unwrap();
    assert!(matches!(err, ConfigError::ActionNotAsync(a) if a == "Health.status"));
}

#[test]
fn yaml_settings_lift() {
    let settings = Settings::from_yaml_bytes(b"routes:\n  GET /ping: Health.ping\n  /status: Health.status\n").unwrap();
    let pipeline = build(Config::from(settings), Policies::new()).unwrap();
    assert_eq!(pipeline.routes().len(), 2);
}
