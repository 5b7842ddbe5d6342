//! Minimal lift example: a YAML route table, two controllers and a policy.
//!
//! Run with:
//!   RUST_LOG=debug cargo run --example basic
//!
//! Try:
//!   curl -i http://localhost:3000/ping
//!   curl -i http://localhost:3000/users/42
//!   curl -i -X POST http://localhost:3000/users \
//!        -H 'authorization: Bearer demo' \
//!        -H 'content-type: application/json' \
//!        -d '{"name":"alice"}'
//!   curl -i -X DELETE http://localhost:3000/users/0
//!   curl -i -X PUT http://localhost:3000/ping

use std::sync::atomic::{AtomicU64, Ordering};

use http::StatusCode;
use serde_json::json;

use lift::{
    BoxError, Config, Context, Controller, Controllers, Errors, Lift, OperationalError, Policies, RequestBody,
    Server, Settings, TracingLogger, policy,
};

const ROUTES: &str = r#"
routes:
  GET /ping: Health.ping
  GET /users/:id: Users.show
  POST /users: Users.create
  DELETE /users/:id: Users.remove
trace:
  placement: outermost
http:
  catch_all: true
"#;

struct Health;

#[derive(Default)]
struct Users {
    next_id: AtomicU64,
}

impl Users {
    async fn show(&self, ctx: &mut Context) -> Result<serde_json::Value, BoxError> {
        let id = ctx.param("id").unwrap_or("unknown");
        Ok(json!({ "id": id, "name": "alice", "trace": lift::middleware::trace::current().map(|t| t.to_string()) }))
    }

    async fn create(&self, ctx: &mut Context) -> Result<serde_json::Value, BoxError> {
        let RequestBody::Json(input) = ctx.request().body() else {
            return Err(OperationalError::new("INVALID_INPUT", "expected a JSON body").into());
        };
        let name = input["name"].as_str().unwrap_or("anonymous").to_owned();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;

        ctx.set_status(StatusCode::CREATED);
        Ok(json!({ "id": id, "name": name }))
    }

    fn remove(&self, ctx: &mut Context) -> Result<(), BoxError> {
        match ctx.param("id") {
            Some("0") => Err(OperationalError::new("NOT_FOUND", "no such user").into()),
            _ => Ok(()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt::init();

    let settings = Settings::from_yaml_bytes(ROUTES.as_bytes())?;

    let controllers = Controllers::new()
        .register("Health", Controller::new(Health).action_sync("ping", |_, _| Ok("pong")))
        .register(
            "Users",
            Controller::new(Users::default())
                .action("show", |users, ctx| Box::pin(users.show(ctx)))
                .action("create", |users, ctx| Box::pin(users.create(ctx)))
                .action_sync("remove", Users::remove),
        );

    let authenticated = policy::guard(|ctx| match ctx.header("authorization") {
        Some(_) => Ok(()),
        None => Err(OperationalError::new("UNAUTHORIZED", "login required")),
    });
    let policies = Policies::new()
        .insert("Users.create", vec![authenticated.clone()])
        .insert("Users.remove", vec![authenticated]);

    let pipeline = Lift::new(Config::from(settings))
        .controllers(controllers)
        .policies(policies)
        .error_taxonomy(Errors)
        .logger(TracingLogger)
        .lift()?;

    Server::bind("0.0.0.0:3000")?.serve(pipeline).await?;
    Ok(())
}
