//! # lift
//!
//! Turns a declarative route table into a running request pipeline.
//!
//! A route table maps keys such as `"GET /users/:id"` to either a raw
//! middleware or an action reference such as `"Users.show"`. At startup
//! [`Lift::lift`] resolves every reference against the registered
//! [`Controllers`], prepends the [`Policies`] configured for that action, and
//! wraps the action so that its return value becomes the response body and
//! its failures become classified error responses. Any mistake in the table
//! is a [`ConfigError`] before the server binds a socket.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use lift::{BoxError, Config, Context, Controller, Controllers, Errors, Lift, RouteTable, Server, TracingLogger};
//!
//! struct Users;
//!
//! impl Users {
//!     async fn show(&self, ctx: &mut Context) -> Result<String, BoxError> {
//!         Ok(format!("user {}", ctx.param("id").unwrap_or("?")))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let routes = RouteTable::new().route("GET /users/:id", "Users.show");
//!
//!     let pipeline = Lift::new(Config::with_routes(routes))
//!         .controllers(Controllers::new().register(
//!             "Users",
//!             Controller::new(Users).action("show", |users, ctx| Box::pin(users.show(ctx))),
//!         ))
//!         .error_taxonomy(Errors)
//!         .logger(TracingLogger)
//!         .lift()?;
//!
//!     Server::bind("0.0.0.0:3000")?.serve(pipeline).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Stage order
//!
//! See [`Lift`] for the full table. In short: body parsing, then the
//! configured middlewares, then the trace context, then the router with each
//! route's policies and its dispatch wrapper.

mod capability;
pub mod compile;
mod config;
mod context;
mod controller;
mod dispatch;
mod error;
mod handler;
mod lift;
mod method;
pub mod middleware;
mod pipeline;
pub mod policy;
mod request;
mod response;
mod router;
mod server;

pub use capability::{ErrorTaxonomy, Errors, Failure, FailureKind, Logger, OperationalError, TracingLogger};
pub use config::{
    ActionSpec, Config, HttpConfig, HttpSettings, MiddlewareFactory, MiddlewareItem, MiddlewareSpec, RouteTable,
    Settings, TraceConfig, TracePlacement,
};
pub use context::Context;
pub use controller::{Action, BoundAction, Controller, Controllers, ResolvedAction};
pub use dispatch::{Dispatch, Panicked, render_failure};
pub use error::{BoxError, ConfigError, Error, HttpError};
pub use lift::Lift;
pub use method::RouteMethod;
pub use middleware::trace::TraceId;
pub use pipeline::Pipeline;
pub use policy::Policies;
pub use request::{Request, RequestBody};
pub use response::{Body, IntoReply};
pub use router::{CompiledRoute, Router};
pub use server::Server;
