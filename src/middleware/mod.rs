//! Middleware layer.
//!
//! A middleware receives the request [`Context`](crate::Context) and the
//! [`Next`] continuation. Code before `next.run(ctx).await` sees the request
//! on the way in; code after it sees the response on the way out. Not calling
//! `next` short-circuits everything downstream.
//!
//! Built-in stages, all mounted by [`Lift`](crate::Lift):
//! - [`body`]: parses the buffered request body by content type
//! - [`trace`]: per-request trace id, task-local and echoed in the response
//! - [`catch_all`]: optional outermost error boundary

pub mod body;
pub mod catch_all;
pub mod trace;

pub use crate::handler::{BoxFuture, BoxedMiddleware, Middleware, Next, compose, from_fn};
