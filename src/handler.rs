//! Middleware trait, the [`Next`] continuation, and type erasure.
//!
//! # How the pipeline is stored
//!
//! Every stage of the pipeline (body parsing, user middlewares, policies, the
//! dispatch wrapper, the router stages) is a different concrete type, but
//! they all have to live in one ordered list. Stages are therefore stored as
//! **trait objects** behind an `Arc`:
//!
//! ```text
//! |ctx, next| Box::pin(async move { … })     ← user writes this
//!        ↓ middleware::from_fn(…)
//! Arc::new(FnMiddleware(f))                   ← heap-allocated wrapper
//!        ↓ stored as BoxedMiddleware = Arc<dyn Middleware>
//! stage.call(&mut ctx, next)  at request time ← one vtable dispatch
//!        ↓
//! next.run(ctx).await                         ← continue down the chain
//! ```
//!
//! A stage decides whether the rest of the chain runs: calling
//! [`Next::run`] continues it, returning without calling it short-circuits.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::Context;
use crate::error::BoxError;

// ── Types ─────────────────────────────────────────────────────────────────────

/// A heap-allocated, type-erased future borrowing request state for `'a`.
///
/// `Pin<Box<…>>` because the runtime polls it in place; `Send` so tokio can
/// move a request's task across worker threads.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A type-erased stage shared across concurrent requests.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// One stage of the request pipeline.
///
/// Implement this for stateful stages; use [`from_fn`] for closures.
pub trait Middleware: Send + Sync + 'static {
    fn call<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, Result<(), BoxError>>;
}

// ── Next ──────────────────────────────────────────────────────────────────────

/// The part of the pipeline that has not run yet.
///
/// A continuation is a slice of stages followed, optionally, by the
/// continuation of an enclosing chain. That is how a group or a route's own
/// chain hands control back to the stages mounted after it.
pub struct Next<'a> {
    rest: &'a [BoxedMiddleware],
    tail: Option<Box<Next<'a>>>,
}

impl<'a> Next<'a> {
    pub(crate) fn new(chain: &'a [BoxedMiddleware]) -> Self {
        Self { rest: chain, tail: None }
    }

    /// Runs `chain`, then resumes `self`.
    pub(crate) fn prepend(self, chain: &'a [BoxedMiddleware]) -> Self {
        Self { rest: chain, tail: Some(Box::new(self)) }
    }

    /// A continuation with nothing left to run.
    pub fn end() -> Self {
        Self { rest: &[], tail: None }
    }

    /// Runs the remaining stages in order. Running an exhausted chain is a no-op.
    ///
    /// `ctx` may be borrowed for less than `'a`, so a stage can keep using it
    /// after the downstream stages return.
    pub fn run<'c>(self, ctx: &'c mut Context) -> BoxFuture<'c, Result<(), BoxError>>
    where
        'a: 'c,
    {
        match (self.rest.split_first(), self.tail) {
            (Some((stage, rest)), tail) => stage.call(ctx, Next { rest, tail }),
            (None, Some(tail)) => (*tail).run(ctx),
            (None, None) => Box::pin(async { Ok(()) }),
        }
    }
}

// ── Closures ──────────────────────────────────────────────────────────────────

/// Wraps a closure as a pipeline stage.
///
/// ```rust
/// use lift::middleware;
///
/// let stage = middleware::from_fn(|ctx, next| Box::pin(async move {
///     next.run(ctx).await?;
///     ctx.set_header(
///         http::header::SERVER,
///         http::HeaderValue::from_static("lift"),
///     );
///     Ok(())
/// }));
/// # let _ = stage;
/// ```
pub fn from_fn<F>(f: F) -> BoxedMiddleware
where
    F: for<'a> Fn(&'a mut Context, Next<'a>) -> BoxFuture<'a, Result<(), BoxError>>
        + Send
        + Sync
        + 'static,
{
    Arc::new(FnMiddleware(f))
}

struct FnMiddleware<F>(F);

impl<F> Middleware for FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut Context, Next<'a>) -> BoxFuture<'a, Result<(), BoxError>>
        + Send
        + Sync
        + 'static,
{
    fn call<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, Result<(), BoxError>> {
        (self.0)(ctx, next)
    }
}

// ── Groups ────────────────────────────────────────────────────────────────────

/// Runs several stages as one: the group's members in order, then whatever
/// is mounted after the group.
pub fn compose(stages: Vec<BoxedMiddleware>) -> BoxedMiddleware {
    Arc::new(Compose { stages })
}

struct Compose {
    stages: Vec<BoxedMiddleware>,
}

impl Middleware for Compose {
    fn call<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, Result<(), BoxError>> {
        next.prepend(&self.stages).run(ctx)
    }
}
