//! The dispatch wrapper: the layer between the router and a controller action.
//!
//! It runs the action, writes the returned value as the body unless something
//! already set one, and turns every failure (an `Err` or a panic) into a
//! response. Nothing escapes it: the request always completes.
//!
//! Failure responses follow one rule. The context starts out as `404`, and a
//! 404 must not leak out of a route that *was* matched, so a failing action
//! answers `400` unless it picked a status itself.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use http::StatusCode;
use thiserror::Error;

use crate::capability::{ErrorTaxonomy, Failure, Logger};
use crate::context::Context;
use crate::controller::BoundAction;
use crate::error::{BoxError, HttpError};
use crate::handler::{BoxFuture, Middleware, Next};

/// A panic caught while running request code.
#[derive(Debug, Error)]
#[error("panicked: {0}")]
pub struct Panicked(pub String);

impl Panicked {
    pub(crate) fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = payload
            .downcast_ref::<&'static str>()
            .map(|s| (*s).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_owned());
        Self(message)
    }
}

/// Wraps a bound action as the last stage of a route's chain.
pub struct Dispatch {
    action: BoundAction,
    taxonomy: Arc<dyn ErrorTaxonomy>,
    logger: Arc<dyn Logger>,
}

impl Dispatch {
    pub fn new(action: BoundAction, taxonomy: Arc<dyn ErrorTaxonomy>, logger: Arc<dyn Logger>) -> Self {
        Self { action, taxonomy, logger }
    }
}

impl Middleware for Dispatch {
    fn call<'a>(&'a self, ctx: &'a mut Context, _next: Next<'a>) -> BoxFuture<'a, Result<(), BoxError>> {
        Box::pin(async move {
            // Invoked inside the guarded future so a panic raised before the
            // action's own future exists is caught as well.
            let outcome = AssertUnwindSafe(async { self.action.call(ctx).await })
                .catch_unwind()
                .await;
            match outcome {
                Ok(Ok(reply)) => {
                    if !ctx.has_body() {
                        match reply {
                            Some(body) => ctx.set_body(body),
                            None => ctx.set_empty(),
                        }
                    }
                }
                Ok(Err(err)) => render_failure(ctx, &err, &*self.taxonomy, &*self.logger),
                Err(payload) => {
                    let err: BoxError = Box::new(Panicked::from_payload(payload));
                    render_failure(ctx, &err, &*self.taxonomy, &*self.logger);
                }
            }
            Ok(())
        })
    }
}

/// Classifies `err`, logs it, and writes the matching error response.
///
/// Shared by the dispatch wrapper and the optional catch-all boundary.
pub fn render_failure(ctx: &mut Context, err: &BoxError, taxonomy: &dyn ErrorTaxonomy, logger: &dyn Logger) {
    let failure = taxonomy.classify(err);
    logger.warn(err, failure.kind());

    if ctx.status() == StatusCode::NOT_FOUND {
        ctx.set_status(StatusCode::BAD_REQUEST);
    }

    let body = match failure {
        Failure::Operational(body) => body,
        Failure::Unknown => taxonomy.fallback(),
    };
    ctx.set_body(body);
}

/// Runs `next` and renders whatever it fails with, panics included. An
/// [`HttpError`] keeps its own status.
///
/// Used by the route stage for a route's policies and by the catch-all.
pub(crate) async fn run_guarded(ctx: &mut Context, next: Next<'_>, taxonomy: &dyn ErrorTaxonomy, logger: &dyn Logger) {
    let guarded = AssertUnwindSafe(async { next.run(ctx).await });
    let err: BoxError = match guarded.catch_unwind().await {
        Ok(Ok(())) => return,
        Ok(Err(err)) => err,
        Err(payload) => Box::new(Panicked::from_payload(payload)),
    };

    if let Some(http) = err.downcast_ref::<HttpError>() {
        ctx.set_status(http.status);
    }
    render_failure(ctx, &err, taxonomy, logger);
}
