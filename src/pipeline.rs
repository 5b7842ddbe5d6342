//! The assembled request pipeline.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use bytes::Bytes;
use futures::FutureExt;
use http::StatusCode;
use http_body_util::Full;
use tracing::error;

use crate::context::Context;
use crate::dispatch::Panicked;
use crate::error::{BoxError, HttpError};
use crate::handler::{BoxedMiddleware, Next};
use crate::response::{Body, render};
use crate::router::{CompiledRoute, Router};

/// Immutable once lifted; clones share the same stages and routes.
#[derive(Clone)]
pub struct Pipeline {
    stages: Arc<[BoxedMiddleware]>,
    router: Arc<Router>,
    max_body_bytes: usize,
}

impl Pipeline {
    pub(crate) fn new(stages: Vec<BoxedMiddleware>, router: Arc<Router>, max_body_bytes: usize) -> Self {
        Self { stages: Arc::from(stages), router, max_body_bytes }
    }

    /// Largest request body the pipeline accepts, in bytes.
    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    /// Compiled routes, in registration order.
    pub fn routes(&self) -> &[CompiledRoute] {
        self.router.compiled()
    }

    /// Runs one request through every stage and renders the response.
    ///
    /// Failures raised outside a matched route (body parsing, a user
    /// middleware) escape to here unless the catch-all is mounted: an
    /// [`HttpError`] with its own status and message, anything else with a
    /// bare `500`.
    pub async fn handle(&self, req: http::Request<Bytes>) -> http::Response<Full<Bytes>> {
        let mut ctx = Context::new(req);

        let guarded = AssertUnwindSafe(async { Next::new(&self.stages).run(&mut ctx).await });
        let escaped: Option<BoxError> = match guarded.catch_unwind().await {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(err),
            Err(payload) => Some(Box::new(Panicked::from_payload(payload))),
        };

        if let Some(err) = escaped {
            error!(error = %err, method = %ctx.method(), path = ctx.path(), "unhandled pipeline error");
            match err.downcast_ref::<HttpError>() {
                Some(http) => ctx.replace_response(http.status, Body::Text(http.message.clone())),
                None => {
                    let status = StatusCode::INTERNAL_SERVER_ERROR;
                    let reason = status.canonical_reason().unwrap_or_default();
                    ctx.replace_response(status, Body::Text(reason.to_owned()));
                }
            }
        }

        render(ctx)
    }
}
