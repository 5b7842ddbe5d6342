//! Per-request trace identifiers.
//!
//! The trace middleware takes the identifier from the inbound `x-trace-id`
//! header, or generates one, and makes it visible three ways:
//!
//! - [`Context::trace_id`](crate::Context::trace_id) for handlers,
//! - [`current`] for any code running inside the request's task, without
//!   passing anything around,
//! - the `x-trace-id` response header for the client.
//!
//! The ambient value is a `tokio` task-local scoped to the rest of the
//! pipeline's future, so two interleaved requests never see each other's id.

use std::fmt;
use std::sync::Arc;

use http::header::{HeaderName, HeaderValue};
use tokio::task_local;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::TraceConfig;
use crate::context::Context;
use crate::error::BoxError;
use crate::handler::{BoxFuture, BoxedMiddleware, Middleware, Next, from_fn};

/// Default header carrying the trace identifier in both directions.
pub const TRACE_HEADER: &str = "x-trace-id";

task_local! {
    static TRACE_ID: TraceId;
}

/// An opaque per-request correlation token.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct TraceId(String);

impl TraceId {
    /// A fresh identifier: 32 lower-case hex characters.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TraceId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The trace identifier of the request whose task is running, if any.
pub fn current() -> Option<TraceId> {
    TRACE_ID.try_with(TraceId::clone).ok()
}

/// Builds the trace middleware. A disabled config yields a pass-through stage.
pub fn middleware(config: &TraceConfig) -> BoxedMiddleware {
    if config.disabled {
        return from_fn(|ctx, next| next.run(ctx));
    }
    Arc::new(TraceContext { header: config.header.clone() })
}

struct TraceContext {
    header: HeaderName,
}

impl Middleware for TraceContext {
    fn call<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, Result<(), BoxError>> {
        let id = ctx
            .header(self.header.as_str())
            .filter(|v| !v.is_empty())
            .map(TraceId::from)
            .unwrap_or_else(TraceId::generate);

        Box::pin(async move {
            ctx.set_header(self.header.clone(), HeaderValue::from_str(id.as_str())?);
            ctx.set_trace_id(id.clone());

            let span = tracing::info_span!(
                "request",
                trace_id = %id,
                method = %ctx.method(),
                path = ctx.path(),
            );
            TRACE_ID.scope(id, next.run(ctx)).instrument(span).await
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use bytes::Bytes;

    use super::*;
    use crate::config::TracePlacement;

    fn config(disabled: bool) -> TraceConfig {
        TraceConfig { disabled, ..TraceConfig::default() }
    }

    fn request(trace: Option<&str>) -> Context {
        let mut req = http::Request::get("/");
        if let Some(trace) = trace {
            req = req.header(TRACE_HEADER, trace);
        }
        Context::new(req.body(Bytes::new()).unwrap())
    }

    /// Records what `current()` returns from inside the pipeline.
    fn record(seen: &Arc<Mutex<Vec<Option<TraceId>>>>) -> BoxedMiddleware {
        let seen = Arc::clone(seen);
        from_fn(move |_ctx, _next| {
            let seen = Arc::clone(&seen);
            Box::pin(async move {
                tokio::task::yield_now().await;
                seen.lock().unwrap().push(current());
                Ok(())
            })
        })
    }

    async fn run(config: &TraceConfig, ctx: &mut Context, seen: &Arc<Mutex<Vec<Option<TraceId>>>>) {
        let chain = vec![middleware(config), record(seen)];
        Next::new(&chain).run(ctx).await.unwrap();
    }

    #[tokio::test]
    async fn inbound_id_is_reflected() {
        let seen = Arc::default();
        let mut ctx = request(Some("abc123"));
        run(&config(false), &mut ctx, &seen).await;

        assert_eq!(ctx.response_headers()[TRACE_HEADER], "abc123");
        assert_eq!(ctx.trace_id(), Some(&TraceId::from("abc123")));
        assert_eq!(*seen.lock().unwrap(), [Some(TraceId::from("abc123"))]);
    }

    #[tokio::test]
    async fn missing_id_is_generated() {
        let seen = Arc::default();
        let mut ctx = request(None);
        run(&config(false), &mut ctx, &seen).await;

        let id = ctx.response_headers()[TRACE_HEADER].to_str().unwrap().to_owned();
        assert_eq!(id.len(), 32);
        assert_eq!(*seen.lock().unwrap(), [Some(TraceId::from(id.as_str()))]);
    }

    #[tokio::test]
    async fn empty_inbound_id_is_replaced() {
        let seen = Arc::default();
        let mut ctx = request(Some(""));
        run(&config(false), &mut ctx, &seen).await;

        assert!(!ctx.response_headers()[TRACE_HEADER].is_empty());
    }

    #[tokio::test]
    async fn interleaved_requests_are_isolated() {
        let seen = Arc::default();
        let (mut a, mut b) = (request(None), request(None));
        let cfg = config(false);

        tokio::join!(run(&cfg, &mut a, &seen), run(&cfg, &mut b, &seen));

        let (a, b) = (a.trace_id().cloned().unwrap(), b.trace_id().cloned().unwrap());
        assert_ne!(a, b);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen.contains(&Some(a)));
        assert!(seen.contains(&Some(b)));
    }

    #[tokio::test]
    async fn disabled_leaves_headers_alone() {
        let seen = Arc::default();
        let mut ctx = request(Some("abc123"));
        run(&config(true), &mut ctx, &seen).await;

        assert!(ctx.response_headers().get(TRACE_HEADER).is_none());
        assert!(ctx.trace_id().is_none());
        assert_eq!(*seen.lock().unwrap(), [None]);
    }

    #[test]
    fn outside_a_request_there_is_no_id() {
        assert_eq!(current(), None);
        assert_eq!(TraceConfig::default().placement, TracePlacement::BeforeRouter);
    }
}
