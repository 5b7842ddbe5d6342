//! Optional outermost error boundary.
//!
//! Without it, a failure raised before the router (body parsing, a user
//! middleware) reaches the pipeline's last-resort handler and becomes a bare
//! `500`, or the status of an [`HttpError`](crate::HttpError). With it, such
//! failures are classified and rendered the same way action and policy
//! failures are.

use std::sync::Arc;

use crate::capability::{ErrorTaxonomy, Logger};
use crate::context::Context;
use crate::dispatch::run_guarded;
use crate::error::BoxError;
use crate::handler::{BoxFuture, BoxedMiddleware, Middleware, Next};

pub fn catch_all(taxonomy: Arc<dyn ErrorTaxonomy>, logger: Arc<dyn Logger>) -> BoxedMiddleware {
    Arc::new(CatchAll { taxonomy, logger })
}

struct CatchAll {
    taxonomy: Arc<dyn ErrorTaxonomy>,
    logger: Arc<dyn Logger>,
}

impl Middleware for CatchAll {
    fn call<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, Result<(), BoxError>> {
        Box::pin(async move {
            run_guarded(ctx, next, &*self.taxonomy, &*self.logger).await;
            Ok(())
        })
    }
}
