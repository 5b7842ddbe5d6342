//! Radix-tree request router.
//!
//! One tree per route method, plus one for routes registered under `all`.
//! O(path-length) lookup. The router is built once by the route table
//! compiler and then shared, read-only, by every in-flight request.
//!
//! It contributes two stages to the pipeline: [`Router::routes`] matches a
//! request and runs the route's chain, [`Router::allowed_methods`] answers
//! `OPTIONS` and `405 Method Not Allowed` for paths nothing handled.
//!
//! A failure raised inside a matched route's chain (a policy, a raw handler)
//! is rendered by the route stage with the same classification the dispatch
//! wrapper applies to actions. It never reaches the stages mounted before
//! the router.

use std::collections::HashMap;
use std::sync::Arc;

use http::StatusCode;
use http::header::{ALLOW, HeaderValue};
use matchit::Router as MatchitRouter;

use crate::capability::{ErrorTaxonomy, Logger};
use crate::context::Context;
use crate::dispatch::run_guarded;
use crate::error::{BoxError, ConfigError};
use crate::handler::{BoxFuture, BoxedMiddleware, Middleware, Next};
use crate::method::RouteMethod;

/// A route as registered: method, path pattern, and the chain that serves it.
#[derive(Clone)]
pub struct CompiledRoute {
    pub method: RouteMethod,
    pub pattern: String,
    pub chain: Arc<[BoxedMiddleware]>,
}

/// The application router.
#[derive(Default)]
pub struct Router {
    trees: HashMap<RouteMethod, MatchitRouter<usize>>,
    routes: Vec<CompiledRoute>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a route.
    ///
    /// Path parameters use `:name` or `{name}` syntax; `ctx.param("name")`
    /// retrieves them. A `:name` segment must be the whole segment and the
    /// name may only hold ASCII letters, digits and `_`: optional (`:id?`),
    /// suffixed (`:file.json`) and regex (`:id(\d+)`) forms are rejected
    /// rather than half-translated. A pattern matchit rejects, or one that
    /// conflicts with a route already registered under the same method, is a
    /// configuration error too.
    pub fn register(&mut self, route: CompiledRoute) -> Result<(), ConfigError> {
        let path = to_matchit(&route.pattern)?;
        self.trees
            .entry(route.method)
            .or_default()
            .insert(path, self.routes.len())
            .map_err(|source| ConfigError::InvalidPattern { pattern: route.pattern.clone(), source })?;
        self.routes.push(route);
        Ok(())
    }

    /// Every registered route, in registration order.
    pub fn compiled(&self) -> &[CompiledRoute] {
        &self.routes
    }

    /// Finds the route serving `method` + `path`. A method-specific route
    /// wins over an `all` route for the same path.
    pub fn lookup(&self, method: &http::Method, path: &str) -> Option<(&CompiledRoute, HashMap<String, String>)> {
        let specific = self
            .trees
            .iter()
            .filter(|(m, _)| **m != RouteMethod::All && m.matches(method))
            .map(|(_, tree)| tree);
        let all = self.trees.get(&RouteMethod::All);

        specific.chain(all).find_map(|tree| {
            let matched = tree.at(path).ok()?;
            let params = matched
                .params
                .iter()
                .map(|(k, v)| (k.to_owned(), v.to_owned()))
                .collect();
            Some((&self.routes[*matched.value], params))
        })
    }

    /// The wire methods some route accepts for `path`.
    pub fn allowed(&self, path: &str) -> Vec<http::Method> {
        let mut allowed: Vec<http::Method> = Vec::new();
        for method in RouteMethod::ALL {
            let Some(tree) = self.trees.get(&method) else { continue };
            if tree.at(path).is_err() {
                continue;
            }
            for wire in method.wire() {
                if !allowed.contains(&wire) {
                    allowed.push(wire);
                }
            }
        }
        allowed
    }

    /// The route-matching stage. Failures inside a route's chain are
    /// classified by `taxonomy` and reported to `logger`.
    pub fn routes(self: &Arc<Self>, taxonomy: Arc<dyn ErrorTaxonomy>, logger: Arc<dyn Logger>) -> BoxedMiddleware {
        Arc::new(RouteStage { router: Arc::clone(self), taxonomy, logger })
    }

    /// The "method not allowed" fallback stage. Mount it after [`Router::routes`].
    pub fn allowed_methods(self: &Arc<Self>) -> BoxedMiddleware {
        Arc::new(AllowedMethods { router: Arc::clone(self) })
    }
}

/// Rewrites `:name` segments to matchit's `{name}`.
fn to_matchit(pattern: &str) -> Result<String, ConfigError> {
    let segments = pattern
        .split('/')
        .map(|segment| match segment.strip_prefix(':') {
            None => Ok(segment.to_owned()),
            Some(name) if is_param_name(name) => Ok(format!("{{{name}}}")),
            Some(_) => Err(ConfigError::UnsupportedParam {
                pattern: pattern.to_owned(),
                segment: segment.to_owned(),
            }),
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(segments.join("/"))
}

fn is_param_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

// ── Stages ────────────────────────────────────────────────────────────────────

struct RouteStage {
    router: Arc<Router>,
    taxonomy: Arc<dyn ErrorTaxonomy>,
    logger: Arc<dyn Logger>,
}

impl Middleware for RouteStage {
    fn call<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, Result<(), BoxError>> {
        let Some((route, params)) = self.router.lookup(ctx.method(), ctx.path()) else {
            return next.run(ctx);
        };
        ctx.set_params(params);
        Box::pin(async move {
            run_guarded(ctx, next.prepend(&route.chain), &*self.taxonomy, &*self.logger).await;
            Ok(())
        })
    }
}

struct AllowedMethods {
    router: Arc<Router>,
}

impl Middleware for AllowedMethods {
    fn call<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, Result<(), BoxError>> {
        Box::pin(async move {
            next.run(ctx).await?;

            if ctx.status() != StatusCode::NOT_FOUND || ctx.has_body() {
                return Ok(());
            }
            let allowed = self.router.allowed(ctx.path());
            if allowed.is_empty() {
                return Ok(());
            }

            let mut list: Vec<&str> = allowed.iter().map(http::Method::as_str).collect();
            list.push("OPTIONS");
            let allow = HeaderValue::from_str(&list.join(", "))?;

            if *ctx.method() == http::Method::OPTIONS {
                ctx.set_status(StatusCode::OK);
                ctx.set_header(ALLOW, allow);
                ctx.set_body("");
            } else if !allowed.contains(ctx.method()) {
                ctx.set_status(StatusCode::METHOD_NOT_ALLOWED);
                ctx.set_header(ALLOW, allow);
            }
            Ok(())
        })
    }
}
