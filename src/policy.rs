//! Policy chains: guards that run before a controller action.
//!
//! A policy is an ordinary [`Middleware`](crate::Middleware). Calling `next`
//! lets the request through; returning without calling it, or failing, stops
//! it before the action runs.

use std::collections::HashMap;

use crate::context::Context;
use crate::error::BoxError;
use crate::handler::{BoxedMiddleware, from_fn};

/// Guards by `"Controller.method"`.
#[derive(Clone, Default)]
pub struct Policies {
    by_action: HashMap<String, Vec<BoxedMiddleware>>,
}

impl Policies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the guards for `action` (`"Controller.method"`), replacing any
    /// previous chain.
    pub fn insert(mut self, action: &str, guards: Vec<BoxedMiddleware>) -> Self {
        self.by_action.insert(action.to_owned(), guards);
        self
    }

    /// The guards registered for `controller.method`, in order. Empty when
    /// none are.
    pub fn chain(&self, controller: &str, method: &str) -> Vec<BoxedMiddleware> {
        self.by_action
            .get(&format!("{controller}.{method}"))
            .cloned()
            .unwrap_or_default()
    }
}

/// Builds a guard from a synchronous check. `Ok` lets the request through.
///
/// ```rust
/// use lift::{OperationalError, policy};
///
/// let authenticated = policy::guard(|ctx| match ctx.header("authorization") {
///     Some(_) => Ok(()),
///     None => Err(OperationalError::new("UNAUTHORIZED", "login required")),
/// });
/// # let _ = authenticated;
/// ```
pub fn guard<F, E>(check: F) -> BoxedMiddleware
where
    F: Fn(&Context) -> Result<(), E> + Send + Sync + 'static,
    E: Into<BoxError>,
{
    from_fn(move |ctx, next| {
        let verdict: Result<(), BoxError> = check(ctx).map_err(Into::into);
        Box::pin(async move {
            verdict?;
            next.run(ctx).await
        })
    })
}
