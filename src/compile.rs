//! Route table compiler.
//!
//! Turns a [`RouteTable`] into routes registered on a [`Router`]. Every
//! problem (an unknown method token, a controller or action that does not
//! exist, a malformed pattern) is reported here, before the server accepts a
//! single connection.

use std::sync::Arc;

use tracing::debug;

use crate::capability::{ErrorTaxonomy, Logger};
use crate::config::{ActionSpec, RouteTable};
use crate::controller::Controllers;
use crate::dispatch::Dispatch;
use crate::error::ConfigError;
use crate::handler::BoxedMiddleware;
use crate::method::RouteMethod;
use crate::policy::Policies;
use crate::router::{CompiledRoute, Router};

/// Splits a route key into its method and path pattern.
///
/// The key is split on its first space: `"GET /users"` is `get` + `/users`.
/// A key without a space is a pattern matched for every method.
///
/// ```rust
/// use lift::{RouteMethod, compile::parse_route_key};
///
/// assert_eq!(parse_route_key("POST /users").unwrap(), (RouteMethod::Post, "/users"));
/// assert_eq!(parse_route_key("/health").unwrap(), (RouteMethod::All, "/health"));
/// assert!(parse_route_key("FETCH /users").is_err());
/// ```
pub fn parse_route_key(key: &str) -> Result<(RouteMethod, &str), ConfigError> {
    match key.split_once(' ') {
        Some((method, pattern)) => Ok((method.parse()?, pattern)),
        None => Ok((RouteMethod::All, key)),
    }
}

/// Everything the compiler reads besides the route table itself.
pub struct Compiler<'a> {
    pub controllers: &'a Controllers,
    pub policies: &'a Policies,
    pub taxonomy: Arc<dyn ErrorTaxonomy>,
    pub logger: Arc<dyn Logger>,
    /// Reject synchronous controller actions.
    pub require_async: bool,
}

impl Compiler<'_> {
    /// Compiles `routes` into `router`, in table order. Stops at the first error.
    pub fn compile(&self, routes: &RouteTable, router: &mut Router) -> Result<(), ConfigError> {
        for (key, spec) in routes.iter() {
            let (method, pattern) = parse_route_key(key)?;
            let chain = self.chain(spec)?;
            debug!(%method, pattern, stages = chain.len(), "route registered");
            router.register(CompiledRoute {
                method,
                pattern: pattern.to_owned(),
                chain: Arc::from(chain),
            })?;
        }
        Ok(())
    }

    fn chain(&self, spec: &ActionSpec) -> Result<Vec<BoxedMiddleware>, ConfigError> {
        let reference = match spec {
            ActionSpec::Handler(handler) => return Ok(vec![handler.clone()]),
            ActionSpec::Reference(reference) => reference,
        };

        let resolved = self.controllers.resolve(reference)?;
        if self.require_async && !resolved.is_async {
            return Err(ConfigError::ActionNotAsync(resolved.key()));
        }

        let mut chain = self.policies.chain(&resolved.controller, &resolved.method);
        chain.push(Arc::new(Dispatch::new(
            resolved.action,
            Arc::clone(&self.taxonomy),
            Arc::clone(&self.logger),
        )));
        Ok(chain)
    }
}
