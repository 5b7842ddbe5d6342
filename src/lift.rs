//! Pipeline assembly.
//!
//! [`Lift::lift`] is the composition root. It runs once, before the server
//! starts, and mounts the stages in a fixed order:
//!
//! | # | Stage | When |
//! |---|---|---|
//! | 1 | catch-all error boundary | `config.http.catch_all` |
//! | 2 | trace context | `config.trace.placement == Outermost` |
//! | 3 | body parsing | always |
//! | 4 | `config.http.middlewares`, in order | always |
//! | 5 | trace context | `config.trace.placement == BeforeRouter` (default) |
//! | 6 | route matching (policies + dispatch wrapper per route) | always |
//! | 7 | "method not allowed" fallback | always |
//!
//! The route table is compiled between stages 4 and 5. Any configuration
//! error aborts assembly.

use std::sync::Arc;

use tracing::info;

use crate::capability::{ErrorTaxonomy, Logger};
use crate::compile::Compiler;
use crate::config::{Config, TracePlacement};
use crate::controller::Controllers;
use crate::error::ConfigError;
use crate::middleware::{body, catch_all, trace};
use crate::pipeline::Pipeline;
use crate::policy::Policies;
use crate::router::Router;

/// Builder for a [`Pipeline`].
///
/// ```rust
/// use lift::{Config, Controller, Controllers, Errors, Lift, RouteTable, TracingLogger};
///
/// struct Health;
///
/// let pipeline = Lift::new(Config::with_routes(RouteTable::new().route("GET /ping", "Health.ping")))
///     .controllers(Controllers::new().register(
///         "Health",
///         Controller::new(Health).action("ping", |_, _| Box::pin(async { Ok("pong") })),
///     ))
///     .error_taxonomy(Errors)
///     .logger(TracingLogger)
///     .lift()
///     .unwrap();
/// assert_eq!(pipeline.routes().len(), 1);
/// ```
pub struct Lift {
    config: Config,
    controllers: Controllers,
    policies: Policies,
    taxonomy: Option<Arc<dyn ErrorTaxonomy>>,
    logger: Option<Arc<dyn Logger>>,
}

impl Lift {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            controllers: Controllers::new(),
            policies: Policies::new(),
            taxonomy: None,
            logger: None,
        }
    }

    pub fn controllers(mut self, controllers: Controllers) -> Self {
        self.controllers = controllers;
        self
    }

    pub fn policies(mut self, policies: Policies) -> Self {
        self.policies = policies;
        self
    }

    pub fn error_taxonomy(mut self, taxonomy: impl ErrorTaxonomy) -> Self {
        self.taxonomy = Some(Arc::new(taxonomy));
        self
    }

    pub fn logger(mut self, logger: impl Logger) -> Self {
        self.logger = Some(Arc::new(logger));
        self
    }

    /// Assembles the pipeline.
    ///
    /// # Errors
    ///
    /// [`ConfigError::MissingCapability`] when no error taxonomy or logger was
    /// given, otherwise whatever compiling the route table reports.
    pub fn lift(self) -> Result<Pipeline, ConfigError> {
        let taxonomy = self.taxonomy.ok_or(ConfigError::MissingCapability("error taxonomy"))?;
        let logger = self.logger.ok_or(ConfigError::MissingCapability("logger"))?;
        let config = self.config;

        let mut stages = Vec::new();
        if config.http.catch_all {
            stages.push(catch_all::catch_all(Arc::clone(&taxonomy), Arc::clone(&logger)));
        }
        if config.trace.placement == TracePlacement::Outermost {
            stages.push(trace::middleware(&config.trace));
        }
        stages.push(body::body_parser(config.http.max_body_bytes));
        stages.extend(config.http.middlewares.iter().map(|spec| spec.build()));

        let mut router = Router::new();
        Compiler {
            controllers: &self.controllers,
            policies: &self.policies,
            taxonomy: Arc::clone(&taxonomy),
            logger: Arc::clone(&logger),
            require_async: config.require_async,
        }
        .compile(&config.routes, &mut router)?;

        if config.trace.placement == TracePlacement::BeforeRouter {
            stages.push(trace::middleware(&config.trace));
        }
        let router = Arc::new(router);
        stages.push(router.routes(taxonomy, logger));
        stages.push(router.allowed_methods());

        info!(
            routes = router.compiled().len(),
            stages = stages.len(),
            trace = !config.trace.disabled,
            catch_all = config.http.catch_all,
            "pipeline lifted"
        );
        Ok(Pipeline::new(stages, router, config.http.max_body_bytes))
    }
}
