//! Application configuration consumed by [`Lift`](crate::Lift).
//!
//! [`Config`] is built in code because it holds callables (middleware
//! factories, raw route handlers). The serializable part of it, [`Settings`],
//! can also be loaded from YAML and converted:
//!
//! ```yaml
//! routes:
//!   GET /ping: Health.ping
//!   POST /users: Users.create
//!   /status: Health.status
//! trace:
//!   header: x-trace-id
//!   placement: before_router
//! http:
//!   catch_all: false
//!   max_body_bytes: 1048576
//! require_async: false
//! ```

use std::fmt;

use http::header::HeaderName;
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::Deserialize;

use crate::error::ConfigError;
use crate::handler::{BoxedMiddleware, compose};
use crate::middleware::trace::TRACE_HEADER;

// ── Config ────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct Config {
    pub http: HttpConfig,
    pub routes: RouteTable,
    pub trace: TraceConfig,
    /// Reject synchronous controller actions at startup.
    pub require_async: bool,
}

impl Config {
    pub fn with_routes(routes: RouteTable) -> Self {
        Self { routes, ..Self::default() }
    }
}

impl From<Settings> for Config {
    fn from(settings: Settings) -> Self {
        Self {
            http: HttpConfig {
                middlewares: Vec::new(),
                catch_all: settings.http.catch_all,
                max_body_bytes: settings.http.max_body_bytes,
            },
            routes: settings.routes,
            trace: settings.trace,
            require_async: settings.require_async,
        }
    }
}

pub struct HttpConfig {
    /// Mounted in order, after body parsing and before the router.
    pub middlewares: Vec<MiddlewareSpec>,
    /// Mount an outermost error boundary (see [`middleware::catch_all`](crate::middleware::catch_all)).
    pub catch_all: bool,
    /// Largest request body accepted, in bytes. Larger bodies get `413`.
    pub max_body_bytes: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            middlewares: Vec::new(),
            catch_all: false,
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

// ── Middlewares ───────────────────────────────────────────────────────────────

/// A zero-argument middleware factory, invoked once while the pipeline is assembled.
pub type MiddlewareFactory = Box<dyn Fn() -> BoxedMiddleware + Send + Sync>;

/// One entry of [`HttpConfig::middlewares`].
pub enum MiddlewareSpec {
    Factory(MiddlewareFactory),
    /// Mounted together, as a single stage.
    Group(Vec<MiddlewareItem>),
}

pub enum MiddlewareItem {
    Factory(MiddlewareFactory),
    Built(BoxedMiddleware),
}

impl MiddlewareSpec {
    pub fn factory(f: impl Fn() -> BoxedMiddleware + Send + Sync + 'static) -> Self {
        Self::Factory(Box::new(f))
    }

    pub fn group(items: Vec<MiddlewareItem>) -> Self {
        Self::Group(items)
    }

    pub(crate) fn build(&self) -> BoxedMiddleware {
        match self {
            Self::Factory(f) => f(),
            Self::Group(items) => compose(items.iter().map(MiddlewareItem::build).collect()),
        }
    }
}

impl MiddlewareItem {
    pub fn factory(f: impl Fn() -> BoxedMiddleware + Send + Sync + 'static) -> Self {
        Self::Factory(Box::new(f))
    }

    fn build(&self) -> BoxedMiddleware {
        match self {
            Self::Factory(f) => f(),
            Self::Built(m) => m.clone(),
        }
    }
}

impl From<BoxedMiddleware> for MiddlewareItem {
    fn from(m: BoxedMiddleware) -> Self {
        Self::Built(m)
    }
}

// ── Routes ────────────────────────────────────────────────────────────────────

/// What a route key maps to.
pub enum ActionSpec {
    /// A pipeline stage registered verbatim: no policies, no dispatch wrapper.
    Handler(BoxedMiddleware),
    /// `"Controller.method"`, resolved against the controller registry.
    Reference(String),
}

impl fmt::Debug for ActionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Handler(_) => f.write_str("Handler(..)"),
            Self::Reference(r) => f.debug_tuple("Reference").field(r).finish(),
        }
    }
}

impl From<&str> for ActionSpec {
    fn from(s: &str) -> Self { Self::Reference(s.to_owned()) }
}

impl From<String> for ActionSpec {
    fn from(s: String) -> Self { Self::Reference(s) }
}

impl From<BoxedMiddleware> for ActionSpec {
    fn from(m: BoxedMiddleware) -> Self { Self::Handler(m) }
}

/// Route keys (`"[method ]pattern"`) to action specs, in declaration order.
#[derive(Debug, Default)]
pub struct RouteTable {
    entries: Vec<(String, ActionSpec)>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, key: &str, spec: impl Into<ActionSpec>) -> Self {
        self.entries.push((key.to_owned(), spec.into()));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ActionSpec)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

/// Deserializes from a map of route keys to `"Controller.method"` strings,
/// keeping document order.
impl<'de> Deserialize<'de> for RouteTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = RouteTable;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of route keys to \"Controller.method\" strings")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<RouteTable, A::Error> {
                let mut table = RouteTable::new();
                while let Some((key, action)) = map.next_entry::<String, String>()? {
                    table.entries.push((key, ActionSpec::Reference(action)));
                }
                Ok(table)
            }
        }

        deserializer.deserialize_map(TableVisitor)
    }
}

// ── Trace ─────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Mount a pass-through instead of the trace middleware.
    pub disabled: bool,
    #[serde(deserialize_with = "header_name")]
    pub header: HeaderName,
    pub placement: TracePlacement,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            disabled: false,
            header: HeaderName::from_static(TRACE_HEADER),
            placement: TracePlacement::default(),
        }
    }
}

/// Where the trace middleware sits in the pipeline.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum TracePlacement {
    /// After user middlewares, right before the router stages.
    #[default]
    BeforeRouter,
    /// First stage of all, so user middlewares see the trace id too.
    Outermost,
}

fn header_name<'de, D: Deserializer<'de>>(deserializer: D) -> Result<HeaderName, D::Error> {
    let raw = String::deserialize(deserializer)?;
    HeaderName::from_bytes(raw.as_bytes()).map_err(de::Error::custom)
}

// ── Settings ──────────────────────────────────────────────────────────────────

/// The part of [`Config`] that can live in a file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub http: HttpSettings,
    pub routes: RouteTable,
    pub trace: TraceConfig,
    pub require_async: bool,
}

#[derive(Debug, Deserialize)]
pub struct HttpSettings {
    #[serde(default)]
    pub catch_all: bool,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self { catch_all: false, max_body_bytes: default_max_body_bytes() }
    }
}

impl Settings {
    /// Parse YAML settings from bytes.
    pub fn from_yaml_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_slice(bytes)?)
    }
}
