//! Controllers and the action resolver.
//!
//! A route table names actions as strings (`"Users.show"`). Rust has no
//! `controller[name]`, so the mapping from method name to function is built
//! when the controller is registered:
//!
//! ```rust
//! use lift::{BoxError, Context, Controller, Controllers};
//!
//! struct Users;
//!
//! impl Users {
//!     async fn show(&self, ctx: &mut Context) -> Result<String, BoxError> {
//!         Ok(format!("user {}", ctx.param("id").unwrap_or("?")))
//!     }
//! }
//!
//! let controllers = Controllers::new().register(
//!     "Users",
//!     Controller::new(Users).action("show", |users, ctx| Box::pin(users.show(ctx))),
//! );
//! assert!(controllers.resolve("Users.show").is_ok());
//! ```
//!
//! Every action is bound to its controller instance, which is shared (`Arc`)
//! by all of that controller's actions and all in-flight requests.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::context::Context;
use crate::error::{BoxError, ConfigError};
use crate::handler::BoxFuture;
use crate::response::{Body, IntoReply};

// ── Erased actions ────────────────────────────────────────────────────────────

/// A controller action bound to its instance, with its return value already
/// converted to a body.
pub trait Action: Send + Sync + 'static {
    fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, Result<Option<Body>, BoxError>>;
}

pub type BoundAction = Arc<dyn Action>;

struct AsyncAction<T, F, R> {
    instance: Arc<T>,
    f: F,
    _reply: PhantomData<fn() -> R>,
}

impl<T, F, R> Action for AsyncAction<T, F, R>
where
    T: Send + Sync + 'static,
    F: for<'a> Fn(&'a T, &'a mut Context) -> BoxFuture<'a, Result<R, BoxError>> + Send + Sync + 'static,
    R: IntoReply + 'static,
{
    fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, Result<Option<Body>, BoxError>> {
        let fut = (self.f)(&self.instance, ctx);
        Box::pin(async move { fut.await.map(IntoReply::into_reply) })
    }
}

struct SyncAction<T, F, R> {
    instance: Arc<T>,
    f: F,
    _reply: PhantomData<fn() -> R>,
}

impl<T, F, R> Action for SyncAction<T, F, R>
where
    T: Send + Sync + 'static,
    F: Fn(&T, &mut Context) -> Result<R, BoxError> + Send + Sync + 'static,
    R: IntoReply + 'static,
{
    fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, Result<Option<Body>, BoxError>> {
        // Run on first poll so a panic surfaces inside the future, where the
        // dispatch wrapper catches it.
        Box::pin(async move { (self.f)(&self.instance, ctx).map(IntoReply::into_reply) })
    }
}

#[derive(Clone)]
struct Entry {
    action: BoundAction,
    is_async: bool,
}

// ── Controller ────────────────────────────────────────────────────────────────

/// A controller instance and the actions it exposes by name.
pub struct Controller<T> {
    instance: Arc<T>,
    actions: HashMap<String, Entry>,
}

impl<T: Send + Sync + 'static> Controller<T> {
    pub fn new(instance: T) -> Self {
        Self::shared(Arc::new(instance))
    }

    /// Like [`Controller::new`] for an instance the application also holds.
    pub fn shared(instance: Arc<T>) -> Self {
        Self { instance, actions: HashMap::new() }
    }

    /// Exposes an asynchronous action under `name`.
    pub fn action<F, R>(mut self, name: &str, f: F) -> Self
    where
        F: for<'a> Fn(&'a T, &'a mut Context) -> BoxFuture<'a, Result<R, BoxError>> + Send + Sync + 'static,
        R: IntoReply + 'static,
    {
        let action = AsyncAction { instance: Arc::clone(&self.instance), f, _reply: PhantomData };
        self.actions.insert(name.to_owned(), Entry { action: Arc::new(action), is_async: true });
        self
    }

    /// Exposes a synchronous action under `name`.
    ///
    /// Rejected at startup when the application requires async actions
    /// (see [`Config::require_async`](crate::Config::require_async)).
    pub fn action_sync<F, R>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&T, &mut Context) -> Result<R, BoxError> + Send + Sync + 'static,
        R: IntoReply + 'static,
    {
        let action = SyncAction { instance: Arc::clone(&self.instance), f, _reply: PhantomData };
        self.actions.insert(name.to_owned(), Entry { action: Arc::new(action), is_async: false });
        self
    }
}

// ── Registry ──────────────────────────────────────────────────────────────────

/// Controllers by name. Read-only once handed to [`Lift`](crate::Lift).
#[derive(Clone, Default)]
pub struct Controllers {
    by_name: HashMap<String, HashMap<String, Entry>>,
}

/// An action spec resolved against the registry.
#[derive(Clone)]
pub struct ResolvedAction {
    pub controller: String,
    pub method: String,
    pub is_async: bool,
    pub action: BoundAction,
}

impl ResolvedAction {
    /// `"Controller.method"`, the key policies are registered under.
    pub fn key(&self) -> String {
        format!("{}.{}", self.controller, self.method)
    }
}

impl Controllers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: Send + Sync + 'static>(mut self, name: &str, controller: Controller<T>) -> Self {
        self.by_name.insert(name.to_owned(), controller.actions);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Resolves `"Controller.method"`.
    ///
    /// Only the first two dot-separated parts are read; `"A.b.c"` names
    /// method `b` of controller `A`.
    pub fn resolve(&self, spec: &str) -> Result<ResolvedAction, ConfigError> {
        let mut parts = spec.split('.');
        let controller = parts.next().unwrap_or_default();
        let method = parts.next().unwrap_or_default();
        if controller.is_empty() || method.is_empty() {
            return Err(ConfigError::InvalidActionSpec(spec.to_owned()));
        }

        let actions = self
            .by_name
            .get(controller)
            .ok_or_else(|| ConfigError::UnknownController(controller.to_owned()))?;
        let entry = actions
            .get(method)
            .ok_or_else(|| ConfigError::UnknownAction(spec.to_owned()))?;

        Ok(ResolvedAction {
            controller: controller.to_owned(),
            method: method.to_owned(),
            is_async: entry.is_async,
            action: Arc::clone(&entry.action),
        })
    }
}
