//! Capabilities the dispatch wrapper depends on.
//!
//! The embedding application decides what counts as an *operational* failure
//! (an error raised on purpose, with a client-facing rendering) and where
//! warnings go. Both are handed to [`Lift`](crate::Lift) explicitly; nothing
//! here is looked up from global state.
//!
//! [`Errors`] and [`TracingLogger`] are the stock implementations.

use std::fmt;

use serde_json::json;
use thiserror::Error;

use crate::error::BoxError;
use crate::response::Body;

// ── Taxonomy ──────────────────────────────────────────────────────────────────

/// The category a request-time failure falls into.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FailureKind {
    Operational,
    Unknown,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Operational => "operational",
            Self::Unknown => "unknown",
        })
    }
}

/// Result of classifying a failure.
#[derive(Clone, Debug, PartialEq)]
pub enum Failure {
    /// A recognised failure, with the payload it renders itself as.
    Operational(Body),
    Unknown,
}

impl Failure {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Operational(_) => FailureKind::Operational,
            Self::Unknown => FailureKind::Unknown,
        }
    }
}

/// Tells operational failures apart from everything else.
pub trait ErrorTaxonomy: Send + Sync + 'static {
    fn classify(&self, err: &BoxError) -> Failure;

    /// The payload sent for unknown failures. Must not leak error details.
    fn fallback(&self) -> Body;
}

/// Where failure warnings go.
pub trait Logger: Send + Sync + 'static {
    fn warn(&self, err: &BoxError, kind: FailureKind);
}

// ── Stock implementations ─────────────────────────────────────────────────────

/// An intentionally raised application error with a client-facing rendering.
///
/// ```rust
/// use lift::OperationalError;
///
/// let err = OperationalError::new("USER_NOT_FOUND", "no such user");
/// assert_eq!(err.to_string(), "USER_NOT_FOUND: no such user");
/// ```
#[derive(Clone, Debug, Error, PartialEq)]
#[error("{code}: {message}")]
pub struct OperationalError {
    pub code: String,
    pub message: String,
}

impl OperationalError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self { code: code.into(), message: message.into() }
    }

    /// The payload this error renders as.
    pub fn response(&self) -> Body {
        Body::Json(json!({ "code": self.code, "message": self.message }))
    }
}

/// Recognises [`OperationalError`] anywhere in an error's source chain.
#[derive(Clone, Copy, Debug, Default)]
pub struct Errors;

impl ErrorTaxonomy for Errors {
    fn classify(&self, err: &BoxError) -> Failure {
        let mut cur: Option<&(dyn std::error::Error + 'static)> = Some(&**err);
        while let Some(e) = cur {
            if let Some(op) = e.downcast_ref::<OperationalError>() {
                return Failure::Operational(op.response());
            }
            cur = e.source();
        }
        Failure::Unknown
    }

    fn fallback(&self) -> Body {
        Body::Json(json!({ "code": "UNKNOWN", "message": "unknown error" }))
    }
}

/// Emits failure warnings as `tracing` events.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn warn(&self, err: &BoxError, kind: FailureKind) {
        tracing::warn!(%kind, error = %err, "request failed");
    }
}
