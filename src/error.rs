//! Error types.
//!
//! Failures are split by when they happen:
//!
//! - [`ConfigError`]: the route table, a controller reference or a required
//!   capability is wrong. Raised by [`Lift::lift`](crate::Lift::lift) before a
//!   single request is served.
//! - [`BoxError`]: whatever an action, policy or middleware fails with at
//!   request time. The dispatch wrapper turns these into responses.
//! - [`HttpError`]: a request-time failure that carries its own status.
//! - [`Error`]: infrastructure failures of the bundled server.

use http::StatusCode;
use thiserror::Error;

/// Request-time failure raised by actions, policies and middlewares.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A startup-time configuration error. The pipeline refuses to assemble.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid route method: {0}")]
    InvalidMethod(String),

    #[error("invalid action spec `{0}`, expected `Controller.method`")]
    InvalidActionSpec(String),

    #[error("undefined controller: {0}")]
    UnknownController(String),

    #[error("undefined action method: {0}")]
    UnknownAction(String),

    #[error("controller action `{0}` must be async")]
    ActionNotAsync(String),

    #[error("invalid route `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: matchit::InsertError,
    },

    #[error("unsupported path parameter `{segment}` in route `{pattern}`, expected `:name`")]
    UnsupportedParam { pattern: String, segment: String },

    #[error("no {0} registered")]
    MissingCapability(&'static str),

    #[error("invalid settings: {0}")]
    Settings(#[from] serde_yaml::Error),
}

/// An error that knows which HTTP status it should surface as.
///
/// Middlewares that run above the dispatch wrapper (body parsing, user
/// middlewares) fail with this when the client is at fault. The pipeline's
/// last-resort handler honours the status instead of answering 500.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HttpError {
    pub status: StatusCode,
    pub message: String,
}

impl HttpError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

/// The error type returned by the server's fallible operations.
///
/// Application-level errors are expressed as responses, not as `Error`s. This
/// type surfaces infrastructure failures: parsing the bind address, binding to
/// a port.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid socket address `{addr}`: {source}")]
    Addr {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
