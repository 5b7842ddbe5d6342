//! Response bodies, the [`IntoReply`] conversion trait, and rendering a
//! finished [`Context`] into a hyper response.

use bytes::Bytes;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderValue};
use http::StatusCode;
use http_body_util::Full;

use crate::context::Context;

// ── Body ──────────────────────────────────────────────────────────────────────

/// A response body.
#[derive(Clone, Debug, PartialEq)]
pub enum Body {
    Text(String),            // text/plain; charset=utf-8
    Json(serde_json::Value), // application/json
    Bytes(Bytes),            // application/octet-stream
}

impl Body {
    fn content_type(&self) -> &'static str {
        match self {
            Self::Text(_)  => "text/plain; charset=utf-8",
            Self::Json(_)  => "application/json",
            Self::Bytes(_) => "application/octet-stream",
        }
    }

    fn into_bytes(self) -> Bytes {
        match self {
            Self::Text(s)  => Bytes::from(s),
            // Serializing a `Value` only fails for non-string map keys, which
            // `Value` cannot hold.
            Self::Json(v)  => Bytes::from(serde_json::to_vec(&v).unwrap_or_default()),
            Self::Bytes(b) => b,
        }
    }
}

impl From<&'static str> for Body {
    fn from(s: &'static str) -> Self { Self::Text(s.to_owned()) }
}

impl From<String> for Body {
    fn from(s: String) -> Self { Self::Text(s) }
}

impl From<serde_json::Value> for Body {
    fn from(v: serde_json::Value) -> Self { Self::Json(v) }
}

impl From<Bytes> for Body {
    fn from(b: Bytes) -> Self { Self::Bytes(b) }
}

impl From<Vec<u8>> for Body {
    fn from(b: Vec<u8>) -> Self { Self::Bytes(Bytes::from(b)) }
}

// ── IntoReply ─────────────────────────────────────────────────────────────────

/// Conversion of an action's return value into an optional response body.
///
/// `None` means "the action produced nothing": the dispatch wrapper then
/// leaves the body empty.
///
/// ```rust
/// use lift::{Body, IntoReply};
///
/// assert_eq!("pong".into_reply(), Some(Body::Text("pong".into())));
/// assert_eq!(().into_reply(), None);
/// ```
pub trait IntoReply {
    fn into_reply(self) -> Option<Body>;
}

impl IntoReply for () {
    fn into_reply(self) -> Option<Body> { None }
}

impl IntoReply for Body {
    fn into_reply(self) -> Option<Body> { Some(self) }
}

impl IntoReply for &'static str {
    fn into_reply(self) -> Option<Body> { Some(self.into()) }
}

impl IntoReply for String {
    fn into_reply(self) -> Option<Body> { Some(self.into()) }
}

impl IntoReply for serde_json::Value {
    fn into_reply(self) -> Option<Body> { Some(self.into()) }
}

impl IntoReply for Bytes {
    fn into_reply(self) -> Option<Body> { Some(self.into()) }
}

impl IntoReply for Vec<u8> {
    fn into_reply(self) -> Option<Body> { Some(self.into()) }
}

impl<T: IntoReply> IntoReply for Option<T> {
    fn into_reply(self) -> Option<Body> { self.and_then(IntoReply::into_reply) }
}

// ── Rendering ─────────────────────────────────────────────────────────────────

/// Turns a finished context into the response hyper writes out.
///
/// A context without a body answers with its status' reason phrase, except
/// for statuses that must not carry one.
pub(crate) fn render(ctx: Context) -> http::Response<Full<Bytes>> {
    let (status, body, mut headers) = ctx.into_response_parts();

    let body = match body {
        Some(body) => Some(body),
        None if is_bodiless(status) => None,
        None => Some(Body::Text(status.canonical_reason().unwrap_or("").to_owned())),
    };

    if let Some(body) = &body {
        if !headers.contains_key(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(body.content_type()));
        }
    }

    let bytes = body.map(Body::into_bytes).unwrap_or_default();
    headers.insert(CONTENT_LENGTH, HeaderValue::from(bytes.len()));

    let mut res = http::Response::new(Full::new(bytes));
    *res.status_mut() = status;
    *res.headers_mut() = headers;
    res
}

fn is_bodiless(status: StatusCode) -> bool {
    status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED
        || status.is_informational()
}
