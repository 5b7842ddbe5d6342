//! Incoming HTTP request type.

use bytes::Bytes;
use http::{HeaderMap, Method, Uri};

/// The request body after the body-parsing stage has looked at it.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum RequestBody {
    /// No body, or body parsing has not run.
    #[default]
    Empty,
    Json(serde_json::Value),
    Text(String),
    /// `application/x-www-form-urlencoded` pairs, decoded, in wire order.
    /// Repeated keys stay repeated.
    Form(Vec<(String, String)>),
    /// Anything that is not JSON, a form or text, untouched.
    Bytes(Bytes),
}

/// The request half of a [`Context`](crate::Context).
pub struct Request {
    pub(crate) method: Method,
    pub(crate) uri: Uri,
    pub(crate) headers: HeaderMap,
    pub(crate) raw: Bytes,
    pub(crate) body: RequestBody,
}

impl Request {
    pub(crate) fn from_http(req: http::Request<Bytes>) -> Self {
        let (parts, raw) = req.into_parts();
        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            raw,
            body: RequestBody::Empty,
        }
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn path(&self) -> &str { self.uri.path() }
    pub fn query(&self) -> Option<&str> { self.uri.query() }
    pub fn headers(&self) -> &HeaderMap { &self.headers }

    /// The body exactly as it arrived on the wire.
    pub fn raw_body(&self) -> &[u8] { &self.raw }

    /// The parsed body. [`RequestBody::Empty`] until body parsing has run.
    pub fn body(&self) -> &RequestBody { &self.body }

    /// Case-insensitive header lookup. Non-UTF-8 values read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}
