//! Per-request context.
//!
//! One [`Context`] is created when a request enters the pipeline and consumed
//! when the response is rendered. Every middleware, policy and action sees the
//! same value, by mutable reference, in registration order.
//!
//! Response state follows the usual framework defaults: the status starts at
//! `404 Not Found` and is not considered explicit. Setting a body while the
//! status is still implicit switches it to `200 OK`.

use std::collections::HashMap;

use bytes::Bytes;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::{Method, StatusCode};

use crate::middleware::trace::TraceId;
use crate::request::{Request, RequestBody};
use crate::response::Body;

pub struct Context {
    request: Request,
    params: HashMap<String, String>,
    status: StatusCode,
    explicit_status: bool,
    body: Option<Body>,
    headers: HeaderMap,
    trace_id: Option<TraceId>,
}

impl Context {
    pub fn new(req: http::Request<Bytes>) -> Self {
        Self {
            request: Request::from_http(req),
            params: HashMap::new(),
            status: StatusCode::NOT_FOUND,
            explicit_status: false,
            body: None,
            headers: HeaderMap::new(),
            trace_id: None,
        }
    }

    // ── Request ───────────────────────────────────────────────────────────────

    pub fn request(&self) -> &Request { &self.request }
    pub fn method(&self) -> &Method { self.request.method() }
    pub fn path(&self) -> &str { self.request.path() }

    /// Case-insensitive request header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.request.header(name)
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/:id`, `ctx.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn params(&self) -> &HashMap<String, String> { &self.params }

    pub(crate) fn set_params(&mut self, params: HashMap<String, String>) {
        self.params = params;
    }

    pub(crate) fn set_request_body(&mut self, body: RequestBody) {
        self.request.body = body;
    }

    // ── Response ──────────────────────────────────────────────────────────────

    pub fn status(&self) -> StatusCode { self.status }

    /// Whether anything in the pipeline has set the status on purpose.
    pub fn is_status_explicit(&self) -> bool { self.explicit_status }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
        self.explicit_status = true;
    }

    pub fn body(&self) -> Option<&Body> { self.body.as_ref() }
    pub fn has_body(&self) -> bool { self.body.is_some() }

    /// Sets the response body. An implicit status becomes `200 OK`.
    pub fn set_body(&mut self, body: impl Into<Body>) {
        if !self.explicit_status {
            self.status = StatusCode::OK;
        }
        self.body = Some(body.into());
    }

    /// Records that the handler produced nothing. An implicit status becomes
    /// `204 No Content`.
    pub fn set_empty(&mut self) {
        if !self.explicit_status {
            self.status = StatusCode::NO_CONTENT;
        }
        self.body = None;
    }

    pub fn response_headers(&self) -> &HeaderMap { &self.headers }

    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    // ── Trace ─────────────────────────────────────────────────────────────────

    /// The trace identifier of this request, once the trace middleware ran.
    pub fn trace_id(&self) -> Option<&TraceId> { self.trace_id.as_ref() }

    pub(crate) fn set_trace_id(&mut self, id: TraceId) {
        self.trace_id = Some(id);
    }

    /// Discards whatever the pipeline produced in favour of an error answer.
    /// Response headers (the trace id among them) are kept.
    pub(crate) fn replace_response(&mut self, status: StatusCode, body: Body) {
        self.status = status;
        self.explicit_status = true;
        self.body = Some(body);
    }

    pub(crate) fn into_response_parts(self) -> (StatusCode, Option<Body>, HeaderMap) {
        (self.status, self.body, self.headers)
    }
}
