//! Request body parsing.
//!
//! Runs before user middlewares so everything downstream reads a
//! [`RequestBody`] instead of raw bytes. A body larger than the configured
//! limit fails the request with `413`; a body that claims to be JSON but is
//! not fails it with `400`.

use std::sync::Arc;

use http::StatusCode;
use http::header::CONTENT_TYPE;

use crate::context::Context;
use crate::error::{BoxError, HttpError};
use crate::handler::{BoxFuture, BoxedMiddleware, Middleware, Next};
use crate::request::{Request, RequestBody};

/// Parses bodies of at most `max_bytes` bytes.
pub fn body_parser(max_bytes: usize) -> BoxedMiddleware {
    Arc::new(BodyParser { max_bytes })
}

struct BodyParser {
    max_bytes: usize,
}

impl Middleware for BodyParser {
    fn call<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, Result<(), BoxError>> {
        let parsed = parse(ctx.request(), self.max_bytes);
        Box::pin(async move {
            ctx.set_request_body(parsed?);
            next.run(ctx).await
        })
    }
}

fn parse(req: &Request, max_bytes: usize) -> Result<RequestBody, HttpError> {
    if req.raw.is_empty() {
        return Ok(RequestBody::Empty);
    }
    if req.raw.len() > max_bytes {
        return Err(HttpError::new(StatusCode::PAYLOAD_TOO_LARGE, "request body too large"));
    }

    let mime = req
        .header(CONTENT_TYPE.as_str())
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_ascii_lowercase())
        .unwrap_or_default();

    if mime == "application/json" || mime.ends_with("+json") {
        serde_json::from_slice(&req.raw)
            .map(RequestBody::Json)
            .map_err(|e| HttpError::bad_request(format!("invalid JSON body: {e}")))
    } else if mime == "application/x-www-form-urlencoded" {
        let pairs = url::form_urlencoded::parse(&req.raw)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        Ok(RequestBody::Form(pairs))
    } else if mime.starts_with("text/") {
        String::from_utf8(req.raw.to_vec())
            .map(RequestBody::Text)
            .map_err(|_| HttpError::bad_request("invalid UTF-8 body"))
    } else {
        Ok(RequestBody::Bytes(req.raw.clone()))
    }
}
