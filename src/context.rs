//! Per-request HTTP context.
//!
//! One [`HttpContext`] exists per inbound request. Middleware, filters and
//! the controller all hold the same `Arc<HttpContext>` and write the response
//! through it. The first write that finalises the response closes it; from
//! then on [`HttpContext::closed`] is `true` and further writes are dropped.

use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use http::StatusCode;
use serde::Serialize;
use tracing::debug;

use crate::error::Error;
use crate::request::Request;
use crate::response::{ContentType, Response};

#[derive(Debug, Default)]
struct ResponseState {
    status: Option<StatusCode>,
    headers: Vec<(String, String)>,
    body: Bytes,
    finished: bool,
}

/// The request being served and the response being built for it.
#[derive(Debug)]
pub struct HttpContext {
    request: Request,
    response: Mutex<ResponseState>,
}

impl HttpContext {
    pub fn new(request: Request) -> Self {
        Self { request, response: Mutex::new(ResponseState::default()) }
    }

    pub fn request(&self) -> &Request { &self.request }

    /// `true` once the response has been finalised.
    pub fn closed(&self) -> bool {
        self.state().finished
    }

    /// The status set so far, if any.
    pub fn status(&self) -> Option<StatusCode> {
        self.state().status
    }

    /// Sets the status without finalising. Ignored once closed.
    pub fn set_status(&self, status: StatusCode) {
        let mut state = self.state();
        if !state.finished {
            state.status = Some(status);
        }
    }

    /// Adds a response header without finalising. Ignored once closed.
    pub fn set_header(&self, name: &str, value: &str) {
        let mut state = self.state();
        if !state.finished {
            state.headers.push((name.to_owned(), value.to_owned()));
        }
    }

    /// Writes `body` with `status` and closes the response.
    pub fn send(&self, status: StatusCode, content_type: ContentType, body: impl Into<Bytes>) {
        let mut state = self.state();
        if state.finished {
            debug!(path = %self.request.path, "response already closed, write dropped");
            return;
        }
        state.status = Some(status);
        state.headers.push(("content-type".to_owned(), content_type.as_str().to_owned()));
        state.body = body.into();
        state.finished = true;
    }

    /// Writes a plain-text body and closes the response.
    pub fn send_text(&self, status: StatusCode, body: impl Into<String>) {
        self.send(status, ContentType::Text, body.into());
    }

    /// Serialises `value` as JSON and closes the response.
    pub fn send_json<T: Serialize>(&self, status: StatusCode, value: &T) -> Result<(), Error> {
        let bytes = serde_json::to_vec(value)?;
        self.send(status, ContentType::Json, bytes);
        Ok(())
    }

    /// Closes the response with whatever status and headers were set, and
    /// no body. Also used to mark a response dead when the client has gone.
    pub fn end(&self) {
        self.state().finished = true;
    }

    /// Snapshot of the response for the wire. An unset status becomes `200`.
    pub fn to_response(&self) -> Response {
        let state = self.state();
        Response {
            status: state.status.unwrap_or(StatusCode::OK),
            headers: state.headers.clone(),
            body: state.body.clone(),
        }
    }

    fn state(&self) -> MutexGuard<'_, ResponseState> {
        // A panicking writer cannot leave the state half-updated in a way
        // that matters here; keep serving.
        self.response.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::Method;

    fn ctx() -> HttpContext {
        HttpContext::new(Request::new(Method::Get, "/"))
    }

    #[test]
    fn starts_open_and_closes_on_send() {
        let ctx = ctx();
        assert!(!ctx.closed());
        ctx.send_text(StatusCode::OK, "closed before");
        assert!(ctx.closed());
        assert_eq!(ctx.to_response().body_text(), "closed before");
    }

    #[test]
    fn writes_after_close_are_dropped() {
        let ctx = ctx();
        ctx.send_text(StatusCode::ACCEPTED, "first");
        ctx.send_text(StatusCode::INTERNAL_SERVER_ERROR, "second");
        ctx.set_status(StatusCode::NOT_FOUND);

        let response = ctx.to_response();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(response.body_text(), "first");
    }

    #[test]
    fn end_closes_with_preset_status() {
        let ctx = ctx();
        ctx.set_status(StatusCode::NO_CONTENT);
        ctx.end();
        assert!(ctx.closed());
        assert_eq!(ctx.to_response().status(), StatusCode::NO_CONTENT);
        assert!(ctx.to_response().body().is_empty());
    }
}
