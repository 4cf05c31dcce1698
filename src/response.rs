//! Outgoing HTTP response type and the [`IntoActionResult`] conversion trait.
//!
//! Actions never build a [`Response`] directly. They return a value the
//! pipeline turns into the body, or they write through the
//! [`HttpContext`](crate::HttpContext) themselves.

use bytes::Bytes;
use http::StatusCode;
use http_body_util::Full;
use serde::Serialize;

use crate::error::Error;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Content-type values accepted by [`HttpContext::send`](crate::HttpContext::send).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ContentType {
    Html,         // text/html; charset=utf-8
    Json,         // application/json
    OctetStream,  // application/octet-stream
    Text,         // text/plain; charset=utf-8
}

impl ContentType {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Html        => "text/html; charset=utf-8",
            Self::Json        => "application/json",
            Self::OctetStream => "application/octet-stream",
            Self::Text        => "text/plain; charset=utf-8",
        }
    }
}

// ── Response ─────────────────────────────────────────────────────────────────

/// A finalised HTTP response, ready for the wire.
///
/// Produced from an [`HttpContext`](crate::HttpContext) once dispatch ends.
#[derive(Debug, Clone)]
pub struct Response {
    pub(crate) status: StatusCode,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: Bytes,
}

impl Response {
    pub fn status(&self) -> StatusCode { self.status }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The body as UTF-8, lossily.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub(crate) fn empty(status: StatusCode) -> Self {
        Self { status, headers: Vec::new(), body: Bytes::new() }
    }

    pub(crate) fn into_inner(self) -> http::Response<Full<Bytes>> {
        let mut builder = http::Response::builder().status(self.status);
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        // Header names and values were accepted as plain strings; a bad one
        // degrades to a bare 500 rather than tearing down the connection.
        builder.body(Full::new(self.body)).unwrap_or_else(|_| {
            let mut fallback = http::Response::new(Full::new(Bytes::new()));
            *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            fallback
        })
    }
}

// ── ActionResult ──────────────────────────────────────────────────────────────

/// The value an action hands back to the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionResult {
    /// Nothing returned; the pipeline writes `{}`.
    Empty,
    Text(String),
    Json(serde_json::Value),
}

/// Wraps any serialisable value so an action can return it as JSON.
///
/// ```rust
/// use keel::{ActionResult, IntoActionResult, Json};
///
/// #[derive(serde::Serialize)]
/// struct User { id: u32 }
///
/// let result = Json(User { id: 7 }).into_action_result().unwrap();
/// assert_eq!(result, ActionResult::Json(serde_json::json!({ "id": 7 })));
/// ```
pub struct Json<T>(pub T);

/// Conversion into an [`ActionResult`].
///
/// Implemented for `()`, strings, `serde_json::Value`, [`Json`] and
/// `Option` of any of those.
pub trait IntoActionResult {
    fn into_action_result(self) -> Result<ActionResult, Error>;
}

impl IntoActionResult for ActionResult {
    fn into_action_result(self) -> Result<ActionResult, Error> { Ok(self) }
}

impl IntoActionResult for () {
    fn into_action_result(self) -> Result<ActionResult, Error> { Ok(ActionResult::Empty) }
}

impl IntoActionResult for &'static str {
    fn into_action_result(self) -> Result<ActionResult, Error> {
        Ok(ActionResult::Text(self.to_owned()))
    }
}

impl IntoActionResult for String {
    fn into_action_result(self) -> Result<ActionResult, Error> { Ok(ActionResult::Text(self)) }
}

impl IntoActionResult for serde_json::Value {
    fn into_action_result(self) -> Result<ActionResult, Error> { Ok(ActionResult::Json(self)) }
}

impl<T: Serialize> IntoActionResult for Json<T> {
    fn into_action_result(self) -> Result<ActionResult, Error> {
        Ok(ActionResult::Json(serde_json::to_value(self.0)?))
    }
}

impl<T: IntoActionResult> IntoActionResult for Option<T> {
    fn into_action_result(self) -> Result<ActionResult, Error> {
        match self {
            Some(value) => value.into_action_result(),
            None => Ok(ActionResult::Empty),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_and_none_are_empty() {
        assert_eq!(().into_action_result().unwrap(), ActionResult::Empty);
        assert_eq!(None::<String>.into_action_result().unwrap(), ActionResult::Empty);
    }

    #[test]
    fn into_inner_carries_status_headers_and_body() {
        let response = Response {
            status: StatusCode::CREATED,
            headers: vec![("location".into(), "/users/9".into())],
            body: Bytes::from_static(b"{}"),
        };
        let inner = response.into_inner();
        assert_eq!(inner.status(), StatusCode::CREATED);
        assert_eq!(inner.headers()["location"], "/users/9");
    }
}
