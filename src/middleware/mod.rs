//! Middleware layer.
//!
//! Middleware runs on every matched request, in registration order, before
//! the route handler. It sees the same [`HttpContext`] the handler will and
//! may finalise the response; the controller pipeline then finds the
//! response closed and does not run the action or its filters.
//!
//! ```rust
//! use async_trait::async_trait;
//! use keel::{HttpContext, Router, StatusCode};
//! use keel::middleware::Middleware;
//!
//! struct RequireApiKey;
//!
//! #[async_trait]
//! impl Middleware for RequireApiKey {
//!     async fn handle(&self, ctx: &HttpContext) {
//!         if ctx.request().header("x-api-key").is_none() {
//!             ctx.send_text(StatusCode::UNAUTHORIZED, "missing api key");
//!         }
//!     }
//! }
//!
//! let app = Router::new().layer(RequireApiKey);
//! ```

use async_trait::async_trait;

use crate::context::HttpContext;

#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    async fn handle(&self, ctx: &HttpContext);
}
