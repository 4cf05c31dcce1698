//! Controller base.
//!
//! A controller is any type that embeds a [`ControllerBase`] and exposes it
//! through [`Controller::base`]. The pipeline binds the request's
//! [`HttpContext`] to it exactly once, before the first filter runs.
//!
//! ```rust
//! use keel::{Controller, ControllerBase};
//!
//! #[derive(Default)]
//! struct UsersController {
//!     base: ControllerBase,
//! }
//!
//! impl Controller for UsersController {
//!     fn base(&self) -> &ControllerBase { &self.base }
//! }
//! ```

use std::any::Any;
use std::sync::{Arc, OnceLock};

use crate::context::HttpContext;
use crate::error::Error;

/// Implemented by every controller type.
pub trait Controller: Any + Send + Sync {
    fn base(&self) -> &ControllerBase;

    /// The context of the request this instance serves, once bound.
    fn http_context(&self) -> Option<&Arc<HttpContext>> {
        self.base().http_context()
    }
}

/// Holds the bound [`HttpContext`].
#[derive(Debug, Default)]
pub struct ControllerBase {
    http_context: OnceLock<Arc<HttpContext>>,
}

impl ControllerBase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `ctx`. A second bind fails with [`Error::ContextAlreadyBound`]
    /// and leaves the first context in place.
    pub fn bind(&self, ctx: Arc<HttpContext>) -> Result<(), Error> {
        self.http_context.set(ctx).map_err(|_| Error::ContextAlreadyBound)
    }

    pub fn http_context(&self) -> Option<&Arc<HttpContext>> {
        self.http_context.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::Method;
    use crate::request::Request;

    fn ctx(path: &str) -> Arc<HttpContext> {
        Arc::new(HttpContext::new(Request::new(Method::Get, path)))
    }

    #[test]
    fn binds_once() {
        let base = ControllerBase::new();
        assert!(base.http_context().is_none());

        base.bind(ctx("/first")).unwrap();
        assert!(matches!(base.bind(ctx("/second")), Err(Error::ContextAlreadyBound)));
        assert_eq!(base.http_context().unwrap().request().path(), "/first");
    }
}
