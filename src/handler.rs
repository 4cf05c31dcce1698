//! Route handlers.
//!
//! A handler gets the request's shared [`HttpContext`], writes the response
//! through it and returns nothing. [`ApiRouter`](crate::ApiRouter) mounts one
//! handler per action; plain closures can be mounted next to them with
//! [`Router::on`](crate::Router::on).
//!
//! Handlers of different closure types live in the same radix tree, so each
//! is boxed once at registration:
//!
//! ```text
//! router.on(Method::Get, "/ping", |ctx| async move { … })
//!        ↓ Handler::into_boxed_handler
//! Arc<ContextHandler<F>>  as  BoxedHandler
//!        ↓ per matched request
//! handler.call(ctx).await
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::HttpContext;

pub(crate) type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Object-safe face of a handler. Public only because
/// [`Handler::into_boxed_handler`] names it.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, ctx: Arc<HttpContext>) -> BoxFuture;
}

#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

/// Any `Fn(Arc<HttpContext>) -> impl Future<Output = ()>` that is
/// `Send + Sync + 'static`. Sealed.
pub trait Handler: sealed::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod sealed {
    pub trait Sealed {}
}

impl<F, Fut> sealed::Sealed for F
where
    F: Fn(Arc<HttpContext>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
}

impl<F, Fut> Handler for F
where
    F: Fn(Arc<HttpContext>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(ContextHandler(self))
    }
}

struct ContextHandler<F>(F);

impl<F, Fut> ErasedHandler for ContextHandler<F>
where
    F: Fn(Arc<HttpContext>) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn call(&self, ctx: Arc<HttpContext>) -> BoxFuture {
        Box::pin((self.0)(ctx))
    }
}
