//! Radix-tree request router.
//!
//! One tree per HTTP method. O(path-length) lookup. Sub-routers can be
//! nested under a prefix, which is how controllers sharing a route prefix
//! end up grouped.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use http::StatusCode;
use matchit::Router as MatchitRouter;
use percent_encoding::percent_decode_str;
use tracing::debug;

use crate::context::HttpContext;
use crate::handler::{BoxedHandler, Handler};
use crate::metadata::{merge_route, to_router_path};
use crate::method::Method;
use crate::middleware::Middleware;
use crate::request::Request;
use crate::response::Response;

/// The application router.
///
/// Build it once at startup; pass it to [`Server::serve`](crate::Server::serve).
/// Each registration call returns `self` so registrations chain naturally.
pub struct Router {
    trees: HashMap<Method, MatchitRouter<BoxedHandler>>,
    routes: Vec<(Method, String, BoxedHandler)>,
    middleware: Vec<Arc<dyn Middleware>>,
}

impl Router {
    pub fn new() -> Self {
        Self { trees: HashMap::new(), routes: Vec::new(), middleware: Vec::new() }
    }

    /// Register a handler for a method + path pair. Returns `self` for chaining.
    ///
    /// Path parameters use `:name` segments:
    ///
    /// ```rust
    /// # use std::sync::Arc;
    /// # use keel::{HttpContext, Method, Router, StatusCode};
    /// async fn get_user(ctx: Arc<HttpContext>) {
    ///     let id = ctx.request().param("id").unwrap_or("unknown").to_owned();
    ///     ctx.send_text(StatusCode::OK, id);
    /// }
    ///
    /// let app = Router::new().on(Method::Get, "/users/:id", get_user);
    /// assert_eq!(app.routes().count(), 1);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics on a path the radix tree rejects, e.g. one that conflicts
    /// with an earlier registration.
    pub fn on(self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.add(method, path, handler.into_boxed_handler())
    }

    /// Mounts every route of `router` under `prefix`. Middleware of the
    /// nested router is not carried over.
    pub fn nest(mut self, prefix: &str, router: Router) -> Self {
        for (method, path, handler) in router.routes {
            self = self.add(method, &merge_route(prefix, &path), handler);
        }
        self
    }

    /// Appends middleware. Runs before every matched handler.
    pub fn layer(mut self, middleware: impl Middleware) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Registered `(method, path)` pairs, in registration order, as mounted.
    pub fn routes(&self) -> impl Iterator<Item = (Method, &str)> {
        self.routes.iter().map(|(m, p, _)| (*m, p.as_str()))
    }

    fn add(mut self, method: Method, path: &str, handler: BoxedHandler) -> Self {
        let mounted = to_router_path(path);
        self.trees
            .entry(method)
            .or_default()
            .insert(mounted.clone(), Arc::clone(&handler))
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self.routes.push((method, mounted, handler));
        self
    }

    /// Path captures come back percent-decoded. Bytes that do not decode to
    /// UTF-8 become U+FFFD.
    pub(crate) fn lookup(
        &self,
        method: Method,
        path: &str,
    ) -> Option<(BoxedHandler, HashMap<String, String>)> {
        let tree = self.trees.get(&method)?;
        let matched = tree.at(path).ok()?;
        let handler = Arc::clone(matched.value);
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), percent_decode_str(v).decode_utf8_lossy().into_owned()))
            .collect();
        Some((handler, params))
    }

    /// Routes one request and produces one response. Unmatched paths get
    /// `404`.
    pub async fn handle(&self, mut req: Request) -> Response {
        let started = Instant::now();
        let method = req.method();
        let path = req.path().to_owned();

        let Some((handler, params)) = self.lookup(method, &path) else {
            debug!(%method, %path, status = 404, "no route");
            return Response::empty(StatusCode::NOT_FOUND);
        };
        req.set_params(params);

        let ctx = Arc::new(HttpContext::new(req));
        for middleware in &self.middleware {
            middleware.handle(&ctx).await;
        }
        handler.call(Arc::clone(&ctx)).await;

        let response = ctx.to_response();
        debug!(
            %method,
            %path,
            status = response.status().as_u16(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "request served"
        );
        response
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}
