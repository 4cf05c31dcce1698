//! The controller dispatch pipeline.
//!
//! [`ApiRouter`] mounts one route per registered action and runs every
//! matched request through the same sequence:
//!
//! ```text
//! response closed? ── yes ──▶ done, nothing runs
//!        │ no
//! open scope ─▶ resolve filters ─▶ resolve controller ─▶ bind action
//!        ─▶ bind HttpContext ─▶ before filters (global → controller → action)
//!        ─▶ action ─▶ after filters (action → controller → global) ─▶ finish
//!
//! any failure ─▶ error hooks ─▶ 500 with the error message (if still open)
//! ```
//!
//! A panic in an action or a filter hook is caught and handled like any
//! other failure.
//!
//! Before and after phases stop at the first filter that finds the response
//! closed, unless [`ApiRouter::ignore_closed_response_on_filters`] is set.
//! The action itself never runs on a closed response.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use http::StatusCode;
use tracing::{debug, error};

use crate::binder::bind_arguments;
use crate::context::HttpContext;
use crate::error::Error;
use crate::filter::{Filter, FilterRef};
use crate::injector::{Injector, Resolver};
use crate::metadata::{Registry, RoutingContext};
use crate::response::ActionResult;
use crate::router::Router;

/// Scope name used when a controller does not name its own.
pub const REQUEST_SCOPE: &str = "request";

/// Order in which `on_error` hooks run.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ErrorHookOrder {
    /// action → controller → global, like the after phase.
    #[default]
    Reverse,
    /// global → controller → action, like the before phase.
    Forward,
}

#[derive(Clone, Copy)]
enum Phase {
    Before,
    After,
}

/// Maps registered controllers onto a [`Router`] and dispatches requests
/// through their filters and actions.
pub struct ApiRouter {
    registry: Arc<Registry>,
    injector: Arc<dyn Injector>,
    global_filters: Vec<FilterRef>,
    ignore_closed_response_on_filters: bool,
    error_hook_order: ErrorHookOrder,
}

impl ApiRouter {
    pub fn new(registry: Arc<Registry>, injector: Arc<dyn Injector>) -> Self {
        Self {
            registry,
            injector,
            global_filters: Vec::new(),
            ignore_closed_response_on_filters: false,
            error_hook_order: ErrorHookOrder::default(),
        }
    }

    /// Runs every filter hook even after the response has been closed.
    pub fn ignore_closed_response_on_filters(&mut self) -> &mut Self {
        self.ignore_closed_response_on_filters = true;
        self
    }

    pub fn set_error_hook_order(&mut self, order: ErrorHookOrder) -> &mut Self {
        self.error_hook_order = order;
        self
    }

    /// Appends a global filter. Global filters run in registration order.
    pub fn register_global_filter<F: Filter>(&mut self) -> &mut Self {
        self.global_filters.push(FilterRef::of::<F>());
        self
    }

    pub fn register_global_filters(&mut self, filters: impl IntoIterator<Item = FilterRef>) -> &mut Self {
        self.global_filters.extend(filters);
        self
    }

    pub fn registry(&self) -> &Arc<Registry> { &self.registry }

    /// Mounts every registered action on `app` and returns it.
    ///
    /// Actions are grouped into one sub-router per controller prefix, so
    /// controllers that share a prefix share a mount point.
    pub fn register_routes(self: &Arc<Self>, app: Router) -> Router {
        let mut prefixes: Vec<String> = Vec::new();
        let mut routers: HashMap<String, Router> = HashMap::new();

        for routing in self.registry.routing_contexts() {
            let prefix = routing.controller_type().descriptor().route();
            let action = routing.action_type();
            let method = action.method();
            let suffix = action.descriptor().route_template().to_owned();

            debug!(%method, route = %routing.route(), action = %routing, "mapping route");

            let router = routers.entry(prefix.clone()).or_insert_with(|| {
                prefixes.push(prefix.clone());
                Router::new()
            });

            let api = Arc::clone(self);
            let handler = move |ctx: Arc<HttpContext>| {
                let api = Arc::clone(&api);
                let routing = routing.clone();
                async move { api.dispatch(ctx, &routing).await }
            };
            *router = std::mem::take(router).on(method, &suffix, handler);
        }

        prefixes.into_iter().fold(app, |app, prefix| match routers.remove(&prefix) {
            Some(router) => app.nest(&prefix, router),
            None => app,
        })
    }

    /// Runs the pipeline for one request. Never fails: errors end up in the
    /// response.
    pub async fn dispatch(&self, ctx: Arc<HttpContext>, routing: &RoutingContext) {
        debug!(path = ctx.request().path(), "request received");

        if ctx.closed() {
            debug!(action = %routing, "response already closed, action will not be called");
            return;
        }
        debug!(action = %routing, "executing action");

        let scope_name = routing.controller_type().descriptor().scope_name().unwrap_or(REQUEST_SCOPE);
        let scope = self.injector.create_scope(scope_name);
        let mut filters = Vec::new();

        let outcome = AssertUnwindSafe(self.run(&ctx, routing, scope.as_ref(), &mut filters))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(Error::Panic(panic_message(panic))));

        match outcome {
            Ok(()) => debug!(action = %routing, status = ?ctx.status(), "action returned"),
            Err(err) => self.fail(&ctx, routing, &filters, err).await,
        }
    }

    async fn run(
        &self,
        ctx: &Arc<HttpContext>,
        routing: &RoutingContext,
        scope: &dyn Resolver,
        filters: &mut Vec<Arc<dyn Filter>>,
    ) -> Result<(), Error> {
        for filter in self.filter_refs(routing) {
            filters.push(filter.resolve(scope)?);
        }

        let instance = routing.controller_type().instantiate(scope)?;
        let action = routing.action_type().bind(&instance)?;
        instance.controller().base().bind(Arc::clone(ctx))?;

        self.run_phase(Phase::Before, filters.iter(), ctx, routing).await?;

        let result = if ctx.closed() {
            None
        } else {
            let args = bind_arguments(routing.action_type(), ctx.request())?;
            Some(action.invoke(args).await?)
        };

        self.run_phase(Phase::After, filters.iter().rev(), ctx, routing).await?;

        finish(ctx, result)
    }

    /// global, then controller, then action filters.
    fn filter_refs<'a>(&'a self, routing: &'a RoutingContext) -> impl Iterator<Item = &'a FilterRef> {
        self.global_filters
            .iter()
            .chain(routing.controller_type().descriptor().filter_refs())
            .chain(routing.action_type().descriptor().filter_refs())
    }

    async fn run_phase<'a>(
        &self,
        phase: Phase,
        filters: impl Iterator<Item = &'a Arc<dyn Filter>>,
        ctx: &HttpContext,
        routing: &RoutingContext,
    ) -> Result<(), Error> {
        for filter in filters {
            if ctx.closed() && !self.ignore_closed_response_on_filters {
                break;
            }
            match phase {
                Phase::Before => filter.before_execute(ctx, routing).await?,
                Phase::After => filter.after_execute(ctx, routing).await?,
            }
        }
        Ok(())
    }

    async fn fail(&self, ctx: &HttpContext, routing: &RoutingContext, filters: &[Arc<dyn Filter>], err: Error) {
        error!(action = %routing, "{err}");

        let mut ordered: Vec<&Arc<dyn Filter>> = filters.iter().collect();
        if self.error_hook_order == ErrorHookOrder::Reverse {
            ordered.reverse();
        }
        for filter in ordered {
            if ctx.closed() && !self.ignore_closed_response_on_filters {
                break;
            }
            let hook = AssertUnwindSafe(filter.on_error(ctx, routing, &err)).catch_unwind().await;
            match hook {
                Ok(Ok(())) => {}
                Ok(Err(hook_err)) => error!(action = %routing, "error hook failed: {hook_err}"),
                Err(panic) => error!(action = %routing, "error hook panicked: {}", panic_message(panic)),
            }
        }

        if !ctx.closed() {
            ctx.send_text(StatusCode::INTERNAL_SERVER_ERROR, err.to_string());
        }
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(message) => *message,
        Err(panic) => match panic.downcast::<&'static str>() {
            Ok(message) => (*message).to_owned(),
            Err(_) => "the request handler panicked".to_owned(),
        },
    }
}

/// Writes the action's result unless something already closed the response.
fn finish(ctx: &HttpContext, result: Option<ActionResult>) -> Result<(), Error> {
    if ctx.closed() {
        return Ok(());
    }
    let status = ctx.status().unwrap_or(StatusCode::OK);
    match result.unwrap_or(ActionResult::Empty) {
        ActionResult::Empty => ctx.send_json(status, &serde_json::json!({}))?,
        ActionResult::Text(text) => ctx.send_text(status, text),
        ActionResult::Json(value) => ctx.send_json(status, &value)?,
    }
    Ok(())
}
