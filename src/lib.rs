//! # keel
//!
//! Controller-and-action routing for Rust HTTP services.
//!
//! Controllers are plain structs registered with a route prefix. Actions are
//! async functions registered against a controller with an optional verb,
//! route and query template. keel mounts one route per action and runs each
//! request through the same pipeline: resolve the controller and its filters
//! from a per-request scope, bind arguments from the path, query and body,
//! call the action and write whatever it returns.
//!
//! ## The pipeline
//!
//! - **Filters** run before the action (global → controller → action) and
//!   after it in reverse. Any filter may finalise the response and stop the
//!   rest of the chain.
//! - **Arguments** are converted from strings to the declared
//!   [`ParamType`]s. `fromBody` actions get the parsed JSON body first.
//! - **Errors** anywhere become a `500` carrying the error message, after
//!   the filters' `on_error` hooks have had a look.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use keel::{
//!     ActionArgs, ActionDescriptor, Controller, ControllerBase, ControllerDescriptor,
//!     HostBuilder, Json, ParamType, Registry, Resolver,
//! };
//!
//! struct UsersController { base: ControllerBase }
//!
//! impl Controller for UsersController {
//!     fn base(&self) -> &ControllerBase { &self.base }
//! }
//!
//! async fn get(_c: Arc<UsersController>, args: ActionArgs) -> Result<Json<serde_json::Value>, keel::Error> {
//!     Ok(Json(serde_json::json!({ "id": args.number(0)? })))
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), keel::Error> {
//!     let mut registry = Registry::new();
//!     registry
//!         .controller::<UsersController>(ControllerDescriptor::new("users"))?
//!         .action("get", ActionDescriptor::new().route(":id"), &[ParamType::Number], get)?;
//!
//!     HostBuilder::new()
//!         .use_dependency_injection(|container| {
//!             container.register_scoped(|_: &dyn Resolver| Ok(UsersController { base: ControllerBase::new() }));
//!         })
//!         .build(registry)
//!         .serve("0.0.0.0:3000")
//!         .await
//! }
//! ```

mod binder;
mod context;
mod controller;
mod dispatcher;
mod error;
mod filter;
mod handler;
mod host;
mod injector;
mod method;
mod request;
mod response;
mod router;
mod server;

pub mod config;
pub mod logging;
pub mod metadata;
pub mod middleware;

pub use binder::{ActionArgs, ParamType, ParamValue, convert};
pub use config::ConfigurationBuilder;
pub use context::HttpContext;
pub use controller::{Controller, ControllerBase};
pub use dispatcher::{ApiRouter, ErrorHookOrder, REQUEST_SCOPE};
pub use error::Error;
pub use filter::{Filter, FilterRef};
pub use handler::Handler;
pub use host::{ApiServer, HostBuilder};
pub use http::StatusCode;
pub use injector::{Container, Injector, Instance, Lifetime, Resolver};
pub use metadata::{
    ActionDescriptor, ActionType, ControllerDescriptor, ControllerType, Registry, RoutingContext,
};
pub use method::Method;
pub use request::Request;
pub use response::{ActionResult, ContentType, IntoActionResult, Json, Response};
pub use router::Router;
pub use server::Server;
