//! Minimal keel example: one controller, one filter, JSON in and out.
//!
//! Run with:
//!   RUST_LOG=keel=debug cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/users/42
//!   curl 'http://localhost:3000/users?active=yes'
//!   curl -X POST http://localhost:3000/users \
//!        -H 'x-api-key: secret' \
//!        -d '{"name":"alice"}'
//!   curl -X DELETE http://localhost:3000/users/42

use std::sync::Arc;

use async_trait::async_trait;
use keel::{
    ActionArgs, ActionDescriptor, Controller, ControllerBase, ControllerDescriptor, Error, Filter,
    HostBuilder, HttpContext, Json, ParamType, Registry, Resolver, RoutingContext, StatusCode,
};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct User {
    id: f64,
    name: String,
}

#[derive(Deserialize)]
struct CreateUser {
    name: String,
}

struct UsersController {
    base: ControllerBase,
}

impl Controller for UsersController {
    fn base(&self) -> &ControllerBase { &self.base }
}

// GET /users/:id
async fn get(_: Arc<UsersController>, args: ActionArgs) -> Result<Json<User>, Error> {
    Ok(Json(User { id: args.number(0)?, name: "alice".into() }))
}

// GET /users?active=…
async fn get_all(_: Arc<UsersController>, args: ActionArgs) -> Result<Json<Vec<User>>, Error> {
    let users = if args.boolean(0)? { vec![User { id: 1.0, name: "alice".into() }] } else { Vec::new() };
    Ok(Json(users))
}

// POST /users, behind ApiKey
async fn post(users: Arc<UsersController>, args: ActionArgs) -> Result<Json<User>, Error> {
    let input: CreateUser = args.body(0)?;
    if let Some(ctx) = users.http_context() {
        ctx.set_status(StatusCode::CREATED);
        ctx.set_header("location", "/users/99");
    }
    Ok(Json(User { id: 99.0, name: input.name }))
}

// DELETE /users/:id always fails; the pipeline answers 500.
async fn delete(_: Arc<UsersController>, args: ActionArgs) -> Result<(), Error> {
    Err(Error::action(format!("user {} cannot be deleted", args.number(0)?)))
}

struct ApiKey;

#[async_trait]
impl Filter for ApiKey {
    async fn before_execute(&self, ctx: &HttpContext, _: &RoutingContext) -> Result<(), Error> {
        if ctx.request().header("x-api-key") != Some("secret") {
            ctx.send_text(StatusCode::UNAUTHORIZED, "missing api key");
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let mut registry = Registry::new();
    registry
        .controller::<UsersController>(ControllerDescriptor::new("users"))?
        .action("get", ActionDescriptor::new().route(":id"), &[ParamType::Number], get)?
        .action("getAll", ActionDescriptor::new().query(":active"), &[ParamType::Boolean], get_all)?
        .action("post", ActionDescriptor::new().from_body().filter::<ApiKey>(), &[], post)?
        .action("delete", ActionDescriptor::new().route(":id"), &[ParamType::Number], delete)?;

    HostBuilder::new()
        .use_logging(|_| {
            keel::logging::init("keel=info");
        })
        .use_dependency_injection(|container| {
            container.register_singleton(|_: &dyn Resolver| Ok(ApiKey));
            container.register_scoped(|_: &dyn Resolver| Ok(UsersController { base: ControllerBase::new() }));
        })
        .build(registry)
        .serve("0.0.0.0:3000")
        .await
}
