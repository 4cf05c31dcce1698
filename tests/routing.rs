use std::sync::Arc;

use keel::{
    ActionArgs, ActionDescriptor, ApiRouter, Container, Controller, ControllerBase, ControllerDescriptor,
    Error, HttpContext, Method, ParamType, ParamValue, Registry, Request, Resolver, Router, StatusCode,
};
use serde_json::{Value, json};

#[derive(Default)]
struct Root {
    base: ControllerBase,
}

impl Controller for Root {
    fn base(&self) -> &ControllerBase { &self.base }
}

#[derive(Default)]
struct Reports {
    base: ControllerBase,
}

impl Controller for Reports {
    fn base(&self) -> &ControllerBase { &self.base }
}

async fn ping(_: Arc<Root>, _: ActionArgs) -> Result<&'static str, Error> {
    Ok("pong")
}

async fn values(_: Arc<Reports>, args: ActionArgs) -> Result<Value, Error> {
    let rendered: Vec<Value> = args
        .values()
        .iter()
        .map(|value| match value {
            ParamValue::Number(n) => json!(n),
            ParamValue::Boolean(b) => json!(b),
            ParamValue::Date(d) => json!(d.map(|d| d.date_naive().to_string())),
            ParamValue::Text(t) => json!(t),
            ParamValue::Body(v) => v.clone(),
        })
        .collect();
    Ok(Value::Array(rendered))
}

fn api() -> Arc<ApiRouter> {
    let mut registry = Registry::new();
    registry
        .controller::<Root>(ControllerDescriptor::default())
        .unwrap()
        .action("ping", ActionDescriptor::new().method(Method::Get).route("ping"), &[], ping)
        .unwrap()
        .controller::<Reports>(ControllerDescriptor::new("/reports/").scope("reporting"))
        .unwrap()
        .action(
            "values",
            ActionDescriptor::new().method(Method::Get).route("/:a/:b").query(":c&:d"),
            &[ParamType::Number, ParamType::Text, ParamType::Boolean, ParamType::Date],
            values,
        )
        .unwrap();

    let mut container = Container::new();
    container.register_scoped(|_: &dyn Resolver| Ok(Root::default()));
    container.register_scoped(|_: &dyn Resolver| Ok(Reports::default()));

    Arc::new(ApiRouter::new(registry.freeze(), Arc::new(container)))
}

#[tokio::test]
async fn empty_controller_route_mounts_at_the_root() {
    let app = api().register_routes(Router::new());
    let routes: Vec<_> = app.routes().collect();
    assert_eq!(routes, [(Method::Get, "/ping"), (Method::Get, "/reports/{a}/{b}")]);

    let res = app.handle(Request::new(Method::Get, "/ping")).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.header("content-type"), Some("text/plain; charset=utf-8"));
    assert_eq!(res.body_text(), "pong");
}

#[tokio::test]
async fn path_then_query_values_arrive_in_declared_order() {
    let app = api().register_routes(Router::new());
    let res = app
        .handle(Request::new(Method::Get, "/reports/7/north?d=2023-06-01&c=YES"))
        .await;

    let body: Value = serde_json::from_slice(res.body()).unwrap();
    assert_eq!(body, json!([7.0, "north", true, "2023-06-01"]));
}

#[tokio::test]
async fn dispatch_writes_into_the_given_context() {
    let api = api();
    let routing = api
        .registry()
        .routing_contexts()
        .into_iter()
        .find(|r| r.to_string() == "Root.ping")
        .unwrap();
    assert_eq!(routing.route(), "/ping");

    let ctx = Arc::new(HttpContext::new(Request::new(Method::Get, "/ping")));
    api.dispatch(Arc::clone(&ctx), &routing).await;

    assert!(ctx.closed());
    assert_eq!(ctx.to_response().body_text(), "pong");
}

#[tokio::test]
async fn dispatch_leaves_a_closed_context_alone() {
    let api = api();
    let routing = api.registry().routing_contexts().remove(0);

    let ctx = Arc::new(HttpContext::new(Request::new(Method::Get, "/ping")));
    ctx.send_text(StatusCode::GONE, "gone");
    api.dispatch(Arc::clone(&ctx), &routing).await;

    let res = ctx.to_response();
    assert_eq!(res.status(), StatusCode::GONE);
    assert_eq!(res.body_text(), "gone");
}

#[tokio::test]
async fn unregistered_controller_dependency_is_a_500() {
    let mut registry = Registry::new();
    registry
        .controller::<Root>(ControllerDescriptor::default())
        .unwrap()
        .action("ping", ActionDescriptor::new().method(Method::Get).route("ping"), &[], ping)
        .unwrap();
    let api = Arc::new(ApiRouter::new(registry.freeze(), Arc::new(Container::new())));
    let app = api.register_routes(Router::new());

    let res = app.handle(Request::new(Method::Get, "/ping")).await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(res.body_text().starts_with("The controller 'Root' could not be instantiated"));
}
