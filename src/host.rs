//! Application bootstrap.
//!
//! [`HostBuilder`] collects the configuration, logging and dependency
//! callbacks, runs them once in that order and hands back an [`ApiServer`]
//! ready to serve the registered controllers.
//!
//! ```rust,no_run
//! use keel::{HostBuilder, Registry};
//!
//! # async fn run() -> Result<(), keel::Error> {
//! let server = HostBuilder::new()
//!     .use_configuration(|config| {
//!         config.add_environment_variables("APP_");
//!     })
//!     .use_logging(|_| {
//!         keel::logging::init("keel=debug");
//!     })
//!     .build(Registry::new());
//!
//! server.serve("0.0.0.0:3000").await
//! # }
//! ```

use std::sync::Arc;

use tracing::info;

use crate::config::ConfigurationBuilder;
use crate::dispatcher::ApiRouter;
use crate::error::Error;
use crate::injector::Container;
use crate::metadata::Registry;
use crate::router::Router;
use crate::server::Server;

type ConfigurationMethod = Box<dyn FnOnce(&mut ConfigurationBuilder)>;
type LoggingMethod = Box<dyn FnOnce(&ConfigurationBuilder)>;
type DependencyInjectionMethod = Box<dyn FnOnce(&mut Container)>;

#[derive(Default)]
pub struct HostBuilder {
    configuration: Option<ConfigurationMethod>,
    logging: Option<LoggingMethod>,
    dependency_injection: Option<DependencyInjectionMethod>,
}

impl HostBuilder {
    pub fn new() -> Self { Self::default() }

    pub fn use_configuration(mut self, f: impl FnOnce(&mut ConfigurationBuilder) + 'static) -> Self {
        self.configuration = Some(Box::new(f));
        self
    }

    /// Runs after configuration so log settings can come from it.
    pub fn use_logging(mut self, f: impl FnOnce(&ConfigurationBuilder) + 'static) -> Self {
        self.logging = Some(Box::new(f));
        self
    }

    pub fn use_dependency_injection(mut self, f: impl FnOnce(&mut Container) + 'static) -> Self {
        self.dependency_injection = Some(Box::new(f));
        self
    }

    /// The configuration builder is registered in the container as a
    /// singleton, so controllers and filters can resolve it.
    pub fn build(self, registry: Registry) -> ApiServer {
        let mut configuration = ConfigurationBuilder::new();
        if let Some(f) = self.configuration {
            f(&mut configuration);
        }
        if let Some(f) = self.logging {
            f(&configuration);
        }

        let mut container = Container::new();
        if let Some(f) = self.dependency_injection {
            f(&mut container);
        }

        let configuration = Arc::new(configuration);
        container.register_instance(Arc::clone(&configuration));
        let container = Arc::new(container);

        let routing = ApiRouter::new(registry.freeze(), container.clone());
        ApiServer { configuration, container, routing, router: Router::new() }
    }
}

/// A configured application: registry, container and routing.
pub struct ApiServer {
    configuration: Arc<ConfigurationBuilder>,
    container: Arc<Container>,
    routing: ApiRouter,
    router: Router,
}

impl ApiServer {
    pub fn configuration(&self) -> &ConfigurationBuilder { &self.configuration }
    pub fn container(&self) -> &Arc<Container> { &self.container }
    pub fn routing(&self) -> &ApiRouter { &self.routing }

    /// Global filters, the ignore-closed flag and error hook order are set
    /// here, before the routes are mounted.
    pub fn routing_mut(&mut self) -> &mut ApiRouter { &mut self.routing }

    /// Adjusts the underlying [`Router`] before controller routes are
    /// mounted on it, e.g. to add middleware or plain handlers.
    pub fn configure_application(mut self, f: impl FnOnce(Router) -> Router) -> Self {
        self.router = f(self.router);
        self
    }

    /// Mounts every registered action and returns the finished router.
    pub fn into_router(self) -> Router {
        Arc::new(self.routing).register_routes(self.router)
    }

    pub async fn serve(self, addr: &str) -> Result<(), Error> {
        let server = Server::bind(addr)?;
        let router = self.into_router();
        info!(routes = router.routes().count(), "routes mounted");
        server.serve(router).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Controller, ControllerBase, ControllerDescriptor, Method, Request, Resolver};
    use crate::injector::Injector;
    use http::StatusCode;

    struct Greeting(&'static str);

    struct HelloController {
        base: ControllerBase,
        greeting: Arc<Greeting>,
    }

    impl Controller for HelloController {
        fn base(&self) -> &ControllerBase { &self.base }
    }

    #[tokio::test]
    async fn builds_a_server_whose_routes_resolve_dependencies() {
        let mut registry = Registry::new();
        registry
            .controller::<HelloController>(ControllerDescriptor::new("hello"))
            .unwrap()
            .action("get", Default::default(), &[], |c: Arc<HelloController>, _| async move {
                Ok(c.greeting.0)
            })
            .unwrap();

        let server = HostBuilder::new()
            .use_dependency_injection(|container| {
                container.register_singleton(|_| Ok(Greeting("hi")));
                container.register_transient(|r: &dyn Resolver| {
                    Ok(HelloController { base: ControllerBase::new(), greeting: r.resolve::<Greeting>()? })
                });
            })
            .build(registry);

        let scope = server.container().create_scope("request");
        assert!(scope.resolve::<ConfigurationBuilder>().is_ok());

        let app = server.into_router();
        let res = app.handle(Request::new(Method::Get, "/hello")).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.body_text(), "hi");
    }
}
