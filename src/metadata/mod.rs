//! Controller and action metadata.
//!
//! Populated once during bootstrap through [`Registry`], then frozen behind
//! an `Arc` and only read while serving. Registering after the server has
//! started is not supported.

mod action;
mod controller;
mod routing_context;
mod url;

use std::future::Future;
use std::sync::Arc;

use tracing::debug;

pub use action::{ActionDescriptor, ActionFuture, ActionType, ActionTypeCollection, BoundAction};
#[doc(hidden)]
pub use action::{BoxedAction, ErasedAction};
pub use controller::{ControllerDescriptor, ControllerInstance, ControllerType, ControllerTypeCollection};
pub use routing_context::RoutingContext;
pub use url::{ActionUrl, ParameterSource, RouteParameter, UrlToken, merge_route, normalize_prefix};
pub(crate) use url::to_router_path;

use crate::binder::{ActionArgs, ParamType};
use crate::controller::Controller;
use crate::error::Error;
use crate::response::IntoActionResult;

/// Controllers and actions known to the application.
///
/// ```rust
/// use std::sync::Arc;
/// use keel::{ActionArgs, ActionDescriptor, Controller, ControllerBase, ControllerDescriptor, Error, ParamType, Registry};
///
/// #[derive(Default)]
/// struct Users { base: ControllerBase }
///
/// impl Controller for Users {
///     fn base(&self) -> &ControllerBase { &self.base }
/// }
///
/// impl Users {
///     async fn get(self: Arc<Self>, args: ActionArgs) -> Result<String, Error> {
///         Ok(format!("user {}", args.number(0)?))
///     }
/// }
///
/// let mut registry = Registry::new();
/// registry
///     .controller::<Users>(ControllerDescriptor::new("users"))?
///     .action("get", ActionDescriptor::new().route(":id"), &[ParamType::Number], Users::get)?;
///
/// assert!(registry.actions().contains("Users", "get"));
/// # Ok::<(), Error>(())
/// ```
#[derive(Default)]
pub struct Registry {
    controllers: ControllerTypeCollection,
    actions: ActionTypeCollection,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers controller `C`. Fails if `C` is already registered.
    pub fn controller<C: Controller>(&mut self, descriptor: ControllerDescriptor) -> Result<&mut Self, Error> {
        let controller = self.controllers.register(ControllerType::of::<C>(descriptor))?;
        debug!(controller = controller.name(), route = %controller.descriptor().route(), "controller registered");
        Ok(self)
    }

    /// Registers action `name` of controller `C`. `parameters` declares,
    /// in order, the types of the route then query placeholders. Fails if
    /// `C.name` is already registered.
    pub fn action<C, F, Fut, R>(
        &mut self,
        name: &str,
        descriptor: ActionDescriptor,
        parameters: &[ParamType],
        handler: F,
    ) -> Result<&mut Self, Error>
    where
        C: Controller,
        F: Fn(Arc<C>, ActionArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, Error>> + Send + 'static,
        R: IntoActionResult + Send + 'static,
    {
        let action = self.actions.register(ActionType::new(name, descriptor, parameters, handler)?)?;
        debug!(
            controller = action.controller_name(),
            action = action.method_name(),
            method = %action.method(),
            "action registered"
        );
        Ok(self)
    }

    pub fn controllers(&self) -> &ControllerTypeCollection { &self.controllers }
    pub fn actions(&self) -> &ActionTypeCollection { &self.actions }

    /// Every `(controller, action)` pair, controllers in registration order.
    /// Actions registered for a controller that never was are skipped.
    pub fn routing_contexts(&self) -> Vec<RoutingContext> {
        self.controllers
            .controllers()
            .flat_map(|controller| {
                self.actions
                    .get_for_controller(controller.name())
                    .map(move |action| RoutingContext::new(Arc::clone(controller), Arc::clone(action)))
            })
            .collect()
    }

    /// Ends registration.
    pub fn freeze(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::ControllerBase;

    #[derive(Default)]
    struct Books {
        base: ControllerBase,
    }

    impl Controller for Books {
        fn base(&self) -> &ControllerBase { &self.base }
    }

    impl Books {
        async fn list(self: Arc<Self>, _args: ActionArgs) -> Result<(), Error> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct Orphan {
        base: ControllerBase,
    }

    impl Controller for Orphan {
        fn base(&self) -> &ControllerBase { &self.base }
    }

    impl Orphan {
        async fn get(self: Arc<Self>, _args: ActionArgs) -> Result<(), Error> {
            Ok(())
        }
    }

    #[test]
    fn duplicate_action_leaves_registry_unchanged() {
        let mut registry = Registry::new();
        registry.controller::<Books>(ControllerDescriptor::new("books")).unwrap();
        registry.action("list", ActionDescriptor::new(), &[], Books::list).unwrap();

        let err = registry.action("list", ActionDescriptor::new().route("again"), &[], Books::list).err().unwrap();
        assert!(matches!(err, Error::DuplicateAction { .. }));
        assert_eq!(registry.actions().len(), 1);
    }

    #[test]
    fn routing_contexts_skip_actions_without_controller() {
        let mut registry = Registry::new();
        registry.action("get", ActionDescriptor::new(), &[], Orphan::get).unwrap();
        registry.controller::<Books>(ControllerDescriptor::new("books/")).unwrap();
        registry.action("list", ActionDescriptor::new().route("all"), &[], Books::list).unwrap();

        let contexts = registry.routing_contexts();
        assert_eq!(contexts.len(), 1);
        assert_eq!(contexts[0].to_string(), "Books.list");
        assert_eq!(contexts[0].route(), "books/all");
    }
}
