//! Action descriptors, the typed invocation handle, and the action registry.
//!
//! # How actions are stored
//!
//! Actions of different controllers have different receiver types, but the
//! registry holds them in one list. Each action function is wrapped once at
//! registration in a [`FnAction`] and stored behind `Arc<dyn ErasedAction>`:
//!
//! ```text
//! async fn get(self: Arc<Users>, args: ActionArgs) -> Result<R, Error>
//!        ↓ registry.action("get", descriptor, &params, Users::get)
//! Arc::new(FnAction::<Users, _>::new(Users::get))   ← BoxedAction
//!        ↓ per request
//! action.bind(&instance)?                            ← receiver type checked
//!        ↓
//! bound.invoke(args).await                           ← one vtable dispatch
//! ```
//!
//! A controller instance of the wrong type is reported as
//! [`Error::ActionMethodNotFound`] instead of panicking.

use std::any::{TypeId, type_name};
use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

use crate::binder::{ActionArgs, ParamType};
use crate::controller::Controller;
use crate::error::Error;
use crate::filter::{Filter, FilterRef};
use crate::injector::Instance;
use crate::method::Method;
use crate::response::{ActionResult, IntoActionResult};

use super::controller::{ControllerInstance, short_type_name};
use super::url::ActionUrl;

// ── Descriptor ────────────────────────────────────────────────────────────────

/// Verb, route suffix, query template, body flag and filters of one action.
#[derive(Clone, Debug, Default)]
pub struct ActionDescriptor {
    method: Option<Method>,
    route: Option<String>,
    query: Option<String>,
    from_body: bool,
    filters: Vec<FilterRef>,
}

impl ActionDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }

    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Passes the parsed request body as the first argument.
    pub fn from_body(mut self) -> Self {
        self.from_body = true;
        self
    }

    /// Appends an action-level filter.
    pub fn filter<F: Filter>(mut self) -> Self {
        self.filters.push(FilterRef::of::<F>());
        self
    }

    pub fn filters(mut self, filters: impl IntoIterator<Item = FilterRef>) -> Self {
        self.filters.extend(filters);
        self
    }

    /// The declared verb. Unset until registration applies the naming
    /// convention.
    pub fn declared_method(&self) -> Option<Method> { self.method }
    pub fn route_template(&self) -> &str { self.route.as_deref().unwrap_or("") }
    pub fn query_template(&self) -> &str { self.query.as_deref().unwrap_or("") }
    pub fn is_from_body(&self) -> bool { self.from_body }
    pub fn filter_refs(&self) -> &[FilterRef] { &self.filters }
}

// ── Type-erased invocation ────────────────────────────────────────────────────

/// A heap-allocated, type-erased action future.
pub type ActionFuture = Pin<Box<dyn Future<Output = Result<ActionResult, Error>> + Send + 'static>>;

/// Internal dispatch interface over an action function.
#[doc(hidden)]
pub trait ErasedAction: Send + Sync {
    /// The controller type the action expects as its receiver.
    fn receiver(&self) -> TypeId;
    fn call(&self, controller: Instance, args: ActionArgs) -> ActionFuture;
}

#[doc(hidden)]
pub type BoxedAction = Arc<dyn ErasedAction>;

/// Bridges a typed `Fn(Arc<C>, ActionArgs) -> Future` into [`ErasedAction`].
struct FnAction<C, F> {
    f: F,
    _receiver: PhantomData<fn(Arc<C>)>,
}

impl<C, F> FnAction<C, F> {
    fn new(f: F) -> Self {
        Self { f, _receiver: PhantomData }
    }
}

impl<C, F, Fut, R> ErasedAction for FnAction<C, F>
where
    C: Controller,
    F: Fn(Arc<C>, ActionArgs) -> Fut + Send + Sync,
    Fut: Future<Output = Result<R, Error>> + Send + 'static,
    R: IntoActionResult + Send + 'static,
{
    fn receiver(&self) -> TypeId {
        TypeId::of::<C>()
    }

    fn call(&self, controller: Instance, args: ActionArgs) -> ActionFuture {
        let Ok(controller) = controller.downcast::<C>() else {
            let err = Error::ActionMethodNotFound {
                controller: short_type_name::<C>().to_owned(),
                action: "<unbound>".to_owned(),
            };
            return Box::pin(async move { Err(err) });
        };
        let fut = (self.f)(controller, args);
        Box::pin(async move { fut.await?.into_action_result() })
    }
}

/// An action checked against a concrete controller instance, ready to run.
pub struct BoundAction {
    action: BoxedAction,
    controller: Instance,
}

impl BoundAction {
    pub fn invoke(&self, args: ActionArgs) -> ActionFuture {
        self.action.call(Arc::clone(&self.controller), args)
    }
}

// ── ActionType ────────────────────────────────────────────────────────────────

/// One registered action: owner, method name, descriptor, declared
/// parameter types, return type and parsed URL.
pub struct ActionType {
    controller_name: &'static str,
    controller_id: TypeId,
    method_name: String,
    method: Method,
    descriptor: ActionDescriptor,
    parameters: Vec<ParamType>,
    return_type: &'static str,
    url: ActionUrl,
    handler: BoxedAction,
}

impl ActionType {
    /// Builds the action, applying the verb naming convention and parsing
    /// the route and query templates against `parameters`.
    pub fn new<C, F, Fut, R>(
        method_name: &str,
        descriptor: ActionDescriptor,
        parameters: &[ParamType],
        handler: F,
    ) -> Result<Self, Error>
    where
        C: Controller,
        F: Fn(Arc<C>, ActionArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, Error>> + Send + 'static,
        R: IntoActionResult + Send + 'static,
    {
        let method = descriptor.declared_method().unwrap_or_else(|| Method::by_convention(method_name));
        let url = ActionUrl::parse(descriptor.route.as_deref(), descriptor.query.as_deref(), Some(parameters))?;
        Ok(Self {
            controller_name: short_type_name::<C>(),
            controller_id: TypeId::of::<C>(),
            method_name: method_name.to_owned(),
            method,
            descriptor,
            parameters: parameters.to_vec(),
            return_type: type_name::<R>(),
            url,
            handler: Arc::new(FnAction::<C, F>::new(handler)),
        })
    }

    pub fn controller_name(&self) -> &'static str { self.controller_name }
    pub fn controller_type_id(&self) -> TypeId { self.controller_id }
    pub fn method_name(&self) -> &str { &self.method_name }
    pub fn method(&self) -> Method { self.method }
    pub fn descriptor(&self) -> &ActionDescriptor { &self.descriptor }
    pub fn parameters(&self) -> &[ParamType] { &self.parameters }
    pub fn return_type(&self) -> &'static str { self.return_type }
    pub fn url(&self) -> &ActionUrl { &self.url }

    /// Checks that `instance` is the controller this action belongs to.
    pub fn bind(&self, instance: &ControllerInstance) -> Result<BoundAction, Error> {
        if (*instance.any).type_id() != self.handler.receiver() {
            return Err(Error::ActionMethodNotFound {
                controller: self.controller_name.to_owned(),
                action: self.method_name.clone(),
            });
        }
        Ok(BoundAction { action: Arc::clone(&self.handler), controller: Arc::clone(&instance.any) })
    }
}

// ── Collection ────────────────────────────────────────────────────────────────

/// Registered actions in registration order, indexed by
/// `(controller name, action name)`.
#[derive(Default)]
pub struct ActionTypeCollection {
    actions: Vec<Arc<ActionType>>,
    index: HashMap<(String, String), usize>,
}

impl ActionTypeCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails with [`Error::DuplicateAction`] when the pair is already
    /// registered; the collection is left unchanged.
    pub fn register(&mut self, action: ActionType) -> Result<Arc<ActionType>, Error> {
        let key = (action.controller_name.to_owned(), action.method_name.clone());
        if self.index.contains_key(&key) {
            return Err(Error::DuplicateAction { controller: key.0, action: key.1 });
        }
        let action = Arc::new(action);
        self.index.insert(key, self.actions.len());
        self.actions.push(Arc::clone(&action));
        Ok(action)
    }

    pub fn get(&self, controller: &str, action: &str) -> Result<&Arc<ActionType>, Error> {
        self.index
            .get(&(controller.to_owned(), action.to_owned()))
            .map(|&i| &self.actions[i])
            .ok_or_else(|| Error::ActionNotFound {
                controller: controller.to_owned(),
                action: action.to_owned(),
            })
    }

    pub fn contains(&self, controller: &str, action: &str) -> bool {
        self.index.contains_key(&(controller.to_owned(), action.to_owned()))
    }

    /// Every action of `controller`, in registration order.
    pub fn get_for_controller<'a>(&'a self, controller: &'a str) -> impl Iterator<Item = &'a Arc<ActionType>> + 'a {
        self.actions.iter().filter(move |a| a.controller_name == controller)
    }

    pub fn actions(&self) -> impl Iterator<Item = &Arc<ActionType>> {
        self.actions.iter()
    }

    pub fn len(&self) -> usize { self.actions.len() }
    pub fn is_empty(&self) -> bool { self.actions.is_empty() }
}
