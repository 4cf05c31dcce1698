//! Controller descriptors and their registry.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::sync::Arc;

use crate::controller::Controller;
use crate::error::Error;
use crate::filter::{Filter, FilterRef};
use crate::injector::{Instance, Resolver};

use super::url::normalize_prefix;

/// Route prefix, filters and scope tag of one controller.
#[derive(Clone, Debug, Default)]
pub struct ControllerDescriptor {
    route: Option<String>,
    scope: Option<String>,
    filters: Vec<FilterRef>,
}

impl ControllerDescriptor {
    /// A descriptor rooted at `route`. Pass `""` to mount at the root.
    pub fn new(route: impl Into<String>) -> Self {
        Self { route: Some(route.into()), ..Self::default() }
    }

    /// Appends a controller-level filter.
    pub fn filter<F: Filter>(mut self) -> Self {
        self.filters.push(FilterRef::of::<F>());
        self
    }

    pub fn filters(mut self, filters: impl IntoIterator<Item = FilterRef>) -> Self {
        self.filters.extend(filters);
        self
    }

    /// Names the resolution scope opened for this controller's requests.
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// The prefix with any trailing `/` removed.
    pub fn route(&self) -> String {
        normalize_prefix(self.route.as_deref())
    }

    pub fn scope_name(&self) -> Option<&str> { self.scope.as_deref() }
    pub fn filter_refs(&self) -> &[FilterRef] { &self.filters }
}

/// A controller instance resolved for one request, seen both as a
/// [`Controller`] and as the concrete type the actions expect.
#[derive(Clone)]
pub struct ControllerInstance {
    pub(crate) controller: Arc<dyn Controller>,
    pub(crate) any: Instance,
}

impl ControllerInstance {
    pub fn controller(&self) -> &Arc<dyn Controller> { &self.controller }
}

type Instantiate = fn(&dyn Resolver) -> Result<ControllerInstance, Error>;

/// A registered controller type.
pub struct ControllerType {
    name: &'static str,
    id: TypeId,
    descriptor: ControllerDescriptor,
    instantiate: Instantiate,
}

impl ControllerType {
    pub fn of<C: Controller>(descriptor: ControllerDescriptor) -> Self {
        Self {
            name: short_type_name::<C>(),
            id: TypeId::of::<C>(),
            descriptor,
            instantiate: instantiate::<C>,
        }
    }

    pub fn name(&self) -> &'static str { self.name }
    pub fn type_id(&self) -> TypeId { self.id }
    pub fn descriptor(&self) -> &ControllerDescriptor { &self.descriptor }

    /// Resolves a fresh instance from `resolver`.
    pub fn instantiate(&self, resolver: &dyn Resolver) -> Result<ControllerInstance, Error> {
        (self.instantiate)(resolver).map_err(|e| match e {
            e @ Error::ControllerInstantiation { .. } => e,
            other => Error::ControllerInstantiation {
                controller: self.name.to_owned(),
                reason: other.to_string(),
            },
        })
    }
}

fn instantiate<C: Controller>(resolver: &dyn Resolver) -> Result<ControllerInstance, Error> {
    let concrete: Arc<C> = resolver.resolve::<C>()?;
    let any: Instance = concrete.clone();
    Ok(ControllerInstance { controller: concrete, any })
}

/// `my_app::controllers::UsersController` → `UsersController`.
pub(crate) fn short_type_name<T: Any + ?Sized>() -> &'static str {
    let full = type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Registered controllers, in registration order, indexed by name.
#[derive(Default)]
pub struct ControllerTypeCollection {
    types: Vec<Arc<ControllerType>>,
    index: HashMap<String, usize>,
}

impl ControllerTypeCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails with [`Error::DuplicateController`] when a controller with the
    /// same name is already registered; the collection is left unchanged.
    pub fn register(&mut self, controller: ControllerType) -> Result<Arc<ControllerType>, Error> {
        if self.index.contains_key(controller.name) {
            return Err(Error::DuplicateController(controller.name.to_owned()));
        }
        let controller = Arc::new(controller);
        self.index.insert(controller.name.to_owned(), self.types.len());
        self.types.push(Arc::clone(&controller));
        Ok(controller)
    }

    pub fn get(&self, name: &str) -> Result<&Arc<ControllerType>, Error> {
        self.index
            .get(name)
            .map(|&i| &self.types[i])
            .ok_or_else(|| Error::ControllerNotFound(name.to_owned()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn controllers(&self) -> impl Iterator<Item = &Arc<ControllerType>> {
        self.types.iter()
    }

    pub fn len(&self) -> usize { self.types.len() }
    pub fn is_empty(&self) -> bool { self.types.is_empty() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::ControllerBase;
    use crate::injector::{Container, Injector};

    #[derive(Default)]
    struct UsersController {
        base: ControllerBase,
    }

    impl Controller for UsersController {
        fn base(&self) -> &ControllerBase { &self.base }
    }

    #[test]
    fn short_name_drops_module_path() {
        assert_eq!(short_type_name::<UsersController>(), "UsersController");
    }

    #[test]
    fn duplicate_controller_is_rejected_and_collection_unchanged() {
        let mut collection = ControllerTypeCollection::new();
        collection.register(ControllerType::of::<UsersController>(ControllerDescriptor::new("users"))).unwrap();

        let err = collection
            .register(ControllerType::of::<UsersController>(ControllerDescriptor::new("other")))
            .err()
            .unwrap();
        assert!(matches!(err, Error::DuplicateController(ref name) if name == "UsersController"));
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.get("UsersController").unwrap().descriptor().route(), "users");
    }

    #[test]
    fn missing_controller_is_not_found() {
        let collection = ControllerTypeCollection::new();
        assert!(!collection.contains("Nope"));
        assert!(matches!(collection.get("Nope"), Err(Error::ControllerNotFound(_))));
    }

    #[test]
    fn instantiation_failure_names_the_controller() {
        let controller = ControllerType::of::<UsersController>(ControllerDescriptor::new("users"));
        let scope = Container::new().create_scope("request");
        let err = controller.instantiate(scope.as_ref()).err().unwrap();
        assert!(matches!(err, Error::ControllerInstantiation { ref controller, .. } if controller == "UsersController"));
    }

    #[test]
    fn instantiates_from_scope() {
        let controller = ControllerType::of::<UsersController>(ControllerDescriptor::new("users/"));
        let mut container = Container::new();
        container.register_scoped(|_| Ok(UsersController::default()));
        let scope = container.create_scope("request");
        let instance = controller.instantiate(scope.as_ref()).unwrap();
        assert!(instance.any.is::<UsersController>());
        assert_eq!(controller.descriptor().route(), "users");
    }
}
