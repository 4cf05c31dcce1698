//! Dependency resolution.
//!
//! The dispatcher only needs two capabilities from a DI strategy: open a
//! scope for one request ([`Injector::create_scope`]) and resolve a type
//! inside it ([`Resolver::resolve_any`]). Anything that provides those can
//! drive the pipeline. [`Container`] is the default implementation.
//!
//! # Lifetimes
//!
//! | Lifetime | Instances |
//! |---|---|
//! | [`Lifetime::Singleton`] | one per container, shared by every scope |
//! | [`Lifetime::Scoped`] | one per scope, i.e. one per request |
//! | [`Lifetime::Transient`] | a new one on every resolve |
//!
//! Singletons are shared across concurrent requests. If they hold mutable
//! state, synchronising it is the implementor's job.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::trace;

use crate::error::Error;

/// A type-erased resolved instance.
pub type Instance = Arc<dyn Any + Send + Sync>;

type Factory = Arc<dyn Fn(&dyn Resolver) -> Result<Instance, Error> + Send + Sync>;

/// Opens resolution scopes.
pub trait Injector: Send + Sync {
    fn create_scope(&self, name: &str) -> Arc<dyn Resolver>;
}

/// Resolves instances by type inside one scope.
pub trait Resolver: Send + Sync {
    fn resolve_any(&self, id: TypeId, type_name: &'static str) -> Result<Instance, Error>;
}

impl dyn Resolver + '_ {
    /// Typed wrapper over [`Resolver::resolve_any`].
    pub fn resolve<T: Any + Send + Sync>(&self) -> Result<Arc<T>, Error> {
        self.resolve_any(TypeId::of::<T>(), type_name::<T>())?
            .downcast::<T>()
            .map_err(|_| Error::DependencyNotRegistered(type_name::<T>()))
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Lifetime {
    Singleton,
    Scoped,
    Transient,
}

struct Registration {
    lifetime: Lifetime,
    factory: Factory,
    singleton: Mutex<Option<Instance>>,
}

/// The default [`Injector`]: factories keyed by type, with per-type lifetimes.
///
/// ```rust
/// use keel::{Container, Injector, Resolver};
///
/// struct Clock;
/// struct Greeter { _clock: std::sync::Arc<Clock> }
///
/// let mut container = Container::new();
/// container.register_singleton(|_| Ok(Clock));
/// container.register_scoped(|r: &dyn Resolver| Ok(Greeter { _clock: r.resolve::<Clock>()? }));
///
/// let scope = container.create_scope("request");
/// assert!(scope.resolve::<Greeter>().is_ok());
/// ```
#[derive(Clone, Default)]
pub struct Container {
    registrations: Arc<HashMap<TypeId, Arc<Registration>>>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_singleton<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Any + Send + Sync,
        F: Fn(&dyn Resolver) -> Result<T, Error> + Send + Sync + 'static,
    {
        self.register(Lifetime::Singleton, factory)
    }

    pub fn register_scoped<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Any + Send + Sync,
        F: Fn(&dyn Resolver) -> Result<T, Error> + Send + Sync + 'static,
    {
        self.register(Lifetime::Scoped, factory)
    }

    pub fn register_transient<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Any + Send + Sync,
        F: Fn(&dyn Resolver) -> Result<T, Error> + Send + Sync + 'static,
    {
        self.register(Lifetime::Transient, factory)
    }

    /// Registers an already-built singleton.
    pub fn register_instance<T: Any + Send + Sync>(&mut self, instance: Arc<T>) -> &mut Self {
        let registration = Registration {
            lifetime: Lifetime::Singleton,
            factory: Arc::new(|_: &dyn Resolver| -> Result<Instance, Error> {
                Err(Error::DependencyNotRegistered(type_name::<T>()))
            }),
            singleton: Mutex::new(Some(instance as Instance)),
        };
        Arc::make_mut(&mut self.registrations).insert(TypeId::of::<T>(), Arc::new(registration));
        self
    }

    /// Registering the same type again replaces the earlier registration.
    pub fn register<T, F>(&mut self, lifetime: Lifetime, factory: F) -> &mut Self
    where
        T: Any + Send + Sync,
        F: Fn(&dyn Resolver) -> Result<T, Error> + Send + Sync + 'static,
    {
        let factory: Factory = Arc::new(move |r: &dyn Resolver| -> Result<Instance, Error> {
            let instance: Instance = Arc::new(factory(r)?);
            Ok(instance)
        });
        let registration = Registration { lifetime, factory, singleton: Mutex::new(None) };
        Arc::make_mut(&mut self.registrations).insert(TypeId::of::<T>(), Arc::new(registration));
        self
    }

    pub fn contains<T: Any>(&self) -> bool {
        self.registrations.contains_key(&TypeId::of::<T>())
    }

    pub fn lifetime_of<T: Any>(&self) -> Option<Lifetime> {
        self.registrations.get(&TypeId::of::<T>()).map(|r| r.lifetime)
    }
}

impl Injector for Container {
    fn create_scope(&self, name: &str) -> Arc<dyn Resolver> {
        trace!(scope = name, "opening resolution scope");
        Arc::new(Scope {
            registrations: Arc::clone(&self.registrations),
            instances: Mutex::new(HashMap::new()),
        })
    }
}

/// One resolution scope. Dropping it releases every scoped instance.
struct Scope {
    registrations: Arc<HashMap<TypeId, Arc<Registration>>>,
    instances: Mutex<HashMap<TypeId, Instance>>,
}

impl Resolver for Scope {
    fn resolve_any(&self, id: TypeId, type_name: &'static str) -> Result<Instance, Error> {
        let registration = self.registrations
            .get(&id)
            .ok_or(Error::DependencyNotRegistered(type_name))?;

        // Locks are never held across a factory call: factories resolve
        // their own dependencies through this same scope.
        match registration.lifetime {
            Lifetime::Transient => (registration.factory)(self),
            Lifetime::Scoped => {
                let cached = self.instances.lock().unwrap_or_else(PoisonError::into_inner).get(&id).cloned();
                if let Some(instance) = cached {
                    return Ok(instance);
                }
                let built = (registration.factory)(self)?;
                let mut instances = self.instances.lock().unwrap_or_else(PoisonError::into_inner);
                Ok(Arc::clone(instances.entry(id).or_insert(built)))
            }
            Lifetime::Singleton => {
                let cached = registration.singleton.lock().unwrap_or_else(PoisonError::into_inner).clone();
                if let Some(instance) = cached {
                    return Ok(instance);
                }
                let built = (registration.factory)(self)?;
                let mut slot = registration.singleton.lock().unwrap_or_else(PoisonError::into_inner);
                Ok(Arc::clone(slot.get_or_insert(built)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter(usize);

    fn counting(lifetime: Lifetime) -> (Container, Arc<AtomicUsize>) {
        let built = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&built);
        let mut container = Container::new();
        container.register(lifetime, move |_| Ok(Counter(seen.fetch_add(1, Ordering::SeqCst))));
        (container, built)
    }

    #[test]
    fn scoped_is_shared_within_a_scope_only() {
        let (container, built) = counting(Lifetime::Scoped);
        let first = container.create_scope("request");
        let a = first.resolve::<Counter>().unwrap();
        let b = first.resolve::<Counter>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let second = container.create_scope("request");
        let c = second.resolve::<Counter>().unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(built.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn singleton_survives_scopes() {
        let (container, built) = counting(Lifetime::Singleton);
        let a = container.create_scope("request").resolve::<Counter>().unwrap();
        let b = container.create_scope("request").resolve::<Counter>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(built.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn transient_builds_every_time() {
        let (container, _) = counting(Lifetime::Transient);
        let scope = container.create_scope("request");
        assert_eq!(scope.resolve::<Counter>().unwrap().0, 0);
        assert_eq!(scope.resolve::<Counter>().unwrap().0, 1);
    }

    #[test]
    fn unregistered_type_fails() {
        let scope = Container::new().create_scope("request");
        assert!(matches!(scope.resolve::<Counter>(), Err(Error::DependencyNotRegistered(_))));
    }

    #[test]
    fn factories_resolve_dependencies_from_the_scope() {
        struct Repo;
        struct Service(Arc<Repo>);

        let mut container = Container::new();
        container.register_scoped(|_| Ok(Repo));
        container.register_scoped(|r: &dyn Resolver| Ok(Service(r.resolve::<Repo>()?)));

        let scope = container.create_scope("request");
        let service = scope.resolve::<Service>().unwrap();
        assert!(Arc::ptr_eq(&service.0, &scope.resolve::<Repo>().unwrap()));
    }

    #[test]
    fn registered_instance_is_returned_as_is() {
        let mut container = Container::new();
        let instance = Arc::new(Counter(41));
        container.register_instance(Arc::clone(&instance));
        let resolved = container.create_scope("request").resolve::<Counter>().unwrap();
        assert!(Arc::ptr_eq(&instance, &resolved));
        assert_eq!(container.lifetime_of::<Counter>(), Some(Lifetime::Singleton));
    }
}
