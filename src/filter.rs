//! Filters: cross-cutting hooks around an action.
//!
//! A filter may implement any of three hooks. Each defaults to a no-op.
//!
//! | Hook | Runs |
//! |---|---|
//! | [`Filter::before_execute`] | before the action, global → controller → action |
//! | [`Filter::after_execute`] | after the action, action → controller → global |
//! | [`Filter::on_error`] | when any step of the request fails |
//!
//! Filters are referenced by type ([`FilterRef`]) and resolved from the
//! request's scope, so their lifetime is whatever the injector registered
//! them with: scoped filters live for one request, singletons for the
//! process.

use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::HttpContext;
use crate::error::Error;
use crate::injector::Resolver;
use crate::metadata::RoutingContext;

#[async_trait]
pub trait Filter: Send + Sync + 'static {
    async fn before_execute(&self, _ctx: &HttpContext, _routing: &RoutingContext) -> Result<(), Error> {
        Ok(())
    }

    async fn after_execute(&self, _ctx: &HttpContext, _routing: &RoutingContext) -> Result<(), Error> {
        Ok(())
    }

    async fn on_error(&self, _ctx: &HttpContext, _routing: &RoutingContext, _error: &Error) -> Result<(), Error> {
        Ok(())
    }
}

type ResolveFilter = fn(&dyn Resolver) -> Result<Arc<dyn Filter>, Error>;

/// A reference to a filter type, resolved to an instance per request.
#[derive(Clone, Copy)]
pub struct FilterRef {
    id: TypeId,
    name: &'static str,
    resolve: ResolveFilter,
}

impl FilterRef {
    pub fn of<F: Filter + Any>() -> Self {
        Self {
            id: TypeId::of::<F>(),
            name: type_name::<F>(),
            resolve: resolve_filter::<F>,
        }
    }

    pub fn name(&self) -> &'static str { self.name }

    pub(crate) fn resolve(&self, resolver: &dyn Resolver) -> Result<Arc<dyn Filter>, Error> {
        (self.resolve)(resolver)
    }
}

fn resolve_filter<F: Filter + Any>(resolver: &dyn Resolver) -> Result<Arc<dyn Filter>, Error> {
    let filter: Arc<dyn Filter> = resolver.resolve::<F>()?;
    Ok(filter)
}

impl PartialEq for FilterRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for FilterRef {}

impl fmt::Debug for FilterRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
