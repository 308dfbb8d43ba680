//! Production capabilities for bindings. A [Supplier] is a strategy object behind the single
//! `supply` contract: given the dependency being resolved and the injector for nested
//! resolution, produce a type-erased value. Concrete suppliers cover constants, closures,
//! references to other instances and the required-but-unfulfilled placeholder.

use crate::error::{ErrorPtr, ResolveError};
use crate::injector::Injector;
use crate::key::{Dependency, Instance};
use std::any::Any;
use std::sync::Arc;

/// Shared pointer to a resolved instance.
pub type InstancePtr<T> = Arc<T>;

/// Type-erased resolved value.
pub type Value = Arc<dyn Any + Send + Sync>;

pub type SupplierPtr = Arc<dyn Supplier>;

/// Equality witness for type-erased values, used by set-semantics aggregation to collapse
/// duplicates. Created with [value_eq].
pub type ValueEqFn = fn(&Value, &Value) -> bool;

/// A production capability. Suppliers may call back into the injector to resolve nested
/// dependencies; re-entrant resolution is fully supported.
pub trait Supplier: Send + Sync {
    fn supply(&self, dependency: &Dependency, injector: &Injector)
        -> Result<Value, ResolveError>;
}

/// Supplier returning the same shared value on every call.
pub fn constant<T: Any + Send + Sync>(value: T) -> SupplierPtr {
    Arc::new(ConstantSupplier(Arc::new(value)))
}

/// Supplier invoking an infallible closure on every call. Pair with an uncached scope for
/// fresh-instance semantics or a caching scope for lazy singletons.
pub fn factory<T, F>(produce: F) -> SupplierPtr
where
    T: Any + Send + Sync,
    F: Fn() -> T + Send + Sync + 'static,
{
    Arc::new(FactorySupplier(produce))
}

/// Supplier invoking a fallible, context-aware closure. The closure receives the dependency
/// being resolved and the injector for nested resolution; its error is wrapped into
/// [ResolveError::Production] together with the requested instance.
pub fn produce<T, F>(produce: F) -> SupplierPtr
where
    T: Any + Send + Sync,
    F: Fn(&Dependency, &Injector) -> Result<T, ErrorPtr> + Send + Sync + 'static,
{
    Arc::new(ProducingSupplier(produce))
}

/// Supplier resolving another instance key in the context of the current request. Backs
/// "bind A to B" style indirections.
pub fn instance_ref(instance: Instance) -> SupplierPtr {
    Arc::new(ReferenceSupplier(instance))
}

/// The required-but-unfulfilled placeholder. Binding to this supplier makes a lookup miss
/// distinguishable from "bound to nothing": resolving it is a fatal configuration error.
pub fn required() -> SupplierPtr {
    Arc::new(RequiredSupplier)
}

/// Equality witness comparing type-erased values by downcasting both to `T`. Values of other
/// types never compare equal.
pub fn value_eq<T: Any + PartialEq>() -> ValueEqFn {
    fn eq<T: Any + PartialEq>(a: &Value, b: &Value) -> bool {
        match (a.downcast_ref::<T>(), b.downcast_ref::<T>()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
    eq::<T>
}

struct ConstantSupplier(Value);

impl Supplier for ConstantSupplier {
    fn supply(
        &self,
        _dependency: &Dependency,
        _injector: &Injector,
    ) -> Result<Value, ResolveError> {
        Ok(self.0.clone())
    }
}

struct FactorySupplier<F>(F);

impl<T, F> Supplier for FactorySupplier<F>
where
    T: Any + Send + Sync,
    F: Fn() -> T + Send + Sync,
{
    fn supply(
        &self,
        _dependency: &Dependency,
        _injector: &Injector,
    ) -> Result<Value, ResolveError> {
        Ok(Arc::new((self.0)()) as Value)
    }
}

struct ProducingSupplier<F>(F);

impl<T, F> Supplier for ProducingSupplier<F>
where
    T: Any + Send + Sync,
    F: Fn(&Dependency, &Injector) -> Result<T, ErrorPtr> + Send + Sync,
{
    fn supply(&self, dependency: &Dependency, injector: &Injector) -> Result<Value, ResolveError> {
        (self.0)(dependency, injector)
            .map(|value| Arc::new(value) as Value)
            .map_err(|source| ResolveError::Production {
                instance: dependency.instance().clone(),
                source,
            })
    }
}

struct ReferenceSupplier(Instance);

impl Supplier for ReferenceSupplier {
    fn supply(&self, dependency: &Dependency, injector: &Injector) -> Result<Value, ResolveError> {
        injector.resolve(&dependency.clone().instanced(self.0.clone()))
    }
}

struct RequiredSupplier;

impl Supplier for RequiredSupplier {
    fn supply(
        &self,
        dependency: &Dependency,
        _injector: &Injector,
    ) -> Result<Value, ResolveError> {
        Err(ResolveError::RequiredNotProvided(
            dependency.instance().clone(),
        ))
    }
}
