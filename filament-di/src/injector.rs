//! The resolution engine. An [Injector] is built exactly once from a finalized binding set,
//! after which [Injector::resolve] can be called concurrently and re-entrantly: a production
//! capability may itself resolve nested dependencies through the injector it receives.
//!
//! Resolution picks the single best-matching binding per the precomputed precision order. When
//! no binding matches, built-in bridge rules kick in before failure: deferred-access
//! [Provider] handles, and array/[List]/[Set] aggregation over every compatible element
//! binding. Single-value resolution always picks exactly one winner; collection queries always
//! aggregate across all compatible bindings.

use crate::binding::Binding;
use crate::error::{IndexError, ResolveError};
use crate::index::{BoundEntry, ResolutionIndex, TypeKey};
use crate::key::{Dependency, Instance, Name};
use crate::scope::{built_in_scopes, CacheSite, Producer, ScopePtr, ScopeRegistry};
use crate::supplier::{InstancePtr, Value, ValueEqFn};
use crate::ty::{RawType, Type};
use derivative::Derivative;
use itertools::Itertools;
use std::any::{type_name, Any};
use std::sync::Arc;
use tracing::trace;

/// Marker for list-bridge requests: ordered aggregation of all compatible element bindings.
pub enum List {}

/// Marker for set-bridge requests: aggregation with duplicates collapsed.
pub enum Set {}

/// The descriptor of a list of `element` values.
pub fn list_type_of(element: Type) -> Type {
    Type::of::<List>().parameterized([element])
}

/// The descriptor of a set of `element` values.
pub fn set_type_of(element: Type) -> Type {
    Type::of::<Set>().parameterized([element])
}

/// The descriptor of a deferred-access handle to an `element` value.
pub fn provider_type_of(element: Type) -> Type {
    Type::of::<Provider>().parameterized([element])
}

/// A deferred-access handle synthesized by the provider bridge. Re-resolves its dependency on
/// every access and is never cached by the resolution layer; because access is deferred, it
/// bypasses expiry checks.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Provider {
    dependency: Dependency,
    #[derivative(Debug = "ignore")]
    injector: Injector,
}

impl Provider {
    pub fn get(&self) -> Result<Value, ResolveError> {
        self.injector.resolve(&self.dependency)
    }

    pub fn get_typed<T: Any + Send + Sync>(&self) -> Result<InstancePtr<T>, ResolveError> {
        downcast(self.get()?)
    }
}

/// Builder for an [Injector]: collects the finalized binding set and the scope registry, with
/// the built-in scopes registered by default.
pub struct InjectorBuilder {
    bindings: Vec<Binding>,
    scopes: ScopeRegistry,
}

impl InjectorBuilder {
    pub fn new() -> Self {
        Self {
            bindings: Vec::new(),
            scopes: built_in_scopes(),
        }
    }

    pub fn bind(mut self, binding: Binding) -> Self {
        self.bindings.push(binding);
        self
    }

    pub fn bind_all(mut self, bindings: impl IntoIterator<Item = Binding>) -> Self {
        self.bindings.extend(bindings);
        self
    }

    /// Registers a custom scope under the given name, replacing any previous registration.
    pub fn with_scope(mut self, name: impl Into<String>, scope: ScopePtr) -> Self {
        self.scopes.insert(name.into(), scope);
        self
    }

    /// Freezes the binding set and builds the resolution index; each binding's scope creates
    /// its repository here.
    pub fn build(self) -> Result<Injector, IndexError> {
        let index = ResolutionIndex::build(self.bindings, &self.scopes)?;
        Ok(Injector {
            core: Arc::new(InjectorCore { index }),
        })
    }
}

impl Default for InjectorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

struct InjectorCore {
    index: ResolutionIndex,
}

/// The resolution engine; cheap to clone and safe to share across threads.
#[derive(Clone)]
pub struct Injector {
    core: Arc<InjectorCore>,
}

impl Injector {
    /// Builds an injector over the finalized binding set with the built-in scopes.
    pub fn new(bindings: Vec<Binding>) -> Result<Self, IndexError> {
        InjectorBuilder::new().bind_all(bindings).build()
    }

    /// The number of bindings in the frozen set.
    pub fn binding_count(&self) -> usize {
        self.core.index.total()
    }

    /// Resolves a dependency to a type-erased value: picks the single best-matching binding,
    /// or falls back to the bridge rules, or fails with a diagnosable error.
    pub fn resolve(&self, dependency: &Dependency) -> Result<Value, ResolveError> {
        trace!(dependency = %dependency, "resolving");
        let key = TypeKey::of(&dependency.instance().ty);
        if let Some(entry) = self
            .core
            .index
            .candidates(&key)
            .iter()
            .find(|entry| applicable(entry, dependency))
        {
            return self.serve(entry, dependency);
        }
        self.bridge(dependency)
    }

    /// Typed resolution of the default-named instance of `T`.
    pub fn resolve_typed<T: Any + Send + Sync>(&self) -> Result<InstancePtr<T>, ResolveError> {
        downcast(self.resolve(&Dependency::of(Type::of::<T>()))?)
    }

    /// Typed resolution of a named instance of `T`.
    pub fn resolve_named<T: Any + Send + Sync>(
        &self,
        name: impl Into<Name>,
    ) -> Result<InstancePtr<T>, ResolveError> {
        downcast(self.resolve(&Dependency::of(Type::of::<T>()).named(name))?)
    }

    /// Typed resolution of an arbitrary request; fails with
    /// [ResolveError::TypeMismatch] when the resolved value is not a `T`.
    pub fn resolve_instance<T: Any + Send + Sync>(
        &self,
        dependency: &Dependency,
    ) -> Result<InstancePtr<T>, ResolveError> {
        downcast(self.resolve(dependency)?)
    }

    /// All name-compatible instances of `T` in precision order (list semantics: order
    /// preserved, duplicates kept).
    pub fn resolve_all<T: Any + Send + Sync>(
        &self,
        name: impl Into<Name>,
    ) -> Result<Vec<InstancePtr<T>>, ResolveError> {
        let dependency =
            Dependency::on(Instance::named(name, Type::of::<T>().array_type()));
        let elements = downcast::<Vec<Value>>(self.resolve(&dependency)?)?;
        elements.iter().cloned().map(downcast::<T>).try_collect()
    }

    /// All name-compatible instances of `T` with duplicates collapsed (set semantics). The
    /// element bindings must carry a value-equality witness for by-value collapsing; without
    /// one, only identical shared instances collapse.
    pub fn resolve_set<T: Any + Send + Sync>(
        &self,
        name: impl Into<Name>,
    ) -> Result<Vec<InstancePtr<T>>, ResolveError> {
        let dependency =
            Dependency::on(Instance::named(name, set_type_of(Type::of::<T>())));
        let elements = downcast::<Vec<Value>>(self.resolve(&dependency)?)?;
        elements.iter().cloned().map(downcast::<T>).try_collect()
    }

    /// A deferred-access handle for the default-named instance of `T`.
    pub fn provider_of<T: Any + Send + Sync>(&self) -> Result<InstancePtr<Provider>, ResolveError> {
        downcast(self.resolve(&Dependency::of(provider_type_of(Type::of::<T>())))?)
    }

    fn serve(&self, entry: &BoundEntry, dependency: &Dependency) -> Result<Value, ResolveError> {
        if !dependency.bypasses_expiry() {
            for frame in dependency.frames() {
                if entry.expiry.expires_more_often_than(frame.expiry) {
                    return Err(ResolveError::UnstableDependency {
                        instance: entry.binding.instance.clone(),
                        target: frame.target.clone(),
                    });
                }
            }
        }
        let inner = dependency
            .clone()
            .injecting_into(entry.binding.instance.clone(), entry.expiry)?;
        let producer = EntryProducer {
            injector: self,
            entry,
            dependency: &inner,
        };
        let site = CacheSite {
            serial: entry.serial,
            dependency: &inner,
        };
        entry.repository.serve(&site, Some(&producer))
    }

    /// Built-in fallback rules applied when no binding matches directly.
    fn bridge(&self, dependency: &Dependency) -> Result<Value, ResolveError> {
        let ty = &dependency.instance().ty;
        if let Some(element) = ty.element_type() {
            let elements = self.aggregate(dependency, &element)?;
            return Ok(Arc::new(elements) as Value);
        }
        let raw = ty.raw_type();
        if raw == RawType::of::<Provider>() && ty.parameters().len() == 1 {
            let inner = dependency
                .clone()
                .typed(ty.parameters()[0].clone())
                .bypass_expiry();
            return Ok(Arc::new(Provider {
                dependency: inner,
                injector: self.clone(),
            }) as Value);
        }
        if raw == RawType::of::<List>() && ty.parameters().len() == 1 {
            let element = ty.parameters()[0].clone();
            let elements = self.aggregate(dependency, &element)?;
            return Ok(Arc::new(elements) as Value);
        }
        if raw == RawType::of::<Set>() && ty.parameters().len() == 1 {
            let element = ty.parameters()[0].clone();
            let elements = self.aggregate_with_witnesses(dependency, &element)?;
            return Ok(Arc::new(collapse(elements)) as Value);
        }
        Err(ResolveError::NoMatchingBinding {
            instance: dependency.instance().clone(),
            target: dependency.target().cloned(),
        })
    }

    /// Aggregates across *every* compatible binding for the element type, in precision order,
    /// serving each through its own repository. An empty aggregation is valid unless the
    /// request demands otherwise.
    fn aggregate(
        &self,
        dependency: &Dependency,
        element: &Type,
    ) -> Result<Vec<Value>, ResolveError> {
        Ok(self
            .aggregate_with_witnesses(dependency, element)?
            .into_iter()
            .map(|(value, _)| value)
            .collect())
    }

    /// Aggregation keeping each value paired with the value-equality witness of the binding it
    /// came from, so collapsing never consults a binding which contributed nothing.
    fn aggregate_with_witnesses(
        &self,
        dependency: &Dependency,
        element: &Type,
    ) -> Result<Vec<(Value, Option<ValueEqFn>)>, ResolveError> {
        let element_dependency = dependency.clone().typed(element.clone());
        let key = TypeKey::of(element);
        let elements: Vec<(Value, Option<ValueEqFn>)> = self
            .core
            .index
            .candidates(&key)
            .iter()
            .filter(|entry| applicable(entry, &element_dependency))
            .map(|entry| {
                self.serve(entry, &element_dependency)
                    .map(|value| (value, entry.binding.value_eq))
            })
            .try_collect()?;
        if elements.is_empty() && dependency.demands_non_empty() {
            return Err(ResolveError::EmptyAggregation(
                dependency.instance().clone(),
            ));
        }
        Ok(elements)
    }
}

/// Set semantics: collapses duplicates using each value's own binding witness (either side's
/// witness may report equality), falling back to shared-instance identity when neither
/// contributing binding carries one.
fn collapse(elements: Vec<(Value, Option<ValueEqFn>)>) -> Vec<Value> {
    let mut kept: Vec<(Value, Option<ValueEqFn>)> = Vec::with_capacity(elements.len());
    for (value, eq) in elements {
        let duplicate = kept.iter().any(|(known, known_eq)| match eq.or(*known_eq) {
            Some(eq) => eq(known, &value),
            None => Arc::ptr_eq(known, &value),
        });
        if !duplicate {
            kept.push((value, eq));
        }
    }
    kept.into_iter().map(|(value, _)| value).collect()
}

fn applicable(entry: &BoundEntry, dependency: &Dependency) -> bool {
    let binding = &entry.binding;
    if !binding.instance.name.applies_to(&dependency.instance().name) {
        return false;
    }
    if !serves(&binding.instance.ty, &dependency.instance().ty) {
        return false;
    }
    match &binding.target {
        None => true,
        Some(target) => dependency.target().map_or(false, |parent| {
            target.name.applies_to(&parent.name) && serves(&target.ty, &parent.ty)
        }),
    }
}

/// Whether a binding of `bound` can serve a request for `requested`: either the bound type
/// accepts the requested shape (erasure and upper bounds are covariant), or the request is
/// itself upper-bounded and accepts the bound shape.
fn serves(bound: &Type, requested: &Type) -> bool {
    bound.is_assignable_from(requested)
        || (requested.is_upper_bound() && requested.is_assignable_from(bound))
}

struct EntryProducer<'a> {
    injector: &'a Injector,
    entry: &'a BoundEntry,
    dependency: &'a Dependency,
}

impl Producer for EntryProducer<'_> {
    fn produce(&self) -> Result<Value, ResolveError> {
        self.entry
            .binding
            .supplier
            .supply(self.dependency, self.injector)
    }
}

fn downcast<T: Any + Send + Sync>(value: Value) -> Result<InstancePtr<T>, ResolveError> {
    value
        .downcast::<T>()
        .map_err(|_| ResolveError::TypeMismatch {
            requested: type_name::<T>(),
        })
}
