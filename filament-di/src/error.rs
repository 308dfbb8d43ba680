use crate::key::Instance;
use std::error::Error;
use thiserror::Error;

/// Type-erased error produced by user-supplied production code.
pub type ErrorPtr = Box<dyn Error + Send + Sync>;

/// Errors surfaced while resolving a dependency.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// No binding and no bridge rule satisfies the request. Carries the requested instance and
    /// the target it was being injected into, for diagnostics.
    #[error("no binding matches dependency '{instance}' (injecting into: {target:?})")]
    NoMatchingBinding {
        instance: Instance,
        target: Option<Instance>,
    },

    /// The requested instance already occurs in its own injection hierarchy.
    #[error("dependency cycle detected while resolving '{0}'")]
    DependencyCycle(Instance),

    /// An instance which expires more often than its target was injected directly. Deferred
    /// access via a provider bypasses this check.
    #[error("instance '{instance}' expires more often than its target '{target}'")]
    UnstableDependency { instance: Instance, target: Instance },

    /// A binding intentionally left unfulfilled was resolved without ever being overridden.
    #[error("required binding for '{0}' was never fulfilled")]
    RequiredNotProvided(Instance),

    /// A repository was asked to serve an uncached value without a producer.
    #[error("value absent from scope cache and no producer was supplied")]
    MissingProducer,

    /// The production capability itself failed.
    #[error("production of '{instance}' failed")]
    Production {
        instance: Instance,
        #[source]
        source: ErrorPtr,
    },

    /// A resolved value could not be downcast to the requested concrete type.
    #[error("resolved value cannot be downcast to '{requested}'")]
    TypeMismatch { requested: &'static str },

    /// An aggregation produced no elements, but the request demanded at least one.
    #[error("aggregation for '{0}' produced no elements but at least one was required")]
    EmptyAggregation(Instance),
}

/// Errors detected while building the resolution index from a finalized binding set.
#[derive(Error, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum IndexError {
    #[error("binding refers to an unknown scope: {0}")]
    UnknownScope(String),
}
