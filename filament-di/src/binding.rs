//! Finalized binding records. Collaborators (a binder DSL, manual assembly, code generation)
//! produce a `Vec<Binding>` once, hand it to the injector, and the set is frozen from then on.

use crate::key::Instance;
use crate::scope;
use crate::supplier::{SupplierPtr, ValueEqFn};
use derivative::Derivative;

/// Declaration provenance of a binding: where it came from and a rank letting explicit
/// declarations override defaults when precision alone ties.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Source {
    pub origin: &'static str,
    pub rank: i8,
}

impl Source {
    pub fn new(origin: &'static str) -> Self {
        Self { origin, rank: 0 }
    }

    pub fn with_rank(mut self, rank: i8) -> Self {
        self.rank = rank;
        self
    }
}

impl Default for Source {
    fn default() -> Self {
        Self::new("")
    }
}

/// A single finalized binding: an instance key, a production capability, the scope owning
/// produced values, an optional injection target restricting where the binding applies, and
/// its declaration provenance. Never mutated after the resolution index is built.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct Binding {
    pub instance: Instance,

    /// Restricts this binding to requests injected into a matching target instance. `None`
    /// applies everywhere.
    pub target: Option<Instance>,

    #[derivative(Debug = "ignore")]
    pub supplier: SupplierPtr,

    /// Name of the scope owning instances produced by this binding.
    pub scope: String,

    pub source: Source,

    /// Optional value-equality witness enabling set-semantics duplicate collapsing for
    /// aggregations over this binding's type.
    #[derivative(Debug = "ignore")]
    pub value_eq: Option<ValueEqFn>,
}

impl Binding {
    /// A new binding in the application-wide scope, untargeted, with default provenance.
    pub fn new(instance: Instance, supplier: SupplierPtr) -> Self {
        Self {
            instance,
            target: None,
            supplier,
            scope: scope::APPLICATION.to_string(),
            source: Source::default(),
            value_eq: None,
        }
    }

    pub fn in_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn injecting_into(mut self, target: Instance) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_source(mut self, source: Source) -> Self {
        self.source = source;
        self
    }

    pub fn with_value_eq(mut self, value_eq: ValueEqFn) -> Self {
        self.value_eq = Some(value_eq);
        self
    }
}
