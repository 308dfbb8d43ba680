//! Instance keys and requests. An [Instance] pairs a [Name] qualifier with a [Type] descriptor
//! and identifies *what* is bound or requested. A [Dependency] is an instance being resolved
//! right now, together with the hierarchy of targets it is being injected into.

use crate::error::ResolveError;
use crate::scope::Expiry;
use crate::ty::Type;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Qualifier for an instance: a specific identifier, the unqualified default, or the wildcard
/// matching every name. Precision ordering: specific > default > any.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Name {
    /// Wildcard qualifier matching every name, including the default.
    Any,
    /// The unqualified name.
    Default,
    /// A specific identifier.
    Named(Arc<str>),
}

impl Name {
    pub fn named(name: impl Into<Arc<str>>) -> Self {
        Name::Named(name.into())
    }

    /// Whether a binding carrying this name is a candidate for a request carrying `requested`.
    /// `Any` in the request matches every binding name; `Default` matches only default-named
    /// bindings; a specific name matches that exact name or a wildcard-named binding.
    pub fn applies_to(&self, requested: &Name) -> bool {
        match requested {
            Name::Any => true,
            Name::Default => matches!(self, Name::Default),
            Name::Named(_) => self == requested || matches!(self, Name::Any),
        }
    }

    pub fn more_precise_than(&self, other: &Name) -> bool {
        self.precision_rank() > other.precision_rank()
    }

    pub(crate) fn precision_rank(&self) -> u8 {
        match self {
            Name::Any => 0,
            Name::Default => 1,
            Name::Named(_) => 2,
        }
    }
}

impl From<&str> for Name {
    fn from(name: &str) -> Self {
        Name::named(name)
    }
}

impl Display for Name {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Name::Any => f.write_str("*"),
            Name::Default => Ok(()),
            Name::Named(name) => f.write_str(name),
        }
    }
}

/// A named, typed instance key. Immutable.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Instance {
    pub name: Name,
    pub ty: Type,
}

impl Instance {
    /// The default-named instance of a type.
    pub fn of(ty: Type) -> Self {
        Self {
            name: Name::Default,
            ty,
        }
    }

    /// The wildcard-named instance of a type.
    pub fn any_of(ty: Type) -> Self {
        Self { name: Name::Any, ty }
    }

    pub fn named(name: impl Into<Name>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

impl Display for Instance {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if !matches!(self.name, Name::Default) {
            write!(f, "{}:", self.name)?;
        }
        Display::fmt(&self.ty, f)
    }
}

/// One level of the injection hierarchy: the instance being injected into and the expiry of the
/// scope it lives in.
#[derive(Clone, Debug)]
pub struct Frame {
    pub target: Instance,
    pub expiry: Expiry,
}

/// A request for an instance, carrying the injection hierarchy built up by nested resolution,
/// and flags controlling expiry checks and aggregation.
#[derive(Clone, Debug)]
pub struct Dependency {
    instance: Instance,
    hierarchy: Vec<Frame>,
    bypass_expiry: bool,
    demand_non_empty: bool,
}

impl Dependency {
    pub fn on(instance: Instance) -> Self {
        Self {
            instance,
            hierarchy: Vec::new(),
            bypass_expiry: false,
            demand_non_empty: false,
        }
    }

    /// A request for the default-named instance of a type.
    pub fn of(ty: Type) -> Self {
        Self::on(Instance::of(ty))
    }

    /// Rebases this request onto another name, keeping type and hierarchy.
    pub fn named(mut self, name: impl Into<Name>) -> Self {
        self.instance.name = name.into();
        self
    }

    /// Rebases this request onto another type, keeping name and hierarchy.
    pub fn typed(mut self, ty: Type) -> Self {
        self.instance.ty = ty;
        self
    }

    /// Rebases this request onto another instance, keeping the hierarchy. Used by production
    /// code to resolve nested dependencies in the context of the current target.
    pub fn instanced(mut self, instance: Instance) -> Self {
        self.instance = instance;
        self
    }

    /// Skip expiry checks for this request. Set by deferred-access wrappers, which never hold
    /// on to the resolved value.
    pub fn bypass_expiry(mut self) -> Self {
        self.bypass_expiry = true;
        self
    }

    /// Demand that aggregations resolve to at least one element.
    pub fn non_empty(mut self) -> Self {
        self.demand_non_empty = true;
        self
    }

    /// Pushes a hierarchy frame for the given target. Fails when the target already occurs in
    /// the hierarchy, which would make resolution cycle forever.
    pub fn injecting_into(
        mut self,
        target: Instance,
        expiry: Expiry,
    ) -> Result<Self, ResolveError> {
        if self.hierarchy.iter().any(|frame| frame.target == target) {
            return Err(ResolveError::DependencyCycle(target));
        }
        self.hierarchy.push(Frame { target, expiry });
        Ok(self)
    }

    #[inline]
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    /// The instance this request is being injected into, if any.
    #[inline]
    pub fn target(&self) -> Option<&Instance> {
        self.hierarchy.last().map(|frame| &frame.target)
    }

    #[inline]
    pub fn frames(&self) -> &[Frame] {
        &self.hierarchy
    }

    #[inline]
    pub fn bypasses_expiry(&self) -> bool {
        self.bypass_expiry
    }

    #[inline]
    pub fn demands_non_empty(&self) -> bool {
        self.demand_non_empty
    }
}

impl Display for Dependency {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.instance, f)?;
        for frame in self.hierarchy.iter().rev() {
            write!(f, " <- {}", frame.target)?;
        }
        Ok(())
    }
}
