//! The read-only resolution index: all bindings grouped by raw type and array depth, sorted by
//! descending precision at build time. Built once from the finalized binding set, immutable and
//! freely shared afterwards.

use crate::binding::Binding;
use crate::error::IndexError;
use crate::key::Name;
use crate::scope::{Expiry, RepositoryPtr, ScopeRegistry};
use crate::ty::{RawType, Type};
use derivative::Derivative;
use fxhash::FxHashMap;
use itertools::Itertools;
use std::cmp::Ordering;
use tracing::{debug, warn};

/// Lookup key grouping bindings: raw type identity plus array depth, so array bindings never
/// mix with their element type's bindings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct TypeKey {
    raw: RawType,
    array_depth: u8,
}

impl TypeKey {
    pub(crate) fn of(ty: &Type) -> Self {
        Self {
            raw: ty.raw_type(),
            array_depth: ty.array_depth(),
        }
    }
}

/// One indexed binding: the binding itself, its position within the finalized set, and the
/// repository its scope created for it at build time.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub(crate) struct BoundEntry {
    pub(crate) binding: Binding,
    pub(crate) serial: usize,
    pub(crate) expiry: Expiry,
    #[derivative(Debug = "ignore")]
    pub(crate) repository: RepositoryPtr,
}

#[derive(Debug)]
pub(crate) struct ResolutionIndex {
    entries: FxHashMap<TypeKey, Vec<BoundEntry>>,
    total: usize,
}

impl ResolutionIndex {
    /// Builds the index: assigns serials from declaration order, initializes one repository per
    /// binding via its scope, groups by raw type and sorts each group by descending precision.
    pub(crate) fn build(
        bindings: Vec<Binding>,
        scopes: &ScopeRegistry,
    ) -> Result<Self, IndexError> {
        let total = bindings.len();
        let mut entries: FxHashMap<TypeKey, Vec<BoundEntry>> = FxHashMap::default();
        for (serial, binding) in bindings.into_iter().enumerate() {
            let scope = scopes
                .get(binding.scope.as_str())
                .ok_or_else(|| IndexError::UnknownScope(binding.scope.clone()))?;
            let entry = BoundEntry {
                expiry: scope.expiry(),
                repository: scope.init(),
                serial,
                binding,
            };
            entries
                .entry(TypeKey::of(&entry.binding.instance.ty))
                .or_default()
                .push(entry);
        }
        for group in entries.values_mut() {
            group.sort_by(compare_precision);
            for (one, other) in group.iter().tuple_windows() {
                if precision_ties(one, other) {
                    warn!(
                        first = %one.binding.instance,
                        second = %other.binding.instance,
                        "bindings tie in precision; declaration order decides"
                    );
                }
            }
        }

        debug!(
            bindings = total,
            raw_types = entries.len(),
            "resolution index built"
        );

        Ok(Self { entries, total })
    }

    #[inline]
    pub(crate) fn candidates(&self, key: &TypeKey) -> &[BoundEntry] {
        self.entries.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    #[inline]
    pub(crate) fn total(&self) -> usize {
        self.total
    }
}

fn name_precision(one: &Name, other: &Name) -> Ordering {
    one.precision_rank().cmp(&other.precision_rank()).reverse()
}

fn type_precision(one: &Type, other: &Type) -> Ordering {
    if one.more_precise_than(other) {
        Ordering::Less
    } else if other.more_precise_than(one) {
        Ordering::Greater
    } else {
        Ordering::Equal
    }
}

/// Fixed-priority precision ordering between two bindings competing for the same raw type;
/// `Less` sorts first and wins resolution. Criteria, first difference deciding: name
/// specificity, type-parameter specificity, target specificity, source rank (descending),
/// declaration ordinal (ascending).
pub(crate) fn compare_precision(one: &BoundEntry, other: &BoundEntry) -> Ordering {
    name_precision(&one.binding.instance.name, &other.binding.instance.name)
        .then_with(|| type_precision(&one.binding.instance.ty, &other.binding.instance.ty))
        .then_with(|| {
            other
                .binding
                .target
                .is_some()
                .cmp(&one.binding.target.is_some())
        })
        .then_with(|| other.binding.source.rank.cmp(&one.binding.source.rank))
        .then_with(|| one.serial.cmp(&other.serial))
}

fn precision_ties(one: &BoundEntry, other: &BoundEntry) -> bool {
    name_precision(&one.binding.instance.name, &other.binding.instance.name) == Ordering::Equal
        && type_precision(&one.binding.instance.ty, &other.binding.instance.ty) == Ordering::Equal
        && one.binding.target.is_some() == other.binding.target.is_some()
        && one.binding.source.rank == other.binding.source.rank
}
