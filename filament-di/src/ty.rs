//! Structural type descriptors. A [Type] describes a possibly parameterized, possibly
//! array-shaped, possibly upper-bounded type and is the basis for binding lookup, assignability
//! and precision comparison. Descriptors are immutable once constructed and compare structurally:
//! two descriptors are equal iff raw type, parameters (recursively), array depth and bound flag
//! all match.

use std::any::{type_name, TypeId};
use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};

/// Stable identity token for a raw (unparameterized) type. Equality and hashing use the
/// [TypeId] only; the name is carried for diagnostics.
#[derive(Clone, Copy)]
pub struct RawType {
    id: TypeId,
    name: &'static str,
}

impl RawType {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for RawType {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for RawType {}

impl Hash for RawType {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Debug for RawType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

impl Display for RawType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

/// An immutable, structurally-comparable type descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Type {
    raw: RawType,
    args: Vec<Type>,
    array_depth: u8,
    upper_bound: bool,
}

impl Type {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::from_raw(RawType::of::<T>())
    }

    pub fn from_raw(raw: RawType) -> Self {
        Self {
            raw,
            args: Vec::new(),
            array_depth: 0,
            upper_bound: false,
        }
    }

    /// Replaces the type parameters of this descriptor.
    pub fn parameterized(mut self, args: impl IntoIterator<Item = Type>) -> Self {
        self.args = args.into_iter().collect();
        self
    }

    /// Marks this descriptor as upper-bounded: it stands for the given shape *or any more
    /// precise parameterization* of it.
    pub fn as_upper_bound(mut self) -> Self {
        self.upper_bound = true;
        self
    }

    /// The array type with this descriptor as its element type.
    pub fn array_type(&self) -> Type {
        let mut ty = self.clone();
        ty.array_depth += 1;
        ty
    }

    /// The element type of an array descriptor, or `None` for non-arrays.
    pub fn element_type(&self) -> Option<Type> {
        if self.array_depth == 0 {
            return None;
        }
        let mut ty = self.clone();
        ty.array_depth -= 1;
        Some(ty)
    }

    #[inline]
    pub fn raw_type(&self) -> RawType {
        self.raw
    }

    #[inline]
    pub fn parameters(&self) -> &[Type] {
        &self.args
    }

    #[inline]
    pub fn is_array(&self) -> bool {
        self.array_depth > 0
    }

    #[inline]
    pub fn array_depth(&self) -> u8 {
        self.array_depth
    }

    #[inline]
    pub fn is_upper_bound(&self) -> bool {
        self.upper_bound
    }

    #[inline]
    pub fn is_parameterized(&self) -> bool {
        !self.args.is_empty()
    }

    /// Whether a value described by `other` satisfies a request for this descriptor.
    ///
    /// Raw and array depth must match. An un-parameterized descriptor is treated as the erasure
    /// of its raw type and accepts any parameterization. An upper-bounded descriptor accepts
    /// covariantly-assignable parameters; an exact descriptor requires exactly equal parameters
    /// and never accepts an upper-bounded source.
    pub fn is_assignable_from(&self, other: &Type) -> bool {
        if self.raw != other.raw || self.array_depth != other.array_depth {
            return false;
        }
        if other.upper_bound && !self.upper_bound {
            return false;
        }
        if self.args.is_empty() {
            return true;
        }
        if self.args.len() != other.args.len() {
            return false;
        }
        if self.upper_bound {
            self.args
                .iter()
                .zip(&other.args)
                .all(|(own, foreign)| own.is_assignable_from(foreign))
        } else {
            self.args == other.args
        }
    }

    /// Precision ordering between two descriptors competing for the same raw type: exact
    /// parameterization beats upper-bounded, which beats raw erasure. Arrays compare via their
    /// element types; parameters are compared recursively, first difference deciding.
    pub fn more_precise_than(&self, other: &Type) -> bool {
        if self.array_depth > 0 || other.array_depth > 0 {
            return match (self.element_type(), other.element_type()) {
                (Some(own), Some(foreign)) => own.more_precise_than(&foreign),
                _ => false,
            };
        }
        let own = self.precision_rank();
        let foreign = other.precision_rank();
        if own != foreign {
            return own > foreign;
        }
        for (a, b) in self.args.iter().zip(&other.args) {
            if a.more_precise_than(b) {
                return true;
            }
            if b.more_precise_than(a) {
                return false;
            }
        }
        false
    }

    fn precision_rank(&self) -> u8 {
        if self.args.is_empty() {
            0
        } else if self.upper_bound {
            1
        } else {
            2
        }
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.upper_bound {
            f.write_str("? extends ")?;
        }
        Display::fmt(&self.raw, f)?;
        if !self.args.is_empty() {
            f.write_str("<")?;
            for (i, arg) in self.args.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                Display::fmt(arg, f)?;
            }
            f.write_str(">")?;
        }
        for _ in 0..self.array_depth {
            f.write_str("[]")?;
        }
        Ok(())
    }
}
