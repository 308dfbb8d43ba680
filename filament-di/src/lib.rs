//! Dependency resolution container with precision-based binding selection and pluggable
//! instance scopes.
//!
//! Collaborators (a binder DSL, manual assembly, code generation) hand the container a
//! finalized list of [bindings](binding::Binding) once; the container builds a read-only
//! resolution index and answers [resolve](injector::Injector::resolve) requests from then on,
//! picking the single best-matching binding by a deterministic precision order and caching
//! produced values per the binding's [scope](scope).
//!
//! ```
//! use filament_di::binding::Binding;
//! use filament_di::injector::InjectorBuilder;
//! use filament_di::key::Instance;
//! use filament_di::supplier::constant;
//! use filament_di::ty::Type;
//!
//! let injector = InjectorBuilder::new()
//!     .bind(Binding::new(Instance::of(Type::of::<i32>()), constant(42)))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(*injector.resolve_typed::<i32>().unwrap(), 42);
//! ```

pub mod binding;
pub mod error;
mod index;
pub mod injector;
pub mod key;
pub mod scope;
pub mod supplier;
pub mod ty;
