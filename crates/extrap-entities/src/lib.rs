//! Data model for empirical performance modeling.
//!
//! This crate contains the entities that flow through the extrap pipeline:
//! measured call paths and metrics, the coordinates at which they were
//! measured, the aggregated measurements, and the fitted functions,
//! hypotheses and models produced by the modeler.
//!
//! The types are designed to be:
//! - **Immutable once built**: models share their measurement sequences
//!   through `Arc` and expose read-only accessors
//! - **Serializable**: every entity derives serde so downstream tools can
//!   export or persist results without re-defining them
//! - **Identity by name**: call paths and metrics compare, hash and order by
//!   name only; tags never affect identity
//!
//! Why: keeping the entities in one crate guarantees the aggregator, the
//! modeler and the CLI agree on a single serialization contract.

mod coordinate;
mod function;
mod hypothesis;
mod identity;
mod measurement;
mod model;
#[cfg(test)]
mod testutil;

#[doc(inline)]
pub use coordinate::*;
#[doc(inline)]
pub use function::*;
#[doc(inline)]
pub use hypothesis::*;
#[doc(inline)]
pub use identity::*;
#[doc(inline)]
pub use measurement::*;
#[doc(inline)]
pub use model::*;
