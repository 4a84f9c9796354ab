// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Data model for the metrica generator
//!
//! This crate defines the directive and quantity model that the resolution
//! engine (`metrica-resolve`) consumes and produces: raw and processed
//! directives, unit instances, declared type records, and the published
//! [`Population`].
//!
//! Everything here is pure data. Records are immutable once constructed;
//! each resolution stage produces new values instead of mutating earlier
//! ones.

pub mod directive;
pub mod foundation;
pub mod instance;
pub mod population;
pub mod processed;
pub mod quantity;

pub use directive::{DirectiveKind, RawDirective};
pub use foundation::{Span, TypeIdentity};
pub use instance::{InstanceForm, Magnitude, Prefix, UnitInstance};
pub use population::{DeclaredKind, DuplicateIdentity, Population, VectorMember};
pub use processed::ProcessedDirective;
pub use quantity::{
    CastBehavior, Constant, Conversion, ConversionDirection, DefaultInstance, Derivation,
    InheritFlags, InstanceList, InstanceListKind, Operation, OperatorKind, QuantityKind,
    QuantityProperties, ResolvedQuantity, ScalarType, StackingMode, UnitType, VectorGroupType,
    VectorType, DEFAULT_DERIVATION_ID,
};
