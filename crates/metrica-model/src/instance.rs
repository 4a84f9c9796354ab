//! Unit instance records.
//!
//! A unit instance is one named member value of a unit type ("Metre" of a
//! length unit). Instances reference sibling instances of the same unit
//! type by name, forming the dependency graph that the resolution engine
//! walks for cycle detection and magnitude resolution.

use serde::{Deserialize, Serialize};

use crate::foundation::TypeIdentity;

/// Scale-and-bias magnitude of an instance, relative to the fixed root
/// of its unit type.
///
/// "Kilometre" scaled from "Metre" by 1000 resolves to `scale = 1000`,
/// `bias = 0`. Derived instances carry no magnitude of their own; their
/// value follows from the instances of the signature unit types.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Magnitude {
    /// Multiplicative factor relative to the root instance.
    pub scale: f64,
    /// Additive offset, meaningful only for units with a bias term.
    pub bias: f64,
}

/// Prefix applied by a prefixed instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Prefix {
    /// Metric prefix: a power of ten (kilo = 3, milli = -3).
    Metric(i32),
    /// Binary prefix: a power of two (kibi = 10, mebi = 20).
    Binary(i32),
}

impl Prefix {
    /// The multiplicative factor this prefix applies.
    pub fn factor(&self) -> f64 {
        match self {
            Prefix::Metric(exponent) => 10f64.powi(*exponent),
            Prefix::Binary(exponent) => 2f64.powi(*exponent),
        }
    }
}

/// How an instance defines its value.
///
/// Every form except `Fixed` and `Derived` names a sibling instance of the
/// same unit type as its base; those references are the edges of the
/// instance dependency graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InstanceForm {
    /// Root instance with an absolute value (and bias, for biased units).
    Fixed { value: f64, bias: f64 },
    /// Base instance scaled by a constant factor.
    Scaled { base: String, factor: f64 },
    /// Base instance shifted by a constant offset.
    Biased { base: String, offset: f64 },
    /// Base instance scaled by a metric or binary prefix.
    Prefixed { base: String, prefix: Prefix },
    /// Another name for the base instance.
    Alias { base: String },
    /// Constructed through a derivation of the owning unit, from named
    /// instances of the signature unit types.
    Derived {
        /// Key of the derivation in the owning unit's derivation table.
        derivation: String,
        /// Instance names of the signature unit types, one per slot.
        arguments: Vec<String>,
        /// Signature copied from the resolved derivation.
        signature: Vec<TypeIdentity>,
        /// Expression template copied from the resolved derivation.
        expression: String,
    },
}

impl InstanceForm {
    /// The sibling instance this form depends on, if any.
    ///
    /// Derived instances depend on other unit *types*, not on siblings,
    /// so they contribute no edge to the instance graph.
    pub fn base(&self) -> Option<&str> {
        match self {
            InstanceForm::Fixed { .. } | InstanceForm::Derived { .. } => None,
            InstanceForm::Scaled { base, .. }
            | InstanceForm::Biased { base, .. }
            | InstanceForm::Prefixed { base, .. }
            | InstanceForm::Alias { base } => Some(base),
        }
    }
}

/// A resolved, named member of a unit type.
///
/// Owned by exactly one unit type; published in the unit's instance
/// tables once the graph builder has cleared it of collisions and cycles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitInstance {
    /// Singular name, unique among the unit's instance names and plural forms.
    pub name: String,
    /// Plural form, under the same uniqueness rule.
    pub plural_form: String,
    /// How the instance defines its value.
    pub form: InstanceForm,
    /// Effective magnitude relative to the unit's fixed root.
    ///
    /// `None` for derived instances.
    pub magnitude: Option<Magnitude>,
}
