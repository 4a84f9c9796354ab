//! Declared and resolved quantity records.
//!
//! A declared record holds exactly what one type's directives said about
//! it: its own operations, conversions, constants, derivations, instance
//! lists, and the tri-state inherit flags of its specialization level.
//! The specialization chain resolver merges declared records along the
//! original-quantity chain into a [`ResolvedQuantity`], which is what the
//! code-emission collaborator receives.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::foundation::{Span, TypeIdentity};
use crate::instance::UnitInstance;

/// Key used for a unit's single unnamed derivation.
pub const DEFAULT_DERIVATION_ID: &str = "default";

/// Operator implemented by a quantity operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperatorKind {
    Add,
    Subtract,
    Multiply,
    Divide,
}

/// One declared operation: `self <op> other -> result`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Method name, when the operation is also exposed as a named method.
    pub name: Option<String>,
    pub operator: OperatorKind,
    /// The other operand's quantity type.
    pub other: TypeIdentity,
    /// The resulting quantity type.
    pub result: TypeIdentity,
    /// Whether the operand order is also emitted reversed.
    pub mirrored: bool,
    pub span: Span,
}

/// Direction of a declared convertibility relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConversionDirection {
    /// Only from this quantity onto the listed ones.
    Onto,
    /// Only from the listed quantities onto this one.
    From,
    Bidirectional,
}

/// Cast-operator behaviour of a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CastBehavior {
    Explicit,
    Implicit,
    /// Conversion methods only, no cast operator.
    None,
}

/// Declared convertibility towards a list of quantities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversion {
    pub quantities: Vec<TypeIdentity>,
    pub direction: ConversionDirection,
    pub cast: CastBehavior,
    pub span: Span,
}

/// Declared constant of a quantity, valued in a named unit instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constant {
    pub name: String,
    /// Name of the unit instance the value is expressed in.
    pub unit_instance: String,
    pub value: f64,
    /// Name of the generated "multiples of" accessor, when enabled.
    pub multiples_name: Option<String>,
    pub span: Span,
}

/// A derivation formula: an ordered parameter-type signature plus a
/// positional-substitution expression template.
///
/// Attached to a unit type it describes how instances can be constructed
/// from instances of other unit types; attached to a quantity it
/// describes how the quantity arises from other quantities. The shape is
/// identical in both positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Derivation {
    /// Identifier referenced by derived instances; `None` for the single
    /// unnamed derivation of a type.
    pub id: Option<String>,
    /// Ordered parameter types; order-significant unless `permutations`.
    pub signature: Vec<TypeIdentity>,
    /// Format string with positional slots, e.g. `{0} / {1}`.
    pub expression: String,
    /// Whether all orderings of the signature should be emitted.
    pub permutations: bool,
    pub span: Span,
}

/// Combination rule for an instance list against its ancestor lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StackingMode {
    Union,
    Intersect,
    /// Discard ancestor lists outright.
    Replace,
}

/// Whether an instance list includes or excludes the named instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstanceListKind {
    Include,
    Exclude,
}

/// One include/exclude directive over unit instance names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceList {
    pub kind: InstanceListKind,
    pub names: Vec<String>,
    pub stacking: StackingMode,
    pub span: Span,
}

/// Default unit instance of a quantity (name plus display symbol).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultInstance {
    pub name: String,
    pub symbol: Option<String>,
}

/// Tri-state inherit flags, one per inheritable property category.
///
/// `None` means the level left the category unset and the ancestor's
/// resolved value flows through; `Some(false)` drops everything inherited
/// for the category; `Some(true)` states inheritance explicitly (the
/// default behaviour, kept distinct from unset so a level can re-enable a
/// category an ancestor disabled).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InheritFlags {
    pub operations: Option<bool>,
    pub conversions: Option<bool>,
    pub constants: Option<bool>,
    pub derivations: Option<bool>,
    pub instance_lists: Option<bool>,
    pub default_instance: Option<bool>,
    pub bias_conversions: Option<bool>,
}

/// Properties declared at one specialization level of a quantity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuantityProperties {
    pub operations: Vec<Operation>,
    pub conversions: Vec<Conversion>,
    pub constants: Vec<Constant>,
    pub derivations: Vec<Derivation>,
    /// Include/exclude directives in declaration order.
    pub instance_lists: Vec<InstanceList>,
    pub default_instance: Option<DefaultInstance>,
    /// Bias-related conversion-operator behaviour declared at this level.
    pub bias_conversions: Option<bool>,
    pub inherit: InheritFlags,
}

/// Resolved unit type: a population member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitType {
    pub identity: TypeIdentity,
    /// The scalar quantity this unit measures.
    pub quantity: TypeIdentity,
    /// Whether the unit carries a bias term (e.g. temperature units).
    pub bias_term: bool,
    /// Derivations keyed by id ([`DEFAULT_DERIVATION_ID`] for the single
    /// unnamed one).
    pub derivations: IndexMap<String, Derivation>,
    /// Instances keyed by singular name, in declaration order.
    pub instances_by_name: IndexMap<String, UnitInstance>,
    /// Plural form → singular name.
    pub instances_by_plural_form: IndexMap<String, String>,
    pub span: Span,
}

/// Declared scalar quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarType {
    pub identity: TypeIdentity,
    /// Backing unit; `None` on specializations, which take the root's.
    pub unit: Option<TypeIdentity>,
    /// Whether the scalar adopts its unit's bias term.
    pub use_unit_bias: bool,
    /// Specialization parent; `None` for a root type.
    pub original: Option<TypeIdentity>,
    pub properties: QuantityProperties,
    pub span: Span,
}

/// Declared vector quantity of a fixed dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorType {
    pub identity: TypeIdentity,
    pub unit: Option<TypeIdentity>,
    /// Backing scalar, when one is declared.
    pub scalar: Option<TypeIdentity>,
    /// `0` on specializations, which take the root's dimension.
    pub dimension: u8,
    pub original: Option<TypeIdentity>,
    pub properties: QuantityProperties,
    pub span: Span,
}

/// Declared vector group (a family of vectors of varying dimension).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorGroupType {
    pub identity: TypeIdentity,
    pub unit: Option<TypeIdentity>,
    pub scalar: Option<TypeIdentity>,
    pub original: Option<TypeIdentity>,
    pub properties: QuantityProperties,
    pub span: Span,
}

/// Kind of a resolved quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuantityKind {
    Scalar,
    Vector { dimension: u8 },
    VectorGroup,
}

/// Fully inherited/overridden quantity record, the unit of output handed
/// to the code-emission collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedQuantity {
    pub identity: TypeIdentity,
    pub kind: QuantityKind,
    /// Backing unit, taken from the root of the specialization chain.
    pub unit: TypeIdentity,
    pub operations: Vec<Operation>,
    pub conversions: Vec<Conversion>,
    pub constants: Vec<Constant>,
    pub derivations: Vec<Derivation>,
    pub default_instance: Option<DefaultInstance>,
    pub bias_conversions: bool,
    /// Final applicable unit-instance names, in the unit's declaration
    /// order.
    pub included_instances: Vec<String>,
}
