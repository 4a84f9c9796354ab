//! Raw directive payloads.
//!
//! A raw directive is the unvalidated bag of fields the front end
//! extracted from one annotation on a type declaration. Required textual
//! fields are `Option<String>` because the front end reports exactly what
//! the declaration said, including nothing at all; the directive
//! processor is what decides whether that is acceptable.
//!
//! Raw directives are never mutated. They live for one resolution pass.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::foundation::{Span, TypeIdentity};
use crate::instance::Prefix;
use crate::quantity::{CastBehavior, ConversionDirection, OperatorKind, StackingMode};

/// Unvalidated unit declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawUnit {
    /// The scalar quantity the unit measures.
    pub quantity: Option<TypeIdentity>,
    /// Whether the unit carries a bias term.
    pub bias_term: bool,
    pub span: Span,
}

/// Unvalidated scalar declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawScalar {
    pub unit: Option<TypeIdentity>,
    pub use_unit_bias: bool,
    pub default_instance_name: Option<String>,
    pub default_instance_symbol: Option<String>,
    pub bias_conversions: Option<bool>,
    pub span: Span,
}

/// Unvalidated vector declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawVector {
    pub unit: Option<TypeIdentity>,
    pub scalar: Option<TypeIdentity>,
    pub dimension: Option<u8>,
    pub span: Span,
}

/// Unvalidated vector-group declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawVectorGroup {
    pub unit: Option<TypeIdentity>,
    pub scalar: Option<TypeIdentity>,
    pub span: Span,
}

/// Unvalidated specialization ("inherits from") declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSpecialization {
    /// The original quantity this type refines.
    pub original: Option<TypeIdentity>,
    pub inherit_operations: Option<bool>,
    pub inherit_conversions: Option<bool>,
    pub inherit_constants: Option<bool>,
    pub inherit_derivations: Option<bool>,
    pub inherit_instance_lists: Option<bool>,
    pub inherit_default_instance: Option<bool>,
    pub inherit_bias_conversions: Option<bool>,
    pub default_instance_name: Option<String>,
    pub default_instance_symbol: Option<String>,
    pub bias_conversions: Option<bool>,
    pub span: Span,
}

/// Unvalidated fixed (root) instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFixedInstance {
    pub name: Option<String>,
    pub plural_form: Option<String>,
    pub value: Option<f64>,
    pub bias: Option<f64>,
    pub span: Span,
}

/// Unvalidated scaled instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawScaledInstance {
    pub name: Option<String>,
    pub plural_form: Option<String>,
    pub base: Option<String>,
    pub factor: Option<f64>,
    pub span: Span,
}

/// Unvalidated biased instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBiasedInstance {
    pub name: Option<String>,
    pub plural_form: Option<String>,
    pub base: Option<String>,
    pub offset: Option<f64>,
    pub span: Span,
}

/// Unvalidated prefixed instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPrefixedInstance {
    pub name: Option<String>,
    pub plural_form: Option<String>,
    pub base: Option<String>,
    pub prefix: Option<Prefix>,
    pub span: Span,
}

/// Unvalidated alias instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawAliasInstance {
    pub name: Option<String>,
    pub plural_form: Option<String>,
    pub base: Option<String>,
    pub span: Span,
}

/// Unvalidated derived instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDerivedInstance {
    pub name: Option<String>,
    pub plural_form: Option<String>,
    /// Id of the derivation to construct through; `None` selects the
    /// unit's single unnamed derivation.
    pub derivation: Option<String>,
    /// Instance names of the signature unit types, one per slot.
    pub arguments: Vec<String>,
    pub span: Span,
}

/// Unvalidated operation declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawOperation {
    pub name: Option<String>,
    pub operator: Option<OperatorKind>,
    pub other: Option<TypeIdentity>,
    pub result: Option<TypeIdentity>,
    pub mirrored: bool,
    pub span: Span,
}

/// Unvalidated convertibility declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawConversion {
    pub quantities: Vec<TypeIdentity>,
    pub direction: ConversionDirection,
    pub cast: CastBehavior,
    pub span: Span,
}

/// Unvalidated constant declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawConstant {
    pub name: Option<String>,
    pub unit_instance: Option<String>,
    pub value: Option<f64>,
    pub multiples_name: Option<String>,
    pub span: Span,
}

/// Unvalidated derivation declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDerivation {
    pub id: Option<String>,
    pub signature: Vec<TypeIdentity>,
    pub expression: Option<String>,
    pub permutations: bool,
    pub span: Span,
}

/// Unvalidated include/exclude list over unit instance names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawInstanceList {
    pub names: Vec<String>,
    pub stacking: StackingMode,
    pub span: Span,
}

/// One raw directive, tagged by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawDirective {
    Unit(RawUnit),
    Scalar(RawScalar),
    Vector(RawVector),
    VectorGroup(RawVectorGroup),
    Specialization(RawSpecialization),
    FixedInstance(RawFixedInstance),
    ScaledInstance(RawScaledInstance),
    BiasedInstance(RawBiasedInstance),
    PrefixedInstance(RawPrefixedInstance),
    AliasInstance(RawAliasInstance),
    DerivedInstance(RawDerivedInstance),
    Operation(RawOperation),
    Conversion(RawConversion),
    Constant(RawConstant),
    Derivation(RawDerivation),
    IncludeInstances(RawInstanceList),
    ExcludeInstances(RawInstanceList),
}

/// Directive kind, used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DirectiveKind {
    Unit,
    Scalar,
    Vector,
    VectorGroup,
    Specialization,
    FixedInstance,
    ScaledInstance,
    BiasedInstance,
    PrefixedInstance,
    AliasInstance,
    DerivedInstance,
    Operation,
    Conversion,
    Constant,
    Derivation,
    IncludeInstances,
    ExcludeInstances,
}

impl RawDirective {
    /// The kind tag of this directive.
    pub fn kind(&self) -> DirectiveKind {
        match self {
            RawDirective::Unit(_) => DirectiveKind::Unit,
            RawDirective::Scalar(_) => DirectiveKind::Scalar,
            RawDirective::Vector(_) => DirectiveKind::Vector,
            RawDirective::VectorGroup(_) => DirectiveKind::VectorGroup,
            RawDirective::Specialization(_) => DirectiveKind::Specialization,
            RawDirective::FixedInstance(_) => DirectiveKind::FixedInstance,
            RawDirective::ScaledInstance(_) => DirectiveKind::ScaledInstance,
            RawDirective::BiasedInstance(_) => DirectiveKind::BiasedInstance,
            RawDirective::PrefixedInstance(_) => DirectiveKind::PrefixedInstance,
            RawDirective::AliasInstance(_) => DirectiveKind::AliasInstance,
            RawDirective::DerivedInstance(_) => DirectiveKind::DerivedInstance,
            RawDirective::Operation(_) => DirectiveKind::Operation,
            RawDirective::Conversion(_) => DirectiveKind::Conversion,
            RawDirective::Constant(_) => DirectiveKind::Constant,
            RawDirective::Derivation(_) => DirectiveKind::Derivation,
            RawDirective::IncludeInstances(_) => DirectiveKind::IncludeInstances,
            RawDirective::ExcludeInstances(_) => DirectiveKind::ExcludeInstances,
        }
    }

    /// Source location of this directive.
    pub fn span(&self) -> Span {
        match self {
            RawDirective::Unit(d) => d.span,
            RawDirective::Scalar(d) => d.span,
            RawDirective::Vector(d) => d.span,
            RawDirective::VectorGroup(d) => d.span,
            RawDirective::Specialization(d) => d.span,
            RawDirective::FixedInstance(d) => d.span,
            RawDirective::ScaledInstance(d) => d.span,
            RawDirective::BiasedInstance(d) => d.span,
            RawDirective::PrefixedInstance(d) => d.span,
            RawDirective::AliasInstance(d) => d.span,
            RawDirective::DerivedInstance(d) => d.span,
            RawDirective::Operation(d) => d.span,
            RawDirective::Conversion(d) => d.span,
            RawDirective::Constant(d) => d.span,
            RawDirective::Derivation(d) => d.span,
            RawDirective::IncludeInstances(d) => d.span,
            RawDirective::ExcludeInstances(d) => d.span,
        }
    }
}

impl fmt::Display for DirectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DirectiveKind::Unit => "unit",
            DirectiveKind::Scalar => "scalar",
            DirectiveKind::Vector => "vector",
            DirectiveKind::VectorGroup => "vector group",
            DirectiveKind::Specialization => "specialization",
            DirectiveKind::FixedInstance => "fixed instance",
            DirectiveKind::ScaledInstance => "scaled instance",
            DirectiveKind::BiasedInstance => "biased instance",
            DirectiveKind::PrefixedInstance => "prefixed instance",
            DirectiveKind::AliasInstance => "alias instance",
            DirectiveKind::DerivedInstance => "derived instance",
            DirectiveKind::Operation => "operation",
            DirectiveKind::Conversion => "conversion",
            DirectiveKind::Constant => "constant",
            DirectiveKind::Derivation => "derivation",
            DirectiveKind::IncludeInstances => "include list",
            DirectiveKind::ExcludeInstances => "exclude list",
        };
        write!(f, "{}", name)
    }
}
