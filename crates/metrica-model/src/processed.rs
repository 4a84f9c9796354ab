//! Shape-checked directive payloads.
//!
//! A processed directive is a raw directive whose required fields have
//! been confirmed present and non-empty by the directive processor. It is
//! still not cross-referenced against other types; name and type
//! references may dangle until the population resolver looks them up.

use serde::{Deserialize, Serialize};

use crate::foundation::{Span, TypeIdentity};
use crate::instance::Prefix;
use crate::quantity::{
    Constant, Conversion, DefaultInstance, Derivation, InheritFlags, InstanceList, Operation,
};

/// Shape-checked unit declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitDef {
    pub quantity: TypeIdentity,
    pub bias_term: bool,
    pub span: Span,
}

/// Shape-checked scalar declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarDef {
    /// Backing unit; required for root scalars, which is enforced by the
    /// population resolver once specialization directives are known.
    pub unit: Option<TypeIdentity>,
    pub use_unit_bias: bool,
    pub default_instance: Option<DefaultInstance>,
    pub bias_conversions: Option<bool>,
    pub span: Span,
}

/// Shape-checked vector declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorDef {
    pub unit: Option<TypeIdentity>,
    pub scalar: Option<TypeIdentity>,
    pub dimension: u8,
    pub span: Span,
}

/// Shape-checked vector-group declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorGroupDef {
    pub unit: Option<TypeIdentity>,
    pub scalar: Option<TypeIdentity>,
    pub span: Span,
}

/// Shape-checked specialization declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecializationDef {
    pub original: TypeIdentity,
    pub inherit: InheritFlags,
    pub default_instance: Option<DefaultInstance>,
    pub bias_conversions: Option<bool>,
    pub span: Span,
}

/// How a shape-checked instance defines its value.
///
/// Unlike the resolved [`crate::instance::InstanceForm`], derived
/// instances here still reference their derivation by id; the instance
/// graph builder resolves the id against the owning unit's derivation
/// table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InstanceDefForm {
    Fixed { value: f64, bias: f64 },
    Scaled { base: String, factor: f64 },
    Biased { base: String, offset: f64 },
    Prefixed { base: String, prefix: Prefix },
    Alias { base: String },
    Derived { derivation: Option<String>, arguments: Vec<String> },
}

impl InstanceDefForm {
    /// The sibling instance this form depends on, if any.
    pub fn base(&self) -> Option<&str> {
        match self {
            InstanceDefForm::Fixed { .. } | InstanceDefForm::Derived { .. } => None,
            InstanceDefForm::Scaled { base, .. }
            | InstanceDefForm::Biased { base, .. }
            | InstanceDefForm::Prefixed { base, .. }
            | InstanceDefForm::Alias { base } => Some(base),
        }
    }

    /// Whether this is a biased instance.
    pub fn is_biased(&self) -> bool {
        matches!(self, InstanceDefForm::Biased { .. })
    }
}

/// Shape-checked unit instance declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceDef {
    pub name: String,
    pub plural_form: String,
    pub form: InstanceDefForm,
    pub span: Span,
}

/// One shape-checked directive.
///
/// Operation, conversion, constant, derivation, and instance-list
/// directives are carried as the model records directly; the processor
/// already produced their final shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProcessedDirective {
    Unit(UnitDef),
    Scalar(ScalarDef),
    Vector(VectorDef),
    VectorGroup(VectorGroupDef),
    Specialization(SpecializationDef),
    Instance(InstanceDef),
    Operation(Operation),
    Conversion(Conversion),
    Constant(Constant),
    Derivation(Derivation),
    InstanceList(InstanceList),
}
