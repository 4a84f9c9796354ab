//! Directive processing pass.
//!
//! Validates one raw directive in isolation: required fields present,
//! required text non-empty, required lists non-empty. A null field and an
//! empty field produce the same diagnostic, since textual absence and
//! textual emptiness are equivalent failures here.
//!
//! # What This Pass Does NOT Do
//!
//! - **No cross-referencing** - names and type references may dangle;
//!   the population resolver looks them up later
//! - **No ordering requirement** - every directive is checked on its own,
//!   so the whole input can be processed in any order, or in parallel
//!
//! Supported dimensions for vectors are 2 through 4, matching the vector
//! types the emitter can produce.

use metrica_model::directive::{
    RawAliasInstance, RawBiasedInstance, RawConstant, RawDerivation, RawDerivedInstance,
    RawDirective, RawFixedInstance, RawInstanceList, RawOperation, RawPrefixedInstance,
    RawScaledInstance, RawSpecialization,
};
use metrica_model::foundation::{Span, TypeIdentity};
use metrica_model::processed::{
    InstanceDef, InstanceDefForm, ProcessedDirective, ScalarDef, SpecializationDef, UnitDef,
    VectorDef, VectorGroupDef,
};
use metrica_model::quantity::{
    Constant, Conversion, DefaultInstance, Derivation, InheritFlags, InstanceList,
    InstanceListKind, Operation,
};

use crate::error::{Diagnostic, DiagnosticKind};

/// Validate one raw directive, yielding its processed form or a shape
/// diagnostic. Pure; knows nothing about other directives or types.
pub fn process_directive(
    owner: &TypeIdentity,
    raw: &RawDirective,
) -> Result<ProcessedDirective, Diagnostic> {
    match raw {
        RawDirective::Unit(unit) => {
            let quantity = require_field(unit.quantity.clone(), "quantity", owner, unit.span)?;
            Ok(ProcessedDirective::Unit(UnitDef {
                quantity,
                bias_term: unit.bias_term,
                span: unit.span,
            }))
        }
        RawDirective::Scalar(scalar) => Ok(ProcessedDirective::Scalar(ScalarDef {
            unit: scalar.unit.clone(),
            use_unit_bias: scalar.use_unit_bias,
            default_instance: default_instance(
                owner,
                scalar.default_instance_name.as_deref(),
                scalar.default_instance_symbol.as_deref(),
                scalar.span,
            )?,
            bias_conversions: scalar.bias_conversions,
            span: scalar.span,
        })),
        RawDirective::Vector(vector) => {
            let dimension = require_field(vector.dimension, "dimension", owner, vector.span)?;
            if !(2..=4).contains(&dimension) {
                return Err(Diagnostic::new(
                    DiagnosticKind::InvalidDimension,
                    vector.span,
                    format!("vector '{}' has unsupported dimension {}", owner, dimension),
                ));
            }
            Ok(ProcessedDirective::Vector(VectorDef {
                unit: vector.unit.clone(),
                scalar: vector.scalar.clone(),
                dimension,
                span: vector.span,
            }))
        }
        RawDirective::VectorGroup(group) => Ok(ProcessedDirective::VectorGroup(VectorGroupDef {
            unit: group.unit.clone(),
            scalar: group.scalar.clone(),
            span: group.span,
        })),
        RawDirective::Specialization(spec) => process_specialization(owner, spec),
        RawDirective::FixedInstance(instance) => process_fixed(owner, instance),
        RawDirective::ScaledInstance(instance) => process_scaled(owner, instance),
        RawDirective::BiasedInstance(instance) => process_biased(owner, instance),
        RawDirective::PrefixedInstance(instance) => process_prefixed(owner, instance),
        RawDirective::AliasInstance(instance) => process_alias(owner, instance),
        RawDirective::DerivedInstance(instance) => process_derived(owner, instance),
        RawDirective::Operation(operation) => process_operation(owner, operation),
        RawDirective::Conversion(conversion) => {
            if conversion.quantities.is_empty() {
                return Err(Diagnostic::new(
                    DiagnosticKind::EmptyItemList,
                    conversion.span,
                    format!("conversion on '{}' lists no quantities", owner),
                ));
            }
            Ok(ProcessedDirective::Conversion(Conversion {
                quantities: conversion.quantities.clone(),
                direction: conversion.direction,
                cast: conversion.cast,
                span: conversion.span,
            }))
        }
        RawDirective::Constant(constant) => process_constant(owner, constant),
        RawDirective::Derivation(derivation) => process_derivation(owner, derivation),
        RawDirective::IncludeInstances(list) => {
            process_instance_list(owner, list, InstanceListKind::Include)
        }
        RawDirective::ExcludeInstances(list) => {
            process_instance_list(owner, list, InstanceListKind::Exclude)
        }
    }
}

fn process_specialization(
    owner: &TypeIdentity,
    spec: &RawSpecialization,
) -> Result<ProcessedDirective, Diagnostic> {
    let original = require_field(spec.original.clone(), "original quantity", owner, spec.span)?;
    Ok(ProcessedDirective::Specialization(SpecializationDef {
        original,
        inherit: InheritFlags {
            operations: spec.inherit_operations,
            conversions: spec.inherit_conversions,
            constants: spec.inherit_constants,
            derivations: spec.inherit_derivations,
            instance_lists: spec.inherit_instance_lists,
            default_instance: spec.inherit_default_instance,
            bias_conversions: spec.inherit_bias_conversions,
        },
        default_instance: default_instance(
            owner,
            spec.default_instance_name.as_deref(),
            spec.default_instance_symbol.as_deref(),
            spec.span,
        )?,
        bias_conversions: spec.bias_conversions,
        span: spec.span,
    }))
}

fn process_fixed(
    owner: &TypeIdentity,
    instance: &RawFixedInstance,
) -> Result<ProcessedDirective, Diagnostic> {
    let (name, plural_form) = instance_names(
        owner,
        instance.name.as_deref(),
        instance.plural_form.as_deref(),
        instance.span,
    )?;
    let value = require_field(instance.value, "value", owner, instance.span)?;
    Ok(ProcessedDirective::Instance(InstanceDef {
        name,
        plural_form,
        form: InstanceDefForm::Fixed {
            value,
            bias: instance.bias.unwrap_or(0.0),
        },
        span: instance.span,
    }))
}

fn process_scaled(
    owner: &TypeIdentity,
    instance: &RawScaledInstance,
) -> Result<ProcessedDirective, Diagnostic> {
    let (name, plural_form) = instance_names(
        owner,
        instance.name.as_deref(),
        instance.plural_form.as_deref(),
        instance.span,
    )?;
    let base = require_text(instance.base.as_deref(), "base instance", owner, instance.span)?;
    let factor = require_field(instance.factor, "factor", owner, instance.span)?;
    Ok(ProcessedDirective::Instance(InstanceDef {
        name,
        plural_form,
        form: InstanceDefForm::Scaled { base, factor },
        span: instance.span,
    }))
}

fn process_biased(
    owner: &TypeIdentity,
    instance: &RawBiasedInstance,
) -> Result<ProcessedDirective, Diagnostic> {
    let (name, plural_form) = instance_names(
        owner,
        instance.name.as_deref(),
        instance.plural_form.as_deref(),
        instance.span,
    )?;
    let base = require_text(instance.base.as_deref(), "base instance", owner, instance.span)?;
    let offset = require_field(instance.offset, "offset", owner, instance.span)?;
    Ok(ProcessedDirective::Instance(InstanceDef {
        name,
        plural_form,
        form: InstanceDefForm::Biased { base, offset },
        span: instance.span,
    }))
}

fn process_prefixed(
    owner: &TypeIdentity,
    instance: &RawPrefixedInstance,
) -> Result<ProcessedDirective, Diagnostic> {
    let (name, plural_form) = instance_names(
        owner,
        instance.name.as_deref(),
        instance.plural_form.as_deref(),
        instance.span,
    )?;
    let base = require_text(instance.base.as_deref(), "base instance", owner, instance.span)?;
    let prefix = require_field(instance.prefix, "prefix", owner, instance.span)?;
    Ok(ProcessedDirective::Instance(InstanceDef {
        name,
        plural_form,
        form: InstanceDefForm::Prefixed { base, prefix },
        span: instance.span,
    }))
}

fn process_alias(
    owner: &TypeIdentity,
    instance: &RawAliasInstance,
) -> Result<ProcessedDirective, Diagnostic> {
    let (name, plural_form) = instance_names(
        owner,
        instance.name.as_deref(),
        instance.plural_form.as_deref(),
        instance.span,
    )?;
    let base = require_text(instance.base.as_deref(), "base instance", owner, instance.span)?;
    Ok(ProcessedDirective::Instance(InstanceDef {
        name,
        plural_form,
        form: InstanceDefForm::Alias { base },
        span: instance.span,
    }))
}

fn process_derived(
    owner: &TypeIdentity,
    instance: &RawDerivedInstance,
) -> Result<ProcessedDirective, Diagnostic> {
    let (name, plural_form) = instance_names(
        owner,
        instance.name.as_deref(),
        instance.plural_form.as_deref(),
        instance.span,
    )?;
    if instance.arguments.is_empty() {
        return Err(Diagnostic::new(
            DiagnosticKind::EmptyItemList,
            instance.span,
            format!("derived instance '{}' of '{}' lists no arguments", name, owner),
        ));
    }
    if instance.arguments.iter().any(String::is_empty) {
        return Err(Diagnostic::new(
            DiagnosticKind::EmptyName,
            instance.span,
            format!(
                "derived instance '{}' of '{}' has a null or empty argument",
                name, owner
            ),
        ));
    }
    Ok(ProcessedDirective::Instance(InstanceDef {
        name,
        plural_form,
        form: InstanceDefForm::Derived {
            derivation: instance.derivation.clone(),
            arguments: instance.arguments.clone(),
        },
        span: instance.span,
    }))
}

fn process_operation(
    owner: &TypeIdentity,
    operation: &RawOperation,
) -> Result<ProcessedDirective, Diagnostic> {
    let operator = require_field(operation.operator, "operator", owner, operation.span)?;
    let other = require_field(operation.other.clone(), "other quantity", owner, operation.span)?;
    let result = require_field(
        operation.result.clone(),
        "result quantity",
        owner,
        operation.span,
    )?;
    if let Some(name) = &operation.name {
        if name.is_empty() {
            return Err(Diagnostic::new(
                DiagnosticKind::EmptyName,
                operation.span,
                format!("operation on '{}' has a null or empty method name", owner),
            ));
        }
    }
    Ok(ProcessedDirective::Operation(Operation {
        name: operation.name.clone(),
        operator,
        other,
        result,
        mirrored: operation.mirrored,
        span: operation.span,
    }))
}

fn process_constant(
    owner: &TypeIdentity,
    constant: &RawConstant,
) -> Result<ProcessedDirective, Diagnostic> {
    let name = require_text(constant.name.as_deref(), "constant name", owner, constant.span)?;
    let unit_instance = require_text(
        constant.unit_instance.as_deref(),
        "unit instance",
        owner,
        constant.span,
    )?;
    let value = require_field(constant.value, "value", owner, constant.span)?;
    if let Some(multiples) = &constant.multiples_name {
        if multiples.is_empty() {
            return Err(Diagnostic::new(
                DiagnosticKind::EmptyName,
                constant.span,
                format!(
                    "constant '{}' of '{}' has a null or empty multiples name",
                    name, owner
                ),
            ));
        }
    }
    Ok(ProcessedDirective::Constant(Constant {
        name,
        unit_instance,
        value,
        multiples_name: constant.multiples_name.clone(),
        span: constant.span,
    }))
}

fn process_derivation(
    owner: &TypeIdentity,
    derivation: &RawDerivation,
) -> Result<ProcessedDirective, Diagnostic> {
    if derivation.signature.is_empty() {
        return Err(Diagnostic::new(
            DiagnosticKind::EmptySignature,
            derivation.span,
            format!("derivation on '{}' has an empty signature", owner),
        ));
    }
    let expression = require_text(
        derivation.expression.as_deref(),
        "expression",
        owner,
        derivation.span,
    )?;
    Ok(ProcessedDirective::Derivation(Derivation {
        id: derivation.id.clone(),
        signature: derivation.signature.clone(),
        expression,
        permutations: derivation.permutations,
        span: derivation.span,
    }))
}

fn process_instance_list(
    owner: &TypeIdentity,
    list: &RawInstanceList,
    kind: InstanceListKind,
) -> Result<ProcessedDirective, Diagnostic> {
    if list.names.is_empty() {
        return Err(Diagnostic::new(
            DiagnosticKind::EmptyItemList,
            list.span,
            format!("instance list on '{}' names no instances", owner),
        ));
    }
    if list.names.iter().any(String::is_empty) {
        return Err(Diagnostic::new(
            DiagnosticKind::EmptyName,
            list.span,
            format!("instance list on '{}' has a null or empty entry", owner),
        ));
    }
    Ok(ProcessedDirective::InstanceList(InstanceList {
        kind,
        names: list.names.clone(),
        stacking: list.stacking,
        span: list.span,
    }))
}

/// Require an optional field to be present.
fn require_field<T>(
    field: Option<T>,
    what: &str,
    owner: &TypeIdentity,
    span: Span,
) -> Result<T, Diagnostic> {
    field.ok_or_else(|| {
        Diagnostic::new(
            DiagnosticKind::MissingField,
            span,
            format!("directive on '{}' is missing its {}", owner, what),
        )
    })
}

/// Require an optional text field to be present and non-empty.
///
/// Null and empty share one diagnostic kind.
fn require_text(
    field: Option<&str>,
    what: &str,
    owner: &TypeIdentity,
    span: Span,
) -> Result<String, Diagnostic> {
    match field {
        Some(text) if !text.is_empty() => Ok(text.to_string()),
        _ => Err(Diagnostic::new(
            DiagnosticKind::EmptyName,
            span,
            format!("directive on '{}' has a null or empty {}", owner, what),
        )),
    }
}

fn instance_names(
    owner: &TypeIdentity,
    name: Option<&str>,
    plural_form: Option<&str>,
    span: Span,
) -> Result<(String, String), Diagnostic> {
    let name = require_text(name, "instance name", owner, span)?;
    let plural_form = require_text(plural_form, "plural form", owner, span)?;
    Ok((name, plural_form))
}

fn default_instance(
    owner: &TypeIdentity,
    name: Option<&str>,
    symbol: Option<&str>,
    span: Span,
) -> Result<Option<DefaultInstance>, Diagnostic> {
    match (name, symbol) {
        (None, None) => Ok(None),
        (Some(name), symbol) if !name.is_empty() => Ok(Some(DefaultInstance {
            name: name.to_string(),
            symbol: symbol.map(str::to_string),
        })),
        _ => Err(Diagnostic::new(
            DiagnosticKind::EmptyName,
            span,
            format!("default instance of '{}' has a null or empty name", owner),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrica_model::directive::RawUnit;

    fn owner() -> TypeIdentity {
        TypeIdentity::new("Measures", "Length")
    }

    fn span() -> Span {
        Span::new(0, 0, 10, 1)
    }

    #[test]
    fn fixed_instance_requires_name() {
        let raw = RawDirective::FixedInstance(RawFixedInstance {
            name: None,
            plural_form: Some("Metres".into()),
            value: Some(1.0),
            bias: None,
            span: span(),
        });
        let err = process_directive(&owner(), &raw).unwrap_err();
        assert_eq!(err.kind, DiagnosticKind::EmptyName);
    }

    #[test]
    fn empty_name_and_null_name_share_a_diagnostic() {
        let null_name = RawDirective::FixedInstance(RawFixedInstance {
            name: None,
            plural_form: Some("Metres".into()),
            value: Some(1.0),
            bias: None,
            span: span(),
        });
        let empty_name = RawDirective::FixedInstance(RawFixedInstance {
            name: Some(String::new()),
            plural_form: Some("Metres".into()),
            value: Some(1.0),
            bias: None,
            span: span(),
        });
        let a = process_directive(&owner(), &null_name).unwrap_err();
        let b = process_directive(&owner(), &empty_name).unwrap_err();
        assert_eq!(a.kind, b.kind);
    }

    #[test]
    fn unit_requires_quantity_reference() {
        let raw = RawDirective::Unit(RawUnit {
            quantity: None,
            bias_term: false,
            span: span(),
        });
        let err = process_directive(&owner(), &raw).unwrap_err();
        assert_eq!(err.kind, DiagnosticKind::MissingField);
    }

    #[test]
    fn scaled_instance_accepts_complete_payload() {
        let raw = RawDirective::ScaledInstance(RawScaledInstance {
            name: Some("Kilometre".into()),
            plural_form: Some("Kilometres".into()),
            base: Some("Metre".into()),
            factor: Some(1000.0),
            span: span(),
        });
        let processed = process_directive(&owner(), &raw).unwrap();
        match processed {
            ProcessedDirective::Instance(def) => {
                assert_eq!(def.name, "Kilometre");
                assert_eq!(
                    def.form,
                    InstanceDefForm::Scaled {
                        base: "Metre".into(),
                        factor: 1000.0
                    }
                );
            }
            other => panic!("expected instance, got {:?}", other),
        }
    }

    #[test]
    fn derivation_requires_signature_and_expression() {
        let no_signature = RawDirective::Derivation(RawDerivation {
            id: None,
            signature: Vec::new(),
            expression: Some("{0} / {1}".into()),
            permutations: false,
            span: span(),
        });
        let err = process_directive(&owner(), &no_signature).unwrap_err();
        assert_eq!(err.kind, DiagnosticKind::EmptySignature);

        let no_expression = RawDirective::Derivation(RawDerivation {
            id: None,
            signature: vec![TypeIdentity::new("Measures", "UnitOfLength")],
            expression: None,
            permutations: false,
            span: span(),
        });
        let err = process_directive(&owner(), &no_expression).unwrap_err();
        assert_eq!(err.kind, DiagnosticKind::EmptyName);
    }

    #[test]
    fn empty_include_list_is_rejected() {
        let raw = RawDirective::IncludeInstances(RawInstanceList {
            names: Vec::new(),
            stacking: metrica_model::quantity::StackingMode::Union,
            span: span(),
        });
        let err = process_directive(&owner(), &raw).unwrap_err();
        assert_eq!(err.kind, DiagnosticKind::EmptyItemList);
    }

    #[test]
    fn vector_dimension_is_range_checked() {
        let raw = RawDirective::Vector(metrica_model::directive::RawVector {
            unit: Some(TypeIdentity::new("Measures", "UnitOfLength")),
            scalar: None,
            dimension: Some(7),
            span: span(),
        });
        let err = process_directive(&owner(), &raw).unwrap_err();
        assert_eq!(err.kind, DiagnosticKind::InvalidDimension);
    }
}
