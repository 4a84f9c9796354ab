//! Population resolver.
//!
//! Folds the shape-checked declarations of all types into one
//! [`Population`]: three registries sharing a single identity space, plus
//! a side-table of identities seen more than once.
//!
//! # What This Pass Does
//!
//! 1. **Partitioning** - groups each type's directives into its kind
//!    marker, its specialization link, its instances, and its properties
//! 2. **Classification** - a type's registry follows its marker; a type
//!    declared only through a specialization adopts the kind of its
//!    original, chased to a fixpoint
//! 3. **Insertion** - first definition of an identity wins; every later
//!    one lands in the duplicates side-table and is excluded, never merged
//! 4. **Instance graphs** - each unit's instance tables are built by the
//!    instance graph builder against its keyed derivation table
//! 5. **Cross-checks** - once the registries are closed, every type
//!    reference is checked against them; a failing type is removed from
//!    the published registries with its diagnostics kept
//!
//! Cross-checks run against the closed registries, not against the
//! survivor set, so one type's exclusion cannot cascade into its
//! dependents. A dependent of an excluded type fails later, in the
//! specialization chain resolver, with its own diagnostic.

use indexmap::{IndexMap, IndexSet};
use metrica_model::foundation::{Span, TypeIdentity};
use metrica_model::population::{DeclaredKind, DuplicateIdentity, Population, VectorMember};
use metrica_model::processed::{
    InstanceDef, ProcessedDirective, ScalarDef, SpecializationDef, UnitDef, VectorDef,
    VectorGroupDef,
};
use metrica_model::quantity::{
    Constant, Conversion, Derivation, InheritFlags, InstanceList, Operation, QuantityProperties,
    ScalarType, UnitType, VectorGroupType, VectorType, DEFAULT_DERIVATION_ID,
};

use crate::error::{Diagnostic, DiagnosticKind};
use crate::resolve::instances::build_instances;

/// Build the population from every type's processed directives.
///
/// The input order is the declaration order; registries preserve it.
pub fn build_population(
    declarations: &[(TypeIdentity, Vec<ProcessedDirective>)],
    diagnostics: &mut Vec<Diagnostic>,
) -> Population {
    let mut population = Population::default();

    let mut partitioned = Vec::with_capacity(declarations.len());
    for (identity, directives) in declarations {
        partitioned.push(partition(
            identity,
            directives,
            &mut population.duplicates,
            diagnostics,
        ));
    }

    let kinds = classify(&partitioned, diagnostics);

    for decl in &partitioned {
        let Some(kind) = kinds.get(decl.identity).copied() else {
            continue;
        };
        if let Some(kept) = population.declared_kind(decl.identity) {
            diagnostics.push(
                Diagnostic::new(
                    DiagnosticKind::TypeAlreadyDefined,
                    decl.declaration_span(),
                    format!("type '{}' is already defined as a {}", decl.identity, kept),
                )
                .with_note("the first definition is kept".to_string()),
            );
            population.duplicates.push(DuplicateIdentity {
                identity: decl.identity.clone(),
                kept,
                // The kinds map holds the kept definition's kind; record
                // what the discarded declaration actually declared.
                duplicate: decl.explicit_kind().unwrap_or(kind),
                span: decl.declaration_span(),
            });
            continue;
        }
        insert(&mut population, decl, kind, diagnostics);
    }

    cross_check(&mut population, diagnostics);
    population
}

/// One type's directives, grouped by role.
struct Partitioned<'a> {
    identity: &'a TypeIdentity,
    unit: Option<&'a UnitDef>,
    scalar: Option<&'a ScalarDef>,
    vector: Option<&'a VectorDef>,
    vector_group: Option<&'a VectorGroupDef>,
    specialization: Option<&'a SpecializationDef>,
    instances: Vec<InstanceDef>,
    operations: Vec<Operation>,
    conversions: Vec<Conversion>,
    constants: Vec<Constant>,
    derivations: Vec<Derivation>,
    instance_lists: Vec<InstanceList>,
}

impl Partitioned<'_> {
    fn explicit_kind(&self) -> Option<DeclaredKind> {
        if self.unit.is_some() {
            Some(DeclaredKind::Unit)
        } else if self.scalar.is_some() {
            Some(DeclaredKind::Scalar)
        } else if self.vector.is_some() {
            Some(DeclaredKind::Vector)
        } else if self.vector_group.is_some() {
            Some(DeclaredKind::VectorGroup)
        } else {
            None
        }
    }

    /// Span of the directive that makes this a type declaration.
    fn declaration_span(&self) -> Span {
        self.unit
            .map(|d| d.span)
            .or_else(|| self.scalar.map(|d| d.span))
            .or_else(|| self.vector.map(|d| d.span))
            .or_else(|| self.vector_group.map(|d| d.span))
            .or_else(|| self.specialization.map(|d| d.span))
            .unwrap_or_default()
    }
}

fn partition<'a>(
    identity: &'a TypeIdentity,
    directives: &'a [ProcessedDirective],
    duplicates: &mut Vec<DuplicateIdentity>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Partitioned<'a> {
    let mut decl = Partitioned {
        identity,
        unit: None,
        scalar: None,
        vector: None,
        vector_group: None,
        specialization: None,
        instances: Vec::new(),
        operations: Vec::new(),
        conversions: Vec::new(),
        constants: Vec::new(),
        derivations: Vec::new(),
        instance_lists: Vec::new(),
    };

    for directive in directives {
        // A second kind marker on the same type is a duplicate definition
        // of the identity, not an override.
        let marker_span = match directive {
            ProcessedDirective::Unit(d) => Some((DeclaredKind::Unit, d.span)),
            ProcessedDirective::Scalar(d) => Some((DeclaredKind::Scalar, d.span)),
            ProcessedDirective::Vector(d) => Some((DeclaredKind::Vector, d.span)),
            ProcessedDirective::VectorGroup(d) => Some((DeclaredKind::VectorGroup, d.span)),
            _ => None,
        };
        if let Some((kind, span)) = marker_span {
            if let Some(kept) = decl.explicit_kind() {
                diagnostics.push(
                    Diagnostic::new(
                        DiagnosticKind::TypeAlreadyDefined,
                        span,
                        format!("type '{}' is already defined as a {}", identity, kept),
                    )
                    .with_note("the first definition is kept".to_string()),
                );
                duplicates.push(DuplicateIdentity {
                    identity: identity.clone(),
                    kept,
                    duplicate: kind,
                    span,
                });
                continue;
            }
        }
        match directive {
            ProcessedDirective::Unit(d) => decl.unit = Some(d),
            ProcessedDirective::Scalar(d) => decl.scalar = Some(d),
            ProcessedDirective::Vector(d) => decl.vector = Some(d),
            ProcessedDirective::VectorGroup(d) => decl.vector_group = Some(d),
            ProcessedDirective::Specialization(d) => decl.specialization = Some(d),
            ProcessedDirective::Instance(d) => decl.instances.push(d.clone()),
            ProcessedDirective::Operation(d) => decl.operations.push(d.clone()),
            ProcessedDirective::Conversion(d) => decl.conversions.push(d.clone()),
            ProcessedDirective::Constant(d) => decl.constants.push(d.clone()),
            ProcessedDirective::Derivation(d) => decl.derivations.push(d.clone()),
            ProcessedDirective::InstanceList(d) => decl.instance_lists.push(d.clone()),
        }
    }
    decl
}

/// Assign every declared type its registry kind.
///
/// Types declared only through a specialization adopt the kind of their
/// original, iterated to a fixpoint so chains of any depth resolve. Types
/// left without a kind are excluded here with a diagnostic.
fn classify(
    partitioned: &[Partitioned<'_>],
    diagnostics: &mut Vec<Diagnostic>,
) -> IndexMap<TypeIdentity, DeclaredKind> {
    let mut kinds: IndexMap<TypeIdentity, DeclaredKind> = IndexMap::new();
    for decl in partitioned {
        if let Some(kind) = decl.explicit_kind() {
            kinds.entry(decl.identity.clone()).or_insert(kind);
        }
    }

    // Specializations without a marker of their own.
    let inferred: Vec<&Partitioned<'_>> = partitioned
        .iter()
        .filter(|decl| decl.explicit_kind().is_none() && decl.specialization.is_some())
        .collect();

    let mut pending: IndexSet<&TypeIdentity> =
        inferred.iter().map(|decl| decl.identity).collect();
    loop {
        let mut progressed = false;
        for decl in &inferred {
            if !pending.contains(decl.identity) {
                continue;
            }
            // filter above guarantees the specialization is present
            let Some(spec) = decl.specialization else {
                continue;
            };
            if let Some(kind) = kinds.get(&spec.original).copied() {
                if kind == DeclaredKind::Unit {
                    diagnostics.push(Diagnostic::new(
                        DiagnosticKind::UnresolvedSpecialization,
                        spec.span,
                        format!(
                            "type '{}' specializes '{}', but unit types cannot be specialized",
                            decl.identity, spec.original
                        ),
                    ));
                } else {
                    kinds.insert(decl.identity.clone(), kind);
                }
                pending.shift_remove(decl.identity);
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }

    // Whatever is still pending either chains into an undeclared identity
    // or cycles among the pending set.
    report_stranded(&inferred, &pending, diagnostics);

    // Explicit-kind specializations must name an original of the same
    // kind, and it must be declared.
    for decl in partitioned {
        let (Some(kind), Some(spec)) = (decl.explicit_kind(), decl.specialization) else {
            continue;
        };
        if kind == DeclaredKind::Unit {
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::DirectiveNotApplicable,
                spec.span,
                format!(
                    "unit type '{}' declares a specialization, but unit types cannot specialize",
                    decl.identity
                ),
            ));
            continue;
        }
        match kinds.get(&spec.original).copied() {
            None => {
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::UnresolvedSpecialization,
                    spec.span,
                    format!(
                        "type '{}' specializes '{}', which is not a declared type",
                        decl.identity, spec.original
                    ),
                ));
                kinds.shift_remove(decl.identity);
            }
            Some(original_kind) if original_kind != kind => {
                let expected = match kind {
                    DeclaredKind::Scalar => DiagnosticKind::TypeNotScalar,
                    DeclaredKind::Vector => DiagnosticKind::TypeNotVector,
                    DeclaredKind::VectorGroup => DiagnosticKind::TypeNotVectorGroup,
                    DeclaredKind::Unit => unreachable!("handled above"),
                };
                diagnostics.push(Diagnostic::new(
                    expected,
                    spec.span,
                    format!(
                        "{} '{}' specializes '{}', which is a {}",
                        kind, decl.identity, spec.original, original_kind
                    ),
                ));
                kinds.shift_remove(decl.identity);
            }
            Some(_) => {}
        }
    }

    kinds
}

/// Diagnose inferred specializations that never reached a declared kind.
fn report_stranded(
    inferred: &[&Partitioned<'_>],
    pending: &IndexSet<&TypeIdentity>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let by_identity: IndexMap<&TypeIdentity, &Partitioned<'_>> = inferred
        .iter()
        .filter(|decl| pending.contains(decl.identity))
        .map(|decl| (decl.identity, *decl))
        .collect();

    let mut reported: IndexSet<&TypeIdentity> = IndexSet::new();
    for decl in by_identity.values() {
        if reported.contains(decl.identity) {
            continue;
        }
        let mut path: Vec<&TypeIdentity> = Vec::new();
        let mut current = decl.identity;
        loop {
            if path.contains(&current) {
                // A cycle among pending specializations.
                let Some(spec) = by_identity.get(current).and_then(|d| d.specialization) else {
                    break;
                };
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::CyclicSpecialization,
                    spec.span,
                    format!("type '{}' transitively specializes itself", current),
                ));
                break;
            }
            path.push(current);
            match by_identity.get(current).and_then(|d| d.specialization) {
                Some(spec) if by_identity.contains_key(&spec.original) => {
                    current = &spec.original;
                }
                Some(spec) => {
                    diagnostics.push(Diagnostic::new(
                        DiagnosticKind::UnresolvedSpecialization,
                        spec.span,
                        format!(
                            "type '{}' specializes '{}', which is not a declared type",
                            current, spec.original
                        ),
                    ));
                    break;
                }
                None => break,
            }
        }
        for identity in path {
            reported.insert(identity);
        }
    }
}

/// Build the registry record for one classified type and insert it.
fn insert(
    population: &mut Population,
    decl: &Partitioned<'_>,
    kind: DeclaredKind,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match kind {
        DeclaredKind::Unit => {
            // classify never infers Unit, so the marker is present
            if let Some(def) = decl.unit {
                let unit = build_unit(decl, def, diagnostics);
                population.units.insert(decl.identity.clone(), unit);
            }
        }
        DeclaredKind::Scalar => {
            let scalar = build_scalar(decl, diagnostics);
            population.scalars.insert(decl.identity.clone(), scalar);
        }
        DeclaredKind::Vector => {
            let vector = build_vector(decl, diagnostics);
            population
                .vectors
                .insert(decl.identity.clone(), VectorMember::Vector(vector));
        }
        DeclaredKind::VectorGroup => {
            let group = build_vector_group(decl, diagnostics);
            population
                .vectors
                .insert(decl.identity.clone(), VectorMember::Group(group));
        }
    }
}

fn build_unit(decl: &Partitioned<'_>, def: &UnitDef, diagnostics: &mut Vec<Diagnostic>) -> UnitType {
    reject_quantity_directives(decl, "unit", diagnostics);

    let derivations = key_derivations(decl.identity, &decl.derivations, diagnostics);
    let table = build_instances(
        decl.identity,
        def.bias_term,
        &derivations,
        &decl.instances,
        diagnostics,
    );

    UnitType {
        identity: decl.identity.clone(),
        quantity: def.quantity.clone(),
        bias_term: def.bias_term,
        derivations,
        instances_by_name: table.by_name,
        instances_by_plural_form: table.by_plural_form,
        span: def.span,
    }
}

fn build_scalar(decl: &Partitioned<'_>, diagnostics: &mut Vec<Diagnostic>) -> ScalarType {
    reject_instance_directives(decl, diagnostics);
    let properties = build_properties(decl, diagnostics);
    let (unit, use_unit_bias, span) = match decl.scalar {
        Some(def) => (def.unit.clone(), def.use_unit_bias, def.span),
        None => (None, false, decl.declaration_span()),
    };
    ScalarType {
        identity: decl.identity.clone(),
        unit,
        use_unit_bias,
        original: decl.specialization.map(|s| s.original.clone()),
        properties,
        span,
    }
}

fn build_vector(decl: &Partitioned<'_>, diagnostics: &mut Vec<Diagnostic>) -> VectorType {
    reject_instance_directives(decl, diagnostics);
    let properties = build_properties(decl, diagnostics);
    let (unit, scalar, dimension, span) = match decl.vector {
        Some(def) => (def.unit.clone(), def.scalar.clone(), def.dimension, def.span),
        // Dimension 0 marks "take the root's" on marker-less
        // specializations.
        None => (None, None, 0, decl.declaration_span()),
    };
    VectorType {
        identity: decl.identity.clone(),
        unit,
        scalar,
        dimension,
        original: decl.specialization.map(|s| s.original.clone()),
        properties,
        span,
    }
}

fn build_vector_group(decl: &Partitioned<'_>, diagnostics: &mut Vec<Diagnostic>) -> VectorGroupType {
    reject_instance_directives(decl, diagnostics);
    let properties = build_properties(decl, diagnostics);
    let (unit, scalar, span) = match decl.vector_group {
        Some(def) => (def.unit.clone(), def.scalar.clone(), def.span),
        None => (None, None, decl.declaration_span()),
    };
    VectorGroupType {
        identity: decl.identity.clone(),
        unit,
        scalar,
        original: decl.specialization.map(|s| s.original.clone()),
        properties,
        span,
    }
}

/// Assemble the declared properties of one quantity level.
fn build_properties(decl: &Partitioned<'_>, diagnostics: &mut Vec<Diagnostic>) -> QuantityProperties {
    let constants = dedup_constants(decl.identity, &decl.constants, diagnostics);
    let derivations = dedup_derivations(decl.identity, &decl.derivations, diagnostics);

    let (default_instance, bias_conversions) = match decl.scalar {
        Some(def) => (def.default_instance.clone(), def.bias_conversions),
        None => (None, None),
    };
    let spec = decl.specialization;
    QuantityProperties {
        operations: decl.operations.clone(),
        conversions: decl.conversions.clone(),
        constants,
        derivations,
        instance_lists: decl.instance_lists.clone(),
        default_instance: default_instance
            .or_else(|| spec.and_then(|s| s.default_instance.clone())),
        bias_conversions: bias_conversions.or_else(|| spec.and_then(|s| s.bias_conversions)),
        inherit: spec.map(|s| s.inherit).unwrap_or_else(InheritFlags::default),
    }
}

/// Key a unit's derivations by id, the single unnamed one under the
/// default key. Repeats are dropped with a hard error.
fn key_derivations(
    identity: &TypeIdentity,
    derivations: &[Derivation],
    diagnostics: &mut Vec<Diagnostic>,
) -> IndexMap<String, Derivation> {
    let mut keyed: IndexMap<String, Derivation> = IndexMap::new();
    for derivation in derivations {
        let key = derivation
            .id
            .clone()
            .unwrap_or_else(|| DEFAULT_DERIVATION_ID.to_string());
        if keyed.contains_key(&key) {
            let detail = match &derivation.id {
                Some(id) => format!("derivation id '{}' is already in use", id),
                None => "only one derivation may be left unnamed".to_string(),
            };
            diagnostics.push(Diagnostic::error(
                DiagnosticKind::DuplicateDerivationId,
                derivation.span,
                format!("on unit '{}': {}", identity, detail),
            ));
            continue;
        }
        keyed.insert(key, derivation.clone());
    }
    keyed
}

/// Drop quantity derivations whose effective id repeats.
fn dedup_derivations(
    identity: &TypeIdentity,
    derivations: &[Derivation],
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<Derivation> {
    let mut seen: IndexSet<&str> = IndexSet::new();
    let mut kept = Vec::with_capacity(derivations.len());
    for derivation in derivations {
        let key = derivation.id.as_deref().unwrap_or(DEFAULT_DERIVATION_ID);
        if !seen.insert(key) {
            diagnostics.push(Diagnostic::error(
                DiagnosticKind::DuplicateDerivationId,
                derivation.span,
                format!("on '{}': derivation id '{}' is already in use", identity, key),
            ));
            continue;
        }
        kept.push(derivation.clone());
    }
    kept
}

fn dedup_constants(
    identity: &TypeIdentity,
    constants: &[Constant],
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<Constant> {
    let mut seen: IndexSet<&str> = IndexSet::new();
    let mut kept = Vec::with_capacity(constants.len());
    for constant in constants {
        if !seen.insert(&constant.name) {
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::DuplicateConstantName,
                constant.span,
                format!(
                    "'{}' already defines a constant '{}'",
                    identity, constant.name
                ),
            ));
            continue;
        }
        kept.push(constant.clone());
    }
    kept
}

/// Quantity-level directives have no meaning on a unit type.
fn reject_quantity_directives(
    decl: &Partitioned<'_>,
    kind: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let spans = decl
        .operations
        .iter()
        .map(|d| ("operation", d.span))
        .chain(decl.conversions.iter().map(|d| ("conversion", d.span)))
        .chain(decl.constants.iter().map(|d| ("constant", d.span)))
        .chain(decl.instance_lists.iter().map(|d| ("instance list", d.span)));
    for (name, span) in spans {
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::DirectiveNotApplicable,
            span,
            format!("{} directive on {} type '{}'", name, kind, decl.identity),
        ));
    }
}

/// Instance directives have no meaning on a quantity type.
fn reject_instance_directives(decl: &Partitioned<'_>, diagnostics: &mut Vec<Diagnostic>) {
    for instance in &decl.instances {
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::DirectiveNotApplicable,
            instance.span,
            format!(
                "instance '{}' declared on '{}', which is not a unit type",
                instance.name, decl.identity
            ),
        ));
    }
}

/// Validate cross-type references against the closed registries.
///
/// Checks read the registries as inserted; failing types are removed only
/// after every check ran, so exclusion cannot cascade.
fn cross_check(population: &mut Population, diagnostics: &mut Vec<Diagnostic>) {
    let mut rejected: Vec<TypeIdentity> = Vec::new();

    for (identity, unit) in &population.units {
        match population.scalars.get(&unit.quantity) {
            None => {
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::TypeNotScalar,
                    unit.span,
                    format!(
                        "unit '{}' measures '{}', which is not a declared scalar",
                        identity, unit.quantity
                    ),
                ));
                rejected.push(identity.clone());
            }
            Some(scalar) if scalar.use_unit_bias => {
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::UnitQuantityBiased,
                    unit.span,
                    format!(
                        "unit '{}' measures '{}', but a unit's quantity must be unbiased",
                        identity, unit.quantity
                    ),
                ));
                rejected.push(identity.clone());
            }
            Some(_) => {}
        }
    }

    for (identity, scalar) in &population.scalars {
        match (&scalar.unit, scalar.original.is_some()) {
            (None, false) => {
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::MissingUnitReference,
                    scalar.span,
                    format!("root scalar '{}' declares no unit", identity),
                ));
                rejected.push(identity.clone());
            }
            (Some(unit), _) => match population.units.get(unit) {
                None => {
                    diagnostics.push(Diagnostic::new(
                        DiagnosticKind::TypeNotUnit,
                        scalar.span,
                        format!(
                            "scalar '{}' names unit '{}', which is not a declared unit",
                            identity, unit
                        ),
                    ));
                    rejected.push(identity.clone());
                }
                Some(unit_type) if scalar.use_unit_bias && !unit_type.bias_term => {
                    diagnostics.push(Diagnostic::new(
                        DiagnosticKind::ScalarBiasWithoutBiasedUnit,
                        scalar.span,
                        format!(
                            "scalar '{}' uses the bias of unit '{}', which has no bias term",
                            identity, unit
                        ),
                    ));
                    rejected.push(identity.clone());
                }
                Some(_) => {}
            },
            (None, true) => {}
        }
    }

    for (identity, member) in &population.vectors {
        let (unit, scalar) = match member {
            VectorMember::Vector(v) => (&v.unit, &v.scalar),
            VectorMember::Group(g) => (&g.unit, &g.scalar),
        };
        let span = match member {
            VectorMember::Vector(v) => v.span,
            VectorMember::Group(g) => g.span,
        };
        if member.original().is_none() && unit.is_none() && scalar.is_none() {
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::MissingUnitReference,
                span,
                format!("root {} '{}' declares neither unit nor scalar", member.declared_kind(), identity),
            ));
            rejected.push(identity.clone());
            continue;
        }
        if let Some(unit) = unit {
            if !population.units.contains_key(unit) {
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::TypeNotUnit,
                    span,
                    format!(
                        "{} '{}' names unit '{}', which is not a declared unit",
                        member.declared_kind(),
                        identity,
                        unit
                    ),
                ));
                rejected.push(identity.clone());
                continue;
            }
        }
        if let Some(scalar) = scalar {
            if !population.scalars.contains_key(scalar) {
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::TypeNotScalar,
                    span,
                    format!(
                        "{} '{}' names scalar '{}', which is not a declared scalar",
                        member.declared_kind(),
                        identity,
                        scalar
                    ),
                ));
                rejected.push(identity.clone());
            }
        }
    }

    for identity in rejected {
        population.units.shift_remove(&identity);
        population.scalars.shift_remove(&identity);
        population.vectors.shift_remove(&identity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrica_model::processed::InstanceDefForm;

    fn id(name: &str) -> TypeIdentity {
        TypeIdentity::new("Measures", name)
    }

    fn span() -> Span {
        Span::new(0, 0, 8, 1)
    }

    fn unit_decl(name: &str, quantity: &str, bias_term: bool) -> (TypeIdentity, Vec<ProcessedDirective>) {
        (
            id(name),
            vec![
                ProcessedDirective::Unit(UnitDef {
                    quantity: id(quantity),
                    bias_term,
                    span: span(),
                }),
                ProcessedDirective::Instance(InstanceDef {
                    name: "One".into(),
                    plural_form: "Ones".into(),
                    form: InstanceDefForm::Fixed { value: 1.0, bias: 0.0 },
                    span: span(),
                }),
            ],
        )
    }

    fn scalar_decl(name: &str, unit: &str) -> (TypeIdentity, Vec<ProcessedDirective>) {
        (
            id(name),
            vec![ProcessedDirective::Scalar(ScalarDef {
                unit: Some(id(unit)),
                use_unit_bias: false,
                default_instance: None,
                bias_conversions: None,
                span: span(),
            })],
        )
    }

    fn specialization_decl(name: &str, original: &str) -> (TypeIdentity, Vec<ProcessedDirective>) {
        (
            id(name),
            vec![ProcessedDirective::Specialization(SpecializationDef {
                original: id(original),
                inherit: InheritFlags::default(),
                default_instance: None,
                bias_conversions: None,
                span: span(),
            })],
        )
    }

    #[test]
    fn well_formed_declarations_all_land_in_registries() {
        let decls = vec![
            unit_decl("UnitOfLength", "Length", false),
            scalar_decl("Length", "UnitOfLength"),
            specialization_decl("Distance", "Length"),
        ];
        let mut diagnostics = Vec::new();
        let population = build_population(&decls, &mut diagnostics);
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
        assert!(population.units.contains_key(&id("UnitOfLength")));
        assert!(population.scalars.contains_key(&id("Length")));
        assert!(population.scalars.contains_key(&id("Distance")));
        assert_eq!(
            population.scalars[&id("Distance")].original,
            Some(id("Length"))
        );
    }

    #[test]
    fn first_definition_wins_and_duplicate_is_recorded() {
        let decls = vec![
            scalar_decl("Length", "UnitOfLength"),
            unit_decl("UnitOfLength", "Length", false),
            scalar_decl("Length", "UnitOfLength"),
        ];
        let mut diagnostics = Vec::new();
        let population = build_population(&decls, &mut diagnostics);
        assert_eq!(population.duplicates.len(), 1);
        assert_eq!(population.duplicates[0].identity, id("Length"));
        assert_eq!(population.duplicates[0].kept, DeclaredKind::Scalar);
        let redefined = diagnostics
            .iter()
            .find(|d| d.kind == DiagnosticKind::TypeAlreadyDefined)
            .expect("redefinition diagnosed");
        assert_eq!(redefined.notes, vec!["the first definition is kept"]);
        assert!(population.scalars.contains_key(&id("Length")));
    }

    #[test]
    fn cross_kind_redefinition_records_the_discarded_kind() {
        let decls = vec![
            unit_decl("UnitOfLength", "Length", false),
            scalar_decl("Length", "UnitOfLength"),
            (
                id("Length"),
                vec![ProcessedDirective::Unit(UnitDef {
                    quantity: id("Length"),
                    bias_term: false,
                    span: span(),
                })],
            ),
        ];
        let mut diagnostics = Vec::new();
        let population = build_population(&decls, &mut diagnostics);
        assert_eq!(population.duplicates.len(), 1);
        assert_eq!(population.duplicates[0].kept, DeclaredKind::Scalar);
        assert_eq!(population.duplicates[0].duplicate, DeclaredKind::Unit);
        assert!(population.scalars.contains_key(&id("Length")));
        assert!(!population.units.contains_key(&id("Length")));
    }

    #[test]
    fn specialization_chain_infers_kind_through_levels() {
        let decls = vec![
            unit_decl("UnitOfLength", "Length", false),
            scalar_decl("Length", "UnitOfLength"),
            specialization_decl("Distance", "Length"),
            specialization_decl("Altitude", "Distance"),
        ];
        let mut diagnostics = Vec::new();
        let population = build_population(&decls, &mut diagnostics);
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
        assert!(population.scalars.contains_key(&id("Altitude")));
    }

    #[test]
    fn dangling_specialization_is_excluded() {
        let decls = vec![specialization_decl("Distance", "Length")];
        let mut diagnostics = Vec::new();
        let population = build_population(&decls, &mut diagnostics);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].kind,
            DiagnosticKind::UnresolvedSpecialization
        );
        assert!(!population.contains(&id("Distance")));
    }

    #[test]
    fn cyclic_marker_less_specializations_are_excluded() {
        let decls = vec![
            specialization_decl("A", "B"),
            specialization_decl("B", "A"),
        ];
        let mut diagnostics = Vec::new();
        let population = build_population(&decls, &mut diagnostics);
        let cycle = diagnostics
            .iter()
            .find(|d| d.kind == DiagnosticKind::CyclicSpecialization)
            .expect("cycle diagnosed");
        assert_eq!(cycle.severity, crate::error::Severity::Warning);
        assert!(!population.contains(&id("A")));
        assert!(!population.contains(&id("B")));
    }

    #[test]
    fn unit_quantity_must_be_a_scalar() {
        let decls = vec![unit_decl("UnitOfLength", "Length", false)];
        let mut diagnostics = Vec::new();
        let population = build_population(&decls, &mut diagnostics);
        assert!(diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::TypeNotScalar));
        assert!(!population.units.contains_key(&id("UnitOfLength")));
    }

    #[test]
    fn scalar_unit_bias_requires_biased_unit() {
        let decls = vec![
            unit_decl("UnitOfTemperature", "Temperature", false),
            (
                id("Temperature"),
                vec![ProcessedDirective::Scalar(ScalarDef {
                    unit: Some(id("UnitOfTemperature")),
                    use_unit_bias: true,
                    default_instance: None,
                    bias_conversions: None,
                    span: span(),
                })],
            ),
        ];
        let mut diagnostics = Vec::new();
        let population = build_population(&decls, &mut diagnostics);
        assert!(diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::ScalarBiasWithoutBiasedUnit));
        assert!(!population.scalars.contains_key(&id("Temperature")));
        // The check runs against the closed registries, so the unit is
        // not dragged down with the scalar. Its quantity reference was
        // valid when the registries closed, but the quantity was biased.
        assert!(diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::UnitQuantityBiased));
    }

    #[test]
    fn biased_unit_with_biased_quantity_both_survive() {
        let decls = vec![
            unit_decl("UnitOfTemperature", "Temperature", true),
            (
                id("Temperature"),
                vec![ProcessedDirective::Scalar(ScalarDef {
                    unit: Some(id("UnitOfTemperature")),
                    use_unit_bias: false,
                    default_instance: None,
                    bias_conversions: None,
                    span: span(),
                })],
            ),
        ];
        let mut diagnostics = Vec::new();
        let population = build_population(&decls, &mut diagnostics);
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
        assert!(population.units.contains_key(&id("UnitOfTemperature")));
        assert!(population.scalars.contains_key(&id("Temperature")));
    }

    #[test]
    fn root_scalar_without_unit_is_excluded() {
        let decls = vec![(
            id("Length"),
            vec![ProcessedDirective::Scalar(ScalarDef {
                unit: None,
                use_unit_bias: false,
                default_instance: None,
                bias_conversions: None,
                span: span(),
            })],
        )];
        let mut diagnostics = Vec::new();
        let population = build_population(&decls, &mut diagnostics);
        assert!(diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::MissingUnitReference));
        assert!(population.scalars.is_empty());
    }

    #[test]
    fn vector_references_are_checked() {
        let decls = vec![
            unit_decl("UnitOfLength", "Length", false),
            scalar_decl("Length", "UnitOfLength"),
            (
                id("Displacement3"),
                vec![ProcessedDirective::Vector(VectorDef {
                    unit: Some(id("UnitOfLength")),
                    scalar: Some(id("Speed")),
                    dimension: 3,
                    span: span(),
                })],
            ),
        ];
        let mut diagnostics = Vec::new();
        let population = build_population(&decls, &mut diagnostics);
        assert!(diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::TypeNotScalar));
        assert!(!population.vectors.contains_key(&id("Displacement3")));
    }

    #[test]
    fn second_unnamed_unit_derivation_is_dropped_hard() {
        let derivation = |sig: Vec<TypeIdentity>| Derivation {
            id: None,
            signature: sig,
            expression: "{0} / {1}".into(),
            permutations: false,
            span: span(),
        };
        let decls = vec![
            (
                id("UnitOfSpeed"),
                vec![
                    ProcessedDirective::Unit(UnitDef {
                        quantity: id("Speed"),
                        bias_term: false,
                        span: span(),
                    }),
                    ProcessedDirective::Derivation(derivation(vec![
                        id("UnitOfLength"),
                        id("UnitOfTime"),
                    ])),
                    ProcessedDirective::Derivation(derivation(vec![
                        id("UnitOfTime"),
                        id("UnitOfLength"),
                    ])),
                ],
            ),
            scalar_decl("Speed", "UnitOfSpeed"),
        ];
        let mut diagnostics = Vec::new();
        let population = build_population(&decls, &mut diagnostics);
        let dup: Vec<_> = diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::DuplicateDerivationId)
            .collect();
        assert_eq!(dup.len(), 1);
        assert_eq!(dup[0].severity, crate::error::Severity::Error);
        let unit = &population.units[&id("UnitOfSpeed")];
        assert_eq!(unit.derivations.len(), 1);
        assert!(unit.derivations.contains_key(DEFAULT_DERIVATION_ID));
    }

    #[test]
    fn instance_on_scalar_is_not_applicable() {
        let decls = vec![
            unit_decl("UnitOfLength", "Length", false),
            (
                id("Length"),
                vec![
                    ProcessedDirective::Scalar(ScalarDef {
                        unit: Some(id("UnitOfLength")),
                        use_unit_bias: false,
                        default_instance: None,
                        bias_conversions: None,
                        span: span(),
                    }),
                    ProcessedDirective::Instance(InstanceDef {
                        name: "Metre".into(),
                        plural_form: "Metres".into(),
                        form: InstanceDefForm::Fixed { value: 1.0, bias: 0.0 },
                        span: span(),
                    }),
                ],
            ),
        ];
        let mut diagnostics = Vec::new();
        let population = build_population(&decls, &mut diagnostics);
        assert!(diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::DirectiveNotApplicable));
        // The scalar itself still resolves.
        assert!(population.scalars.contains_key(&id("Length")));
    }
}
