//! Specialization chain resolver.
//!
//! Turns one declared quantity plus its chain of original quantities into
//! a [`ResolvedQuantity`].
//!
//! The chain is collected leaf to root, then properties merge root to
//! leaf with an explicit per-category rule:
//!
//! - a level that explicitly defines a category replaces the inherited
//!   value outright, it never appends to it
//! - an inherit=false flag drops everything inherited for the category,
//!   whether or not the level defines its own value
//! - an unset category takes the ancestor's resolved value unchanged
//!
//! Instance include/exclude lists are the exception: they accumulate as
//! an ordered ancestor-to-leaf chain and are reduced by the
//! inclusion/exclusion evaluator at the end. The backing unit always
//! comes from the root of the chain.

use indexmap::IndexSet;
use metrica_model::foundation::{Span, TypeIdentity};
use metrica_model::population::{Population, VectorMember};
use metrica_model::quantity::{
    Constant, Conversion, DefaultInstance, Derivation, InstanceList, Operation,
    QuantityKind, QuantityProperties, ResolvedQuantity, UnitType,
};

use crate::error::{Diagnostic, DiagnosticKind};
use crate::resolve::inclusion::evaluate_instance_lists;

/// Resolve one quantity's specialization chain into its final record.
///
/// Returns `None` when the chain cannot be walked (a missing parent or a
/// cycle) or when the backing unit did not survive population checks; the
/// failure is diagnosed either way.
pub fn resolve_quantity(
    identity: &TypeIdentity,
    population: &Population,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<ResolvedQuantity> {
    let chain = collect_chain(identity, population, diagnostics)?;

    // chain is non-empty by construction; index 0 is the leaf
    let leaf = chain.first()?;
    let root = chain.last()?;
    let kind = resolved_kind(&chain, leaf.kind);

    let unit_identity = backing_unit(root, population).or_else(|| {
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::MissingUnitReference,
            root.span,
            format!(
                "quantity '{}' resolves to root '{}', which has no backing unit",
                identity, root.identity
            ),
        ));
        None
    })?;
    let Some(unit) = population.units.get(unit_identity) else {
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::TypeNotUnit,
            root.span,
            format!(
                "quantity '{}' is backed by '{}', which is not in the population",
                identity, unit_identity
            ),
        ));
        return None;
    };

    let mut merged = Merged::default();
    for level in chain.iter().rev() {
        merged.apply(level.properties);
    }

    let constants = validate_constants(identity, merged.constants, unit, diagnostics);
    let default_instance =
        validate_default_instance(identity, merged.default_instance, unit, diagnostics);
    let included_instances =
        evaluate_instance_lists(identity, &merged.instance_lists, unit, diagnostics);

    Some(ResolvedQuantity {
        identity: identity.clone(),
        kind,
        unit: unit_identity.clone(),
        operations: merged.operations,
        conversions: merged.conversions,
        constants,
        derivations: merged.derivations,
        default_instance,
        bias_conversions: merged.bias_conversions.unwrap_or(false),
        included_instances,
    })
}

/// One level of a specialization chain, kind-agnostic.
struct Level<'a> {
    identity: &'a TypeIdentity,
    kind: QuantityKind,
    original: Option<&'a TypeIdentity>,
    unit: Option<&'a TypeIdentity>,
    scalar: Option<&'a TypeIdentity>,
    properties: &'a QuantityProperties,
    span: Span,
}

fn level<'a>(population: &'a Population, identity: &TypeIdentity) -> Option<Level<'a>> {
    if let Some(scalar) = population.scalars.get(identity) {
        return Some(Level {
            identity: &scalar.identity,
            kind: QuantityKind::Scalar,
            original: scalar.original.as_ref(),
            unit: scalar.unit.as_ref(),
            scalar: None,
            properties: &scalar.properties,
            span: scalar.span,
        });
    }
    match population.vectors.get(identity)? {
        VectorMember::Vector(vector) => Some(Level {
            identity: &vector.identity,
            kind: QuantityKind::Vector {
                dimension: vector.dimension,
            },
            original: vector.original.as_ref(),
            unit: vector.unit.as_ref(),
            scalar: vector.scalar.as_ref(),
            properties: &vector.properties,
            span: vector.span,
        }),
        VectorMember::Group(group) => Some(Level {
            identity: &group.identity,
            kind: QuantityKind::VectorGroup,
            original: group.original.as_ref(),
            unit: group.unit.as_ref(),
            scalar: group.scalar.as_ref(),
            properties: &group.properties,
            span: group.span,
        }),
    }
}

/// Walk the original-quantity chain leaf to root.
fn collect_chain<'a>(
    identity: &TypeIdentity,
    population: &'a Population,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<Vec<Level<'a>>> {
    let mut chain: Vec<Level<'a>> = Vec::new();
    let mut visited: IndexSet<TypeIdentity> = IndexSet::new();
    let mut current = identity.clone();
    loop {
        if !visited.insert(current.clone()) {
            let span = chain.first().map(|l| l.span).unwrap_or_default();
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::CyclicSpecialization,
                span,
                format!("quantity '{}' transitively specializes itself", identity),
            ));
            return None;
        }
        let Some(lv) = level(population, &current) else {
            if let Some(last) = chain.last() {
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::UnresolvedSpecialization,
                    last.span,
                    format!(
                        "'{}' specializes '{}', which is not in the population",
                        last.identity, current
                    ),
                ));
            }
            return None;
        };
        let next = lv.original.cloned();
        chain.push(lv);
        match next {
            Some(original) => current = original,
            None => break,
        }
    }
    Some(chain)
}

/// The leaf's kind, with a vector's dimension taken from the nearest
/// level that states one.
fn resolved_kind(chain: &[Level<'_>], leaf_kind: QuantityKind) -> QuantityKind {
    match leaf_kind {
        QuantityKind::Vector { .. } => {
            let dimension = chain
                .iter()
                .find_map(|l| match l.kind {
                    QuantityKind::Vector { dimension } if dimension != 0 => Some(dimension),
                    _ => None,
                })
                .unwrap_or_default();
            QuantityKind::Vector { dimension }
        }
        other => other,
    }
}

/// The unit backing a chain root: its own, or its backing scalar's.
fn backing_unit<'a>(root: &Level<'a>, population: &'a Population) -> Option<&'a TypeIdentity> {
    if let Some(unit) = root.unit {
        return Some(unit);
    }
    let mut visited: IndexSet<TypeIdentity> = IndexSet::new();
    let mut current = root.scalar?.clone();
    loop {
        if !visited.insert(current.clone()) {
            return None;
        }
        let scalar = population.scalars.get(&current)?;
        if let Some(unit) = &scalar.unit {
            return Some(unit);
        }
        current = scalar.original.clone()?;
    }
}

#[derive(Default)]
struct Merged {
    operations: Vec<Operation>,
    conversions: Vec<Conversion>,
    constants: Vec<Constant>,
    derivations: Vec<Derivation>,
    instance_lists: Vec<InstanceList>,
    default_instance: Option<DefaultInstance>,
    bias_conversions: Option<bool>,
}

impl Merged {
    /// Fold one level's declared properties onto the accumulated state.
    fn apply(&mut self, props: &QuantityProperties) {
        merge_list(&mut self.operations, &props.operations, props.inherit.operations);
        merge_list(
            &mut self.conversions,
            &props.conversions,
            props.inherit.conversions,
        );
        merge_list(&mut self.constants, &props.constants, props.inherit.constants);
        merge_list(
            &mut self.derivations,
            &props.derivations,
            props.inherit.derivations,
        );

        // Instance lists chain instead of replacing; the evaluator
        // combines them per stacking mode.
        if props.inherit.instance_lists == Some(false) {
            self.instance_lists.clear();
        }
        self.instance_lists.extend(props.instance_lists.iter().cloned());

        if props.inherit.default_instance == Some(false) {
            self.default_instance = None;
        }
        if let Some(default) = &props.default_instance {
            self.default_instance = Some(default.clone());
        }

        if props.inherit.bias_conversions == Some(false) {
            self.bias_conversions = None;
        }
        if props.bias_conversions.is_some() {
            self.bias_conversions = props.bias_conversions;
        }
    }
}

fn merge_list<T: Clone>(accumulated: &mut Vec<T>, own: &[T], inherit: Option<bool>) {
    if inherit == Some(false) {
        accumulated.clear();
    }
    if !own.is_empty() {
        *accumulated = own.to_vec();
    }
}

/// Drop constants valued in instances the backing unit does not define.
fn validate_constants(
    quantity: &TypeIdentity,
    constants: Vec<Constant>,
    unit: &UnitType,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<Constant> {
    constants
        .into_iter()
        .filter(|constant| {
            if unit.instances_by_name.contains_key(&constant.unit_instance) {
                true
            } else {
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::UnrecognizedInstanceName,
                    constant.span,
                    format!(
                        "constant '{}' of '{}' is valued in instance '{}', which unit '{}' does not define",
                        constant.name, quantity, constant.unit_instance, unit.identity
                    ),
                ));
                false
            }
        })
        .collect()
}

/// Drop a default instance the backing unit does not define.
fn validate_default_instance(
    quantity: &TypeIdentity,
    default: Option<DefaultInstance>,
    unit: &UnitType,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<DefaultInstance> {
    let default = default?;
    if unit.instances_by_name.contains_key(&default.name) {
        Some(default)
    } else {
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::UnrecognizedInstanceName,
            unit.span,
            format!(
                "default instance '{}' of '{}' is not defined by unit '{}'",
                default.name, quantity, unit.identity
            ),
        ));
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use metrica_model::instance::{InstanceForm, Magnitude, UnitInstance};
    use metrica_model::quantity::{
        InheritFlags, InstanceListKind, OperatorKind, ScalarType, StackingMode,
    };

    fn id(name: &str) -> TypeIdentity {
        TypeIdentity::new("Measures", name)
    }

    fn unit_with(names: &[&str]) -> UnitType {
        let mut by_name = IndexMap::new();
        let mut by_plural = IndexMap::new();
        for name in names {
            by_name.insert(
                (*name).to_string(),
                UnitInstance {
                    name: (*name).to_string(),
                    plural_form: format!("{}s", name),
                    form: InstanceForm::Fixed { value: 1.0, bias: 0.0 },
                    magnitude: Some(Magnitude { scale: 1.0, bias: 0.0 }),
                },
            );
            by_plural.insert(format!("{}s", name), (*name).to_string());
        }
        UnitType {
            identity: id("UnitOfLength"),
            quantity: id("Length"),
            bias_term: false,
            derivations: IndexMap::new(),
            instances_by_name: by_name,
            instances_by_plural_form: by_plural,
            span: Span::default(),
        }
    }

    fn scalar(name: &str, unit: Option<&str>, original: Option<&str>) -> ScalarType {
        ScalarType {
            identity: id(name),
            unit: unit.map(id),
            use_unit_bias: false,
            original: original.map(id),
            properties: QuantityProperties::default(),
            span: Span::default(),
        }
    }

    fn operation(name: &str) -> Operation {
        Operation {
            name: Some(name.to_string()),
            operator: OperatorKind::Multiply,
            other: id("Scalar"),
            result: id("Length"),
            mirrored: false,
            span: Span::default(),
        }
    }

    fn population_with(scalars: Vec<ScalarType>) -> Population {
        let mut population = Population::default();
        population
            .units
            .insert(id("UnitOfLength"), unit_with(&["Metre", "Foot", "Yard"]));
        for s in scalars {
            population.scalars.insert(s.identity.clone(), s);
        }
        population
    }

    #[test]
    fn explicit_category_replaces_the_inherited_value() {
        let mut root = scalar("Length", Some("UnitOfLength"), None);
        root.properties.operations = vec![operation("multiply_root")];
        let mut child = scalar("Distance", None, Some("Length"));
        child.properties.operations = vec![operation("multiply_child")];
        let population = population_with(vec![root, child]);

        let mut diagnostics = Vec::new();
        let resolved = resolve_quantity(&id("Distance"), &population, &mut diagnostics)
            .expect("resolves");
        assert_eq!(resolved.operations.len(), 1);
        assert_eq!(resolved.operations[0].name.as_deref(), Some("multiply_child"));
    }

    #[test]
    fn unset_category_flows_through_unchanged() {
        let mut root = scalar("Length", Some("UnitOfLength"), None);
        root.properties.operations = vec![operation("multiply_root")];
        let child = scalar("Distance", None, Some("Length"));
        let population = population_with(vec![root, child]);

        let mut diagnostics = Vec::new();
        let resolved = resolve_quantity(&id("Distance"), &population, &mut diagnostics)
            .expect("resolves");
        assert_eq!(resolved.operations[0].name.as_deref(), Some("multiply_root"));
    }

    #[test]
    fn inherit_false_drops_the_category() {
        let mut root = scalar("Length", Some("UnitOfLength"), None);
        root.properties.operations = vec![operation("multiply_root")];
        let mut child = scalar("Distance", None, Some("Length"));
        child.properties.inherit = InheritFlags {
            operations: Some(false),
            ..InheritFlags::default()
        };
        let population = population_with(vec![root, child]);

        let mut diagnostics = Vec::new();
        let resolved = resolve_quantity(&id("Distance"), &population, &mut diagnostics)
            .expect("resolves");
        assert!(resolved.operations.is_empty());
    }

    #[test]
    fn backing_unit_comes_from_the_root() {
        let root = scalar("Length", Some("UnitOfLength"), None);
        let mid = scalar("Distance", None, Some("Length"));
        let leaf = scalar("Altitude", None, Some("Distance"));
        let population = population_with(vec![root, mid, leaf]);

        let mut diagnostics = Vec::new();
        let resolved = resolve_quantity(&id("Altitude"), &population, &mut diagnostics)
            .expect("resolves");
        assert_eq!(resolved.unit, id("UnitOfLength"));
        assert_eq!(resolved.kind, QuantityKind::Scalar);
    }

    #[test]
    fn cyclic_chain_fails_with_one_warning() {
        let a = scalar("A", None, Some("B"));
        let b = scalar("B", None, Some("A"));
        let population = population_with(vec![a, b]);

        let mut diagnostics = Vec::new();
        let resolved = resolve_quantity(&id("A"), &population, &mut diagnostics);
        assert!(resolved.is_none());
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::CyclicSpecialization);
        // The quantity is unresolvable, but severity stays at the engine
        // default; escalation is the host's call.
        assert_eq!(diagnostics[0].severity, crate::error::Severity::Warning);
    }

    #[test]
    fn missing_parent_fails_with_a_reference_diagnostic() {
        let child = scalar("Distance", None, Some("Length"));
        let population = population_with(vec![child]);

        let mut diagnostics = Vec::new();
        let resolved = resolve_quantity(&id("Distance"), &population, &mut diagnostics);
        assert!(resolved.is_none());
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].kind,
            DiagnosticKind::UnresolvedSpecialization
        );
    }

    #[test]
    fn instance_lists_chain_across_levels() {
        let mut root = scalar("Length", Some("UnitOfLength"), None);
        root.properties.instance_lists = vec![InstanceList {
            kind: InstanceListKind::Include,
            names: vec!["Metre".into(), "Foot".into()],
            stacking: StackingMode::Union,
            span: Span::default(),
        }];
        let mut child = scalar("Distance", None, Some("Length"));
        child.properties.instance_lists = vec![InstanceList {
            kind: InstanceListKind::Include,
            names: vec!["Metre".into(), "Yard".into()],
            stacking: StackingMode::Intersect,
            span: Span::default(),
        }];
        let population = population_with(vec![root, child]);

        let mut diagnostics = Vec::new();
        let resolved = resolve_quantity(&id("Distance"), &population, &mut diagnostics)
            .expect("resolves");
        assert_eq!(resolved.included_instances, vec!["Metre"]);
    }

    #[test]
    fn default_instance_inherits_and_overrides() {
        let mut root = scalar("Length", Some("UnitOfLength"), None);
        root.properties.default_instance = Some(DefaultInstance {
            name: "Metre".into(),
            symbol: Some("m".into()),
        });
        let child = scalar("Distance", None, Some("Length"));
        let mut overriding = scalar("Altitude", None, Some("Distance"));
        overriding.properties.default_instance = Some(DefaultInstance {
            name: "Foot".into(),
            symbol: Some("ft".into()),
        });
        let population = population_with(vec![root, child, overriding]);

        let mut diagnostics = Vec::new();
        let inherited = resolve_quantity(&id("Distance"), &population, &mut diagnostics)
            .expect("resolves");
        assert_eq!(inherited.default_instance.as_ref().map(|d| d.name.as_str()), Some("Metre"));
        let overridden = resolve_quantity(&id("Altitude"), &population, &mut diagnostics)
            .expect("resolves");
        assert_eq!(overridden.default_instance.as_ref().map(|d| d.name.as_str()), Some("Foot"));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn unknown_default_instance_is_dropped() {
        let mut root = scalar("Length", Some("UnitOfLength"), None);
        root.properties.default_instance = Some(DefaultInstance {
            name: "Cubit".into(),
            symbol: None,
        });
        let population = population_with(vec![root]);

        let mut diagnostics = Vec::new();
        let resolved = resolve_quantity(&id("Length"), &population, &mut diagnostics)
            .expect("resolves");
        assert!(resolved.default_instance.is_none());
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::UnrecognizedInstanceName);
    }

    #[test]
    fn constant_in_unknown_instance_is_dropped() {
        let mut root = scalar("Length", Some("UnitOfLength"), None);
        root.properties.constants = vec![Constant {
            name: "PlanckLength".into(),
            unit_instance: "Cubit".into(),
            value: 1.6e-35,
            multiples_name: None,
            span: Span::default(),
        }];
        let population = population_with(vec![root]);

        let mut diagnostics = Vec::new();
        let resolved = resolve_quantity(&id("Length"), &population, &mut diagnostics)
            .expect("resolves");
        assert!(resolved.constants.is_empty());
        assert_eq!(diagnostics[0].kind, DiagnosticKind::UnrecognizedInstanceName);
    }
}
