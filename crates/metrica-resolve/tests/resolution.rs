//! End-to-end resolution scenarios driven through the public pipeline.

use metrica_model::directive::{
    RawBiasedInstance, RawDerivation, RawFixedInstance, RawInstanceList, RawScaledInstance,
    RawScalar, RawSpecialization, RawUnit, RawDirective,
};
use metrica_model::foundation::{Span, TypeIdentity};
use metrica_model::quantity::StackingMode;
use metrica_resolve::{resolve, resolve_with_cancel, CancelToken, DiagnosticKind};

fn id(name: &str) -> TypeIdentity {
    TypeIdentity::new("Measures", name)
}

fn span() -> Span {
    Span::new(0, 0, 16, 1)
}

fn unit(quantity: &str, bias_term: bool) -> RawDirective {
    RawDirective::Unit(RawUnit {
        quantity: Some(id(quantity)),
        bias_term,
        span: span(),
    })
}

fn scalar(unit: &str) -> RawDirective {
    RawDirective::Scalar(RawScalar {
        unit: Some(id(unit)),
        use_unit_bias: false,
        default_instance_name: None,
        default_instance_symbol: None,
        bias_conversions: None,
        span: span(),
    })
}

fn specialization(original: &str) -> RawDirective {
    RawDirective::Specialization(RawSpecialization {
        original: Some(id(original)),
        inherit_operations: None,
        inherit_conversions: None,
        inherit_constants: None,
        inherit_derivations: None,
        inherit_instance_lists: None,
        inherit_default_instance: None,
        inherit_bias_conversions: None,
        default_instance_name: None,
        default_instance_symbol: None,
        bias_conversions: None,
        span: span(),
    })
}

fn fixed(name: &str, value: f64) -> RawDirective {
    RawDirective::FixedInstance(RawFixedInstance {
        name: Some(name.to_string()),
        plural_form: Some(format!("{}s", name)),
        value: Some(value),
        bias: None,
        span: span(),
    })
}

fn scaled(name: &str, base: &str, factor: f64) -> RawDirective {
    RawDirective::ScaledInstance(RawScaledInstance {
        name: Some(name.to_string()),
        plural_form: Some(format!("{}s", name)),
        base: Some(base.to_string()),
        factor: Some(factor),
        span: span(),
    })
}

fn include(names: &[&str], stacking: StackingMode) -> RawDirective {
    RawDirective::IncludeInstances(RawInstanceList {
        names: names.iter().map(|n| (*n).to_string()).collect(),
        stacking,
        span: span(),
    })
}

fn length_world() -> Vec<(TypeIdentity, Vec<RawDirective>)> {
    vec![
        (
            id("UnitOfLength"),
            vec![
                unit("Length", false),
                fixed("Metre", 1.0),
                scaled("Kilometre", "Metre", 1000.0),
                scaled("Foot", "Metre", 0.3048),
                scaled("Yard", "Metre", 0.9144),
            ],
        ),
        (id("Length"), vec![scalar("UnitOfLength")]),
    ]
}

#[test]
fn kilometre_resolves_to_a_thousand_metres() {
    let resolution = resolve(&length_world());
    assert!(resolution.diagnostics.is_empty(), "{:?}", resolution.diagnostics);
    let unit = &resolution.population.units[&id("UnitOfLength")];
    let km = unit.instances_by_name["Kilometre"]
        .magnitude
        .expect("resolved magnitude");
    assert_eq!(km.scale, 1000.0);
    assert_eq!(km.bias, 0.0);
}

#[test]
fn resolution_is_deterministic_byte_for_byte() {
    let mut declarations = length_world();
    declarations.push((
        id("Distance"),
        vec![
            specialization("Length"),
            include(&["Metre", "Kilometre"], StackingMode::Union),
        ],
    ));
    declarations.push((
        id("UnitOfTime"),
        vec![unit("Time", false), fixed("Second", 1.0)],
    ));
    declarations.push((id("Time"), vec![scalar("UnitOfTime")]));
    declarations.push((
        id("UnitOfSpeed"),
        vec![
            unit("Speed", false),
            RawDirective::Derivation(RawDerivation {
                id: None,
                signature: vec![id("UnitOfLength"), id("UnitOfTime")],
                expression: Some("{0} / {1}".into()),
                permutations: true,
                span: span(),
            }),
        ],
    ));
    declarations.push((id("Speed"), vec![scalar("UnitOfSpeed")]));

    let first = serde_json::to_vec(&resolve(&declarations)).expect("serializes");
    let second = serde_json::to_vec(&resolve(&declarations)).expect("serializes");
    assert_eq!(first, second);
}

#[test]
fn instance_cycle_is_reported_once_and_kept_out() {
    let declarations = vec![
        (
            id("UnitOfLength"),
            vec![
                unit("Length", false),
                fixed("Metre", 1.0),
                scaled("Chain", "Link", 100.0),
                scaled("Link", "Chain", 0.01),
            ],
        ),
        (id("Length"), vec![scalar("UnitOfLength")]),
    ];
    let resolution = resolve(&declarations);
    let cycles: Vec<_> = resolution
        .diagnostics
        .iter()
        .filter(|d| d.kind == DiagnosticKind::CyclicInstanceDependency)
        .collect();
    assert_eq!(cycles.len(), 1);
    let unit = &resolution.population.units[&id("UnitOfLength")];
    assert!(unit.instances_by_name.contains_key("Metre"));
    assert!(!unit.instances_by_name.contains_key("Chain"));
    assert!(!unit.instances_by_name.contains_key("Link"));
}

#[test]
fn biased_instance_on_unbiased_unit_is_rejected() {
    let declarations = vec![
        (
            id("UnitOfTemperature"),
            vec![
                unit("Temperature", false),
                fixed("Kelvin", 1.0),
                RawDirective::BiasedInstance(RawBiasedInstance {
                    name: Some("Celsius".into()),
                    plural_form: Some("DegreesCelsius".into()),
                    base: Some("Kelvin".into()),
                    offset: Some(-273.15),
                    span: span(),
                }),
            ],
        ),
        (id("Temperature"), vec![scalar("UnitOfTemperature")]),
    ];
    let resolution = resolve(&declarations);
    assert!(resolution
        .diagnostics
        .iter()
        .any(|d| d.kind == DiagnosticKind::BiasedUnitDefinedButUnitNotBiased));
    let unit = &resolution.population.units[&id("UnitOfTemperature")];
    assert!(!unit.instances_by_name.contains_key("Celsius"));
}

#[test]
fn include_lists_intersect_across_the_chain() {
    let mut declarations = length_world();
    declarations[1]
        .1
        .push(include(&["Metre", "Foot"], StackingMode::Union));
    declarations.push((
        id("Distance"),
        vec![
            specialization("Length"),
            include(&["Metre", "Yard"], StackingMode::Intersect),
        ],
    ));
    let resolution = resolve(&declarations);
    let distance = &resolution.quantities[&id("Distance")];
    assert_eq!(distance.included_instances, vec!["Metre"]);
}

#[test]
fn include_lists_union_across_the_chain() {
    let mut declarations = length_world();
    declarations[1]
        .1
        .push(include(&["Metre", "Foot"], StackingMode::Union));
    declarations.push((
        id("Distance"),
        vec![
            specialization("Length"),
            include(&["Metre", "Yard"], StackingMode::Union),
        ],
    ));
    let resolution = resolve(&declarations);
    let distance = &resolution.quantities[&id("Distance")];
    assert_eq!(distance.included_instances, vec!["Metre", "Foot", "Yard"]);
    assert!(resolution
        .diagnostics
        .iter()
        .any(|d| d.kind == DiagnosticKind::InstanceAlreadyIncluded));
}

#[test]
fn disabled_inheritance_clears_the_instance_lists() {
    let mut declarations = length_world();
    declarations[1]
        .1
        .push(include(&["Metre"], StackingMode::Union));
    declarations.push((
        id("Distance"),
        vec![RawDirective::Specialization(RawSpecialization {
            original: Some(id("Length")),
            inherit_operations: None,
            inherit_conversions: None,
            inherit_constants: None,
            inherit_derivations: None,
            inherit_instance_lists: Some(false),
            inherit_default_instance: None,
            inherit_bias_conversions: None,
            default_instance_name: None,
            default_instance_symbol: None,
            bias_conversions: None,
            span: span(),
        })],
    ));
    let resolution = resolve(&declarations);
    let length = &resolution.quantities[&id("Length")];
    assert_eq!(length.included_instances, vec!["Metre"]);
    // With the chain cleared, the full instance set applies again.
    let distance = &resolution.quantities[&id("Distance")];
    assert_eq!(
        distance.included_instances,
        vec!["Metre", "Kilometre", "Foot", "Yard"]
    );
}

#[test]
fn permuted_derivation_collapses_repeated_types() {
    let declarations = vec![
        (
            id("UnitOfLength"),
            vec![unit("Length", false), fixed("Metre", 1.0)],
        ),
        (id("Length"), vec![scalar("UnitOfLength")]),
        (
            id("UnitOfArea"),
            vec![
                unit("Area", false),
                RawDirective::Derivation(RawDerivation {
                    id: None,
                    signature: vec![id("UnitOfLength"), id("UnitOfLength")],
                    expression: Some("{0} * {1}".into()),
                    permutations: true,
                    span: span(),
                }),
            ],
        ),
        (id("Area"), vec![scalar("UnitOfArea")]),
    ];
    let resolution = resolve(&declarations);
    let expanded = &resolution.derivations[&id("UnitOfArea")]["default"];
    assert_eq!(expanded.len(), 1);
    assert_eq!(expanded[0].parameters, vec!["unitOfLength1", "unitOfLength2"]);
    assert_eq!(
        expanded[0].expression,
        "unitOfLength1.length.magnitude() * unitOfLength2.length.magnitude()"
    );
}

#[test]
fn permuted_derivation_of_distinct_types_expands_fully() {
    let declarations = vec![
        (
            id("UnitOfLength"),
            vec![unit("Length", false), fixed("Metre", 1.0)],
        ),
        (id("Length"), vec![scalar("UnitOfLength")]),
        (
            id("UnitOfTime"),
            vec![unit("Time", false), fixed("Second", 1.0)],
        ),
        (id("Time"), vec![scalar("UnitOfTime")]),
        (
            id("UnitOfSpeed"),
            vec![
                unit("Speed", false),
                RawDirective::Derivation(RawDerivation {
                    id: None,
                    signature: vec![id("UnitOfLength"), id("UnitOfTime")],
                    expression: Some("{0} / {1}".into()),
                    permutations: true,
                    span: span(),
                }),
            ],
        ),
        (id("Speed"), vec![scalar("UnitOfSpeed")]),
    ];
    let resolution = resolve(&declarations);
    let expanded = &resolution.derivations[&id("UnitOfSpeed")]["default"];
    assert_eq!(expanded.len(), 2);
}

#[test]
fn one_failed_type_does_not_abort_the_rest() {
    let mut declarations = length_world();
    // Scalar with a dangling unit reference.
    declarations.push((id("Mass"), vec![scalar("UnitOfMass")]));
    let resolution = resolve(&declarations);
    assert!(resolution
        .diagnostics
        .iter()
        .any(|d| d.kind == DiagnosticKind::TypeNotUnit));
    assert!(!resolution.population.scalars.contains_key(&id("Mass")));
    assert!(resolution.quantities.contains_key(&id("Length")));
}

#[test]
fn cancellation_yields_no_resolution() {
    let cancel = CancelToken::new();
    cancel.cancel();
    assert!(resolve_with_cancel(&length_world(), &cancel).is_none());
}
