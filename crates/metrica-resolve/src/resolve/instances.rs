//! Unit instance graph builder.
//!
//! Assembles all instance-defining directives of one unit type into a
//! reference graph, resolves each instance's effective magnitude relative
//! to the fixed root(s), and detects cyclic dependencies.
//!
//! # What This Pass Does
//!
//! 1. **Collision detection** - instance names and plural forms share one
//!    reservation space per unit; a colliding instance is dropped, never
//!    silently overwritten
//! 2. **Bias validation** - biased instances are only legal on units that
//!    carry a bias term
//! 3. **Derivation binding** - derived instances resolve their derivation
//!    id against the owning unit's derivation table
//! 4. **Cycle detection** - explicit visiting-set DFS over the base-name
//!    graph; each cycle yields exactly one diagnostic and publishes no
//!    instance of the cycle
//! 5. **Magnitude resolution** - scale and bias relative to the fixed
//!    root, memoized along the dependency chain
//!
//! The reservation sets are threaded through an explicit fold over the
//! directive list, so validation order cannot leak into hidden state.

use indexmap::{IndexMap, IndexSet};
use metrica_model::foundation::TypeIdentity;
use metrica_model::instance::{InstanceForm, Magnitude, UnitInstance};
use metrica_model::processed::{InstanceDef, InstanceDefForm};
use metrica_model::quantity::{Derivation, DEFAULT_DERIVATION_ID};

use crate::error::{Diagnostic, DiagnosticKind};

/// Published instance tables of one unit type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstanceTable {
    /// Instances keyed by singular name, in declaration order.
    pub by_name: IndexMap<String, UnitInstance>,
    /// Plural form → singular name.
    pub by_plural_form: IndexMap<String, String>,
}

/// Build the instance tables of one unit type.
///
/// `derivations` is the unit's resolved derivation table, needed to bind
/// derived instances. Diagnostics for dropped instances are pushed onto
/// `diagnostics`; the returned table only holds instances that survived
/// every check.
pub fn build_instances(
    unit: &TypeIdentity,
    bias_term: bool,
    derivations: &IndexMap<String, Derivation>,
    defs: &[InstanceDef],
    diagnostics: &mut Vec<Diagnostic>,
) -> InstanceTable {
    let accepted = reserve_names(unit, defs, diagnostics);
    let accepted = validate_forms(unit, bias_term, derivations, accepted, diagnostics);

    // Dangling base references: an instance whose base name was never
    // accepted cannot resolve.
    let accepted = drop_dangling(unit, accepted, diagnostics);

    // Cycle detection over the remaining graph, where every base name
    // resolves to an accepted sibling.
    let cycle_members = detect_cycles(unit, &accepted, diagnostics);

    let defs_by_name: IndexMap<&str, &InstanceDef> =
        accepted.iter().map(|def| (def.name.as_str(), *def)).collect();

    let mut memo: IndexMap<String, Option<Magnitude>> = cycle_members
        .iter()
        .map(|name| (name.clone(), None))
        .collect();

    let mut table = InstanceTable::default();
    for def in &accepted {
        if cycle_members.contains(&def.name) {
            continue;
        }
        let magnitude = resolve_magnitude(&def.name, &defs_by_name, &mut memo);
        if magnitude.is_none() && !matches!(def.form, InstanceDefForm::Derived { .. }) {
            // Depends on an instance a cycle removed; the cycle already
            // carries the diagnostic.
            continue;
        }
        let form = resolved_form(&def.form, derivations);
        table.by_plural_form
            .insert(def.plural_form.clone(), def.name.clone());
        table.by_name.insert(
            def.name.clone(),
            UnitInstance {
                name: def.name.clone(),
                plural_form: def.plural_form.clone(),
                form,
                magnitude,
            },
        );
    }
    table
}

/// Collision pass: every name and plural form reserves both spaces.
fn reserve_names<'a>(
    unit: &TypeIdentity,
    defs: &'a [InstanceDef],
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<&'a InstanceDef> {
    let mut names: IndexSet<&str> = IndexSet::new();
    let mut plural_forms: IndexSet<&str> = IndexSet::new();
    let mut accepted = Vec::with_capacity(defs.len());

    for def in defs {
        if names.contains(def.name.as_str()) {
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::DuplicateUnitName,
                def.span,
                format!("unit '{}' already defines an instance '{}'", unit, def.name),
            ));
            continue;
        }
        if plural_forms.contains(def.name.as_str()) {
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::UnitNameReservedByUnitPluralForm,
                def.span,
                format!(
                    "instance name '{}' of unit '{}' is reserved by another instance's plural form",
                    def.name, unit
                ),
            ));
            continue;
        }
        if plural_forms.contains(def.plural_form.as_str()) {
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::DuplicateUnitPluralForm,
                def.span,
                format!(
                    "unit '{}' already defines a plural form '{}'",
                    unit, def.plural_form
                ),
            ));
            continue;
        }
        if names.contains(def.plural_form.as_str()) {
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::UnitPluralFormReservedByUnitName,
                def.span,
                format!(
                    "plural form '{}' of unit '{}' is reserved by another instance's name",
                    def.plural_form, unit
                ),
            ));
            continue;
        }
        names.insert(&def.name);
        plural_forms.insert(&def.plural_form);
        accepted.push(def);
    }
    accepted
}

/// Per-form checks: bias legality and derivation binding.
fn validate_forms<'a>(
    unit: &TypeIdentity,
    bias_term: bool,
    derivations: &IndexMap<String, Derivation>,
    defs: Vec<&'a InstanceDef>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<&'a InstanceDef> {
    defs.into_iter()
        .filter(|def| match &def.form {
            InstanceDefForm::Biased { .. } if !bias_term => {
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::BiasedUnitDefinedButUnitNotBiased,
                    def.span,
                    format!(
                        "biased instance '{}' declared on unit '{}', which has no bias term",
                        def.name, unit
                    ),
                ));
                false
            }
            InstanceDefForm::Derived {
                derivation,
                arguments,
            } => {
                let key = derivation.as_deref().unwrap_or(DEFAULT_DERIVATION_ID);
                match derivations.get(key) {
                    None => {
                        diagnostics.push(Diagnostic::new(
                            DiagnosticKind::UnrecognizedDerivationId,
                            def.span,
                            format!(
                                "derived instance '{}' references derivation '{}', which unit '{}' does not define",
                                def.name, key, unit
                            ),
                        ));
                        false
                    }
                    Some(resolved) if resolved.signature.len() != arguments.len() => {
                        diagnostics.push(Diagnostic::new(
                            DiagnosticKind::DerivationSignatureMismatch,
                            def.span,
                            format!(
                                "derived instance '{}' of unit '{}' supplies {} arguments for a signature of {}",
                                def.name,
                                unit,
                                arguments.len(),
                                resolved.signature.len()
                            ),
                        ));
                        false
                    }
                    Some(_) => true,
                }
            }
            _ => true,
        })
        .collect()
}

/// Drop instances whose base name resolves to nothing, transitively.
fn drop_dangling<'a>(
    unit: &TypeIdentity,
    mut defs: Vec<&'a InstanceDef>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<&'a InstanceDef> {
    loop {
        let names: IndexSet<&str> = defs.iter().map(|def| def.name.as_str()).collect();
        let (kept, dropped): (Vec<_>, Vec<_>) = defs.into_iter().partition(|def| {
            def.form
                .base()
                .map(|base| names.contains(base))
                .unwrap_or(true)
        });
        for def in &dropped {
            // base() is Some for everything partitioned out
            let base = def.form.base().unwrap_or_default();
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::UnrecognizedInstanceName,
                def.span,
                format!(
                    "instance '{}' of unit '{}' references unknown instance '{}'",
                    def.name, unit, base
                ),
            ));
        }
        defs = kept;
        if dropped.is_empty() {
            return defs;
        }
    }
}

/// Visiting-set DFS over the base-name graph.
///
/// Returns the set of all instances that sit on a cycle, reporting one
/// diagnostic per cycle.
fn detect_cycles(
    unit: &TypeIdentity,
    defs: &[&InstanceDef],
    diagnostics: &mut Vec<Diagnostic>,
) -> IndexSet<String> {
    let graph: IndexMap<&str, Option<&str>> = defs
        .iter()
        .map(|def| (def.name.as_str(), def.form.base()))
        .collect();

    let mut visited: IndexSet<&str> = IndexSet::new();
    let mut members: IndexSet<String> = IndexSet::new();

    for def in defs {
        if visited.contains(def.name.as_str()) {
            continue;
        }
        // Follow the single outgoing edge, keeping the path in order so
        // the cycle segment can be cut out when a node repeats.
        let mut path: Vec<&str> = Vec::new();
        let mut on_path: IndexSet<&str> = IndexSet::new();
        let mut current = def.name.as_str();
        loop {
            if on_path.contains(current) {
                let start = path.iter().position(|name| *name == current).unwrap_or(0);
                for name in &path[start..] {
                    members.insert((*name).to_string());
                }
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::CyclicInstanceDependency,
                    defs.iter()
                        .find(|d| d.name == current)
                        .map(|d| d.span)
                        .unwrap_or_default(),
                    format!(
                        "instance '{}' of unit '{}' depends on itself: {}",
                        current,
                        unit,
                        format_cycle(&path[start..], current)
                    ),
                ));
                break;
            }
            if visited.contains(current) {
                // Reached a chain already proven acyclic or already
                // reported; either way this path adds nothing new.
                break;
            }
            path.push(current);
            on_path.insert(current);
            match graph.get(current).copied().flatten() {
                Some(base) => current = base,
                None => break,
            }
        }
        for name in path {
            visited.insert(name);
        }
    }
    members
}

fn format_cycle(cycle: &[&str], closing: &str) -> String {
    let mut chain = cycle.join(" -> ");
    chain.push_str(" -> ");
    chain.push_str(closing);
    chain
}

/// Memoized magnitude resolution along the base chain.
fn resolve_magnitude(
    name: &str,
    defs_by_name: &IndexMap<&str, &InstanceDef>,
    memo: &mut IndexMap<String, Option<Magnitude>>,
) -> Option<Magnitude> {
    if let Some(known) = memo.get(name) {
        return *known;
    }
    let def = match defs_by_name.get(name) {
        Some(def) => *def,
        None => return None,
    };
    let magnitude = match &def.form {
        InstanceDefForm::Fixed { value, bias } => Some(Magnitude {
            scale: *value,
            bias: *bias,
        }),
        InstanceDefForm::Scaled { base, factor } => resolve_magnitude(base, defs_by_name, memo)
            .map(|m| Magnitude {
                scale: m.scale * factor,
                bias: m.bias,
            }),
        InstanceDefForm::Biased { base, offset } => resolve_magnitude(base, defs_by_name, memo)
            .map(|m| Magnitude {
                scale: m.scale,
                bias: m.bias + offset,
            }),
        InstanceDefForm::Prefixed { base, prefix } => resolve_magnitude(base, defs_by_name, memo)
            .map(|m| Magnitude {
                scale: m.scale * prefix.factor(),
                bias: m.bias,
            }),
        InstanceDefForm::Alias { base } => resolve_magnitude(base, defs_by_name, memo),
        InstanceDefForm::Derived { .. } => None,
    };
    memo.insert(name.to_string(), magnitude);
    magnitude
}

/// Convert a shape-checked form into its published counterpart, copying
/// the derivation's signature and expression into derived instances.
fn resolved_form(form: &InstanceDefForm, derivations: &IndexMap<String, Derivation>) -> InstanceForm {
    match form {
        InstanceDefForm::Fixed { value, bias } => InstanceForm::Fixed {
            value: *value,
            bias: *bias,
        },
        InstanceDefForm::Scaled { base, factor } => InstanceForm::Scaled {
            base: base.clone(),
            factor: *factor,
        },
        InstanceDefForm::Biased { base, offset } => InstanceForm::Biased {
            base: base.clone(),
            offset: *offset,
        },
        InstanceDefForm::Prefixed { base, prefix } => InstanceForm::Prefixed {
            base: base.clone(),
            prefix: *prefix,
        },
        InstanceDefForm::Alias { base } => InstanceForm::Alias { base: base.clone() },
        InstanceDefForm::Derived {
            derivation,
            arguments,
        } => {
            let key = derivation
                .as_deref()
                .unwrap_or(DEFAULT_DERIVATION_ID)
                .to_string();
            // validate_forms established the derivation exists
            let (signature, expression) = derivations
                .get(&key)
                .map(|d| (d.signature.clone(), d.expression.clone()))
                .unwrap_or_default();
            InstanceForm::Derived {
                derivation: key,
                arguments: arguments.clone(),
                signature,
                expression,
            }
        }
    }
}
