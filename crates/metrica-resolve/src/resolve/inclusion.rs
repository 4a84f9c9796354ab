//! Inclusion/exclusion evaluator.
//!
//! Reduces a quantity's ordered chain of include/exclude lists to the
//! final set of applicable unit-instance names.
//!
//! The working set starts as the unit's full instance-name set. The first
//! include list switches it to the closed world of the listed names;
//! later include lists combine per their stacking mode, and exclude lists
//! remove names. The result always follows the unit's instance
//! declaration order, never the order names were listed in.

use indexmap::IndexSet;
use metrica_model::foundation::TypeIdentity;
use metrica_model::quantity::{InstanceList, InstanceListKind, StackingMode, UnitType};

use crate::error::{Diagnostic, DiagnosticKind};

/// Evaluate a quantity's instance lists against its backing unit.
///
/// `lists` is the resolved ancestor-to-leaf chain. Names that do not
/// resolve against the unit's instance set are diagnosed and skipped;
/// the evaluation continues with the remaining names.
pub fn evaluate_instance_lists(
    quantity: &TypeIdentity,
    lists: &[InstanceList],
    unit: &UnitType,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<String> {
    let universe: IndexSet<&str> = unit.instances_by_name.keys().map(String::as_str).collect();

    let mut working: IndexSet<&str> = universe.clone();
    let mut closed_world = false;

    for list in lists {
        let valid = validate_names(quantity, unit, list, &universe, diagnostics);
        match list.kind {
            InstanceListKind::Include if !closed_world => {
                working = valid;
                closed_world = true;
            }
            InstanceListKind::Include => match list.stacking {
                StackingMode::Union => {
                    for name in valid {
                        if !working.insert(name) {
                            diagnostics.push(Diagnostic::new(
                                DiagnosticKind::InstanceAlreadyIncluded,
                                list.span,
                                format!(
                                    "instance '{}' is already included for '{}'",
                                    name, quantity
                                ),
                            ));
                        }
                    }
                }
                StackingMode::Intersect => {
                    working.retain(|name| valid.contains(name));
                }
                StackingMode::Replace => {
                    working = valid;
                }
            },
            InstanceListKind::Exclude => {
                for name in valid {
                    if !working.shift_remove(name) {
                        diagnostics.push(Diagnostic::new(
                            DiagnosticKind::ExcludedInstanceNotIncluded,
                            list.span,
                            format!(
                                "instance '{}' is not included for '{}', nothing to exclude",
                                name, quantity
                            ),
                        ));
                    }
                }
            }
        }
    }

    universe
        .into_iter()
        .filter(|name| working.contains(name))
        .map(str::to_string)
        .collect()
}

/// Filter a list down to names the unit actually defines.
fn validate_names<'a>(
    quantity: &TypeIdentity,
    unit: &UnitType,
    list: &'a InstanceList,
    universe: &IndexSet<&str>,
    diagnostics: &mut Vec<Diagnostic>,
) -> IndexSet<&'a str> {
    let mut valid = IndexSet::with_capacity(list.names.len());
    for name in &list.names {
        if universe.contains(name.as_str()) {
            valid.insert(name.as_str());
        } else {
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::UnrecognizedInstanceName,
                list.span,
                format!(
                    "'{}' lists instance '{}', which unit '{}' does not define",
                    quantity, name, unit.identity
                ),
            ));
        }
    }
    valid
}
