//! Derivation expression expander.
//!
//! Expands one unit derivation into the concrete signatures the emitter
//! will generate: every signature element is mapped to its associated
//! quantity, parameter names are derived from the element type names, and
//! the positional expression template is instantiated with per-parameter
//! magnitude accessors.
//!
//! Expansion is best-effort by contract. A signature element whose unit
//! is not in the population, or a template slot with no matching
//! parameter, makes the affected output "not computable": it is skipped
//! without a diagnostic, since the population resolver already reported
//! whatever made the unit disappear.

use indexmap::{IndexMap, IndexSet};
use metrica_model::foundation::TypeIdentity;
use metrica_model::population::Population;
use metrica_model::quantity::Derivation;
use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;

/// One concrete signature of an expanded derivation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpandedDerivation {
    /// Ordered parameter unit types.
    pub signature: Vec<TypeIdentity>,
    /// Parameter names, one per signature slot.
    pub parameters: Vec<String>,
    /// Expression with magnitude accessors substituted into the template.
    pub expression: String,
}

/// One signature slot carried through permutation.
#[derive(Clone)]
struct Slot {
    unit: TypeIdentity,
    name: String,
    quantity: TypeIdentity,
}

/// Expand a unit derivation against the population.
///
/// With `permutations` set, every distinct ordering of the signature is
/// produced; orderings that repeat because the signature repeats a type
/// are collapsed. An empty result means the derivation was not
/// computable or was cancelled.
pub fn expand_unit_derivation(
    derivation: &Derivation,
    population: &Population,
    cancel: &CancelToken,
) -> Vec<ExpandedDerivation> {
    if cancel.is_cancelled() {
        return Vec::new();
    }

    let names = parameter_names(&derivation.signature);
    let mut slots = Vec::with_capacity(derivation.signature.len());
    for (unit, name) in derivation.signature.iter().zip(names) {
        let Some(unit_type) = population.units.get(unit) else {
            return Vec::new();
        };
        slots.push(Slot {
            unit: unit.clone(),
            name,
            quantity: unit_type.quantity.clone(),
        });
    }

    let orderings = if derivation.permutations {
        let mut work = slots;
        let mut out = Vec::new();
        permute(&mut work, 0, &mut out, cancel);
        dedup_orderings(out)
    } else {
        vec![slots]
    };

    let mut expanded = Vec::with_capacity(orderings.len());
    for ordering in orderings {
        if cancel.is_cancelled() {
            return Vec::new();
        }
        let accessors: Vec<String> = ordering
            .iter()
            .map(|slot| {
                format!(
                    "{}.{}.magnitude()",
                    slot.name,
                    lower_first(slot.quantity.name())
                )
            })
            .collect();
        let Some(expression) = substitute(&derivation.expression, &accessors) else {
            continue;
        };
        expanded.push(ExpandedDerivation {
            signature: ordering.iter().map(|slot| slot.unit.clone()).collect(),
            parameters: ordering.into_iter().map(|slot| slot.name).collect(),
            expression,
        });
    }
    expanded
}

/// Name each signature slot after its type, lower-cased first letter.
///
/// A type that occurs more than once numbers every occurrence from 1,
/// including the first, which is renamed retroactively as soon as a
/// second occurrence appears.
fn parameter_names(signature: &[TypeIdentity]) -> Vec<String> {
    let mut counts: IndexMap<String, usize> = IndexMap::new();
    let mut names: Vec<String> = Vec::with_capacity(signature.len());
    for element in signature {
        let base = lower_first(element.name());
        let count = counts.entry(base.clone()).or_insert(0);
        *count += 1;
        match *count {
            1 => names.push(base),
            2 => {
                if let Some(first) = names.iter_mut().find(|name| **name == base) {
                    first.push('1');
                }
                names.push(format!("{}2", base));
            }
            n => names.push(format!("{}{}", base, n)),
        }
    }
    names
}

/// All orderings by recursive in-place swap, names travelling with their
/// slots.
fn permute(slots: &mut Vec<Slot>, k: usize, out: &mut Vec<Vec<Slot>>, cancel: &CancelToken) {
    if cancel.is_cancelled() {
        return;
    }
    if k == slots.len() {
        out.push(slots.clone());
        return;
    }
    for i in k..slots.len() {
        slots.swap(k, i);
        permute(slots, k + 1, out, cancel);
        slots.swap(k, i);
    }
}

/// Collapse orderings whose unit sequences coincide, keeping the first.
fn dedup_orderings(orderings: Vec<Vec<Slot>>) -> Vec<Vec<Slot>> {
    let mut seen: IndexSet<Vec<TypeIdentity>> = IndexSet::new();
    orderings
        .into_iter()
        .filter(|ordering| {
            let key: Vec<TypeIdentity> = ordering.iter().map(|slot| slot.unit.clone()).collect();
            seen.insert(key)
        })
        .collect()
}

/// Instantiate a positional template, `{0}` through `{n-1}`.
///
/// `None` when the template is malformed or references a missing slot.
fn substitute(template: &str, accessors: &[String]) -> Option<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after.find('}')?;
        let index: usize = after[..close].trim().parse().ok()?;
        out.push_str(accessors.get(index)?);
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    Some(out)
}

fn lower_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
