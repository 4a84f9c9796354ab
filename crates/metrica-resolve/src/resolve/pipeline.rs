//! Resolution pipeline.
//!
//! Runs the stages in their required order: directive processing, then
//! the population (with per-unit instance graphs), then per-quantity
//! specialization resolution with inclusion evaluation, then per-unit
//! derivation expansion.
//!
//! Stages parallelize over their independent work items with rayon, but
//! every collect is order-preserving, so the diagnostics stream and all
//! registries come out identical from run to run. Cancellation is
//! cooperative: the token is checked between stages and inside
//! permutation expansion, and a cancelled pass yields no result at all
//! rather than a partial one.

use indexmap::IndexMap;
use metrica_model::directive::RawDirective;
use metrica_model::foundation::TypeIdentity;
use metrica_model::population::Population;
use metrica_model::processed::ProcessedDirective;
use metrica_model::quantity::ResolvedQuantity;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cancel::CancelToken;
use crate::error::Diagnostic;
use crate::resolve::derivations::{expand_unit_derivation, ExpandedDerivation};
use crate::resolve::directives::process_directive;
use crate::resolve::population::build_population;
use crate::resolve::specialization::resolve_quantity;

/// Everything one resolution pass produces.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    /// The cross-referenced type registries.
    pub population: Population,
    /// Resolved quantities in registry order, scalars before vectors.
    pub quantities: IndexMap<TypeIdentity, ResolvedQuantity>,
    /// Expanded derivations per unit, keyed by derivation id.
    pub derivations: IndexMap<TypeIdentity, IndexMap<String, Vec<ExpandedDerivation>>>,
    /// Ordered diagnostics stream, in stage and declaration order.
    pub diagnostics: Vec<Diagnostic>,
}

/// Resolve a set of declarations to completion.
pub fn resolve(declarations: &[(TypeIdentity, Vec<RawDirective>)]) -> Resolution {
    match resolve_with_cancel(declarations, &CancelToken::new()) {
        Some(resolution) => resolution,
        // A fresh token is never cancelled.
        None => unreachable!("resolution cancelled without a cancellation request"),
    }
}

/// Resolve with cooperative cancellation.
///
/// Returns `None` once the token is observed cancelled; no partial
/// resolution escapes.
pub fn resolve_with_cancel(
    declarations: &[(TypeIdentity, Vec<RawDirective>)],
    cancel: &CancelToken,
) -> Option<Resolution> {
    let mut diagnostics: Vec<Diagnostic> = Vec::new();

    if cancel.is_cancelled() {
        return None;
    }
    let processed = process_declarations(declarations, &mut diagnostics);
    debug!(
        types = processed.len(),
        diagnostics = diagnostics.len(),
        "directives processed"
    );

    if cancel.is_cancelled() {
        return None;
    }
    let population = build_population(&processed, &mut diagnostics);
    debug!(
        units = population.units.len(),
        scalars = population.scalars.len(),
        vectors = population.vectors.len(),
        duplicates = population.duplicates.len(),
        "population built"
    );

    if cancel.is_cancelled() {
        return None;
    }
    let quantities = resolve_quantities(&population, &mut diagnostics);
    debug!(resolved = quantities.len(), "specialization chains resolved");

    if cancel.is_cancelled() {
        return None;
    }
    let derivations = expand_derivations(&population, cancel);
    if cancel.is_cancelled() {
        return None;
    }
    debug!(units = derivations.len(), "derivations expanded");

    Some(Resolution {
        population,
        quantities,
        derivations,
        diagnostics,
    })
}

/// Shape-check every declaration's directives, order preserved.
fn process_declarations(
    declarations: &[(TypeIdentity, Vec<RawDirective>)],
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<(TypeIdentity, Vec<ProcessedDirective>)> {
    let results: Vec<(TypeIdentity, Vec<ProcessedDirective>, Vec<Diagnostic>)> = declarations
        .par_iter()
        .map(|(identity, raws)| {
            let mut local = Vec::new();
            let mut kept = Vec::with_capacity(raws.len());
            for raw in raws {
                match process_directive(identity, raw) {
                    Ok(directive) => kept.push(directive),
                    Err(diagnostic) => local.push(diagnostic),
                }
            }
            (identity.clone(), kept, local)
        })
        .collect();

    results
        .into_iter()
        .map(|(identity, kept, local)| {
            diagnostics.extend(local);
            (identity, kept)
        })
        .collect()
}

/// Resolve every quantity in registry order, scalars before vectors.
fn resolve_quantities(
    population: &Population,
    diagnostics: &mut Vec<Diagnostic>,
) -> IndexMap<TypeIdentity, ResolvedQuantity> {
    let identities: Vec<&TypeIdentity> = population
        .scalars
        .keys()
        .chain(population.vectors.keys())
        .collect();

    let results: Vec<(Option<ResolvedQuantity>, Vec<Diagnostic>)> = identities
        .par_iter()
        .map(|&identity| {
            let mut local = Vec::new();
            let resolved = resolve_quantity(identity, population, &mut local);
            (resolved, local)
        })
        .collect();

    let mut quantities = IndexMap::with_capacity(results.len());
    for (resolved, local) in results {
        diagnostics.extend(local);
        if let Some(quantity) = resolved {
            quantities.insert(quantity.identity.clone(), quantity);
        }
    }
    quantities
}

/// Expand every unit's derivations, keyed by unit then derivation id.
fn expand_derivations(
    population: &Population,
    cancel: &CancelToken,
) -> IndexMap<TypeIdentity, IndexMap<String, Vec<ExpandedDerivation>>> {
    population
        .units
        .par_iter()
        .filter(|(_, unit)| !unit.derivations.is_empty())
        .map(|(identity, unit)| {
            let expanded: IndexMap<String, Vec<ExpandedDerivation>> = unit
                .derivations
                .iter()
                .map(|(id, derivation)| {
                    (id.clone(), expand_unit_derivation(derivation, population, cancel))
                })
                .collect();
            (identity.clone(), expanded)
        })
        .collect::<Vec<_>>()
        .into_iter()
        .collect()
}
