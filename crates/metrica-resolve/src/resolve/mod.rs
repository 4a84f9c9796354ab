//! Resolution passes.
//!
//! Stage order is strict: directive processing feeds the population
//! resolver (which runs the unit-instance graph builder per unit); the
//! completed population feeds the specialization chain resolver and the
//! inclusion/exclusion evaluator; derivation expansion runs last, per
//! unit. Within a stage, work items are independent.

pub mod derivations;
pub mod directives;
pub mod inclusion;
pub mod instances;
pub mod pipeline;
pub mod population;
pub mod specialization;
