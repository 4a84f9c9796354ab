// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Resolution and derivation engine for the metrica generator
//!
//! This crate turns a collection of declarative type descriptions (raw
//! directives attached to type identities) into a single consistent,
//! cross-referenced [`metrica_model::Population`] plus per-type resolved
//! records, from which output code can later be emitted.
//!
//! The pass is a pure, deterministic batch transform: given the same
//! directives it always produces the same population and the same ordered
//! diagnostics.

pub mod cancel;
pub mod error;
pub mod resolve;

pub use cancel::CancelToken;
pub use error::{Diagnostic, DiagnosticCategory, DiagnosticKind, Severity};
pub use resolve::derivations::ExpandedDerivation;
pub use resolve::pipeline::{resolve, resolve_with_cancel, Resolution};
