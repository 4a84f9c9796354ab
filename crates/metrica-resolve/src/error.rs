//! Structured diagnostics for the resolution engine.
//!
//! Every stage reports problems as [`Diagnostic`] records rather than
//! failing the pass: a malformed declaration is skipped, not a hard
//! failure. Diagnostics carry a kind, a severity, a source span, and a
//! rendered message; formatting against source text is the host's job.
//!
//! # Taxonomy
//!
//! Kinds group into five categories (see [`DiagnosticCategory`]):
//!
//! - **Shape** — a required field is null or empty at the single-directive
//!   level
//! - **Reference** — a name or type reference does not resolve against the
//!   population
//! - **Duplicate** — a name, plural form, or type identity is defined more
//!   than once where uniqueness is required
//! - **Cycle** — a dependency chain revisits a node
//! - **Conflict** — an otherwise valid reference violates a cross-type
//!   invariant
//!
//! `Internal` sits outside the taxonomy: it marks programming-contract
//! violations, not user input errors.

use std::fmt;

use metrica_model::foundation::Span;
use serde::{Deserialize, Serialize};

/// Category of a diagnostic kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticCategory {
    Shape,
    Reference,
    Duplicate,
    Cycle,
    Conflict,
    Internal,
}

/// Specific diagnostic code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticKind {
    // Shape
    /// A required name or plural form is null or empty; textual absence
    /// and textual emptiness are the same failure.
    EmptyName,
    /// A required field of a directive is missing.
    MissingField,
    /// An include/exclude list names no instances.
    EmptyItemList,
    /// A derivation has an empty parameter signature.
    EmptySignature,
    /// A declared vector dimension is outside the supported range.
    InvalidDimension,
    /// A derived instance's argument count does not match its
    /// derivation's signature.
    DerivationSignatureMismatch,
    /// A directive is attached to a type kind it does not apply to.
    DirectiveNotApplicable,

    // Reference
    /// A referenced type is not a declared unit.
    TypeNotUnit,
    /// A referenced type is not a declared scalar.
    TypeNotScalar,
    /// A referenced type is not a declared vector.
    TypeNotVector,
    /// A referenced type is not a declared vector group.
    TypeNotVectorGroup,
    /// A specialization names an original quantity that is not in the
    /// population.
    UnresolvedSpecialization,
    /// An instance name does not resolve against a unit's instance set.
    UnrecognizedInstanceName,
    /// A derived instance names a derivation id its unit does not define.
    UnrecognizedDerivationId,
    /// A root quantity declares no backing unit.
    MissingUnitReference,

    // Duplicate
    /// A type identity was defined more than once.
    TypeAlreadyDefined,
    /// An instance name collides with another instance's name.
    DuplicateUnitName,
    /// An instance plural form collides with another instance's plural
    /// form.
    DuplicateUnitPluralForm,
    /// An instance name collides with another instance's plural form.
    UnitNameReservedByUnitPluralForm,
    /// An instance plural form collides with another instance's name.
    UnitPluralFormReservedByUnitName,
    /// Two derivations of one unit share an id, or more than one is
    /// unnamed.
    DuplicateDerivationId,
    /// Two constants of one quantity share a name.
    DuplicateConstantName,

    // Cycle
    /// A unit-instance dependency chain revisits an instance.
    CyclicInstanceDependency,
    /// A type specializes itself transitively.
    CyclicSpecialization,

    // Conflict
    /// A biased instance was declared on a unit without a bias term.
    BiasedUnitDefinedButUnitNotBiased,
    /// A unit's associated quantity must be unbiased.
    UnitQuantityBiased,
    /// A scalar requests unit-bias behaviour from an unbiased unit.
    ScalarBiasWithoutBiasedUnit,

    // Inclusion/exclusion bookkeeping
    /// An included instance was already in the applicable set.
    InstanceAlreadyIncluded,
    /// An excluded instance was not in the applicable set.
    ExcludedInstanceNotIncluded,

    /// Internal contract violation (a bug in the engine or its caller).
    Internal,
}

impl DiagnosticKind {
    /// The taxonomy category of this kind.
    pub fn category(self) -> DiagnosticCategory {
        use DiagnosticKind::*;
        match self {
            EmptyName | MissingField | EmptyItemList | EmptySignature | InvalidDimension
            | DerivationSignatureMismatch | DirectiveNotApplicable => DiagnosticCategory::Shape,
            TypeNotUnit | TypeNotScalar | TypeNotVector | TypeNotVectorGroup
            | UnresolvedSpecialization | UnrecognizedInstanceName | UnrecognizedDerivationId
            | MissingUnitReference => DiagnosticCategory::Reference,
            TypeAlreadyDefined | DuplicateUnitName | DuplicateUnitPluralForm
            | UnitNameReservedByUnitPluralForm | UnitPluralFormReservedByUnitName
            | DuplicateDerivationId | DuplicateConstantName => DiagnosticCategory::Duplicate,
            CyclicInstanceDependency | CyclicSpecialization => DiagnosticCategory::Cycle,
            BiasedUnitDefinedButUnitNotBiased | UnitQuantityBiased
            | ScalarBiasWithoutBiasedUnit => DiagnosticCategory::Conflict,
            InstanceAlreadyIncluded | ExcludedInstanceNotIncluded => DiagnosticCategory::Conflict,
            Internal => DiagnosticCategory::Internal,
        }
    }

    /// Human-readable name of this kind.
    pub fn name(self) -> &'static str {
        use DiagnosticKind::*;
        match self {
            EmptyName => "empty name",
            MissingField => "missing field",
            EmptyItemList => "empty item list",
            EmptySignature => "empty signature",
            InvalidDimension => "invalid dimension",
            DerivationSignatureMismatch => "derivation signature mismatch",
            DirectiveNotApplicable => "directive not applicable",
            TypeNotUnit => "type not a unit",
            TypeNotScalar => "type not a scalar",
            TypeNotVector => "type not a vector",
            TypeNotVectorGroup => "type not a vector group",
            UnresolvedSpecialization => "unresolved specialization",
            UnrecognizedInstanceName => "unrecognized instance name",
            UnrecognizedDerivationId => "unrecognized derivation id",
            MissingUnitReference => "missing unit reference",
            TypeAlreadyDefined => "type already defined",
            DuplicateUnitName => "duplicate unit name",
            DuplicateUnitPluralForm => "duplicate unit plural form",
            UnitNameReservedByUnitPluralForm => "unit name reserved by unit plural form",
            UnitPluralFormReservedByUnitName => "unit plural form reserved by unit name",
            DuplicateDerivationId => "duplicate derivation id",
            DuplicateConstantName => "duplicate constant name",
            CyclicInstanceDependency => "cyclic instance dependency",
            CyclicSpecialization => "cyclic specialization",
            BiasedUnitDefinedButUnitNotBiased => "biased unit defined but unit not biased",
            UnitQuantityBiased => "unit quantity biased",
            ScalarBiasWithoutBiasedUnit => "scalar bias without biased unit",
            InstanceAlreadyIncluded => "instance already included",
            ExcludedInstanceNotIncluded => "excluded instance not included",
            Internal => "internal error",
        }
    }
}

/// Diagnostic severity level.
///
/// The engine degrades gracefully, so everything it reports defaults to
/// `Warning`; the host decides whether to escalate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Note,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Note => write!(f, "note"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// One diagnostic record in the output stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    pub span: Span,
    pub message: String,
    /// Additional context lines.
    pub notes: Vec<String>,
}

impl Diagnostic {
    /// Create a warning diagnostic, the default severity.
    pub fn new(kind: DiagnosticKind, span: Span, message: String) -> Self {
        Self {
            kind,
            severity: Severity::Warning,
            span,
            message,
            notes: Vec::new(),
        }
    }

    /// Create an error diagnostic, for failures the output cannot absorb.
    pub fn error(kind: DiagnosticKind, span: Span, message: String) -> Self {
        Self::new(kind, span, message).escalated(Severity::Error)
    }

    /// Attach a context note, chaining.
    pub fn with_note(mut self, note: String) -> Self {
        self.notes.push(note);
        self
    }

    /// Copy of this diagnostic at a different severity.
    pub fn escalated(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}: {}",
            self.severity,
            self.kind.name(),
            self.message
        )
    }
}

impl std::error::Error for Diagnostic {}
