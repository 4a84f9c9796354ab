//! The published population of resolved types.
//!
//! The population is built once per resolution pass and treated as
//! strictly read-only by every downstream stage. Registries are
//! `IndexMap`s keyed by [`TypeIdentity`] so iteration follows insertion
//! order and resolution stays deterministic.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::foundation::{Span, TypeIdentity};
use crate::quantity::{ScalarType, UnitType, VectorGroupType, VectorType};

/// Kind of a declared type, as recorded in the duplicates side-table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeclaredKind {
    Unit,
    Scalar,
    Vector,
    VectorGroup,
}

impl fmt::Display for DeclaredKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeclaredKind::Unit => "unit",
            DeclaredKind::Scalar => "scalar",
            DeclaredKind::Vector => "vector",
            DeclaredKind::VectorGroup => "vector group",
        };
        write!(f, "{}", name)
    }
}

/// Member of the vector registry: a vector or a vector group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VectorMember {
    Vector(VectorType),
    Group(VectorGroupType),
}

impl VectorMember {
    pub fn identity(&self) -> &TypeIdentity {
        match self {
            VectorMember::Vector(v) => &v.identity,
            VectorMember::Group(g) => &g.identity,
        }
    }

    /// Specialization parent of the member, if any.
    pub fn original(&self) -> Option<&TypeIdentity> {
        match self {
            VectorMember::Vector(v) => v.original.as_ref(),
            VectorMember::Group(g) => g.original.as_ref(),
        }
    }

    pub fn declared_kind(&self) -> DeclaredKind {
        match self {
            VectorMember::Vector(_) => DeclaredKind::Vector,
            VectorMember::Group(_) => DeclaredKind::VectorGroup,
        }
    }
}

/// A type identity that was defined more than once.
///
/// The first definition stays in the population; every later one is
/// recorded here and excluded, never merged or overwritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateIdentity {
    pub identity: TypeIdentity,
    /// Kind of the definition that was kept.
    pub kept: DeclaredKind,
    /// Kind of the definition that was discarded.
    pub duplicate: DeclaredKind,
    /// Location of the discarded definition.
    pub span: Span,
}

/// The complete, cross-referenced set of resolved types for one pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Population {
    pub units: IndexMap<TypeIdentity, UnitType>,
    pub scalars: IndexMap<TypeIdentity, ScalarType>,
    /// Vectors and vector groups share one registry; a `TypeIdentity`
    /// appears in at most one of the three registries.
    pub vectors: IndexMap<TypeIdentity, VectorMember>,
    /// Side-table of identities seen more than once.
    pub duplicates: Vec<DuplicateIdentity>,
}

impl Population {
    /// The registry (if any) that holds the given identity.
    pub fn declared_kind(&self, identity: &TypeIdentity) -> Option<DeclaredKind> {
        if self.units.contains_key(identity) {
            Some(DeclaredKind::Unit)
        } else if self.scalars.contains_key(identity) {
            Some(DeclaredKind::Scalar)
        } else {
            self.vectors.get(identity).map(VectorMember::declared_kind)
        }
    }

    /// Whether any registry holds the given identity.
    pub fn contains(&self, identity: &TypeIdentity) -> bool {
        self.declared_kind(identity).is_some()
    }
}
