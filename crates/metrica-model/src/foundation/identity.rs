//! Namespace-qualified type identity.
//!
//! Every declared type (unit, scalar, vector, vector group) is keyed by a
//! [`TypeIdentity`] throughout resolution. Identities are immutable and
//! support cheap comparison and hashing, so they serve as the key of every
//! registry in the population.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Stable key identifying one declared type.
///
/// An identity is a namespace plus a type name, e.g. `Measures.Length`.
/// Two declarations with the same identity refer to the same type; whether
/// that is a redefinition is decided by the population resolver, not here.
///
/// Identities serialize as their qualified string, so maps keyed by them
/// stay valid JSON objects.
///
/// # Examples
///
/// ```
/// # use metrica_model::foundation::TypeIdentity;
/// let id = TypeIdentity::new("Measures", "Length");
/// assert_eq!(id.name(), "Length");
/// assert_eq!(id.to_string(), "Measures.Length");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeIdentity {
    namespace: String,
    name: String,
}

impl TypeIdentity {
    /// Create an identity from a namespace and a type name.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// The containing namespace.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The unqualified type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The fully qualified name, `namespace.Name`.
    ///
    /// An empty namespace yields the bare type name.
    pub fn qualified(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }
}

impl fmt::Display for TypeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}.{}", self.namespace, self.name)
        }
    }
}

impl Serialize for TypeIdentity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TypeIdentity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        // The type name never contains a dot; everything before the last
        // one is the namespace.
        Ok(match text.rfind('.') {
            Some(split) => Self::new(&text[..split], &text[split + 1..]),
            None => Self::new("", text),
        })
    }
}
