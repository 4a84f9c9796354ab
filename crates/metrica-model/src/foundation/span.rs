//! Source location tracking for diagnostics.
//!
//! Directives arrive from an external declaration-extraction front end that
//! attaches a [`Span`] to each payload. The resolution engine only threads
//! spans through to diagnostics; rendering them against source text is the
//! host's concern.

use serde::{Deserialize, Serialize};

/// Compact source location reference.
///
/// Points to a byte range in a source file with a cached line number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    /// Index of the source file, assigned by the front end.
    pub file_id: u16,
    /// Byte offset of the start position.
    pub start: u32,
    /// Byte offset of the end position (exclusive).
    pub end: u32,
    /// Cached 1-based line number of the start position.
    pub start_line: u16,
}

impl Span {
    /// Create a new span.
    pub fn new(file_id: u16, start: u32, end: u32, start_line: u16) -> Self {
        Self {
            file_id,
            start,
            end,
            start_line,
        }
    }

    /// A zero-length span at the start of a file.
    pub fn zero(file_id: u16) -> Self {
        Self::new(file_id, 0, 0, 1)
    }

    /// Whether this span covers no bytes.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

impl Default for Span {
    fn default() -> Self {
        Self::zero(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_span_is_empty() {
        assert!(Span::zero(3).is_empty());
    }
}
