//! Foundation types shared by every stage of the generator.

mod identity;
mod span;

pub use identity::TypeIdentity;
pub use span::Span;
