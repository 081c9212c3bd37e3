//! Table-driven structural patterns and the matcher that embeds them in a graph.
//!
//! Patterns are authored as static data ([`PatternSpec`]), compiled once into
//! a [`PatternTable`] that resolves predicate names and indexes patterns by
//! anchor kind, then scanned by a [`PatternMatcher`].

mod cache;
pub use cache::*;

mod library;
pub use library::*;

mod matcher;
pub use matcher::*;

pub mod predicates;
pub use predicates::{NodePredicate, Predicate, PredicateId, PredicateRegistry};

mod template;
pub use template::*;
