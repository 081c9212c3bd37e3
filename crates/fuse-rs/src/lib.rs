pub mod fusion;
pub mod graph;
pub mod pattern;
mod env;

pub use fusion::{FuseConfig, FusionError, FusionPass, FusionStats};
pub use graph::{
    GraphDef, MutableGraph, MutationError, MutationErrorKind, NodeDef, NodeId, TensorId,
};
pub use pattern::{Match, PatternMatcher, PatternTable};
