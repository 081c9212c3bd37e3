//! Outlining of pattern matches into composite nodes.

pub mod boundary;
pub mod config;
pub mod driver;
pub mod rewrite;

pub use boundary::{compute_boundary, Boundary};
pub use config::FuseConfig;
pub use driver::{fuse_with_default_patterns, FusionError, FusionPass, FusionStats, RewriteOutcome};
pub use rewrite::{plan_rewrite, FusionPlan, RejectReason};
