use serde::{Deserialize, Serialize};

use crate::env;
use crate::pattern::AnchorOrder;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FuseConfig {
    /// Prefix of the composite op kind; the pattern name follows it.
    pub fused_op_prefix: String,
    /// Entries kept by each matcher's predicate cache. Zero disables it.
    pub predicate_cache_capacity: usize,
    /// Order in which candidate anchors are visited. Defaults to
    /// [`AnchorOrder::ConsumersFirst`], not graph insertion order; set
    /// [`AnchorOrder::Insertion`] to visit anchors as they were added.
    pub anchor_order: AnchorOrder,
    /// Passes repeat while the previous one rewrote something.
    pub max_passes: usize,
    pub max_rewrites: usize,
    /// Rebuild and compare the graph indices after every committed rewrite.
    pub verify_after_rewrite: bool,
}

impl Default for FuseConfig {
    fn default() -> Self {
        Self {
            fused_op_prefix: String::from("_fused_op_"),
            predicate_cache_capacity: 4096,
            anchor_order: AnchorOrder::default(),
            max_passes: 1,
            max_rewrites: usize::MAX,
            verify_after_rewrite: false,
        }
    }
}

impl FuseConfig {
    pub fn from_json_str(src: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(src)
    }

    /// Applies `FUSE_RS_VERIFY` and `FUSE_RS_MAX_PASSES` when set.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(verify) = env::verify_override() {
            self.verify_after_rewrite = verify;
        }
        if let Some(passes) = env::max_passes_override() {
            self.max_passes = passes;
        }
        self
    }

    pub fn composite_op(&self, pattern: &str) -> String {
        format!("{}{}", self.fused_op_prefix, pattern)
    }
}
