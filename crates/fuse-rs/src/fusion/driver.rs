use std::collections::BTreeMap;

use thiserror::Error;

use crate::fusion::config::FuseConfig;
use crate::fusion::rewrite::{commit, plan_rewrite, CommitError, RejectReason};
use crate::graph::{GraphIndexError, MutableGraph, MutationError, NodeId};
use crate::pattern::{Match, PatternError, PatternMatcher, PatternTable};

/// Failures that abort a fusion pass.
#[derive(Debug, Error)]
pub enum FusionError {
    #[error("invalid pattern table: {0}")]
    Pattern(#[from] PatternError),
    /// Replaced nodes kept readers the boundary did not account for.
    #[error("internal consistency failure while fusing '{pattern}': {source}")]
    Internal {
        pattern: String,
        #[source]
        source: MutationError,
    },
    #[error("graph indices diverged after fusing '{pattern}': {source}")]
    Verification {
        pattern: String,
        #[source]
        source: GraphIndexError,
    },
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FusionStats {
    pub passes: usize,
    pub matches: usize,
    pub applied: usize,
    pub rejected: usize,
    pub rolled_back: usize,
    pub per_pattern: BTreeMap<String, usize>,
}

/// Result of committing one match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteOutcome {
    Applied(NodeId),
    Rejected(RejectReason),
    /// A mutation failed mid-commit; the graph was restored.
    RolledBack(MutationError),
}

/// Matches a pattern table against a graph and outlines every match into a
/// single composite node.
#[derive(Debug, Clone)]
pub struct FusionPass<'t> {
    table: &'t PatternTable,
    cfg: FuseConfig,
}

impl<'t> FusionPass<'t> {
    pub fn new(table: &'t PatternTable, cfg: FuseConfig) -> Self {
        Self { table, cfg }
    }

    pub fn config(&self) -> &FuseConfig {
        &self.cfg
    }

    /// Runs up to `max_passes` passes, stopping after the first pass that
    /// changes nothing.
    pub fn run(&self, graph: &mut MutableGraph) -> Result<FusionStats, FusionError> {
        let mut stats = FusionStats::default();
        if self.table.is_empty() {
            return Ok(stats);
        }

        let mut matcher = PatternMatcher::new(self.table, self.cfg.predicate_cache_capacity)
            .with_anchor_order(self.cfg.anchor_order);
        while stats.passes < self.cfg.max_passes && stats.applied < self.cfg.max_rewrites {
            stats.passes += 1;
            let applied_before = stats.applied;
            let matches = matcher.find_matches(graph);
            stats.matches += matches.len();

            for found in &matches {
                if stats.applied >= self.cfg.max_rewrites {
                    break;
                }
                match self.apply_match(graph, found)? {
                    RewriteOutcome::Applied(_) => {
                        stats.applied += 1;
                        if let Some(pattern) = self.table.get(found.pattern) {
                            *stats.per_pattern.entry(pattern.name().to_string()).or_default() += 1;
                        }
                    }
                    RewriteOutcome::Rejected(_) => stats.rejected += 1,
                    RewriteOutcome::RolledBack(_) => stats.rolled_back += 1,
                }
            }

            log::debug!(
                "fusion pass {}: {} matches, {} applied",
                stats.passes,
                matches.len(),
                stats.applied - applied_before
            );
            if stats.applied == applied_before {
                break;
            }
        }
        log::debug!(
            "fusion done: {} rewrites over {} passes ({} rejected, {} rolled back), cache hits {}",
            stats.applied,
            stats.passes,
            stats.rejected,
            stats.rolled_back,
            matcher.cache().hits()
        );
        Ok(stats)
    }

    /// Validates `found` against the current graph and commits it.
    pub fn apply_match(&self, graph: &mut MutableGraph, found: &Match) -> Result<RewriteOutcome, FusionError> {
        let Some(pattern) = self.table.get(found.pattern) else {
            return Ok(RewriteOutcome::Rejected(RejectReason::UnknownPattern));
        };
        let plan = match plan_rewrite(graph, pattern, found, &self.cfg) {
            Ok(plan) => plan,
            Err(reason) => {
                log::trace!("skipping '{}' match: {:?}", pattern.name(), reason);
                return Ok(RewriteOutcome::Rejected(reason));
            }
        };

        match commit(graph, pattern, &plan) {
            Ok(fused) => {
                log::debug!(
                    "fused {} node(s) into '{}' ({} inputs, {} outputs)",
                    plan.replaced.len(),
                    plan.name,
                    plan.boundary.inputs.len(),
                    plan.boundary.outputs.len()
                );
                if self.cfg.verify_after_rewrite {
                    graph.verify().map_err(|source| FusionError::Verification {
                        pattern: pattern.name().to_string(),
                        source,
                    })?;
                }
                Ok(RewriteOutcome::Applied(fused))
            }
            Err(CommitError::Mutation(err)) => {
                log::warn!("rolled back '{}' rewrite: {}", pattern.name(), err);
                Ok(RewriteOutcome::RolledBack(err))
            }
            Err(CommitError::RetainedFanout(source)) => Err(FusionError::Internal {
                pattern: pattern.name().to_string(),
                source,
            }),
        }
    }
}

/// Runs the built-in pattern library over `graph`.
pub fn fuse_with_default_patterns(graph: &mut MutableGraph, cfg: FuseConfig) -> Result<FusionStats, FusionError> {
    let table = PatternTable::default_table()?;
    FusionPass::new(&table, cfg).run(graph)
}
