use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::graph::{MutableGraph, NodeId};
use crate::pattern::cache::PredicateCache;
use crate::pattern::template::{NodeTemplate, Pattern, PatternTable, SlotRef};

/// Order in which candidate anchors are visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorOrder {
    /// Node insertion order.
    Insertion,
    /// Reverse topological order: a pattern anchored downstream claims its
    /// nodes before smaller patterns anchored at one of them.
    #[default]
    ConsumersFirst,
}

/// A complete binding of graph nodes to the template positions of one pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub pattern: usize,
    /// `nodes[k]` is bound to template position `k`; `nodes[0]` is the anchor.
    pub nodes: Vec<NodeId>,
}

impl Match {
    pub fn anchor(&self) -> NodeId {
        self.nodes[0]
    }

    /// Nodes the rewrite removes, in template order.
    pub fn replaced<'a>(&'a self, pattern: &'a Pattern) -> impl Iterator<Item = NodeId> + 'a {
        self.nodes
            .iter()
            .zip(pattern.templates())
            .filter(|(_, template)| template.include_in_replacement)
            .map(|(node, _)| *node)
    }
}

/// Scans a graph for non-overlapping embeddings of a [`PatternTable`].
#[derive(Debug)]
pub struct PatternMatcher<'t> {
    table: &'t PatternTable,
    cache: PredicateCache,
    order: AnchorOrder,
}

impl<'t> PatternMatcher<'t> {
    pub fn new(table: &'t PatternTable, cache_capacity: usize) -> Self {
        Self {
            table,
            cache: PredicateCache::new(cache_capacity),
            order: AnchorOrder::default(),
        }
    }

    pub fn with_anchor_order(mut self, order: AnchorOrder) -> Self {
        self.order = order;
        self
    }

    pub fn table(&self) -> &'t PatternTable {
        self.table
    }

    pub fn cache(&self) -> &PredicateCache {
        &self.cache
    }

    /// Greedy scan: each anchor tries its patterns in table order and keeps
    /// the first complete binding; bound nodes are unavailable afterwards.
    pub fn find_matches(&mut self, graph: &MutableGraph) -> Vec<Match> {
        let anchors = match self.order {
            AnchorOrder::Insertion => graph.node_ids().collect::<Vec<_>>(),
            AnchorOrder::ConsumersFirst => {
                let mut order = graph.topological_order();
                order.reverse();
                order
            }
        };

        let mut consumed = HashSet::new();
        let mut matches = Vec::new();
        for anchor in anchors {
            if consumed.contains(&anchor) {
                continue;
            }
            if let Some(found) = self.match_at(graph, anchor, &consumed) {
                log::trace!(
                    "matched '{}' at '{}'",
                    self.table.patterns()[found.pattern].name(),
                    graph.name_of(anchor)
                );
                consumed.extend(found.nodes.iter().copied());
                matches.push(found);
            }
        }
        matches
    }

    /// First pattern, in priority order, that binds completely at `anchor`.
    pub fn match_at(
        &mut self,
        graph: &MutableGraph,
        anchor: NodeId,
        consumed: &HashSet<NodeId>,
    ) -> Option<Match> {
        let op = graph.try_node(anchor)?.op();
        let table = self.table;
        table
            .candidates(op)
            .iter()
            .find_map(|index| self.match_pattern(graph, *index, anchor, consumed))
    }

    /// Binds pattern `index` with its anchor on `anchor`.
    pub fn match_pattern(
        &mut self,
        graph: &MutableGraph,
        index: usize,
        anchor: NodeId,
        consumed: &HashSet<NodeId>,
    ) -> Option<Match> {
        let table = self.table;
        let pattern = table.get(index)?;
        let mut state = MatchState::new(pattern);
        state.bind(pattern.template(0), 0, anchor, graph, consumed, &mut self.cache)?;

        // Slots only point at later positions, so every position is bound by
        // the time the walk reaches it.
        for position in 0..pattern.len() {
            let node = graph.node(state.bound[position]?);
            let template = pattern.template(position);
            for (slot, input) in template.inputs.iter().zip(node.regular_fanins()) {
                match slot {
                    SlotRef::Template(target) => {
                        state.bind(
                            pattern.template(*target),
                            *target,
                            input.node,
                            graph,
                            consumed,
                            &mut self.cache,
                        )?;
                    }
                    SlotRef::External => state.externals.push(input.node),
                }
            }
        }

        if state.externals.iter().any(|producer| state.used.contains(producer)) {
            log::trace!(
                "'{}' at '{}': external input is part of the match",
                pattern.name(),
                graph.name_of(anchor)
            );
            return None;
        }

        let nodes: Vec<NodeId> = state.bound.into_iter().collect::<Option<_>>()?;
        let found = Match {
            pattern: index,
            nodes,
        };
        let replaced: HashSet<NodeId> = found.replaced(pattern).collect();
        if graph.would_create_cycle(&replaced) {
            log::trace!(
                "'{}' at '{}': fusing would create a cycle",
                pattern.name(),
                graph.name_of(anchor)
            );
            return None;
        }
        Some(found)
    }
}

#[derive(Debug)]
struct MatchState {
    bound: Vec<Option<NodeId>>,
    used: HashSet<NodeId>,
    externals: Vec<NodeId>,
}

impl MatchState {
    fn new(pattern: &Pattern) -> Self {
        Self {
            bound: vec![None; pattern.len()],
            used: HashSet::with_capacity(pattern.len()),
            externals: Vec::new(),
        }
    }

    fn bind(
        &mut self,
        template: &NodeTemplate,
        position: usize,
        candidate: NodeId,
        graph: &MutableGraph,
        consumed: &HashSet<NodeId>,
        cache: &mut PredicateCache,
    ) -> Option<()> {
        if let Some(existing) = self.bound[position] {
            return (existing == candidate).then_some(());
        }
        if self.used.contains(&candidate) || consumed.contains(&candidate) {
            return None;
        }

        let node = graph.try_node(candidate)?;
        if node.op() != template.op {
            return None;
        }
        let arity = node.num_regular_fanins();
        let declared = template.inputs.len();
        if (template.strict && arity != declared) || arity < declared {
            return None;
        }
        if let Some(predicate) = &template.predicate {
            if !cache.evaluate(candidate, node, predicate) {
                return None;
            }
        }

        self.bound[position] = Some(candidate);
        self.used.insert(candidate);
        Some(())
    }
}
