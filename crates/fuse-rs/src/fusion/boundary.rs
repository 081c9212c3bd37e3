use std::collections::{HashMap, HashSet};

use crate::graph::{MutableGraph, NodeId, OutputPort};
use crate::pattern::{Match, Pattern, SlotRef};

/// Edges crossing the replaced set of one match.
///
/// Inputs: walk included templates in order and each node's data inputs in
/// order, keep the ones entering from outside the replaced set (external
/// slots, slots bound to excluded templates, unconstrained extra inputs read
/// from outside), reverse the list, drop repeats keeping the first.
///
/// Outputs: output 0 is the anchor's port 0, then every other port of a
/// replaced node (template order, ascending port) read from outside.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Boundary {
    /// Composite input `k` reads `inputs[k]`.
    pub inputs: Vec<OutputPort>,
    /// Outside producers of control dependencies on replaced nodes.
    pub controls: Vec<NodeId>,
    /// Composite output `k` replaces `outputs[k]`.
    pub outputs: Vec<OutputPort>,
    /// `(consumer, replaced port, composite output)` for every outside reader.
    pub consumers: Vec<(NodeId, OutputPort, usize)>,
    /// `(consumer, replaced node)` for every outside control dependency.
    pub controlled: Vec<(NodeId, NodeId)>,
}

impl Boundary {
    /// Outside nodes whose fanins change when the match is committed.
    pub fn touched(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.consumers
            .iter()
            .map(|(consumer, _, _)| *consumer)
            .chain(self.controlled.iter().map(|(consumer, _)| *consumer))
    }
}

pub fn compute_boundary(graph: &MutableGraph, pattern: &Pattern, found: &Match) -> Boundary {
    let replaced_order: Vec<NodeId> = found.replaced(pattern).collect();
    let replaced: HashSet<NodeId> = replaced_order.iter().copied().collect();
    let mut boundary = Boundary::default();

    let mut inbound = Vec::new();
    for (position, template) in pattern.templates().iter().enumerate() {
        if !template.include_in_replacement {
            continue;
        }
        let node = graph.node(found.nodes[position]);
        for (slot, input) in node.regular_fanins().iter().enumerate() {
            let internal = match template.inputs.get(slot) {
                Some(SlotRef::Template(target)) => pattern.template(*target).include_in_replacement,
                Some(SlotRef::External) => false,
                None => replaced.contains(&input.node),
            };
            if !internal {
                inbound.push(*input);
            }
        }
    }
    inbound.reverse();
    let mut seen = HashSet::new();
    inbound.retain(|input| seen.insert(*input));
    boundary.inputs = inbound;

    for id in &replaced_order {
        for producer in graph.node(*id).controlling_fanins() {
            if !replaced.contains(producer) && !boundary.controls.contains(producer) {
                boundary.controls.push(*producer);
            }
        }
    }

    let anchor = OutputPort::new(found.anchor(), 0);
    let mut output_index: HashMap<OutputPort, usize> = HashMap::from([(anchor, 0)]);
    boundary.outputs.push(anchor);
    for id in &replaced_order {
        for (port, input) in graph.output_fanouts(*id) {
            if replaced.contains(&input.node) {
                continue;
            }
            let next = boundary.outputs.len();
            let index = *output_index.entry(port).or_insert_with(|| next);
            if index == next {
                boundary.outputs.push(port);
            }
            if !boundary
                .consumers
                .iter()
                .any(|(consumer, old, _)| *consumer == input.node && *old == port)
            {
                boundary.consumers.push((input.node, port, index));
            }
        }
        for consumer in graph.controlled_fanouts(*id) {
            if !replaced.contains(&consumer) {
                boundary.controlled.push((consumer, *id));
            }
        }
    }
    boundary
}
