use std::collections::HashSet;

use crate::fusion::boundary::{compute_boundary, Boundary};
use crate::fusion::config::FuseConfig;
use crate::graph::{AttrValue, MutableGraph, MutationError, NodeDef, NodeId, TensorId};
use crate::pattern::{Match, Pattern, SlotRef};

/// Why a match found earlier in the pass is no longer applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    UnknownPattern,
    /// A bound node is gone or the binding no longer holds.
    Stale,
    Cycle,
}

/// Everything needed to replace one match, computed without mutating.
#[derive(Debug, Clone)]
pub struct FusionPlan {
    pub name: String,
    pub op: String,
    pub device: String,
    pub replaced: Vec<NodeId>,
    pub boundary: Boundary,
}

#[derive(Debug)]
pub(crate) enum CommitError {
    /// Rolled back; the graph is as before the commit.
    Mutation(MutationError),
    /// The replaced nodes still had readers after rewiring.
    RetainedFanout(MutationError),
}

pub fn plan_rewrite(
    graph: &MutableGraph,
    pattern: &Pattern,
    found: &Match,
    cfg: &FuseConfig,
) -> Result<FusionPlan, RejectReason> {
    if !still_matches(graph, pattern, found) {
        return Err(RejectReason::Stale);
    }
    let replaced: Vec<NodeId> = found.replaced(pattern).collect();
    let members: HashSet<NodeId> = replaced.iter().copied().collect();
    if graph.would_create_cycle(&members) {
        return Err(RejectReason::Cycle);
    }

    let op = cfg.composite_op(pattern.name());
    Ok(FusionPlan {
        name: unique_name(graph, &op),
        device: graph.node(found.anchor()).device().to_string(),
        op,
        boundary: compute_boundary(graph, pattern, found),
        replaced,
    })
}

/// Re-checks a binding against the current graph. Predicates are not
/// re-evaluated: node attributes never change after insertion.
fn still_matches(graph: &MutableGraph, pattern: &Pattern, found: &Match) -> bool {
    if found.nodes.len() != pattern.len() || found.nodes.iter().any(|id| !graph.contains(*id)) {
        return false;
    }
    let members: HashSet<NodeId> = found.nodes.iter().copied().collect();
    pattern.templates().iter().zip(&found.nodes).all(|(template, id)| {
        let node = graph.node(*id);
        let arity = node.num_regular_fanins();
        if node.op() != template.op
            || arity < template.inputs.len()
            || (template.strict && arity != template.inputs.len())
        {
            return false;
        }
        template
            .inputs
            .iter()
            .zip(node.regular_fanins())
            .all(|(slot, input)| match slot {
                SlotRef::Template(target) => input.node == found.nodes[*target],
                SlotRef::External => !members.contains(&input.node),
            })
    })
}

fn unique_name(graph: &MutableGraph, base: &str) -> String {
    if graph.node_id(base).is_none() {
        return base.to_string();
    }
    (1..)
        .map(|suffix| format!("{base}_{suffix}"))
        .find(|candidate| graph.node_id(candidate).is_none())
        .unwrap_or_else(|| base.to_string())
}

/// Applies `plan` all-or-nothing: on any error every touched node is restored.
pub(crate) fn commit(graph: &mut MutableGraph, pattern: &Pattern, plan: &FusionPlan) -> Result<NodeId, CommitError> {
    let checkpoint = graph.checkpoint(plan.boundary.touched());
    let result = apply(graph, pattern, plan);
    if result.is_err() {
        graph.restore(checkpoint);
    }
    result
}

fn apply(graph: &mut MutableGraph, pattern: &Pattern, plan: &FusionPlan) -> Result<NodeId, CommitError> {
    let boundary = &plan.boundary;
    let replaced_names: Vec<String> = plan
        .replaced
        .iter()
        .map(|id| graph.name_of(*id).to_string())
        .collect();

    let inputs = boundary
        .inputs
        .iter()
        .map(|input| graph.tensor_id(*input).canonical())
        .chain(
            boundary
                .controls
                .iter()
                .map(|producer| format!("^{}", graph.name_of(*producer))),
        );
    let def = NodeDef::new(plan.name.clone(), plan.op.clone())
        .with_inputs(inputs.collect::<Vec<_>>())
        .with_device(plan.device.clone())
        .with_attr("pattern", AttrValue::Str(pattern.name().to_string()))
        .with_attr("fused_nodes", AttrValue::StrList(replaced_names.clone()));
    let fused = graph.add_node(def).map_err(CommitError::Mutation)?;

    for (consumer, old, output) in &boundary.consumers {
        let consumer = graph.name_of(*consumer).to_string();
        let from = graph.tensor_id(*old);
        let to = TensorId::new(plan.name.clone(), *output as i32);
        graph
            .update_fanin(&consumer, &from, &to)
            .map_err(CommitError::Mutation)?;
    }
    for (consumer, producer) in &boundary.controlled {
        let consumer = graph.name_of(*consumer).to_string();
        let from = TensorId::control(graph.name_of(*producer));
        graph
            .update_fanin(&consumer, &from, &TensorId::control(plan.name.clone()))
            .map_err(CommitError::Mutation)?;
    }

    graph
        .delete_nodes(&replaced_names)
        .map_err(CommitError::RetainedFanout)?;
    Ok(fused)
}
