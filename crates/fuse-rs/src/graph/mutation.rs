//! Fine-grained graph edits. Every call validates before touching the graph,
//! so a returned error always means nothing changed.

use std::collections::BTreeSet;

use crate::graph::error::{MutationError, MutationErrorKind, SelfReference, SwitchDependency};
use crate::graph::index::{NodeId, OutputPort};
use crate::graph::node::{GraphDef, NodeDef};
use crate::graph::ops;
use crate::graph::tensor_id::TensorId;
use crate::graph::view::{node_list_param, MutableGraph};

fn not_found(node: &str) -> MutationErrorKind {
    MutationErrorKind::NotFound {
        node: node.to_string(),
    }
}

fn check_regular(fanin: &TensorId) -> Result<(), MutationErrorKind> {
    check_valid(fanin)?;
    if fanin.is_control() {
        return Err(MutationErrorKind::NotRegularTensorId {
            fanin: fanin.to_string(),
        });
    }
    Ok(())
}

fn check_valid(fanin: &TensorId) -> Result<(), MutationErrorKind> {
    if !fanin.is_valid() {
        return Err(MutationErrorKind::InvalidTensorId {
            fanin: fanin.to_string(),
        });
    }
    Ok(())
}

impl MutableGraph {
    /// Inserts one node. Controlling inputs are deduplicated like at construction.
    pub fn add_node(&mut self, def: NodeDef) -> Result<NodeId, MutationError> {
        let params = format!("node_name='{}'", def.name);
        let ids = self.insert_batch("add_node", params, vec![def])?;
        Ok(ids[0])
    }

    /// Inserts a self-consistent set of nodes that may read existing nodes.
    pub fn add_subgraph(&mut self, subgraph: GraphDef) -> Result<Vec<NodeId>, MutationError> {
        let names: Vec<String> = subgraph.nodes.iter().map(|node| node.name.clone()).collect();
        let params = format!("subgraph={}", node_list_param(&names));
        if !subgraph.library.is_empty() {
            return Err(MutationError::new(
                "add_subgraph",
                params,
                MutationErrorKind::NonEmptyAuxiliaryLibrary,
            ));
        }
        self.insert_batch("add_subgraph", params, subgraph.nodes)
    }

    /// Deletes all named nodes or none of them. Unknown names are ignored.
    pub fn delete_nodes<I, S>(&mut self, names: I) -> Result<usize, MutationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let requested: Vec<String> = names.into_iter().map(|name| name.as_ref().to_string()).collect();
        let doomed: BTreeSet<NodeId> = requested.iter().filter_map(|name| self.node_id(name)).collect();

        let retained: Vec<String> = doomed
            .iter()
            .filter(|id| {
                self.fanouts
                    .get(**id)
                    .is_some_and(|fanouts| fanouts.consumers().any(|consumer| !doomed.contains(&consumer)))
            })
            .map(|id| self.name_of(*id).to_string())
            .collect();
        if !retained.is_empty() {
            return Err(MutationError::new(
                "delete_nodes",
                format!("nodes_to_delete={}", node_list_param(&requested)),
                MutationErrorKind::RetainedFanout { nodes: retained },
            ));
        }

        for id in &doomed {
            self.remove_node(*id);
        }
        Ok(doomed.len())
    }

    /// Appends a data input to `node`, dropping a control on the same producer
    /// when it became redundant.
    pub fn add_regular_fanin(&mut self, node: &str, fanin: &TensorId) -> Result<(), MutationError> {
        let fail = |kind| {
            MutationError::new(
                "add_regular_fanin",
                format!("node_name='{node}', fanin='{fanin}'"),
                kind,
            )
        };
        check_regular(fanin).map_err(fail)?;
        let id = self.node_id(node).ok_or_else(|| fail(not_found(node)))?;
        if fanin.node == node {
            return Err(fail(MutationErrorKind::SelfReference(
                SelfReference::AddRegularFanin(fanin.to_string()),
            )));
        }
        let producer = self
            .node_id(&fanin.node)
            .ok_or_else(|| fail(not_found(&fanin.node)))?;

        self.edit_fanins(id, |edited| {
            edited.regular.push(OutputPort::new(producer, fanin.index));
        });
        self.drop_redundant_control(id, producer);
        Ok(())
    }

    /// Removes the first occurrence of `fanin`; later inputs shift down one
    /// position. Returns `Ok(false)` when `node` does not read `fanin`.
    pub fn remove_regular_fanin(&mut self, node: &str, fanin: &TensorId) -> Result<bool, MutationError> {
        let fail = |kind| {
            MutationError::new(
                "remove_regular_fanin",
                format!("node_name='{node}', fanin='{fanin}'"),
                kind,
            )
        };
        check_regular(fanin).map_err(fail)?;
        let id = self.node_id(node).ok_or_else(|| fail(not_found(node)))?;
        if fanin.node == node {
            return Err(fail(MutationErrorKind::SelfReference(
                SelfReference::RemoveRegularFanin(fanin.to_string()),
            )));
        }
        let producer = self
            .node_id(&fanin.node)
            .ok_or_else(|| fail(not_found(&fanin.node)))?;

        let target = OutputPort::new(producer, fanin.index);
        let Some(position) = self.node(id).regular.iter().position(|input| *input == target) else {
            return Ok(false);
        };
        self.edit_fanins(id, |edited| {
            edited.regular.remove(position);
        });
        Ok(true)
    }

    pub fn remove_all_fanins(&mut self, node: &str, keep_controlling: bool) -> Result<(), MutationError> {
        let id = self.node_id(node).ok_or_else(|| {
            MutationError::new(
                "remove_all_fanins",
                format!("node_name='{node}', keep_controlling_fanins={keep_controlling}"),
                not_found(node),
            )
        })?;
        self.edit_fanins(id, |edited| {
            edited.regular.clear();
            if !keep_controlling {
                edited.controls.clear();
            }
        });
        Ok(())
    }

    /// Makes `node` wait for `fanin`'s producer.
    ///
    /// A branch construct is never depended on directly: the dependency goes
    /// through a pass-through reading the requested output port, reusing the
    /// earliest-inserted existing one or generating `ControlPin/<producer>_<port>`.
    pub fn add_controlling_fanin(&mut self, node: &str, fanin: &TensorId) -> Result<(), MutationError> {
        let fail = |kind| {
            MutationError::new(
                "add_controlling_fanin",
                format!("node_name='{node}', fanin='{fanin}'"),
                kind,
            )
        };
        check_valid(fanin).map_err(fail)?;
        let id = self.node_id(node).ok_or_else(|| fail(not_found(node)))?;
        let producer = self
            .node_id(&fanin.node)
            .ok_or_else(|| fail(not_found(&fanin.node)))?;
        if producer == id {
            return Err(fail(MutationErrorKind::SelfReference(
                SelfReference::AddControllingFanin(format!("^{}", fanin.node)),
            )));
        }

        if !ops::is_branch_construct(self.node(producer).op()) {
            self.add_control_edge(id, producer);
            return Ok(());
        }
        if fanin.is_control() {
            return Err(fail(MutationErrorKind::SwitchControlDependency(
                SwitchDependency::AddControllingFanin(fanin.to_string()),
            )));
        }

        let port = OutputPort::new(producer, fanin.index);
        let found = self.regular_fanouts(port).into_iter().map(|input| input.node).find(|consumer| {
            let candidate = self.node(*consumer);
            ops::is_pass_through(candidate.op()) && candidate.regular.len() == 1
        });
        let pin = match found {
            Some(pin) if pin == id => {
                return Err(fail(MutationErrorKind::SelfReference(
                    SelfReference::FoundControllingFanin(format!("^{node}")),
                )));
            }
            Some(pin) => pin,
            None => {
                let name = ops::control_pin_name(&fanin.node, fanin.index);
                if name == node {
                    return Err(fail(MutationErrorKind::SelfReference(
                        SelfReference::GeneratedControllingFanin(format!("^{name}")),
                    )));
                }
                if self.node_id(&name).is_some() {
                    return Err(fail(MutationErrorKind::DuplicateName { node: name }));
                }
                let branch = self.node(producer);
                let mut def = NodeDef::new(name, ops::PASS_THROUGH_OP)
                    .with_inputs([fanin.canonical()])
                    .with_device(branch.device());
                if let Some(dtype) = branch.attr("T") {
                    def = def.with_attr("T", dtype.clone());
                }
                log::trace!("generated pass-through '{}' for {}", def.name, fanin);
                self.insert_batch("add_controlling_fanin", String::new(), vec![def])?[0]
            }
        };
        self.add_control_edge(id, pin);
        Ok(())
    }

    /// Idempotent: returns `Ok(false)` when `node` has no control on `fanin_node`.
    pub fn remove_controlling_fanin(&mut self, node: &str, fanin_node: &str) -> Result<bool, MutationError> {
        let fail = |kind| {
            MutationError::new(
                "remove_controlling_fanin",
                format!("node_name='{node}', fanin_node_name='{fanin_node}'"),
                kind,
            )
        };
        let id = self.node_id(node).ok_or_else(|| fail(not_found(node)))?;
        if fanin_node == node {
            return Err(fail(MutationErrorKind::SelfReference(
                SelfReference::RemoveControllingFanin(format!("^{fanin_node}")),
            )));
        }
        let producer = self
            .node_id(fanin_node)
            .ok_or_else(|| fail(not_found(fanin_node)))?;
        Ok(self.remove_control_edge(id, producer))
    }

    /// Replaces every occurrence of `from` in `node`'s inputs with `to`.
    ///
    /// Regular to regular keeps positions. Regular to control drops the
    /// positions and appends the control; control to regular appends a data
    /// input. Returns `Ok(false)` when `from == to` or `node` does not read `from`.
    pub fn update_fanin(&mut self, node: &str, from: &TensorId, to: &TensorId) -> Result<bool, MutationError> {
        let fail = |kind| {
            MutationError::new(
                "update_fanin",
                format!("node_name='{node}', from_fanin='{from}', to_fanin='{to}'"),
                kind,
            )
        };
        check_valid(from).map_err(fail)?;
        check_valid(to).map_err(fail)?;
        let id = self.node_id(node).ok_or_else(|| fail(not_found(node)))?;
        let from_id = self
            .node_id(&from.node)
            .ok_or_else(|| fail(not_found(&from.node)))?;
        let to_id = self
            .node_id(&to.node)
            .ok_or_else(|| fail(not_found(&to.node)))?;
        if from == to {
            return Ok(false);
        }
        if from_id == id || to_id == id {
            return Err(fail(MutationErrorKind::SelfReference(SelfReference::UpdateFanin)));
        }
        if to.is_control() && ops::is_branch_construct(self.node(to_id).op()) {
            return Err(fail(MutationErrorKind::SwitchControlDependency(
                SwitchDependency::UpdateFanin(to.to_string()),
            )));
        }

        let to_port = OutputPort::new(to_id, to.index);
        if from.is_control() {
            if !self.remove_control_edge(id, from_id) {
                return Ok(false);
            }
            if to.is_control() {
                self.add_control_edge(id, to_id);
            } else {
                self.edit_fanins(id, |edited| edited.regular.push(to_port));
            }
        } else {
            let from_port = OutputPort::new(from_id, from.index);
            if !self.node(id).regular.contains(&from_port) {
                return Ok(false);
            }
            if to.is_control() {
                self.edit_fanins(id, |edited| edited.regular.retain(|input| *input != from_port));
                self.add_control_edge(id, to_id);
            } else {
                self.edit_fanins(id, |edited| {
                    for input in edited.regular.iter_mut().filter(|input| **input == from_port) {
                        *input = to_port;
                    }
                });
            }
        }
        if to.is_regular() {
            self.drop_redundant_control(id, to_id);
        }
        Ok(true)
    }

    /// Moves every consumer of `from_node` over to `to_node`, keeping output
    /// ports. `to_node`'s own inputs are left alone so no self loop appears.
    pub fn update_fanouts(&mut self, from_node: &str, to_node: &str) -> Result<(), MutationError> {
        let fail = |kind| {
            MutationError::new(
                "update_fanouts",
                format!("from_node_name='{from_node}', to_node_name='{to_node}'"),
                kind,
            )
        };
        let from_id = self
            .node_id(from_node)
            .ok_or_else(|| fail(not_found(from_node)))?;
        let to_id = self.node_id(to_node).ok_or_else(|| fail(not_found(to_node)))?;
        if from_id == to_id {
            return Ok(());
        }
        let Some(fanouts) = self.fanouts.get(from_id).cloned() else {
            return Ok(());
        };
        if !fanouts.controlled.is_empty() && ops::is_branch_construct(self.node(to_id).op()) {
            return Err(fail(MutationErrorKind::SwitchControlDependency(
                SwitchDependency::UpdateFanouts(to_node.to_string()),
            )));
        }

        let mut rewired = BTreeSet::new();
        for (port, consumers) in &fanouts.regular {
            for input in consumers.iter().filter(|input| input.node != to_id) {
                let position = input.port as usize;
                self.edit_fanins(input.node, |edited| {
                    edited.regular[position] = OutputPort::new(to_id, *port);
                });
                rewired.insert(input.node);
            }
        }
        for consumer in rewired {
            self.drop_redundant_control(consumer, to_id);
        }
        for consumer in fanouts.controlled.iter().filter(|consumer| **consumer != to_id) {
            self.remove_control_edge(*consumer, from_id);
            self.add_control_edge(*consumer, to_id);
        }
        Ok(())
    }

    fn add_control_edge(&mut self, id: NodeId, producer: NodeId) {
        let node = self.node(id);
        if node.controls.contains(&producer) || self.control_is_redundant(node, producer) {
            return;
        }
        self.edit_fanins(id, |edited| edited.controls.push(producer));
    }

    fn remove_control_edge(&mut self, id: NodeId, producer: NodeId) -> bool {
        let Some(position) = self.node(id).controls.iter().position(|control| *control == producer) else {
            return false;
        };
        self.edit_fanins(id, |edited| {
            edited.controls.remove(position);
        });
        true
    }

    fn drop_redundant_control(&mut self, id: NodeId, producer: NodeId) {
        let node = self.node(id);
        if node.controls.contains(&producer) && self.control_is_redundant(node, producer) {
            self.remove_control_edge(id, producer);
        }
    }
}
