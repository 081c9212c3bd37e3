use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap, HashSet};

use thiserror::Error;

use crate::graph::error::{bounded_names, MutationError, MutationErrorKind, SelfReference, SwitchDependency};
use crate::graph::index::{FanoutIndex, InputPort, NodeFanouts, NodeId, OutputPort};
use crate::graph::node::{FunctionDef, GraphDef, Node, NodeDef};
use crate::graph::ops;
use crate::graph::tensor_id::TensorId;

/// Raised by [`MutableGraph::verify`] when the incremental indices drifted.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphIndexError {
    #[error("fanout index of '{producer}' disagrees with the fanin lists")]
    FanoutMismatch { producer: String },
    #[error("node '{node}' reads from deleted node {producer:?}")]
    DanglingFanin { node: String, producer: NodeId },
    #[error("name index disagrees with node '{node}'")]
    NameMismatch { node: String },
    #[error("node '{node}' depends on itself")]
    SelfLoop { node: String },
    #[error("node '{node}' carries a duplicate control dependency on '{producer}'")]
    DuplicateControl { node: String, producer: String },
    #[error("node '{node}' has a control dependency on branch construct '{producer}'")]
    BranchControl { node: String, producer: String },
}

/// Snapshot of selected nodes' fanins, used to roll back a multi-step edit.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    watermark: u32,
    saved: Vec<(NodeId, Node)>,
}

/// Data-flow graph with name lookup and fanin/fanout indices that are kept
/// exact inverses of each other by every mutating call.
#[derive(Debug, Clone, Default)]
pub struct MutableGraph {
    nodes: Vec<Option<Node>>,
    ids: HashMap<String, NodeId>,
    pub(crate) fanouts: FanoutIndex,
    library: Vec<FunctionDef>,
    live: usize,
}

impl MutableGraph {
    /// Builds the graph and its indices. Inputs may reference nodes declared later.
    pub fn new(graph: GraphDef) -> Result<Self, MutationError> {
        let GraphDef { nodes, library } = graph;
        let mut built = Self {
            library,
            ..Self::default()
        };
        built.insert_batch("new", String::new(), nodes)?;
        Ok(built)
    }

    pub fn num_nodes(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn library(&self) -> &[FunctionDef] {
        &self.library
    }

    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.ids.get(name).copied()
    }

    pub fn get_node(&self, name: &str) -> Option<&Node> {
        self.node_id(name).and_then(|id| self.try_node(id))
    }

    pub fn try_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.slot()).and_then(Option::as_ref)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.try_node(id).is_some()
    }

    pub fn node_name(&self, id: NodeId) -> Option<&str> {
        self.try_node(id).map(Node::name)
    }

    /// Node behind an id the caller knows to be live.
    pub(crate) fn node(&self, id: NodeId) -> &Node {
        self.try_node(id).expect("node id must be live")
    }

    pub(crate) fn name_of(&self, id: NodeId) -> &str {
        self.node(id).name()
    }

    /// Live node ids in insertion order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(index, _)| NodeId(index as u32))
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|node| (NodeId(index as u32), node)))
    }

    pub(crate) fn tensor_id(&self, port: OutputPort) -> TensorId {
        TensorId::new(self.name_of(port.node), port.port)
    }

    /// Resolves a reference against the current graph; controls resolve to the control slot.
    pub fn resolve(&self, tensor: &TensorId) -> Option<OutputPort> {
        self.node_id(&tensor.node)
            .map(|id| OutputPort::new(id, tensor.index))
    }

    /// Fanins of `id` in canonical input-list spelling, regular first.
    pub(crate) fn fanin_strings(&self, id: NodeId) -> Vec<String> {
        let node = self.node(id);
        node.regular
            .iter()
            .map(|port| self.tensor_id(*port).canonical())
            .chain(
                node.controls
                    .iter()
                    .map(|producer| format!("^{}", self.name_of(*producer))),
            )
            .collect()
    }

    /// Consumers of every output of `name`, spelled `consumer:input_position`
    /// or `^consumer`, sorted.
    pub fn fanout_strings(&self, name: &str) -> Vec<String> {
        let Some(id) = self.node_id(name) else {
            return Vec::new();
        };
        let mut rendered: Vec<String> = self
            .fanouts(id, true)
            .into_iter()
            .map(|input| {
                let consumer = self.name_of(input.node);
                if input.is_control() {
                    format!("^{consumer}")
                } else {
                    format!("{consumer}:{}", input.port)
                }
            })
            .collect();
        rendered.sort();
        rendered
    }

    /// Consumers of one output port.
    pub fn regular_fanouts(&self, port: OutputPort) -> Vec<InputPort> {
        self.fanouts
            .get(port.node)
            .and_then(|fanouts| fanouts.regular.get(&port.port))
            .map(|consumers| consumers.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Every data edge leaving `id` as `(output port, consumer input)`, ports ascending.
    pub fn output_fanouts(&self, id: NodeId) -> Vec<(OutputPort, InputPort)> {
        let Some(fanouts) = self.fanouts.get(id) else {
            return Vec::new();
        };
        fanouts
            .regular
            .iter()
            .flat_map(|(port, consumers)| {
                consumers
                    .iter()
                    .map(move |consumer| (OutputPort::new(id, *port), *consumer))
            })
            .collect()
    }

    /// Nodes holding a control dependency on `id`, in insertion order.
    pub fn controlled_fanouts(&self, id: NodeId) -> Vec<NodeId> {
        self.fanouts
            .get(id)
            .map(|fanouts| fanouts.controlled.iter().copied().collect())
            .unwrap_or_default()
    }

    /// All consumers of `id`, regular ports ascending, then controls when requested.
    pub fn fanouts(&self, id: NodeId, include_controlled: bool) -> Vec<InputPort> {
        let Some(fanouts) = self.fanouts.get(id) else {
            return Vec::new();
        };
        let mut consumers: Vec<InputPort> = fanouts.regular.values().flatten().copied().collect();
        if include_controlled {
            consumers.extend(fanouts.controlled.iter().map(|node| InputPort::control(*node)));
        }
        consumers
    }

    pub fn has_fanouts(&self, id: NodeId) -> bool {
        self.fanouts
            .get(id)
            .is_some_and(|fanouts| !fanouts.is_empty())
    }

    /// Highest output port of `id` that currently has a consumer.
    pub fn max_regular_output_port(&self, id: NodeId) -> Option<i32> {
        self.fanouts
            .get(id)
            .and_then(|fanouts| fanouts.regular.keys().next_back().copied())
    }

    pub fn node_def(&self, name: &str) -> Option<NodeDef> {
        let id = self.node_id(name)?;
        let node = self.node(id);
        Some(NodeDef {
            name: node.name.clone(),
            op: node.op.clone(),
            inputs: self.fanin_strings(id),
            device: node.device.clone(),
            attrs: node.attrs.clone(),
        })
    }

    /// Renders the graph in insertion order.
    pub fn to_graph_def(&self) -> GraphDef {
        GraphDef {
            nodes: self
                .nodes()
                .filter_map(|(_, node)| self.node_def(&node.name))
                .collect(),
            library: self.library.clone(),
        }
    }

    /// True if `id` is a branch construct or a pass-through reading one.
    /// Control dependencies on such nodes are never folded into regular ones.
    pub fn is_branch_pinned(&self, id: NodeId) -> bool {
        let Some(node) = self.try_node(id) else {
            return false;
        };
        if ops::is_branch_construct(&node.op) {
            return true;
        }
        ops::is_pass_through(&node.op)
            && node
                .regular
                .first()
                .and_then(|input| self.try_node(input.node))
                .is_some_and(|producer| ops::is_branch_construct(&producer.op))
    }

    /// A control on `producer` adds nothing when `node` already reads one of
    /// its outputs and the producer is not branch pinned.
    pub(crate) fn control_is_redundant(&self, node: &Node, producer: NodeId) -> bool {
        node.regular.iter().any(|input| input.node == producer) && !self.is_branch_pinned(producer)
    }

    /// Producers before consumers, ties broken by insertion order. Nodes on
    /// cycles follow in insertion order.
    pub fn topological_order(&self) -> Vec<NodeId> {
        let mut pending: HashMap<NodeId, usize> = HashMap::with_capacity(self.live);
        let mut ready = BinaryHeap::new();
        for (id, node) in self.nodes() {
            let producers: HashSet<NodeId> = node
                .regular
                .iter()
                .map(|input| input.node)
                .chain(node.controls.iter().copied())
                .collect();
            if producers.is_empty() {
                ready.push(Reverse(id));
            } else {
                pending.insert(id, producers.len());
            }
        }

        let mut order = Vec::with_capacity(self.live);
        let mut placed = HashSet::with_capacity(self.live);
        while let Some(Reverse(id)) = ready.pop() {
            order.push(id);
            placed.insert(id);
            let consumers: HashSet<NodeId> = self
                .fanouts
                .get(id)
                .map(|fanouts| fanouts.consumers().collect())
                .unwrap_or_default();
            for consumer in consumers {
                if let Some(remaining) = pending.get_mut(&consumer) {
                    *remaining -= 1;
                    if *remaining == 0 {
                        pending.remove(&consumer);
                        ready.push(Reverse(consumer));
                    }
                }
            }
        }
        if order.len() < self.live {
            order.extend(self.node_ids().filter(|id| !placed.contains(id)));
        }
        order
    }

    /// True when contracting `members` into one node would close a cycle
    /// through a node outside the set.
    pub fn would_create_cycle(&self, members: &HashSet<NodeId>) -> bool {
        let consumers_of = |id: NodeId| -> Vec<NodeId> {
            self.fanouts
                .get(id)
                .map(|fanouts| fanouts.consumers().collect())
                .unwrap_or_default()
        };
        let mut stack: Vec<NodeId> = members
            .iter()
            .flat_map(|member| consumers_of(*member))
            .filter(|consumer| !members.contains(consumer))
            .collect();
        let mut visited = HashSet::new();
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            for consumer in consumers_of(id) {
                if members.contains(&consumer) {
                    return true;
                }
                if !visited.contains(&consumer) {
                    stack.push(consumer);
                }
            }
        }
        false
    }

    /// Rebuilds the fanout index from the fanin lists and compares.
    pub fn verify(&self) -> Result<(), GraphIndexError> {
        let mut rebuilt = FanoutIndex::default();
        for (id, node) in self.nodes() {
            if self.ids.get(&node.name) != Some(&id) {
                return Err(GraphIndexError::NameMismatch {
                    node: node.name.clone(),
                });
            }
            let mut seen_controls = HashSet::new();
            for producer in node.regular.iter().map(|input| input.node).chain(node.controls.iter().copied()) {
                if producer == id {
                    return Err(GraphIndexError::SelfLoop {
                        node: node.name.clone(),
                    });
                }
                if !self.contains(producer) {
                    return Err(GraphIndexError::DanglingFanin {
                        node: node.name.clone(),
                        producer,
                    });
                }
            }
            for producer in &node.controls {
                if !seen_controls.insert(*producer) {
                    return Err(GraphIndexError::DuplicateControl {
                        node: node.name.clone(),
                        producer: self.name_of(*producer).to_string(),
                    });
                }
                if ops::is_branch_construct(self.node(*producer).op()) {
                    return Err(GraphIndexError::BranchControl {
                        node: node.name.clone(),
                        producer: self.name_of(*producer).to_string(),
                    });
                }
            }
            rebuilt.link(id, node);
        }
        if self.ids.len() != self.live {
            return Err(GraphIndexError::NameMismatch {
                node: String::from("<name index>"),
            });
        }
        let empty = NodeFanouts::default();
        for (index, slot) in self.nodes.iter().enumerate() {
            let id = NodeId(index as u32);
            let current = self.fanouts.get(id).unwrap_or(&empty);
            let expected = rebuilt.get(id).unwrap_or(&empty);
            if current != expected {
                let producer = slot
                    .as_ref()
                    .map(|node| node.name.clone())
                    .unwrap_or_else(|| format!("{id:?}"));
                return Err(GraphIndexError::FanoutMismatch { producer });
            }
        }
        Ok(())
    }

    /// Remembers the fanins of `ids` and which nodes exist right now.
    pub fn checkpoint(&self, ids: impl IntoIterator<Item = NodeId>) -> Checkpoint {
        let mut seen = BTreeSet::new();
        let saved = ids
            .into_iter()
            .filter(|id| seen.insert(*id))
            .filter_map(|id| self.try_node(id).map(|node| (id, node.clone())))
            .collect();
        Checkpoint {
            watermark: self.nodes.len() as u32,
            saved,
        }
    }

    /// Rolls the saved nodes back and drops every node added after the checkpoint.
    pub fn restore(&mut self, checkpoint: Checkpoint) {
        for (id, saved) in checkpoint.saved {
            match self.nodes[id.slot()].take() {
                Some(current) => self.fanouts.unlink(id, &current),
                None => {
                    self.ids.insert(saved.name.clone(), id);
                    self.live += 1;
                }
            }
            self.fanouts.link(id, &saved);
            self.nodes[id.slot()] = Some(saved);
        }
        let added: Vec<NodeId> = self
            .node_ids()
            .filter(|id| id.0 >= checkpoint.watermark)
            .collect();
        for id in added {
            self.remove_node(id);
        }
    }

    pub(crate) fn next_id(&self) -> NodeId {
        NodeId(self.nodes.len() as u32)
    }

    /// Applies `edit` to the fanins of a live node, re-indexing around it.
    pub(crate) fn edit_fanins<R>(&mut self, id: NodeId, edit: impl FnOnce(&mut Node) -> R) -> R {
        let node = self.nodes[id.slot()]
            .as_mut()
            .expect("edited node must be live");
        self.fanouts.unlink(id, node);
        let result = edit(node);
        self.fanouts.link(id, node);
        result
    }

    pub(crate) fn remove_node(&mut self, id: NodeId) {
        if let Some(node) = self.nodes[id.slot()].take() {
            self.fanouts.unlink(id, &node);
            self.fanouts.clear(id);
            self.ids.remove(&node.name);
            self.live -= 1;
        }
    }

    /// Validates and inserts `defs` as one unit; nothing is inserted on error.
    pub(crate) fn insert_batch(
        &mut self,
        op: &'static str,
        params: String,
        defs: Vec<NodeDef>,
    ) -> Result<Vec<NodeId>, MutationError> {
        let fail = |kind| MutationError::new(op, params.clone(), kind);

        // name -> op of every node in the batch
        let mut batch_ops: HashMap<&str, &str> = HashMap::with_capacity(defs.len());
        for def in &defs {
            if self.ids.contains_key(&def.name)
                || batch_ops.insert(def.name.as_str(), def.op.as_str()).is_some()
            {
                return Err(fail(MutationErrorKind::DuplicateName {
                    node: def.name.clone(),
                }));
            }
        }

        let mut parsed: Vec<Vec<TensorId>> = Vec::with_capacity(defs.len());
        for def in &defs {
            let mut inputs = Vec::with_capacity(def.inputs.len());
            let mut seen_control = false;
            for raw in &def.inputs {
                let tensor = TensorId::parse(raw).map_err(|_| {
                    fail(MutationErrorKind::InvalidTensorId { fanin: raw.clone() })
                })?;
                if tensor.is_control() {
                    seen_control = true;
                } else if seen_control {
                    return Err(fail(MutationErrorKind::MisorderedFanin { fanin: raw.clone() }));
                }
                if tensor.node == def.name {
                    return Err(fail(MutationErrorKind::SelfReference(SelfReference::NodeInput {
                        node: def.name.clone(),
                        fanin: tensor.to_string(),
                    })));
                }
                let producer_op = match batch_ops.get(tensor.node.as_str()) {
                    Some(kind) => *kind,
                    None => match self.get_node(&tensor.node) {
                        Some(producer) => producer.op(),
                        None => return Err(fail(MutationErrorKind::NotFound { node: tensor.node })),
                    },
                };
                if tensor.is_control() && ops::is_branch_construct(producer_op) {
                    return Err(fail(MutationErrorKind::SwitchControlDependency(
                        SwitchDependency::NodeInput {
                            node: def.name.clone(),
                            fanin: tensor.to_string(),
                        },
                    )));
                }
                inputs.push(tensor);
            }
            parsed.push(inputs);
        }

        let mut ids = Vec::with_capacity(defs.len());
        for def in defs {
            let id = self.next_id();
            self.ids.insert(def.name.clone(), id);
            self.nodes.push(Some(Node {
                name: def.name,
                op: def.op,
                device: def.device,
                attrs: def.attrs,
                regular: Vec::new(),
                controls: Vec::new(),
            }));
            self.live += 1;
            ids.push(id);
        }

        // Regular fanins of the whole batch first: dedup below asks whether a
        // producer is a pass-through reading a branch construct.
        for (id, inputs) in ids.iter().zip(&parsed) {
            let regular: Vec<OutputPort> = inputs
                .iter()
                .filter(|tensor| tensor.is_regular())
                .filter_map(|tensor| self.resolve(tensor))
                .collect();
            if let Some(node) = self.nodes[id.slot()].as_mut() {
                node.regular = regular;
            }
        }
        for (id, inputs) in ids.iter().zip(&parsed) {
            let mut controls: Vec<NodeId> = Vec::new();
            for tensor in inputs.iter().filter(|tensor| tensor.is_control()) {
                let Some(producer) = self.node_id(&tensor.node) else {
                    continue;
                };
                if controls.contains(&producer) || self.control_is_redundant(self.node(*id), producer) {
                    continue;
                }
                controls.push(producer);
            }
            if let Some(node) = self.nodes[id.slot()].as_mut() {
                node.controls = controls;
            }
        }
        for id in &ids {
            if let Some(node) = self.nodes[id.slot()].as_ref() {
                self.fanouts.link(*id, node);
            }
        }
        Ok(ids)
    }
}

pub(crate) fn node_list_param(names: &[String]) -> String {
    format!("{{{}}}", bounded_names(names))
}
