use std::collections::{BTreeMap, BTreeSet};

use crate::graph::node::Node;
use crate::graph::tensor_id::CONTROL_SLOT;

/// Stable identifier assigned to each node on insertion. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct NodeId(pub u32);

impl NodeId {
    pub(crate) fn slot(self) -> usize {
        self.0 as usize
    }
}

/// Producer side of an edge: output `port` of `node`, or its control slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct OutputPort {
    pub node: NodeId,
    pub port: i32,
}

/// Consumer side of an edge: input position `port` of `node`, or its control slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct InputPort {
    pub node: NodeId,
    pub port: i32,
}

impl OutputPort {
    pub fn new(node: NodeId, port: i32) -> Self {
        Self { node, port }
    }
}

impl InputPort {
    pub fn new(node: NodeId, port: i32) -> Self {
        Self { node, port }
    }

    pub fn control(node: NodeId) -> Self {
        Self::new(node, CONTROL_SLOT)
    }

    pub fn is_control(&self) -> bool {
        self.port == CONTROL_SLOT
    }
}

/// Consumers of one producer, split by output port and control.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct NodeFanouts {
    pub(crate) regular: BTreeMap<i32, BTreeSet<InputPort>>,
    pub(crate) controlled: BTreeSet<NodeId>,
}

impl NodeFanouts {
    pub(crate) fn is_empty(&self) -> bool {
        self.regular.is_empty() && self.controlled.is_empty()
    }

    pub(crate) fn consumers(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.regular
            .values()
            .flat_map(|ports| ports.iter().map(|input| input.node))
            .chain(self.controlled.iter().copied())
    }
}

/// Inverse of the per-node fanin lists, indexed by producer id.
#[derive(Debug, Clone, Default)]
pub(crate) struct FanoutIndex {
    slots: Vec<NodeFanouts>,
}

impl FanoutIndex {
    pub(crate) fn get(&self, producer: NodeId) -> Option<&NodeFanouts> {
        self.slots.get(producer.slot())
    }

    fn slot_mut(&mut self, producer: NodeId) -> &mut NodeFanouts {
        let slot = producer.slot();
        if self.slots.len() <= slot {
            self.slots.resize_with(slot + 1, NodeFanouts::default);
        }
        &mut self.slots[slot]
    }

    pub(crate) fn add_regular(&mut self, producer: OutputPort, consumer: InputPort) {
        self.slot_mut(producer.node)
            .regular
            .entry(producer.port)
            .or_default()
            .insert(consumer);
    }

    pub(crate) fn remove_regular(&mut self, producer: OutputPort, consumer: InputPort) {
        let fanouts = self.slot_mut(producer.node);
        if let Some(consumers) = fanouts.regular.get_mut(&producer.port) {
            consumers.remove(&consumer);
            if consumers.is_empty() {
                fanouts.regular.remove(&producer.port);
            }
        }
    }

    pub(crate) fn add_control(&mut self, producer: NodeId, consumer: NodeId) {
        self.slot_mut(producer).controlled.insert(consumer);
    }

    pub(crate) fn remove_control(&mut self, producer: NodeId, consumer: NodeId) {
        self.slot_mut(producer).controlled.remove(&consumer);
    }

    /// Records every fanin of `node` under its producers.
    pub(crate) fn link(&mut self, id: NodeId, node: &Node) {
        for (position, producer) in node.regular.iter().enumerate() {
            self.add_regular(*producer, InputPort::new(id, position as i32));
        }
        for producer in &node.controls {
            self.add_control(*producer, id);
        }
    }

    /// Drops every fanin of `node` from its producers' entries.
    pub(crate) fn unlink(&mut self, id: NodeId, node: &Node) {
        for (position, producer) in node.regular.iter().enumerate() {
            self.remove_regular(*producer, InputPort::new(id, position as i32));
        }
        for producer in &node.controls {
            self.remove_control(*producer, id);
        }
    }

    pub(crate) fn clear(&mut self, producer: NodeId) {
        if let Some(slot) = self.slots.get_mut(producer.slot()) {
            *slot = NodeFanouts::default();
        }
    }
}
