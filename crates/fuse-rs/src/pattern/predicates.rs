//! Node predicates referenced by name from pattern tables.
//!
//! Predicates only look at a node's own kind and attributes. Attribute
//! conventions:
//! - constants carry their literal under `value`,
//! - random number generators name their distribution under `distribution`,
//! - loops name their condition under `condition`,
//! - calls name their callee under `callee`,
//! - lowered ops remember the front-end op under `source_op`,
//! - pads list `interior_padding` per dimension,
//! - reduction windows list `window_size`, `window_stride`, `padding_low`
//!   and `padding_high` per dimension.

use std::collections::HashMap;

use crate::graph::{AttrValue, Node};

pub type NodePredicate = fn(&Node) -> bool;

/// Dense id of a registered predicate, stable for the registry's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PredicateId(pub u32);

/// A resolved predicate as stored in compiled templates.
#[derive(Debug, Clone, Copy)]
pub struct Predicate {
    pub id: PredicateId,
    pub name: &'static str,
    pub check: NodePredicate,
}

impl Predicate {
    pub fn evaluate(&self, node: &Node) -> bool {
        (self.check)(node)
    }
}

/// Name to predicate table consulted when a pattern table is compiled.
#[derive(Debug, Clone, Default)]
pub struct PredicateRegistry {
    entries: Vec<(&'static str, NodePredicate)>,
    by_name: HashMap<&'static str, usize>,
}

impl PredicateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("is_constant_zero", is_constant_zero);
        registry.register("is_constant_half", is_constant_half);
        registry.register("is_scalar_constant", is_scalar_constant);
        registry.register("is_external_padding", is_external_padding);
        registry.register("is_average_pool", is_average_pool);
        registry.register("is_reduction_window_nyxc", is_reduction_window_nyxc);
        registry.register("is_random_normal", is_random_normal);
        registry.register("is_random_uniform", is_random_uniform);
        registry.register("is_random_bernoulli", is_random_bernoulli);
        registry.register("is_truncated_normal_while", is_truncated_normal_while);
        registry.register("is_convolution_call", is_convolution_call);
        registry
    }

    /// Registers `check` under `name`, replacing an earlier registration.
    pub fn register(&mut self, name: &'static str, check: NodePredicate) -> PredicateId {
        if let Some(index) = self.by_name.get(name).copied() {
            self.entries[index].1 = check;
            return PredicateId(index as u32);
        }
        let index = self.entries.len();
        self.entries.push((name, check));
        self.by_name.insert(name, index);
        PredicateId(index as u32)
    }

    pub fn lookup(&self, name: &str) -> Option<Predicate> {
        let index = self.by_name.get(name).copied()?;
        let (name, check) = self.entries[index];
        Some(Predicate {
            id: PredicateId(index as u32),
            name,
            check,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn str_attr<'a>(node: &'a Node, key: &str) -> Option<&'a str> {
    node.attr(key).and_then(AttrValue::as_str)
}

pub fn is_constant_zero(node: &Node) -> bool {
    constant_is_all(node, 0.0)
}

pub fn is_constant_half(node: &Node) -> bool {
    constant_is_all(node, 0.5)
}

fn constant_is_all(node: &Node, value: f64) -> bool {
    node.attr("value")
        .and_then(AttrValue::as_tensor)
        .is_some_and(|literal| literal.is_all(value))
}

pub fn is_scalar_constant(node: &Node) -> bool {
    node.attr("value")
        .and_then(AttrValue::as_tensor)
        .is_some_and(|literal| literal.rank() == 0)
}

/// Padding only on the outside of each dimension.
pub fn is_external_padding(node: &Node) -> bool {
    match node.attr("interior_padding") {
        None => true,
        Some(value) => value
            .as_int_list()
            .is_some_and(|interior| interior.iter().all(|pad| *pad <= 0)),
    }
}

pub fn is_average_pool(node: &Node) -> bool {
    str_attr(node, "source_op") == Some("AvgPool")
}

/// Window that leaves the batch (0) and channel (3) dimensions untouched.
pub fn is_reduction_window_nyxc(node: &Node) -> bool {
    let field = |key: &str| node.attr(key).and_then(AttrValue::as_int_list);
    let (Some(size), Some(stride), Some(low), Some(high)) = (
        field("window_size"),
        field("window_stride"),
        field("padding_low"),
        field("padding_high"),
    ) else {
        return false;
    };
    [0usize, 3].iter().all(|dim| {
        size.get(*dim) == Some(&1)
            && stride.get(*dim) == Some(&1)
            && low.get(*dim) == Some(&0)
            && high.get(*dim) == Some(&0)
    })
}

pub fn is_random_normal(node: &Node) -> bool {
    str_attr(node, "distribution") == Some("normal")
}

pub fn is_random_uniform(node: &Node) -> bool {
    str_attr(node, "distribution") == Some("uniform")
}

pub fn is_random_bernoulli(node: &Node) -> bool {
    str_attr(node, "distribution") == Some("bernoulli")
}

pub fn is_truncated_normal_while(node: &Node) -> bool {
    str_attr(node, "condition").is_some_and(|name| name.starts_with("truncated_normal"))
}

pub fn is_convolution_call(node: &Node) -> bool {
    str_attr(node, "callee").is_some_and(|name| name.starts_with("convolution"))
}
