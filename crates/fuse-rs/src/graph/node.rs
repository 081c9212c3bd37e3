use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::graph::index::{NodeId, OutputPort};

/// Dense or splatted numeric literal carried by constant-like nodes.
///
/// `values` either holds one value per element or a single value repeated
/// across `dims`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorLiteral {
    pub dims: Vec<usize>,
    pub values: Vec<f64>,
}

impl TensorLiteral {
    pub fn scalar(value: f64) -> Self {
        Self {
            dims: Vec::new(),
            values: vec![value],
        }
    }

    pub fn splat(dims: Vec<usize>, value: f64) -> Self {
        Self {
            dims,
            values: vec![value],
        }
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn element_count(&self) -> usize {
        self.dims.iter().product()
    }

    /// True when the literal has at least one element and every element equals `value`.
    pub fn is_all(&self, value: f64) -> bool {
        self.element_count() > 0
            && !self.values.is_empty()
            && self.values.iter().all(|v| *v == value)
    }
}

/// Attribute payloads. Opaque to the graph; only predicates look inside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    IntList(Vec<i64>),
    StrList(Vec<String>),
    Tensor(TensorLiteral),
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttrValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_int_list(&self) -> Option<&[i64]> {
        match self {
            AttrValue::IntList(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_tensor(&self) -> Option<&TensorLiteral> {
        match self {
            AttrValue::Tensor(literal) => Some(literal),
            _ => None,
        }
    }
}

/// External node record: the ingestion and serialization shape of a node.
///
/// `inputs` use the `producer`, `producer:k`, `^producer` convention with all
/// regular inputs listed before any control input.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeDef {
    pub name: String,
    pub op: String,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub device: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, AttrValue>,
}

impl NodeDef {
    pub fn new(name: impl Into<String>, op: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            op: op.into(),
            ..Self::default()
        }
    }

    pub fn with_inputs<I, S>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs = inputs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = device.into();
        self
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: AttrValue) -> Self {
        self.attrs.insert(key.into(), value);
        self
    }
}

/// Named reusable sub-definition attached to a graph.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<NodeDef>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphDef {
    pub nodes: Vec<NodeDef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub library: Vec<FunctionDef>,
}

impl GraphDef {
    pub fn new(nodes: Vec<NodeDef>) -> Self {
        Self {
            nodes,
            library: Vec::new(),
        }
    }

    pub fn from_json_str(src: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(src)
    }

    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn node(&self, name: &str) -> Option<&NodeDef> {
        self.nodes.iter().find(|node| node.name == name)
    }
}

/// Node as stored inside a [`MutableGraph`](crate::graph::MutableGraph), with
/// fanins resolved to producer ids.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub(crate) name: String,
    pub(crate) op: String,
    pub(crate) device: String,
    pub(crate) attrs: BTreeMap<String, AttrValue>,
    pub(crate) regular: Vec<OutputPort>,
    pub(crate) controls: Vec<NodeId>,
}

impl Node {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn op(&self) -> &str {
        &self.op
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn attrs(&self) -> &BTreeMap<String, AttrValue> {
        &self.attrs
    }

    pub fn attr(&self, key: &str) -> Option<&AttrValue> {
        self.attrs.get(key)
    }

    pub fn regular_fanins(&self) -> &[OutputPort] {
        &self.regular
    }

    pub fn controlling_fanins(&self) -> &[NodeId] {
        &self.controls
    }

    pub fn num_regular_fanins(&self) -> usize {
        self.regular.len()
    }
}
