use std::fmt;

use thiserror::Error;

/// Failure of a single graph edit. The graph is left exactly as before the call.
///
/// Renders as `MutableGraph::<op>(<params>) error: <message>`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("MutableGraph::{op}({params}) error: {kind}")]
pub struct MutationError {
    pub op: &'static str,
    pub params: String,
    pub kind: MutationErrorKind,
}

impl MutationError {
    pub(crate) fn new(op: &'static str, params: String, kind: MutationErrorKind) -> Self {
        Self { op, params, kind }
    }

    pub fn kind(&self) -> &MutationErrorKind {
        &self.kind
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MutationErrorKind {
    #[error("node '{node}' was not found.")]
    NotFound { node: String },
    #[error("fanin '{fanin}' must be a regular tensor id.")]
    NotRegularTensorId { fanin: String },
    #[error("fanin '{fanin}' must be a valid tensor id.")]
    InvalidTensorId { fanin: String },
    #[error("{0}")]
    SelfReference(SelfReference),
    #[error("{0}")]
    SwitchControlDependency(SwitchDependency),
    #[error("can't delete node(s) with retained fanout(s) [{}].", bounded_names(.nodes))]
    RetainedFanout { nodes: Vec<String> },
    #[error("can't add node '{node}' as a node with that name already exists.")]
    DuplicateName { node: String },
    #[error("can't add a subgraph with non-empty function library.")]
    NonEmptyAuxiliaryLibrary,
    #[error("regular fanin '{fanin}' can't follow controlling fanins.")]
    MisorderedFanin { fanin: String },
}

impl MutationErrorKind {
    pub fn is_not_found(&self) -> bool {
        matches!(self, MutationErrorKind::NotFound { .. })
    }

    pub fn is_invalid_tensor_id(&self) -> bool {
        matches!(
            self,
            MutationErrorKind::NotRegularTensorId { .. } | MutationErrorKind::InvalidTensorId { .. }
        )
    }

    pub fn is_self_reference(&self) -> bool {
        matches!(self, MutationErrorKind::SelfReference(_))
    }
}

/// Edits that would make a node depend on itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelfReference {
    AddRegularFanin(String),
    RemoveRegularFanin(String),
    UpdateFanin,
    AddControllingFanin(String),
    FoundControllingFanin(String),
    GeneratedControllingFanin(String),
    RemoveControllingFanin(String),
    NodeInput { node: String, fanin: String },
}

impl fmt::Display for SelfReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelfReference::AddRegularFanin(fanin) => {
                write!(f, "can't add regular fanin '{fanin}' to self.")
            }
            SelfReference::RemoveRegularFanin(fanin) => {
                write!(f, "can't remove regular fanin '{fanin}' from self.")
            }
            SelfReference::UpdateFanin => write!(f, "can't update fanin to or from self."),
            SelfReference::AddControllingFanin(fanin) => {
                write!(f, "can't add controlling fanin '{fanin}' to self.")
            }
            SelfReference::FoundControllingFanin(fanin) => {
                write!(f, "can't add found controlling fanin '{fanin}' to self.")
            }
            SelfReference::GeneratedControllingFanin(fanin) => {
                write!(f, "can't add generated controlling fanin '{fanin}' to self.")
            }
            SelfReference::RemoveControllingFanin(fanin) => {
                write!(f, "can't remove controlling fanin '{fanin}' from self.")
            }
            SelfReference::NodeInput { node, fanin } => {
                write!(f, "can't add node '{node}' with fanin '{fanin}' from self.")
            }
        }
    }
}

/// Edits that would put a control dependency directly on a branch construct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchDependency {
    AddControllingFanin(String),
    UpdateFanin(String),
    UpdateFanouts(String),
    NodeInput { node: String, fanin: String },
}

impl fmt::Display for SwitchDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const SUFFIX: &str = "as it will become a Switch control dependency.";
        match self {
            SwitchDependency::AddControllingFanin(fanin) => {
                write!(f, "can't add controlling fanin '{fanin}' {SUFFIX}")
            }
            SwitchDependency::UpdateFanin(fanin) => {
                write!(f, "can't update to fanin '{fanin}' {SUFFIX}")
            }
            SwitchDependency::UpdateFanouts(node) => {
                write!(f, "can't update fanouts to node '{node}' {SUFFIX}")
            }
            SwitchDependency::NodeInput { node, fanin } => {
                write!(f, "can't add node '{node}' with controlling fanin '{fanin}' {SUFFIX}")
            }
        }
    }
}

const MAX_LISTED_NODES: usize = 5;

/// Sorted, comma separated, capped at five names followed by `...`.
pub(crate) fn bounded_names(names: &[String]) -> String {
    let mut sorted: Vec<&str> = names.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.dedup();
    let mut rendered = sorted
        .iter()
        .take(MAX_LISTED_NODES)
        .copied()
        .collect::<Vec<_>>()
        .join(", ");
    if sorted.len() > MAX_LISTED_NODES {
        rendered.push_str(", ...");
    }
    rendered
}
