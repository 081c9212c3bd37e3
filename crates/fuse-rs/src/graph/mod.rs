//! Mutable data-flow graph with incrementally maintained fanin/fanout indices.
//!
//! [`MutableGraph`] owns the nodes; the `mutation` module adds the edits that
//! keep every structural invariant intact between calls.

pub mod error;
pub mod index;
pub mod mutation;
pub mod node;
pub mod ops;
pub mod text;
pub mod tensor_id;
pub mod view;

pub use error::{MutationError, MutationErrorKind, SelfReference, SwitchDependency};
pub use index::{InputPort, NodeId, OutputPort};
pub use node::{AttrValue, FunctionDef, GraphDef, Node, NodeDef, TensorLiteral};
pub use tensor_id::{TensorId, TensorIdError, CONTROL_SLOT};
pub use text::{parse_graph, TextGraphError};
pub use view::{Checkpoint, GraphIndexError, MutableGraph};
