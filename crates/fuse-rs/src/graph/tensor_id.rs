use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Port index marking an ordering-only dependency.
pub const CONTROL_SLOT: i32 = -1;

/// Reference to one output of a producer node.
///
/// Index `k >= 0` names a regular output port, [`CONTROL_SLOT`] names a
/// control dependency. Anything below that is representable but invalid, and
/// every mutation entry point rejects it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TensorId {
    pub node: String,
    pub index: i32,
}

/// Errors raised while parsing `producer`, `producer:k` or `^producer` strings.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TensorIdError {
    #[error("tensor id is empty")]
    Empty,
    #[error("tensor id '{0}' names no producer")]
    MissingProducer(String),
    #[error("tensor id '{0}' has a malformed port")]
    MalformedPort(String),
    #[error("tensor id '{0}' must use '^producer' for control dependencies")]
    NegativePort(String),
    #[error("port {index} of '{node}' is out of range")]
    PortOutOfRange { node: String, index: u32 },
}

impl TensorId {
    pub fn new(node: impl Into<String>, index: i32) -> Self {
        Self {
            node: node.into(),
            index,
        }
    }

    /// Regular output `index` of `node`; ports must fit the signed index space.
    pub fn regular(node: impl Into<String>, index: u32) -> Result<Self, TensorIdError> {
        let node = node.into();
        match i32::try_from(index) {
            Ok(index) => Ok(Self::new(node, index)),
            Err(_) => Err(TensorIdError::PortOutOfRange { node, index }),
        }
    }

    pub fn control(node: impl Into<String>) -> Self {
        Self::new(node, CONTROL_SLOT)
    }

    pub fn is_control(&self) -> bool {
        self.index == CONTROL_SLOT
    }

    pub fn is_regular(&self) -> bool {
        self.index >= 0
    }

    /// Returns false for indices below [`CONTROL_SLOT`].
    pub fn is_valid(&self) -> bool {
        self.index >= CONTROL_SLOT
    }

    /// Input-list spelling: port 0 is implied, controls are prefixed with `^`.
    pub fn canonical(&self) -> String {
        match self.index {
            0 => self.node.clone(),
            CONTROL_SLOT => format!("^{}", self.node),
            index => format!("{}:{}", self.node, index),
        }
    }

    pub fn parse(src: &str) -> Result<Self, TensorIdError> {
        let src = src.trim();
        if src.is_empty() {
            return Err(TensorIdError::Empty);
        }
        if let Some(producer) = src.strip_prefix('^') {
            if producer.is_empty() || producer.contains(':') {
                return Err(TensorIdError::MissingProducer(src.to_string()));
            }
            return Ok(Self::control(producer));
        }
        let Some((producer, port)) = src.rsplit_once(':') else {
            return Ok(Self::new(src, 0));
        };
        if producer.is_empty() {
            return Err(TensorIdError::MissingProducer(src.to_string()));
        }
        let index: i32 = port
            .parse()
            .map_err(|_| TensorIdError::MalformedPort(src.to_string()))?;
        if index < 0 {
            return Err(TensorIdError::NegativePort(src.to_string()));
        }
        Ok(Self::new(producer, index))
    }
}

/// Renders the full form used in error messages: `a:0`, `a:3`, `^a`.
impl fmt::Display for TensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_control() {
            write!(f, "^{}", self.node)
        } else {
            write!(f, "{}:{}", self.node, self.index)
        }
    }
}

impl FromStr for TensorId {
    type Err = TensorIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<(&str, i32)> for TensorId {
    fn from((node, index): (&str, i32)) -> Self {
        Self::new(node, index)
    }
}
