use std::collections::{HashMap, HashSet};

use smallvec::SmallVec;
use thiserror::Error;

use crate::pattern::predicates::{Predicate, PredicateRegistry};

/// Input slot value marking an edge that enters the pattern from outside.
pub const EXTERNAL: i32 = -1;

/// Authored template record. `inputs[j]` is [`EXTERNAL`] or the position of
/// the template producing the node's `j`-th input; positions only point
/// forward, position 0 is the anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateSpec {
    pub op: &'static str,
    pub include_in_replacement: bool,
    pub strict: bool,
    pub predicate: Option<&'static str>,
    pub inputs: &'static [i32],
}

impl TemplateSpec {
    pub const fn new(op: &'static str, inputs: &'static [i32]) -> Self {
        Self {
            op,
            include_in_replacement: true,
            strict: true,
            predicate: None,
            inputs,
        }
    }

    /// Matched but kept in the graph; edges out of it count as external inputs.
    pub const fn excluded(self) -> Self {
        Self {
            include_in_replacement: false,
            ..self
        }
    }

    /// Only the listed slots are constrained; extra inputs are ignored.
    pub const fn relaxed(self) -> Self {
        Self {
            strict: false,
            ..self
        }
    }

    pub const fn with_predicate(self, name: &'static str) -> Self {
        Self {
            predicate: Some(name),
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternSpec {
    pub name: &'static str,
    pub templates: &'static [TemplateSpec],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotRef {
    External,
    Template(usize),
}

#[derive(Debug, Clone)]
pub struct NodeTemplate {
    pub op: &'static str,
    pub include_in_replacement: bool,
    pub strict: bool,
    pub predicate: Option<Predicate>,
    pub inputs: Vec<SlotRef>,
}

#[derive(Debug, Clone)]
pub struct Pattern {
    name: &'static str,
    templates: Vec<NodeTemplate>,
}

impl Pattern {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn templates(&self) -> &[NodeTemplate] {
        &self.templates
    }

    pub fn template(&self, position: usize) -> &NodeTemplate {
        &self.templates[position]
    }

    pub fn anchor_op(&self) -> &'static str {
        self.templates[0].op
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

/// Errors raised while compiling authored pattern tables.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatternError {
    #[error("pattern '{pattern}' has no templates")]
    Empty { pattern: &'static str },
    #[error("pattern name '{pattern}' is registered twice")]
    DuplicateName { pattern: &'static str },
    #[error("pattern '{pattern}': the anchor must be included in the replacement")]
    ExcludedAnchor { pattern: &'static str },
    #[error("pattern '{pattern}': position {position} slot {slot} refers to invalid position {target}")]
    InvalidSlot {
        pattern: &'static str,
        position: usize,
        slot: usize,
        target: i32,
    },
    #[error("pattern '{pattern}': position {position} slot {slot} refers back to position {target}")]
    BackwardReference {
        pattern: &'static str,
        position: usize,
        slot: usize,
        target: usize,
    },
    #[error("pattern '{pattern}': position {position} is not reachable from the anchor")]
    Unreachable { pattern: &'static str, position: usize },
    #[error("pattern '{pattern}': position {position} uses unknown predicate '{predicate}'")]
    UnknownPredicate {
        pattern: &'static str,
        position: usize,
        predicate: &'static str,
    },
}

/// Ordered, validated pattern list. Order is priority: at one anchor the
/// first pattern that binds completely wins.
#[derive(Debug, Clone, Default)]
pub struct PatternTable {
    patterns: Vec<Pattern>,
    by_anchor: HashMap<&'static str, SmallVec<[usize; 4]>>,
}

impl PatternTable {
    pub fn compile(specs: &[PatternSpec], registry: &PredicateRegistry) -> Result<Self, PatternError> {
        let mut table = PatternTable::default();
        let mut names = HashSet::new();
        for spec in specs {
            if !names.insert(spec.name) {
                return Err(PatternError::DuplicateName { pattern: spec.name });
            }
            let pattern = compile_pattern(spec, registry)?;
            table
                .by_anchor
                .entry(pattern.anchor_op())
                .or_default()
                .push(table.patterns.len());
            table.patterns.push(pattern);
        }
        Ok(table)
    }

    /// The built-in library resolved against the built-in predicates.
    pub fn default_table() -> Result<Self, PatternError> {
        Self::compile(
            crate::pattern::default_patterns(),
            &PredicateRegistry::with_builtins(),
        )
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    pub fn get(&self, index: usize) -> Option<&Pattern> {
        self.patterns.get(index)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.patterns.iter().position(|pattern| pattern.name == name)
    }

    /// Patterns anchored at nodes of kind `op`, in priority order.
    pub fn candidates(&self, op: &str) -> &[usize] {
        self.by_anchor
            .get(op)
            .map(|indices| indices.as_slice())
            .unwrap_or(&[])
    }
}

fn compile_pattern(spec: &PatternSpec, registry: &PredicateRegistry) -> Result<Pattern, PatternError> {
    let pattern = spec.name;
    let Some(anchor) = spec.templates.first() else {
        return Err(PatternError::Empty { pattern });
    };
    if !anchor.include_in_replacement {
        return Err(PatternError::ExcludedAnchor { pattern });
    }

    let len = spec.templates.len();
    let mut referenced = vec![false; len];
    referenced[0] = true;
    let mut templates = Vec::with_capacity(len);
    for (position, template) in spec.templates.iter().enumerate() {
        if !referenced[position] {
            return Err(PatternError::Unreachable { pattern, position });
        }
        let mut inputs = Vec::with_capacity(template.inputs.len());
        for (slot, target) in template.inputs.iter().copied().enumerate() {
            if target == EXTERNAL {
                inputs.push(SlotRef::External);
                continue;
            }
            if target < 0 || target as usize >= len {
                return Err(PatternError::InvalidSlot {
                    pattern,
                    position,
                    slot,
                    target,
                });
            }
            let target = target as usize;
            if target <= position {
                return Err(PatternError::BackwardReference {
                    pattern,
                    position,
                    slot,
                    target,
                });
            }
            referenced[target] = true;
            inputs.push(SlotRef::Template(target));
        }
        let predicate = match template.predicate {
            None => None,
            Some(name) => Some(registry.lookup(name).ok_or(PatternError::UnknownPredicate {
                pattern,
                position,
                predicate: name,
            })?),
        };
        templates.push(NodeTemplate {
            op: template.op,
            include_in_replacement: template.include_in_replacement,
            strict: template.strict,
            predicate,
            inputs,
        });
    }
    Ok(Pattern {
        name: spec.name,
        templates,
    })
}
