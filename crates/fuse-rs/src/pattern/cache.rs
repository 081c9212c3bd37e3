use std::num::NonZeroUsize;

use lru::LruCache;

use crate::graph::{Node, NodeId};
use crate::pattern::predicates::{Predicate, PredicateId};

/// Bounded memo of predicate results, owned by one matcher.
///
/// Keys use [`NodeId`], which is never reused, and node attributes never
/// change after insertion, so entries cannot go stale.
#[derive(Debug)]
pub struct PredicateCache {
    entries: Option<LruCache<(NodeId, PredicateId), bool>>,
    hits: u64,
    misses: u64,
}

impl PredicateCache {
    /// A capacity of zero disables caching.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: NonZeroUsize::new(capacity).map(LruCache::new),
            hits: 0,
            misses: 0,
        }
    }

    pub fn evaluate(&mut self, id: NodeId, node: &Node, predicate: &Predicate) -> bool {
        let Some(entries) = self.entries.as_mut() else {
            self.misses += 1;
            return predicate.evaluate(node);
        };
        let key = (id, predicate.id);
        if let Some(result) = entries.get(&key).copied() {
            self.hits += 1;
            return result;
        }
        self.misses += 1;
        let result = predicate.evaluate(node);
        entries.put(key, result);
        result
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, LruCache::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.entries.as_ref().map_or(0, |entries| entries.cap().get())
    }
}
