//! Per-Tree Epoch Counters
//!
//! Structural writes (insert, move, committed repair) touch an unbounded
//! number of rows in set-based statements, so no per-row cache can observe
//! them reliably. Instead of a blanket "invalidate everything" signal,
//! `TreeEpochs` keeps one generation counter per `tree_id`: mutators bump
//! the counter immediately before and immediately after each structural
//! write, and materialized views record the epochs they were built at so
//! readers can detect staleness.
//!
//! The odd/even trick falls out of the double bump: a tree whose counter
//! was bumped "before" but never "after" is mid-mutation (or crashed
//! mid-mutation), and any snapshot taken at that epoch is already stale.
//!
//! Epochs are process-local. They are a read-side staleness signal, not a
//! cross-process lock; callers still serialize mutations per `tree_id`.

use std::collections::HashMap;
use std::sync::RwLock;

/// Per-`tree_id` generation counters for read-side invalidation
#[derive(Debug, Default)]
pub struct TreeEpochs {
    counters: RwLock<HashMap<i64, u64>>,
}

impl TreeEpochs {
    /// Create a fresh counter set (all trees at epoch 0)
    pub fn new() -> Self {
        Self::default()
    }

    /// Bump the epoch of one tree and return the new value
    pub fn bump(&self, tree_id: i64) -> u64 {
        let mut counters = self.counters.write().expect("epoch lock poisoned");
        let counter = counters.entry(tree_id).or_insert(0);
        *counter += 1;
        tracing::debug!(tree_id, epoch = *counter, "tree epoch bumped");
        *counter
    }

    /// Current epoch of one tree (0 if never mutated in this process)
    pub fn current(&self, tree_id: i64) -> u64 {
        let counters = self.counters.read().expect("epoch lock poisoned");
        counters.get(&tree_id).copied().unwrap_or(0)
    }

    /// Snapshot the epochs of a set of trees, e.g. every tree that
    /// contributed rows to a materialized view
    pub fn snapshot(&self, tree_ids: impl IntoIterator<Item = i64>) -> HashMap<i64, u64> {
        let counters = self.counters.read().expect("epoch lock poisoned");
        tree_ids
            .into_iter()
            .map(|id| (id, counters.get(&id).copied().unwrap_or(0)))
            .collect()
    }

    /// Whether a previously taken snapshot still matches the live counters
    pub fn matches(&self, snapshot: &HashMap<i64, u64>) -> bool {
        let counters = self.counters.read().expect("epoch lock poisoned");
        snapshot
            .iter()
            .all(|(id, epoch)| counters.get(id).copied().unwrap_or(0) == *epoch)
    }
}
