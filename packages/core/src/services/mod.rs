//! Tree Services
//!
//! This module contains the core tree logic on top of the database layer:
//!
//! - `TreeQuery` - Read-only traversal primitives (ancestors, descendants,
//!   region siblings)
//! - `TreeMutator` - Structural writes (add root/child/sibling, move, save)
//! - `TreeRepair` - Offline consistency checker/fixer driven by the parent
//!   pointer chain
//! - `TreeCache` - Single-pass filtered materialization of a region's forest
//!
//! Services coordinate between the `TreeStore` abstraction and callers;
//! none of them manage transactions; callers serialize structural writes
//! per `tree_id` (see the crate docs).

pub mod error;
pub mod tree_cache;
pub mod tree_mutator;
pub mod tree_query;
pub mod tree_repair;

pub use error::TreeServiceError;
pub use tree_cache::{build_filtered_tree, CacheRow, FilteredNode, FilteredTree, TreeCache};
pub use tree_mutator::{Position, TreeMutator};
pub use tree_query::{TraversalMemo, TreeQuery};
pub use tree_repair::{FieldDiff, NodeCheck, RepairReport, TreeRepair};

#[cfg(test)]
mod tree_mutator_test;
#[cfg(test)]
mod tree_query_test;
