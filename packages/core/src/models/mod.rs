//! Data Models
//!
//! This module contains the core data structures used throughout Regio:
//!
//! - `TreeNode` - Universal tree row for all node kinds (pages, language trees)
//! - `TreeFilter` / `ArchivePolicy` - Filter criteria for tree materialization
//!
//! Both concrete node kinds share the single `tree_nodes` table; the
//! nested-set tuple `(tree_id, lft, rgt, depth)` is the authoritative
//! structural representation.

mod filters;
mod node;

pub use filters::{ArchivePolicy, TreeFilter};
pub use node::{NewNode, NodeKind, TreeNode, ValidationError};
