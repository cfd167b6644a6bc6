//! Read-Only Tree Traversal
//!
//! `TreeQuery` provides the traversal primitives over the stored nested
//! set: ancestors, descendants (optionally depth-bounded), and region
//! siblings. All reads derive structure from the `(tree_id, lft, rgt)`
//! intervals; the parent pointer is never trusted here.
//!
//! # Parent memoization
//!
//! Resolving a parent costs one ancestor-range query. Presentation passes
//! resolve the same parents repeatedly, so `get_parent` memoizes results in
//! an explicit [`TraversalMemo`] owned by the caller and scoped to one
//! traversal pass. The memo is never attached to node values, and the
//! `update` flag forces recomputation after a structural change.

use crate::db::TreeStore;
use crate::models::TreeNode;
use crate::services::error::TreeServiceError;
use std::collections::HashMap;
use std::sync::Arc;

/// Parent memo for one traversal pass
///
/// Create one per pass, drop it when the pass ends. Holding a memo across
/// structural mutations serves stale parents unless `update` is passed.
#[derive(Debug, Default)]
pub struct TraversalMemo {
    parents: HashMap<String, Option<TreeNode>>,
}

impl TraversalMemo {
    /// Create an empty memo
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything memoized so far
    pub fn clear(&mut self) {
        self.parents.clear();
    }
}

/// Read-only traversal primitives over the stored nested-set tree
pub struct TreeQuery {
    store: Arc<dyn TreeStore>,
}

impl TreeQuery {
    /// Create a new query service over a store
    pub fn new(store: Arc<dyn TreeStore>) -> Self {
        Self { store }
    }

    /// Access the underlying store
    pub fn store(&self) -> &Arc<dyn TreeStore> {
        &self.store
    }

    /// Get all ancestors of a node, ordered root → parent.
    ///
    /// An ancestor is any node of the same tree whose interval contains the
    /// node's interval; `include_self` appends the node itself at the end.
    pub async fn get_ancestors(
        &self,
        node: &TreeNode,
        include_self: bool,
    ) -> Result<Vec<TreeNode>, TreeServiceError> {
        let mut ancestors = self
            .store
            .get_ancestor_range(node.tree_id, node.lft, node.rgt)
            .await
            .map_err(|e| TreeServiceError::query_failed(e.to_string()))?;

        if !include_self {
            ancestors.retain(|m| m.id != node.id);
        }

        Ok(ancestors)
    }

    /// Get the parent of a node, memoized per traversal pass.
    ///
    /// Pass `update = true` to bypass and refresh the memo, e.g. right
    /// after a move.
    pub async fn get_parent(
        &self,
        node: &TreeNode,
        memo: &mut TraversalMemo,
        update: bool,
    ) -> Result<Option<TreeNode>, TreeServiceError> {
        if !update {
            if let Some(parent) = memo.parents.get(&node.id) {
                return Ok(parent.clone());
            }
        }

        let parent = if node.is_root() {
            None
        } else {
            self.get_ancestors(node, false).await?.pop()
        };

        memo.parents.insert(node.id.clone(), parent.clone());
        Ok(parent)
    }

    /// Get all descendants of a node in pre-order.
    ///
    /// Leaves short-circuit without touching the store: `rgt - lft == 1`
    /// already proves the subtree is empty.
    pub async fn get_descendants(
        &self,
        node: &TreeNode,
        include_self: bool,
    ) -> Result<Vec<TreeNode>, TreeServiceError> {
        if node.is_leaf() {
            return Ok(if include_self {
                vec![node.clone()]
            } else {
                Vec::new()
            });
        }

        let descendants = self
            .store
            .get_descendant_range(node.tree_id, node.lft, node.rgt)
            .await
            .map_err(|e| TreeServiceError::query_failed(e.to_string()))?;

        let mut result = Vec::with_capacity(descendants.len() + 1);
        if include_self {
            result.push(node.clone());
        }
        result.extend(descendants);
        Ok(result)
    }

    /// Get descendants down to `max_depth` levels below the node, for
    /// bounded/lazy rendering of large subtrees.
    pub async fn get_descendants_max_depth(
        &self,
        node: &TreeNode,
        include_self: bool,
        max_depth: i64,
    ) -> Result<Vec<TreeNode>, TreeServiceError> {
        let limit = node.depth + max_depth;
        let mut descendants = self.get_descendants(node, include_self).await?;
        descendants.retain(|m| m.depth <= limit);
        Ok(descendants)
    }

    /// Get the direct children of a node in left-to-right order.
    ///
    /// Derived from the nested set: descendants exactly one level down.
    pub async fn get_children(&self, node: &TreeNode) -> Result<Vec<TreeNode>, TreeServiceError> {
        self.get_descendants_max_depth(node, false, 1).await
    }

    /// Get a node's siblings within its region, the node itself included,
    /// in left-to-right order.
    ///
    /// For a root node (`lft == 1`) the sibling group is the region's whole
    /// forest of root nodes across tree ids, ordered by `tree_id`; for any
    /// other node it is the children of its parent.
    pub async fn get_region_siblings(
        &self,
        node: &TreeNode,
    ) -> Result<Vec<TreeNode>, TreeServiceError> {
        if node.is_root() {
            return self
                .store
                .get_region_roots(&node.region_id)
                .await
                .map_err(|e| TreeServiceError::query_failed(e.to_string()));
        }

        let mut memo = TraversalMemo::new();
        let parent = self
            .get_parent(node, &mut memo, false)
            .await?
            .ok_or_else(|| TreeServiceError::node_not_found(format!("parent of {}", node.id)))?;

        self.get_children(&parent).await
    }

    /// The sibling immediately to the left of the node within its region,
    /// if any
    pub async fn get_prev_region_sibling(
        &self,
        node: &TreeNode,
    ) -> Result<Option<TreeNode>, TreeServiceError> {
        let siblings = self.get_region_siblings(node).await?;
        let pos = siblings.iter().position(|m| m.id == node.id);
        Ok(match pos {
            Some(i) if i > 0 => Some(siblings[i - 1].clone()),
            _ => None,
        })
    }

    /// The sibling immediately to the right of the node within its region,
    /// if any
    pub async fn get_next_region_sibling(
        &self,
        node: &TreeNode,
    ) -> Result<Option<TreeNode>, TreeServiceError> {
        let mut siblings = self.get_region_siblings(node).await?;
        let pos = siblings.iter().position(|m| m.id == node.id);
        Ok(match pos {
            Some(i) if i + 1 < siblings.len() => Some(siblings.swap_remove(i + 1)),
            _ => None,
        })
    }
}
