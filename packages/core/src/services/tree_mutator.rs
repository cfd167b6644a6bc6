//! Structural Tree Mutation
//!
//! `TreeMutator` owns every write that changes tree shape: bootstrapping a
//! region's first tree, inserting children and siblings, relocating whole
//! subtrees, and the self-healing `save`.
//!
//! # Write contract
//!
//! Insertion and relocation open an interval gap with a set-based shift
//! (`TreeStore::shift_tree`) and then write the affected rows. The shift
//! and the row writes are NOT one transaction; the mutator brackets the
//! whole operation with epoch bumps (`TreeEpochs`) so readers can detect
//! staleness, and a failure between the two writes leaves a numbering
//! inconsistency that `TreeRepair` recovers from. Callers must serialize
//! mutations per `tree_id`: running two mutations concurrently against
//! the same tree corrupts the numbering even without a crash.
//!
//! # Region boundaries
//!
//! Every interior node shares its parent's region. A subtree may only cross
//! a region boundary by becoming a standalone root-level tree next to the
//! target region's roots; any other cross-region position is rejected with
//! `InvalidPosition` before anything is written.

use crate::db::{TreeEpochs, TreeStore};
use crate::models::{NewNode, TreeNode};
use crate::services::error::TreeServiceError;
use crate::services::tree_query::{TraversalMemo, TreeQuery};
use std::sync::Arc;

/// Insertion position relative to an existing node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// Leftmost child of the reference node's parent (for siblings) or of
    /// the target (for moves)
    FirstChild,
    /// Rightmost child
    LastChild,
    /// Immediately left of the reference node
    Left,
    /// Immediately right of the reference node
    Right,
}

/// Structural writes over the stored nested-set forest
pub struct TreeMutator {
    store: Arc<dyn TreeStore>,
    query: TreeQuery,
    epochs: Arc<TreeEpochs>,
}

impl TreeMutator {
    /// Create a new mutator over a store, sharing the process-wide epoch
    /// counters with readers
    pub fn new(store: Arc<dyn TreeStore>, epochs: Arc<TreeEpochs>) -> Self {
        let query = TreeQuery::new(store.clone());
        Self {
            store,
            query,
            epochs,
        }
    }

    async fn require_node(&self, id: &str) -> Result<TreeNode, TreeServiceError> {
        self.store
            .get_node(id)
            .await
            .map_err(|e| TreeServiceError::query_failed(e.to_string()))?
            .ok_or_else(|| TreeServiceError::node_not_found(id))
    }

    /// Create a new standalone tree in a region.
    ///
    /// The node becomes the root of a fresh `tree_id` and joins the
    /// region's root sibling group.
    pub async fn add_root(
        &self,
        region_id: &str,
        new: NewNode,
    ) -> Result<TreeNode, TreeServiceError> {
        let tree_id = self
            .store
            .next_tree_id()
            .await
            .map_err(|e| TreeServiceError::query_failed(e.to_string()))?;

        let node = TreeNode::with_position(new, region_id.to_string(), None, tree_id, 1, 2, 1);
        node.validate()?;

        self.epochs.bump(tree_id);
        let created = self
            .store
            .create_node(node)
            .await
            .map_err(|e| TreeServiceError::query_failed(e.to_string()))?;
        self.epochs.bump(tree_id);

        tracing::info!(node_id = %created.id, tree_id, region_id, "created root node");
        Ok(created)
    }

    /// Insert a new rightmost child under a parent.
    ///
    /// Shifts every boundary at or right of the insertion point by 2 in one
    /// set-based write, then inserts the child as a leaf.
    pub async fn add_child(
        &self,
        parent_id: &str,
        new: NewNode,
    ) -> Result<TreeNode, TreeServiceError> {
        let parent = self.require_node(parent_id).await?;
        let at = parent.rgt;

        let node = TreeNode::with_position(
            new,
            parent.region_id.clone(),
            Some(parent.id.clone()),
            parent.tree_id,
            at,
            at + 1,
            parent.depth + 1,
        );
        node.validate()?;

        self.epochs.bump(parent.tree_id);
        self.store
            .shift_tree(parent.tree_id, at, 2)
            .await
            .map_err(|e| TreeServiceError::query_failed(e.to_string()))?;
        let created = self
            .store
            .create_node(node)
            .await
            .map_err(|e| TreeServiceError::query_failed(e.to_string()))?;
        self.epochs.bump(parent.tree_id);

        tracing::info!(
            node_id = %created.id,
            parent_id = %parent.id,
            tree_id = parent.tree_id,
            "inserted child node"
        );
        Ok(created)
    }

    /// Insert a new sibling relative to an existing node.
    ///
    /// `Left`/`Right` insert next to the node itself; `FirstChild`/
    /// `LastChild` insert at the edges of the node's sibling group. For a
    /// root node the sibling group is the region's forest, so the new node
    /// becomes the root of a fresh tree. Root trees are ordered by
    /// `tree_id`, which only grows, so the requested side is moot there.
    pub async fn add_sibling(
        &self,
        node_id: &str,
        pos: Position,
        new: NewNode,
    ) -> Result<TreeNode, TreeServiceError> {
        let node = self.require_node(node_id).await?;

        if node.is_root() {
            return self.add_root(&node.region_id, new).await;
        }

        let mut memo = TraversalMemo::new();
        let parent = self
            .query
            .get_parent(&node, &mut memo, true)
            .await?
            .ok_or_else(|| {
                TreeServiceError::query_failed(format!(
                    "non-root node {} has no ancestor; run repair",
                    node.id
                ))
            })?;

        let at = match pos {
            Position::Left => node.lft,
            Position::Right => node.rgt + 1,
            Position::FirstChild => parent.lft + 1,
            Position::LastChild => parent.rgt,
        };

        let sibling = TreeNode::with_position(
            new,
            node.region_id.clone(),
            Some(parent.id.clone()),
            node.tree_id,
            at,
            at + 1,
            node.depth,
        );
        sibling.validate()?;

        self.epochs.bump(node.tree_id);
        self.store
            .shift_tree(node.tree_id, at, 2)
            .await
            .map_err(|e| TreeServiceError::query_failed(e.to_string()))?;
        let created = self
            .store
            .create_node(sibling)
            .await
            .map_err(|e| TreeServiceError::query_failed(e.to_string()))?;
        self.epochs.bump(node.tree_id);

        tracing::info!(
            node_id = %created.id,
            reference = %node.id,
            ?pos,
            tree_id = node.tree_id,
            "inserted sibling node"
        );
        Ok(created)
    }

    /// Relocate a node and its whole subtree relative to a target.
    ///
    /// Cross-region moves are only allowed onto a root with `Left`/`Right`
    /// (the subtree becomes a standalone tree in the target's region); any
    /// other cross-region position fails with `InvalidPosition`. Within a
    /// region, all four positions are allowed as long as the target is not
    /// inside the moved subtree.
    ///
    /// On success the subtree's `(tree_id, lft, rgt, depth)` tuples and the
    /// displaced rows in both source and destination trees are recomputed.
    pub async fn move_node(
        &self,
        node_id: &str,
        target_id: &str,
        pos: Position,
    ) -> Result<TreeNode, TreeServiceError> {
        let node = self.require_node(node_id).await?;
        let target = self.require_node(target_id).await?;

        if node.id == target.id {
            return Err(TreeServiceError::invalid_position(format!(
                "cannot move node {} relative to itself",
                node.id
            )));
        }
        if target.is_descendant_of(&node) {
            return Err(TreeServiceError::invalid_position(format!(
                "target {} is inside the subtree of {}",
                target.id, node.id
            )));
        }

        let as_new_root = target.is_root() && matches!(pos, Position::Left | Position::Right);
        if node.region_id != target.region_id && !as_new_root {
            return Err(TreeServiceError::invalid_position(format!(
                "node {} may only enter region {} as a root-level tree, not as an interior node",
                node.id, target.region_id
            )));
        }

        self.epochs.bump(node.tree_id);
        if target.tree_id != node.tree_id {
            self.epochs.bump(target.tree_id);
        }

        // Capture the subtree rows before any boundary moves (pre-order,
        // moved node first).
        let mut subtree = vec![node.clone()];
        if !node.is_leaf() {
            let descendants = self
                .store
                .get_descendant_range(node.tree_id, node.lft, node.rgt)
                .await
                .map_err(|e| TreeServiceError::query_failed(e.to_string()))?;
            subtree.extend(descendants);
        }
        let width = node.interval_width();

        // Close the gap the subtree leaves behind. A root owns its whole
        // tree, so there is nothing to close in that case.
        if !node.is_root() {
            self.store
                .shift_tree(node.tree_id, node.rgt + 1, -width)
                .await
                .map_err(|e| TreeServiceError::query_failed(e.to_string()))?;
        }

        // The target's own coordinates may have moved with the gap close
        // when it shares the source tree.
        let target = self.require_node(target_id).await?;

        if as_new_root {
            // Stand the subtree up as its own tree in the target's region.
            let new_tree_id = if node.is_root() {
                node.tree_id
            } else {
                self.store
                    .next_tree_id()
                    .await
                    .map_err(|e| TreeServiceError::query_failed(e.to_string()))?
            };
            let d_lft = 1 - node.lft;
            let d_depth = 1 - node.depth;
            for row in subtree.iter_mut() {
                row.tree_id = new_tree_id;
                row.lft += d_lft;
                row.rgt += d_lft;
                row.depth += d_depth;
                row.region_id = target.region_id.clone();
            }
            subtree[0].parent_id = None;
        } else {
            let (at, new_depth, new_parent_id) = match pos {
                Position::FirstChild => (target.lft + 1, target.depth + 1, Some(target.id.clone())),
                Position::LastChild => (target.rgt, target.depth + 1, Some(target.id.clone())),
                Position::Left | Position::Right => {
                    let mut memo = TraversalMemo::new();
                    let parent = self.query.get_parent(&target, &mut memo, true).await?;
                    let at = if pos == Position::Left {
                        target.lft
                    } else {
                        target.rgt + 1
                    };
                    (at, target.depth, parent.map(|p| p.id))
                }
            };

            self.store
                .shift_tree(target.tree_id, at, width)
                .await
                .map_err(|e| TreeServiceError::query_failed(e.to_string()))?;

            let d_lft = at - node.lft;
            let d_depth = new_depth - node.depth;
            for row in subtree.iter_mut() {
                row.tree_id = target.tree_id;
                row.lft += d_lft;
                row.rgt += d_lft;
                row.depth += d_depth;
            }
            subtree[0].parent_id = new_parent_id;
        }

        subtree[0].validate()?;
        let dest_tree_id = subtree[0].tree_id;

        self.store
            .update_nodes(subtree)
            .await
            .map_err(|e| TreeServiceError::query_failed(e.to_string()))?;

        self.epochs.bump(node.tree_id);
        if dest_tree_id != node.tree_id {
            self.epochs.bump(dest_tree_id);
        }

        tracing::info!(
            node_id = %node.id,
            target_id = %target.id,
            ?pos,
            source_tree = node.tree_id,
            dest_tree = dest_tree_id,
            "moved subtree"
        );

        self.require_node(node_id).await
    }

    /// Persist a node's non-structural fields.
    ///
    /// Before writing, the redundant `parent_id` is re-derived from the
    /// authoritative nested-set position, healing any drift between the
    /// pointer and the true structural position.
    pub async fn save(&self, mut node: TreeNode) -> Result<TreeNode, TreeServiceError> {
        node.validate()?;

        let parent = if node.is_root() {
            None
        } else {
            self.query.get_ancestors(&node, false).await?.pop()
        };
        let derived = parent.map(|p| p.id);
        if node.parent_id != derived {
            tracing::warn!(
                node_id = %node.id,
                stored = ?node.parent_id,
                derived = ?derived,
                "healed stale parent pointer on save"
            );
            node.parent_id = derived;
        }

        self.store
            .update_node(node)
            .await
            .map_err(|e| TreeServiceError::query_failed(e.to_string()))
    }
}
