//! Tree Consistency Repair
//!
//! The nested-set numbering is the source of truth for reads, but when a
//! crash lands between a boundary shift and the row writes that follow it,
//! the numbering itself is what breaks. `TreeRepair` recovers by walking
//! the redundant `parent_id` chain instead: it locates the root, renumbers
//! the whole tree with an iterative pre-order pass, reports every field
//! that disagrees with the stored values, and flags rows that carry the
//! tree's id but are unreachable from the root.
//!
//! The checker is read-only by default; `commit = true` writes the
//! proposed values back, bracketed by epoch bumps. Running it twice in a
//! row with commit must report zero differences the second time.

use crate::db::{TreeEpochs, TreeStore};
use crate::models::TreeNode;
use crate::services::error::TreeServiceError;
use std::collections::HashSet;
use std::sync::Arc;

/// One field whose stored value disagrees with the recomputed value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDiff {
    pub field: &'static str,
    pub stored: i64,
    pub proposed: i64,
}

/// Per-node outcome of a repair pass
#[derive(Debug, Clone)]
pub struct NodeCheck {
    pub id: String,
    pub title: String,
    pub diffs: Vec<FieldDiff>,
}

impl NodeCheck {
    /// Whether the stored tuple already matched the recomputed one
    pub fn is_consistent(&self) -> bool {
        self.diffs.is_empty()
    }
}

/// Full outcome of one repair pass over one tree
#[derive(Debug)]
pub struct RepairReport {
    /// Root the pass renumbered from
    pub root_id: String,
    /// Tree id the renumbering assigned
    pub tree_id: i64,
    /// Every visited node, in the recomputed pre-order
    pub checks: Vec<NodeCheck>,
    /// Rows carrying `tree_id` that the parent/children relation never
    /// reached from the root
    pub orphans: Vec<TreeNode>,
    /// Whether proposed values were written back
    pub committed: bool,
}

impl RepairReport {
    /// Number of visited nodes whose stored tuple needed changes
    pub fn inconsistent_count(&self) -> usize {
        self.checks.iter().filter(|c| !c.is_consistent()).count()
    }

    /// Whether the tree was already fully consistent (no diffs, no
    /// orphans)
    pub fn is_consistent(&self) -> bool {
        self.inconsistent_count() == 0 && self.orphans.is_empty()
    }
}

struct Frame {
    node: TreeNode,
    children: Vec<TreeNode>,
    next: usize,
    lft: i64,
    depth: i64,
    slot: usize,
}

/// Offline consistency checker and fixer for one tree
pub struct TreeRepair {
    store: Arc<dyn TreeStore>,
    epochs: Arc<TreeEpochs>,
}

impl TreeRepair {
    /// Create a new repair service over a store
    pub fn new(store: Arc<dyn TreeStore>, epochs: Arc<TreeEpochs>) -> Self {
        Self { store, epochs }
    }

    async fn require_node(&self, id: &str) -> Result<TreeNode, TreeServiceError> {
        self.store
            .get_node(id)
            .await
            .map_err(|e| TreeServiceError::query_failed(e.to_string()))?
            .ok_or_else(|| TreeServiceError::node_not_found(id))
    }

    /// Walk the parent chain from any node up to the tree's root.
    ///
    /// The walk is cycle-guarded: revisiting an id means the pointer chain
    /// loops and the tree cannot be repaired automatically.
    async fn locate_root(&self, start: &TreeNode) -> Result<TreeNode, TreeServiceError> {
        let mut seen = HashSet::new();
        seen.insert(start.id.clone());
        let mut current = start.clone();

        while let Some(parent_id) = current.parent_id.clone() {
            if !seen.insert(parent_id.clone()) {
                return Err(TreeServiceError::parent_cycle(parent_id));
            }
            current = self.require_node(&parent_id).await?;
        }

        Ok(current)
    }

    /// Check one tree's numbering against the parent chain, optionally
    /// writing the recomputed values back.
    ///
    /// `node_id` may be any member of the tree; the pass always starts from
    /// the located root. The orphan scan compares the tree's stored row set
    /// against the visited set before anything is written, so a committed
    /// pass reports the same orphans a dry run would.
    pub async fn check_tree(
        &self,
        node_id: &str,
        commit: bool,
    ) -> Result<RepairReport, TreeServiceError> {
        let start = self.require_node(node_id).await?;
        let root = self.locate_root(&start).await?;
        let tree_id = root.tree_id;

        tracing::info!(
            root_id = %root.id,
            tree_id,
            commit,
            "starting tree repair pass"
        );

        // Iterative pre-order renumbering over the parent/children
        // relation. Children come back ordered by stored lft with id as
        // tiebreak, so surviving order is preserved even when intervals
        // collide. A node's rgt is only known once its subtree is done, so
        // each frame remembers its pre-order slot and fills it on pop.
        let mut slots: Vec<Option<(NodeCheck, TreeNode)>> = Vec::new();
        let mut fixed = Vec::new();
        let mut visited = HashSet::new();

        let mut counter: i64 = 1;
        visited.insert(root.id.clone());
        let root_children = self.children_of(&root, &mut visited).await?;
        slots.push(None);
        let mut stack = vec![Frame {
            node: root,
            children: root_children,
            next: 0,
            lft: counter,
            depth: 1,
            slot: 0,
        }];

        while let Some(frame) = stack.last_mut() {
            if frame.next < frame.children.len() {
                let child = frame.children[frame.next].clone();
                frame.next += 1;
                let depth = frame.depth + 1;
                counter += 1;
                let children = self.children_of(&child, &mut visited).await?;
                let slot = slots.len();
                slots.push(None);
                stack.push(Frame {
                    node: child,
                    children,
                    next: 0,
                    lft: counter,
                    depth,
                    slot,
                });
            } else {
                let frame = stack.pop().expect("frame stack underflow");
                counter += 1;
                slots[frame.slot] =
                    Some(diff_node(frame.node, tree_id, frame.lft, counter, frame.depth));
            }
        }

        let mut checks = Vec::with_capacity(slots.len());
        for slot in slots {
            let (check, repaired) = slot.expect("unfilled pre-order slot");
            if !check.is_consistent() {
                fixed.push(repaired);
            }
            checks.push(check);
        }

        let orphans = self.find_orphans(tree_id, &visited).await?;

        if commit && !fixed.is_empty() {
            self.epochs.bump(tree_id);
            self.store
                .update_nodes(fixed)
                .await
                .map_err(|e| TreeServiceError::query_failed(e.to_string()))?;
            self.epochs.bump(tree_id);
        }

        let report = RepairReport {
            root_id: checks
                .first()
                .map(|c| c.id.clone())
                .unwrap_or_default(),
            tree_id,
            checks,
            orphans,
            committed: commit,
        };

        tracing::info!(
            tree_id,
            inconsistent = report.inconsistent_count(),
            orphans = report.orphans.len(),
            committed = report.committed,
            "tree repair pass finished"
        );
        Ok(report)
    }

    async fn children_of(
        &self,
        node: &TreeNode,
        visited: &mut HashSet<String>,
    ) -> Result<Vec<TreeNode>, TreeServiceError> {
        let children = self
            .store
            .get_children_of(&node.id)
            .await
            .map_err(|e| TreeServiceError::query_failed(e.to_string()))?;

        // A corrupted parent relation can alias a node under two parents;
        // each node is renumbered exactly once.
        Ok(children
            .into_iter()
            .filter(|c| visited.insert(c.id.clone()))
            .collect())
    }

    async fn find_orphans(
        &self,
        tree_id: i64,
        visited: &HashSet<String>,
    ) -> Result<Vec<TreeNode>, TreeServiceError> {
        let members = self
            .store
            .get_tree(tree_id)
            .await
            .map_err(|e| TreeServiceError::query_failed(e.to_string()))?;

        Ok(members
            .into_iter()
            .filter(|m| !visited.contains(&m.id))
            .collect())
    }
}

fn diff_node(
    mut node: TreeNode,
    tree_id: i64,
    lft: i64,
    rgt: i64,
    depth: i64,
) -> (NodeCheck, TreeNode) {
    let mut diffs = Vec::new();
    let mut push = |field: &'static str, stored: i64, proposed: i64| {
        if stored != proposed {
            diffs.push(FieldDiff {
                field,
                stored,
                proposed,
            });
        }
    };
    push("tree_id", node.tree_id, tree_id);
    push("lft", node.lft, lft);
    push("rgt", node.rgt, rgt);
    push("depth", node.depth, depth);

    let check = NodeCheck {
        id: node.id.clone(),
        title: node.title.clone(),
        diffs,
    };

    node.tree_id = tree_id;
    node.lft = lft;
    node.rgt = rgt;
    node.depth = depth;
    (check, node)
}
