//! Filtered Region Materialization
//!
//! Presentation reads want a region's whole forest with archival and
//! translation filters already applied, plus the per-node relation lists
//! (ancestors, children, descendants) that menus and breadcrumbs consume.
//! `build_filtered_tree` computes all of that in one forward pass over the
//! region's rows in `(tree_id, lft)` order: by the time a row is visited,
//! its parent has already been decided, so inclusion, relative depth, and
//! every relation list fall out without a second pass.
//!
//! The materialized [`FilteredTree`] is immutable. It records the epoch of
//! every contributing tree at build time (`TreeEpochs`), so holders can
//! ask `is_current` instead of guessing how long to trust it.

use crate::db::{TreeEpochs, TreeStore};
use crate::models::{ArchivePolicy, TreeFilter, TreeNode};
use crate::services::error::TreeServiceError;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// One input row for a materialization pass: a stored node plus its
/// translation flag for the requested language
#[derive(Debug, Clone)]
pub struct CacheRow {
    pub node: TreeNode,
    pub has_translation: bool,
}

/// One node of a materialized filtered forest
#[derive(Debug, Clone)]
pub struct FilteredNode {
    pub node: TreeNode,
    pub has_translation: bool,
    /// Depth within the filtered view: 1 for every included node whose
    /// parent was excluded or absent, parent's depth + 1 otherwise
    pub relative_depth: i64,
    /// Included ancestors, ordered root → parent
    pub ancestors: Vec<String>,
    /// Included direct children, in pre-order
    pub children: Vec<String>,
    /// Included descendants, in pre-order
    pub descendants: Vec<String>,
}

/// Immutable materialization of one region's forest under one filter
#[derive(Debug, Default)]
pub struct FilteredTree {
    nodes: Vec<FilteredNode>,
    index: HashMap<String, usize>,
    skipped: Vec<TreeNode>,
    epochs: HashMap<i64, u64>,
}

impl FilteredTree {
    /// Included nodes in pre-order
    pub fn nodes(&self) -> &[FilteredNode] {
        &self.nodes
    }

    /// Look up an included node by id
    pub fn get(&self, id: &str) -> Option<&FilteredNode> {
        self.index.get(id).map(|i| &self.nodes[*i])
    }

    /// Whether a node made it into the view
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Number of included nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Input rows the filter excluded. Every input row lands either here
    /// or in `nodes`.
    pub fn skipped(&self) -> &[TreeNode] {
        &self.skipped
    }

    /// Whether no contributing tree has been structurally mutated since
    /// this view was built
    pub fn is_current(&self, epochs: &TreeEpochs) -> bool {
        epochs.matches(&self.epochs)
    }
}

/// Build a filtered forest from rows in `(tree_id, lft)` order.
///
/// Inclusion under [`ArchivePolicy::ArchivedOnly`] follows the archival
/// inheritance rule: a node is in the archived view when it is explicitly
/// archived or its parent is already in the view, so archival flows down
/// whole subtrees without flagging every row.
/// [`ArchivePolicy::NonArchivedOnly`] is the live-site complement: a node
/// must be unarchived, its parent must be in the view (roots stand on
/// their own), and when the filter requires a translation the node must
/// have one. [`ArchivePolicy::All`] includes everything.
pub fn build_filtered_tree(rows: Vec<CacheRow>, filter: &TreeFilter) -> FilteredTree {
    let mut tree = FilteredTree::default();

    for row in rows {
        let parent_idx = row
            .node
            .parent_id
            .as_deref()
            .and_then(|pid| tree.index.get(pid).copied());

        let included = match filter.archive {
            ArchivePolicy::All => true,
            ArchivePolicy::ArchivedOnly => {
                row.node.explicitly_archived || parent_idx.is_some()
            }
            ArchivePolicy::NonArchivedOnly => {
                !row.node.explicitly_archived
                    && (row.node.is_root() || parent_idx.is_some())
                    && (!filter.require_translation || row.has_translation)
            }
        };

        if !included {
            tree.skipped.push(row.node);
            continue;
        }

        let (relative_depth, ancestors) = match parent_idx {
            Some(pi) => {
                let parent = &tree.nodes[pi];
                let mut ancestors = parent.ancestors.clone();
                ancestors.push(parent.node.id.clone());
                (parent.relative_depth + 1, ancestors)
            }
            None => (1, Vec::new()),
        };

        let id = row.node.id.clone();
        for ancestor_id in &ancestors {
            let ai = tree.index[ancestor_id];
            tree.nodes[ai].descendants.push(id.clone());
        }
        if let Some(pi) = parent_idx {
            tree.nodes[pi].children.push(id.clone());
        }

        tree.index.insert(id, tree.nodes.len());
        tree.nodes.push(FilteredNode {
            node: row.node,
            has_translation: row.has_translation,
            relative_depth,
            ancestors,
            children: Vec::new(),
            descendants: Vec::new(),
        });
    }

    tree
}

/// Materializes filtered region views against the store
pub struct TreeCache {
    store: Arc<dyn TreeStore>,
    epochs: Arc<TreeEpochs>,
}

impl TreeCache {
    /// Create a new cache service over a store
    pub fn new(store: Arc<dyn TreeStore>, epochs: Arc<TreeEpochs>) -> Self {
        Self { store, epochs }
    }

    /// Materialize one region's forest under a filter.
    ///
    /// `has_translation` resolves the translation flag per node; it is a
    /// callback because translation storage lives outside the tree rows.
    /// The returned view carries an epoch snapshot of every tree that
    /// contributed rows.
    pub async fn materialize_region(
        &self,
        region_id: &str,
        filter: &TreeFilter,
        has_translation: impl Fn(&TreeNode) -> bool,
    ) -> Result<FilteredTree, TreeServiceError> {
        let nodes = self
            .store
            .get_region_nodes(region_id)
            .await
            .map_err(|e| TreeServiceError::query_failed(e.to_string()))?;

        let tree_ids: BTreeSet<i64> = nodes.iter().map(|n| n.tree_id).collect();
        let rows = nodes
            .into_iter()
            .map(|node| {
                let has_translation = has_translation(&node);
                CacheRow {
                    node,
                    has_translation,
                }
            })
            .collect();

        let mut tree = build_filtered_tree(rows, filter);
        tree.epochs = self.epochs.snapshot(tree_ids);

        tracing::debug!(
            region_id,
            included = tree.len(),
            skipped = tree.skipped().len(),
            ?filter,
            "materialized filtered region view"
        );
        Ok(tree)
    }
}
