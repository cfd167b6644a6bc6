//! Tree Node Data Structures
//!
//! This module defines the core `TreeNode` struct shared by every content
//! hierarchy in Regio (page trees and language trees).
//!
//! # Architecture
//!
//! - **Universal row**: a single struct represents all node kinds
//! - **Nested set**: `(tree_id, lft, rgt, depth)` encodes the hierarchy;
//!   interval containment is the ancestor relation
//! - **Redundant parent pointer**: `parent_id` duplicates structural
//!   information for convenience and for offline repair; it is re-derived
//!   from the nested set whenever a node is saved
//!
//! # Examples
//!
//! ```rust
//! use regio_core::models::{NodeKind, TreeNode};
//!
//! // A freshly created root tree for the "augsburg" region
//! let root = TreeNode::new_root(NodeKind::Page, "Welcome".to_string(), "augsburg".to_string(), 1);
//! assert!(root.is_root());
//! assert!(root.is_leaf());
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Validation errors for tree node structure
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Inverted nested-set interval on node {id}: lft={lft}, rgt={rgt}")]
    InvertedInterval { id: String, lft: i64, rgt: i64 },

    #[error("Invalid depth on node {id}: {depth} (must be >= 1)")]
    InvalidDepth { id: String, depth: i64 },

    #[error("Depth/interval mismatch on node {id}: depth 1 requires lft 1 and vice versa")]
    RootMismatch { id: String },

    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Concrete node kinds sharing the universal tree representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    /// A content page in a region's page tree
    Page,
    /// A node of a region's language tree
    LanguageTree,
}

impl NodeKind {
    /// Stable string form used in the database `kind` column
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Page => "page",
            NodeKind::LanguageTree => "language-tree",
        }
    }

    /// Parse the database string form back into a kind
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "page" => Some(NodeKind::Page),
            "language-tree" => Some(NodeKind::LanguageTree),
            _ => None,
        }
    }
}

/// Input for node creation through the mutator
///
/// Structural fields (`tree_id`, `lft`, `rgt`, `depth`, `parent_id`) are
/// assigned by `TreeMutator` at insertion time and are deliberately absent
/// here.
#[derive(Debug, Clone)]
pub struct NewNode {
    /// Node kind
    pub kind: NodeKind,

    /// Display title; translated bodies live in the content layer
    pub title: String,

    /// Persisted archival bit (descendants inherit archival implicitly)
    pub explicitly_archived: bool,
}

impl NewNode {
    /// A new, non-archived page
    pub fn page(title: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::Page,
            title: title.into(),
            explicitly_archived: false,
        }
    }

    /// A new language-tree node
    pub fn language_tree(title: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::LanguageTree,
            title: title.into(),
            explicitly_archived: false,
        }
    }

    /// Mark the new node as explicitly archived
    pub fn archived(mut self) -> Self {
        self.explicitly_archived = true;
        self
    }
}

/// Universal tree node for all content hierarchies in Regio.
///
/// # Fields
///
/// - `id`: Unique identifier (UUID v4)
/// - `kind`: Node kind (`page`, `language-tree`)
/// - `title`: Primary display title
/// - `parent_id`: Redundant adjacency pointer (None for roots)
/// - `tree_id`: Identifies the maximal connected tree this node belongs to;
///   unrelated trees never share a `tree_id`
/// - `lft`, `rgt`: Nested-set interval boundaries, always `lft < rgt`
/// - `depth`: Distance from the tree root; the root has `depth = 1`
/// - `region_id`: Owning tenant; every non-root node shares its parent's region
/// - `explicitly_archived`: The only persisted archival bit; descendants of
///   an archived node are archived implicitly
/// - `created_at`, `modified_at`: Timestamps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    /// Unique identifier (UUID v4)
    pub id: String,

    /// Node kind
    pub kind: NodeKind,

    /// Primary display title
    pub title: String,

    /// Redundant parent pointer (kept in sync as a convenience; the nested
    /// set is authoritative for traversal)
    pub parent_id: Option<String>,

    /// Connected-tree identifier within the region's forest
    pub tree_id: i64,

    /// Left nested-set boundary
    pub lft: i64,

    /// Right nested-set boundary
    pub rgt: i64,

    /// Distance from the root (root = 1)
    pub depth: i64,

    /// Owning tenant
    pub region_id: String,

    /// Persisted archival bit
    pub explicitly_archived: bool,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub modified_at: DateTime<Utc>,
}

impl TreeNode {
    /// Create a node with explicit structural coordinates.
    ///
    /// Used by `TreeMutator` when it has computed an insertion point; most
    /// callers should go through the mutator instead of constructing nodes
    /// directly.
    #[allow(clippy::too_many_arguments)]
    pub fn with_position(
        new: NewNode,
        region_id: String,
        parent_id: Option<String>,
        tree_id: i64,
        lft: i64,
        rgt: i64,
        depth: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            kind: new.kind,
            title: new.title,
            parent_id,
            tree_id,
            lft,
            rgt,
            depth,
            region_id,
            explicitly_archived: new.explicitly_archived,
            created_at: now,
            modified_at: now,
        }
    }

    /// Create a new leaf root node for a fresh tree
    pub fn new_root(kind: NodeKind, title: String, region_id: String, tree_id: i64) -> Self {
        Self::with_position(
            NewNode {
                kind,
                title,
                explicitly_archived: false,
            },
            region_id,
            None,
            tree_id,
            1,
            2,
            1,
        )
    }

    /// Whether this node is the root of its tree (`lft == 1`)
    pub fn is_root(&self) -> bool {
        self.lft == 1
    }

    /// Whether this node has no descendants
    pub fn is_leaf(&self) -> bool {
        self.rgt - self.lft == 1
    }

    /// Number of integer slots covered by this node's interval
    pub fn interval_width(&self) -> i64 {
        self.rgt - self.lft + 1
    }

    /// Number of nodes in the subtree rooted here (self included)
    pub fn subtree_size(&self) -> i64 {
        self.interval_width() / 2
    }

    /// Whether `self` is a strict descendant of `other`
    pub fn is_descendant_of(&self, other: &TreeNode) -> bool {
        self.tree_id == other.tree_id && other.lft < self.lft && self.rgt < other.rgt
    }

    /// Whether `self` is a strict ancestor of `other`
    pub fn is_ancestor_of(&self, other: &TreeNode) -> bool {
        other.is_descendant_of(self)
    }

    /// Validate the structural tuple of this node.
    ///
    /// Checks the intra-node invariants only; cross-node invariants
    /// (containment, sibling disjointness) are the repair pass's concern.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_empty() {
            return Err(ValidationError::MissingField("id".to_string()));
        }
        if self.region_id.is_empty() {
            return Err(ValidationError::MissingField("region_id".to_string()));
        }
        if self.lft >= self.rgt {
            return Err(ValidationError::InvertedInterval {
                id: self.id.clone(),
                lft: self.lft,
                rgt: self.rgt,
            });
        }
        if self.depth < 1 {
            return Err(ValidationError::InvalidDepth {
                id: self.id.clone(),
                depth: self.depth,
            });
        }
        if (self.depth == 1) != (self.lft == 1) {
            return Err(ValidationError::RootMismatch {
                id: self.id.clone(),
            });
        }
        Ok(())
    }
}
