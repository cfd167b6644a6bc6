//! TreeStore Trait - Database Abstraction Layer
//!
//! This module defines the `TreeStore` trait that abstracts persistence of
//! tree nodes. The trait is the seam between the tree services (query,
//! mutation, repair, materialization) and the database implementation; the
//! services never see SQL.
//!
//! # Design Decisions
//!
//! 1. **Async-First**: all methods are async to support both embedded and
//!    network backends
//! 2. **Ownership Semantics**: write methods take ownership of values to
//!    avoid unnecessary cloning (caller can clone if needed)
//! 3. **Error Handling**: `anyhow::Result` for flexible error context;
//!    services map failures into `TreeServiceError`
//! 4. **Ordering Contract**: every list method returns rows in a documented
//!    order, because the materialization pass depends on pre-order input
//!
//! # Examples
//!
//! ```rust,no_run
//! use regio_core::db::{DatabaseService, TreeStore, TursoStore};
//! use regio_core::models::{NodeKind, TreeNode};
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let db = Arc::new(DatabaseService::new(PathBuf::from("./data/regio.db")).await?);
//!     let store: Arc<dyn TreeStore> = Arc::new(TursoStore::new(db));
//!
//!     let root = TreeNode::new_root(
//!         NodeKind::Page,
//!         "Welcome".to_string(),
//!         "augsburg".to_string(),
//!         store.next_tree_id().await?,
//!     );
//!     let created = store.create_node(root).await?;
//!     println!("created {}", created.id);
//!     Ok(())
//! }
//! ```

use crate::models::TreeNode;
use anyhow::Result;
use async_trait::async_trait;

/// Abstraction layer for tree node persistence
///
/// Implementations must be `Send + Sync` so futures can move between
/// threads in async contexts.
///
/// # Consistency contract
///
/// `shift_tree` plus the create/update that follows it are NOT atomic;
/// callers must serialize structural writes per `tree_id` and recover from
/// partial failures with the repair service. Read methods reflect whatever
/// state is currently persisted, consistent or not; repair depends on
/// being able to read corrupt rows.
#[async_trait]
pub trait TreeStore: Send + Sync {
    //
    // ROW OPERATIONS
    //

    /// Create a new node row
    ///
    /// Takes ownership of the node; returns the persisted row (with
    /// database-assigned timestamps).
    async fn create_node(&self, node: TreeNode) -> Result<TreeNode>;

    /// Get a node by ID
    ///
    /// `Ok(None)` when the node does not exist (not an error).
    async fn get_node(&self, id: &str) -> Result<Option<TreeNode>>;

    /// Persist a full node row; errors if the node does not exist
    async fn update_node(&self, node: TreeNode) -> Result<TreeNode>;

    /// Persist a batch of recomputed rows (move/repair write-back)
    async fn update_nodes(&self, nodes: Vec<TreeNode>) -> Result<()>;

    //
    // ORDERED READS
    //

    /// Every node of one tree, ordered by `lft` (pre-order)
    async fn get_tree(&self, tree_id: i64) -> Result<Vec<TreeNode>>;

    /// Direct children via the stored parent pointer, ordered by `lft`.
    ///
    /// This read trusts the adjacency relation, not the nested set; it
    /// exists for the repair pass.
    async fn get_children_of(&self, parent_id: &str) -> Result<Vec<TreeNode>>;

    /// All nodes whose interval contains `[lft, rgt]` (the node itself
    /// included), ordered root-first
    async fn get_ancestor_range(&self, tree_id: i64, lft: i64, rgt: i64) -> Result<Vec<TreeNode>>;

    /// All nodes strictly inside `(lft, rgt)`, in pre-order
    async fn get_descendant_range(&self, tree_id: i64, lft: i64, rgt: i64)
        -> Result<Vec<TreeNode>>;

    /// A region's whole forest ordered by `(tree_id, lft)`, the
    /// materialization input stream
    async fn get_region_nodes(&self, region_id: &str) -> Result<Vec<TreeNode>>;

    /// A region's root nodes (`lft == 1`), ordered by `tree_id`
    async fn get_region_roots(&self, region_id: &str) -> Result<Vec<TreeNode>>;

    //
    // STRUCTURAL WRITES
    //

    /// Set-based shift of every `lft`/`rgt` boundary at or beyond
    /// `threshold` in the given tree by `delta`; returns the number of
    /// rows whose boundaries moved
    async fn shift_tree(&self, tree_id: i64, threshold: i64, delta: i64) -> Result<u64>;

    /// Next unused tree identifier
    async fn next_tree_id(&self) -> Result<i64>;

    //
    // LIFECYCLE
    //

    /// Flush and release backend resources
    async fn close(&self) -> Result<()>;
}
