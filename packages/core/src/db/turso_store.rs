//! TursoStore - TreeStore Implementation for Turso/libsql
//!
//! This module implements the `TreeStore` trait for the embedded libsql
//! database, delegating all SQL to the extracted `db_*` methods on
//! `DatabaseService`.
//!
//! # Design Principles
//!
//! 1. **Pure Delegation**: all methods delegate to DatabaseService
//! 2. **Row Conversion**: `row_to_node` is the single row-values → TreeNode
//!    conversion point for every query
//! 3. **No business logic**: guards, shifts and renumbering live in the
//!    service layer

use crate::db::tree_store::TreeStore;
use crate::db::{DatabaseService, DbCreateNodeParams, DbUpdateNodeParams};
use crate::models::{NodeKind, TreeNode};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use libsql::Value;
use std::sync::Arc;

/// TreeStore implementation for the Turso/libsql backend
pub struct TursoStore {
    /// Underlying database service (extracted SQL operations)
    db: Arc<DatabaseService>,
}

impl TursoStore {
    /// Create a new TursoStore wrapper
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use regio_core::db::{DatabaseService, TursoStore};
    /// # use std::path::PathBuf;
    /// # use std::sync::Arc;
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let db = Arc::new(DatabaseService::new(PathBuf::from("./regio.db")).await?);
    /// let store = TursoStore::new(db);
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(db: Arc<DatabaseService>) -> Self {
        Self { db }
    }

    /// Parse timestamp from database - handles both SQLite and RFC3339 formats
    ///
    /// SQLite CURRENT_TIMESTAMP returns: "YYYY-MM-DD HH:MM:SS"
    /// Old data might use RFC3339: "YYYY-MM-DDTHH:MM:SSZ"
    fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
            return Ok(naive.and_utc());
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(dt.with_timezone(&Utc));
        }

        Err(anyhow::anyhow!(
            "Unable to parse timestamp '{}' as SQLite or RFC3339 format",
            s
        ))
    }

    /// Read a TEXT column from a materialized row
    fn col_text(row: &[Value], idx: usize) -> Result<String> {
        match row.get(idx) {
            Some(Value::Text(s)) => Ok(s.clone()),
            other => Err(anyhow::anyhow!("expected text, got {:?}", other)),
        }
    }

    /// Read a nullable TEXT column from a materialized row
    fn col_opt_text(row: &[Value], idx: usize) -> Result<Option<String>> {
        match row.get(idx) {
            Some(Value::Text(s)) => Ok(Some(s.clone())),
            Some(Value::Null) => Ok(None),
            other => Err(anyhow::anyhow!("expected text or null, got {:?}", other)),
        }
    }

    /// Read an INTEGER column from a materialized row
    fn col_int(row: &[Value], idx: usize) -> Result<i64> {
        match row.get(idx) {
            Some(Value::Integer(i)) => Ok(*i),
            other => Err(anyhow::anyhow!("expected integer, got {:?}", other)),
        }
    }

    /// Convert a materialized row (owned column values) to TreeNode
    ///
    /// # Row Format
    ///
    /// Expected columns, in the `NODE_COLUMNS` order:
    /// id, kind, title, parent_id, tree_id, lft, rgt, depth, region_id,
    /// explicitly_archived, created_at, modified_at
    fn row_to_node(row: &[Value]) -> Result<TreeNode> {
        let id: String = Self::col_text(row, 0).context("Failed to get id")?;
        let kind_str: String = Self::col_text(row, 1).context("Failed to get kind")?;
        let title: String = Self::col_text(row, 2).context("Failed to get title")?;
        let parent_id: Option<String> =
            Self::col_opt_text(row, 3).context("Failed to get parent_id")?;
        let tree_id: i64 = Self::col_int(row, 4).context("Failed to get tree_id")?;
        let lft: i64 = Self::col_int(row, 5).context("Failed to get lft")?;
        let rgt: i64 = Self::col_int(row, 6).context("Failed to get rgt")?;
        let depth: i64 = Self::col_int(row, 7).context("Failed to get depth")?;
        let region_id: String = Self::col_text(row, 8).context("Failed to get region_id")?;
        let archived: i64 = Self::col_int(row, 9).context("Failed to get explicitly_archived")?;
        let created_at_str: String = Self::col_text(row, 10).context("Failed to get created_at")?;
        let modified_at_str: String =
            Self::col_text(row, 11).context("Failed to get modified_at")?;

        let kind = NodeKind::parse(&kind_str)
            .ok_or_else(|| anyhow::anyhow!("Unknown node kind '{}'", kind_str))?;

        let created_at =
            Self::parse_timestamp(&created_at_str).context("Failed to parse created_at")?;
        let modified_at =
            Self::parse_timestamp(&modified_at_str).context("Failed to parse modified_at")?;

        Ok(TreeNode {
            id,
            kind,
            title,
            parent_id,
            tree_id,
            lft,
            rgt,
            depth,
            region_id,
            explicitly_archived: archived != 0,
            created_at,
            modified_at,
        })
    }

    fn rows_to_nodes(rows: Vec<Vec<Value>>) -> Result<Vec<TreeNode>> {
        rows.iter().map(|row| Self::row_to_node(row)).collect()
    }
}

#[async_trait]
impl TreeStore for TursoStore {
    async fn create_node(&self, node: TreeNode) -> Result<TreeNode> {
        let params = DbCreateNodeParams {
            id: &node.id,
            kind: node.kind.as_str(),
            title: &node.title,
            parent_id: node.parent_id.as_deref(),
            tree_id: node.tree_id,
            lft: node.lft,
            rgt: node.rgt,
            depth: node.depth,
            region_id: &node.region_id,
            explicitly_archived: node.explicitly_archived,
        };

        self.db
            .db_create_node(params)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create node: {}", e))?;

        self.get_node(&node.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Node not found after creation"))
    }

    async fn get_node(&self, id: &str) -> Result<Option<TreeNode>> {
        match self
            .db
            .db_get_node(id)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to get node: {}", e))?
        {
            Some(row) => Ok(Some(Self::row_to_node(&row)?)),
            None => Ok(None),
        }
    }

    async fn update_node(&self, node: TreeNode) -> Result<TreeNode> {
        let params = DbUpdateNodeParams {
            id: &node.id,
            kind: node.kind.as_str(),
            title: &node.title,
            parent_id: node.parent_id.as_deref(),
            tree_id: node.tree_id,
            lft: node.lft,
            rgt: node.rgt,
            depth: node.depth,
            region_id: &node.region_id,
            explicitly_archived: node.explicitly_archived,
        };

        self.db
            .db_update_node(params)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to update node: {}", e))?;

        self.get_node(&node.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Node not found after update"))
    }

    async fn update_nodes(&self, nodes: Vec<TreeNode>) -> Result<()> {
        for node in nodes {
            let params = DbUpdateNodeParams {
                id: &node.id,
                kind: node.kind.as_str(),
                title: &node.title,
                parent_id: node.parent_id.as_deref(),
                tree_id: node.tree_id,
                lft: node.lft,
                rgt: node.rgt,
                depth: node.depth,
                region_id: &node.region_id,
                explicitly_archived: node.explicitly_archived,
            };

            self.db
                .db_update_node(params)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to update node {}: {}", node.id, e))?;
        }

        Ok(())
    }

    async fn get_tree(&self, tree_id: i64) -> Result<Vec<TreeNode>> {
        let rows = self
            .db
            .db_get_tree(tree_id)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to get tree: {}", e))?;
        Self::rows_to_nodes(rows)
    }

    async fn get_children_of(&self, parent_id: &str) -> Result<Vec<TreeNode>> {
        let rows = self
            .db
            .db_get_children(parent_id)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to get children: {}", e))?;
        Self::rows_to_nodes(rows)
    }

    async fn get_ancestor_range(&self, tree_id: i64, lft: i64, rgt: i64) -> Result<Vec<TreeNode>> {
        let rows = self
            .db
            .db_get_ancestor_range(tree_id, lft, rgt)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to get ancestors: {}", e))?;
        Self::rows_to_nodes(rows)
    }

    async fn get_descendant_range(
        &self,
        tree_id: i64,
        lft: i64,
        rgt: i64,
    ) -> Result<Vec<TreeNode>> {
        let rows = self
            .db
            .db_get_descendant_range(tree_id, lft, rgt)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to get descendants: {}", e))?;
        Self::rows_to_nodes(rows)
    }

    async fn get_region_nodes(&self, region_id: &str) -> Result<Vec<TreeNode>> {
        let rows = self
            .db
            .db_get_region_nodes(region_id)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to get region nodes: {}", e))?;
        Self::rows_to_nodes(rows)
    }

    async fn get_region_roots(&self, region_id: &str) -> Result<Vec<TreeNode>> {
        let rows = self
            .db
            .db_get_region_roots(region_id)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to get region roots: {}", e))?;
        Self::rows_to_nodes(rows)
    }

    async fn shift_tree(&self, tree_id: i64, threshold: i64, delta: i64) -> Result<u64> {
        self.db
            .db_shift_tree(tree_id, threshold, delta)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to shift tree {}: {}", tree_id, e))
    }

    async fn next_tree_id(&self) -> Result<i64> {
        self.db
            .db_next_tree_id()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to allocate tree id: {}", e))
    }

    async fn close(&self) -> Result<()> {
        // libsql local databases flush on drop; nothing to do beyond letting
        // the Arc unwind.
        Ok(())
    }
}
