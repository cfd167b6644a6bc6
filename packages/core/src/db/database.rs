//! Database Connection Management
//!
//! This module provides the core database connection and initialization
//! functionality using libsql/Turso for Regio's tree storage.
//!
//! # Architecture
//!
//! - **Path-agnostic**: Accepts any valid PathBuf
//! - **Single table**: the `tree_nodes` nested-set table; no migrations
//! - **WAL mode**: Write-Ahead Logging for better concurrency
//! - **Foreign keys**: Enabled for referential integrity
//!
//! # Database Connection Patterns
//!
//! **Always use `connect_with_timeout()` in async functions** to avoid
//! SQLite thread-safety violations when the Tokio runtime moves futures
//! between threads. The 5-second busy timeout lets concurrent operations
//! wait and retry instead of failing immediately with `SQLITE_BUSY`.
//!
//! Note that the busy timeout is a liveness aid, not a consistency
//! guarantee: structural tree writes are multiple statements and callers
//! must still serialize mutations per `tree_id` (see `TreeMutator`).

use crate::db::error::DatabaseError;
use libsql::{Builder, Database};
use std::path::PathBuf;
use std::sync::Arc;

/// Column list shared by every node SELECT; `row_to_node` in the store
/// depends on this exact order.
pub(crate) const NODE_COLUMNS: &str =
    "id, kind, title, parent_id, tree_id, lft, rgt, depth, region_id, \
     explicitly_archived, created_at, modified_at";

/// Database service for managing the libsql connection and schema
///
/// # Examples
///
/// ```no_run
/// use regio_core::db::DatabaseService;
/// use std::path::PathBuf;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let db_path = PathBuf::from("/path/to/regio.db");
///     let db_service = DatabaseService::new(db_path).await?;
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct DatabaseService {
    /// libsql database connection (wrapped in Arc for sharing)
    pub db: Arc<Database>,

    /// Path to the database file
    pub db_path: PathBuf,
}

/// Parameters for node insertion (avoids too-many-arguments lint)
pub struct DbCreateNodeParams<'a> {
    pub id: &'a str,
    pub kind: &'a str,
    pub title: &'a str,
    pub parent_id: Option<&'a str>,
    pub tree_id: i64,
    pub lft: i64,
    pub rgt: i64,
    pub depth: i64,
    pub region_id: &'a str,
    pub explicitly_archived: bool,
}

/// Parameters for node update (avoids too-many-arguments lint)
pub struct DbUpdateNodeParams<'a> {
    pub id: &'a str,
    pub kind: &'a str,
    pub title: &'a str,
    pub parent_id: Option<&'a str>,
    pub tree_id: i64,
    pub lft: i64,
    pub rgt: i64,
    pub depth: i64,
    pub region_id: &'a str,
    pub explicitly_archived: bool,
}

impl DatabaseService {
    /// Create a new DatabaseService with the specified database path
    ///
    /// This will:
    /// 1. Ensure the parent directory exists (create if needed)
    /// 2. Open/create the database file
    /// 3. Initialize the schema (CREATE TABLE IF NOT EXISTS)
    /// 4. Enable SQLite features (WAL mode, foreign keys)
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if:
    /// - Parent directory cannot be created
    /// - Database connection fails
    /// - Schema initialization fails
    pub async fn new(db_path: PathBuf) -> Result<Self, DatabaseError> {
        // Whether this is a fresh file decides if we need the WAL checkpoint
        // after schema creation
        let is_new_database = !db_path.exists();

        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::PermissionDenied {
                        DatabaseError::permission_denied(db_path.clone())
                    } else {
                        DatabaseError::DirectoryCreationFailed(e)
                    }
                })?;
            }
        }

        // Open database connection using Builder pattern
        let db = Builder::new_local(&db_path)
            .build()
            .await
            .map_err(|e| DatabaseError::connection_failed(db_path.clone(), e))?;

        let service = Self {
            db: Arc::new(db),
            db_path,
        };

        service.initialize_schema(is_new_database).await?;

        Ok(service)
    }

    /// Execute a PRAGMA statement
    ///
    /// PRAGMA statements return rows, so we must use query() instead of
    /// execute(). This helper encapsulates that pattern.
    async fn execute_pragma(
        &self,
        conn: &libsql::Connection,
        pragma: &str,
    ) -> Result<(), DatabaseError> {
        let mut stmt = conn.prepare(pragma).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        let _ = stmt.query(()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        Ok(())
    }

    /// Initialize database schema and configuration
    ///
    /// Creates the table and indexes using CREATE TABLE IF NOT EXISTS,
    /// ensuring idempotent initialization (safe to call multiple times).
    ///
    /// # Schema
    ///
    /// - `tree_nodes` table: universal nested-set node storage
    /// - Indexes: `(tree_id, lft)` interval scans, `parent_id` repair DFS,
    ///   `(region_id, tree_id, lft)` forest materialization
    async fn initialize_schema(&self, is_new_database: bool) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        // Enable WAL mode for better concurrency
        self.execute_pragma(&conn, "PRAGMA journal_mode = WAL")
            .await?;

        // Set busy timeout to 5 seconds (5000ms)
        self.execute_pragma(&conn, "PRAGMA busy_timeout = 5000")
            .await?;

        // Enable foreign key constraints
        self.execute_pragma(&conn, "PRAGMA foreign_keys = ON")
            .await?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS tree_nodes (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                title TEXT NOT NULL,
                parent_id TEXT,
                tree_id INTEGER NOT NULL,
                lft INTEGER NOT NULL,
                rgt INTEGER NOT NULL,
                depth INTEGER NOT NULL,
                region_id TEXT NOT NULL,
                explicitly_archived INTEGER NOT NULL DEFAULT 0,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                modified_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                -- The parent pointer is redundant with the nested set and is
                -- deliberately NOT a foreign key with cascade semantics:
                -- repair must be able to read rows whose parents are corrupt.
                CHECK (lft < rgt),
                CHECK (depth >= 1)
            )",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to create tree_nodes table: {}", e))
        })?;

        self.create_core_indexes(&conn).await?;

        // Force WAL checkpoint only for newly created databases so rapid
        // open/close cycles in tests cannot observe a half-flushed schema.
        if is_new_database {
            self.execute_pragma(&conn, "PRAGMA wal_checkpoint(TRUNCATE)")
                .await?;
        }

        Ok(())
    }

    /// Create core indexes for the tree_nodes table
    async fn create_core_indexes(&self, conn: &libsql::Connection) -> Result<(), DatabaseError> {
        // Interval scans within one tree (ancestors/descendants/siblings)
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_tree_nodes_interval ON tree_nodes(tree_id, lft)",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!(
                "Failed to create index 'idx_tree_nodes_interval': {}",
                e
            ))
        })?;

        // Parent lookups (repair DFS over the adjacency relation)
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_tree_nodes_parent ON tree_nodes(parent_id)",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!(
                "Failed to create index 'idx_tree_nodes_parent': {}",
                e
            ))
        })?;

        // Whole-forest fetch per region in materialization order
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_tree_nodes_region ON tree_nodes(region_id, tree_id, lft)",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!(
                "Failed to create index 'idx_tree_nodes_region': {}",
                e
            ))
        })?;

        Ok(())
    }

    /// Get a synchronous connection handle
    ///
    /// Only for single-threaded, synchronous contexts; most code should use
    /// `connect_with_timeout()` instead.
    pub fn connect(&self) -> Result<libsql::Connection, DatabaseError> {
        self.db.connect().map_err(DatabaseError::LibsqlError)
    }

    /// Get an async connection with busy timeout configured
    ///
    /// **Recommended** for all async functions and Tokio runtime contexts.
    /// Sets a 5-second busy timeout so concurrent operations wait and retry
    /// instead of failing immediately when the database is locked.
    pub async fn connect_with_timeout(&self) -> Result<libsql::Connection, DatabaseError> {
        // The synchronous connect() call is safe here because it only
        // creates the connection handle; the actual SQLite operations happen
        // later under the busy timeout.
        let conn = self.connect()?;

        self.execute_pragma(&conn, "PRAGMA busy_timeout = 5000")
            .await?;

        Ok(conn)
    }

    /// Copy the current row's column values out of the cursor
    ///
    /// libsql's local backend hands out `Row`s that read from the live
    /// statement cursor, so values must be materialized before the cursor
    /// advances.
    fn row_values(row: &libsql::Row) -> Result<Vec<libsql::Value>, DatabaseError> {
        let mut values = Vec::with_capacity(row.column_count() as usize);
        for idx in 0..row.column_count() {
            values.push(row.get_value(idx).map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to read column {}: {}", idx, e))
            })?);
        }
        Ok(values)
    }

    /// Drain a result set into a Vec of materialized value rows
    async fn collect_rows(
        mut rows: libsql::Rows,
        context: &str,
    ) -> Result<Vec<Vec<libsql::Value>>, DatabaseError> {
        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("{}: {}", context, e)))?
        {
            out.push(Self::row_values(&row)?);
        }
        Ok(out)
    }

    //
    // TREE STORE OPERATIONS
    // These methods contain all SQL; they are wrapped by the TreeStore
    // trait implementation and carry no business logic.
    //

    /// Insert a node row
    pub async fn db_create_node(
        &self,
        params: DbCreateNodeParams<'_>,
    ) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        conn.execute(
            "INSERT INTO tree_nodes (id, kind, title, parent_id, tree_id, lft, rgt, depth, region_id, explicitly_archived)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            (
                params.id,
                params.kind,
                params.title,
                params.parent_id,
                params.tree_id,
                params.lft,
                params.rgt,
                params.depth,
                params.region_id,
                params.explicitly_archived as i64,
            ),
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to insert node: {}", e)))?;

        Ok(())
    }

    /// Retrieve a single node row by ID
    ///
    /// Returns `Ok(None)` when the node does not exist (not an error).
    pub async fn db_get_node(
        &self,
        id: &str,
    ) -> Result<Option<Vec<libsql::Value>>, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM tree_nodes WHERE id = ?",
                NODE_COLUMNS
            ))
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare node query: {}", e))
            })?;

        let mut rows = stmt.query([id]).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to query node: {}", e))
        })?;

        rows.next()
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to read node row: {}", e)))?
            .map(|row| Self::row_values(&row))
            .transpose()
    }

    /// Update a node row (full-row write, bumps modified_at)
    pub async fn db_update_node(
        &self,
        params: DbUpdateNodeParams<'_>,
    ) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let affected = conn
            .execute(
                "UPDATE tree_nodes
                 SET kind = ?, title = ?, parent_id = ?, tree_id = ?, lft = ?, rgt = ?,
                     depth = ?, region_id = ?, explicitly_archived = ?,
                     modified_at = CURRENT_TIMESTAMP
                 WHERE id = ?",
                (
                    params.kind,
                    params.title,
                    params.parent_id,
                    params.tree_id,
                    params.lft,
                    params.rgt,
                    params.depth,
                    params.region_id,
                    params.explicitly_archived as i64,
                    params.id,
                ),
            )
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to update node: {}", e)))?;

        if affected == 0 {
            return Err(DatabaseError::sql_execution(format!(
                "Update matched no node with id {}",
                params.id
            )));
        }

        Ok(())
    }

    /// Fetch every node of one tree, ordered by lft (pre-order)
    pub async fn db_get_tree(&self, tree_id: i64) -> Result<Vec<Vec<libsql::Value>>, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM tree_nodes WHERE tree_id = ? ORDER BY lft",
                NODE_COLUMNS
            ))
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare tree query: {}", e))
            })?;

        let rows = stmt.query([tree_id]).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to query tree: {}", e))
        })?;

        Self::collect_rows(rows, "Failed to read tree rows").await
    }

    /// Fetch the direct children of a node via the parent pointer, ordered
    /// by stored lft (id as tiebreak so corrupt duplicates stay stable)
    pub async fn db_get_children(&self, parent_id: &str) -> Result<Vec<Vec<libsql::Value>>, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM tree_nodes WHERE parent_id = ? ORDER BY lft, id",
                NODE_COLUMNS
            ))
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare children query: {}", e))
            })?;

        let rows = stmt.query([parent_id]).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to query children: {}", e))
        })?;

        Self::collect_rows(rows, "Failed to read children rows").await
    }

    /// Fetch all nodes whose interval contains `[lft, rgt]` (self included),
    /// ordered root-first
    pub async fn db_get_ancestor_range(
        &self,
        tree_id: i64,
        lft: i64,
        rgt: i64,
    ) -> Result<Vec<Vec<libsql::Value>>, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM tree_nodes
                 WHERE tree_id = ? AND lft <= ? AND rgt >= ?
                 ORDER BY lft",
                NODE_COLUMNS
            ))
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare ancestor query: {}", e))
            })?;

        let rows = stmt.query((tree_id, lft, rgt)).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to query ancestors: {}", e))
        })?;

        Self::collect_rows(rows, "Failed to read ancestor rows").await
    }

    /// Fetch all nodes strictly inside `(lft, rgt)`, in pre-order
    pub async fn db_get_descendant_range(
        &self,
        tree_id: i64,
        lft: i64,
        rgt: i64,
    ) -> Result<Vec<Vec<libsql::Value>>, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM tree_nodes
                 WHERE tree_id = ? AND lft > ? AND rgt < ?
                 ORDER BY lft",
                NODE_COLUMNS
            ))
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare descendant query: {}", e))
            })?;

        let rows = stmt.query((tree_id, lft, rgt)).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to query descendants: {}", e))
        })?;

        Self::collect_rows(rows, "Failed to read descendant rows").await
    }

    /// Fetch a region's whole forest in materialization order (tree_id, lft)
    pub async fn db_get_region_nodes(
        &self,
        region_id: &str,
    ) -> Result<Vec<Vec<libsql::Value>>, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM tree_nodes WHERE region_id = ? ORDER BY tree_id, lft",
                NODE_COLUMNS
            ))
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare region query: {}", e))
            })?;

        let rows = stmt.query([region_id]).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to query region nodes: {}", e))
        })?;

        Self::collect_rows(rows, "Failed to read region rows").await
    }

    /// Fetch a region's root nodes (one per tree), ordered by tree_id
    pub async fn db_get_region_roots(
        &self,
        region_id: &str,
    ) -> Result<Vec<Vec<libsql::Value>>, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM tree_nodes WHERE region_id = ? AND lft = 1 ORDER BY tree_id",
                NODE_COLUMNS
            ))
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare roots query: {}", e))
            })?;

        let rows = stmt.query([region_id]).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to query region roots: {}", e))
        })?;

        Self::collect_rows(rows, "Failed to read root rows").await
    }

    /// Set-based nested-set shift: every boundary in `tree_id` at or beyond
    /// `threshold` moves by `delta`.
    ///
    /// This is the bulk write behind insertion and subtree removal. Both
    /// boundaries of a row move in one statement; shifting them separately
    /// would trip the `lft < rgt` check on rows whose lft moves first. The
    /// statement is still NOT atomic with the insert/update that follows
    /// it; callers bracket the whole operation with epoch bumps and rely on
    /// `TreeRepair` after partial failures.
    ///
    /// Returns the number of rows whose boundaries moved.
    pub async fn db_shift_tree(
        &self,
        tree_id: i64,
        threshold: i64,
        delta: i64,
    ) -> Result<u64, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let affected = conn
            .execute(
                "UPDATE tree_nodes
                 SET lft = CASE WHEN lft >= ?1 THEN lft + ?2 ELSE lft END,
                     rgt = CASE WHEN rgt >= ?1 THEN rgt + ?2 ELSE rgt END
                 WHERE tree_id = ?3 AND (lft >= ?1 OR rgt >= ?1)",
                (threshold, delta, tree_id),
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to shift tree boundaries: {}", e))
            })?;

        Ok(affected)
    }

    /// Next unused tree identifier
    ///
    /// Not safe against concurrent allocation; the caller serializes
    /// structural writes (see `TreeMutator`).
    pub async fn db_next_tree_id(&self) -> Result<i64, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let mut stmt = conn
            .prepare("SELECT COALESCE(MAX(tree_id), 0) + 1 FROM tree_nodes")
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare tree_id query: {}", e))
            })?;

        let mut rows = stmt.query(()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to query next tree_id: {}", e))
        })?;

        let row = rows
            .next()
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to read next tree_id: {}", e))
            })?
            .ok_or_else(|| DatabaseError::sql_execution("next tree_id query returned no row"))?;

        let next: i64 = row.get(0).map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to decode next tree_id: {}", e))
        })?;

        Ok(next)
    }
}
