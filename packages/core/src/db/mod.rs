//! Database Layer
//!
//! This module handles all database interactions using libsql/Turso:
//!
//! - Database initialization and connection management
//! - The `tree_nodes` table holding the nested-set representation
//! - The `TreeStore` abstraction consumed by the tree services
//! - Per-tree epoch counters for read-side cache invalidation
//!
//! # Architecture
//!
//! All SQL lives in `DatabaseService` `db_*` methods; `TursoStore` wraps
//! them behind the `TreeStore` trait so services never see SQL. Structural
//! shifts (`db_shift_tree`) are set-based statements that update every
//! affected row in one pass; they deliberately bypass any per-row caching,
//! which is why mutators bracket them with epoch bumps.

mod database;
mod epochs;
mod error;
mod tree_store;
mod turso_store;

pub use database::{DatabaseService, DbCreateNodeParams, DbUpdateNodeParams};
pub use epochs::TreeEpochs;
pub use error::DatabaseError;
pub use tree_store::TreeStore;
pub use turso_store::TursoStore;
