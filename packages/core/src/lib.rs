//! Regio Content-Tree Core
//!
//! This crate provides the hierarchical content tree at the heart of the
//! Regio regional-portal backend: nested-set storage for pages and language
//! trees, structural mutation, offline consistency repair, and single-pass
//! filtered materialization for presentation layers.
//!
//! # Architecture
//!
//! - **Nested set as source of truth**: each node stores `(tree_id, lft,
//!   rgt, depth)`; the redundant `parent_id` pointer is a convenience that
//!   is re-derived on save and trusted only by the repair pass
//! - **libsql/Turso**: embedded SQLite-compatible database behind the
//!   [`db::TreeStore`] trait
//! - **No internal transactions**: structural writes are set-based bulk
//!   shifts; callers serialize access per `tree_id` and recover from
//!   partial failures with [`services::TreeRepair`]
//!
//! # Modules
//!
//! - [`models`] - Data structures (`TreeNode`, filters, validation)
//! - [`db`] - Database layer with libsql integration and epoch counters
//! - [`services`] - Tree services (query, mutation, repair, materialization)

pub mod db;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use db::{DatabaseService, TreeEpochs, TreeStore, TursoStore};
pub use models::*;
pub use services::*;
