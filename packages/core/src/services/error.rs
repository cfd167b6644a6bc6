//! Service Layer Error Types
//!
//! This module defines error types for tree service operations, providing
//! detailed error handling for structural failures.

use crate::db::DatabaseError;
use crate::models::ValidationError;
use thiserror::Error;

/// Tree service operation errors
///
/// Provides high-level error types for all tree operations, with detailed
/// context and proper error chaining.
#[derive(Error, Debug)]
pub enum TreeServiceError {
    /// Node not found by ID
    #[error("Node not found: {id}")]
    NodeNotFound { id: String },

    /// Requested structural position is not allowed
    #[error("Invalid position: {context}")]
    InvalidPosition { context: String },

    /// Parent pointer chain loops back on itself
    #[error("Parent chain cycle detected at node {id}")]
    ParentCycle { id: String },

    /// Validation failed for a node tuple
    #[error("Node validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),

    /// Database operation failed
    #[error("Database operation failed: {0}")]
    DatabaseError(#[from] DatabaseError),

    /// Query execution error
    #[error("Query failed: {0}")]
    QueryFailed(String),
}

impl TreeServiceError {
    /// Create a node not found error
    pub fn node_not_found(id: impl Into<String>) -> Self {
        Self::NodeNotFound { id: id.into() }
    }

    /// Create an invalid position error
    pub fn invalid_position(context: impl Into<String>) -> Self {
        Self::InvalidPosition {
            context: context.into(),
        }
    }

    /// Create a parent cycle error
    pub fn parent_cycle(id: impl Into<String>) -> Self {
        Self::ParentCycle { id: id.into() }
    }

    /// Create a query failed error
    pub fn query_failed(msg: impl Into<String>) -> Self {
        Self::QueryFailed(msg.into())
    }
}
