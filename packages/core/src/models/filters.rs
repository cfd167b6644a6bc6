//! Filter Criteria for Tree Materialization
//!
//! A `TreeFilter` describes which nodes a materialized tree view should
//! contain: an archival policy plus an optional translation requirement.
//! The translation requirement is only consulted under the non-archived
//! policy; archived views ignore language availability.

use serde::{Deserialize, Serialize};

/// Archival policy for filtered tree views
///
/// Archival is inherited: a node below an explicitly archived ancestor is
/// archived implicitly, regardless of its own flag. The materialization
/// pass realizes this by only admitting a node under `ArchivedOnly` when it
/// is flagged itself or its parent was already admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArchivePolicy {
    /// Only explicitly or implicitly archived nodes
    ArchivedOnly,
    /// Only nodes that are neither explicitly nor implicitly archived
    NonArchivedOnly,
    /// No archival filtering
    All,
}

/// Filter criteria for one materialization call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeFilter {
    /// Archival policy
    pub archive: ArchivePolicy,

    /// Require an acceptable translation for the requested language.
    ///
    /// The criterion itself (language, acceptable status) belongs to the
    /// content layer; the tree core only consumes a precomputed boolean per
    /// node. Only meaningful combined with [`ArchivePolicy::NonArchivedOnly`].
    pub require_translation: bool,
}

impl TreeFilter {
    /// Live (non-archived) view, no language requirement
    pub fn non_archived() -> Self {
        Self {
            archive: ArchivePolicy::NonArchivedOnly,
            require_translation: false,
        }
    }

    /// Live view restricted to nodes with an acceptable translation
    pub fn non_archived_translated() -> Self {
        Self {
            archive: ArchivePolicy::NonArchivedOnly,
            require_translation: true,
        }
    }

    /// Archive view (explicitly and implicitly archived nodes)
    pub fn archived() -> Self {
        Self {
            archive: ArchivePolicy::ArchivedOnly,
            require_translation: false,
        }
    }

    /// Unfiltered view
    pub fn all() -> Self {
        Self {
            archive: ArchivePolicy::All,
            require_translation: false,
        }
    }
}
