//! Error types for the synchronization core.

use thiserror::Error;

use crate::model::Cursor;

/// Primary error type for merge and filter operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A delta arrived before any full snapshot seeded the state.
    #[error("delta snapshot received before a full snapshot")]
    LeadingDelta {
        /// Cursor carried by the rejected delta.
        cursor: Cursor,
    },
    /// A search pattern failed to compile in regex mode.
    #[error("invalid search pattern")]
    InvalidPattern {
        /// Pattern supplied by the caller.
        pattern: String,
        /// Underlying regex error.
        #[source]
        source: regex::Error,
    },
    /// A textual selector did not name a known variant.
    #[error("unrecognised selector value")]
    UnknownSelector {
        /// Selector family (for example `status` or `sort`).
        kind: &'static str,
        /// Value supplied by the caller.
        value: String,
    },
}

/// Convenience alias for core results.
pub type SyncResult<T> = Result<T, SyncError>;
