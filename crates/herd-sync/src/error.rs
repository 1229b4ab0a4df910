//! # Sync Error Types
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────────────────┐   ┌─────────────────────────────────┐ │
//! │  │  Job-local (recorded)       │   │  Batch-level (abort + rollback) │ │
//! │  │                             │   │                                 │ │
//! │  │  Validation                 │   │  Database (connection, pool,    │ │
//! │  │  Core (not found, unknown   │   │    savepoint / commit failure)  │ │
//! │  │    action, temp reference)  │   │  BatchTooLarge                  │ │
//! │  │  Database (constraint)      │   │                                 │ │
//! │  └─────────────────────────────┘   └─────────────────────────────────┘ │
//! │                                                                         │
//! │  is_fatal() decides which column an error falls in.                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use herd_core::{CoreError, ValidationError};
use herd_db::DbError;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Database(#[from] DbError),

    /// Rejected before any job ran.
    #[error("batch of {count} jobs exceeds the limit of {max}")]
    BatchTooLarge { count: usize, max: usize },
}

impl SyncError {
    /// True if the whole batch must be rolled back.
    ///
    /// Everything a single bad job can cause is recoverable; only a store
    /// that can no longer execute statements, or an oversized batch, is not.
    pub fn is_fatal(&self) -> bool {
        match self {
            SyncError::Validation(_) | SyncError::Core(_) => false,
            SyncError::Database(e) => e.is_fatal(),
            SyncError::BatchTooLarge { .. } => true,
        }
    }
}
