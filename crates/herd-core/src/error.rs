//! # Error Types
//!
//! Domain-specific error types for herd-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  herd-core errors (this file)                                          │
//! │  ├── CoreError        - Missing records, bad verbs, bad references     │
//! │  └── ValidationError  - Field-level rule failures                      │
//! │                                                                         │
//! │  herd-db errors                                                        │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  herd-sync / herd-import errors                                        │
//! │  └── SyncError, ImportError - per-job/per-row vs whole-call failures   │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → SyncError → JobOutcome.error      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::types::RecordId;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule and reference failures.
///
/// Every variant is recoverable at the scope of one sync job or one
/// spreadsheet row.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A referenced record does not exist.
    ///
    /// ## When This Occurs
    /// - `entityId` of an update names a real id that was never created
    /// - a payload's `dam`, `sire`, `herd` or `cow` points nowhere
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A payload reference is still a temp id after resolution.
    ///
    /// The job that should have minted it either failed or never ran.
    #[error("{field} refers to unsynchronised record {temp_id}")]
    UnresolvedReference { field: String, temp_id: RecordId },

    /// The job's `action` is not a known verb.
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a NotFound error for a given entity type and id.
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Invalid format (unparseable payload, bad date, ...).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// A date that must not lie in the future does.
    #[error("{field} cannot be in the future")]
    FutureDate { field: String },

    /// A cow named as its own parent.
    #[error("a cow cannot be its own {field}")]
    SelfReference { field: String },

    /// Duplicate value (e.g. duplicate tag).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
