//! # Import Error Types
//!
//! Row-level failures are recorded in the report and the import carries on.
//! Anything that makes the workbook or the store unusable aborts the call
//! and rolls back every row.

use thiserror::Error;

use herd_core::{CoreError, ValidationError};
use herd_db::DbError;

/// Result type alias for import operations.
pub type ImportResult<T> = Result<T, ImportError>;

#[derive(Debug, Error)]
pub enum ImportError {
    // =========================================================================
    // Whole-call failures
    // =========================================================================
    /// The upload is not a workbook calamine can read.
    #[error("could not read workbook: {0}")]
    Workbook(String),

    #[error("workbook contains no sheets")]
    EmptyWorkbook,

    #[error("upload of {size} bytes exceeds the limit of {max}")]
    TooLarge { size: usize, max: usize },

    // =========================================================================
    // Row-level failures
    // =========================================================================
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Database(#[from] DbError),
}

impl ImportError {
    /// True if the whole import must be rolled back.
    pub fn is_fatal(&self) -> bool {
        match self {
            ImportError::Workbook(_) | ImportError::EmptyWorkbook | ImportError::TooLarge { .. } => {
                true
            }
            ImportError::Validation(_) | ImportError::Core(_) => false,
            ImportError::Database(e) => e.is_fatal(),
        }
    }
}

impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::Workbook(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_split() {
        assert!(ImportError::EmptyWorkbook.is_fatal());
        assert!(ImportError::Workbook("zip".into()).is_fatal());
        assert!(ImportError::Database(DbError::PoolExhausted).is_fatal());

        let err: ImportError = ValidationError::FutureDate {
            field: "birth_date".into(),
        }
        .into();
        assert!(!err.is_fatal());
        assert_eq!(err.to_string(), "birth_date cannot be in the future");
    }
}
