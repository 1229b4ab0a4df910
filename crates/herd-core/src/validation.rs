//! # Validation Module
//!
//! Field and pedigree rules shared by every write path.
//!
//! ## Validation Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Deserialisation (serde)                                      │
//! │  └── Types, enum spellings, date formats                               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Required fields, lengths                                          │
//! │  ├── Birth date not in the future                                      │
//! │  └── A cow is never its own dam or sire                                │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Store (herd-db)                                              │
//! │  ├── Tag uniqueness (checked first, unique index as backstop)          │
//! │  └── Parent/herd existence                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Sync jobs, `PATCH /api/cows/{id}` and the importer all call into here, so
//! a rule that holds for one path holds for all of them.

use chrono::NaiveDate;

use crate::error::ValidationError;
use crate::types::{Cow, NewCow, NewTask, RecordId, Task};
use crate::{MAX_BREED_LEN, MAX_NAME_LEN, MAX_TAG_LEN, MAX_TITLE_LEN};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

fn validate_text(value: &str, field: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Validates an ear tag.
///
/// ```rust
/// use herd_core::validation::validate_tag;
///
/// assert!(validate_tag("PL-0042").is_ok());
/// assert!(validate_tag("  ").is_err());
/// assert!(validate_tag(&"9".repeat(51)).is_err());
/// ```
pub fn validate_tag(tag: &str) -> ValidationResult<()> {
    validate_text(tag, "tag", MAX_TAG_LEN)
}

pub fn validate_cow_name(name: &str) -> ValidationResult<()> {
    validate_text(name, "name", MAX_NAME_LEN)
}

pub fn validate_herd_name(name: &str) -> ValidationResult<()> {
    validate_text(name, "name", MAX_NAME_LEN)
}

/// Breed may be blank (the store default applies) but not overlong.
pub fn validate_breed(breed: &str) -> ValidationResult<()> {
    if breed.trim().chars().count() > MAX_BREED_LEN {
        return Err(ValidationError::TooLong {
            field: "breed".to_string(),
            max: MAX_BREED_LEN,
        });
    }
    Ok(())
}

pub fn validate_task_title(title: &str) -> ValidationResult<()> {
    validate_text(title, "title", MAX_TITLE_LEN)
}

// =============================================================================
// Date Validators
// =============================================================================

/// Rejects birth dates after `today`. `today` is passed in so callers decide
/// which clock is authoritative.
pub fn validate_birth_date(date: Option<NaiveDate>, today: NaiveDate) -> ValidationResult<()> {
    match date {
        Some(d) if d > today => Err(ValidationError::FutureDate {
            field: "birth_date".to_string(),
        }),
        _ => Ok(()),
    }
}

// =============================================================================
// Pedigree
// =============================================================================

/// A cow may not be its own dam or sire.
///
/// `cow_id` is `None` for a cow that has not been stored yet, which can never
/// point at itself.
///
/// ```rust
/// use herd_core::validation::validate_parentage;
///
/// assert!(validate_parentage(Some(3), Some(1), Some(2)).is_ok());
/// assert!(validate_parentage(Some(3), Some(3), None).is_err());
/// assert!(validate_parentage(None, Some(3), Some(3)).is_ok());
/// ```
pub fn validate_parentage(
    cow_id: Option<RecordId>,
    dam_id: Option<RecordId>,
    sire_id: Option<RecordId>,
) -> ValidationResult<()> {
    let Some(id) = cow_id else {
        return Ok(());
    };

    if dam_id == Some(id) {
        return Err(ValidationError::SelfReference {
            field: "dam".to_string(),
        });
    }
    if sire_id == Some(id) {
        return Err(ValidationError::SelfReference {
            field: "sire".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Record Validators
// =============================================================================

pub fn validate_new_cow(cow: &NewCow, today: NaiveDate) -> ValidationResult<()> {
    validate_tag(&cow.tag)?;
    validate_cow_name(&cow.name)?;
    validate_breed(&cow.breed)?;
    validate_birth_date(cow.birth_date, today)?;
    Ok(())
}

/// Validates a stored cow after a patch was applied to it.
pub fn validate_cow(cow: &Cow, today: NaiveDate) -> ValidationResult<()> {
    validate_tag(&cow.tag)?;
    validate_cow_name(&cow.name)?;
    validate_breed(&cow.breed)?;
    validate_birth_date(cow.birth_date, today)?;
    validate_parentage(Some(cow.id), cow.dam_id, cow.sire_id)?;
    Ok(())
}

pub fn validate_new_task(task: &NewTask) -> ValidationResult<()> {
    validate_task_title(&task.title)
}

pub fn validate_task(task: &Task) -> ValidationResult<()> {
    validate_task_title(&task.title)
}

// =============================================================================
// Unit Tests
// =============================================================================
