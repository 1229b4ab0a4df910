//! # herd-core: Pure Domain Logic for Herdbook
//!
//! Record types, validation rules and identifier resolution shared by the
//! sync engine and the spreadsheet importer. Nothing in here touches a
//! database, a socket or a file.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Herdbook Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              HTTP API (POST /sync, POST /import)                │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌──────────────────────┐    ┌─┴────────────────────┐                  │
//! │  │  herd-sync (replay)  │    │ herd-import (sheets) │                  │
//! │  └──────────┬───────────┘    └───────────┬──────────┘                  │
//! │             └──────────────┬─────────────┘                             │
//! │  ┌─────────────────────────▼───────────────────────────────────────┐   │
//! │  │               ★ herd-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │    job    │  │ resolver  │  │ validation│  │   │
//! │  │   │ Cow, Herd │  │ Job       │  │ TempIdMap │  │ tag, name │  │   │
//! │  │   │ Event ... │  │ JobOutcome│  │ TagIndex  │  │ pedigree  │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    herd-db (Database Layer)                     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Records (Cow, Herd, Event, Task, Document) and their patches
//! - [`job`] - Sync job and outcome wire types
//! - [`resolver`] - Batch-scoped temp id / tag resolution
//! - [`validation`] - Field and pedigree rules
//! - [`money`] - Integer minor-unit prices
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use herd_core::resolver::TempIdMap;
//!
//! let mut ids = TempIdMap::new();
//! ids.remember(-1, 42);
//!
//! assert_eq!(ids.resolve(-1), 42);
//! assert_eq!(ids.resolve(7), 7); // unknown references pass through
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod job;
pub mod money;
pub mod resolver;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use job::{ActionKind, Job, JobAction, JobOutcome, JobStatus};
pub use money::Money;
pub use resolver::{is_temp_id, IdResolver, TagIndex, TempIdMap};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Breed assigned when neither the client nor the register names one.
pub const DEFAULT_BREED: &str = "Highland Cattle";

/// Maximum length of an ear tag.
pub const MAX_TAG_LEN: usize = 50;

/// Maximum length of a cow or herd name.
pub const MAX_NAME_LEN: usize = 100;

/// Maximum length of a breed label.
pub const MAX_BREED_LEN: usize = 100;

/// Maximum length of a task title.
pub const MAX_TITLE_LEN: usize = 200;
