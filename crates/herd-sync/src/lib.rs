//! # herd-sync: Offline Mutation Replay
//!
//! A field client records every change it makes while offline as a job. On
//! reconnect it posts the queue here; [`SyncEngine::apply_batch`] replays it
//! in order and reports one outcome per job.
//!
//! ## Modules
//!
//! - [`engine`] - Batch transaction, per-job savepoints, temp id resolution
//! - [`mutation`] - Validated create/update/delete per record type, shared
//!   with the direct update endpoint
//! - [`error`] - `SyncError` and its fatal / job-local split
//!
//! ## Example
//! ```rust,ignore
//! let engine = SyncEngine::new(db);
//! let report = engine.apply_batch(jobs).await?;
//! for outcome in &report.results {
//!     println!("{} → {:?}", outcome.action, outcome.status);
//! }
//! ```

pub mod engine;
pub mod error;
pub mod mutation;

pub use engine::{SyncEngine, SyncReport, DEFAULT_MAX_JOBS};
pub use error::{SyncError, SyncResult};
