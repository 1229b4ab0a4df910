//! # HTTP Handlers
//!
//! ## Organization
//! ```text
//! handlers/
//! ├── mod.rs     ◄─── You are here (exports)
//! ├── sync.rs    ◄─── POST /api/sync/      offline job replay
//! ├── import.rs  ◄─── POST /api/import/    workbook upload
//! ├── cow.rs     ◄─── GET/PATCH /api/cows/{id}
//! └── health.rs  ◄─── GET /health
//! ```
//!
//! Handlers only extract, call one engine or mutation, and shape the body.
//! Transactions are opened by the engines, or by the handler itself for the
//! single-record routes.

pub mod cow;
pub mod health;
pub mod import;
pub mod sync;
