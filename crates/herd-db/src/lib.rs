//! # herd-db: Entity Store for Herdbook
//!
//! SQLite persistence for herds, cows, events, tasks and documents.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         herd-db Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                herd-sync / herd-import / apps/api               │   │
//! │  └───────────────────────────────┬─────────────────────────────────┘   │
//! │                                  │ db.begin() → &mut *tx               │
//! │                                  ▼                                      │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                      Repository Layer                           │   │
//! │  │  ┌───────────┐ ┌───────────┐ ┌───────────┐ ┌───────────────┐   │   │
//! │  │  │   Cow     │ │   Herd    │ │   Event   │ │ Task/Document │   │   │
//! │  │  │Repository │ │Repository │ │Repository │ │ Repositories  │   │   │
//! │  │  └───────────┘ └───────────┘ └───────────┘ └───────────────┘   │   │
//! │  └───────────────────────────────┬─────────────────────────────────┘   │
//! │                                  ▼                                      │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   SQLite (WAL, foreign keys on)                 │   │
//! │  │   herds • cows • events • tasks • documents                     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Borrowed Connections
//! Every repository wraps a `&mut SqliteConnection`. The same repository
//! code therefore runs against a pooled connection, a batch transaction or
//! a savepoint nested in one; the caller decides the scope.
//!
//! ```rust,ignore
//! let db = Database::new(DbConfig::in_memory()).await?;
//! let mut tx = db.begin().await?;
//! let cow = CowRepository::new(&mut *tx).get_by_tag("PL-1").await?;
//! tx.commit().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{savepoint, Database, DbConfig};

// Repository re-exports for convenience
pub use repository::cow::CowRepository;
pub use repository::document::DocumentRepository;
pub use repository::event::EventRepository;
pub use repository::herd::HerdRepository;
pub use repository::task::TaskRepository;

// Callers name the connection type without depending on sqlx directly.
pub use sqlx::{Sqlite, SqliteConnection, Transaction};
