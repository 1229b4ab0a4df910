//! # Repository Module
//!
//! One repository per record type.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  Sync job / import row / PATCH handler                                 │
//! │       │                                                                 │
//! │       │  CowRepository::new(&mut *sp).get_by_tag("PL-1")               │
//! │       ▼                                                                 │
//! │  CowRepository<'c>                                                     │
//! │  ├── get_by_id / get_by_tag / tag_taken                                │
//! │  ├── insert / update / set_status                                      │
//! │  ├── set_parents                                                       │
//! │  └── ids_by_tags (chunked IN query)                                    │
//! │       │                                                                 │
//! │       │  SQL on the borrowed connection                                 │
//! │       ▼                                                                 │
//! │  whatever scope the caller opened: pool conn, tx, savepoint            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`CowRepository`] - Cow CRUD, soft delete, pedigree links, bulk tag lookup
//! - [`HerdRepository`] - Herd get-or-create
//! - [`EventRepository`] - Event CRUD
//! - [`TaskRepository`] - Task CRUD
//! - [`DocumentRepository`] - Document metadata

pub mod cow;
pub mod document;
pub mod event;
pub mod herd;
pub mod task;

pub use cow::CowRepository;
pub use document::DocumentRepository;
pub use event::EventRepository;
pub use herd::HerdRepository;
pub use task::TaskRepository;
