//! # herd-import: Spreadsheet Register Import
//!
//! Each sheet of a workbook is one herd's register. Every row becomes a cow
//! (matched by tag), then dam and sire columns are linked by tag once all
//! sheets are in.
//!
//! ## Modules
//! ```text
//! herd_import
//! ├── workbook   - calamine → Sheet / Cell
//! ├── normalize  - header vocabulary, cell sentinels, ImportRow
//! ├── engine     - ImportEngine: Pass 1 upsert, Pass 2 pedigree links
//! └── error      - ImportError
//! ```

pub mod engine;
pub mod error;
pub mod normalize;
pub mod workbook;

pub use engine::{ImportEngine, ImportReport, DEFAULT_MAX_UPLOAD_BYTES};
pub use error::{ImportError, ImportResult};
pub use workbook::{Cell, Sheet, Workbook};
