//! # Import Engine
//!
//! Upserts a herd register workbook, then links pedigree by tag.
//!
//! ## Two Passes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           import(workbook)                              │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │   │                                                                     │
//! │   ├── Pass 1: for sheet, for row                                        │
//! │   │    ├── herd = get_or_create(first word of sheet name)               │
//! │   │    ├── SAVEPOINT → upsert by tag → created / updated                │
//! │   │    └── remember (cow id, dam tag, sire tag)                         │
//! │   │                                                                     │
//! │   ├── Pass 2                                                            │
//! │   │    ├── every distinct parent tag → one bulk lookup → TagIndex       │
//! │   │    └── SAVEPOINT → set dam / sire for each remembered row           │
//! │   │                                                                     │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Parents are never resolved during Pass 1: a dam may sit further down the
//! sheet or on a sheet not read yet.
//!
//! Row failures go into [`ImportReport::errors`] and the import carries on.
//! A fatal error drops the transaction and nothing is stored.

use std::collections::BTreeSet;

use chrono::Utc;
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use herd_core::validation::{validate_cow, validate_herd_name, validate_new_cow, validate_parentage};
use herd_core::{CowPatch, RecordId, TagIndex};
use herd_db::{savepoint, CowRepository, Database, DbError, HerdRepository};

use crate::error::{ImportError, ImportResult};
use crate::normalize::{herd_name_from_sheet, Field, HeaderMap, ImportRow};
use crate::workbook::{Cell, Sheet, Workbook};

/// Default upload cap: 16 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

// =============================================================================
// Report
// =============================================================================

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub import_id: Uuid,
    pub created: usize,
    pub updated: usize,

    /// Row-addressed messages, e.g. `Sheet 'NORTH', row 14: tag is required`.
    pub errors: Vec<String>,

    /// Dam and sire links written in Pass 2.
    pub linked: usize,

    /// Parent tags that matched no cow. Not errors.
    pub unresolved_tags: Vec<String>,
}

/// A stored row whose parents Pass 2 still has to wire.
#[derive(Debug, Clone)]
struct PendingLinks {
    cow_id: RecordId,
    location: String,
    tag: String,
    dam_tag: Option<String>,
    sire_tag: Option<String>,
}

enum Upsert {
    Created(RecordId),
    Updated(RecordId),
}

fn location(sheet: &str, row: u32) -> String {
    format!("Sheet '{sheet}', row {row}")
}

// =============================================================================
// Engine
// =============================================================================

/// Imports herd register workbooks.
///
/// ## Usage
/// ```rust,ignore
/// let engine = ImportEngine::new(db.clone()).with_max_bytes(config.max_upload_bytes);
/// let report = engine.import_bytes(upload).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ImportEngine {
    db: Database,
    max_bytes: usize,
}

impl ImportEngine {
    pub fn new(db: Database) -> Self {
        ImportEngine {
            db,
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Decodes an upload and imports it.
    pub async fn import_bytes(&self, bytes: Vec<u8>) -> ImportResult<ImportReport> {
        if bytes.len() > self.max_bytes {
            return Err(ImportError::TooLarge {
                size: bytes.len(),
                max: self.max_bytes,
            });
        }
        let workbook = Workbook::from_bytes(bytes)?;
        self.import(&workbook).await
    }

    /// Imports every sheet inside one transaction.
    ///
    /// ## Returns
    /// * `Ok(ImportReport)` - Committed; row failures are in `errors`
    /// * `Err(ImportError)` - Nothing was committed
    pub async fn import(&self, workbook: &Workbook) -> ImportResult<ImportReport> {
        let import_id = Uuid::new_v4();
        let span = info_span!("import", %import_id, sheets = workbook.sheets.len());

        async move {
            let mut tx = self.db.begin().await?;
            let mut report = ImportReport {
                import_id,
                ..Default::default()
            };

            let mut pending = Vec::new();
            for sheet in &workbook.sheets {
                import_sheet(&mut tx, sheet, &mut report, &mut pending).await?;
            }
            link_parents(&mut tx, &pending, &mut report).await?;

            tx.commit()
                .await
                .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

            info!(
                created = report.created,
                updated = report.updated,
                errors = report.errors.len(),
                linked = report.linked,
                unresolved = report.unresolved_tags.len(),
                "Import committed"
            );
            Ok(report)
        }
        .instrument(span)
        .await
    }
}

// =============================================================================
// Pass 1: Upsert
// =============================================================================

async fn import_sheet(
    conn: &mut SqliteConnection,
    sheet: &Sheet,
    report: &mut ImportReport,
    pending: &mut Vec<PendingLinks>,
) -> ImportResult<()> {
    // Collected up front: the iterator must not be held across an await.
    let rows: Vec<(u32, &[Cell])> = sheet
        .data_rows()
        .filter(|(_, cells)| !cells.iter().all(Cell::is_blank))
        .collect();
    if rows.is_empty() {
        debug!(sheet = %sheet.name, "Sheet has no data rows");
        return Ok(());
    }

    let headers = HeaderMap::from_header(sheet.header());
    if !headers.has(Field::Tag) {
        warn!(sheet = %sheet.name, "Sheet skipped: no tag column");
        report
            .errors
            .push(format!("Sheet '{}': no tag column", sheet.name));
        return Ok(());
    }

    let herd_name = herd_name_from_sheet(&sheet.name);
    let herd_id = match sheet_herd(conn, &herd_name).await {
        Ok(id) => id,
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => {
            warn!(sheet = %sheet.name, error = %e, "Sheet skipped: bad herd name");
            report.errors.push(format!("Sheet '{}': {e}", sheet.name));
            return Ok(());
        }
    };
    debug!(sheet = %sheet.name, herd = %herd_name, herd_id, "Importing sheet");

    for (number, cells) in rows {
        let row = ImportRow::parse(&headers, cells, number);
        let at = location(&sheet.name, number);

        let Some(tag) = row.tag.clone() else {
            warn!(%at, "Row skipped: missing tag");
            report.errors.push(format!("{at}: tag is required"));
            continue;
        };

        let cow_id = match upsert_row(conn, herd_id, &row).await {
            Ok(Upsert::Created(id)) => {
                report.created += 1;
                id
            }
            Ok(Upsert::Updated(id)) => {
                report.updated += 1;
                id
            }
            Err(e) if e.is_fatal() => {
                error!(%at, error = %e, "Aborting import");
                return Err(e);
            }
            Err(e) => {
                warn!(%at, error = %e, "Row failed");
                report.errors.push(format!("{at}: {e}"));
                continue;
            }
        };

        if row.dam_tag.is_some() || row.sire_tag.is_some() {
            pending.push(PendingLinks {
                cow_id,
                location: at,
                tag,
                dam_tag: row.dam_tag,
                sire_tag: row.sire_tag,
            });
        }
    }
    Ok(())
}

async fn sheet_herd(conn: &mut SqliteConnection, name: &str) -> ImportResult<RecordId> {
    validate_herd_name(name)?;
    Ok(HerdRepository::new(conn).get_or_create(name).await?.id)
}

/// Inserts or updates one row inside its own savepoint.
async fn upsert_row(
    conn: &mut SqliteConnection,
    herd_id: RecordId,
    row: &ImportRow,
) -> ImportResult<Upsert> {
    let mut sp = savepoint(conn).await?;

    match write_row(&mut sp, herd_id, row).await {
        Ok(outcome) => {
            sp.commit()
                .await
                .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
            Ok(outcome)
        }
        Err(e) => {
            sp.rollback()
                .await
                .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
            Err(e)
        }
    }
}

async fn write_row(
    conn: &mut SqliteConnection,
    herd_id: RecordId,
    row: &ImportRow,
) -> ImportResult<Upsert> {
    let today = Utc::now().date_naive();
    let mut patch: CowPatch = row.patch.clone();
    patch.herd = Some(Some(herd_id));

    let tag = patch.tag.clone().unwrap_or_default();
    let mut cows = CowRepository::new(conn);

    match cows.get_by_tag(&tag).await? {
        Some(mut cow) => {
            patch.apply(&mut cow);
            validate_cow(&cow, today)?;
            let stored = cows.update(&cow).await?;
            debug!(tag = %stored.tag, id = stored.id, "Row updated cow");
            Ok(Upsert::Updated(stored.id))
        }
        None => {
            if patch.name.is_none() {
                patch.name = Some(tag.clone());
            }
            let cow = patch.into_new_cow()?;
            validate_new_cow(&cow, today)?;
            let stored = cows.insert(&cow).await?;
            debug!(tag = %stored.tag, id = stored.id, "Row created cow");
            Ok(Upsert::Created(stored.id))
        }
    }
}

// =============================================================================
// Pass 2: Pedigree Links
// =============================================================================

async fn link_parents(
    conn: &mut SqliteConnection,
    pending: &[PendingLinks],
    report: &mut ImportReport,
) -> ImportResult<()> {
    if pending.is_empty() {
        return Ok(());
    }

    let wanted: BTreeSet<String> = pending
        .iter()
        .flat_map(|p| [p.dam_tag.clone(), p.sire_tag.clone()])
        .flatten()
        .collect();
    let tags: Vec<String> = wanted.into_iter().collect();

    let mut index = TagIndex::new();
    for (tag, id) in CowRepository::new(conn).ids_by_tags(&tags).await? {
        index.remember(tag, id);
    }
    debug!(wanted = tags.len(), found = index.len(), "Parent tags resolved");

    let mut unresolved = BTreeSet::new();
    for links in pending {
        let mut dam = None;
        let mut sire = None;

        for (field, parent_tag, slot) in [
            ("dam", &links.dam_tag, &mut dam),
            ("sire", &links.sire_tag, &mut sire),
        ] {
            let Some(parent_tag) = parent_tag else {
                continue;
            };
            if *parent_tag == links.tag {
                report.errors.push(format!(
                    "{}: a cow cannot be its own {field}",
                    links.location
                ));
                continue;
            }
            match index.find(parent_tag) {
                Some(id) => *slot = Some(id),
                None => {
                    unresolved.insert(parent_tag.clone());
                }
            }
        }

        if let Err(e) = validate_parentage(Some(links.cow_id), dam, sire) {
            report.errors.push(format!("{}: {e}", links.location));
            continue;
        }
        if dam.is_none() && sire.is_none() {
            continue;
        }

        match set_parents(conn, links.cow_id, dam, sire).await {
            Ok(()) => {
                report.linked += usize::from(dam.is_some()) + usize::from(sire.is_some());
            }
            Err(e) if e.is_fatal() => {
                error!(at = %links.location, error = %e, "Aborting import");
                return Err(e);
            }
            Err(e) => {
                warn!(at = %links.location, error = %e, "Link failed");
                report.errors.push(format!("{}: {e}", links.location));
            }
        }
    }

    for tag in &unresolved {
        warn!(%tag, "Parent tag matches no cow; link left empty");
    }
    report.unresolved_tags = unresolved.into_iter().collect();
    Ok(())
}

async fn set_parents(
    conn: &mut SqliteConnection,
    cow_id: RecordId,
    dam: Option<RecordId>,
    sire: Option<RecordId>,
) -> ImportResult<()> {
    let mut sp = savepoint(conn).await?;

    match CowRepository::new(&mut sp).set_parents(cow_id, dam, sire).await {
        Ok(()) => {
            sp.commit()
                .await
                .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
            Ok(())
        }
        Err(e) => {
            sp.rollback()
                .await
                .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
            Err(e.into())
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use herd_core::{CowStatus, Gender};
    use herd_db::DbConfig;

    async fn test_engine() -> (ImportEngine, Database) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        (ImportEngine::new(db.clone()), db)
    }

    fn row(values: &[&str]) -> Vec<Cell> {
        values.iter().map(|v| Cell::text(*v)).collect()
    }

    fn register(name: &str, data: &[&[&str]]) -> Sheet {
        let mut rows = vec![row(&["Tag", "Name", "Sex", "Dam tag", "Sire tag"])];
        rows.extend(data.iter().map(|r| row(r)));
        Sheet::new(name, rows)
    }

    async fn cow_by_tag(db: &Database, tag: &str) -> herd_core::Cow {
        let mut conn = db.acquire().await.unwrap();
        CowRepository::new(&mut conn)
            .get_by_tag(tag)
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_sheet_name_selects_herd() {
        let (engine, db) = test_engine().await;
        let workbook = Workbook::new(vec![register(
            "NORTH Register",
            &[&["T-1", "Morag", "female", "", ""]],
        )]);

        let report = engine.import(&workbook).await.unwrap();
        assert_eq!(report.created, 1);

        let mut conn = db.acquire().await.unwrap();
        let herd = HerdRepository::new(&mut conn)
            .get_by_name("NORTH")
            .await
            .unwrap()
            .unwrap();
        let cow = CowRepository::new(&mut conn)
            .get_by_tag("T-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cow.herd_id, Some(herd.id));
        assert_eq!(cow.gender, Gender::Female);
    }

    #[tokio::test]
    async fn test_dam_on_later_sheet_is_linked() {
        let (engine, db) = test_engine().await;
        let workbook = Workbook::new(vec![
            register("NORTH Register", &[&["T-200", "Flora", "F", "T-100", ""]]),
            register("SOUTH Register", &[&["T-100", "Morag", "F", "", ""]]),
        ]);

        let report = engine.import(&workbook).await.unwrap();

        assert_eq!(report.created, 2);
        assert_eq!(report.linked, 1);
        assert!(report.errors.is_empty());

        let dam = cow_by_tag(&db, "T-100").await;
        let calf = cow_by_tag(&db, "T-200").await;
        assert_eq!(calf.dam_id, Some(dam.id));
    }

    #[tokio::test]
    async fn test_missing_tag_is_row_error() {
        let (engine, _db) = test_engine().await;
        let workbook = Workbook::new(vec![register(
            "NORTH",
            &[&["T-1", "Morag", "F", "", ""], &["", "Nameless", "F", "", ""]],
        )]);

        let report = engine.import(&workbook).await.unwrap();

        assert_eq!(report.created, 1);
        assert_eq!(report.updated, 0);
        assert_eq!(report.errors, vec!["Sheet 'NORTH', row 3: tag is required"]);
    }

    #[tokio::test]
    async fn test_reimport_updates_every_row() {
        let (engine, _db) = test_engine().await;
        let workbook = Workbook::new(vec![register(
            "NORTH",
            &[
                &["T-100", "Morag", "F", "", ""],
                &["T-200", "Flora", "F", "T-100", ""],
            ],
        )]);

        let first = engine.import(&workbook).await.unwrap();
        let second = engine.import(&workbook).await.unwrap();

        assert_eq!((first.created, first.updated), (2, 0));
        assert_eq!((second.created, second.updated), (0, 2));
    }

    #[tokio::test]
    async fn test_absent_cells_keep_stored_values() {
        let (engine, db) = test_engine().await;
        let full = Workbook::new(vec![Sheet::new(
            "NORTH",
            vec![
                row(&["Tag", "Name", "Status", "Notes"]),
                row(&["T-1", "Morag", "sold", "calm"]),
            ],
        )]);
        let sparse = Workbook::new(vec![Sheet::new(
            "NORTH",
            vec![row(&["Tag", "Name", "Notes"]), row(&["T-1", "NaN", "-"])],
        )]);

        engine.import(&full).await.unwrap();
        engine.import(&sparse).await.unwrap();

        let cow = cow_by_tag(&db, "T-1").await;
        assert_eq!(cow.name, "Morag");
        assert_eq!(cow.status, CowStatus::Sold);
        assert_eq!(cow.notes.as_deref(), Some("calm"));
    }

    #[tokio::test]
    async fn test_nameless_cow_takes_tag_as_name() {
        let (engine, db) = test_engine().await;
        let workbook = Workbook::new(vec![Sheet::new(
            "NORTH",
            vec![row(&["Ear tag"]), vec![Cell::Number(4412.0)]],
        )]);

        engine.import(&workbook).await.unwrap();

        assert_eq!(cow_by_tag(&db, "4412").await.name, "4412");
    }

    #[tokio::test]
    async fn test_self_parent_tag_is_rejected() {
        let (engine, db) = test_engine().await;
        let workbook = Workbook::new(vec![register(
            "NORTH",
            &[&["T-1", "Morag", "F", "T-1", ""]],
        )]);

        let report = engine.import(&workbook).await.unwrap();

        assert_eq!(report.linked, 0);
        assert_eq!(
            report.errors,
            vec!["Sheet 'NORTH', row 2: a cow cannot be its own dam"]
        );
        assert_eq!(cow_by_tag(&db, "T-1").await.dam_id, None);
    }

    #[tokio::test]
    async fn test_unknown_parent_tag_is_reported_not_failed() {
        let (engine, db) = test_engine().await;
        let workbook = Workbook::new(vec![register(
            "NORTH",
            &[&["T-1", "Morag", "F", "GONE-9", ""]],
        )]);

        let report = engine.import(&workbook).await.unwrap();

        assert!(report.errors.is_empty());
        assert_eq!(report.unresolved_tags, vec!["GONE-9"]);
        assert_eq!(cow_by_tag(&db, "T-1").await.dam_id, None);
    }

    #[tokio::test]
    async fn test_omitted_parent_does_not_clear_link() {
        let (engine, db) = test_engine().await;
        let linked = Workbook::new(vec![register(
            "NORTH",
            &[
                &["T-100", "Morag", "F", "", ""],
                &["T-200", "Flora", "F", "T-100", ""],
            ],
        )]);
        let unlinked = Workbook::new(vec![register(
            "NORTH",
            &[&["T-200", "Flora", "F", "", ""]],
        )]);

        engine.import(&linked).await.unwrap();
        engine.import(&unlinked).await.unwrap();

        let dam = cow_by_tag(&db, "T-100").await;
        assert_eq!(cow_by_tag(&db, "T-200").await.dam_id, Some(dam.id));
    }

    #[tokio::test]
    async fn test_sheet_without_tag_column_is_skipped() {
        let (engine, db) = test_engine().await;
        let workbook = Workbook::new(vec![Sheet::new(
            "Notes",
            vec![row(&["Remarks"]), row(&["vet due in May"])],
        )]);

        let report = engine.import(&workbook).await.unwrap();

        assert_eq!(report.created, 0);
        assert_eq!(report.errors, vec!["Sheet 'Notes': no tag column"]);

        let mut conn = db.acquire().await.unwrap();
        assert!(HerdRepository::new(&mut conn).list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_future_birth_date_is_row_error() {
        let (engine, _db) = test_engine().await;
        let workbook = Workbook::new(vec![Sheet::new(
            "NORTH",
            vec![
                row(&["Tag", "Birth date"]),
                row(&["T-1", "2999-01-01"]),
                row(&["T-2", "2020-05-01"]),
            ],
        )]);

        let report = engine.import(&workbook).await.unwrap();

        assert_eq!(report.created, 1);
        assert_eq!(
            report.errors,
            vec!["Sheet 'NORTH', row 2: birth_date cannot be in the future"]
        );
    }

    #[tokio::test]
    async fn test_oversized_upload_is_fatal() {
        let (engine, _db) = test_engine().await;
        let engine = engine.with_max_bytes(4);

        let err = engine.import_bytes(vec![0; 5]).await.unwrap_err();
        assert!(matches!(err, ImportError::TooLarge { size: 5, max: 4 }));
        assert!(err.is_fatal());
    }

    fn assert_send<T: Send>(t: T) -> T {
        t
    }

    #[tokio::test]
    async fn test_import_future_is_send() {
        let (engine, _db) = test_engine().await;
        let workbook = Workbook::new(vec![register(
            "NORTH",
            &[&["T-1", "Morag", "F", "", ""]],
        )]);

        let report = assert_send(engine.import(&workbook)).await.unwrap();
        assert_eq!(report.created, 1);

        let err = assert_send(engine.import_bytes(b"not a workbook".to_vec()))
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_fatal_link_error_rolls_back_whole_import() {
        let (engine, db) = test_engine().await;
        {
            let mut conn = db.acquire().await.unwrap();
            sqlx::query(
                "CREATE TRIGGER cows_frozen BEFORE UPDATE ON cows \
                 BEGIN SELECT RAISE(ABORT, 'disk on fire'); END",
            )
            .execute(&mut *conn)
            .await
            .unwrap();
        }
        let workbook = Workbook::new(vec![
            register("NORTH", &[&["T-200", "Flora", "F", "T-100", ""]]),
            register("SOUTH", &[&["T-100", "Morag", "F", "", ""]]),
        ]);

        let err = engine.import(&workbook).await.unwrap_err();
        assert!(err.is_fatal());

        let mut conn = db.acquire().await.unwrap();
        assert_eq!(CowRepository::new(&mut conn).count().await.unwrap(), 0);
        assert!(HerdRepository::new(&mut conn).list().await.unwrap().is_empty());
    }
}
