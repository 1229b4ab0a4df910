//! # Cow Repository
//!
//! Database operations for cows.
//!
//! ## Key Operations
//! - Lookup by store id or by ear tag
//! - Full-row update (callers apply a patch to a fetched row first)
//! - Soft delete: status moves to ARCHIVED, the row stays
//! - Pedigree links and the bulk tag → id lookup the importer needs
//!
//! ## Bulk Tag Lookup
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    ids_by_tags(["A", "B", ... 1200 tags])               │
//! │                                                                         │
//! │   chunk 1 (500)  ──► SELECT tag, id FROM cows WHERE tag IN (?, ?, ...)  │
//! │   chunk 2 (500)  ──► SELECT tag, id FROM cows WHERE tag IN (?, ?, ...)  │
//! │   chunk 3 (200)  ──► SELECT tag, id FROM cows WHERE tag IN (?, ?, ...)  │
//! │                                                                         │
//! │   Stays under SQLite's bound-parameter limit; 3 queries, not 1200.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use tracing::debug;

use crate::error::{DbError, DbResult};
use herd_core::{Cow, CowStatus, NewCow, RecordId};

const COW_COLUMNS: &str = "id, tag, name, breed, birth_date, gender, status, passport_number, \
     dam_id, sire_id, herd_id, exit_date, exit_reason, sale_price_cents, meat_delivery_date, \
     notes, created_at, updated_at";

/// Tags per `IN (...)` query.
const TAG_CHUNK: usize = 500;

/// Repository for cow database operations.
///
/// ## Usage
/// ```rust,ignore
/// let mut tx = db.begin().await?;
/// let mut cows = CowRepository::new(&mut *tx);
///
/// let cow = cows.get_by_tag("PL-0042").await?;
/// cows.set_status(cow.id, CowStatus::Archived).await?;
/// ```
#[derive(Debug)]
pub struct CowRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> CowRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        CowRepository { conn }
    }

    /// Gets a cow by its store id.
    ///
    /// ## Returns
    /// * `Ok(Some(Cow))` - Cow found
    /// * `Ok(None)` - Cow not found
    pub async fn get_by_id(&mut self, id: RecordId) -> DbResult<Option<Cow>> {
        let cow = sqlx::query_as::<_, Cow>(&format!(
            "SELECT {COW_COLUMNS} FROM cows WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(cow)
    }

    /// Like `get_by_id`, but a missing cow is an error.
    pub async fn require(&mut self, id: RecordId) -> DbResult<Cow> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Cow", id))
    }

    /// Gets a cow by its ear tag.
    pub async fn get_by_tag(&mut self, tag: &str) -> DbResult<Option<Cow>> {
        let cow = sqlx::query_as::<_, Cow>(&format!(
            "SELECT {COW_COLUMNS} FROM cows WHERE tag = ?1"
        ))
        .bind(tag)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(cow)
    }

    pub async fn exists(&mut self, id: RecordId) -> DbResult<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM cows WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;

        Ok(found.is_some())
    }

    /// True if another cow already carries `tag`. `except` excludes the cow
    /// being updated.
    pub async fn tag_taken(&mut self, tag: &str, except: Option<RecordId>) -> DbResult<bool> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT id FROM cows WHERE tag = ?1 AND (?2 IS NULL OR id <> ?2)")
                .bind(tag)
                .bind(except)
                .fetch_optional(&mut *self.conn)
                .await?;

        Ok(found.is_some())
    }

    /// Inserts a new cow and returns the stored row.
    pub async fn insert(&mut self, cow: &NewCow) -> DbResult<Cow> {
        let now = Utc::now();

        let stored = sqlx::query_as::<_, Cow>(&format!(
            r#"
            INSERT INTO cows (
                tag, name, breed, birth_date, gender, status, passport_number,
                dam_id, sire_id, herd_id, exit_date, exit_reason, sale_price_cents,
                meat_delivery_date, notes, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?16)
            RETURNING {COW_COLUMNS}
            "#
        ))
        .bind(&cow.tag)
        .bind(&cow.name)
        .bind(&cow.breed)
        .bind(cow.birth_date)
        .bind(cow.gender)
        .bind(cow.status)
        .bind(&cow.passport_number)
        .bind(cow.dam_id)
        .bind(cow.sire_id)
        .bind(cow.herd_id)
        .bind(cow.exit_date)
        .bind(&cow.exit_reason)
        .bind(cow.sale_price_cents)
        .bind(cow.meat_delivery_date)
        .bind(&cow.notes)
        .bind(now)
        .fetch_one(&mut *self.conn)
        .await?;

        debug!(id = stored.id, tag = %stored.tag, "Cow created");
        Ok(stored)
    }

    /// Writes every mutable column of `cow` and bumps `updated_at`.
    pub async fn update(&mut self, cow: &Cow) -> DbResult<Cow> {
        let stored = sqlx::query_as::<_, Cow>(&format!(
            r#"
            UPDATE cows SET
                tag = ?2, name = ?3, breed = ?4, birth_date = ?5, gender = ?6,
                status = ?7, passport_number = ?8, dam_id = ?9, sire_id = ?10,
                herd_id = ?11, exit_date = ?12, exit_reason = ?13,
                sale_price_cents = ?14, meat_delivery_date = ?15, notes = ?16,
                updated_at = ?17
            WHERE id = ?1
            RETURNING {COW_COLUMNS}
            "#
        ))
        .bind(cow.id)
        .bind(&cow.tag)
        .bind(&cow.name)
        .bind(&cow.breed)
        .bind(cow.birth_date)
        .bind(cow.gender)
        .bind(cow.status)
        .bind(&cow.passport_number)
        .bind(cow.dam_id)
        .bind(cow.sire_id)
        .bind(cow.herd_id)
        .bind(cow.exit_date)
        .bind(&cow.exit_reason)
        .bind(cow.sale_price_cents)
        .bind(cow.meat_delivery_date)
        .bind(&cow.notes)
        .bind(Utc::now())
        .fetch_optional(&mut *self.conn)
        .await?
        .ok_or_else(|| DbError::not_found("Cow", cow.id))?;

        debug!(id = stored.id, "Cow updated");
        Ok(stored)
    }

    /// Sets the status. Returns false if no such cow.
    ///
    /// Deleting a cow is `set_status(id, CowStatus::Archived)`; rows are
    /// never removed.
    pub async fn set_status(&mut self, id: RecordId, status: CowStatus) -> DbResult<bool> {
        let result = sqlx::query("UPDATE cows SET status = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(status)
            .bind(Utc::now())
            .execute(&mut *self.conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Sets whichever parent links are `Some`; `None` leaves a link alone.
    pub async fn set_parents(
        &mut self,
        id: RecordId,
        dam_id: Option<RecordId>,
        sire_id: Option<RecordId>,
    ) -> DbResult<()> {
        if dam_id.is_none() && sire_id.is_none() {
            return Ok(());
        }

        let result = sqlx::query(
            r#"
            UPDATE cows SET
                dam_id = COALESCE(?2, dam_id),
                sire_id = COALESCE(?3, sire_id),
                updated_at = ?4
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(dam_id)
        .bind(sire_id)
        .bind(Utc::now())
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Cow", id));
        }
        Ok(())
    }

    /// Looks up the ids of all cows whose tag is in `tags`, in chunks.
    ///
    /// Tags with no cow are simply absent from the result.
    pub async fn ids_by_tags(&mut self, tags: &[String]) -> DbResult<Vec<(String, RecordId)>> {
        let mut found = Vec::with_capacity(tags.len());

        for chunk in tags.chunks(TAG_CHUNK) {
            let mut query: QueryBuilder<Sqlite> =
                QueryBuilder::new("SELECT tag, id FROM cows WHERE tag IN (");
            let mut separated = query.separated(", ");
            for tag in chunk {
                separated.push_bind(tag.as_str());
            }
            separated.push_unseparated(")");

            let rows: Vec<(String, RecordId)> = query
                .build_query_as()
                .fetch_all(&mut *self.conn)
                .await?;
            found.extend(rows);
        }

        debug!(requested = tags.len(), found = found.len(), "Bulk tag lookup");
        Ok(found)
    }

    pub async fn list(&mut self) -> DbResult<Vec<Cow>> {
        let cows = sqlx::query_as::<_, Cow>(&format!(
            "SELECT {COW_COLUMNS} FROM cows ORDER BY tag"
        ))
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(cows)
    }

    pub async fn count(&mut self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cows")
            .fetch_one(&mut *self.conn)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::test_db;
    use herd_core::{Gender, DEFAULT_BREED};

    #[tokio::test]
    async fn test_insert_applies_defaults() {
        let db = test_db().await;
        let mut conn = db.acquire().await.unwrap();
        let mut cows = CowRepository::new(&mut conn);

        let cow = cows.insert(&NewCow::new("PL-1", "Morag")).await.unwrap();

        assert!(cow.id > 0);
        assert_eq!(cow.breed, DEFAULT_BREED);
        assert_eq!(cow.gender, Gender::Female);
        assert_eq!(cow.status, CowStatus::Active);
        assert_eq!(cows.get_by_tag("PL-1").await.unwrap(), Some(cow));
    }

    #[tokio::test]
    async fn test_duplicate_tag_hits_unique_index() {
        let db = test_db().await;
        let mut conn = db.acquire().await.unwrap();
        let mut cows = CowRepository::new(&mut conn);

        let first = cows.insert(&NewCow::new("PL-1", "Morag")).await.unwrap();
        assert!(cows.tag_taken("PL-1", None).await.unwrap());
        assert!(!cows.tag_taken("PL-1", Some(first.id)).await.unwrap());

        let err = cows.insert(&NewCow::new("PL-1", "Other")).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn test_update_round_trip() {
        let db = test_db().await;
        let mut conn = db.acquire().await.unwrap();
        let mut cows = CowRepository::new(&mut conn);

        let mut cow = cows.insert(&NewCow::new("PL-1", "Morag")).await.unwrap();
        cow.name = "Morag Mor".to_string();
        cow.sale_price_cents = Some(125_050);

        let stored = cows.update(&cow).await.unwrap();
        assert_eq!(stored.name, "Morag Mor");
        assert_eq!(stored.sale_price_cents, Some(125_050));
        assert!(stored.updated_at >= cow.updated_at);
    }

    #[tokio::test]
    async fn test_soft_delete_keeps_row() {
        let db = test_db().await;
        let mut conn = db.acquire().await.unwrap();
        let mut cows = CowRepository::new(&mut conn);

        let cow = cows.insert(&NewCow::new("PL-1", "Morag")).await.unwrap();
        assert!(cows.set_status(cow.id, CowStatus::Archived).await.unwrap());
        assert!(!cows.set_status(999, CowStatus::Archived).await.unwrap());

        let stored = cows.require(cow.id).await.unwrap();
        assert_eq!(stored.status, CowStatus::Archived);
        assert_eq!(cows.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_set_parents_only_touches_given_links() {
        let db = test_db().await;
        let mut conn = db.acquire().await.unwrap();
        let mut cows = CowRepository::new(&mut conn);

        let dam = cows.insert(&NewCow::new("D", "Dam")).await.unwrap();
        let sire = cows.insert(&NewCow::new("S", "Sire")).await.unwrap();
        let calf = cows.insert(&NewCow::new("C", "Calf")).await.unwrap();

        cows.set_parents(calf.id, Some(dam.id), None).await.unwrap();
        cows.set_parents(calf.id, None, Some(sire.id)).await.unwrap();

        let calf = cows.require(calf.id).await.unwrap();
        assert_eq!(calf.dam_id, Some(dam.id));
        assert_eq!(calf.sire_id, Some(sire.id));
    }

    #[tokio::test]
    async fn test_missing_parent_is_foreign_key_violation() {
        let db = test_db().await;
        let mut conn = db.acquire().await.unwrap();
        let mut cows = CowRepository::new(&mut conn);

        let calf = cows.insert(&NewCow::new("C", "Calf")).await.unwrap();
        let err = cows.set_parents(calf.id, Some(4242), None).await.unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
    }

    #[tokio::test]
    async fn test_ids_by_tags_spans_chunks() {
        let db = test_db().await;
        let mut conn = db.acquire().await.unwrap();
        let mut cows = CowRepository::new(&mut conn);

        let mut tags = Vec::new();
        for n in 0..(TAG_CHUNK + 20) {
            let tag = format!("T-{n}");
            cows.insert(&NewCow::new(tag.clone(), "x")).await.unwrap();
            tags.push(tag);
        }
        tags.push("missing".to_string());

        let found = cows.ids_by_tags(&tags).await.unwrap();
        assert_eq!(found.len(), TAG_CHUNK + 20);
        assert!(found.iter().all(|(tag, _)| tag != "missing"));
    }
}
