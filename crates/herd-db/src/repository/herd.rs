//! # Herd Repository
//!
//! Herds are only ever looked up or created by name. The importer derives
//! one from each sheet name and reuses it on every later import.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use herd_core::{Herd, RecordId};

const HERD_COLUMNS: &str = "id, name, created_at";

/// Repository for herd database operations.
#[derive(Debug)]
pub struct HerdRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> HerdRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        HerdRepository { conn }
    }

    pub async fn get_by_id(&mut self, id: RecordId) -> DbResult<Option<Herd>> {
        let herd = sqlx::query_as::<_, Herd>(&format!(
            "SELECT {HERD_COLUMNS} FROM herds WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(herd)
    }

    pub async fn get_by_name(&mut self, name: &str) -> DbResult<Option<Herd>> {
        let herd = sqlx::query_as::<_, Herd>(&format!(
            "SELECT {HERD_COLUMNS} FROM herds WHERE name = ?1"
        ))
        .bind(name)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(herd)
    }

    pub async fn exists(&mut self, id: RecordId) -> DbResult<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM herds WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;

        Ok(found.is_some())
    }

    /// Inserts a herd. Fails with `UniqueViolation` if the name is taken.
    pub async fn insert(&mut self, name: &str) -> DbResult<Herd> {
        let herd = sqlx::query_as::<_, Herd>(&format!(
            "INSERT INTO herds (name, created_at) VALUES (?1, ?2) RETURNING {HERD_COLUMNS}"
        ))
        .bind(name)
        .bind(Utc::now())
        .fetch_one(&mut *self.conn)
        .await?;

        debug!(id = herd.id, name = %herd.name, "Herd created");
        Ok(herd)
    }

    /// Returns the herd with this name, creating it first if needed.
    pub async fn get_or_create(&mut self, name: &str) -> DbResult<Herd> {
        if let Some(herd) = self.get_by_name(name).await? {
            return Ok(herd);
        }
        self.insert(name).await
    }

    pub async fn list(&mut self) -> DbResult<Vec<Herd>> {
        let herds = sqlx::query_as::<_, Herd>(&format!(
            "SELECT {HERD_COLUMNS} FROM herds ORDER BY name"
        ))
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(herds)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::repository::test_support::test_db;

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let db = test_db().await;
        let mut conn = db.acquire().await.unwrap();
        let mut repo = HerdRepository::new(&mut conn);

        let first = repo.get_or_create("Glen").await.unwrap();
        let second = repo.get_or_create("Glen").await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(repo.list().await.unwrap().len(), 1);
        assert!(repo.exists(first.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_name_rejected() {
        let db = test_db().await;
        let mut conn = db.acquire().await.unwrap();
        let mut repo = HerdRepository::new(&mut conn);

        repo.insert("Glen").await.unwrap();
        let err = repo.insert("Glen").await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }
}
