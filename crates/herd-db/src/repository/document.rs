//! # Document Repository
//!
//! Metadata only. File storage is handled outside the herd book.

use chrono::Utc;
use sqlx::SqliteConnection;

use crate::error::DbResult;
use herd_core::{Document, NewDocument, RecordId};

const DOCUMENT_COLUMNS: &str = "id, cow_id, title, file_name, uploaded_at";

#[derive(Debug)]
pub struct DocumentRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> DocumentRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        DocumentRepository { conn }
    }

    pub async fn get_by_id(&mut self, id: RecordId) -> DbResult<Option<Document>> {
        let document = sqlx::query_as::<_, Document>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(document)
    }

    pub async fn insert(&mut self, document: &NewDocument) -> DbResult<Document> {
        let stored = sqlx::query_as::<_, Document>(&format!(
            r#"
            INSERT INTO documents (cow_id, title, file_name, uploaded_at)
            VALUES (?1, ?2, ?3, ?4)
            RETURNING {DOCUMENT_COLUMNS}
            "#
        ))
        .bind(document.cow_id)
        .bind(&document.title)
        .bind(&document.file_name)
        .bind(Utc::now())
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(stored)
    }

    /// Physically deletes the record. Returns false if it was not there.
    pub async fn delete(&mut self, id: RecordId) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?1")
            .bind(id)
            .execute(&mut *self.conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn list_for_cow(&mut self, cow_id: RecordId) -> DbResult<Vec<Document>> {
        let documents = sqlx::query_as::<_, Document>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE cow_id = ?1 ORDER BY uploaded_at DESC"
        ))
        .bind(cow_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(documents)
    }
}
