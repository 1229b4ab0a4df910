//! # Event Repository

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::{DbError, DbResult};
use herd_core::{Event, NewEvent, RecordId};

const EVENT_COLUMNS: &str = "id, cow_id, event_type, date, notes, created_at";

#[derive(Debug)]
pub struct EventRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> EventRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        EventRepository { conn }
    }

    pub async fn get_by_id(&mut self, id: RecordId) -> DbResult<Option<Event>> {
        let event = sqlx::query_as::<_, Event>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(event)
    }

    pub async fn insert(&mut self, event: &NewEvent) -> DbResult<Event> {
        let stored = sqlx::query_as::<_, Event>(&format!(
            r#"
            INSERT INTO events (cow_id, event_type, date, notes, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            RETURNING {EVENT_COLUMNS}
            "#
        ))
        .bind(event.cow_id)
        .bind(event.event_type)
        .bind(event.date)
        .bind(&event.notes)
        .bind(Utc::now())
        .fetch_one(&mut *self.conn)
        .await?;

        debug!(id = stored.id, cow_id = stored.cow_id, "Event created");
        Ok(stored)
    }

    pub async fn update(&mut self, event: &Event) -> DbResult<Event> {
        let stored = sqlx::query_as::<_, Event>(&format!(
            r#"
            UPDATE events SET cow_id = ?2, event_type = ?3, date = ?4, notes = ?5
            WHERE id = ?1
            RETURNING {EVENT_COLUMNS}
            "#
        ))
        .bind(event.id)
        .bind(event.cow_id)
        .bind(event.event_type)
        .bind(event.date)
        .bind(&event.notes)
        .fetch_optional(&mut *self.conn)
        .await?
        .ok_or_else(|| DbError::not_found("Event", event.id))?;

        Ok(stored)
    }

    /// Physically deletes the event. Returns false if it was not there.
    pub async fn delete(&mut self, id: RecordId) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM events WHERE id = ?1")
            .bind(id)
            .execute(&mut *self.conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Events of one cow, newest first.
    pub async fn list_for_cow(&mut self, cow_id: RecordId) -> DbResult<Vec<Event>> {
        let events = sqlx::query_as::<_, Event>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE cow_id = ?1 ORDER BY date DESC, id DESC"
        ))
        .bind(cow_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::cow::CowRepository;
    use crate::repository::test_support::test_db;
    use chrono::NaiveDate;
    use herd_core::{EventType, NewCow};

    #[tokio::test]
    async fn test_event_crud() {
        let db = test_db().await;
        let mut conn = db.acquire().await.unwrap();
        let cow = CowRepository::new(&mut conn)
            .insert(&NewCow::new("PL-1", "Morag"))
            .await
            .unwrap();

        let mut events = EventRepository::new(&mut conn);
        let mut event = events
            .insert(&NewEvent {
                cow_id: cow.id,
                event_type: EventType::Vaccination,
                date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                notes: None,
            })
            .await
            .unwrap();

        event.notes = Some("booster".to_string());
        let updated = events.update(&event).await.unwrap();
        assert_eq!(updated.notes.as_deref(), Some("booster"));
        assert_eq!(events.list_for_cow(cow.id).await.unwrap().len(), 1);

        assert!(events.delete(event.id).await.unwrap());
        assert!(!events.delete(event.id).await.unwrap());
        assert_eq!(events.get_by_id(event.id).await.unwrap(), None);
    }
}
