//! # Record Mutations
//!
//! Create, update and delete for every record a client can change.
//!
//! These are the only write paths for client-supplied records. The sync
//! engine calls them once per job inside a savepoint; `PATCH /api/cows/{id}`
//! calls [`update_cow`] inside its own transaction. Both therefore enforce the
//! same rules:
//!
//! - field validation from `herd_core::validation`
//! - tag uniqueness, checked before the write
//! - every `dam`/`sire`/`herd`/`cow` reference must exist
//! - a cow is never its own dam or sire
//!
//! All functions take an already-resolved payload: temp ids have been mapped
//! by the caller.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::debug;

use herd_core::validation::{
    validate_cow, validate_herd_name, validate_new_cow, validate_new_task, validate_task,
};
use herd_core::{
    CoreError, Cow, CowPatch, CowStatus, Event, EventPatch, Herd, HerdPatch, RecordId, Task,
    TaskPatch, ValidationError,
};
use herd_db::{
    CowRepository, DocumentRepository, EventRepository, HerdRepository, TaskRepository,
};

use crate::error::SyncResult;

// =============================================================================
// Reference Checks
// =============================================================================

async fn ensure_cow(conn: &mut SqliteConnection, id: Option<RecordId>) -> SyncResult<()> {
    if let Some(id) = id {
        if !CowRepository::new(conn).exists(id).await? {
            return Err(CoreError::not_found("Cow", id).into());
        }
    }
    Ok(())
}

async fn ensure_herd(conn: &mut SqliteConnection, id: Option<RecordId>) -> SyncResult<()> {
    if let Some(id) = id {
        if !HerdRepository::new(conn).exists(id).await? {
            return Err(CoreError::not_found("Herd", id).into());
        }
    }
    Ok(())
}

async fn ensure_tag_free(
    conn: &mut SqliteConnection,
    tag: &str,
    except: Option<RecordId>,
) -> SyncResult<()> {
    if CowRepository::new(conn).tag_taken(tag, except).await? {
        return Err(ValidationError::Duplicate {
            field: "tag".to_string(),
            value: tag.to_string(),
        }
        .into());
    }
    Ok(())
}

// =============================================================================
// Herd
// =============================================================================

/// Creates a herd, or returns the existing one with the same name.
pub async fn create_herd(conn: &mut SqliteConnection, patch: HerdPatch) -> SyncResult<Herd> {
    let name = patch.into_name()?;
    validate_herd_name(&name)?;

    Ok(HerdRepository::new(conn).get_or_create(&name).await?)
}

// =============================================================================
// Cow
// =============================================================================

pub async fn create_cow(conn: &mut SqliteConnection, patch: CowPatch) -> SyncResult<Cow> {
    let cow = patch.into_new_cow()?;
    validate_new_cow(&cow, Utc::now().date_naive())?;

    ensure_tag_free(conn, &cow.tag, None).await?;
    ensure_cow(conn, cow.dam_id).await?;
    ensure_cow(conn, cow.sire_id).await?;
    ensure_herd(conn, cow.herd_id).await?;

    Ok(CowRepository::new(conn).insert(&cow).await?)
}

/// Applies a partial update to a stored cow.
///
/// Only fields present in `patch` change. References are checked only when
/// the patch touches them.
pub async fn update_cow(
    conn: &mut SqliteConnection,
    id: RecordId,
    patch: &CowPatch,
) -> SyncResult<Cow> {
    let mut cow = CowRepository::new(conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| CoreError::not_found("Cow", id))?;

    patch.apply(&mut cow);
    validate_cow(&cow, Utc::now().date_naive())?;

    if patch.tag.is_some() {
        ensure_tag_free(conn, &cow.tag, Some(id)).await?;
    }
    if let Some(dam) = patch.dam {
        ensure_cow(conn, dam).await?;
    }
    if let Some(sire) = patch.sire {
        ensure_cow(conn, sire).await?;
    }
    if let Some(herd) = patch.herd {
        ensure_herd(conn, herd).await?;
    }

    let stored = CowRepository::new(conn).update(&cow).await?;
    debug!(id, "Cow patched");
    Ok(stored)
}

/// Soft delete: the cow is archived, never removed.
pub async fn archive_cow(conn: &mut SqliteConnection, id: RecordId) -> SyncResult<()> {
    if !CowRepository::new(conn)
        .set_status(id, CowStatus::Archived)
        .await?
    {
        return Err(CoreError::not_found("Cow", id).into());
    }
    Ok(())
}

// =============================================================================
// Event
// =============================================================================

pub async fn create_event(conn: &mut SqliteConnection, patch: EventPatch) -> SyncResult<Event> {
    let event = patch.into_new_event()?;
    ensure_cow(conn, Some(event.cow_id)).await?;

    Ok(EventRepository::new(conn).insert(&event).await?)
}

pub async fn update_event(
    conn: &mut SqliteConnection,
    id: RecordId,
    patch: &EventPatch,
) -> SyncResult<Event> {
    let mut event = EventRepository::new(conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| CoreError::not_found("Event", id))?;

    patch.apply(&mut event);
    if patch.cow.is_some() {
        ensure_cow(conn, Some(event.cow_id)).await?;
    }

    Ok(EventRepository::new(conn).update(&event).await?)
}

pub async fn delete_event(conn: &mut SqliteConnection, id: RecordId) -> SyncResult<()> {
    if !EventRepository::new(conn).delete(id).await? {
        return Err(CoreError::not_found("Event", id).into());
    }
    Ok(())
}

// =============================================================================
// Task
// =============================================================================

pub async fn create_task(conn: &mut SqliteConnection, patch: TaskPatch) -> SyncResult<Task> {
    let task = patch.into_new_task()?;
    validate_new_task(&task)?;
    ensure_cow(conn, task.cow_id).await?;

    Ok(TaskRepository::new(conn).insert(&task).await?)
}

pub async fn update_task(
    conn: &mut SqliteConnection,
    id: RecordId,
    patch: &TaskPatch,
) -> SyncResult<Task> {
    let mut task = TaskRepository::new(conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| CoreError::not_found("Task", id))?;

    patch.apply(&mut task);
    validate_task(&task)?;
    if let Some(cow) = patch.cow {
        ensure_cow(conn, cow).await?;
    }

    Ok(TaskRepository::new(conn).update(&task).await?)
}

pub async fn delete_task(conn: &mut SqliteConnection, id: RecordId) -> SyncResult<()> {
    if !TaskRepository::new(conn).delete(id).await? {
        return Err(CoreError::not_found("Task", id).into());
    }
    Ok(())
}

// =============================================================================
// Document
// =============================================================================

pub async fn delete_document(conn: &mut SqliteConnection, id: RecordId) -> SyncResult<()> {
    if !DocumentRepository::new(conn).delete(id).await? {
        return Err(CoreError::not_found("Document", id).into());
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use herd_db::{Database, DbConfig};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn cow_patch(tag: &str) -> CowPatch {
        CowPatch {
            tag: Some(tag.to_string()),
            name: Some(format!("Cow {tag}")),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_cow_rejects_duplicate_tag() {
        let db = test_db().await;
        let mut conn = db.acquire().await.unwrap();

        create_cow(&mut conn, cow_patch("PL-1")).await.unwrap();
        let err = create_cow(&mut conn, cow_patch("PL-1")).await.unwrap_err();

        assert!(matches!(
            err,
            SyncError::Validation(ValidationError::Duplicate { .. })
        ));
    }

    #[tokio::test]
    async fn test_create_cow_requires_existing_parents() {
        let db = test_db().await;
        let mut conn = db.acquire().await.unwrap();

        let mut patch = cow_patch("PL-2");
        patch.dam = Some(Some(404));
        let err = create_cow(&mut conn, patch).await.unwrap_err();

        assert_eq!(err.to_string(), "Cow not found: 404");
    }

    #[tokio::test]
    async fn test_update_cow_rejects_self_parent() {
        let db = test_db().await;
        let mut conn = db.acquire().await.unwrap();
        let cow = create_cow(&mut conn, cow_patch("PL-1")).await.unwrap();

        let patch = CowPatch {
            sire: Some(Some(cow.id)),
            ..Default::default()
        };
        let err = update_cow(&mut conn, cow.id, &patch).await.unwrap_err();

        assert!(matches!(
            err,
            SyncError::Validation(ValidationError::SelfReference { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_cow_keeps_own_tag() {
        let db = test_db().await;
        let mut conn = db.acquire().await.unwrap();
        let cow = create_cow(&mut conn, cow_patch("PL-1")).await.unwrap();

        let patch = CowPatch {
            tag: Some("PL-1".to_string()),
            notes: Some(Some("quiet".to_string())),
            ..Default::default()
        };
        let updated = update_cow(&mut conn, cow.id, &patch).await.unwrap();
        assert_eq!(updated.notes.as_deref(), Some("quiet"));
    }

    #[tokio::test]
    async fn test_archive_cow_is_soft_delete() {
        let db = test_db().await;
        let mut conn = db.acquire().await.unwrap();
        let cow = create_cow(&mut conn, cow_patch("PL-1")).await.unwrap();

        archive_cow(&mut conn, cow.id).await.unwrap();

        let stored = CowRepository::new(&mut conn).require(cow.id).await.unwrap();
        assert_eq!(stored.status, CowStatus::Archived);
        assert!(archive_cow(&mut conn, 999).await.is_err());
    }

    #[tokio::test]
    async fn test_create_herd_reuses_name() {
        let db = test_db().await;
        let mut conn = db.acquire().await.unwrap();

        let patch = || HerdPatch {
            name: Some(" North ".to_string()),
        };
        let first = create_herd(&mut conn, patch()).await.unwrap();
        let second = create_herd(&mut conn, patch()).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.name, "North");
    }
}
