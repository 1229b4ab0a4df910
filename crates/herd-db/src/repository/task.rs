//! # Task Repository

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::{DbError, DbResult};
use herd_core::{NewTask, RecordId, Task};

const TASK_COLUMNS: &str =
    "id, title, task_type, due_date, notes, cow_id, is_completed, created_at, updated_at";

#[derive(Debug)]
pub struct TaskRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> TaskRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        TaskRepository { conn }
    }

    pub async fn get_by_id(&mut self, id: RecordId) -> DbResult<Option<Task>> {
        let task = sqlx::query_as::<_, Task>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(task)
    }

    pub async fn insert(&mut self, task: &NewTask) -> DbResult<Task> {
        let stored = sqlx::query_as::<_, Task>(&format!(
            r#"
            INSERT INTO tasks (
                title, task_type, due_date, notes, cow_id, is_completed, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(&task.title)
        .bind(task.task_type)
        .bind(task.due_date)
        .bind(&task.notes)
        .bind(task.cow_id)
        .bind(task.is_completed)
        .bind(Utc::now())
        .fetch_one(&mut *self.conn)
        .await?;

        debug!(id = stored.id, title = %stored.title, "Task created");
        Ok(stored)
    }

    pub async fn update(&mut self, task: &Task) -> DbResult<Task> {
        let stored = sqlx::query_as::<_, Task>(&format!(
            r#"
            UPDATE tasks SET
                title = ?2, task_type = ?3, due_date = ?4, notes = ?5,
                cow_id = ?6, is_completed = ?7, updated_at = ?8
            WHERE id = ?1
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(task.id)
        .bind(&task.title)
        .bind(task.task_type)
        .bind(task.due_date)
        .bind(&task.notes)
        .bind(task.cow_id)
        .bind(task.is_completed)
        .bind(Utc::now())
        .fetch_optional(&mut *self.conn)
        .await?
        .ok_or_else(|| DbError::not_found("Task", task.id))?;

        Ok(stored)
    }

    /// Physically deletes the task. Returns false if it was not there.
    pub async fn delete(&mut self, id: RecordId) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?1")
            .bind(id)
            .execute(&mut *self.conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Open tasks, soonest first.
    pub async fn list_open(&mut self) -> DbResult<Vec<Task>> {
        let tasks = sqlx::query_as::<_, Task>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE is_completed = 0 ORDER BY due_date, id"
        ))
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::test_db;
    use chrono::NaiveDate;
    use herd_core::TaskType;

    #[tokio::test]
    async fn test_task_crud() {
        let db = test_db().await;
        let mut conn = db.acquire().await.unwrap();
        let mut tasks = TaskRepository::new(&mut conn);

        let mut task = tasks
            .insert(&NewTask {
                title: "Worming".to_string(),
                task_type: TaskType::VetVisit,
                due_date: NaiveDate::from_ymd_opt(2024, 9, 1).unwrap(),
                notes: None,
                cow_id: None,
                is_completed: false,
            })
            .await
            .unwrap();
        assert_eq!(tasks.list_open().await.unwrap().len(), 1);

        task.is_completed = true;
        let done = tasks.update(&task).await.unwrap();
        assert!(done.is_completed);
        assert!(tasks.list_open().await.unwrap().is_empty());

        assert!(tasks.delete(task.id).await.unwrap());
        assert_eq!(tasks.get_by_id(task.id).await.unwrap(), None);
    }
}
