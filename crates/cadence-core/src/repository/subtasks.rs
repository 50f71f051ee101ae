use crate::error::CoreError;
use crate::models::{NewSubtaskData, Subtask};
use crate::repository::tasks::short_id_pattern;
use crate::repository::{SqliteRepository, SubtaskRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Sqlite, Transaction};
use uuid::Uuid;

#[async_trait]
impl SubtaskRepository for SqliteRepository {
    async fn add_subtask(&self, data: NewSubtaskData) -> Result<Subtask, CoreError> {
        let description = data.description.trim().to_string();
        if description.is_empty() {
            return Err(CoreError::Validation(
                "Subtask description cannot be empty".to_string(),
            ));
        }

        let now = self.now();
        let mut tx = self.pool().begin().await?;

        // Write the parent first so concurrent adds don't pick the same position.
        Self::touch_task_in_transaction(&mut tx, data.task_id).await?;

        let position: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM subtasks WHERE task_id = $1",
        )
        .bind(data.task_id)
        .fetch_one(&mut *tx)
        .await?;

        let subtask = Subtask {
            id: Uuid::new_v4(),
            task_id: data.task_id,
            description,
            completed: false,
            position,
            created_at: now,
            updated_at: now,
        };
        Self::insert_subtask_in_transaction(&mut tx, &subtask).await?;

        tx.commit().await?;
        Ok(subtask)
    }

    async fn find_subtask_by_id(&self, id: Uuid) -> Result<Option<Subtask>, CoreError> {
        let subtask = sqlx::query_as("SELECT * FROM subtasks WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(subtask)
    }

    async fn find_subtasks_by_short_id_prefix(&self, short_id: &str) -> Result<Vec<Subtask>, CoreError> {
        let Some(pattern) = short_id_pattern(short_id) else {
            return Ok(Vec::new());
        };
        let subtasks = sqlx::query_as("SELECT * FROM subtasks WHERE lower(hex(id)) LIKE $1")
            .bind(pattern)
            .fetch_all(self.pool())
            .await?;
        Ok(subtasks)
    }

    async fn find_subtasks(&self, task_id: Uuid) -> Result<Vec<Subtask>, CoreError> {
        let subtasks = sqlx::query_as("SELECT * FROM subtasks WHERE task_id = $1 ORDER BY position")
            .bind(task_id)
            .fetch_all(self.pool())
            .await?;
        Ok(subtasks)
    }

    async fn delete_subtask(&self, id: Uuid) -> Result<(), CoreError> {
        let result = sqlx::query("DELETE FROM subtasks WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("Subtask {}", id)));
        }
        Ok(())
    }
}

impl SqliteRepository {
    pub(crate) async fn insert_subtask_in_transaction<'a>(
        tx: &mut Transaction<'a, Sqlite>,
        subtask: &Subtask,
    ) -> Result<(), CoreError> {
        sqlx::query(
            r#"INSERT INTO subtasks (id, task_id, description, completed, position, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(subtask.id)
        .bind(subtask.task_id)
        .bind(&subtask.description)
        .bind(subtask.completed)
        .bind(subtask.position)
        .bind(subtask.created_at)
        .bind(subtask.updated_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    pub(crate) async fn find_subtasks_in_transaction<'a>(
        tx: &mut Transaction<'a, Sqlite>,
        task_id: Uuid,
    ) -> Result<Vec<Subtask>, CoreError> {
        let subtasks = sqlx::query_as("SELECT * FROM subtasks WHERE task_id = $1 ORDER BY position")
            .bind(task_id)
            .fetch_all(&mut **tx)
            .await?;
        Ok(subtasks)
    }

    /// Copies `from`'s checklist onto `to`, every item reset to incomplete.
    pub(crate) async fn copy_subtasks_in_transaction<'a>(
        tx: &mut Transaction<'a, Sqlite>,
        from: Uuid,
        to: Uuid,
        now: DateTime<Utc>,
    ) -> Result<usize, CoreError> {
        let originals = Self::find_subtasks_in_transaction(tx, from).await?;
        for original in &originals {
            let copy = Subtask {
                id: Uuid::new_v4(),
                task_id: to,
                description: original.description.clone(),
                completed: false,
                position: original.position,
                created_at: now,
                updated_at: now,
            };
            Self::insert_subtask_in_transaction(tx, &copy).await?;
        }
        Ok(originals.len())
    }
}
