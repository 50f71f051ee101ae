use crate::error::CoreError;
use crate::models::{
    validate_description, validate_title, NewTaskData, Task, TaskListFilter, TaskPriority, TaskStatus,
    UpdateTaskData,
};
use crate::recurrence;
use crate::repository::patterns::reference_date;
use crate::repository::{SqliteRepository, TaskRepository};
use crate::retry::retry_once_on_conflict;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, Transaction};
use uuid::Uuid;

#[async_trait]
impl TaskRepository for SqliteRepository {
    async fn add_task(&self, data: NewTaskData) -> Result<Task, CoreError> {
        let now = self.now();
        let mut tx = self.pool().begin().await?;
        let task = Self::add_task_in_transaction(&mut tx, data, now).await?;
        tx.commit().await?;

        tracing::debug!(task_id = %task.id, title = %task.title, "Task created");
        Ok(task)
    }

    async fn find_task_by_id(&self, id: Uuid) -> Result<Option<Task>, CoreError> {
        let task = sqlx::query_as("SELECT * FROM tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(task)
    }

    async fn find_tasks_by_short_id_prefix(&self, short_id: &str) -> Result<Vec<Task>, CoreError> {
        let Some(pattern) = short_id_pattern(short_id) else {
            return Ok(Vec::new());
        };
        let tasks: Vec<Task> = sqlx::query_as("SELECT * FROM tasks WHERE lower(hex(id)) LIKE $1")
            .bind(pattern)
            .fetch_all(self.pool())
            .await?;
        Ok(tasks)
    }

    async fn list_tasks(&self, filter: &TaskListFilter) -> Result<Vec<Task>, CoreError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM tasks WHERE 1 = 1");

        if let Some(owner_id) = filter.owner_id {
            qb.push(" AND owner_id = ");
            qb.push_bind(owner_id);
        }

        if let Some(status) = filter.status {
            qb.push(" AND status = ");
            qb.push_bind(status);
        }

        qb.push(" ORDER BY due_at IS NULL, due_at, created_at");

        let tasks = qb.build_query_as().fetch_all(self.pool()).await?;
        Ok(tasks)
    }

    async fn update_task(&self, id: Uuid, data: UpdateTaskData) -> Result<Task, CoreError> {
        if let Some(title) = &data.title {
            validate_title(title)?;
        }
        if let Some(Some(description)) = &data.description {
            validate_description(description)?;
        }

        let now = self.now();
        retry_once_on_conflict("update_task", || self.update_task_attempt(id, &data, now)).await
    }

    async fn find_task_tags(&self, id: Uuid) -> Result<Vec<String>, CoreError> {
        let tags = sqlx::query_scalar("SELECT tag_name FROM task_tags WHERE task_id = $1 ORDER BY tag_name")
            .bind(id)
            .fetch_all(self.pool())
            .await?;
        Ok(tags)
    }

    async fn delete_task(&self, id: Uuid) -> Result<(), CoreError> {
        // Subtasks, tags and the recurrence pattern go with it (ON DELETE CASCADE).
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("Task {}", id)));
        }
        Ok(())
    }
}

/// Turns a user-typed short ID (with or without dashes) into a LIKE pattern
/// over the hex form of the stored UUID. Anything but hex digits and dashes
/// can never match, so it yields `None`.
pub(crate) fn short_id_pattern(short_id: &str) -> Option<String> {
    let mut pattern = String::with_capacity(short_id.len() + 1);
    for c in short_id.chars().filter(|c| *c != '-') {
        if !c.is_ascii_hexdigit() {
            return None;
        }
        pattern.push(c.to_ascii_lowercase());
    }
    if pattern.is_empty() {
        return None;
    }
    pattern.push('%');
    Some(pattern)
}

impl SqliteRepository {
    async fn update_task_attempt(&self, id: Uuid, data: &UpdateTaskData, now: DateTime<Utc>) -> Result<Task, CoreError> {
        let mut tx = self.pool().begin().await?;

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE tasks SET version = version + 1, updated_at = ");
        qb.push_bind(now);

        if let Some(title) = &data.title {
            qb.push(", title = ");
            qb.push_bind(title.trim().to_string());
        }
        if let Some(description) = &data.description {
            qb.push(", description = ");
            qb.push_bind(description.clone());
        }
        if let Some(priority) = data.priority {
            qb.push(", priority = ");
            qb.push_bind(priority);
        }
        if let Some(due_at) = data.due_at {
            qb.push(", due_at = ");
            qb.push_bind(due_at);
        }

        qb.push(" WHERE id = ");
        qb.push_bind(id);
        qb.push(" RETURNING *");

        let task: Task = qb
            .build_query_as()
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Task {}", id)))?;

        // The due date is the recurrence reference, so the cached next date moves with it.
        if data.due_at.is_some() {
            if let Some(pattern) = Self::find_active_pattern_in_transaction(&mut tx, id).await? {
                let reference = reference_date(&task, now, self.config().timezone);
                let next = recurrence::next_occurrence(reference, &pattern.spec());
                Self::refresh_next_occurrence_in_transaction(&mut tx, pattern.id, next, now).await?;
                tracing::debug!(task_id = %id, %reference, next = ?next, "Next occurrence recomputed");
            }
        }

        tx.commit().await?;
        tracing::debug!(task_id = %id, "Task updated");
        Ok(task)
    }

    /// Add a task within an existing transaction
    pub(crate) async fn add_task_in_transaction<'a>(
        tx: &mut Transaction<'a, Sqlite>,
        data: NewTaskData,
        now: DateTime<Utc>,
    ) -> Result<Task, CoreError> {
        let title = validate_title(&data.title)?;
        if let Some(description) = &data.description {
            validate_description(description)?;
        }

        let task = Task {
            id: Uuid::new_v4(),
            owner_id: data.owner_id,
            title,
            description: data.description,
            status: TaskStatus::Pending,
            priority: data.priority.unwrap_or(TaskPriority::Medium),
            due_at: data.due_at,
            completed_at: None,
            created_at: now,
            updated_at: now,
            version: 0,
        };

        Self::insert_task_in_transaction(tx, &task).await?;

        if !data.tags.is_empty() {
            let mut query_builder: QueryBuilder<Sqlite> =
                QueryBuilder::new("INSERT OR IGNORE INTO task_tags (task_id, tag_name) ");
            query_builder.push_values(data.tags.iter(), |mut b, tag| {
                b.push_bind(task.id).push_bind(tag);
            });
            query_builder.build().execute(&mut **tx).await?;
        }

        Ok(task)
    }

    pub(crate) async fn insert_task_in_transaction<'a>(
        tx: &mut Transaction<'a, Sqlite>,
        task: &Task,
    ) -> Result<(), CoreError> {
        sqlx::query(
            r#"INSERT INTO tasks (id, owner_id, title, description, status, priority, due_at, completed_at, created_at, updated_at, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(task.id)
        .bind(task.owner_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.status)
        .bind(task.priority)
        .bind(task.due_at)
        .bind(task.completed_at)
        .bind(task.created_at)
        .bind(task.updated_at)
        .bind(task.version)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Find a task by ID within an existing transaction
    pub(crate) async fn find_task_by_id_in_transaction<'a>(
        tx: &mut Transaction<'a, Sqlite>,
        id: Uuid,
    ) -> Result<Option<Task>, CoreError> {
        let task = sqlx::query_as("SELECT * FROM tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?;
        Ok(task)
    }

    /// Takes the write lock on the task row before anything is decided about it.
    pub(crate) async fn touch_task_in_transaction<'a>(
        tx: &mut Transaction<'a, Sqlite>,
        id: Uuid,
    ) -> Result<Task, CoreError> {
        sqlx::query_as("UPDATE tasks SET version = version + 1 WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Task {}", id)))
    }
}
