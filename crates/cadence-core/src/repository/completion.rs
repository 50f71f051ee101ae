//! Task completion orchestration.
//!
//! Every operation here runs in a single transaction whose first statement is
//! a write, so SQLite's write lock orders it against competing writers before
//! any decision is made. Completion is guarded on `status = 'pending'`; a
//! request that loses the race re-reads the row and reports
//! [`CompletionOutcome::AlreadyCompleted`] instead of generating anything.

use crate::aggregate::all_complete;
use crate::error::CoreError;
use crate::models::{
    CompletionOutcome, CompletionResult, CoreConfig, RecurrencePattern, Subtask, SubtaskToggle, Task,
    TaskStatus,
};
use crate::recurrence;
use crate::repository::{CompletionRepository, SqliteRepository};
use crate::retry::retry_once_on_conflict;
use crate::timezone;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Sqlite, Transaction};
use uuid::Uuid;

#[async_trait]
impl CompletionRepository for SqliteRepository {
    async fn complete_task(&self, id: Uuid) -> Result<CompletionResult, CoreError> {
        let now = self.now();
        retry_once_on_conflict("complete_task", || self.complete_task_attempt(id, now)).await
    }

    async fn reopen_task(&self, id: Uuid) -> Result<Task, CoreError> {
        let now = self.now();
        retry_once_on_conflict("reopen_task", || self.reopen_task_attempt(id, now)).await
    }

    async fn toggle_subtask(&self, subtask_id: Uuid) -> Result<SubtaskToggle, CoreError> {
        let now = self.now();
        retry_once_on_conflict("toggle_subtask", || self.toggle_subtask_attempt(subtask_id, now)).await
    }
}

impl SqliteRepository {
    async fn complete_task_attempt(&self, id: Uuid, now: DateTime<Utc>) -> Result<CompletionResult, CoreError> {
        let mut tx = self.pool().begin().await?;
        let result = Self::complete_in_transaction(&mut tx, id, now, self.config()).await?;
        tx.commit().await?;
        Ok(result)
    }

    async fn reopen_task_attempt(&self, id: Uuid, now: DateTime<Utc>) -> Result<Task, CoreError> {
        let mut tx = self.pool().begin().await?;

        let reopened: Option<Task> = sqlx::query_as(
            r#"UPDATE tasks
            SET status = $1, completed_at = NULL, updated_at = $2, version = version + 1
            WHERE id = $3 AND status = $4
            RETURNING *
            "#,
        )
        .bind(TaskStatus::Pending)
        .bind(now)
        .bind(id)
        .bind(TaskStatus::Completed)
        .fetch_optional(&mut *tx)
        .await?;

        let task = match reopened {
            Some(task) => {
                tracing::info!(task_id = %task.id, "Task reopened");
                task
            }
            None => Self::find_task_by_id_in_transaction(&mut tx, id)
                .await?
                .ok_or_else(|| CoreError::NotFound(format!("Task {}", id)))?,
        };

        tx.commit().await?;
        Ok(task)
    }

    async fn toggle_subtask_attempt(&self, subtask_id: Uuid, now: DateTime<Utc>) -> Result<SubtaskToggle, CoreError> {
        let mut tx = self.pool().begin().await?;

        let subtask: Subtask = sqlx::query_as(
            "UPDATE subtasks SET completed = NOT completed, updated_at = $1 WHERE id = $2 RETURNING *",
        )
        .bind(now)
        .bind(subtask_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("Subtask {}", subtask_id)))?;

        // Concurrent toggles on siblings queue up here, so exactly one of
        // them sees the final state of the checklist.
        let parent = Self::touch_task_in_transaction(&mut tx, subtask.task_id).await?;
        let siblings = Self::find_subtasks_in_transaction(&mut tx, parent.id).await?;

        // Only a completion can cascade. Unchecking never reopens the parent.
        let cascade = if subtask.completed && !parent.is_completed() && all_complete(&siblings) {
            tracing::debug!(
                task_id = %parent.id,
                subtasks = siblings.len(),
                "Last subtask completed; completing parent"
            );
            Some(Self::complete_in_transaction(&mut tx, parent.id, now, self.config()).await?)
        } else {
            None
        };

        tx.commit().await?;

        let parent = match &cascade {
            Some(result) => result.task.clone(),
            None => parent,
        };
        Ok(SubtaskToggle {
            subtask,
            parent,
            cascade,
        })
    }

    /// Moves a pending task to `completed` and, if it carries an active
    /// pattern, hands its schedule on. Must run inside the caller's
    /// transaction so the status change and the hand-off commit together.
    pub(crate) async fn complete_in_transaction<'a>(
        tx: &mut Transaction<'a, Sqlite>,
        id: Uuid,
        now: DateTime<Utc>,
        config: &CoreConfig,
    ) -> Result<CompletionResult, CoreError> {
        let completed: Option<Task> = sqlx::query_as(
            r#"UPDATE tasks
            SET status = $1, completed_at = $2, updated_at = $3, version = version + 1
            WHERE id = $4 AND status = $5
            RETURNING *
            "#,
        )
        .bind(TaskStatus::Completed)
        .bind(now)
        .bind(now)
        .bind(id)
        .bind(TaskStatus::Pending)
        .fetch_optional(&mut **tx)
        .await?;

        let Some(task) = completed else {
            return match Self::find_task_by_id_in_transaction(tx, id).await? {
                Some(task) => {
                    tracing::debug!(task_id = %id, "Task already completed; nothing to do");
                    Ok(CompletionResult::unchanged(task))
                }
                None => Err(CoreError::NotFound(format!("Task {}", id))),
            };
        };

        let Some(pattern) = Self::find_active_pattern_in_transaction(tx, task.id).await? else {
            tracing::info!(task_id = %task.id, "Task completed");
            return Ok(CompletionResult {
                task,
                outcome: CompletionOutcome::Completed,
                successor: None,
                pattern: None,
            });
        };

        Self::generate_successor_in_transaction(tx, task, pattern, now, config).await
    }

    async fn generate_successor_in_transaction<'a>(
        tx: &mut Transaction<'a, Sqlite>,
        task: Task,
        pattern: RecurrencePattern,
        now: DateTime<Utc>,
        config: &CoreConfig,
    ) -> Result<CompletionResult, CoreError> {
        let tz = config.timezone;
        let reference_instant = task.due_at.unwrap_or(now);
        let reference = timezone::local_date(reference_instant, tz);
        let next = recurrence::next_occurrence(reference, &pattern.spec());

        tracing::debug!(
            task_id = %task.id,
            pattern_id = %pattern.id,
            %reference,
            next = ?next,
            "Computed next occurrence"
        );

        let Some(next) = next else {
            let retired = Self::deactivate_pattern_in_transaction(tx, pattern.id, None, now).await?;
            tracing::info!(
                task_id = %task.id,
                pattern_id = %retired.id,
                end_date = ?retired.end_date,
                "Recurrence ended; no successor created"
            );
            return Ok(CompletionResult {
                task,
                outcome: CompletionOutcome::RecurrenceEnded,
                successor: None,
                pattern: Some(retired),
            });
        };

        // Guarded on `active = 1`: if this matches nothing, the schedule was
        // already handed on and the whole attempt rolls back.
        Self::deactivate_pattern_in_transaction(tx, pattern.id, Some(next), now).await?;

        let time_of_day = timezone::local_time(reference_instant, tz);
        let successor = Task {
            id: Uuid::new_v4(),
            owner_id: task.owner_id,
            title: task.title.clone(),
            description: task.description.clone(),
            status: TaskStatus::Pending,
            priority: task.priority,
            due_at: Some(timezone::at_local_time(next, time_of_day, tz)),
            completed_at: None,
            created_at: now,
            updated_at: now,
            version: 0,
        };
        Self::insert_task_in_transaction(tx, &successor).await?;

        if config.successor.copy_tags {
            sqlx::query("INSERT INTO task_tags (task_id, tag_name) SELECT $1, tag_name FROM task_tags WHERE task_id = $2")
                .bind(successor.id)
                .bind(task.id)
                .execute(&mut **tx)
                .await?;
        }

        let copied_subtasks = if config.successor.copy_subtasks {
            Self::copy_subtasks_in_transaction(tx, task.id, successor.id, now).await?
        } else {
            0
        };

        let successor_pattern =
            Self::insert_successor_pattern_in_transaction(tx, &pattern, successor.id, next, now).await?;

        tracing::info!(
            task_id = %task.id,
            successor_id = %successor.id,
            due = %next,
            copied_subtasks,
            "Task completed; successor created"
        );

        Ok(CompletionResult {
            task,
            outcome: CompletionOutcome::CompletedWithSuccessor,
            successor: Some(successor),
            pattern: Some(successor_pattern),
        })
    }
}
