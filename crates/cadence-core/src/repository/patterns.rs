use crate::error::CoreError;
use crate::models::{PatternSpec, RecurrencePattern, Task};
use crate::recurrence;
use crate::repository::{RecurrenceRepository, SqliteRepository, TaskRepository};
use crate::retry::retry_once_on_conflict;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use sqlx::{Sqlite, Transaction};
use uuid::Uuid;

#[async_trait]
impl RecurrenceRepository for SqliteRepository {
    async fn set_recurrence(&self, task_id: Uuid, spec: PatternSpec) -> Result<RecurrencePattern, CoreError> {
        // Nothing reaches the store unless the pattern is well-formed.
        spec.validate()?;

        let now = self.now();
        retry_once_on_conflict("set_recurrence", || self.set_recurrence_attempt(task_id, &spec, now)).await
    }

    async fn find_pattern_by_task(&self, task_id: Uuid) -> Result<Option<RecurrencePattern>, CoreError> {
        let pattern = sqlx::query_as("SELECT * FROM recurrence_patterns WHERE task_id = $1")
            .bind(task_id)
            .fetch_optional(self.pool())
            .await?;
        Ok(pattern)
    }

    async fn stop_recurrence(&self, task_id: Uuid) -> Result<RecurrencePattern, CoreError> {
        let now = self.now();
        let pattern: RecurrencePattern = sqlx::query_as(
            "UPDATE recurrence_patterns SET active = 0, updated_at = $1 WHERE task_id = $2 RETURNING *",
        )
        .bind(now)
        .bind(task_id)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("Recurrence pattern for task {}", task_id)))?;

        tracing::info!(%task_id, pattern_id = %pattern.id, "Recurrence stopped");
        Ok(pattern)
    }

    async fn preview_occurrences(&self, spec: &PatternSpec, count: usize) -> Result<Vec<NaiveDate>, CoreError> {
        let today = self.today(self.now());
        recurrence::preview_occurrences(spec, today, count)
    }

    async fn preview_task_occurrences(&self, task_id: Uuid, count: usize) -> Result<Vec<NaiveDate>, CoreError> {
        let now = self.now();
        let task = self
            .find_task_by_id(task_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Task {}", task_id)))?;
        let pattern = self
            .find_pattern_by_task(task_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Recurrence pattern for task {}", task_id)))?;

        let from = reference_date(&task, now, self.config().timezone);
        recurrence::preview_occurrences(&pattern.spec(), from, count)
    }
}

/// The date recurrence advances from: the task's due date, or `fallback`
/// when it has none, both read as calendar dates in `tz`.
pub(crate) fn reference_date(task: &Task, fallback: DateTime<Utc>, tz: Tz) -> NaiveDate {
    crate::timezone::local_date(task.due_at.unwrap_or(fallback), tz)
}

impl SqliteRepository {
    async fn set_recurrence_attempt(
        &self,
        task_id: Uuid,
        spec: &PatternSpec,
        now: DateTime<Utc>,
    ) -> Result<RecurrencePattern, CoreError> {
        let mut tx = self.pool().begin().await?;

        let task = Self::touch_task_in_transaction(&mut tx, task_id).await?;
        // Completion never runs again on a completed task, so its pattern would be stranded.
        if task.is_completed() {
            return Err(CoreError::Validation(
                "cannot set recurrence on a completed task; reopen it first".to_string(),
            ));
        }
        let reference = reference_date(&task, now, self.config().timezone);
        let next = recurrence::next_occurrence(reference, spec);

        let pattern = Self::upsert_pattern_in_transaction(&mut tx, task_id, spec, next, now).await?;
        tx.commit().await?;

        tracing::debug!(
            %task_id,
            frequency = %spec.frequency,
            interval = spec.interval,
            %reference,
            next = ?next,
            "Recurrence set"
        );
        Ok(pattern)
    }

    /// One pattern per task: a second call replaces the schedule and re-activates it.
    async fn upsert_pattern_in_transaction<'a>(
        tx: &mut Transaction<'a, Sqlite>,
        task_id: Uuid,
        spec: &PatternSpec,
        next: Option<NaiveDate>,
        now: DateTime<Utc>,
    ) -> Result<RecurrencePattern, CoreError> {
        let pattern = sqlx::query_as(
            r#"INSERT INTO recurrence_patterns
                (id, task_id, frequency, interval, weekdays, day_of_month, end_date, next_occurrence, active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (task_id) DO UPDATE SET
                frequency = excluded.frequency,
                interval = excluded.interval,
                weekdays = excluded.weekdays,
                day_of_month = excluded.day_of_month,
                end_date = excluded.end_date,
                next_occurrence = excluded.next_occurrence,
                active = excluded.active,
                updated_at = excluded.updated_at
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(task_id)
        .bind(spec.frequency)
        .bind(spec.interval)
        .bind(spec.weekdays.to_string())
        .bind(spec.day_of_month)
        .bind(spec.end_date)
        .bind(next)
        .bind(next.is_some())
        .bind(now)
        .bind(now)
        .fetch_one(&mut **tx)
        .await?;
        Ok(pattern)
    }

    pub(crate) async fn find_active_pattern_in_transaction<'a>(
        tx: &mut Transaction<'a, Sqlite>,
        task_id: Uuid,
    ) -> Result<Option<RecurrencePattern>, CoreError> {
        let pattern = sqlx::query_as("SELECT * FROM recurrence_patterns WHERE task_id = $1 AND active = 1")
            .bind(task_id)
            .fetch_optional(&mut **tx)
            .await?;
        Ok(pattern)
    }

    pub(crate) async fn refresh_next_occurrence_in_transaction<'a>(
        tx: &mut Transaction<'a, Sqlite>,
        pattern_id: Uuid,
        next: Option<NaiveDate>,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        sqlx::query("UPDATE recurrence_patterns SET next_occurrence = $1, updated_at = $2 WHERE id = $3")
            .bind(next)
            .bind(now)
            .bind(pattern_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Retires an active pattern. Matching no row means a concurrent
    /// writer already retired it.
    pub(crate) async fn deactivate_pattern_in_transaction<'a>(
        tx: &mut Transaction<'a, Sqlite>,
        pattern_id: Uuid,
        next: Option<NaiveDate>,
        now: DateTime<Utc>,
    ) -> Result<RecurrencePattern, CoreError> {
        sqlx::query_as(
            r#"UPDATE recurrence_patterns
            SET active = 0, next_occurrence = $1, updated_at = $2
            WHERE id = $3 AND active = 1
            RETURNING *
            "#,
        )
        .bind(next)
        .bind(now)
        .bind(pattern_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| CoreError::Conflict(format!("Recurrence pattern {} is no longer active", pattern_id)))
    }

    /// Gives `successor_id` its own copy of `original`'s schedule.
    pub(crate) async fn insert_successor_pattern_in_transaction<'a>(
        tx: &mut Transaction<'a, Sqlite>,
        original: &RecurrencePattern,
        successor_id: Uuid,
        next: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<RecurrencePattern, CoreError> {
        let pattern = sqlx::query_as(
            r#"INSERT INTO recurrence_patterns
                (id, task_id, frequency, interval, weekdays, day_of_month, end_date, next_occurrence, active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 1, $9, $10)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(successor_id)
        .bind(original.frequency)
        .bind(original.interval)
        .bind(original.weekdays.to_string())
        .bind(original.day_of_month)
        .bind(original.end_date)
        .bind(next)
        .bind(now)
        .bind(now)
        .fetch_one(&mut **tx)
        .await?;
        Ok(pattern)
    }
}
