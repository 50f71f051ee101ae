use crate::clock::{Clock, SystemClock};
use crate::db::DbPool;
use crate::error::CoreError;
use crate::models::{
    CompletionResult, CoreConfig, NewSubtaskData, NewTaskData, PatternSpec, RecurrencePattern,
    Subtask, SubtaskToggle, Task, TaskListFilter, UpdateTaskData,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use uuid::Uuid;

// Domain modules
pub mod completion;
pub mod patterns;
pub mod subtasks;
pub mod tasks;

/// Domain-specific trait for task operations
#[async_trait]
pub trait TaskRepository {
    async fn add_task(&self, data: NewTaskData) -> Result<Task, CoreError>;
    async fn find_task_by_id(&self, id: Uuid) -> Result<Option<Task>, CoreError>;
    async fn find_tasks_by_short_id_prefix(&self, short_id: &str) -> Result<Vec<Task>, CoreError>;
    async fn list_tasks(&self, filter: &TaskListFilter) -> Result<Vec<Task>, CoreError>;
    /// Applies field changes. A new due date also refreshes the active
    /// pattern's `next_occurrence`, in the same transaction.
    async fn update_task(&self, id: Uuid, data: UpdateTaskData) -> Result<Task, CoreError>;
    async fn find_task_tags(&self, id: Uuid) -> Result<Vec<String>, CoreError>;
    async fn delete_task(&self, id: Uuid) -> Result<(), CoreError>;
}

/// Domain-specific trait for subtask operations
#[async_trait]
pub trait SubtaskRepository {
    async fn add_subtask(&self, data: NewSubtaskData) -> Result<Subtask, CoreError>;
    async fn find_subtask_by_id(&self, id: Uuid) -> Result<Option<Subtask>, CoreError>;
    async fn find_subtasks_by_short_id_prefix(&self, short_id: &str) -> Result<Vec<Subtask>, CoreError>;
    async fn find_subtasks(&self, task_id: Uuid) -> Result<Vec<Subtask>, CoreError>;
    async fn delete_subtask(&self, id: Uuid) -> Result<(), CoreError>;
}

/// Domain-specific trait for the recurrence pattern store
#[async_trait]
pub trait RecurrenceRepository {
    /// Validates `spec`, then creates or replaces the task's pattern.
    async fn set_recurrence(&self, task_id: Uuid, spec: PatternSpec) -> Result<RecurrencePattern, CoreError>;
    async fn find_pattern_by_task(&self, task_id: Uuid) -> Result<Option<RecurrencePattern>, CoreError>;
    /// Deactivates the pattern. Task status is left alone.
    async fn stop_recurrence(&self, task_id: Uuid) -> Result<RecurrencePattern, CoreError>;
    /// Next `count` occurrences of `spec`, starting from today.
    async fn preview_occurrences(&self, spec: &PatternSpec, count: usize) -> Result<Vec<NaiveDate>, CoreError>;
    /// Next `count` occurrences of the task's stored pattern.
    async fn preview_task_occurrences(&self, task_id: Uuid, count: usize) -> Result<Vec<NaiveDate>, CoreError>;
}

/// Completion state transitions and their cascades
#[async_trait]
pub trait CompletionRepository {
    /// Idempotent: completing an already-completed task changes nothing.
    async fn complete_task(&self, id: Uuid) -> Result<CompletionResult, CoreError>;
    /// Never retracts a successor that was already generated.
    async fn reopen_task(&self, id: Uuid) -> Result<Task, CoreError>;
    async fn toggle_subtask(&self, subtask_id: Uuid) -> Result<SubtaskToggle, CoreError>;
}

/// Main repository trait that composes all domain traits
#[async_trait]
pub trait Repository:
    TaskRepository + SubtaskRepository + RecurrenceRepository + CompletionRepository + Send + Sync
{
}

/// SQLite implementation of the repository pattern
pub struct SqliteRepository {
    pool: DbPool,
    config: CoreConfig,
    clock: Arc<dyn Clock>,
}

impl SqliteRepository {
    pub fn new(pool: DbPool, config: CoreConfig) -> Self {
        Self::with_clock(pool, config, Arc::new(SystemClock))
    }

    pub fn with_clock(pool: DbPool, config: CoreConfig, clock: Arc<dyn Clock>) -> Self {
        Self { pool, config, clock }
    }

    /// Get a reference to the database pool for internal use across modules
    pub(crate) fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Today's date in the configured timezone.
    pub(crate) fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        crate::timezone::local_date(now, self.config.timezone)
    }
}

impl Repository for SqliteRepository {}
