use chrono::{DateTime, NaiveDate, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Completed,
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid task status: {0}")]
pub struct ParseTaskStatusError(String);

impl FromStr for TaskStatus {
    type Err = ParseTaskStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(TaskStatus::Pending),
            "completed" => Ok(TaskStatus::Completed),
            _ => Err(ParseTaskStatusError(s.to_string())),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Completed => write!(f, "completed"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid task priority: {0}")]
pub struct ParseTaskPriorityError(String);

impl FromStr for TaskPriority {
    type Err = ParseTaskPriorityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(TaskPriority::Low),
            "medium" => Ok(TaskPriority::Medium),
            "high" => Ok(TaskPriority::High),
            _ => Err(ParseTaskPriorityError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Task {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Bumped on every write to the row; used to detect lost updates.
    pub version: i64,
}

impl Task {
    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Subtask {
    pub id: Uuid,
    pub task_id: Uuid,
    pub description: String,
    pub completed: bool,
    pub position: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewTaskData {
    pub owner_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<TaskPriority>,
    pub due_at: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
}

/// Field changes for an existing task. `None` leaves a field alone;
/// `Some(None)` clears an optional one.
#[derive(Debug, Clone, Default)]
pub struct UpdateTaskData {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub priority: Option<TaskPriority>,
    pub due_at: Option<Option<DateTime<Utc>>>,
}

impl UpdateTaskData {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.priority.is_none() && self.due_at.is_none()
    }
}

pub const MAX_TITLE_WORDS: usize = 10;
pub const MAX_DESCRIPTION_CHARS: usize = 500;

/// Trims the title and checks it holds 1 to [`MAX_TITLE_WORDS`] words.
pub fn validate_title(title: &str) -> Result<String, CoreError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(CoreError::Validation("Task title cannot be empty".to_string()));
    }
    let words = title.split_whitespace().count();
    if words > MAX_TITLE_WORDS {
        return Err(CoreError::Validation(format!(
            "Task title too long ({} words, max {})",
            words, MAX_TITLE_WORDS
        )));
    }
    Ok(title.to_string())
}

pub fn validate_description(description: &str) -> Result<(), CoreError> {
    let chars = description.chars().count();
    if chars > MAX_DESCRIPTION_CHARS {
        return Err(CoreError::Validation(format!(
            "Description too long ({} characters, max {})",
            chars, MAX_DESCRIPTION_CHARS
        )));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct NewSubtaskData {
    pub task_id: Uuid,
    pub description: String,
}

/// Narrow listing filter. General search lives outside the core.
#[derive(Debug, Clone, Default)]
pub struct TaskListFilter {
    pub owner_id: Option<Uuid>,
    pub status: Option<TaskStatus>,
}

// ============================================================================
// Recurrence
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid frequency: {0}")]
pub struct ParseFrequencyError(String);

impl FromStr for Frequency {
    type Err = ParseFrequencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" | "day" => Ok(Frequency::Daily),
            "weekly" | "week" => Ok(Frequency::Weekly),
            "monthly" | "month" => Ok(Frequency::Monthly),
            _ => Err(ParseFrequencyError(s.to_string())),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frequency::Daily => write!(f, "daily"),
            Frequency::Weekly => write!(f, "weekly"),
            Frequency::Monthly => write!(f, "monthly"),
        }
    }
}

/// A set of weekdays, stored as `mon,wed,fri`.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, SerializeDisplay, DeserializeFromStr)]
pub struct WeekdaySet(u8);

impl WeekdaySet {
    pub const fn empty() -> Self {
        WeekdaySet(0)
    }

    pub fn insert(&mut self, day: Weekday) {
        self.0 |= 1 << day.num_days_from_monday();
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & (1 << day.num_days_from_monday()) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Members in Monday-first order.
    pub fn iter(&self) -> impl Iterator<Item = Weekday> + '_ {
        (0..7u8)
            .filter(move |bit| self.0 & (1 << bit) != 0)
            .map(weekday_from_index)
    }
}

fn weekday_from_index(index: u8) -> Weekday {
    match index {
        0 => Weekday::Mon,
        1 => Weekday::Tue,
        2 => Weekday::Wed,
        3 => Weekday::Thu,
        4 => Weekday::Fri,
        5 => Weekday::Sat,
        _ => Weekday::Sun,
    }
}

impl FromIterator<Weekday> for WeekdaySet {
    fn from_iter<I: IntoIterator<Item = Weekday>>(iter: I) -> Self {
        let mut set = WeekdaySet::empty();
        for day in iter {
            set.insert(day);
        }
        set
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid weekday: {0}")]
pub struct ParseWeekdayError(String);

impl FromStr for WeekdaySet {
    type Err = ParseWeekdayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                part.parse::<Weekday>()
                    .map_err(|_| ParseWeekdayError(part.to_string()))
            })
            .collect()
    }
}

impl TryFrom<String> for WeekdaySet {
    type Error = ParseWeekdayError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for WeekdaySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self
            .iter()
            .map(|day| day.to_string().to_lowercase())
            .collect();
        write!(f, "{}", names.join(","))
    }
}

impl fmt::Debug for WeekdaySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Unvalidated schedule parameters, as supplied by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternSpec {
    pub frequency: Frequency,
    pub interval: u32,
    #[serde(default)]
    pub weekdays: WeekdaySet,
    pub day_of_month: Option<u32>,
    pub end_date: Option<NaiveDate>,
}

impl PatternSpec {
    pub fn new(frequency: Frequency) -> Self {
        Self {
            frequency,
            interval: 1,
            weekdays: WeekdaySet::empty(),
            day_of_month: None,
            end_date: None,
        }
    }

    pub fn every(mut self, interval: u32) -> Self {
        self.interval = interval;
        self
    }

    pub fn on(mut self, weekdays: WeekdaySet) -> Self {
        self.weekdays = weekdays;
        self
    }

    pub fn on_day(mut self, day_of_month: u32) -> Self {
        self.day_of_month = Some(day_of_month);
        self
    }

    pub fn until(mut self, end_date: NaiveDate) -> Self {
        self.end_date = Some(end_date);
        self
    }

    /// Rejects malformed parameters before anything reaches the store.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.interval < 1 {
            return Err(CoreError::Validation(format!(
                "interval must be at least 1, got {}",
                self.interval
            )));
        }

        if let Some(day) = self.day_of_month {
            if !(1..=31).contains(&day) {
                return Err(CoreError::Validation(format!(
                    "day_of_month must be between 1 and 31, got {}",
                    day
                )));
            }
            if self.frequency != Frequency::Monthly {
                return Err(CoreError::Validation(format!(
                    "day_of_month only applies to monthly patterns, not {}",
                    self.frequency
                )));
            }
        }

        if !self.weekdays.is_empty() && self.frequency != Frequency::Weekly {
            return Err(CoreError::Validation(format!(
                "weekdays only apply to weekly patterns, not {}",
                self.frequency
            )));
        }

        Ok(())
    }
}

/// The persisted schedule attached to exactly one task.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct RecurrencePattern {
    pub id: Uuid,
    pub task_id: Uuid,
    pub frequency: Frequency,
    pub interval: u32,
    #[sqlx(try_from = "String")]
    pub weekdays: WeekdaySet,
    pub day_of_month: Option<u32>,
    pub end_date: Option<NaiveDate>,
    /// Cached result of the calculator for the current reference date.
    pub next_occurrence: Option<NaiveDate>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RecurrencePattern {
    pub fn spec(&self) -> PatternSpec {
        PatternSpec {
            frequency: self.frequency,
            interval: self.interval,
            weekdays: self.weekdays,
            day_of_month: self.day_of_month,
            end_date: self.end_date,
        }
    }
}

// ============================================================================
// Orchestrator results
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionOutcome {
    /// A plain task moved to `completed`.
    Completed,
    /// The task was already completed; nothing changed.
    AlreadyCompleted,
    /// The task completed and its schedule moved onto a new task.
    CompletedWithSuccessor,
    /// The task completed and its pattern produced no further occurrence.
    RecurrenceEnded,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionResult {
    pub task: Task,
    pub outcome: CompletionOutcome,
    pub successor: Option<Task>,
    /// The successor's pattern, or the deactivated original when recurrence ended.
    pub pattern: Option<RecurrencePattern>,
}

impl CompletionResult {
    pub(crate) fn unchanged(task: Task) -> Self {
        Self {
            task,
            outcome: CompletionOutcome::AlreadyCompleted,
            successor: None,
            pattern: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubtaskToggle {
    pub subtask: Subtask,
    pub parent: Task,
    /// Present when the toggle completed the parent.
    pub cascade: Option<CompletionResult>,
}

// ============================================================================
// Configuration
// ============================================================================

/// What a successor inherits from the task that spawned it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessorPolicy {
    /// Copy the subtask list, reset to incomplete.
    pub copy_subtasks: bool,
    pub copy_tags: bool,
}

impl Default for SuccessorPolicy {
    fn default() -> Self {
        Self {
            copy_subtasks: true,
            copy_tags: true,
        }
    }
}

/// Configuration for the core - separate from the CLI config so the
/// core never depends on how settings are loaded.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Zone whose calendar dates drive recurrence.
    pub timezone: Tz,
    pub successor: SuccessorPolicy,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            timezone: Tz::UTC,
            successor: SuccessorPolicy::default(),
        }
    }
}
