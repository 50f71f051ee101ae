//! # Cadence Core Library
//!
//! Recurring-task scheduling and completion cascades over SQLite.
//!
//! ## Features
//!
//! - **Occurrence Calculator**: pure daily/weekly/monthly date arithmetic with
//!   intervals, weekday sets, month-end clamping and end dates
//! - **Completion Orchestrator**: completing a recurring task hands its
//!   schedule to exactly one successor, atomically
//! - **Subtask Cascades**: checking off the last subtask completes the parent
//! - **Timezone Awareness**: recurrence follows calendar dates in a configured
//!   IANA zone, DST included
//!
//! ## Core Modules
//!
//! - [`db`]: Database connection and migration management
//! - [`models`]: Core data structures and transfer objects
//! - [`repository`]: Data access layer and completion orchestration
//! - [`recurrence`]: Occurrence calculation
//! - [`aggregate`]: Subtask completion rule
//! - [`clock`]: Injectable time source
//! - [`timezone`]: Timezone utilities and validation
//! - [`error`]: Error types
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use cadence_core::{
//!     db,
//!     models::{CoreConfig, Frequency, NewTaskData, PatternSpec},
//!     repository::{CompletionRepository, RecurrenceRepository, SqliteRepository, TaskRepository},
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), cadence_core::error::CoreError> {
//!     let pool = db::establish_connection("cadence.db").await?;
//!     let repo = SqliteRepository::new(pool, CoreConfig::default());
//!
//!     let task = repo
//!         .add_task(NewTaskData {
//!             title: "Water the plants".to_string(),
//!             ..Default::default()
//!         })
//!         .await?;
//!     repo.set_recurrence(task.id, PatternSpec::new(Frequency::Weekly).every(1)).await?;
//!
//!     let result = repo.complete_task(task.id).await?;
//!     if let Some(next) = result.successor {
//!         println!("Next one is due {:?}", next.due_at);
//!     }
//!     Ok(())
//! }
//! ```

pub mod aggregate;
pub mod clock;
pub mod db;
pub mod error;
pub mod models;
pub mod recurrence;
pub mod repository;
mod retry;
pub mod timezone;
