use cadence_core::models::{Frequency, TaskPriority, TaskStatus, WeekdaySet};
use clap::{Parser, Subcommand};

/// Cadence: a task manager for recurring work and checklists
#[derive(Parser, Debug)]
#[command(name = "cadence", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Add a new task
    Add(AddCommand),
    /// List tasks
    List(ListCommand),
    /// Show a task with its subtasks and schedule
    Show(ShowCommand),
    /// Change a task's title, description, priority or due date
    Edit(EditCommand),
    /// Mark a task as completed
    Do(DoCommand),
    /// Move a completed task back to pending
    Reopen(ReopenCommand),
    /// Delete a task
    Delete(DeleteCommand),
    /// Manage a task's subtasks
    Subtask(SubtaskCommand),
    /// Manage a task's recurrence
    Recur(RecurrenceCommand),
}

#[derive(Parser, Debug, Clone)]
pub struct AddCommand {
    /// The title of the task
    pub title: String,
    /// The description of the task
    #[clap(short, long)]
    pub description: Option<String>,
    /// The due date of the task (e.g. 'tomorrow 9am', '2025-08-20')
    #[clap(short = 'D', long)]
    pub due: Option<String>,
    /// Tags to add to the task
    #[clap(short, long, num_args = 1..)]
    pub tag: Vec<String>,
    /// The priority of the task (low, medium, high)
    #[clap(short, long)]
    pub priority: Option<TaskPriority>,
    /// Make the task recur (daily, weekly, monthly)
    #[clap(long)]
    pub every: Option<Frequency>,
    #[clap(flatten)]
    pub schedule: ScheduleArgs,
}

/// Pattern parameters shared by `add --every` and `recur set`.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ScheduleArgs {
    /// Repeat every N days/weeks/months
    #[clap(long, default_value_t = 1)]
    pub interval: u32,
    /// Days of week for weekly recurrence (mon,tue,wed,thu,fri,sat,sun)
    #[clap(long)]
    pub on: Option<WeekdaySet>,
    /// Day of month for monthly recurrence (1-31, clamped to month length)
    #[clap(long)]
    pub day: Option<u32>,
    /// Last date an occurrence may fall on (e.g. '2025-12-31')
    #[clap(long)]
    pub until: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct ListCommand {
    /// Only show tasks with this status (pending, completed)
    #[clap(short, long)]
    pub status: Option<TaskStatus>,
    /// Include completed tasks
    #[clap(short, long, conflicts_with = "status")]
    pub all: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct ShowCommand {
    /// The ID of the task to show
    pub id: String,
}

#[derive(Parser, Debug, Clone)]
pub struct EditCommand {
    /// The ID of the task to edit
    pub id: String,
    /// New title (at most 10 words)
    #[clap(long)]
    pub title: Option<String>,
    /// New description (at most 500 characters)
    #[clap(short, long)]
    pub description: Option<String>,
    /// Remove the description
    #[clap(long, conflicts_with = "description")]
    pub clear_description: bool,
    /// New due date (e.g. 'friday 5pm', '2025-08-20')
    #[clap(short = 'D', long)]
    pub due: Option<String>,
    /// Remove the due date
    #[clap(long, conflicts_with = "due")]
    pub clear_due: bool,
    /// New priority (low, medium, high)
    #[clap(short, long)]
    pub priority: Option<TaskPriority>,
}

#[derive(Parser, Debug, Clone)]
pub struct DoCommand {
    /// The ID of the task to mark as completed
    pub id: String,
}

#[derive(Parser, Debug, Clone)]
pub struct ReopenCommand {
    /// The ID of the task to reopen
    pub id: String,
}

#[derive(Parser, Debug, Clone)]
pub struct DeleteCommand {
    /// The ID of the task to delete
    pub id: String,
    /// Force deletion without confirmation
    #[clap(short, long)]
    pub force: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct SubtaskCommand {
    #[command(subcommand)]
    pub command: SubtaskSubcommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubtaskSubcommand {
    /// Add a subtask to a task
    Add(AddSubtaskCommand),
    /// Check or uncheck a subtask
    Toggle(ToggleSubtaskCommand),
    /// Delete a subtask
    Delete(DeleteSubtaskCommand),
}

#[derive(Parser, Debug, Clone)]
pub struct AddSubtaskCommand {
    /// The ID of the parent task
    pub task_id: String,
    /// What needs doing
    pub description: String,
}

#[derive(Parser, Debug, Clone)]
pub struct ToggleSubtaskCommand {
    /// The ID of the subtask
    pub id: String,
}

#[derive(Parser, Debug, Clone)]
pub struct DeleteSubtaskCommand {
    /// The ID of the subtask
    pub id: String,
}

/// Recurrence management commands
#[derive(Parser, Debug, Clone)]
pub struct RecurrenceCommand {
    #[command(subcommand)]
    pub command: RecurrenceSubcommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum RecurrenceSubcommand {
    /// Attach or replace a task's recurrence pattern
    Set(RecurrenceSetCommand),
    /// Show a task's recurrence pattern
    Show(RecurrenceShowCommand),
    /// Show the next N occurrences of a task's pattern
    Preview(RecurrencePreviewCommand),
    /// Stop a task from recurring
    Stop(RecurrenceStopCommand),
}

#[derive(Parser, Debug, Clone)]
pub struct RecurrenceSetCommand {
    /// The ID of the task
    pub id: String,
    /// How often the task recurs (daily, weekly, monthly)
    pub every: Frequency,
    #[clap(flatten)]
    pub schedule: ScheduleArgs,
}

#[derive(Parser, Debug, Clone)]
pub struct RecurrenceShowCommand {
    /// The ID of the task
    pub id: String,
}

#[derive(Parser, Debug, Clone)]
pub struct RecurrencePreviewCommand {
    /// The ID of the task
    pub id: String,
    /// Number of occurrences to show (at most 1000)
    #[clap(long, short, default_value = "5")]
    pub count: usize,
}

#[derive(Parser, Debug, Clone)]
pub struct RecurrenceStopCommand {
    /// The ID of the task
    pub id: String,
}
