use cadence_core::aggregate::SubtaskProgress;
use cadence_core::models::{RecurrencePattern, Subtask, Task, TaskPriority, TaskStatus};
use cadence_core::timezone::local_date;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_humanize::Humanize;
use chrono_tz::Tz;
use comfy_table::{Attribute, Cell, Color, Row, Table};
use uuid::Uuid;

use crate::util::short_id;

#[derive(Debug, Clone)]
pub struct ViewTask {
    pub id: Uuid,
    pub title: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_at: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub progress: SubtaskProgress,
    pub recurring: bool,
}

pub fn display_tasks(tasks: &[ViewTask], tz: Tz) {
    if tasks.is_empty() {
        println!("No tasks found.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Title", "Status", "Due Date", "Subtasks", "Tags"]);

    for task in tasks {
        let mut row = Row::new();
        row.add_cell(Cell::new(short_id(&task.id)));

        let mut display_name = String::new();
        if task.recurring {
            display_name.push('↻');
            display_name.push(' ');
        }
        display_name.push_str(&task.title);

        let name_cell = match task.status {
            TaskStatus::Completed => Cell::new(display_name)
                .add_attribute(Attribute::CrossedOut)
                .fg(Color::DarkGrey),
            TaskStatus::Pending => match task.priority {
                TaskPriority::High => Cell::new(display_name).fg(Color::Red).add_attribute(Attribute::Bold),
                TaskPriority::Medium => Cell::new(display_name),
                TaskPriority::Low => Cell::new(display_name).fg(Color::Green),
            },
        };
        row.add_cell(name_cell);

        let status_cell = match task.status {
            TaskStatus::Completed => Cell::new(task.status).fg(Color::Green),
            TaskStatus::Pending => Cell::new(task.status),
        };
        row.add_cell(status_cell);

        row.add_cell(due_cell(task.due_at, task.status, tz));

        row.add_cell(Cell::new(if task.progress.total == 0 {
            "-".to_string()
        } else {
            task.progress.to_string()
        }));

        row.add_cell(Cell::new(if task.tags.is_empty() {
            "None".to_string()
        } else {
            task.tags.join(", ")
        }));
        table.add_row(row);
    }

    println!("{table}");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Urgency {
    Overdue,
    Today,
    Later,
}

/// Overdue by instant, "today" by calendar date in `tz`.
fn urgency(due_at: DateTime<Utc>, now: DateTime<Utc>, tz: Tz) -> Urgency {
    if due_at < now {
        Urgency::Overdue
    } else if local_date(due_at, tz) == local_date(now, tz) {
        Urgency::Today
    } else {
        Urgency::Later
    }
}

fn due_cell(due_at: Option<DateTime<Utc>>, status: TaskStatus, tz: Tz) -> Cell {
    let Some(due_at) = due_at else {
        return Cell::new("None");
    };

    let due_text = due_at.humanize();
    if status != TaskStatus::Pending {
        return Cell::new(due_text);
    }
    match urgency(due_at, Utc::now(), tz) {
        Urgency::Overdue => Cell::new(due_text).fg(Color::Red),
        Urgency::Today => Cell::new(due_text).fg(Color::Yellow),
        Urgency::Later => Cell::new(due_text),
    }
}

pub fn display_task_details(task: &Task, subtasks: &[Subtask], tags: &[String], pattern: Option<&RecurrencePattern>, tz: Tz) {
    let mut table = Table::new();
    table.add_row(vec![Cell::new("ID").add_attribute(Attribute::Bold), Cell::new(task.id)]);
    table.add_row(vec![Cell::new("Title").add_attribute(Attribute::Bold), Cell::new(&task.title)]);
    if let Some(description) = &task.description {
        table.add_row(vec![Cell::new("Description").add_attribute(Attribute::Bold), Cell::new(description)]);
    }
    table.add_row(vec![Cell::new("Status").add_attribute(Attribute::Bold), Cell::new(task.status)]);
    table.add_row(vec![
        Cell::new("Priority").add_attribute(Attribute::Bold),
        Cell::new(format!("{:?}", task.priority)),
    ]);
    table.add_row(vec![
        Cell::new("Due").add_attribute(Attribute::Bold),
        Cell::new(format_instant(task.due_at, tz)),
    ]);
    if task.completed_at.is_some() {
        table.add_row(vec![
            Cell::new("Completed").add_attribute(Attribute::Bold),
            Cell::new(format_instant(task.completed_at, tz)),
        ]);
    }
    if !tags.is_empty() {
        table.add_row(vec![Cell::new("Tags").add_attribute(Attribute::Bold), Cell::new(tags.join(", "))]);
    }
    if let Some(pattern) = pattern {
        table.add_row(vec![
            Cell::new("Recurrence").add_attribute(Attribute::Bold),
            Cell::new(describe_pattern(pattern)),
        ]);
    }
    println!("{table}");

    if subtasks.is_empty() {
        return;
    }

    let mut checklist = Table::new();
    checklist.set_header(vec![
        "ID".to_string(),
        format!("Subtasks ({})", SubtaskProgress::of(subtasks)),
    ]);
    for subtask in subtasks {
        let mark = if subtask.completed { "[x]" } else { "[ ]" };
        let mut cell = Cell::new(format!("{} {}", mark, subtask.description));
        if subtask.completed {
            cell = cell.fg(Color::DarkGrey);
        }
        checklist.add_row(vec![Cell::new(short_id(&subtask.id)), cell]);
    }
    println!("{checklist}");
}

pub fn display_occurrences(dates: &[NaiveDate]) {
    if dates.is_empty() {
        println!("No upcoming occurrences.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["#", "Date", "Weekday"]);
    for (index, date) in dates.iter().enumerate() {
        table.add_row(vec![
            Cell::new(index + 1),
            Cell::new(date.format("%Y-%m-%d")),
            Cell::new(date.format("%A")),
        ]);
    }
    println!("{table}");
}

/// "every 2 weeks on mon,wed until 2025-12-31 (next 2025-06-04)"
pub fn describe_pattern(pattern: &RecurrencePattern) -> String {
    let unit = match pattern.frequency {
        cadence_core::models::Frequency::Daily => "day",
        cadence_core::models::Frequency::Weekly => "week",
        cadence_core::models::Frequency::Monthly => "month",
    };

    let mut text = if pattern.interval == 1 {
        format!("every {}", unit)
    } else {
        format!("every {} {}s", pattern.interval, unit)
    };
    if !pattern.weekdays.is_empty() {
        text.push_str(&format!(" on {}", pattern.weekdays));
    }
    if let Some(day) = pattern.day_of_month {
        text.push_str(&format!(" on day {}", day));
    }
    if let Some(end) = pattern.end_date {
        text.push_str(&format!(" until {}", end));
    }
    if !pattern.active {
        text.push_str(" (stopped)");
    } else if let Some(next) = pattern.next_occurrence {
        text.push_str(&format!(" (next {})", next));
    }
    text
}

fn format_instant(instant: Option<DateTime<Utc>>, tz: Tz) -> String {
    match instant {
        Some(instant) => cadence_core::timezone::format_with_timezone(instant, tz, "%Y-%m-%d %H:%M %Z"),
        None => "None".to_string(),
    }
}
