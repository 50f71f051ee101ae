use anyhow::{bail, Result};
use cadence_core::models::{CoreConfig, UpdateTaskData};
use cadence_core::repository::Repository;
use cadence_core::timezone::format_with_timezone;
use owo_colors::OwoColorize;

use crate::cli::EditCommand;
use crate::parser::parse_due_date;
use crate::util::resolve_task_id;

pub async fn edit_task(repo: &impl Repository, command: EditCommand, core: &CoreConfig) -> Result<()> {
    let task_id = resolve_task_id(repo, &command.id).await?;

    let description = if command.clear_description {
        Some(None)
    } else {
        command.description.map(Some)
    };

    let due_at = if command.clear_due {
        Some(None)
    } else if let Some(due_str) = command.due {
        Some(Some(parse_due_date(&due_str, core.timezone)?))
    } else {
        None
    };

    let update_data = UpdateTaskData {
        title: command.title,
        description,
        priority: command.priority,
        due_at,
    };
    if update_data.is_empty() {
        bail!("Nothing to change. Pass --title, --description, --due or --priority.");
    }
    let due_changed = update_data.due_at.is_some();

    let updated_task = repo.update_task(task_id, update_data).await?;
    println!("{} Updated task: '{}'", "✓".green().bold(), updated_task.title);

    if due_changed {
        match updated_task.due_at {
            Some(due_at) => println!("  Due: {}", format_with_timezone(due_at, core.timezone, "%Y-%m-%d %H:%M").cyan()),
            None => println!("  Due date cleared"),
        }
        let pattern = repo.find_pattern_by_task(task_id).await?.filter(|p| p.active);
        if let Some(next) = pattern.and_then(|p| p.next_occurrence) {
            println!("  {} Next occurrence now {}", "↻".blue(), next);
        }
    }

    Ok(())
}
