use anyhow::Result;
use cadence_core::models::{CoreConfig, NewTaskData};
use cadence_core::repository::Repository;
use owo_colors::{OwoColorize, Style};
use uuid::Uuid;

use crate::cli::AddCommand;
use crate::parser::parse_due_date;
use crate::util::build_pattern_spec;
use crate::views::table::describe_pattern;

pub async fn add_task(repo: &impl Repository, command: AddCommand, owner_id: Uuid, core: &CoreConfig) -> Result<()> {
    let due_at = command
        .due
        .as_deref()
        .map(|d| parse_due_date(d, core.timezone))
        .transpose()?;

    // Validate the schedule before anything is written.
    let spec = match command.every {
        Some(frequency) => {
            let spec = build_pattern_spec(frequency, &command.schedule, core.timezone)?;
            spec.validate()?;
            Some(spec)
        }
        None => None,
    };

    let new_task_data = NewTaskData {
        owner_id,
        title: command.title,
        description: command.description,
        priority: command.priority,
        due_at,
        tags: command.tag,
    };
    let added_task = repo.add_task(new_task_data).await?;

    let success_style = Style::new().green().bold();
    let info_style = Style::new().blue();

    println!(
        "{} Created task: {}",
        "✓".style(success_style),
        added_task.title.bright_white().bold()
    );
    println!("  {} Task ID: {}", "→".style(info_style), added_task.id.to_string().yellow());
    if let Some(due_at) = added_task.due_at {
        println!(
            "  {} Due: {}",
            "→".style(info_style),
            cadence_core::timezone::format_with_timezone(due_at, core.timezone, "%Y-%m-%d %H:%M")
                .cyan()
        );
    }

    if let Some(spec) = spec {
        let pattern = repo.set_recurrence(added_task.id, spec).await?;
        println!("  {} Repeats {}", "↻".style(info_style), describe_pattern(&pattern));
    }

    Ok(())
}
