use anyhow::{anyhow, Result};
use cadence_core::models::CoreConfig;
use cadence_core::repository::Repository;
use owo_colors::OwoColorize;

use crate::cli::{
    RecurrenceCommand, RecurrencePreviewCommand, RecurrenceSetCommand, RecurrenceShowCommand,
    RecurrenceStopCommand, RecurrenceSubcommand,
};
use crate::util::{build_pattern_spec, resolve_task_id};
use crate::views::table::{describe_pattern, display_occurrences};

pub async fn recurrence_command<R: Repository>(
    repository: &R,
    command: RecurrenceCommand,
    core: &CoreConfig,
) -> Result<()> {
    match command.command {
        RecurrenceSubcommand::Set(cmd) => set_command(repository, cmd, core).await,
        RecurrenceSubcommand::Show(cmd) => show_command(repository, cmd).await,
        RecurrenceSubcommand::Preview(cmd) => preview_command(repository, cmd).await,
        RecurrenceSubcommand::Stop(cmd) => stop_command(repository, cmd).await,
    }
}

async fn set_command<R: Repository>(repository: &R, command: RecurrenceSetCommand, core: &CoreConfig) -> Result<()> {
    let task_id = resolve_task_id(repository, &command.id).await?;
    let spec = build_pattern_spec(command.every, &command.schedule, core.timezone)?;

    let pattern = repository.set_recurrence(task_id, spec).await?;
    println!("{} Task now repeats {}", "↻".green().bold(), describe_pattern(&pattern));
    if !pattern.active {
        println!(
            "  {} No occurrence falls on or before the end date; no further tasks will be created.",
            "!".yellow()
        );
    }
    Ok(())
}

async fn show_command<R: Repository>(repository: &R, command: RecurrenceShowCommand) -> Result<()> {
    let task_id = resolve_task_id(repository, &command.id).await?;
    let pattern = repository
        .find_pattern_by_task(task_id)
        .await?
        .ok_or_else(|| anyhow!("Task has no recurrence pattern"))?;

    println!("{}", "Recurrence".blue().bold());
    println!("Pattern: {}", describe_pattern(&pattern).green());
    println!(
        "Active: {}",
        if pattern.active {
            "Yes".green().to_string()
        } else {
            "No".red().to_string()
        }
    );
    match pattern.next_occurrence {
        Some(next) => println!("Next occurrence: {}", next.format("%Y-%m-%d (%A)")),
        None => println!("Next occurrence: none"),
    }
    Ok(())
}

async fn preview_command<R: Repository>(repository: &R, command: RecurrencePreviewCommand) -> Result<()> {
    let task_id = resolve_task_id(repository, &command.id).await?;
    let dates = repository.preview_task_occurrences(task_id, command.count).await?;

    println!("{}", format!("Next {} Occurrences", command.count).blue().bold());
    display_occurrences(&dates);
    Ok(())
}

async fn stop_command<R: Repository>(repository: &R, command: RecurrenceStopCommand) -> Result<()> {
    let task_id = resolve_task_id(repository, &command.id).await?;
    repository.stop_recurrence(task_id).await?;
    println!("Recurrence stopped. The task itself is unchanged.");
    Ok(())
}
