use anyhow::Result;
use cadence_core::models::{CoreConfig, NewSubtaskData};
use cadence_core::repository::Repository;
use owo_colors::OwoColorize;

use crate::cli::{SubtaskCommand, SubtaskSubcommand};
use crate::commands::r#do::print_completion;
use crate::util::{resolve_subtask_id, resolve_task_id};

pub async fn subtask_command(repo: &impl Repository, command: SubtaskCommand, core: &CoreConfig) -> Result<()> {
    match command.command {
        SubtaskSubcommand::Add(add) => {
            let task_id = resolve_task_id(repo, &add.task_id).await?;
            let subtask = repo
                .add_subtask(NewSubtaskData {
                    task_id,
                    description: add.description,
                })
                .await?;
            println!(
                "Added subtask {}: {}",
                subtask.id.to_string().yellow(),
                subtask.description
            );
        }
        SubtaskSubcommand::Toggle(toggle) => {
            let subtask_id = resolve_subtask_id(repo, &toggle.id).await?;
            let result = repo.toggle_subtask(subtask_id).await?;
            let mark = if result.subtask.completed { "[x]" } else { "[ ]" };
            println!("{} {}", mark, result.subtask.description);
            if let Some(cascade) = &result.cascade {
                println!("All subtasks done.");
                print_completion(cascade, core.timezone);
            }
        }
        SubtaskSubcommand::Delete(delete) => {
            let subtask_id = resolve_subtask_id(repo, &delete.id).await?;
            repo.delete_subtask(subtask_id).await?;
            println!("Subtask deleted successfully.");
        }
    }
    Ok(())
}
