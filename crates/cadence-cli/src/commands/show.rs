use anyhow::{anyhow, Result};
use cadence_core::error::CoreError;
use cadence_core::models::CoreConfig;
use cadence_core::repository::Repository;

use crate::cli::ShowCommand;
use crate::util::resolve_task_id;
use crate::views::table::display_task_details;

pub async fn show_task(repo: &impl Repository, command: ShowCommand, core: &CoreConfig) -> Result<()> {
    let task_id = resolve_task_id(repo, &command.id).await?;
    let task = repo
        .find_task_by_id(task_id)
        .await?
        .ok_or_else(|| anyhow!(CoreError::NotFound(format!("Task {}", task_id))))?;

    let subtasks = repo.find_subtasks(task_id).await?;
    let tags = repo.find_task_tags(task_id).await?;
    let pattern = repo.find_pattern_by_task(task_id).await?;

    display_task_details(&task, &subtasks, &tags, pattern.as_ref(), core.timezone);
    Ok(())
}
