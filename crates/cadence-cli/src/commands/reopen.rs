use anyhow::Result;
use cadence_core::repository::Repository;

use crate::cli::ReopenCommand;
use crate::util::resolve_task_id;

pub async fn reopen_task(repo: &impl Repository, command: ReopenCommand) -> Result<()> {
    let task_id = resolve_task_id(repo, &command.id).await?;
    let task = repo.reopen_task(task_id).await?;
    println!("Reopened task: '{}'", task.title);
    Ok(())
}
