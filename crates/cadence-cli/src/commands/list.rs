use anyhow::Result;
use cadence_core::aggregate::SubtaskProgress;
use cadence_core::models::{CoreConfig, TaskListFilter, TaskStatus};
use cadence_core::repository::Repository;
use uuid::Uuid;

use crate::cli::ListCommand;
use crate::views::table::{display_tasks, ViewTask};

pub async fn list_tasks(repo: &impl Repository, command: ListCommand, owner_id: Uuid, core: &CoreConfig) -> Result<()> {
    let status = match (command.status, command.all) {
        (Some(status), _) => Some(status),
        (None, true) => None,
        (None, false) => Some(TaskStatus::Pending),
    };

    let filter = TaskListFilter {
        owner_id: Some(owner_id),
        status,
    };
    let tasks = repo.list_tasks(&filter).await?;

    let mut view_tasks = Vec::with_capacity(tasks.len());
    for task in tasks {
        let subtasks = repo.find_subtasks(task.id).await?;
        let tags = repo.find_task_tags(task.id).await?;
        let recurring = repo
            .find_pattern_by_task(task.id)
            .await?
            .is_some_and(|p| p.active);

        view_tasks.push(ViewTask {
            id: task.id,
            title: task.title,
            status: task.status,
            priority: task.priority,
            due_at: task.due_at,
            tags,
            progress: SubtaskProgress::of(&subtasks),
            recurring,
        });
    }

    display_tasks(&view_tasks, core.timezone);

    Ok(())
}
