use anyhow::Result;
use cadence_core::models::{CompletionOutcome, CompletionResult, CoreConfig};
use cadence_core::repository::Repository;
use cadence_core::timezone::format_with_timezone;
use chrono_tz::Tz;
use owo_colors::{OwoColorize, Style};

use crate::cli::DoCommand;
use crate::util::{resolve_task_id, short_id};

pub async fn do_task(repo: &impl Repository, command: DoCommand, core: &CoreConfig) -> Result<()> {
    let task_id = resolve_task_id(repo, &command.id).await?;
    let result = repo.complete_task(task_id).await?;
    print_completion(&result, core.timezone);
    Ok(())
}

pub fn print_completion(result: &CompletionResult, tz: Tz) {
    let success_style = Style::new().green().bold();
    let subtle_style = Style::new().bright_black();

    match result.outcome {
        CompletionOutcome::AlreadyCompleted => {
            println!("Task '{}' was already completed.", result.task.title);
        }
        CompletionOutcome::Completed => {
            println!("{} Completed task: '{}'", "✓".style(success_style), result.task.title);
        }
        CompletionOutcome::RecurrenceEnded => {
            println!("{} Completed task: '{}'", "✓".style(success_style), result.task.title);
            println!("  {} Recurrence has ended; no further occurrences.", "→".style(subtle_style));
        }
        CompletionOutcome::CompletedWithSuccessor => {
            println!("{} Completed task: '{}'", "✓".style(success_style), result.task.title);
            if let Some(next) = &result.successor {
                let due = next
                    .due_at
                    .map(|due_at| format_with_timezone(due_at, tz, "%Y-%m-%d %H:%M"))
                    .unwrap_or_else(|| "no due date".to_string());
                println!(
                    "  {} Next occurrence {} due {}",
                    "↻".style(success_style),
                    short_id(&next.id).yellow(),
                    due.cyan()
                );
            }
        }
    }
}
