use anyhow::{anyhow, Result};
use cadence_core::error::CoreError;
use cadence_core::models::{Frequency, PatternSpec};
use cadence_core::repository::Repository;
use chrono_tz::Tz;
use uuid::Uuid;

use crate::cli::ScheduleArgs;
use crate::parser::parse_calendar_date;

const MIN_SHORT_ID_LEN: usize = 2;

fn check_short_id(short_id: &str) -> Result<()> {
    if short_id.len() < MIN_SHORT_ID_LEN {
        return Err(anyhow!(CoreError::Validation(
            "Short ID must be at least 2 characters long.".to_string()
        )));
    }
    Ok(())
}

pub async fn resolve_task_id(repo: &impl Repository, short_id: &str) -> Result<Uuid> {
    if let Ok(id) = short_id.parse::<Uuid>() {
        return Ok(id);
    }
    check_short_id(short_id)?;

    let tasks = repo.find_tasks_by_short_id_prefix(short_id).await?;
    match tasks.len() {
        1 => Ok(tasks[0].id),
        0 => Err(anyhow!(CoreError::NotFound(format!(
            "No task found with ID prefix '{}'",
            short_id
        )))),
        _ => {
            let task_info: Vec<(String, String)> = tasks
                .into_iter()
                .map(|t| (t.id.to_string(), t.title))
                .collect();
            Err(anyhow!(CoreError::AmbiguousId(task_info)))
        }
    }
}

pub async fn resolve_subtask_id(repo: &impl Repository, short_id: &str) -> Result<Uuid> {
    if let Ok(id) = short_id.parse::<Uuid>() {
        return Ok(id);
    }
    check_short_id(short_id)?;

    let subtasks = repo.find_subtasks_by_short_id_prefix(short_id).await?;
    match subtasks.len() {
        1 => Ok(subtasks[0].id),
        0 => Err(anyhow!(CoreError::NotFound(format!(
            "No subtask found with ID prefix '{}'",
            short_id
        )))),
        _ => {
            let subtask_info: Vec<(String, String)> = subtasks
                .into_iter()
                .map(|s| (s.id.to_string(), s.description))
                .collect();
            Err(anyhow!(CoreError::AmbiguousId(subtask_info)))
        }
    }
}

/// First characters of an ID, as shown in tables.
pub fn short_id(id: &Uuid) -> String {
    id.simple().to_string()[..8].to_string()
}

pub fn build_pattern_spec(frequency: Frequency, args: &ScheduleArgs, tz: Tz) -> Result<PatternSpec> {
    let mut spec = PatternSpec::new(frequency).every(args.interval);
    if let Some(days) = args.on {
        spec = spec.on(days);
    }
    if let Some(day) = args.day {
        spec = spec.on_day(day);
    }
    if let Some(until) = &args.until {
        spec = spec.until(parse_calendar_date(until, tz)?);
    }
    Ok(spec)
}
