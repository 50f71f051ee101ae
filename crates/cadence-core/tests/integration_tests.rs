use cadence_core::clock::FixedClock;
use cadence_core::db::{establish_connection, establish_connection_with_timeout};
use cadence_core::error::CoreError;
use cadence_core::models::*;
use cadence_core::repository::{
    CompletionRepository, RecurrenceRepository, SqliteRepository, SubtaskRepository, TaskRepository,
};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Helper function to create a test database with the clock pinned to `now`
async fn setup_test_db_with(config: CoreConfig, now: DateTime<Utc>) -> (SqliteRepository, TempDir) {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let db_path = temp_dir.path().join("test.db");

    let pool = establish_connection(&db_path.to_string_lossy())
        .await
        .expect("Failed to establish test database connection");

    let repository = SqliteRepository::with_clock(pool, config, Arc::new(FixedClock(now)));
    (repository, temp_dir)
}

async fn setup_test_db() -> (SqliteRepository, TempDir) {
    setup_test_db_with(CoreConfig::default(), utc(2025, 1, 10, 12, 0)).await
}

/// Helper function to create a test task
async fn create_test_task(repo: &SqliteRepository, title: &str, due_at: Option<DateTime<Utc>>) -> Task {
    repo.add_task(NewTaskData {
        title: title.to_string(),
        description: Some(format!("Test task: {}", title)),
        due_at,
        tags: vec!["home".to_string()],
        ..Default::default()
    })
    .await
    .expect("Failed to create test task")
}

async fn add_subtasks(repo: &SqliteRepository, task_id: Uuid, descriptions: &[&str]) -> Vec<Subtask> {
    let mut subtasks = Vec::new();
    for description in descriptions {
        let subtask = repo
            .add_subtask(NewSubtaskData {
                task_id,
                description: description.to_string(),
            })
            .await
            .expect("Failed to create subtask");
        subtasks.push(subtask);
    }
    subtasks
}

async fn all_tasks(repo: &SqliteRepository) -> Vec<Task> {
    repo.list_tasks(&TaskListFilter::default()).await.unwrap()
}

#[tokio::test]
async fn test_basic_task_crud_workflow() {
    let (repo, _temp_dir) = setup_test_db().await;

    let task = create_test_task(&repo, "Write report", None).await;
    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.priority, TaskPriority::Medium);
    assert_eq!(task.created_at, utc(2025, 1, 10, 12, 0));

    let found = repo.find_task_by_id(task.id).await.unwrap().unwrap();
    assert_eq!(found, task);
    assert_eq!(repo.find_task_tags(task.id).await.unwrap(), vec!["home".to_string()]);

    let short = &task.id.simple().to_string()[..8];
    let matches = repo.find_tasks_by_short_id_prefix(short).await.unwrap();
    assert!(matches.iter().any(|t| t.id == task.id));
    // LIKE wildcards in user input match nothing.
    assert!(repo.find_tasks_by_short_id_prefix("__").await.unwrap().is_empty());
    assert!(repo.find_tasks_by_short_id_prefix("%").await.unwrap().is_empty());

    add_subtasks(&repo, task.id, &["outline"]).await;
    assert!(repo.find_subtasks_by_short_id_prefix("__").await.unwrap().is_empty());
    repo.set_recurrence(task.id, PatternSpec::new(Frequency::Daily)).await.unwrap();

    repo.delete_task(task.id).await.unwrap();
    assert!(repo.find_task_by_id(task.id).await.unwrap().is_none());
    assert!(repo.find_subtasks(task.id).await.unwrap().is_empty());
    assert!(repo.find_pattern_by_task(task.id).await.unwrap().is_none());

    assert!(matches!(repo.delete_task(task.id).await, Err(CoreError::NotFound(_))));
}

#[tokio::test]
async fn test_empty_title_is_rejected() {
    let (repo, _temp_dir) = setup_test_db().await;

    let result = repo
        .add_task(NewTaskData {
            title: "   ".to_string(),
            ..Default::default()
        })
        .await;
    assert!(matches!(result, Err(CoreError::Validation(_))));
    assert!(all_tasks(&repo).await.is_empty());
}

#[tokio::test]
async fn test_list_orders_by_due_date_and_filters_status() {
    let (repo, _temp_dir) = setup_test_db().await;

    let undated = create_test_task(&repo, "Someday", None).await;
    let later = create_test_task(&repo, "Later", Some(utc(2025, 2, 1, 9, 0))).await;
    let sooner = create_test_task(&repo, "Sooner", Some(utc(2025, 1, 15, 9, 0))).await;

    let ids: Vec<Uuid> = all_tasks(&repo).await.into_iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![sooner.id, later.id, undated.id]);

    repo.complete_task(later.id).await.unwrap();
    let pending = repo
        .list_tasks(&TaskListFilter {
            status: Some(TaskStatus::Pending),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(pending.len(), 2);
    assert!(pending.iter().all(|t| t.status == TaskStatus::Pending));
}

#[tokio::test]
async fn test_completing_plain_task() {
    let (repo, _temp_dir) = setup_test_db().await;
    let task = create_test_task(&repo, "Plain", None).await;

    let result = repo.complete_task(task.id).await.unwrap();
    assert_eq!(result.outcome, CompletionOutcome::Completed);
    assert_eq!(result.task.status, TaskStatus::Completed);
    assert_eq!(result.task.completed_at, Some(utc(2025, 1, 10, 12, 0)));
    assert!(result.successor.is_none());
    assert_eq!(all_tasks(&repo).await.len(), 1);
}

#[tokio::test]
async fn test_completing_recurring_task_creates_exactly_one_successor() {
    let (repo, _temp_dir) = setup_test_db().await;
    let task = create_test_task(&repo, "Stand-up", Some(utc(2025, 1, 6, 9, 0))).await;
    add_subtasks(&repo, task.id, &["notes", "agenda"]).await;

    let pattern = repo
        .set_recurrence(task.id, PatternSpec::new(Frequency::Daily))
        .await
        .unwrap();
    assert!(pattern.active);
    assert_eq!(pattern.next_occurrence, Some(date(2025, 1, 7)));

    let result = repo.complete_task(task.id).await.unwrap();
    assert_eq!(result.outcome, CompletionOutcome::CompletedWithSuccessor);

    let successor = result.successor.expect("successor");
    assert_ne!(successor.id, task.id);
    assert_eq!(successor.title, "Stand-up");
    assert_eq!(successor.description, task.description);
    assert_eq!(successor.status, TaskStatus::Pending);
    assert_eq!(successor.due_at, Some(utc(2025, 1, 7, 9, 0)));

    let successor_pattern = result.pattern.expect("successor pattern");
    assert_eq!(successor_pattern.task_id, successor.id);
    assert!(successor_pattern.active);
    assert_eq!(successor_pattern.next_occurrence, Some(date(2025, 1, 7)));
    assert_eq!(successor_pattern.frequency, Frequency::Daily);

    let original_pattern = repo.find_pattern_by_task(task.id).await.unwrap().unwrap();
    assert!(!original_pattern.active);

    // Copied checklist starts over.
    let copied = repo.find_subtasks(successor.id).await.unwrap();
    assert_eq!(copied.len(), 2);
    assert!(copied.iter().all(|s| !s.completed));
    assert_eq!(repo.find_task_tags(successor.id).await.unwrap(), vec!["home".to_string()]);

    // A retried completion is a no-op.
    let again = repo.complete_task(task.id).await.unwrap();
    assert_eq!(again.outcome, CompletionOutcome::AlreadyCompleted);
    assert!(again.successor.is_none());
    assert_eq!(all_tasks(&repo).await.len(), 2);
}

#[tokio::test]
async fn test_reopen_does_not_retract_or_duplicate_successor() {
    let (repo, _temp_dir) = setup_test_db().await;
    let task = create_test_task(&repo, "Laundry", Some(utc(2025, 1, 6, 18, 0))).await;
    repo.set_recurrence(task.id, PatternSpec::new(Frequency::Weekly))
        .await
        .unwrap();

    let first = repo.complete_task(task.id).await.unwrap();
    let successor = first.successor.unwrap();
    assert_eq!(successor.due_at, Some(utc(2025, 1, 13, 18, 0)));

    let reopened = repo.reopen_task(task.id).await.unwrap();
    assert_eq!(reopened.status, TaskStatus::Pending);
    assert!(reopened.completed_at.is_none());
    assert!(repo.find_task_by_id(successor.id).await.unwrap().is_some());

    let second = repo.complete_task(task.id).await.unwrap();
    assert_eq!(second.outcome, CompletionOutcome::Completed);
    assert_eq!(all_tasks(&repo).await.len(), 2);

    // Reopening a pending task changes nothing.
    let pending = repo.reopen_task(successor.id).await.unwrap();
    assert_eq!(pending.version, successor.version);
}

#[tokio::test]
async fn test_end_date_deactivates_pattern_without_successor() {
    let (repo, _temp_dir) = setup_test_db().await;
    let task = create_test_task(&repo, "Course", Some(utc(2025, 1, 6, 9, 0))).await;
    repo.set_recurrence(task.id, PatternSpec::new(Frequency::Daily).until(date(2025, 1, 7)))
        .await
        .unwrap();

    let first = repo.complete_task(task.id).await.unwrap();
    assert_eq!(first.outcome, CompletionOutcome::CompletedWithSuccessor);
    let successor = first.successor.unwrap();

    let last = repo.complete_task(successor.id).await.unwrap();
    assert_eq!(last.outcome, CompletionOutcome::RecurrenceEnded);
    assert!(last.successor.is_none());

    let pattern = last.pattern.unwrap();
    assert_eq!(pattern.task_id, successor.id);
    assert!(!pattern.active);
    assert_eq!(all_tasks(&repo).await.len(), 2);
}

#[tokio::test]
async fn test_pattern_already_past_its_end_is_inactive() {
    let (repo, _temp_dir) = setup_test_db().await;
    let task = create_test_task(&repo, "Expired", Some(utc(2025, 1, 6, 9, 0))).await;

    let pattern = repo
        .set_recurrence(task.id, PatternSpec::new(Frequency::Daily).until(date(2025, 1, 6)))
        .await
        .unwrap();
    assert!(!pattern.active);
    assert_eq!(pattern.next_occurrence, None);

    let result = repo.complete_task(task.id).await.unwrap();
    assert_eq!(result.outcome, CompletionOutcome::Completed);
    assert!(result.successor.is_none());
}

#[tokio::test]
async fn test_monthly_successor_clamps_to_month_end() {
    let (repo, _temp_dir) = setup_test_db().await;
    let task = create_test_task(&repo, "Pay rent", Some(utc(2025, 1, 31, 8, 0))).await;
    repo.set_recurrence(task.id, PatternSpec::new(Frequency::Monthly).on_day(31))
        .await
        .unwrap();

    let result = repo.complete_task(task.id).await.unwrap();
    assert_eq!(result.successor.unwrap().due_at, Some(utc(2025, 2, 28, 8, 0)));
}

#[tokio::test]
async fn test_weekly_successor_follows_local_calendar() {
    let config = CoreConfig {
        timezone: chrono_tz::America::New_York,
        ..Default::default()
    };
    let (repo, _temp_dir) = setup_test_db_with(config, utc(2025, 1, 6, 20, 0)).await;

    // 21:00 Monday in New York is already Tuesday in UTC.
    let task = create_test_task(&repo, "Gym", Some(utc(2025, 1, 7, 2, 0))).await;
    let days: WeekdaySet = "mon,wed".parse().unwrap();
    repo.set_recurrence(task.id, PatternSpec::new(Frequency::Weekly).on(days))
        .await
        .unwrap();

    let result = repo.complete_task(task.id).await.unwrap();
    // Wednesday 21:00 local.
    assert_eq!(result.successor.unwrap().due_at, Some(utc(2025, 1, 9, 2, 0)));
}

#[tokio::test]
async fn test_successor_keeps_local_time_across_dst() {
    let config = CoreConfig {
        timezone: chrono_tz::America::New_York,
        ..Default::default()
    };
    let (repo, _temp_dir) = setup_test_db_with(config, utc(2025, 3, 8, 15, 0)).await;

    // 09:00 EST on Saturday; clocks spring forward overnight.
    let task = create_test_task(&repo, "Walk the dog", Some(utc(2025, 3, 8, 14, 0))).await;
    repo.set_recurrence(task.id, PatternSpec::new(Frequency::Daily))
        .await
        .unwrap();

    let result = repo.complete_task(task.id).await.unwrap();
    // Still 09:00 local, now EDT.
    assert_eq!(result.successor.unwrap().due_at, Some(utc(2025, 3, 9, 13, 0)));
}

#[tokio::test]
async fn test_undated_task_recurs_from_completion_time() {
    let (repo, _temp_dir) = setup_test_db().await;
    let task = create_test_task(&repo, "Stretch", None).await;
    repo.set_recurrence(task.id, PatternSpec::new(Frequency::Daily).every(2))
        .await
        .unwrap();

    let result = repo.complete_task(task.id).await.unwrap();
    assert_eq!(result.successor.unwrap().due_at, Some(utc(2025, 1, 12, 12, 0)));
}

#[tokio::test]
async fn test_update_task_changes_only_given_fields() {
    let (repo, _temp_dir) = setup_test_db().await;
    let task = create_test_task(&repo, "Draft", Some(utc(2025, 1, 6, 9, 0))).await;

    let updated = repo
        .update_task(
            task.id,
            UpdateTaskData {
                title: Some("  Final draft ".to_string()),
                description: Some(None),
                priority: Some(TaskPriority::High),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.title, "Final draft");
    assert!(updated.description.is_none());
    assert_eq!(updated.priority, TaskPriority::High);
    assert_eq!(updated.due_at, task.due_at);
    assert_eq!(updated.status, TaskStatus::Pending);
    assert_eq!(updated.version, task.version + 1);
    assert_eq!(repo.find_task_by_id(task.id).await.unwrap().unwrap(), updated);

    let cleared = repo
        .update_task(
            task.id,
            UpdateTaskData {
                due_at: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(cleared.due_at.is_none());
    assert_eq!(cleared.title, "Final draft");

    let missing = repo.update_task(Uuid::new_v4(), UpdateTaskData::default()).await;
    assert!(matches!(missing, Err(CoreError::NotFound(_))));
}

#[tokio::test]
async fn test_title_and_description_limits() {
    let (repo, _temp_dir) = setup_test_db().await;
    let long_title = "one two three four five six seven eight nine ten eleven";

    let rejected = repo
        .add_task(NewTaskData {
            title: long_title.to_string(),
            ..Default::default()
        })
        .await;
    assert!(matches!(rejected, Err(CoreError::Validation(_))));
    let rejected = repo
        .add_task(NewTaskData {
            title: "Fine".to_string(),
            description: Some("x".repeat(MAX_DESCRIPTION_CHARS + 1)),
            ..Default::default()
        })
        .await;
    assert!(matches!(rejected, Err(CoreError::Validation(_))));
    assert!(all_tasks(&repo).await.is_empty());

    let task = create_test_task(&repo, "Short", None).await;
    for data in [
        UpdateTaskData {
            title: Some(long_title.to_string()),
            ..Default::default()
        },
        UpdateTaskData {
            title: Some("   ".to_string()),
            ..Default::default()
        },
        UpdateTaskData {
            description: Some(Some("x".repeat(MAX_DESCRIPTION_CHARS + 1))),
            ..Default::default()
        },
    ] {
        let result = repo.update_task(task.id, data).await;
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }
    assert_eq!(repo.find_task_by_id(task.id).await.unwrap().unwrap(), task);
}

#[tokio::test]
async fn test_moving_due_date_recomputes_next_occurrence() {
    let (repo, _temp_dir) = setup_test_db().await;
    let task = create_test_task(&repo, "Gym", Some(utc(2025, 1, 6, 9, 0))).await;
    let pattern = repo
        .set_recurrence(task.id, PatternSpec::new(Frequency::Daily))
        .await
        .unwrap();
    assert_eq!(pattern.next_occurrence, Some(date(2025, 1, 7)));

    repo.update_task(
        task.id,
        UpdateTaskData {
            due_at: Some(Some(utc(2025, 1, 20, 9, 0))),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let moved = repo.find_pattern_by_task(task.id).await.unwrap().unwrap();
    assert_eq!(moved.next_occurrence, Some(date(2025, 1, 21)));
    assert!(moved.active);

    // Other edits leave the cache alone.
    repo.update_task(
        task.id,
        UpdateTaskData {
            title: Some("Gym session".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let same = repo.find_pattern_by_task(task.id).await.unwrap().unwrap();
    assert_eq!(same.next_occurrence, Some(date(2025, 1, 21)));

    let result = repo.complete_task(task.id).await.unwrap();
    let successor = result.successor.unwrap();
    assert_eq!(successor.title, "Gym session");
    assert_eq!(successor.due_at, Some(utc(2025, 1, 21, 9, 0)));
}

#[tokio::test]
async fn test_invalid_patterns_persist_nothing() {
    let (repo, _temp_dir) = setup_test_db().await;
    let task = create_test_task(&repo, "Invalid", None).await;

    let zero_interval = repo
        .set_recurrence(task.id, PatternSpec::new(Frequency::Daily).every(0))
        .await;
    assert!(matches!(zero_interval, Err(CoreError::Validation(_))));

    let day_32 = repo
        .set_recurrence(task.id, PatternSpec::new(Frequency::Monthly).on_day(32))
        .await;
    assert!(matches!(day_32, Err(CoreError::Validation(_))));

    assert!(repo.find_pattern_by_task(task.id).await.unwrap().is_none());
    let unchanged = repo.find_task_by_id(task.id).await.unwrap().unwrap();
    assert_eq!(unchanged.version, task.version);
}

#[tokio::test]
async fn test_set_recurrence_replaces_existing_pattern() {
    let (repo, _temp_dir) = setup_test_db().await;
    let task = create_test_task(&repo, "Replace", Some(utc(2025, 1, 6, 9, 0))).await;

    let first = repo
        .set_recurrence(task.id, PatternSpec::new(Frequency::Daily))
        .await
        .unwrap();
    repo.stop_recurrence(task.id).await.unwrap();

    let second = repo
        .set_recurrence(task.id, PatternSpec::new(Frequency::Weekly).every(2))
        .await
        .unwrap();
    assert_eq!(second.id, first.id);
    assert_eq!(second.frequency, Frequency::Weekly);
    assert_eq!(second.interval, 2);
    assert!(second.active);
    assert_eq!(second.next_occurrence, Some(date(2025, 1, 20)));

    let missing = repo
        .set_recurrence(Uuid::new_v4(), PatternSpec::new(Frequency::Daily))
        .await;
    assert!(matches!(missing, Err(CoreError::NotFound(_))));
}

#[tokio::test]
async fn test_completed_task_cannot_take_a_pattern() {
    let (repo, _temp_dir) = setup_test_db().await;
    let task = create_test_task(&repo, "Done already", Some(utc(2025, 1, 6, 9, 0))).await;
    let completed = repo.complete_task(task.id).await.unwrap().task;

    let result = repo
        .set_recurrence(task.id, PatternSpec::new(Frequency::Daily))
        .await;
    assert!(matches!(result, Err(CoreError::Validation(_))));
    assert!(repo.find_pattern_by_task(task.id).await.unwrap().is_none());

    // The rejected attempt rolled back its version bump too.
    let unchanged = repo.find_task_by_id(task.id).await.unwrap().unwrap();
    assert_eq!(unchanged.version, completed.version);

    // Once reopened, the task can recur again and completion hands it on.
    repo.reopen_task(task.id).await.unwrap();
    let pattern = repo
        .set_recurrence(task.id, PatternSpec::new(Frequency::Daily))
        .await
        .unwrap();
    assert!(pattern.active);
    let again = repo.complete_task(task.id).await.unwrap();
    assert_eq!(again.outcome, CompletionOutcome::CompletedWithSuccessor);
    assert_eq!(all_tasks(&repo).await.len(), 2);
}

#[tokio::test]
async fn test_stop_recurrence_leaves_task_status_alone() {
    let (repo, _temp_dir) = setup_test_db().await;
    let task = create_test_task(&repo, "Stop me", Some(utc(2025, 1, 6, 9, 0))).await;
    repo.set_recurrence(task.id, PatternSpec::new(Frequency::Daily))
        .await
        .unwrap();

    let stopped = repo.stop_recurrence(task.id).await.unwrap();
    assert!(!stopped.active);
    let still_pending = repo.find_task_by_id(task.id).await.unwrap().unwrap();
    assert_eq!(still_pending.status, TaskStatus::Pending);

    let result = repo.complete_task(task.id).await.unwrap();
    assert_eq!(result.outcome, CompletionOutcome::Completed);
    assert_eq!(all_tasks(&repo).await.len(), 1);

    let other = create_test_task(&repo, "No pattern", None).await;
    assert!(matches!(
        repo.stop_recurrence(other.id).await,
        Err(CoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_last_subtask_cascades_exactly_once() {
    let (repo, _temp_dir) = setup_test_db().await;
    let task = create_test_task(&repo, "Pack", Some(utc(2025, 1, 6, 9, 0))).await;
    repo.set_recurrence(task.id, PatternSpec::new(Frequency::Daily))
        .await
        .unwrap();
    let subtasks = add_subtasks(&repo, task.id, &["socks", "shirts", "charger"]).await;
    assert_eq!(
        subtasks.iter().map(|s| s.position).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );

    for subtask in &subtasks[..2] {
        let toggle = repo.toggle_subtask(subtask.id).await.unwrap();
        assert!(toggle.subtask.completed);
        assert!(toggle.cascade.is_none());
        assert_eq!(toggle.parent.status, TaskStatus::Pending);
    }

    let last = repo.toggle_subtask(subtasks[2].id).await.unwrap();
    let cascade = last.cascade.expect("parent should complete");
    assert_eq!(cascade.outcome, CompletionOutcome::CompletedWithSuccessor);
    assert_eq!(last.parent.status, TaskStatus::Completed);
    assert_eq!(all_tasks(&repo).await.len(), 2);

    // Unchecking never reopens the parent, and re-checking never cascades again.
    let unchecked = repo.toggle_subtask(subtasks[2].id).await.unwrap();
    assert!(!unchecked.subtask.completed);
    assert!(unchecked.cascade.is_none());
    assert_eq!(unchecked.parent.status, TaskStatus::Completed);

    let rechecked = repo.toggle_subtask(subtasks[2].id).await.unwrap();
    assert!(rechecked.cascade.is_none());
    assert_eq!(all_tasks(&repo).await.len(), 2);
}

#[tokio::test]
async fn test_task_without_subtasks_never_auto_completes() {
    let (repo, _temp_dir) = setup_test_db().await;
    let task = create_test_task(&repo, "Bare", None).await;
    let subtasks = add_subtasks(&repo, task.id, &["only", "other"]).await;

    repo.toggle_subtask(subtasks[0].id).await.unwrap();
    repo.delete_subtask(subtasks[1].id).await.unwrap();

    // Deleting the last open item is not a toggle; nothing cascades.
    let parent = repo.find_task_by_id(task.id).await.unwrap().unwrap();
    assert_eq!(parent.status, TaskStatus::Pending);

    repo.delete_subtask(subtasks[0].id).await.unwrap();
    assert!(repo.find_subtasks(task.id).await.unwrap().is_empty());
    let parent = repo.find_task_by_id(task.id).await.unwrap().unwrap();
    assert_eq!(parent.status, TaskStatus::Pending);
}

#[tokio::test]
async fn test_successor_policy_can_skip_copies() {
    let config = CoreConfig {
        successor: SuccessorPolicy {
            copy_subtasks: false,
            copy_tags: false,
        },
        ..Default::default()
    };
    let (repo, _temp_dir) = setup_test_db_with(config, utc(2025, 1, 10, 12, 0)).await;
    let task = create_test_task(&repo, "Minimal", Some(utc(2025, 1, 6, 9, 0))).await;
    add_subtasks(&repo, task.id, &["a"]).await;
    repo.set_recurrence(task.id, PatternSpec::new(Frequency::Daily))
        .await
        .unwrap();

    let successor = repo.complete_task(task.id).await.unwrap().successor.unwrap();
    assert!(repo.find_subtasks(successor.id).await.unwrap().is_empty());
    assert!(repo.find_task_tags(successor.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_concurrent_completions_create_one_successor() {
    let (repo, _temp_dir) = setup_test_db().await;
    let repo = Arc::new(repo);
    let task = create_test_task(&repo, "Race", Some(utc(2025, 1, 6, 9, 0))).await;
    repo.set_recurrence(task.id, PatternSpec::new(Frequency::Daily))
        .await
        .unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let repo = Arc::clone(&repo);
            tokio::spawn(async move { repo.complete_task(task.id).await })
        })
        .collect();

    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.unwrap().unwrap().outcome);
    }

    let generated = outcomes
        .iter()
        .filter(|o| **o == CompletionOutcome::CompletedWithSuccessor)
        .count();
    assert_eq!(generated, 1);
    assert!(outcomes
        .iter()
        .all(|o| matches!(o, CompletionOutcome::CompletedWithSuccessor | CompletionOutcome::AlreadyCompleted)));
    assert_eq!(all_tasks(&repo).await.len(), 2);
}

#[tokio::test]
async fn test_concurrent_final_toggles_cascade_once() {
    let (repo, _temp_dir) = setup_test_db().await;
    let repo = Arc::new(repo);
    let task = create_test_task(&repo, "Checklist", Some(utc(2025, 1, 6, 9, 0))).await;
    repo.set_recurrence(task.id, PatternSpec::new(Frequency::Daily))
        .await
        .unwrap();
    let subtasks = add_subtasks(&repo, task.id, &["one", "two"]).await;

    let handles: Vec<_> = subtasks
        .iter()
        .map(|s| {
            let repo = Arc::clone(&repo);
            let id = s.id;
            tokio::spawn(async move { repo.toggle_subtask(id).await })
        })
        .collect();

    let mut cascades = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap().cascade.is_some() {
            cascades += 1;
        }
    }
    assert_eq!(cascades, 1);
    assert_eq!(all_tasks(&repo).await.len(), 2);
}

#[tokio::test]
async fn test_locked_database_surfaces_retryable_conflict() {
    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("locked.db");
    let db_path = db_path.to_string_lossy();

    let pool = establish_connection_with_timeout(&db_path, Duration::from_millis(1))
        .await
        .unwrap();
    let repo = SqliteRepository::with_clock(pool, CoreConfig::default(), Arc::new(FixedClock(utc(2025, 1, 10, 12, 0))));
    let task = create_test_task(&repo, "Blocked", Some(utc(2025, 1, 6, 9, 0))).await;

    // A second process holds the write lock for the whole call.
    let other = establish_connection(&db_path).await.unwrap();
    let mut holder = other.begin().await.unwrap();
    sqlx::query("UPDATE tasks SET updated_at = updated_at")
        .execute(&mut *holder)
        .await
        .unwrap();

    let err = repo.complete_task(task.id).await.unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)), "got {:?}", err);
    assert!(err.is_retryable());

    holder.rollback().await.unwrap();

    let unchanged = repo.find_task_by_id(task.id).await.unwrap().unwrap();
    assert_eq!(unchanged, task);
    assert_eq!(all_tasks(&repo).await.len(), 1);

    // With the lock released the same request goes through.
    let done = repo.complete_task(task.id).await.unwrap();
    assert_eq!(done.outcome, CompletionOutcome::Completed);
}

#[tokio::test]
async fn test_missing_ids_are_not_found() {
    let (repo, _temp_dir) = setup_test_db().await;

    assert!(matches!(
        repo.complete_task(Uuid::new_v4()).await,
        Err(CoreError::NotFound(_))
    ));
    assert!(matches!(
        repo.reopen_task(Uuid::new_v4()).await,
        Err(CoreError::NotFound(_))
    ));
    assert!(matches!(
        repo.toggle_subtask(Uuid::new_v4()).await,
        Err(CoreError::NotFound(_))
    ));
    assert!(matches!(
        repo.add_subtask(NewSubtaskData {
            task_id: Uuid::new_v4(),
            description: "orphan".to_string(),
        })
        .await,
        Err(CoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_preview_occurrences() {
    let (repo, _temp_dir) = setup_test_db().await;

    // The clock reads Friday 2025-01-10.
    let spec = PatternSpec::new(Frequency::Weekly).on("mon,wed".parse().unwrap());
    let dates = repo.preview_occurrences(&spec, 5).await.unwrap();
    assert_eq!(
        dates,
        vec![date(2025, 1, 13), date(2025, 1, 15), date(2025, 1, 20), date(2025, 1, 22), date(2025, 1, 27)]
    );

    let task = create_test_task(&repo, "Preview", Some(utc(2025, 1, 31, 9, 0))).await;
    repo.set_recurrence(task.id, PatternSpec::new(Frequency::Monthly).on_day(31))
        .await
        .unwrap();
    let dates = repo.preview_task_occurrences(task.id, 3).await.unwrap();
    assert_eq!(dates, vec![date(2025, 2, 28), date(2025, 3, 31), date(2025, 4, 30)]);

    let bad = PatternSpec::new(Frequency::Daily).every(0);
    assert!(matches!(
        repo.preview_occurrences(&bad, 3).await,
        Err(CoreError::Validation(_))
    ));
}
