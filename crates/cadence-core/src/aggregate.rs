use crate::models::Subtask;

/// True only when there is at least one subtask and every one is done.
///
/// A task with no subtasks is never completed by this rule.
pub fn all_complete(subtasks: &[Subtask]) -> bool {
    !subtasks.is_empty() && subtasks.iter().all(|s| s.completed)
}

/// Done/total counts, for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubtaskProgress {
    pub done: usize,
    pub total: usize,
}

impl SubtaskProgress {
    pub fn of(subtasks: &[Subtask]) -> Self {
        Self {
            done: subtasks.iter().filter(|s| s.completed).count(),
            total: subtasks.len(),
        }
    }
}

impl std::fmt::Display for SubtaskProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.done, self.total)
    }
}
