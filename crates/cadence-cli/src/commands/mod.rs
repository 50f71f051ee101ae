pub mod add;
pub mod delete;
pub mod edit;
pub mod r#do;
pub mod list;
pub mod recurrence;
pub mod reopen;
pub mod show;
pub mod subtask;
