use std::{future::Future, time::Duration};

use crate::error::CoreError;

const CONFLICT_BACKOFF_MS: u64 = 25;

/// Runs `op`, and once more with a fresh attempt if the first one hit a
/// concurrent writer. A second conflict is returned to the caller.
pub(crate) async fn retry_once_on_conflict<T, F, Fut>(operation: &str, mut op: F) -> Result<T, CoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CoreError>>,
{
    match op().await {
        Err(CoreError::Conflict(reason)) => {
            tracing::warn!(operation, %reason, "Conflict detected; retrying once with a fresh read");
            tokio::time::sleep(Duration::from_millis(CONFLICT_BACKOFF_MS)).await;
            op().await
        }
        other => other,
    }
}
