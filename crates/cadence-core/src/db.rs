use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::CoreError;

// Re-export the pool for use in other parts of the core crate
pub use sqlx::SqlitePool as DbPool;

pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const MEMORY_PATHS: [&str; 2] = [":memory:", "sqlite::memory:"];

/// Establishes a connection pool to the SQLite database and runs migrations.
///
/// # Arguments
///
/// * `db_path` - The path to the SQLite database file, or `:memory:`.
///
/// # Returns
///
/// A `Result` containing the `SqlitePool` or a `CoreError` if the connection fails
/// or migrations cannot be run.
pub async fn establish_connection(db_path: &str) -> Result<DbPool, CoreError> {
    establish_connection_with_timeout(db_path, DEFAULT_BUSY_TIMEOUT).await
}

/// Same as [`establish_connection`], with an explicit wait for competing writers.
pub async fn establish_connection_with_timeout(
    db_path: &str,
    busy_timeout: Duration,
) -> Result<DbPool, CoreError> {
    let in_memory = MEMORY_PATHS.contains(&db_path);

    let (options, max_connections) = if in_memory {
        // Every in-memory connection is its own database, so keep exactly one.
        (SqliteConnectOptions::from_str("sqlite::memory:")?, 1)
    } else {
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        (options, 5)
    };

    let options = options.foreign_keys(true).busy_timeout(busy_timeout);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    tracing::debug!(db_path, in_memory, "Database ready");
    Ok(pool)
}
