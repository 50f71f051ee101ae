use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("IO error")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    /// A concurrent writer got there first. Safe to retry.
    #[error("Conflicting concurrent modification: {0}")]
    Conflict(String),

    #[error("Ambiguous short ID. Did you mean one of these?")]
    AmbiguousId(Vec<(String, String)>), // Vec of (ID, Title)
}

impl CoreError {
    /// Whether the caller may reissue the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Conflict(_))
    }
}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        if is_sqlite_busy(&err) {
            CoreError::Conflict(err.to_string())
        } else {
            CoreError::Database(err)
        }
    }
}

// SQLITE_BUSY (5) and SQLITE_LOCKED (6), including their extended codes.
fn is_sqlite_busy(err: &sqlx::Error) -> bool {
    let Some(db_err) = err.as_database_error() else {
        return false;
    };

    if let Some(code) = db_err.code() {
        if let Ok(code) = code.parse::<i32>() {
            if code & 0xff == 5 || code & 0xff == 6 {
                return true;
            }
        }
    }

    let message = db_err.message();
    message.contains("database is locked") || message.contains("database is busy")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_conflicts_are_retryable() {
        assert!(CoreError::Conflict("busy".into()).is_retryable());
        assert!(!CoreError::NotFound("x".into()).is_retryable());
        assert!(!CoreError::Validation("interval".into()).is_retryable());
    }

    #[test]
    fn row_not_found_stays_a_database_error() {
        let err: CoreError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, CoreError::Database(_)));
    }
}
