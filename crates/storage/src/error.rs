//! `StorageError` — the failure modes a `Repository` implementation can hit
//! talking to Postgres, before they're folded into `PlanningError::Io` at
//! the repository boundary (spec §4.11).

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database connection error: {0}")]
    Connection(#[source] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),

    #[error("query error: {0}")]
    Query(#[source] sqlx::Error),

    #[error("decode error: {0}")]
    Decode(String),
}

impl From<StorageError> for planning_domain::PlanningError {
    fn from(err: StorageError) -> Self {
        planning_domain::PlanningError::Io(err.to_string())
    }
}
