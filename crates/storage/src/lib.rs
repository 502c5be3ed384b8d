//! Storage layer for the planning backend: a Postgres (`sqlx`) `Repository`
//! implementation (C11, spec §4.11) and an in-memory fake used by tests.

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

pub mod error;
pub mod memory_repository;
pub mod postgres_repository;
pub mod rows;

pub use error::StorageError;
pub use memory_repository::InMemoryRepository;
pub use postgres_repository::PostgresRepository;

/// Create a PostgreSQL connection pool.
pub async fn create_pool(database_url: &str) -> Result<PgPool, StorageError> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .map_err(StorageError::Connection)
}

/// Run database migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), StorageError> {
    sqlx::migrate!("../../migrations")
        .run(pool)
        .await
        .map_err(StorageError::Migration)
}

/// Check database connectivity.
pub async fn check_connection(pool: &PgPool) -> Result<(), StorageError> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(StorageError::Query)?;
    Ok(())
}
