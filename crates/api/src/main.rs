//! Planning backend server entrypoint.

use std::sync::Arc;

use planning_api::{build_router, AppState};
use planning_config::AppConfig;
use planning_storage::{create_pool, run_migrations, PostgresRepository};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,sqlx=warn".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting planning server...");

    let config = AppConfig::from_env()?;
    tracing::info!("Binding to {}", config.bind_address);

    let pool = create_pool(&config.database_url).await?;
    tracing::info!("Database connection pool created");

    run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    let repo = Arc::new(PostgresRepository::new(pool.clone()));
    let state = Arc::new(AppState::new(pool, repo, config.clone()));

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    tracing::info!("Server listening on {}", config.bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
