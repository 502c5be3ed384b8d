//! Planning backend server: HTTP surface (spec §6) over the `PlanningEngine`
//! orchestrator and a Postgres-backed `Repository` (C11).

pub mod dto;
pub mod engine;
pub mod handlers;

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use planning_config::AppConfig;
use planning_domain::{HealthResponse, ReadyResponse, Repository};
use planning_scheduler::WorkCalendar;
use planning_storage::check_connection;
use sqlx::PgPool;

use engine::PlanningEngine;

/// Application state shared across handlers.
pub struct AppState {
    pub pool: PgPool,
    pub engine: PlanningEngine,
    pub config: AppConfig,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(pool: PgPool, repo: Arc<dyn Repository>, config: AppConfig) -> Self {
        let calendar = WorkCalendar {
            morning_start_minutes: config.calendar.morning_start_minutes,
            lunch_start_minutes: config.calendar.lunch_start_minutes,
            lunch_end_minutes: config.calendar.lunch_end_minutes,
            afternoon_end_minutes: config.calendar.afternoon_end_minutes,
            overtime_window_end_minutes: config.calendar.overtime_window_end_minutes,
            holidays: config.holidays.clone(),
        };
        let engine = PlanningEngine::new(repo, calendar, config.proficiency_bands);
        Self {
            pool,
            engine,
            config,
            start_time: Instant::now(),
        }
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/ready", get(ready))
        .route("/api/planning/runs", post(handlers::runs::create_run).get(handlers::runs::list_runs))
        .route("/api/planning/runs/active", get(handlers::runs::active_run))
        .route("/api/planning/runs/{id}", get(handlers::runs::get_run))
        .route("/api/planning/runs/{id}/accept/{scenario_id}", post(handlers::runs::accept_scenario))
        .route("/api/planning/runs/{id}/archive", post(handlers::runs::archive_run))
        .route("/api/planning/scenarios/{id}", get(handlers::scenarios::get_scenario))
        .route("/api/planning/compare/{run_id}", get(handlers::scenarios::compare_run))
        .route("/api/schedules/{id}/replan", post(handlers::schedules::replan))
        .route("/api/schedules/{id}/replan/commit", post(handlers::schedules::commit_replan))
        .route("/api/analytics/workers/{id}/productivity", get(handlers::analytics::worker_productivity))
        .route("/api/analytics/recalculate-proficiencies", post(handlers::analytics::recalculate_proficiencies))
        .route("/api/analytics/capacity-risk", get(handlers::analytics::capacity_risk))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint.
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        build_sha: option_env!("BUILD_SHA").unwrap_or("dev").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

/// Readiness check endpoint.
async fn ready(State(state): State<Arc<AppState>>) -> Json<ReadyResponse> {
    let db_status = match check_connection(&state.pool).await {
        Ok(()) => "connected",
        Err(_) => "disconnected",
    };

    Json(ReadyResponse {
        status: if db_status == "connected" { "ok" } else { "degraded" }.to_string(),
        database: db_status.to_string(),
    })
}
