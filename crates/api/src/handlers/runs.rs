//! `/api/planning/runs*` handlers (spec §6).

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use validator::Validate;

use planning_domain::{PlanningError, PlanningRunId, PlanningScenarioId, RunFilter, RunStatus};

use crate::dto::{
    AcceptResponse, ArchiveResponse, CreatePlanningRunRequest, ListRunsQuery, NullableRunEnvelope, RunDetail,
    RunDetailEnvelope, RunEnvelope, RunsEnvelope,
};
use crate::engine::GenerateRunRequest;
use crate::AppState;

pub async fn create_run(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreatePlanningRunRequest>,
) -> Result<(axum::http::StatusCode, Json<RunEnvelope>), PlanningError> {
    req.validate().map_err(PlanningError::from_validation_errors)?;

    let (run, scenarios) = state
        .engine
        .generate_run(
            GenerateRunRequest {
                name: req.name,
                window_start: req.window_start,
                window_end: req.window_end,
                demand_entry_ids: req.demand_entry_ids,
                created_by: req.created_by,
            },
            chrono::Utc::now(),
        )
        .await?;

    tracing::info!(run_id = run.id, scenario_count = scenarios.len(), "planning run generated");
    Ok((axum::http::StatusCode::CREATED, Json(RunEnvelope { run })))
}

pub async fn list_runs(State(state): State<Arc<AppState>>, Query(query): Query<ListRunsQuery>) -> Result<Json<RunsEnvelope>, PlanningError> {
    let status = query.status.as_deref().map(parse_run_status).transpose()?;
    let runs = state.engine.list_runs(&RunFilter { status, limit: query.limit }).await?;
    Ok(Json(RunsEnvelope { runs }))
}

pub async fn active_run(State(state): State<Arc<AppState>>) -> Result<Json<NullableRunEnvelope>, PlanningError> {
    let run = state.engine.active_run().await?;
    Ok(Json(NullableRunEnvelope { run }))
}

pub async fn get_run(State(state): State<Arc<AppState>>, Path(id): Path<PlanningRunId>) -> Result<Json<RunDetailEnvelope>, PlanningError> {
    let (run, scenarios, demand) = state
        .engine
        .run_detail(id)
        .await?
        .ok_or_else(|| PlanningError::NotFound(format!("planning run {id}")))?;

    Ok(Json(RunDetailEnvelope {
        run: RunDetail { run, scenarios, demand },
    }))
}

pub async fn accept_scenario(
    State(state): State<Arc<AppState>>,
    Path((run_id, scenario_id)): Path<(PlanningRunId, PlanningScenarioId)>,
) -> Result<Json<AcceptResponse>, PlanningError> {
    let tasks_created = state.engine.accept_scenario(run_id, scenario_id).await?;
    tracing::info!(run_id, scenario_id, tasks_created, "scenario accepted");
    Ok(Json(AcceptResponse { success: true, tasks_created }))
}

pub async fn archive_run(State(state): State<Arc<AppState>>, Path(id): Path<PlanningRunId>) -> Result<Json<ArchiveResponse>, PlanningError> {
    state.engine.archive_run(id).await?;
    Ok(Json(ArchiveResponse { success: true }))
}

fn parse_run_status(raw: &str) -> Result<RunStatus, PlanningError> {
    match raw {
        "draft" => Ok(RunStatus::Draft),
        "pending" => Ok(RunStatus::Pending),
        "accepted" => Ok(RunStatus::Accepted),
        "archived" => Ok(RunStatus::Archived),
        other => Err(PlanningError::Validation(format!("unknown run status '{other}'"))),
    }
}
