//! `/api/planning/scenarios*` and `/api/planning/compare*` handlers (spec §6).

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;

use planning_domain::{PlanningError, PlanningRunId, PlanningScenarioId};

use crate::dto::{CompareResponse, ScenarioDetailResponse};
use crate::AppState;

pub async fn get_scenario(State(state): State<Arc<AppState>>, Path(id): Path<PlanningScenarioId>) -> Result<Json<ScenarioDetailResponse>, PlanningError> {
    let (scenario, projections) = state
        .engine
        .scenario_detail(id)
        .await?
        .ok_or_else(|| PlanningError::NotFound(format!("scenario {id}")))?;

    Ok(Json(ScenarioDetailResponse {
        schedule: scenario.blocks.clone(),
        warnings: scenario.warnings.clone(),
        scenario,
        projections,
    }))
}

pub async fn compare_run(State(state): State<Arc<AppState>>, Path(run_id): Path<PlanningRunId>) -> Result<Json<CompareResponse>, PlanningError> {
    let (run, scenarios) = state
        .engine
        .compare_run(run_id)
        .await?
        .ok_or_else(|| PlanningError::NotFound(format!("planning run {run_id}")))?;

    Ok(Json(CompareResponse { run, scenarios }))
}
