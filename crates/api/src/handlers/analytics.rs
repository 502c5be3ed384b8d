//! `/api/analytics/*` handlers — the C9 rollup and batch recalculation
//! (spec §6).

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;

use planning_domain::{PlanningError, WorkerId};

use crate::dto::{CapacityRiskQuery, CapacityRiskResponse, RecalculateProficienciesRequest, WorkerProductivityResponse};
use crate::AppState;

/// Default lookback window for the productivity rollup when the caller
/// doesn't specify `since`.
const DEFAULT_PRODUCTIVITY_LOOKBACK_DAYS: i64 = 90;

/// Spec §4.9's auto-adjustment window: "completed blocks in the last 30
/// days".
const PROFICIENCY_RECALC_LOOKBACK_DAYS: i64 = 30;

pub async fn worker_productivity(
    State(state): State<Arc<AppState>>,
    Path(worker_id): Path<WorkerId>,
    Query(query): Query<crate::dto::ProductivityQuery>,
) -> Result<Json<WorkerProductivityResponse>, PlanningError> {
    let since = query.since.unwrap_or_else(|| chrono::Utc::now() - chrono::Duration::days(DEFAULT_PRODUCTIVITY_LOOKBACK_DAYS));
    let summary = state.engine.worker_productivity(worker_id, since).await?;
    Ok(Json(summary))
}

#[derive(Debug, serde::Serialize)]
pub struct RecalculateProficienciesResponse {
    pub applied: u32,
    pub adjustments: Vec<planning_domain::ProficiencyAdjustment>,
}

pub async fn recalculate_proficiencies(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RecalculateProficienciesRequest>,
) -> Result<Json<RecalculateProficienciesResponse>, PlanningError> {
    let now = chrono::Utc::now();
    let since = req.since.unwrap_or_else(|| now - chrono::Duration::days(PROFICIENCY_RECALC_LOOKBACK_DAYS));
    let adjustments = state.engine.recalculate_proficiencies(since, now).await?;
    tracing::info!(applied = adjustments.len(), "proficiency recalculation completed");
    Ok(Json(RecalculateProficienciesResponse {
        applied: adjustments.len() as u32,
        adjustments,
    }))
}

/// C10's scenario-independent capacity/deadline-risk screen (spec §4.10);
/// not in spec §6's abridged RPC table, carried the way the teacher's ambient
/// analytics endpoints are — additive, not a replacement for anything named.
pub async fn capacity_risk(State(state): State<Arc<AppState>>, Query(query): Query<CapacityRiskQuery>) -> Result<Json<CapacityRiskResponse>, PlanningError> {
    let response = state.engine.capacity_risk(query.from, query.horizon_end).await?;
    Ok(Json(response))
}
