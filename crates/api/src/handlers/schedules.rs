//! `/api/schedules/{id}/replan*` handlers (spec §4.7, §6).

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use validator::Validate;

use planning_domain::{PlanningError, ScheduleId};

use crate::dto::{CommitReplanRequest, ReplanRequest, ScheduleEnvelope};
use crate::engine::{parse_replan_policy, ReplanResult};
use crate::AppState;

pub async fn replan(
    State(state): State<Arc<AppState>>,
    Path(id): Path<ScheduleId>,
    Json(req): Json<ReplanRequest>,
) -> Result<Json<ReplanResult>, PlanningError> {
    req.validate().map_err(PlanningError::from_validation_errors)?;

    let policy = parse_replan_policy(req.policy.as_deref());
    let now = chrono::Utc::now();
    let result = state.engine.replan(id, req.as_of, policy, now).await?;
    Ok(Json(result))
}

pub async fn commit_replan(
    State(state): State<Arc<AppState>>,
    Path(id): Path<ScheduleId>,
    Json(req): Json<CommitReplanRequest>,
) -> Result<Json<ScheduleEnvelope>, PlanningError> {
    req.validate().map_err(PlanningError::from_validation_errors)?;

    let schedule = state.engine.commit_replan(id, req.accepted_blocks).await?;
    tracing::info!(schedule_id = id, block_count = schedule.len(), "replan committed");
    Ok(Json(ScheduleEnvelope { schedule }))
}
