//! Request bodies and response envelopes for the RPC surface (spec §6).
//!
//! Domain types (`PlanningRun`, `PlanningScenario`, `ScheduleBlock`, ...)
//! already derive `Serialize`/`Deserialize` and are returned directly where
//! the wire shape matches; these types cover request validation and the
//! envelope shapes the table in spec §6 names.

use chrono::{DateTime, NaiveDate, Utc};
use planning_domain::{DemandEntry, DemandEntryId, PlanningRun, PlanningScenario, ScheduleBlock};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePlanningRunRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    /// Demand entries to include; `None` plans every entry currently
    /// `pending`.
    pub demand_entry_ids: Option<Vec<DemandEntryId>>,
    #[validate(length(max = 200))]
    pub created_by: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ListRunsQuery {
    pub status: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct RunEnvelope {
    pub run: PlanningRun,
}

#[derive(Debug, Serialize)]
pub struct RunsEnvelope {
    pub runs: Vec<PlanningRun>,
}

#[derive(Debug, Serialize)]
pub struct NullableRunEnvelope {
    pub run: Option<PlanningRun>,
}

/// `PlanningRun` plus the data `GET /api/planning/runs/{id}` additionally
/// exposes: the run's scenarios and the demand entries it was generated
/// against (spec §6 "fetch run + scenarios + demand").
#[derive(Debug, Serialize)]
pub struct RunDetail {
    #[serde(flatten)]
    pub run: PlanningRun,
    pub scenarios: Vec<PlanningScenario>,
    pub demand: Vec<DemandEntry>,
}

#[derive(Debug, Serialize)]
pub struct RunDetailEnvelope {
    pub run: RunDetail,
}

#[derive(Debug, Serialize)]
pub struct AcceptResponse {
    pub success: bool,
    #[serde(rename = "tasksCreated")]
    pub tasks_created: u32,
}

#[derive(Debug, Serialize)]
pub struct ArchiveResponse {
    pub success: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DemandProjectionView {
    pub demand_entry_id: DemandEntryId,
    pub due_date: NaiveDate,
    pub projected_completion_date: Option<NaiveDate>,
    pub can_meet_target: bool,
}

#[derive(Debug, Serialize)]
pub struct ScenarioDetailResponse {
    pub scenario: PlanningScenario,
    pub projections: Vec<DemandProjectionView>,
    pub schedule: Vec<ScheduleBlock>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CompareResponse {
    pub run: PlanningRun,
    pub scenarios: Vec<PlanningScenario>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReplanRequest {
    pub as_of: NaiveDate,
    /// `"preserve_future_work"` (default) or `"reschedule_all"`.
    pub policy: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CommitReplanRequest {
    pub accepted_blocks: Vec<ScheduleBlock>,
}

#[derive(Debug, Serialize)]
pub struct ScheduleEnvelope {
    pub schedule: Vec<ScheduleBlock>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ProductivityQuery {
    pub since: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepProductivity {
    pub step_id: i64,
    pub current_level: u8,
    pub avg_efficiency_pct: Option<f64>,
    pub sample_size: u32,
}

#[derive(Debug, Serialize)]
pub struct WorkerProductivityResponse {
    pub worker_id: i64,
    pub overall_avg_efficiency_pct: Option<f64>,
    pub overall_sample_size: u32,
    pub by_step: Vec<StepProductivity>,
}

#[derive(Debug, Deserialize, Default)]
pub struct RecalculateProficienciesRequest {
    pub since: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CapacityRiskQuery {
    pub from: NaiveDate,
    pub horizon_end: NaiveDate,
}

/// Wire shape of `planning_scheduler::capacity::DeadlineRisk` (spec §4.10).
#[derive(Debug, Clone, Serialize)]
pub struct DeadlineRiskView {
    pub demand_entry_id: DemandEntryId,
    pub required_hours: f64,
    pub available_hours_until_due: f64,
    pub can_meet: bool,
    pub shortfall_hours: f64,
}

/// Wire shape of `planning_scheduler::capacity::WeeklyBreakdown` (spec §4.10).
#[derive(Debug, Clone, Serialize)]
pub struct WeeklyBreakdownView {
    pub week_start: NaiveDate,
    pub available_hours: f64,
    pub required_hours: f64,
}

#[derive(Debug, Serialize)]
pub struct CapacityRiskResponse {
    pub deadline_risk: Vec<DeadlineRiskView>,
    pub weekly_breakdown: Vec<WeeklyBreakdownView>,
}
