//! C11 — the narrow, typed read/write port the scheduler and the API layer
//! consume instead of talking to SQL directly (spec §4.11, design notes
//! "globally mutable `db` module").
//!
//! Every method returns data-transfer records, never live cursors, so an
//! implementation can provide snapshot isolation for a single planning-run
//! generation by reading everything once at the top of the run (spec §4.11,
//! §5).

use crate::catalog::{Equipment, EquipmentCertification, ProductStep, ProductStepId, StepDependency, Worker, WorkerId};
use crate::demand::{BomReference, DemandEntry, DemandEntryId, DemandStatus};
use crate::errors::PlanningError;
use crate::proficiency::{
    CompletedAssignment, OutputHistorySample, ProficiencyAdjustment, ProficiencyHistoryEntry,
    WorkerProficiency,
};
use crate::schedule::{
    PlanningRun, PlanningRunId, PlanningScenario, PlanningScenarioId, ScheduleBlock,
    ScheduleBlockId, ScheduleId, Strategy,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

/// Filter for `get_demand_entries`.
#[derive(Debug, Clone, Default)]
pub struct DemandFilter {
    pub status: Option<DemandStatus>,
    pub due_before: Option<NaiveDate>,
    pub ids: Option<Vec<DemandEntryId>>,
}

/// A BOM's steps plus their dependency edges, as read for one planning run.
#[derive(Debug, Clone, Default)]
pub struct BomSteps {
    pub steps: Vec<ProductStep>,
    pub dependencies: Vec<StepDependency>,
}

/// Optional narrowing for `get_proficiencies`.
#[derive(Debug, Clone, Default)]
pub struct ProficiencyFilter {
    pub worker_ids: Option<Vec<WorkerId>>,
    pub step_ids: Option<Vec<ProductStepId>>,
}

/// Optional narrowing for `list_runs`.
#[derive(Debug, Clone, Default)]
pub struct RunFilter {
    pub status: Option<crate::schedule::RunStatus>,
    pub limit: Option<u32>,
}

/// Fields needed to create a new `PlanningRun` (spec §3, §6).
#[derive(Debug, Clone)]
pub struct NewPlanningRun {
    pub name: String,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub created_by: Option<String>,
}

/// Fields needed to persist one generated scenario under a run.
#[derive(Debug, Clone)]
pub struct NewScenario {
    pub name: String,
    pub strategy: Strategy,
    pub allow_overtime: bool,
    pub overtime_limit_hours_per_day: u32,
    pub metrics: crate::schedule::ScenarioMetrics,
    pub blocks: Vec<ScheduleBlock>,
    pub warnings: Vec<String>,
    pub parent_scenario_id: Option<PlanningScenarioId>,
}

/// A worker created on the fly while committing a replan draft (spec §4.7).
#[derive(Debug, Clone)]
pub struct NewTemporaryWorker {
    pub name: String,
    pub work_category: Option<String>,
    pub cost_per_hour: Option<f64>,
}

/// The C11 repository port.
///
/// Implementations must be `Send + Sync` to be shared across the async
/// handler pool; all methods are retried at the implementation's own
/// boundary on transient faults (spec §7 `IOError`), so callers only ever
/// see the already-exhausted-retries error.
#[async_trait]
pub trait Repository: Send + Sync {
    // ---- reads consumed by the planning engine / C5-C10 ----

    async fn get_demand_entries(&self, filter: &DemandFilter) -> Result<Vec<DemandEntry>, PlanningError>;

    async fn get_bom_steps_with_deps(&self, bom: &BomReference) -> Result<BomSteps, PlanningError>;

    async fn get_active_workers(&self) -> Result<Vec<Worker>, PlanningError>;

    async fn get_equipment(&self) -> Result<Vec<Equipment>, PlanningError>;

    async fn get_certifications(&self, now: DateTime<Utc>) -> Result<Vec<EquipmentCertification>, PlanningError>;

    async fn get_proficiencies(&self, filter: &ProficiencyFilter) -> Result<Vec<WorkerProficiency>, PlanningError>;

    // ---- reads consumed by replan ----

    async fn get_schedule(&self, schedule_id: ScheduleId) -> Result<PlanningScenario, PlanningError>;

    async fn get_schedule_blocks(&self, schedule_id: ScheduleId) -> Result<Vec<ScheduleBlock>, PlanningError>;

    async fn get_order(&self, demand_entry_id: DemandEntryId) -> Result<DemandEntry, PlanningError>;

    // ---- reads consumed by the RPC surface (§6) ----

    async fn list_runs(&self, filter: &RunFilter) -> Result<Vec<PlanningRun>, PlanningError>;

    async fn get_run(&self, run_id: PlanningRunId) -> Result<Option<PlanningRun>, PlanningError>;

    async fn get_active_run(&self) -> Result<Option<PlanningRun>, PlanningError>;

    async fn get_scenario(&self, scenario_id: PlanningScenarioId) -> Result<Option<PlanningScenario>, PlanningError>;

    async fn list_scenarios_for_run(&self, run_id: PlanningRunId) -> Result<Vec<PlanningScenario>, PlanningError>;

    async fn get_completed_assignments(
        &self,
        worker_id: WorkerId,
        step_id: Option<ProductStepId>,
        since: DateTime<Utc>,
    ) -> Result<Vec<CompletedAssignment>, PlanningError>;

    async fn get_output_history(
        &self,
        schedule_block_id: ScheduleBlockId,
    ) -> Result<Vec<OutputHistorySample>, PlanningError>;

    // ---- writes ----

    async fn create_planning_run(&self, new_run: NewPlanningRun) -> Result<PlanningRun, PlanningError>;

    async fn create_scenario(
        &self,
        run_id: PlanningRunId,
        scenario: NewScenario,
    ) -> Result<PlanningScenario, PlanningError>;

    async fn link_scenario_demand(
        &self,
        scenario_id: PlanningScenarioId,
        demand_ids: &[DemandEntryId],
    ) -> Result<(), PlanningError>;

    /// Accept a scenario as the run's plan; materializes its blocks into
    /// executable plan tasks. Returns the number of tasks created.
    ///
    /// Implementations should refuse (Conflict) if doing so would violate
    /// the invariants of already-accepted plan tasks for the same demand
    /// (spec §5, cross-run ordering).
    async fn accept_scenario_as_plan_tasks(
        &self,
        run_id: PlanningRunId,
        scenario_id: PlanningScenarioId,
    ) -> Result<u32, PlanningError>;

    async fn archive_run(&self, run_id: PlanningRunId) -> Result<(), PlanningError>;

    async fn create_temporary_worker(&self, worker: NewTemporaryWorker) -> Result<Worker, PlanningError>;

    /// Delete the non-completed blocks of `schedule_id` and persist
    /// `accepted_blocks` in their place (spec §4.7 "Commit").
    async fn commit_replan_blocks(
        &self,
        schedule_id: ScheduleId,
        accepted_blocks: Vec<ScheduleBlock>,
    ) -> Result<(), PlanningError>;

    async fn insert_proficiency_adjustment(
        &self,
        adjustment: &ProficiencyAdjustment,
    ) -> Result<(), PlanningError>;

    // ---- append-only ----

    async fn append_output_history(
        &self,
        schedule_block_id: ScheduleBlockId,
        output: u32,
        recorded_at: DateTime<Utc>,
    ) -> Result<(), PlanningError>;

    async fn append_proficiency_history(
        &self,
        entry: ProficiencyHistoryEntry,
    ) -> Result<(), PlanningError>;
}
