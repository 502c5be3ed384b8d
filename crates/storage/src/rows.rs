//! Row types `sqlx::query_as` decodes into, and the conversions from those
//! rows into the public `planning-domain` types (spec §3). Kept separate
//! from the enum variants the domain crate exposes so `planning-domain`
//! never has to depend on `sqlx`.

use crate::error::StorageError;
use chrono::{DateTime, NaiveDate, Utc};
use planning_domain::{
    BatchingPreferences, BomReference, BuildVersionStatus, CompletedAssignment, DemandEntry, DemandEntryId,
    DemandSource, DemandStatus, DependencyKind, Equipment, EquipmentCertification, EquipmentStatus, OutputHistorySample,
    PlanningRun, PlanningScenario, ProductStep, ProductStepId, ProficiencyAdjustmentReason, RunStatus, ScenarioMetrics,
    ScheduleBlock, StepCategory, StepDependency, Strategy, Worker, WorkerId, WorkerProficiency, WorkerStatus,
};

pub fn step_category_to_db(c: StepCategory) -> &'static str {
    match c {
        StepCategory::Cutting => "cutting",
        StepCategory::Silkscreen => "silkscreen",
        StepCategory::Prep => "prep",
        StepCategory::Sewing => "sewing",
        StepCategory::Inspection => "inspection",
    }
}

pub fn step_category_from_db(s: &str) -> Result<StepCategory, StorageError> {
    match s {
        "cutting" => Ok(StepCategory::Cutting),
        "silkscreen" => Ok(StepCategory::Silkscreen),
        "prep" => Ok(StepCategory::Prep),
        "sewing" => Ok(StepCategory::Sewing),
        "inspection" => Ok(StepCategory::Inspection),
        other => Err(StorageError::Decode(format!("unknown step category '{other}'"))),
    }
}

pub fn dependency_kind_to_db(k: DependencyKind) -> &'static str {
    match k {
        DependencyKind::Start => "start",
        DependencyKind::Finish => "finish",
    }
}

pub fn dependency_kind_from_db(s: &str) -> Result<DependencyKind, StorageError> {
    match s {
        "start" => Ok(DependencyKind::Start),
        "finish" => Ok(DependencyKind::Finish),
        other => Err(StorageError::Decode(format!("unknown dependency kind '{other}'"))),
    }
}

pub fn build_version_status_to_db(s: BuildVersionStatus) -> &'static str {
    match s {
        BuildVersionStatus::Draft => "draft",
        BuildVersionStatus::Active => "active",
        BuildVersionStatus::Deprecated => "deprecated",
    }
}

pub fn equipment_status_to_db(s: EquipmentStatus) -> &'static str {
    match s {
        EquipmentStatus::Available => "available",
        EquipmentStatus::InUse => "in_use",
        EquipmentStatus::Maintenance => "maintenance",
        EquipmentStatus::Retired => "retired",
    }
}

pub fn equipment_status_from_db(s: &str) -> Result<EquipmentStatus, StorageError> {
    match s {
        "available" => Ok(EquipmentStatus::Available),
        "in_use" => Ok(EquipmentStatus::InUse),
        "maintenance" => Ok(EquipmentStatus::Maintenance),
        "retired" => Ok(EquipmentStatus::Retired),
        other => Err(StorageError::Decode(format!("unknown equipment status '{other}'"))),
    }
}

pub fn worker_status_to_db(s: WorkerStatus) -> &'static str {
    match s {
        WorkerStatus::Active => "active",
        WorkerStatus::Inactive => "inactive",
        WorkerStatus::OnLeave => "on_leave",
    }
}

pub fn worker_status_from_db(s: &str) -> Result<WorkerStatus, StorageError> {
    match s {
        "active" => Ok(WorkerStatus::Active),
        "inactive" => Ok(WorkerStatus::Inactive),
        "on_leave" => Ok(WorkerStatus::OnLeave),
        other => Err(StorageError::Decode(format!("unknown worker status '{other}'"))),
    }
}

pub fn demand_source_to_db(s: DemandSource) -> &'static str {
    match s {
        DemandSource::Internal => "internal",
        DemandSource::ExternalSalesOrder => "external_sales_order",
        DemandSource::ExternalWorkOrder => "external_work_order",
    }
}

pub fn demand_source_from_db(s: &str) -> Result<DemandSource, StorageError> {
    match s {
        "internal" => Ok(DemandSource::Internal),
        "external_sales_order" => Ok(DemandSource::ExternalSalesOrder),
        "external_work_order" => Ok(DemandSource::ExternalWorkOrder),
        other => Err(StorageError::Decode(format!("unknown demand source '{other}'"))),
    }
}

pub fn demand_status_to_db(s: DemandStatus) -> &'static str {
    match s {
        DemandStatus::Pending => "pending",
        DemandStatus::Planned => "planned",
        DemandStatus::InProgress => "in_progress",
        DemandStatus::Completed => "completed",
    }
}

pub fn demand_status_from_db(s: &str) -> Result<DemandStatus, StorageError> {
    match s {
        "pending" => Ok(DemandStatus::Pending),
        "planned" => Ok(DemandStatus::Planned),
        "in_progress" => Ok(DemandStatus::InProgress),
        "completed" => Ok(DemandStatus::Completed),
        other => Err(StorageError::Decode(format!("unknown demand status '{other}'"))),
    }
}

pub fn run_status_to_db(s: RunStatus) -> &'static str {
    match s {
        RunStatus::Draft => "draft",
        RunStatus::Pending => "pending",
        RunStatus::Accepted => "accepted",
        RunStatus::Archived => "archived",
    }
}

pub fn run_status_from_db(s: &str) -> Result<RunStatus, StorageError> {
    match s {
        "draft" => Ok(RunStatus::Draft),
        "pending" => Ok(RunStatus::Pending),
        "accepted" => Ok(RunStatus::Accepted),
        "archived" => Ok(RunStatus::Archived),
        other => Err(StorageError::Decode(format!("unknown run status '{other}'"))),
    }
}

pub fn proficiency_adjustment_reason_to_db(r: ProficiencyAdjustmentReason) -> &'static str {
    match r {
        ProficiencyAdjustmentReason::Manual => "manual",
        ProficiencyAdjustmentReason::AutoIncrease => "auto_increase",
        ProficiencyAdjustmentReason::AutoDecrease => "auto_decrease",
    }
}

pub fn proficiency_adjustment_reason_from_db(s: &str) -> Result<ProficiencyAdjustmentReason, StorageError> {
    match s {
        "manual" => Ok(ProficiencyAdjustmentReason::Manual),
        "auto_increase" => Ok(ProficiencyAdjustmentReason::AutoIncrease),
        "auto_decrease" => Ok(ProficiencyAdjustmentReason::AutoDecrease),
        other => Err(StorageError::Decode(format!("unknown proficiency adjustment reason '{other}'"))),
    }
}

pub fn strategy_to_db(s: Strategy) -> &'static str {
    match s {
        Strategy::MeetDeadlines => "meet_deadlines",
        Strategy::MinimizeCost => "minimize_cost",
        Strategy::Balanced => "balanced",
        Strategy::Custom => "custom",
    }
}

pub fn strategy_from_db(s: &str) -> Result<Strategy, StorageError> {
    match s {
        "meet_deadlines" => Ok(Strategy::MeetDeadlines),
        "minimize_cost" => Ok(Strategy::MinimizeCost),
        "balanced" => Ok(Strategy::Balanced),
        "custom" => Ok(Strategy::Custom),
        other => Err(StorageError::Decode(format!("unknown strategy '{other}'"))),
    }
}

#[derive(sqlx::FromRow)]
pub struct ProductStepRow {
    pub id: ProductStepId,
    pub product_id: i64,
    pub name: String,
    pub step_code: String,
    pub category: String,
    pub time_per_piece_seconds: i32,
    pub sequence: i32,
    pub equipment_id: Option<i64>,
    pub work_category: Option<String>,
}

impl ProductStepRow {
    pub fn into_domain(self) -> Result<ProductStep, StorageError> {
        Ok(ProductStep {
            id: self.id,
            product_id: self.product_id,
            name: self.name,
            step_code: self.step_code,
            category: step_category_from_db(&self.category)?,
            time_per_piece_seconds: self.time_per_piece_seconds as u32,
            sequence: self.sequence as u32,
            equipment_id: self.equipment_id,
            work_category: self.work_category,
        })
    }
}

#[derive(sqlx::FromRow)]
pub struct StepDependencyRow {
    pub step_id: ProductStepId,
    pub depends_on_step_id: ProductStepId,
    pub kind: String,
}

impl StepDependencyRow {
    pub fn into_domain(self) -> Result<StepDependency, StorageError> {
        Ok(StepDependency {
            step_id: self.step_id,
            depends_on_step_id: self.depends_on_step_id,
            kind: dependency_kind_from_db(&self.kind)?,
        })
    }
}

#[derive(sqlx::FromRow)]
pub struct WorkerRow {
    pub id: WorkerId,
    pub name: String,
    pub employee_id: Option<String>,
    pub status: String,
    pub work_category: Option<String>,
    pub cost_per_hour: Option<f64>,
}

impl WorkerRow {
    pub fn into_domain(self) -> Result<Worker, StorageError> {
        Ok(Worker {
            id: self.id,
            name: self.name,
            employee_id: self.employee_id,
            status: worker_status_from_db(&self.status)?,
            work_category: self.work_category,
            cost_per_hour: self.cost_per_hour,
        })
    }
}

#[derive(sqlx::FromRow)]
pub struct EquipmentRow {
    pub id: i64,
    pub name: String,
    pub status: String,
    pub station_count: Option<i32>,
    pub hourly_cost: Option<f64>,
}

impl EquipmentRow {
    pub fn into_domain(self) -> Result<Equipment, StorageError> {
        Ok(Equipment {
            id: self.id,
            name: self.name,
            status: equipment_status_from_db(&self.status)?,
            station_count: self.station_count.map(|n| n as u32),
            hourly_cost: self.hourly_cost,
        })
    }
}

#[derive(sqlx::FromRow)]
pub struct EquipmentCertificationRow {
    pub worker_id: WorkerId,
    pub equipment_id: i64,
    pub certified_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<EquipmentCertificationRow> for EquipmentCertification {
    fn from(row: EquipmentCertificationRow) -> Self {
        EquipmentCertification {
            worker_id: row.worker_id,
            equipment_id: row.equipment_id,
            certified_at: row.certified_at,
            expires_at: row.expires_at,
        }
    }
}

#[derive(sqlx::FromRow)]
pub struct WorkerProficiencyRow {
    pub worker_id: WorkerId,
    pub step_id: ProductStepId,
    pub level: i16,
}

impl From<WorkerProficiencyRow> for WorkerProficiency {
    fn from(row: WorkerProficiencyRow) -> Self {
        WorkerProficiency {
            worker_id: row.worker_id,
            step_id: row.step_id,
            level: row.level as u8,
        }
    }
}

#[derive(sqlx::FromRow)]
pub struct DemandEntryRow {
    pub id: DemandEntryId,
    pub source: String,
    pub quantity: i32,
    pub due_date: NaiveDate,
    pub customer_name: Option<String>,
    pub priority: i16,
    pub status: String,
    pub build_version_id: Option<i64>,
    pub product_id: Option<i64>,
    pub min_batch_size: Option<i32>,
    pub max_batch_size: Option<i32>,
}

impl DemandEntryRow {
    pub fn into_domain(self) -> Result<DemandEntry, StorageError> {
        let bom = match (self.build_version_id, self.product_id) {
            (Some(build_version_id), _) => BomReference::BuildVersion(build_version_id),
            (None, Some(product_id)) => BomReference::ProductDefault(product_id),
            (None, None) => {
                return Err(StorageError::Decode(format!(
                    "demand entry {} has neither a build version nor a product reference",
                    self.id
                )))
            }
        };

        Ok(DemandEntry {
            id: self.id,
            source: demand_source_from_db(&self.source)?,
            quantity: self.quantity as u32,
            due_date: self.due_date,
            customer_name: self.customer_name,
            priority: self.priority as u8,
            status: demand_status_from_db(&self.status)?,
            bom,
            batching: BatchingPreferences {
                min_batch_size: self.min_batch_size.map(|n| n as u32),
                max_batch_size: self.max_batch_size.map(|n| n as u32),
            },
        })
    }
}

#[derive(sqlx::FromRow)]
pub struct PlanningRunRow {
    pub id: i64,
    pub name: String,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub status: String,
    pub accepted_scenario_id: Option<i64>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PlanningRunRow {
    pub fn into_domain(self) -> Result<PlanningRun, StorageError> {
        Ok(PlanningRun {
            id: self.id,
            name: self.name,
            window_start: self.window_start,
            window_end: self.window_end,
            status: run_status_from_db(&self.status)?,
            accepted_scenario_id: self.accepted_scenario_id,
            created_by: self.created_by,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub struct PlanningScenarioRow {
    pub id: i64,
    pub run_id: i64,
    pub name: String,
    pub strategy: String,
    pub allow_overtime: bool,
    pub overtime_limit_hours_per_day: i32,
    pub labor_hours: f64,
    pub overtime_hours: f64,
    pub labor_cost: f64,
    pub equipment_cost: f64,
    pub deadlines_met: i32,
    pub deadlines_missed: i32,
    pub latest_completion_date: Option<NaiveDate>,
    pub warnings: serde_json::Value,
    pub parent_scenario_id: Option<i64>,
}

impl PlanningScenarioRow {
    /// `blocks` is read separately (schedule_blocks keyed by scenario_id) and folded in by the caller.
    pub fn into_domain(self, blocks: Vec<ScheduleBlock>) -> Result<PlanningScenario, StorageError> {
        let warnings: Vec<String> = serde_json::from_value(self.warnings)
            .map_err(|e| StorageError::Decode(format!("scenario warnings: {e}")))?;

        Ok(PlanningScenario {
            id: self.id,
            run_id: self.run_id,
            name: self.name,
            strategy: strategy_from_db(&self.strategy)?,
            allow_overtime: self.allow_overtime,
            overtime_limit_hours_per_day: self.overtime_limit_hours_per_day as u32,
            metrics: ScenarioMetrics {
                labor_hours: self.labor_hours,
                overtime_hours: self.overtime_hours,
                labor_cost: self.labor_cost,
                equipment_cost: self.equipment_cost,
                deadlines_met: self.deadlines_met as u32,
                deadlines_missed: self.deadlines_missed as u32,
                latest_completion_date: self.latest_completion_date,
            },
            blocks,
            warnings,
            parent_scenario_id: self.parent_scenario_id,
        })
    }
}

#[derive(sqlx::FromRow)]
pub struct ScheduleBlockRow {
    pub id: i64,
    pub demand_entry_id: DemandEntryId,
    pub step_id: ProductStepId,
    pub batch_number: i32,
    pub batch_quantity: i32,
    pub date: NaiveDate,
    pub start_minutes: i32,
    pub end_minutes: i32,
    pub planned_output: i32,
    pub worker_ids: Vec<i64>,
    pub assignment_reason: String,
    pub constraint_notes: serde_json::Value,
    pub is_overtime: bool,
    pub is_auto_suggested: bool,
}

impl ScheduleBlockRow {
    pub fn into_domain(self) -> Result<ScheduleBlock, StorageError> {
        let constraint_notes: Vec<String> = serde_json::from_value(self.constraint_notes)
            .map_err(|e| StorageError::Decode(format!("schedule block constraint notes: {e}")))?;

        Ok(ScheduleBlock {
            id: Some(self.id),
            demand_entry_id: self.demand_entry_id,
            step_id: self.step_id,
            batch_number: self.batch_number as u32,
            batch_quantity: self.batch_quantity as u32,
            date: self.date,
            start_minutes: self.start_minutes as u32,
            end_minutes: self.end_minutes as u32,
            planned_output: self.planned_output as u32,
            worker_ids: self.worker_ids,
            assignment_reason: self.assignment_reason,
            constraint_notes,
            is_overtime: self.is_overtime,
            is_auto_suggested: self.is_auto_suggested,
        })
    }
}

#[derive(sqlx::FromRow)]
pub struct CompletedAssignmentRow {
    pub worker_id: WorkerId,
    pub step_id: ProductStepId,
    pub time_per_piece_seconds: i32,
    pub actual_output: i32,
    pub actual_seconds: i32,
    pub completed_at: DateTime<Utc>,
}

impl From<CompletedAssignmentRow> for CompletedAssignment {
    fn from(row: CompletedAssignmentRow) -> Self {
        CompletedAssignment {
            worker_id: row.worker_id,
            step_id: row.step_id,
            time_per_piece_seconds: row.time_per_piece_seconds as u32,
            actual_output: row.actual_output as u32,
            actual_seconds: row.actual_seconds as u32,
            completed_at: row.completed_at,
        }
    }
}

#[derive(sqlx::FromRow)]
pub struct OutputHistoryRow {
    pub output: i32,
    pub recorded_at: DateTime<Utc>,
}

impl From<OutputHistoryRow> for OutputHistorySample {
    fn from(row: OutputHistoryRow) -> Self {
        OutputHistorySample {
            output: row.output as u32,
            recorded_at: row.recorded_at,
        }
    }
}
