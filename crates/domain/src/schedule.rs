//! Planning runs, scenarios, and the schedule blocks they contain (spec §3).

use crate::catalog::{ProductStepId, WorkerId};
use crate::demand::DemandEntryId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub type PlanningRunId = i64;
pub type PlanningScenarioId = i64;
pub type ScheduleId = i64;
/// Identity of a persisted `ScheduleBlock`, assigned on commit; `None` for
/// blocks still in-memory (kernel output, replan drafts).
pub type ScheduleBlockId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Draft,
    Pending,
    Accepted,
    Archived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    MeetDeadlines,
    MinimizeCost,
    Balanced,
    /// Never produced by the strategy layer (C6); arises only from forking
    /// an edited scenario (spec §4.6).
    Custom,
}

impl Strategy {
    /// Tuning table from spec §4.5.
    pub fn config(self) -> StrategyConfig {
        match self {
            Strategy::MeetDeadlines => StrategyConfig {
                allow_overtime: true,
                overtime_limit_hours_per_day: 4,
                priority_weight: 1.5,
            },
            Strategy::MinimizeCost => StrategyConfig {
                allow_overtime: false,
                overtime_limit_hours_per_day: 0,
                priority_weight: 1.0,
            },
            Strategy::Balanced => StrategyConfig {
                allow_overtime: true,
                overtime_limit_hours_per_day: 2,
                priority_weight: 1.2,
            },
            Strategy::Custom => StrategyConfig {
                allow_overtime: true,
                overtime_limit_hours_per_day: 4,
                priority_weight: 1.0,
            },
        }
    }
}

/// The three generated strategies, in the fixed order a run produces them.
pub const GENERATED_STRATEGIES: [Strategy; 3] =
    [Strategy::MeetDeadlines, Strategy::MinimizeCost, Strategy::Balanced];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub allow_overtime: bool,
    pub overtime_limit_hours_per_day: u32,
    pub priority_weight: f64,
}

/// A named, dated attempt to schedule a chosen subset of demand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanningRun {
    pub id: PlanningRunId,
    pub name: String,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub status: RunStatus,
    pub accepted_scenario_id: Option<PlanningScenarioId>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Aggregate metrics for one scenario (spec §3).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ScenarioMetrics {
    pub labor_hours: f64,
    pub overtime_hours: f64,
    pub labor_cost: f64,
    pub equipment_cost: f64,
    pub deadlines_met: u32,
    pub deadlines_missed: u32,
    pub latest_completion_date: Option<NaiveDate>,
}

/// One candidate schedule under a named strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanningScenario {
    pub id: PlanningScenarioId,
    pub run_id: PlanningRunId,
    pub name: String,
    pub strategy: Strategy,
    pub allow_overtime: bool,
    pub overtime_limit_hours_per_day: u32,
    pub metrics: ScenarioMetrics,
    pub blocks: Vec<ScheduleBlock>,
    pub warnings: Vec<String>,
    pub parent_scenario_id: Option<PlanningScenarioId>,
}

/// A single contiguous work assignment (spec §3, the unit of a schedule).
///
/// Invariants (spec §3, §8 invariant 1):
/// - `start_time < end_time`, both within one work-calendar day, both
///   avoiding `[lunch_start, lunch_end)`.
/// - `planned_output = floor((work_minutes) * 60 / time_per_piece_seconds)`
///   where `work_minutes` excludes any lunch overlap.
/// - non-overlapping with every other block the same worker holds.
/// - if the step requires equipment, every worker in `worker_ids` holds a
///   valid certification for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleBlock {
    pub id: Option<ScheduleBlockId>,
    pub demand_entry_id: DemandEntryId,
    pub step_id: ProductStepId,
    pub batch_number: u32,
    pub batch_quantity: u32,
    pub date: NaiveDate,
    /// Minutes since local midnight.
    pub start_minutes: u32,
    pub end_minutes: u32,
    pub planned_output: u32,
    pub worker_ids: Vec<WorkerId>,
    pub assignment_reason: String,
    pub constraint_notes: Vec<String>,
    pub is_overtime: bool,
    pub is_auto_suggested: bool,
}

impl ScheduleBlock {
    pub fn duration_minutes(&self) -> u32 {
        self.end_minutes.saturating_sub(self.start_minutes)
    }
}
