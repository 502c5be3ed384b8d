//! Worker proficiency (spec §3, §4.9).

use crate::catalog::{ProductStepId, WorkerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 1..5; default when absent is 3 (spec §3).
pub type ProficiencyLevel = u8;

pub const DEFAULT_PROFICIENCY_LEVEL: ProficiencyLevel = 3;

/// Time multiplier applied when scheduling against a worker's level
/// (spec §3). Levels outside 1..=5 are clamped to the nearest bound.
pub fn level_multiplier(level: ProficiencyLevel) -> f64 {
    match level {
        1 => 1.5,
        2 => 1.25,
        3 => 1.0,
        4 => 0.85,
        _ => 0.7,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerProficiency {
    pub worker_id: WorkerId,
    pub step_id: ProductStepId,
    pub level: ProficiencyLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProficiencyAdjustmentReason {
    Manual,
    AutoIncrease,
    AutoDecrease,
}

/// Machine-readable trigger data recorded alongside an automatic
/// adjustment (spec §3, §4.9).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProficiencyTrigger {
    pub avg_efficiency_pct: f64,
    pub sample_size: u32,
}

/// Append-only log entry of a level transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProficiencyHistoryEntry {
    pub worker_id: WorkerId,
    pub step_id: ProductStepId,
    pub previous_level: ProficiencyLevel,
    pub new_level: ProficiencyLevel,
    pub reason: ProficiencyAdjustmentReason,
    pub trigger: Option<ProficiencyTrigger>,
    pub recorded_at: DateTime<Utc>,
}

/// A proposed (not yet applied) proficiency change (spec §4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProficiencyAdjustment {
    pub worker_id: WorkerId,
    pub step_id: ProductStepId,
    pub previous_level: ProficiencyLevel,
    pub new_level: ProficiencyLevel,
    pub reason: ProficiencyAdjustmentReason,
    pub trigger: ProficiencyTrigger,
}

/// One completed assignment block, as consulted by the proficiency engine
/// and the output-history trend analysis (spec §4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedAssignment {
    pub worker_id: WorkerId,
    pub step_id: ProductStepId,
    pub time_per_piece_seconds: u32,
    pub actual_output: u32,
    pub actual_seconds: u32,
    pub completed_at: DateTime<Utc>,
}

impl CompletedAssignment {
    /// `efficiency_pct = (planned_time / actual_time) * 100` (spec §4.9).
    /// Returns `None` when `actual_seconds` is zero (no meaningful rate).
    pub fn efficiency_pct(&self) -> Option<f64> {
        if self.actual_seconds == 0 {
            return None;
        }
        let planned_time = self.actual_output as f64 * self.time_per_piece_seconds as f64;
        Some(planned_time / self.actual_seconds as f64 * 100.0)
    }
}

/// A single sample in an assignment's append-only output-history stream
/// (spec §3, §4.9).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OutputHistorySample {
    pub output: u32,
    pub recorded_at: DateTime<Utc>,
}

/// Stage-by-stage speedup metrics derived from an output-history stream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutputTrend {
    pub begin_seconds_per_unit: f64,
    pub middle_seconds_per_unit: f64,
    pub end_seconds_per_unit: f64,
    pub speedup_pct: f64,
}
