//! C7 — replan: folds an existing schedule's already-elapsed or
//! already-completed work back into a fresh kernel run instead of starting
//! from zero (spec §4.7).
//!
//! History cannot be rewritten: any block dated before `as_of`, or any
//! block explicitly marked completed, is always locked verbatim regardless
//! of policy. `ReplanPolicy` only decides the fate of blocks that are in
//! the future and not yet completed.

use crate::cancellation::CancellationToken;
use crate::kernel::{run_kernel_with_seed, BatchSeed, BomSteps, DemandProjection, ScenarioInput, ScenarioOutput};
use crate::WorkCalendar;
use chrono::{DateTime, NaiveDate, Utc};
use planning_domain::{
    DemandEntry, DemandEntryId, EquipmentCertification, PlanningError, ProductStepId, ScheduleBlock, ScheduleBlockId,
    StrategyConfig, Worker,
};
use std::collections::{HashMap, HashSet};

/// How to treat a block that is scheduled in the future and not yet
/// completed (spec §4.7 "Commit" vs "draft" semantics).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplanPolicy {
    /// Keep already-scheduled future work exactly as it stands; only newly
    /// added or previously-unscheduled work is placed by the kernel.
    PreserveFutureWork,
    /// Release all non-completed work back to the kernel and let it derive
    /// a fresh schedule for it, subject to the same worker-day-book
    /// capacity the locked (historical/completed) blocks already consume.
    RescheduleAll,
}

pub struct ReplanInput<'a> {
    pub as_of: NaiveDate,
    pub existing_blocks: Vec<ScheduleBlock>,
    pub completed_block_ids: HashSet<ScheduleBlockId>,
    pub policy: ReplanPolicy,
    pub planning_window: (NaiveDate, NaiveDate),
    pub demand_entries: Vec<DemandEntry>,
    pub bom_steps_by_demand: HashMap<DemandEntryId, BomSteps>,
    pub workers: &'a [Worker],
    pub certifications: &'a [EquipmentCertification],
    pub certification_reference_time: DateTime<Utc>,
    pub calendar: &'a WorkCalendar,
    pub strategy: StrategyConfig,
}

fn is_locked(block: &ScheduleBlock, as_of: NaiveDate, completed_block_ids: &HashSet<ScheduleBlockId>, policy: ReplanPolicy) -> bool {
    let completed = block.id.is_some_and(|id| completed_block_ids.contains(&id));
    let in_the_past = block.date < as_of;
    completed || in_the_past || policy == ReplanPolicy::PreserveFutureWork
}

/// Run the kernel with the existing schedule's locked work seeded in, per
/// the rules above. Returns the same shape as a fresh `run_kernel` call: a
/// complete `ScenarioOutput` (locked blocks included) ready to present as a
/// replan draft for the caller to accept or discard (spec §4.7).
pub fn replan(input: ReplanInput<'_>, cancellation: &dyn CancellationToken) -> Result<ScenarioOutput, PlanningError> {
    let mut locked_blocks = Vec::new();
    let mut seeds_by_demand: HashMap<DemandEntryId, HashMap<(ProductStepId, u32), BatchSeed>> = HashMap::new();

    for block in &input.existing_blocks {
        if is_locked(block, input.as_of, &input.completed_block_ids, input.policy) {
            locked_blocks.push(block.clone());
            let completed = block.id.is_some_and(|id| input.completed_block_ids.contains(&id));
            let seed = seeds_by_demand
                .entry(block.demand_entry_id)
                .or_default()
                .entry((block.step_id, block.batch_number))
                .or_insert_with(|| BatchSeed {
                    minutes_already_done: 0,
                    started_at: None,
                    completed_at: None,
                });
            seed.minutes_already_done += block.duration_minutes();
            let moment_start = (block.date, block.start_minutes);
            let moment_end = (block.date, block.end_minutes);
            seed.started_at = Some(match seed.started_at {
                Some(current) if current <= moment_start => current,
                _ => moment_start,
            });
            if completed {
                seed.completed_at = Some(match seed.completed_at {
                    Some(current) if current >= moment_end => current,
                    _ => moment_end,
                });
            }
        }
        // Released (non-locked) blocks need no bookkeeping: their capacity
        // is simply not seeded into the worker-day book, and the pending
        // work they used to cover falls out of `demand.quantity` minus the
        // locked seeds above, recomputed fresh by the kernel.
    }

    let scenario_input = ScenarioInput {
        planning_window: input.planning_window,
        demand_entries: input.demand_entries,
        bom_steps_by_demand: input.bom_steps_by_demand,
        workers: input.workers,
        certifications: input.certifications,
        certification_reference_time: input.certification_reference_time,
        calendar: input.calendar,
        strategy: input.strategy,
    };

    run_kernel_with_seed(&scenario_input, &seeds_by_demand, locked_blocks, cancellation)
}

/// Convenience re-export so callers that only care about per-demand
/// outcomes don't need to reach into `ScenarioOutput` themselves.
pub fn projections(output: &ScenarioOutput) -> &[DemandProjection] {
    &output.demand_projections
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::WorkCalendar;
    use crate::cancellation::NeverCancelled;
    use chrono::TimeZone;
    use planning_domain::{
        BatchingPreferences, BomReference, DemandSource, DemandStatus, ProductStep, StepCategory, WorkerStatus,
    };

    fn worker(id: i64) -> Worker {
        Worker {
            id,
            name: format!("Worker {id}"),
            employee_id: None,
            status: WorkerStatus::Active,
            work_category: None,
            cost_per_hour: Some(15.0),
        }
    }

    fn step() -> ProductStep {
        ProductStep {
            id: 1,
            product_id: 1,
            name: "Cut".to_string(),
            step_code: "S1".to_string(),
            category: StepCategory::Cutting,
            time_per_piece_seconds: 60,
            sequence: 1,
            equipment_id: None,
            work_category: None,
        }
    }

    #[test]
    fn completed_blocks_are_always_locked_and_reduce_remaining_work() {
        let calendar = WorkCalendar::default();
        let workers = vec![worker(1)];
        let window_start = NaiveDate::from_ymd_opt(2026, 7, 27).unwrap();
        let window_end = NaiveDate::from_ymd_opt(2026, 8, 10).unwrap();

        let demand = DemandEntry {
            id: 1,
            source: DemandSource::Internal,
            quantity: 20,
            due_date: window_end,
            customer_name: None,
            priority: 1,
            status: DemandStatus::InProgress,
            bom: BomReference::ProductDefault(1),
            batching: BatchingPreferences::none(),
        };
        let mut boms = HashMap::new();
        boms.insert(
            1,
            BomSteps {
                steps: vec![step()],
                dependencies: vec![],
            },
        );

        let existing_block = ScheduleBlock {
            id: Some(100),
            demand_entry_id: 1,
            step_id: 1,
            batch_number: 1,
            batch_quantity: 20,
            date: window_start,
            start_minutes: calendar.morning_start_minutes,
            end_minutes: calendar.morning_start_minutes + 10,
            planned_output: 10,
            worker_ids: vec![1],
            assignment_reason: "earlier run".to_string(),
            constraint_notes: vec![],
            is_overtime: false,
            is_auto_suggested: false,
        };
        let mut completed = HashSet::new();
        completed.insert(100);

        let replan_input = ReplanInput {
            as_of: window_start,
            existing_blocks: vec![existing_block.clone()],
            completed_block_ids: completed,
            policy: ReplanPolicy::PreserveFutureWork,
            planning_window: (window_start, window_end),
            demand_entries: vec![demand],
            bom_steps_by_demand: boms,
            workers: &workers,
            certifications: &[],
            certification_reference_time: Utc.with_ymd_and_hms(2026, 7, 27, 0, 0, 0).unwrap(),
            calendar: &calendar,
            strategy: planning_domain::Strategy::Balanced.config(),
        };

        let output = replan(replan_input, &NeverCancelled).unwrap();
        let total_output: u32 = output.blocks.iter().filter(|b| b.step_id == 1).map(|b| b.planned_output).sum();
        assert_eq!(total_output, 20);
        assert!(output.blocks.iter().any(|b| b.id == Some(100)));
    }
}
