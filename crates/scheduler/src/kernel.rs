//! C5 — the scheduling kernel (spec §4.5): the ready-set loop that turns a
//! sorted demand list and a BOM's dependency graph into `ScheduleBlock`s on
//! a shared `WorkerDayBook`.
//!
//! Pure and synchronous: no I/O, no wall-clock reads, no randomness. Every
//! input the loop needs — workers, equipment, certifications, the `now`
//! used to check certification validity — is supplied up front by the
//! caller (`crates/api`'s `PlanningEngine`), which is the only place that
//! talks to the `Repository` (spec §5).

use crate::cancellation::CancellationToken;
use crate::dependency_tracker::{decompose_into_batches, BatchKey, CalendarMoment, DependencyTracker};
use crate::qualified_worker::qualified_workers;
use crate::worker_day_book::WorkerDayBook;
use crate::WorkCalendar;
use chrono::{DateTime, NaiveDate, Utc};
use planning_domain::{
    DemandEntry, DemandEntryId, EquipmentCertification, PlanningError, ProductStep, ScenarioMetrics,
    ScheduleBlock, StepDependency, Strategy, StrategyConfig, Worker,
};
use std::collections::HashMap;

/// A BOM's steps and dependency edges for one demand entry. The kernel
/// never resolves a `BomReference` itself (spec §4.11) — the caller reads
/// the BOM once per demand and hands it over already resolved.
#[derive(Debug, Clone, Default)]
pub struct BomSteps {
    pub steps: Vec<ProductStep>,
    pub dependencies: Vec<StepDependency>,
}

/// Everything one kernel run needs, read once up front (spec §5's
/// snapshot-isolation requirement).
pub struct ScenarioInput<'a> {
    pub planning_window: (NaiveDate, NaiveDate),
    /// Already sorted or not; the kernel sorts its own working copy.
    pub demand_entries: Vec<DemandEntry>,
    pub bom_steps_by_demand: HashMap<DemandEntryId, BomSteps>,
    pub workers: &'a [Worker],
    pub certifications: &'a [EquipmentCertification],
    /// Fixed instant used for every certification-validity check this run;
    /// never `Utc::now()` queried from inside the kernel.
    pub certification_reference_time: DateTime<Utc>,
    pub calendar: &'a WorkCalendar,
    pub strategy: StrategyConfig,
}

#[derive(Debug, Clone)]
pub struct DemandProjection {
    pub demand_entry_id: DemandEntryId,
    pub projected_completion_date: Option<NaiveDate>,
    pub can_meet_target: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ScenarioOutput {
    pub blocks: Vec<ScheduleBlock>,
    pub metrics: ScenarioMetrics,
    pub warnings: Vec<String>,
    pub demand_projections: Vec<DemandProjection>,
}

/// Per-demand, per-batch ready-set loop bound (spec §4.5): a scenario with
/// more iterations than this aborts that demand with a "may be incomplete"
/// warning rather than spinning forever.
const MAX_ITERATIONS_PER_DEMAND: u32 = 10_000;

/// How far past `scan_from` the kernel searches for an open slot before
/// giving up on a ready item for this iteration (spec §4.5).
const LOOKAHEAD_DAYS: i64 = 60;

struct PendingItem {
    step: ProductStep,
    batch_number: u32,
    batch_quantity: u32,
    remaining_minutes: u32,
}

/// Already-known progress on one `(step, batch)` of a demand, used by
/// replan (C7) to fold previously-committed or already-completed work back
/// into a fresh kernel run instead of re-deriving it from zero (spec §4.7).
#[derive(Debug, Clone)]
pub struct BatchSeed {
    pub minutes_already_done: u32,
    pub started_at: Option<CalendarMoment>,
    pub completed_at: Option<CalendarMoment>,
}

/// Run the kernel for one scenario. Returns `Err(PlanningError::Precondition)`
/// if the upfront BOM validation fails, or `Err(PlanningError::Infeasible)`
/// if the stuck-check fires (a circular dependency) — both abort the whole
/// scenario; no partial `ScenarioOutput` is produced in either case (spec
/// §4.5, §7).
pub fn run_kernel(input: &ScenarioInput<'_>, cancellation: &dyn CancellationToken) -> Result<ScenarioOutput, PlanningError> {
    run_kernel_with_seed(input, &HashMap::new(), Vec::new(), cancellation)
}

/// As `run_kernel`, but the worker-day book and each demand's batch state
/// are pre-seeded from `locked_blocks` (kept verbatim in the output) and
/// `seeds_by_demand` (partial progress folded into the corresponding
/// pending item before the ready-set loop starts). Used by replan (C7);
/// `run_kernel` is the degenerate case with nothing to seed.
pub fn run_kernel_with_seed(
    input: &ScenarioInput<'_>,
    seeds_by_demand: &HashMap<DemandEntryId, HashMap<BatchKey, BatchSeed>>,
    locked_blocks: Vec<ScheduleBlock>,
    cancellation: &dyn CancellationToken,
) -> Result<ScenarioOutput, PlanningError> {
    validate_boms(input)?;

    let mut demands = input.demand_entries.clone();
    demands.sort_by(|a, b| demand_sort_key(a).cmp(&demand_sort_key(b)));

    let mut book = WorkerDayBook::new();
    for locked in &locked_blocks {
        for &worker_id in &locked.worker_ids {
            book.seed_slot(input.calendar, worker_id, locked.date, locked.start_minutes, locked.end_minutes);
        }
    }

    let mut blocks = locked_blocks;
    let mut warnings = Vec::new();
    let mut metrics = ScenarioMetrics::default();
    let mut projections = Vec::new();
    let empty_seed = HashMap::new();

    for demand in &demands {
        if cancellation.is_cancelled() {
            warnings.push("scenario generation cancelled".to_string());
            break;
        }

        let bom = input.bom_steps_by_demand.get(&demand.id).cloned().unwrap_or_default();
        let seed = seeds_by_demand.get(&demand.id).unwrap_or(&empty_seed);
        let projection = schedule_demand(input, demand, &bom, seed, &mut book, &mut blocks, &mut warnings, &mut metrics, cancellation)?;
        projections.push(projection);
    }

    metrics.deadlines_met = projections.iter().filter(|p| p.can_meet_target).count() as u32;
    metrics.deadlines_missed = projections.iter().filter(|p| !p.can_meet_target).count() as u32;
    metrics.latest_completion_date = projections.iter().filter_map(|p| p.projected_completion_date).max();

    Ok(ScenarioOutput {
        blocks,
        metrics,
        warnings,
        demand_projections: projections,
    })
}

/// Spec §4.5 step 1: every demand must resolve to at least one BOM step;
/// a multi-step BOM must declare at least one dependency. Fails the whole
/// run fast rather than per-demand (spec §7 `Precondition`).
fn validate_boms(input: &ScenarioInput<'_>) -> Result<(), PlanningError> {
    for demand in &input.demand_entries {
        let bom = input.bom_steps_by_demand.get(&demand.id);
        let Some(bom) = bom else {
            return Err(PlanningError::Precondition(format!(
                "demand {} has no resolvable BOM steps",
                demand.id
            )));
        };
        if bom.steps.is_empty() {
            return Err(PlanningError::Precondition(format!(
                "demand {} references a BOM with no steps",
                demand.id
            )));
        }
        if bom.steps.len() >= 2 && bom.dependencies.is_empty() {
            return Err(PlanningError::Precondition(format!(
                "demand {} references a multi-step BOM with no declared dependencies",
                demand.id
            )));
        }
    }
    Ok(())
}

/// `(urgency desc, due_date asc, demand id asc)`. Priority `1` is the most
/// urgent (spec §3), so urgency is `(6 - priority) * priority_weight`;
/// negated so the tuple sorts ascending for "most urgent first".
fn demand_sort_key(demand: &DemandEntry) -> (i64, NaiveDate, DemandEntryId) {
    let urgency = (6 - demand.priority as i64) as f64;
    let score = urgency * 1000.0; // integer-stable ordering key, priority_weight is uniform within one scenario
    (-(score as i64), demand.due_date, demand.id)
}

#[allow(clippy::too_many_arguments)]
fn schedule_demand(
    input: &ScenarioInput<'_>,
    demand: &DemandEntry,
    bom: &BomSteps,
    seed: &HashMap<BatchKey, BatchSeed>,
    book: &mut WorkerDayBook,
    blocks: &mut Vec<ScheduleBlock>,
    warnings: &mut Vec<String>,
    metrics: &mut ScenarioMetrics,
    cancellation: &dyn CancellationToken,
) -> Result<DemandProjection, PlanningError> {
    let batch_sizes = decompose_into_batches(demand.quantity, demand.batching.min_batch_size, demand.batching.max_batch_size);

    let mut tracker = DependencyTracker::new();
    let mut pending: Vec<PendingItem> = Vec::new();
    for (batch_idx, &batch_quantity) in batch_sizes.iter().enumerate() {
        let batch_number = (batch_idx + 1) as u32;
        for step in &bom.steps {
            let key: BatchKey = (step.id, batch_number);
            let full_minutes = work_minutes_for(step, batch_quantity);
            let remaining_minutes = match seed.get(&key) {
                Some(s) if s.completed_at.is_some() => 0,
                Some(s) => full_minutes.saturating_sub(s.minutes_already_done),
                None => full_minutes,
            };
            if let Some(s) = seed.get(&key) {
                if let Some(at) = s.started_at {
                    tracker.mark_started(key, at);
                }
                if let Some(at) = s.completed_at {
                    tracker.mark_completed(key, at);
                }
            }
            pending.push(PendingItem {
                step: step.clone(),
                batch_number,
                batch_quantity,
                remaining_minutes,
            });
        }
    }

    let mut blocks_emitted_for_demand = blocks.iter().any(|b| b.demand_entry_id == demand.id);
    let mut iterations = 0u32;

    while pending.iter().any(|p| p.remaining_minutes > 0) {
        if cancellation.is_cancelled() {
            warnings.push(format!("demand {}: scheduling cancelled before completion", demand.id));
            break;
        }
        iterations += 1;
        if iterations > MAX_ITERATIONS_PER_DEMAND {
            warnings.push(format!(
                "demand {}: schedule may be incomplete (iteration limit reached)",
                demand.id
            ));
            break;
        }

        let mut ready_indices: Vec<usize> = pending
            .iter()
            .enumerate()
            .filter(|(_, item)| item.remaining_minutes > 0)
            .filter(|(_, item)| item_is_ready(&tracker, item, &bom.dependencies))
            .map(|(idx, _)| idx)
            .collect();

        if ready_indices.is_empty() {
            return Err(PlanningError::Infeasible(format!(
                "demand {}: no item became ready; the BOM's dependency graph is cyclic",
                demand.id
            )));
        }

        ready_indices.sort_by_key(|&idx| {
            let item = &pending[idx];
            (item.step.sequence, item.batch_number, item.step.id)
        });

        for idx in ready_indices {
            if pending[idx].remaining_minutes == 0 {
                continue;
            }
            let step = pending[idx].step.clone();
            let batch_number = pending[idx].batch_number;
            let batch_quantity = pending[idx].batch_quantity;
            let key: BatchKey = (step.id, batch_number);

            let candidates = qualified_workers(&step, input.workers, input.certifications, input.certification_reference_time);
            if candidates.is_empty() {
                warnings.push(format!(
                    "demand {}: no qualified worker for step '{}' batch {}; dropped",
                    demand.id, step.name, batch_number
                ));
                pending[idx].remaining_minutes = 0;
                let at = earliest_moment(input.planning_window.0);
                tracker.mark_started(key, at);
                tracker.mark_completed(key, at);
                continue;
            }

            let earliest = tracker.earliest_start(step.id, batch_number, &bom.dependencies);
            let earliest_date = earliest.map(|(d, _)| d).unwrap_or(input.planning_window.0).max(input.planning_window.0);

            let Some((worker_id, slot_date, slot_start, slot_end)) =
                find_next_available_slot(input, book, &candidates, earliest_date, earliest.map(|(_, m)| m))
            else {
                // No free slot within the lookahead window right now; try again
                // next iteration, once other commits may have freed capacity.
                continue;
            };

            let minutes_available = slot_end - slot_start;
            let work_minutes = pending[idx].remaining_minutes.min(minutes_available);
            let commit_end = slot_start + work_minutes;

            book.commit_slot(input.calendar, worker_id, slot_date, slot_start, commit_end);

            let planned_output = (work_minutes as u64 * 60 / step.time_per_piece_seconds.max(1) as u64) as u32;
            let is_overtime = slot_start >= input.calendar.afternoon_end_minutes;

            let mut constraint_notes = Vec::new();
            if step.requires_equipment() {
                constraint_notes.push("requires certified equipment".to_string());
            }
            if batch_number > 1 {
                constraint_notes.push(format!("batch {} follows batch {}", batch_number, batch_number - 1));
            }
            if !bom.dependencies.is_empty() && bom.dependencies.iter().any(|d| d.step_id == step.id) {
                constraint_notes.push("waits on upstream step dependency".to_string());
            }
            let assignment_reason = if candidates.len() == 1 {
                format!("only qualified worker for '{}'", step.name)
            } else {
                format!("earliest available qualified worker for '{}'", step.name)
            };

            blocks.push(ScheduleBlock {
                id: None,
                demand_entry_id: demand.id,
                step_id: step.id,
                batch_number,
                batch_quantity,
                date: slot_date,
                start_minutes: slot_start,
                end_minutes: commit_end,
                planned_output,
                worker_ids: vec![worker_id],
                assignment_reason,
                constraint_notes,
                is_overtime,
                is_auto_suggested: false,
            });
            blocks_emitted_for_demand = true;

            accrue_metrics(metrics, input, worker_id, work_minutes, is_overtime);

            if !tracker.state(key).started {
                tracker.mark_started(key, (slot_date, slot_start));
            }
            pending[idx].remaining_minutes -= work_minutes;
            if pending[idx].remaining_minutes == 0 {
                tracker.mark_completed(key, (slot_date, commit_end));
            }
        }
    }

    let projected_completion_date = blocks
        .iter()
        .filter(|b| b.demand_entry_id == demand.id)
        .map(|b| b.date)
        .max();
    let can_meet_target = blocks_emitted_for_demand
        && pending.iter().all(|p| p.remaining_minutes == 0)
        && projected_completion_date.is_some_and(|d| d <= demand.due_date);

    // Beyond planning horizon (spec §4.5 failure semantics): the demand
    // still has unmet work, or its last block falls after the window the
    // caller asked to be planned over. Distinct from a missed due date —
    // the schedule may be complete and still spill past the horizon.
    if pending.iter().any(|p| p.remaining_minutes > 0) || projected_completion_date.is_some_and(|d| d > input.planning_window.1) {
        warnings.push(format!("demand {}: projected completion is beyond the planning horizon", demand.id));
    }

    Ok(DemandProjection {
        demand_entry_id: demand.id,
        projected_completion_date,
        can_meet_target,
    })
}

fn item_is_ready(tracker: &DependencyTracker, item: &PendingItem, deps: &[StepDependency]) -> bool {
    let key: BatchKey = (item.step.id, item.batch_number);
    let state = tracker.state(key);
    // Already in progress: always ready to receive more work.
    (state.started && !state.completed) || tracker.is_ready(item.step.id, item.batch_number, deps)
}

fn earliest_moment(date: NaiveDate) -> CalendarMoment {
    (date, 0)
}

fn work_minutes_for(step: &ProductStep, batch_quantity: u32) -> u32 {
    let seconds = step.time_per_piece_seconds as u64 * batch_quantity as u64;
    ((seconds + 59) / 60) as u32
}

/// Search `workers x days` (up to `LOOKAHEAD_DAYS`) for the lexicographically
/// earliest `(date, start, worker_id)` slot, honoring `earliest_start`
/// minutes on the first eligible day only (spec §4.5, §4.2).
fn find_next_available_slot(
    input: &ScenarioInput<'_>,
    book: &WorkerDayBook,
    candidates: &[&Worker],
    earliest_date: NaiveDate,
    earliest_start_minutes: Option<u32>,
) -> Option<(i64, NaiveDate, u32, u32)> {
    let mut best: Option<(NaiveDate, u32, i64, u32)> = None;
    let date = input.calendar.same_or_next_workday(earliest_date);

    for offset in 0..LOOKAHEAD_DAYS {
        let day = date + chrono::Duration::days(offset);
        if !input.calendar.is_workday(day) {
            continue;
        }
        let earliest_minutes = if day == earliest_date { earliest_start_minutes } else { None };

        for worker in candidates {
            let gaps = book.find_slots(
                input.calendar,
                worker.id,
                day,
                earliest_minutes,
                input.strategy.allow_overtime,
                input.strategy.overtime_limit_hours_per_day * 60,
            );
            if let Some(&(start, end)) = gaps.first() {
                let candidate = (day, start, worker.id, end);
                best = Some(match best {
                    Some(current) if (current.0, current.1, current.2) <= (candidate.0, candidate.1, candidate.2) => current,
                    _ => candidate,
                });
            }
        }
        if best.is_some() {
            break;
        }
    }

    best.map(|(day, start, worker_id, end)| (worker_id, day, start, end))
}

fn accrue_metrics(metrics: &mut ScenarioMetrics, input: &ScenarioInput<'_>, worker_id: i64, work_minutes: u32, is_overtime: bool) {
    let hours = work_minutes as f64 / 60.0;
    if is_overtime {
        metrics.overtime_hours += hours;
    } else {
        metrics.labor_hours += hours;
    }
    let cost_per_hour = input.workers.iter().find(|w| w.id == worker_id).and_then(|w| w.cost_per_hour).unwrap_or(0.0);
    metrics.labor_cost += hours * cost_per_hour;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::WorkCalendar;
    use chrono::TimeZone;
    use planning_domain::{BatchingPreferences, BomReference, DemandSource, DemandStatus, StepCategory, WorkerStatus};

    fn step(id: i64, name: &str, time_per_piece_seconds: u32, sequence: u32) -> ProductStep {
        ProductStep {
            id,
            product_id: 1,
            name: name.to_string(),
            step_code: format!("S{id}"),
            category: StepCategory::Sewing,
            time_per_piece_seconds,
            sequence,
            equipment_id: None,
            work_category: None,
        }
    }

    fn worker(id: i64) -> Worker {
        Worker {
            id,
            name: format!("Worker {id}"),
            employee_id: None,
            status: WorkerStatus::Active,
            work_category: None,
            cost_per_hour: Some(20.0),
        }
    }

    fn demand(id: i64, quantity: u32, due_date: NaiveDate, priority: u8) -> DemandEntry {
        DemandEntry {
            id,
            source: DemandSource::Internal,
            quantity,
            due_date,
            customer_name: None,
            priority,
            status: DemandStatus::Pending,
            bom: BomReference::ProductDefault(1),
            batching: BatchingPreferences::none(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 27, 0, 0, 0).unwrap()
    }

    #[test]
    fn single_step_single_worker_schedules_within_window() {
        let calendar = WorkCalendar::default();
        let workers = vec![worker(1)];
        let window_start = NaiveDate::from_ymd_opt(2026, 7, 27).unwrap();
        let window_end = NaiveDate::from_ymd_opt(2026, 8, 10).unwrap();
        let d = demand(1, 50, window_end, 1);

        let mut boms = HashMap::new();
        boms.insert(
            1,
            BomSteps {
                steps: vec![step(1, "Cut", 60, 1)],
                dependencies: vec![],
            },
        );

        let input = ScenarioInput {
            planning_window: (window_start, window_end),
            demand_entries: vec![d],
            bom_steps_by_demand: boms,
            workers: &workers,
            certifications: &[],
            certification_reference_time: now(),
            calendar: &calendar,
            strategy: Strategy::MeetDeadlines.config(),
        };

        let output = run_kernel(&input, &crate::cancellation::NeverCancelled).unwrap();
        assert!(!output.blocks.is_empty());
        assert_eq!(output.blocks.iter().map(|b| b.planned_output).sum::<u32>(), 50);
        assert_eq!(output.demand_projections.len(), 1);
        assert!(output.demand_projections[0].can_meet_target);
    }

    #[test]
    fn dependent_step_waits_for_predecessor_to_finish() {
        let calendar = WorkCalendar::default();
        let workers = vec![worker(1)];
        let window_start = NaiveDate::from_ymd_opt(2026, 7, 27).unwrap();
        let window_end = NaiveDate::from_ymd_opt(2026, 8, 10).unwrap();
        let d = demand(1, 10, window_end, 1);

        let mut boms = HashMap::new();
        boms.insert(
            1,
            BomSteps {
                steps: vec![step(1, "Cut", 60, 1), step(2, "Sew", 60, 2)],
                dependencies: vec![StepDependency {
                    step_id: 2,
                    depends_on_step_id: 1,
                    kind: planning_domain::DependencyKind::Finish,
                }],
            },
        );

        let input = ScenarioInput {
            planning_window: (window_start, window_end),
            demand_entries: vec![d],
            bom_steps_by_demand: boms,
            workers: &workers,
            certifications: &[],
            certification_reference_time: now(),
            calendar: &calendar,
            strategy: Strategy::MeetDeadlines.config(),
        };

        let output = run_kernel(&input, &crate::cancellation::NeverCancelled).unwrap();
        let cut_end = output.blocks.iter().filter(|b| b.step_id == 1).map(|b| (b.date, b.end_minutes)).max().unwrap();
        let sew_start = output.blocks.iter().filter(|b| b.step_id == 2).map(|b| (b.date, b.start_minutes)).min().unwrap();
        assert!(sew_start >= cut_end);
    }

    #[test]
    fn cyclic_dependency_is_reported_as_infeasible() {
        let calendar = WorkCalendar::default();
        let workers = vec![worker(1)];
        let window_start = NaiveDate::from_ymd_opt(2026, 7, 27).unwrap();
        let window_end = NaiveDate::from_ymd_opt(2026, 8, 10).unwrap();
        let d = demand(1, 10, window_end, 1);

        let mut boms = HashMap::new();
        boms.insert(
            1,
            BomSteps {
                steps: vec![step(1, "A", 60, 1), step(2, "B", 60, 2)],
                dependencies: vec![
                    StepDependency { step_id: 1, depends_on_step_id: 2, kind: planning_domain::DependencyKind::Finish },
                    StepDependency { step_id: 2, depends_on_step_id: 1, kind: planning_domain::DependencyKind::Finish },
                ],
            },
        );

        let input = ScenarioInput {
            planning_window: (window_start, window_end),
            demand_entries: vec![d],
            bom_steps_by_demand: boms,
            workers: &workers,
            certifications: &[],
            certification_reference_time: now(),
            calendar: &calendar,
            strategy: Strategy::MeetDeadlines.config(),
        };

        let result = run_kernel(&input, &crate::cancellation::NeverCancelled);
        assert!(matches!(result, Err(PlanningError::Infeasible(_))));
    }

    #[test]
    fn demand_missing_a_bom_fails_fast_as_precondition() {
        let calendar = WorkCalendar::default();
        let workers = vec![worker(1)];
        let window_start = NaiveDate::from_ymd_opt(2026, 7, 27).unwrap();
        let window_end = NaiveDate::from_ymd_opt(2026, 8, 10).unwrap();
        let d = demand(1, 10, window_end, 1);

        let input = ScenarioInput {
            planning_window: (window_start, window_end),
            demand_entries: vec![d],
            bom_steps_by_demand: HashMap::new(),
            workers: &workers,
            certifications: &[],
            certification_reference_time: now(),
            calendar: &calendar,
            strategy: Strategy::MeetDeadlines.config(),
        };

        let result = run_kernel(&input, &crate::cancellation::NeverCancelled);
        assert!(matches!(result, Err(PlanningError::Precondition(_))));
    }

    #[test]
    fn demand_sort_key_prefers_highest_priority_first() {
        let due = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
        let urgent = demand(1, 1, due, 1);
        let low_priority = demand(2, 1, due, 5);
        assert!(demand_sort_key(&urgent) < demand_sort_key(&low_priority));
    }
}
