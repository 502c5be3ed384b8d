//! C10 — capacity and risk analysis (spec §4.10): a scenario-*independent*
//! estimator mapping remaining demand to workforce hours over a horizon
//! (`deadline_risk`/`weekly_breakdown`/`available_hours`), plus a
//! scenario-*dependent* companion (`worker_utilization`/`at_risk_demand`/
//! `suggest_overtime`) used by replan (C7) to reduce an already-generated
//! schedule's shortfall. Both halves are "C10" in the sense spec §2's
//! dataflow paragraph uses it ("consulted by what-if and risk screens"); the
//! first half never reads a generated schedule, the second never reads raw
//! demand.

use crate::calendar::WorkCalendar;
use crate::qualified_worker::qualified_workers;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use planning_domain::{DemandEntryId, EquipmentCertification, ProductStep, ProductStepId, ScenarioMetrics, ScheduleBlock, Worker, WorkerId};
use std::collections::HashMap;

/// A per-worker override for a what-if capacity analysis (spec §4.10's
/// `{worker_id -> (available, hours_per_day)}` map). Absent from the map
/// means "active, 8 hours/day" (the spec's stated default).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkerHoursOverride {
    pub available: bool,
    pub hours_per_day: f64,
}

/// One open demand entry reduced to what the capacity estimator needs:
/// total required hours, independent of any particular schedule.
#[derive(Debug, Clone, Copy)]
pub struct CapacityDemand {
    pub demand_entry_id: DemandEntryId,
    pub due_date: NaiveDate,
    pub quantity: u32,
    /// `Σ_steps time_per_piece_seconds` across the demand's BOM (spec
    /// §4.10's `Σ_steps` term).
    pub total_seconds_per_piece: u64,
    /// The worker's proficiency multiplier, when the caller has one
    /// specific worker in mind for this demand's remaining work; `None`
    /// uses the spec's stated default of `1.0`.
    pub proficiency_multiplier: Option<f64>,
}

/// `required_hours = quantity × Σ_steps time_per_piece_seconds / 3600`,
/// optionally divided by a proficiency multiplier (spec §4.10).
pub fn required_hours(demand: &CapacityDemand) -> f64 {
    let base_hours = demand.quantity as f64 * demand.total_seconds_per_piece as f64 / 3600.0;
    base_hours / demand.proficiency_multiplier.unwrap_or(1.0)
}

/// `available_hours = Σ_active_workers (hours_per_day default 8) ×
/// number_of_weekdays_in_range` (spec §4.10). A worker present in
/// `overrides` with `available = false` contributes zero; weekday counting
/// uses the calendar's own workday rule so configured holidays are excluded
/// the same way they are everywhere else in this system.
pub fn available_hours(range: (NaiveDate, NaiveDate), active_worker_ids: &[WorkerId], overrides: &HashMap<WorkerId, WorkerHoursOverride>, calendar: &WorkCalendar) -> f64 {
    if range.0 > range.1 {
        return 0.0;
    }
    let weekdays = count_workdays(range, calendar);
    active_worker_ids
        .iter()
        .map(|id| match overrides.get(id) {
            Some(o) if !o.available => 0.0,
            Some(o) => o.hours_per_day,
            None => 8.0,
        })
        .sum::<f64>()
        * weekdays as f64
}

fn count_workdays(range: (NaiveDate, NaiveDate), calendar: &WorkCalendar) -> u32 {
    let mut count = 0u32;
    let mut cursor = range.0;
    while cursor <= range.1 {
        if calendar.is_workday(cursor) {
            count += 1;
        }
        cursor += chrono::Duration::days(1);
    }
    count
}

/// `deadline_risk[demand] = { required_hours, available_hours_until_due,
/// can_meet, shortfall }` for every demand in `demands` (spec §4.10).
/// `available_hours_until_due` is computed over `[from, demand.due_date]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeadlineRisk {
    pub demand_entry_id: DemandEntryId,
    pub required_hours: f64,
    pub available_hours_until_due: f64,
    pub can_meet: bool,
    pub shortfall_hours: f64,
}

pub fn deadline_risk(from: NaiveDate, demands: &[CapacityDemand], active_worker_ids: &[WorkerId], overrides: &HashMap<WorkerId, WorkerHoursOverride>, calendar: &WorkCalendar) -> Vec<DeadlineRisk> {
    let mut out: Vec<DeadlineRisk> = demands
        .iter()
        .map(|d| {
            let required = required_hours(d);
            let available = available_hours((from, d.due_date), active_worker_ids, overrides, calendar);
            let shortfall = (required - available).max(0.0);
            DeadlineRisk {
                demand_entry_id: d.demand_entry_id,
                required_hours: required,
                available_hours_until_due: available,
                can_meet: shortfall <= 0.0,
                shortfall_hours: shortfall,
            }
        })
        .collect();
    out.sort_by_key(|r| r.demand_entry_id);
    out
}

/// Per-Monday `(available_hours, required_hours)` over `horizon` (spec
/// §4.10). A week's `required_hours` sums the `required_hours` of every
/// demand whose due date falls in that Monday-to-Sunday span, so a reader
/// sees where requirement clusters against due dates rather than an even
/// spread that would hide a looming crunch week.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeeklyBreakdown {
    pub week_start: NaiveDate,
    pub available_hours: f64,
    pub required_hours: f64,
}

pub fn weekly_breakdown(horizon: (NaiveDate, NaiveDate), demands: &[CapacityDemand], active_worker_ids: &[WorkerId], overrides: &HashMap<WorkerId, WorkerHoursOverride>, calendar: &WorkCalendar) -> Vec<WeeklyBreakdown> {
    if horizon.0 > horizon.1 {
        return Vec::new();
    }
    let mut weeks = Vec::new();
    let mut monday = start_of_week(horizon.0);
    while monday <= horizon.1 {
        let week_end = (monday + chrono::Duration::days(6)).min(horizon.1);
        let range_start = monday.max(horizon.0);
        let available = available_hours((range_start, week_end), active_worker_ids, overrides, calendar);
        let required: f64 = demands.iter().filter(|d| d.due_date >= monday && d.due_date <= week_end).map(required_hours).sum();
        weeks.push(WeeklyBreakdown {
            week_start: monday,
            available_hours: available,
            required_hours: required,
        });
        monday += chrono::Duration::days(7);
    }
    weeks
}

fn start_of_week(date: NaiveDate) -> NaiveDate {
    date - chrono::Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Utilization over the scenario's planning window for one worker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkerUtilization {
    pub worker_id: WorkerId,
    pub scheduled_regular_minutes: u32,
    pub scheduled_overtime_minutes: u32,
    pub available_regular_minutes: u32,
    pub utilization_pct: f64,
}

/// A demand entry whose projected completion is at, or past, its due date.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AtRiskDemand {
    pub demand_entry_id: DemandEntryId,
    pub projected_completion_date: NaiveDate,
    pub due_date: NaiveDate,
    pub days_late: i64,
}

/// A candidate overtime block to help an at-risk demand meet its deadline
/// (spec §4.7 step 4). The kernel's own overtime policy is a scenario-wide
/// knob (`StrategyConfig::allow_overtime`); this is a draft suggestion
/// layered on top of an already generated/replanned schedule, never
/// committed by this module.
#[derive(Debug, Clone, PartialEq)]
pub struct OvertimeSuggestion {
    pub demand_entry_id: DemandEntryId,
    pub step_id: i64,
    pub batch_number: u32,
    pub worker_id: WorkerId,
    pub date: NaiveDate,
    pub start_minutes: u32,
    pub end_minutes: u32,
    pub is_overtime: bool,
    pub is_auto_suggested: bool,
    pub reason: String,
}

/// Buffer added on top of the raw shortfall before the generator stops
/// adding candidate blocks (spec §4.7 step 4: "shortfall + 120 min buffer").
pub const OVERTIME_SHORTFALL_BUFFER_MINUTES: u32 = 120;

/// Nominal span of one suggested overtime block: 15:30 to 18:00 (spec §4.7
/// step 4), anchored at the calendar's own `afternoon_end_minutes` rather
/// than the literal clock time so a non-default work calendar still gets a
/// same-length candidate window.
const OVERTIME_CANDIDATE_SPAN_MINUTES: u32 = 150;

/// Regular-minutes utilization per worker across the dates any block in
/// `blocks` touches, against the calendar's regular capacity for each of
/// those dates (spec §4.10).
pub fn worker_utilization(blocks: &[ScheduleBlock], calendar: &WorkCalendar) -> Vec<WorkerUtilization> {
    let mut by_worker: HashMap<WorkerId, (u32, u32, u32)> = HashMap::new(); // (regular, overtime, days)

    let mut dates_by_worker: HashMap<WorkerId, std::collections::HashSet<NaiveDate>> = HashMap::new();
    for block in blocks {
        let duration = block.duration_minutes();
        let (regular, overtime) = if block.is_overtime {
            (0, duration)
        } else {
            (duration, 0)
        };
        for &worker_id in &block.worker_ids {
            let entry = by_worker.entry(worker_id).or_insert((0, 0, 0));
            entry.0 += regular;
            entry.1 += overtime;
            dates_by_worker.entry(worker_id).or_default().insert(block.date);
        }
    }

    let mut out: Vec<WorkerUtilization> = by_worker
        .into_iter()
        .map(|(worker_id, (regular, overtime, _))| {
            let days = dates_by_worker.get(&worker_id).map(|d| d.len() as u32).unwrap_or(0);
            let available = days * calendar.regular_minutes_per_day();
            let utilization_pct = if available == 0 { 0.0 } else { regular as f64 / available as f64 * 100.0 };
            WorkerUtilization {
                worker_id,
                scheduled_regular_minutes: regular,
                scheduled_overtime_minutes: overtime,
                available_regular_minutes: available,
                utilization_pct,
            }
        })
        .collect();
    out.sort_by_key(|u| u.worker_id);
    out
}

/// Demand entries whose last scheduled block falls on or after their due
/// date (spec §4.10). `due_dates` and `projected_completions` are keyed by
/// demand entry id, supplied by the caller (the kernel already computed
/// these as `DemandProjection`s).
pub fn at_risk_demand(
    due_dates: &HashMap<DemandEntryId, NaiveDate>,
    projected_completions: &HashMap<DemandEntryId, NaiveDate>,
) -> Vec<AtRiskDemand> {
    let mut out: Vec<AtRiskDemand> = projected_completions
        .iter()
        .filter_map(|(&demand_entry_id, &projected_completion_date)| {
            let &due_date = due_dates.get(&demand_entry_id)?;
            if projected_completion_date > due_date {
                Some(AtRiskDemand {
                    demand_entry_id,
                    projected_completion_date,
                    due_date,
                    days_late: (projected_completion_date - due_date).num_days(),
                })
            } else {
                None
            }
        })
        .collect();
    out.sort_by_key(|r| (r.demand_entry_id, r.days_late));
    out
}

/// The first `(step, batch)` of `demand_entry_id` whose block falls after
/// `due_date` — the documented "first step that still needs work" rule
/// (spec §9's open question: simpler and more deterministic than a
/// critical-path search, and sufficient since the kernel already schedules
/// in dependency order).
fn first_overdue_step(blocks: &[ScheduleBlock], demand_entry_id: DemandEntryId, due_date: NaiveDate) -> Option<(ProductStepId, u32)> {
    blocks
        .iter()
        .filter(|b| b.demand_entry_id == demand_entry_id && b.date > due_date)
        .min_by_key(|b| (b.date, b.start_minutes))
        .map(|b| (b.step_id, b.batch_number))
}

/// For every workday between `start_point` and an at-risk demand's
/// `due_date`, emit a 15:30→18:00 candidate overtime block (clipped to
/// `overtime_limit_hours_per_day`) assigned to a qualified worker for the
/// first step still running past the due date, accumulating blocks until
/// the aggregate overtime minutes reach the demand's shortfall plus a
/// 120-minute buffer (spec §4.7 step 4). Demands with no work scheduled
/// past their due date are not at risk and get no suggestions.
#[allow(clippy::too_many_arguments)]
pub fn suggest_overtime(
    start_point: NaiveDate,
    at_risk: &[AtRiskDemand],
    blocks: &[ScheduleBlock],
    steps_by_id: &HashMap<ProductStepId, ProductStep>,
    workers: &[Worker],
    certifications: &[EquipmentCertification],
    certification_reference_time: DateTime<Utc>,
    calendar: &WorkCalendar,
    overtime_limit_hours_per_day: u32,
) -> Vec<OvertimeSuggestion> {
    let window_end_cap = calendar.overtime_end_minutes(overtime_limit_hours_per_day);
    let start_minutes = calendar.afternoon_end_minutes;
    let end_minutes = (start_minutes + OVERTIME_CANDIDATE_SPAN_MINUTES).min(window_end_cap);
    if end_minutes <= start_minutes {
        return Vec::new();
    }
    let per_block_minutes = end_minutes - start_minutes;

    let mut suggestions = Vec::new();
    for risk in at_risk {
        let shortfall_minutes: u32 = blocks
            .iter()
            .filter(|b| b.demand_entry_id == risk.demand_entry_id && b.date > risk.due_date)
            .map(|b| b.duration_minutes())
            .sum();
        if shortfall_minutes == 0 {
            continue;
        }
        let target_minutes = shortfall_minutes + OVERTIME_SHORTFALL_BUFFER_MINUTES;

        let Some((step_id, batch_number)) = first_overdue_step(blocks, risk.demand_entry_id, risk.due_date) else {
            continue;
        };
        let Some(step) = steps_by_id.get(&step_id) else {
            continue;
        };
        let candidates = qualified_workers(step, workers, certifications, certification_reference_time);
        let Some(worker) = candidates.first() else {
            continue;
        };

        let mut accumulated_minutes = 0u32;
        let mut cursor = start_point;
        while cursor <= risk.due_date && accumulated_minutes < target_minutes {
            if calendar.is_workday(cursor) {
                suggestions.push(OvertimeSuggestion {
                    demand_entry_id: risk.demand_entry_id,
                    step_id,
                    batch_number,
                    worker_id: worker.id,
                    date: cursor,
                    start_minutes,
                    end_minutes,
                    is_overtime: true,
                    is_auto_suggested: true,
                    reason: format!(
                        "demand is projected {} day(s) late; closing a {shortfall_minutes}-minute shortfall needs about {target_minutes} overtime minute(s)",
                        risk.days_late
                    ),
                });
                accumulated_minutes += per_block_minutes;
            }
            cursor = cursor.succ_opt().expect("date arithmetic should not overflow");
        }
    }
    suggestions
}

/// Roll a scenario's own metrics plus worker utilization into a single
/// summary a caller can hand to the API layer's analytics endpoints
/// without recomputing from raw blocks (spec §6 "productivity").
#[derive(Debug, Clone)]
pub struct CapacitySummary {
    pub metrics: ScenarioMetrics,
    pub worker_utilization: Vec<WorkerUtilization>,
    pub at_risk_demand: Vec<AtRiskDemand>,
    pub overtime_suggestions: Vec<OvertimeSuggestion>,
}

#[allow(clippy::too_many_arguments)]
pub fn analyze(
    start_point: NaiveDate,
    blocks: &[ScheduleBlock],
    metrics: ScenarioMetrics,
    calendar: &WorkCalendar,
    due_dates: &HashMap<DemandEntryId, NaiveDate>,
    projected_completions: &HashMap<DemandEntryId, NaiveDate>,
    steps_by_id: &HashMap<ProductStepId, ProductStep>,
    workers: &[Worker],
    certifications: &[EquipmentCertification],
    certification_reference_time: DateTime<Utc>,
    overtime_limit_hours_per_day: u32,
) -> CapacitySummary {
    let at_risk = at_risk_demand(due_dates, projected_completions);
    let overtime_suggestions = suggest_overtime(
        start_point,
        &at_risk,
        blocks,
        steps_by_id,
        workers,
        certifications,
        certification_reference_time,
        calendar,
        overtime_limit_hours_per_day,
    );
    CapacitySummary {
        metrics,
        worker_utilization: worker_utilization(blocks, calendar),
        at_risk_demand: at_risk,
        overtime_suggestions,
    }
}
