//! C8 — schedule validator: a pure function over a schedule that checks
//! certifications, active-worker status, per-worker time non-overlap, and
//! time-window sanity (spec §4.8). Used as a defensive check after
//! generation/replan, and to police operator-edited schedules before they
//! are committed.

use crate::calendar::WorkCalendar;
use planning_domain::{Equipment, EquipmentCertification, ProductStep, ProductStepId, ScheduleBlock, Worker, WorkerId};
use std::collections::HashMap;

/// A condition that rejects the edit (spec §4.8 "Error conditions").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A block names a worker id the context has no record of.
    UnknownWorker { worker_id: WorkerId },
    /// A block names a step id the context has no record of.
    UnknownStep { step_id: ProductStepId },
    /// Step requires equipment and the worker lacks a valid certification.
    UncertifiedAssignment { step_id: ProductStepId, worker_id: WorkerId },
    /// Two blocks for the same worker overlap in time on the same date.
    WorkerDoubleBooked { worker_id: WorkerId, date: chrono::NaiveDate },
    /// `planned_output <= 0`.
    NonPositiveOutput { step_id: ProductStepId, batch_number: u32 },
    /// `end_time <= start_time`.
    MalformedInterval { step_id: ProductStepId, batch_number: u32 },
    /// `planned_output` doesn't match `floor(work_minutes * 60 / time_per_piece_seconds)`.
    OutputMismatch { step_id: ProductStepId, batch_number: u32, expected: u32, actual: u32 },
}

/// A condition that is noted but does not reject the edit (spec §4.8
/// "Warnings").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationWarning {
    /// The assigned worker is not `active`.
    WorkerNotActive { worker_id: WorkerId },
    /// The block has no workers assigned.
    NoWorkersAssigned { step_id: ProductStepId, batch_number: u32 },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Everything `validate` needs to resolve ids in `blocks` (spec §4.8's
/// `context`).
pub struct ValidationContext<'a> {
    pub calendar: &'a WorkCalendar,
    pub steps_by_id: &'a HashMap<ProductStepId, ProductStep>,
    pub equipment_by_id: &'a HashMap<i64, Equipment>,
    pub workers_by_id: &'a HashMap<WorkerId, Worker>,
    pub certifications: &'a [EquipmentCertification],
    pub certification_reference_time: chrono::DateTime<chrono::Utc>,
}

/// Pure function `validate(schedule, context) -> {errors[], warnings[]}`
/// (spec §4.8). Never mutates `blocks`; callers decide whether to reject the
/// edit outright (any `errors`) or merely surface `warnings`.
pub fn validate(blocks: &[ScheduleBlock], ctx: &ValidationContext<'_>) -> ValidationReport {
    let mut report = ValidationReport::default();

    for block in blocks {
        if block.end_minutes <= block.start_minutes {
            report.errors.push(ValidationError::MalformedInterval {
                step_id: block.step_id,
                batch_number: block.batch_number,
            });
        }
        if block.planned_output == 0 {
            report.errors.push(ValidationError::NonPositiveOutput {
                step_id: block.step_id,
                batch_number: block.batch_number,
            });
        }

        if block.worker_ids.is_empty() {
            report.warnings.push(ValidationWarning::NoWorkersAssigned {
                step_id: block.step_id,
                batch_number: block.batch_number,
            });
        }

        let step = ctx.steps_by_id.get(&block.step_id);
        if step.is_none() {
            report.errors.push(ValidationError::UnknownStep { step_id: block.step_id });
        }

        for &worker_id in &block.worker_ids {
            let Some(worker) = ctx.workers_by_id.get(&worker_id) else {
                report.errors.push(ValidationError::UnknownWorker { worker_id });
                continue;
            };
            if !worker.is_active() {
                report.warnings.push(ValidationWarning::WorkerNotActive { worker_id });
            }
            if let Some(step) = step {
                if step.requires_equipment() {
                    let certified = ctx.certifications.iter().any(|c| {
                        c.worker_id == worker_id
                            && Some(c.equipment_id) == step.equipment_id
                            && c.is_valid_at(ctx.certification_reference_time)
                    });
                    if !certified {
                        report.errors.push(ValidationError::UncertifiedAssignment {
                            step_id: block.step_id,
                            worker_id,
                        });
                    }
                }
            }
        }

        if let Some(step) = step {
            if step.requires_equipment() {
                if let Some(equipment_id) = step.equipment_id {
                    if !ctx.equipment_by_id.contains_key(&equipment_id) {
                        report.errors.push(ValidationError::UnknownStep { step_id: block.step_id });
                    }
                }
            }
        }
    }

    for violation in find_double_bookings(blocks) {
        report.errors.push(violation);
    }

    report
}

/// Re-checks the interval-well-formedness and output-arithmetic invariants
/// the kernel is supposed to uphold by construction (spec §8 invariants 1,
/// 2). Kept separate from `validate` because it needs the calendar and the
/// per-step time-per-piece to recompute `planned_output`, which an
/// operator-edited schedule's own context may not always supply accurately.
pub fn check_kernel_invariants(blocks: &[ScheduleBlock], calendar: &WorkCalendar, steps_by_id: &HashMap<ProductStepId, ProductStep>) -> Vec<ValidationError> {
    let mut violations = Vec::new();
    for block in blocks {
        if block.start_minutes < calendar.morning_start_minutes || block.end_minutes > calendar.overtime_window_end_minutes {
            violations.push(ValidationError::MalformedInterval {
                step_id: block.step_id,
                batch_number: block.batch_number,
            });
        }
        let crosses_lunch = block.start_minutes < calendar.lunch_end_minutes && block.end_minutes > calendar.lunch_start_minutes;
        if crosses_lunch {
            violations.push(ValidationError::MalformedInterval {
                step_id: block.step_id,
                batch_number: block.batch_number,
            });
        }
        if let Some(step) = steps_by_id.get(&block.step_id) {
            let expected = (block.duration_minutes() as u64 * 60 / step.time_per_piece_seconds.max(1) as u64) as u32;
            if expected != block.planned_output {
                violations.push(ValidationError::OutputMismatch {
                    step_id: block.step_id,
                    batch_number: block.batch_number,
                    expected,
                    actual: block.planned_output,
                });
            }
        }
    }
    violations
}

fn find_double_bookings(blocks: &[ScheduleBlock]) -> Vec<ValidationError> {
    let mut per_worker_day: HashMap<(WorkerId, chrono::NaiveDate), Vec<(u32, u32)>> = HashMap::new();
    for block in blocks {
        for &worker_id in &block.worker_ids {
            per_worker_day.entry((worker_id, block.date)).or_default().push((block.start_minutes, block.end_minutes));
        }
    }

    let mut violations = Vec::new();
    for ((worker_id, date), mut intervals) in per_worker_day {
        intervals.sort_unstable();
        for window in intervals.windows(2) {
            let (_, prev_end) = window[0];
            let (next_start, _) = window[1];
            if next_start < prev_end {
                violations.push(ValidationError::WorkerDoubleBooked { worker_id, date });
            }
        }
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use planning_domain::{StepCategory, WorkerStatus};

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

    fn worker(id: WorkerId, status: WorkerStatus) -> Worker {
        Worker {
            id,
            name: format!("Worker {id}"),
            employee_id: None,
            status,
            work_category: None,
            cost_per_hour: Some(20.0),
        }
    }

    fn block(worker_id: WorkerId, date: NaiveDate, start: u32, end: u32, output: u32) -> ScheduleBlock {
        ScheduleBlock {
            id: None,
            demand_entry_id: 1,
            step_id: 1,
            batch_number: 1,
            batch_quantity: 10,
            date,
            start_minutes: start,
            end_minutes: end,
            planned_output: output,
            worker_ids: vec![worker_id],
            assignment_reason: "test".to_string(),
            constraint_notes: vec![],
            is_overtime: false,
            is_auto_suggested: false,
        }
    }

    fn ctx<'a>(
        calendar: &'a WorkCalendar,
        steps: &'a HashMap<ProductStepId, ProductStep>,
        equipment: &'a HashMap<i64, Equipment>,
        workers: &'a HashMap<WorkerId, Worker>,
        certifications: &'a [EquipmentCertification],
    ) -> ValidationContext<'a> {
        ValidationContext {
            calendar,
            steps_by_id: steps,
            equipment_by_id: equipment,
            workers_by_id: workers,
            certifications,
            certification_reference_time: Utc.with_ymd_and_hms(2026, 7, 27, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn valid_schedule_has_no_errors_or_warnings() {
        let calendar = WorkCalendar::default();
        let date = NaiveDate::from_ymd_opt(2026, 7, 27).unwrap();
        let blocks = vec![block(1, date, calendar.morning_start_minutes, calendar.morning_start_minutes + 60, 60)];
        let steps = HashMap::from([(1, step())]);
        let workers = HashMap::from([(1, worker(1, WorkerStatus::Active))]);
        let report = validate(&blocks, &ctx(&calendar, &steps, &HashMap::new(), &workers, &[]));
        assert!(report.errors.is_empty());
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn unknown_worker_is_an_error() {
        let calendar = WorkCalendar::default();
        let date = NaiveDate::from_ymd_opt(2026, 7, 27).unwrap();
        let blocks = vec![block(99, date, calendar.morning_start_minutes, calendar.morning_start_minutes + 60, 60)];
        let steps = HashMap::from([(1, step())]);
        let report = validate(&blocks, &ctx(&calendar, &steps, &HashMap::new(), &HashMap::new(), &[]));
        assert!(report.errors.contains(&ValidationError::UnknownWorker { worker_id: 99 }));
    }

    #[test]
    fn inactive_worker_is_a_warning_not_an_error() {
        let calendar = WorkCalendar::default();
        let date = NaiveDate::from_ymd_opt(2026, 7, 27).unwrap();
        let blocks = vec![block(1, date, calendar.morning_start_minutes, calendar.morning_start_minutes + 60, 60)];
        let steps = HashMap::from([(1, step())]);
        let workers = HashMap::from([(1, worker(1, WorkerStatus::OnLeave))]);
        let report = validate(&blocks, &ctx(&calendar, &steps, &HashMap::new(), &workers, &[]));
        assert!(report.errors.is_empty());
        assert!(report.warnings.contains(&ValidationWarning::WorkerNotActive { worker_id: 1 }));
    }

    #[test]
    fn non_positive_output_is_an_error() {
        let calendar = WorkCalendar::default();
        let date = NaiveDate::from_ymd_opt(2026, 7, 27).unwrap();
        let blocks = vec![block(1, date, calendar.morning_start_minutes, calendar.morning_start_minutes + 60, 0)];
        let steps = HashMap::from([(1, step())]);
        let workers = HashMap::from([(1, worker(1, WorkerStatus::Active))]);
        let report = validate(&blocks, &ctx(&calendar, &steps, &HashMap::new(), &workers, &[]));
        assert!(report.errors.contains(&ValidationError::NonPositiveOutput { step_id: 1, batch_number: 1 }));
    }

    #[test]
    fn inverted_interval_is_an_error() {
        let calendar = WorkCalendar::default();
        let date = NaiveDate::from_ymd_opt(2026, 7, 27).unwrap();
        let blocks = vec![block(1, date, 600, 500, 10)];
        let steps = HashMap::from([(1, step())]);
        let workers = HashMap::from([(1, worker(1, WorkerStatus::Active))]);
        let report = validate(&blocks, &ctx(&calendar, &steps, &HashMap::new(), &workers, &[]));
        assert!(report.errors.contains(&ValidationError::MalformedInterval { step_id: 1, batch_number: 1 }));
    }

    #[test]
    fn overlapping_blocks_for_same_worker_are_flagged() {
        let calendar = WorkCalendar::default();
        let date = NaiveDate::from_ymd_opt(2026, 7, 27).unwrap();
        let blocks = vec![
            block(1, date, calendar.morning_start_minutes, calendar.morning_start_minutes + 60, 60),
            block(1, date, calendar.morning_start_minutes + 30, calendar.morning_start_minutes + 90, 60),
        ];
        let steps = HashMap::from([(1, step())]);
        let workers = HashMap::from([(1, worker(1, WorkerStatus::Active))]);
        let report = validate(&blocks, &ctx(&calendar, &steps, &HashMap::new(), &workers, &[]));
        assert!(report.errors.iter().any(|v| matches!(v, ValidationError::WorkerDoubleBooked { .. })));
    }

    #[test]
    fn no_workers_assigned_is_a_warning() {
        let calendar = WorkCalendar::default();
        let date = NaiveDate::from_ymd_opt(2026, 7, 27).unwrap();
        let mut b = block(1, date, calendar.morning_start_minutes, calendar.morning_start_minutes + 60, 60);
        b.worker_ids.clear();
        let steps = HashMap::from([(1, step())]);
        let report = validate(&[b], &ctx(&calendar, &steps, &HashMap::new(), &HashMap::new(), &[]));
        assert!(report.warnings.contains(&ValidationWarning::NoWorkersAssigned { step_id: 1, batch_number: 1 }));
    }

    #[test]
    fn kernel_invariants_catch_wrong_planned_output() {
        let calendar = WorkCalendar::default();
        let date = NaiveDate::from_ymd_opt(2026, 7, 27).unwrap();
        let blocks = vec![block(1, date, calendar.morning_start_minutes, calendar.morning_start_minutes + 60, 999)];
        let steps = HashMap::from([(1, step())]);
        let violations = check_kernel_invariants(&blocks, &calendar, &steps);
        assert!(violations.iter().any(|v| matches!(v, ValidationError::OutputMismatch { .. })));
    }
}
