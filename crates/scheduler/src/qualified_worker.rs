//! C4 — filters workers by active status and equipment certification for a
//! given step (spec §4.4).

use chrono::{DateTime, Utc};
use planning_domain::{EquipmentCertification, ProductStep, Worker};

/// `qualified(step, worker, certifications)` holds iff the worker is
/// active, and — when the step requires equipment — the worker holds a
/// certification for it that is valid at `now`.
///
/// Work-category is descriptive only, never a filter (spec §4.4): a caller
/// that wants to restrict by category must pre-filter the `workers` slice
/// it passes to `qualified_workers`.
pub fn qualified(step: &ProductStep, worker: &Worker, certifications: &[EquipmentCertification], now: DateTime<Utc>) -> bool {
    if !worker.is_active() {
        return false;
    }
    match step.equipment_id {
        None => true,
        Some(equipment_id) => certifications
            .iter()
            .any(|c| c.worker_id == worker.id && c.equipment_id == equipment_id && c.is_valid_at(now)),
    }
}

/// All workers in `workers` qualified for `step` as of `now`.
pub fn qualified_workers<'w>(
    step: &ProductStep,
    workers: &'w [Worker],
    certifications: &[EquipmentCertification],
    now: DateTime<Utc>,
) -> Vec<&'w Worker> {
    let mut out: Vec<&Worker> = workers.iter().filter(|w| qualified(step, w, certifications, now)).collect();
    // Stable id order for determinism (spec §4.5, §8 invariant 7).
    out.sort_by_key(|w| w.id);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use planning_domain::{StepCategory, WorkerStatus};

    fn step(equipment_id: Option<i64>) -> ProductStep {
        ProductStep {
            id: 1,
            product_id: 1,
            name: "Sew side seam".to_string(),
            step_code: "S1".to_string(),
            category: StepCategory::Sewing,
            time_per_piece_seconds: 60,
            sequence: 1,
            equipment_id,
            work_category: None,
        }
    }

    fn worker(id: i64, status: WorkerStatus) -> Worker {
        Worker {
            id,
            name: format!("Worker {id}"),
            employee_id: None,
            status,
            work_category: None,
            cost_per_hour: None,
        }
    }

    #[test]
    fn inactive_worker_never_qualifies() {
        let s = step(None);
        let w = worker(1, WorkerStatus::Inactive);
        let now = Utc.with_ymd_and_hms(2026, 7, 27, 12, 0, 0).unwrap();
        assert!(!qualified(&s, &w, &[], now));
    }

    #[test]
    fn step_without_equipment_needs_no_certification() {
        let s = step(None);
        let w = worker(1, WorkerStatus::Active);
        let now = Utc.with_ymd_and_hms(2026, 7, 27, 12, 0, 0).unwrap();
        assert!(qualified(&s, &w, &[], now));
    }

    #[test]
    fn step_with_equipment_requires_valid_certification() {
        let s = step(Some(99));
        let w = worker(1, WorkerStatus::Active);
        let now = Utc.with_ymd_and_hms(2026, 7, 27, 12, 0, 0).unwrap();
        assert!(!qualified(&s, &w, &[], now));

        let cert = EquipmentCertification {
            worker_id: 1,
            equipment_id: 99,
            certified_at: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
            expires_at: None,
        };
        assert!(qualified(&s, &w, &[cert], now));
    }

    #[test]
    fn expired_certification_does_not_qualify() {
        let s = step(Some(99));
        let w = worker(1, WorkerStatus::Active);
        let now = Utc.with_ymd_and_hms(2026, 7, 27, 12, 0, 0).unwrap();
        let cert = EquipmentCertification {
            worker_id: 1,
            equipment_id: 99,
            certified_at: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
            expires_at: Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()),
        };
        assert!(!qualified(&s, &w, &[cert], now));
    }

    #[test]
    fn qualified_workers_sorts_by_id() {
        let s = step(None);
        let workers = vec![worker(3, WorkerStatus::Active), worker(1, WorkerStatus::Active)];
        let now = Utc.with_ymd_and_hms(2026, 7, 27, 12, 0, 0).unwrap();
        let result = qualified_workers(&s, &workers, &[], now);
        assert_eq!(result.iter().map(|w| w.id).collect::<Vec<_>>(), vec![1, 3]);
    }
}
