//! C3 — per `(stepId, batchNumber)` state machine; earliest-start
//! calculation from finish-to-start and start-to-start dependencies plus
//! intra-step batch ordering (spec §4.3).

use chrono::NaiveDate;
use planning_domain::{DependencyKind, ProductStepId, StepDependency};
use std::collections::HashMap;

pub type BatchKey = (ProductStepId, u32);
/// A moment in calendar time: a date plus minutes-since-midnight.
pub type CalendarMoment = (NaiveDate, u32);

/// `pending -> started -> completed`; `started` is entered atomically with
/// the first emitted block for the batch (spec §4.5).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchState {
    pub started: bool,
    pub started_at: Option<CalendarMoment>,
    pub completed: bool,
    pub completed_at: Option<CalendarMoment>,
}

/// Tracks the state of every `(step, batch)` pair for one demand entry
/// being scheduled.
#[derive(Debug, Clone, Default)]
pub struct DependencyTracker {
    states: HashMap<BatchKey, BatchState>,
}

impl DependencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, key: BatchKey) -> BatchState {
        self.states.get(&key).copied().unwrap_or_default()
    }

    pub fn mark_started(&mut self, key: BatchKey, at: CalendarMoment) {
        let state = self.states.entry(key).or_default();
        if !state.started {
            state.started = true;
            state.started_at = Some(at);
        }
    }

    pub fn mark_completed(&mut self, key: BatchKey, at: CalendarMoment) {
        let state = self.states.entry(key).or_default();
        state.completed = true;
        state.completed_at = Some(at);
    }

    /// Readiness rule (spec §4.3): every `finish` dependency of the same
    /// batch must be `completed`, every `start` dependency must be
    /// `started`, and if `batch_number > 1` the previous batch of the same
    /// step must be `completed`.
    pub fn is_ready(&self, step_id: ProductStepId, batch_number: u32, deps: &[StepDependency]) -> bool {
        for dep in deps.iter().filter(|d| d.step_id == step_id) {
            let dep_state = self.state((dep.depends_on_step_id, batch_number));
            let satisfied = match dep.kind {
                DependencyKind::Finish => dep_state.completed,
                DependencyKind::Start => dep_state.started,
            };
            if !satisfied {
                return false;
            }
        }
        if batch_number > 1 {
            let prev = self.state((step_id, batch_number - 1));
            if !prev.completed {
                return false;
            }
        }
        true
    }

    /// The maximum over the completion timestamps of `finish` dependencies
    /// (same batch) and the completion timestamp of the previous batch of
    /// the same step; `None` when nothing constrains the start ("as soon
    /// as the calendar allows", spec §4.3).
    pub fn earliest_start(
        &self,
        step_id: ProductStepId,
        batch_number: u32,
        deps: &[StepDependency],
    ) -> Option<CalendarMoment> {
        let mut latest: Option<CalendarMoment> = None;

        for dep in deps.iter().filter(|d| d.step_id == step_id && d.kind == DependencyKind::Finish) {
            if let Some(at) = self.state((dep.depends_on_step_id, batch_number)).completed_at {
                latest = Some(match latest {
                    Some(current) if current >= at => current,
                    _ => at,
                });
            }
        }

        if batch_number > 1 {
            if let Some(at) = self.state((step_id, batch_number - 1)).completed_at {
                latest = Some(match latest {
                    Some(current) if current >= at => current,
                    _ => at,
                });
            }
        }

        latest
    }
}

/// Decompose a demand quantity into batches per spec §4.3: batches of at
/// most `max_batch_size`; a final batch smaller than `min_batch_size` is
/// coalesced into the previous batch. Both default to `quantity` (no
/// batching) when absent.
pub fn decompose_into_batches(quantity: u32, min_batch_size: Option<u32>, max_batch_size: Option<u32>) -> Vec<u32> {
    let max = max_batch_size.unwrap_or(quantity).max(1);
    let min = min_batch_size.unwrap_or(quantity);

    if quantity == 0 {
        return Vec::new();
    }

    let mut batches = Vec::new();
    let mut remaining = quantity;
    while remaining > 0 {
        let size = remaining.min(max);
        batches.push(size);
        remaining -= size;
    }

    if batches.len() >= 2 {
        let last = *batches.last().unwrap();
        if last < min {
            let popped = batches.pop().unwrap();
            *batches.last_mut().unwrap() += popped;
        }
    }

    batches
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decompose_with_no_preferences_is_one_batch() {
        assert_eq!(decompose_into_batches(20, None, None), vec![20]);
    }

    #[test]
    fn decompose_splits_on_max_batch_size() {
        assert_eq!(decompose_into_batches(20, Some(5), Some(10)), vec![10, 10]);
    }

    #[test]
    fn decompose_coalesces_small_final_batch() {
        // 25 / max 10 -> 10, 10, 5; final batch of 5 < min 8 -> coalesced.
        assert_eq!(decompose_into_batches(25, Some(8), Some(10)), vec![10, 15]);
    }

    #[test]
    fn decompose_zero_quantity_is_empty() {
        assert_eq!(decompose_into_batches(0, None, None), Vec::new());
    }

    fn moment(day: u32, minute: u32) -> CalendarMoment {
        (NaiveDate::from_ymd_opt(2026, 7, day as i32).unwrap(), minute)
    }

    #[test]
    fn readiness_requires_finish_dependency_completed() {
        let mut tracker = DependencyTracker::new();
        let deps = vec![StepDependency {
            step_id: 2,
            depends_on_step_id: 1,
            kind: DependencyKind::Finish,
        }];
        assert!(!tracker.is_ready(2, 1, &deps));
        tracker.mark_completed((1, 1), moment(1, 100));
        assert!(tracker.is_ready(2, 1, &deps));
    }

    #[test]
    fn readiness_requires_start_dependency_started() {
        let mut tracker = DependencyTracker::new();
        let deps = vec![StepDependency {
            step_id: 2,
            depends_on_step_id: 1,
            kind: DependencyKind::Start,
        }];
        assert!(!tracker.is_ready(2, 1, &deps));
        tracker.mark_started((1, 1), moment(1, 100));
        assert!(tracker.is_ready(2, 1, &deps));
    }

    #[test]
    fn readiness_requires_previous_batch_completed() {
        let tracker_no_deps: Vec<StepDependency> = Vec::new();
        let mut tracker = DependencyTracker::new();
        assert!(!tracker.is_ready(1, 2, &tracker_no_deps));
        tracker.mark_completed((1, 1), moment(1, 100));
        assert!(tracker.is_ready(1, 2, &tracker_no_deps));
    }

    #[test]
    fn earliest_start_is_none_without_constraints() {
        let tracker = DependencyTracker::new();
        assert_eq!(tracker.earliest_start(1, 1, &[]), None);
    }

    #[test]
    fn earliest_start_is_max_of_finish_dep_and_previous_batch() {
        let mut tracker = DependencyTracker::new();
        let deps = vec![StepDependency {
            step_id: 2,
            depends_on_step_id: 1,
            kind: DependencyKind::Finish,
        }];
        tracker.mark_completed((1, 1), moment(1, 100));
        tracker.mark_completed((2, 1), moment(2, 50));
        assert_eq!(tracker.earliest_start(2, 2, &deps), Some(moment(2, 50)));
    }
}
