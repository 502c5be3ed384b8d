//! C2 — per-worker, per-date record of committed slots and
//! regular/overtime minutes; gap-finder honoring lunch and an overtime
//! window (spec §4.2).

use crate::calendar::WorkCalendar;
use chrono::NaiveDate;
use planning_domain::WorkerId;
use std::collections::HashMap;

/// Minimum block size returned by `find_slots`; a policy decision to avoid
/// thrashing (spec §4.2).
pub const MIN_BLOCK_MINUTES: u32 = 15;

#[derive(Debug, Clone, Default)]
struct WorkerDayRecord {
    regular_minutes_used: u32,
    overtime_minutes_used: u32,
    /// Sorted, non-overlapping by construction (`commit_slot` is only ever
    /// called with a gap `find_slots` returned, or a prefix of one).
    slots: Vec<(u32, u32)>,
}

/// Owned solely by the scheduling kernel for the duration of one scenario
/// (spec §5); a fresh book per scenario means scenarios never share state.
#[derive(Debug, Clone, Default)]
pub struct WorkerDayBook {
    days: HashMap<(WorkerId, NaiveDate), WorkerDayRecord>,
}

impl WorkerDayBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the book with already-committed blocks — used by replan (C7)
    /// when policy preserves already-scheduled future work (spec §4.7).
    pub fn seed_slot(&mut self, calendar: &WorkCalendar, worker: WorkerId, date: NaiveDate, start: u32, end: u32) {
        self.commit_slot(calendar, worker, date, start, end);
    }

    /// Every gap of >= `MIN_BLOCK_MINUTES` inside the union of the morning,
    /// afternoon, and (if allowed and not exhausted) overtime periods,
    /// minus existing slots, with start >= `earliest_start` when supplied.
    /// Returned in chronological order (spec §4.2).
    pub fn find_slots(
        &self,
        calendar: &WorkCalendar,
        worker: WorkerId,
        date: NaiveDate,
        earliest_start: Option<u32>,
        allow_overtime: bool,
        max_ot_minutes_per_day: u32,
    ) -> Vec<(u32, u32)> {
        let record = self.days.get(&(worker, date));
        let busy: &[(u32, u32)] = record.map(|r| r.slots.as_slice()).unwrap_or(&[]);
        let overtime_used = record.map(|r| r.overtime_minutes_used).unwrap_or(0);

        let mut periods = vec![
            (calendar.morning_start_minutes, calendar.lunch_start_minutes),
            (calendar.lunch_end_minutes, calendar.afternoon_end_minutes),
        ];
        if allow_overtime {
            let remaining = max_ot_minutes_per_day.saturating_sub(overtime_used);
            if remaining > 0 {
                let ot_end = (calendar.afternoon_end_minutes + remaining).min(calendar.overtime_window_end_minutes);
                if ot_end > calendar.afternoon_end_minutes {
                    periods.push((calendar.afternoon_end_minutes, ot_end));
                }
            }
        }

        let earliest = earliest_start.unwrap_or(0);
        let mut gaps = Vec::new();
        for (period_start, period_end) in periods {
            let clipped_start = period_start.max(earliest);
            if clipped_start >= period_end {
                continue;
            }
            gaps.extend(free_gaps(clipped_start, period_end, busy));
        }
        gaps.retain(|(s, e)| e.saturating_sub(*s) >= MIN_BLOCK_MINUTES);
        gaps
    }

    /// Insert `[start, end)` as a committed slot for `worker` on `date`,
    /// accruing regular minutes for the portion at-or-before
    /// `afternoon_end_minutes` and overtime minutes beyond it.
    ///
    /// Must only be called with a gap returned (or a trimmed prefix of a
    /// gap) from `find_slots`; blocks are non-overlapping by construction.
    pub fn commit_slot(&mut self, calendar: &WorkCalendar, worker: WorkerId, date: NaiveDate, start: u32, end: u32) {
        debug_assert!(start < end, "commit_slot requires a non-empty interval");

        let regular_end = end.min(calendar.afternoon_end_minutes);
        let regular_minutes = calendar.work_minutes(start.min(regular_end), regular_end);
        let overtime_start = start.max(calendar.afternoon_end_minutes);
        let overtime_minutes = end.saturating_sub(overtime_start);

        let record = self.days.entry((worker, date)).or_default();
        record.regular_minutes_used += regular_minutes;
        record.overtime_minutes_used += overtime_minutes;

        let idx = record.slots.partition_point(|(s, _)| *s < start);
        record.slots.insert(idx, (start, end));
    }

    pub fn regular_minutes_used(&self, worker: WorkerId, date: NaiveDate) -> u32 {
        self.days.get(&(worker, date)).map(|r| r.regular_minutes_used).unwrap_or(0)
    }

    pub fn overtime_minutes_used(&self, worker: WorkerId, date: NaiveDate) -> u32 {
        self.days.get(&(worker, date)).map(|r| r.overtime_minutes_used).unwrap_or(0)
    }

    /// Every committed slot for a worker on a date, in chronological order.
    pub fn slots(&self, worker: WorkerId, date: NaiveDate) -> &[(u32, u32)] {
        self.days.get(&(worker, date)).map(|r| r.slots.as_slice()).unwrap_or(&[])
    }
}

/// Standard interval subtraction: the parts of `[period_start, period_end)`
/// not covered by any interval in `busy` (sorted, non-overlapping).
fn free_gaps(period_start: u32, period_end: u32, busy: &[(u32, u32)]) -> Vec<(u32, u32)> {
    let mut gaps = Vec::new();
    let mut cursor = period_start;
    for &(busy_start, busy_end) in busy {
        if busy_end <= cursor || busy_start >= period_end {
            continue;
        }
        if busy_start > cursor {
            gaps.push((cursor, busy_start.min(period_end)));
        }
        cursor = cursor.max(busy_end);
        if cursor >= period_end {
            break;
        }
    }
    if cursor < period_end {
        gaps.push((cursor, period_end));
    }
    gaps
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_slots_on_empty_day_returns_morning_and_afternoon() {
        let cal = WorkCalendar::default();
        let book = WorkerDayBook::new();
        let date = NaiveDate::from_ymd_opt(2026, 7, 27).unwrap();
        let gaps = book.find_slots(&cal, 1, date, None, false, 0);
        assert_eq!(
            gaps,
            vec![
                (cal.morning_start_minutes, cal.lunch_start_minutes),
                (cal.lunch_end_minutes, cal.afternoon_end_minutes),
            ]
        );
    }

    #[test]
    fn find_slots_excludes_overtime_when_disallowed() {
        let cal = WorkCalendar::default();
        let book = WorkerDayBook::new();
        let date = NaiveDate::from_ymd_opt(2026, 7, 27).unwrap();
        let gaps = book.find_slots(&cal, 1, date, None, false, 240);
        assert!(gaps.iter().all(|(_, e)| *e <= cal.afternoon_end_minutes));
    }

    #[test]
    fn find_slots_includes_overtime_window_when_allowed() {
        let cal = WorkCalendar::default();
        let book = WorkerDayBook::new();
        let date = NaiveDate::from_ymd_opt(2026, 7, 27).unwrap();
        let gaps = book.find_slots(&cal, 1, date, None, true, 240);
        let last = gaps.last().unwrap();
        assert_eq!(last.1, cal.afternoon_end_minutes + 240);
    }

    #[test]
    fn commit_slot_splits_regular_and_overtime_minutes() {
        let cal = WorkCalendar::default();
        let mut book = WorkerDayBook::new();
        let date = NaiveDate::from_ymd_opt(2026, 7, 27).unwrap();
        // 15:00 to 16:00 spans the 15:30 boundary: 30 regular, 30 overtime.
        book.commit_slot(&cal, 1, date, 15 * 60, 16 * 60);
        assert_eq!(book.regular_minutes_used(1, date), 30);
        assert_eq!(book.overtime_minutes_used(1, date), 30);
    }

    #[test]
    fn commit_slot_removes_gap_from_future_find_slots() {
        let cal = WorkCalendar::default();
        let mut book = WorkerDayBook::new();
        let date = NaiveDate::from_ymd_opt(2026, 7, 27).unwrap();
        book.commit_slot(&cal, 1, date, cal.morning_start_minutes, cal.morning_start_minutes + 60);
        let gaps = book.find_slots(&cal, 1, date, None, false, 0);
        assert_eq!(gaps[0], (cal.morning_start_minutes + 60, cal.lunch_start_minutes));
    }

    #[test]
    fn find_slots_respects_earliest_start() {
        let cal = WorkCalendar::default();
        let book = WorkerDayBook::new();
        let date = NaiveDate::from_ymd_opt(2026, 7, 27).unwrap();
        let earliest = cal.morning_start_minutes + 30;
        let gaps = book.find_slots(&cal, 1, date, Some(earliest), false, 0);
        assert_eq!(gaps[0].0, earliest);
    }

    #[test]
    fn gaps_below_minimum_block_are_discarded() {
        let cal = WorkCalendar::default();
        let mut book = WorkerDayBook::new();
        let date = NaiveDate::from_ymd_opt(2026, 7, 27).unwrap();
        // Leave only a 10-minute gap before lunch.
        book.commit_slot(
            &cal,
            1,
            date,
            cal.morning_start_minutes,
            cal.lunch_start_minutes - 10,
        );
        let gaps = book.find_slots(&cal, 1, date, None, false, 0);
        assert!(gaps.iter().all(|(s, e)| e - s >= MIN_BLOCK_MINUTES));
        assert!(!gaps.iter().any(|&(s, e)| s == cal.lunch_start_minutes - 10 && e == cal.lunch_start_minutes));
    }
}
