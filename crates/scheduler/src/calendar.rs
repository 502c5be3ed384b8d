//! C1 — work-day model: morning/lunch/afternoon, weekend skipping,
//! minute<->HH:MM, advance-skipping-lunch, next-workday (spec §4.1).
//!
//! All time values are local wall-clock; no time-zone conversion happens
//! here. Minutes are counted from local midnight.

use chrono::{Datelike, NaiveDate, Weekday};
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CalendarError {
    #[error("malformed time string: {0}")]
    MalformedTime(String),
}

/// Work-calendar policy. Defaults in spec §4.1: morning_start = 07:00,
/// lunch = [11:00, 11:30), afternoon_end = 15:30 (480 regular minutes/day).
#[derive(Debug, Clone)]
pub struct WorkCalendar {
    pub morning_start_minutes: u32,
    pub lunch_start_minutes: u32,
    pub lunch_end_minutes: u32,
    pub afternoon_end_minutes: u32,
    /// Hard ceiling an overtime window may never exceed, regardless of a
    /// scenario's own `overtime_limit_hours_per_day`.
    pub overtime_window_end_minutes: u32,
    /// Dates skipped by `next_workday` in addition to Saturday/Sunday.
    pub holidays: BTreeSet<NaiveDate>,
}

impl Default for WorkCalendar {
    fn default() -> Self {
        Self {
            morning_start_minutes: 7 * 60,
            lunch_start_minutes: 11 * 60,
            lunch_end_minutes: 11 * 60 + 30,
            afternoon_end_minutes: 15 * 60 + 30,
            overtime_window_end_minutes: 19 * 60 + 30,
            holidays: BTreeSet::new(),
        }
    }
}

impl WorkCalendar {
    pub fn regular_minutes_per_day(&self) -> u32 {
        (self.afternoon_end_minutes - self.morning_start_minutes)
            - (self.lunch_end_minutes - self.lunch_start_minutes)
    }

    /// The overtime window's end for a given per-day cap, clipped to
    /// `overtime_window_end_minutes`.
    pub fn overtime_end_minutes(&self, overtime_limit_hours_per_day: u32) -> u32 {
        let requested = self.afternoon_end_minutes + overtime_limit_hours_per_day * 60;
        requested.min(self.overtime_window_end_minutes)
    }

    /// Does `[start, end)` overlap the lunch window?
    fn lunch_overlap_minutes(&self, start: u32, end: u32) -> u32 {
        let overlap_start = start.max(self.lunch_start_minutes);
        let overlap_end = end.min(self.lunch_end_minutes);
        overlap_end.saturating_sub(overlap_start)
    }

    /// Minutes of actual work in `[start, end)`, excluding the lunch
    /// overlap (spec §4.1).
    pub fn work_minutes(&self, start: u32, end: u32) -> u32 {
        end.saturating_sub(start)
            .saturating_sub(self.lunch_overlap_minutes(start, end))
    }

    /// Add `delta` work-minutes to `start`, jumping over lunch. Clips at
    /// `afternoon_end_minutes` (spec §4.1) — callers that need an overtime
    /// extension must clip against `overtime_end_minutes` separately.
    pub fn advance_time(&self, start: u32, delta: u32) -> u32 {
        let mut cursor = start;
        if cursor < self.lunch_end_minutes && cursor + delta > self.lunch_start_minutes {
            // The span crosses the lunch window; hop over it first.
            let before_lunch = self.lunch_start_minutes.saturating_sub(cursor);
            if delta <= before_lunch {
                cursor += delta;
            } else {
                cursor = self.lunch_end_minutes + (delta - before_lunch);
            }
        } else {
            cursor += delta;
        }
        cursor.min(self.afternoon_end_minutes)
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays.contains(&date)
    }

    pub fn is_weekend(&self, date: NaiveDate) -> bool {
        matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    }

    pub fn is_workday(&self, date: NaiveDate) -> bool {
        !self.is_weekend(date) && !self.is_holiday(date)
    }

    /// The next date that is not a weekend or a configured holiday.
    /// Note this always advances at least one day, even if `date` is
    /// itself a workday — callers who want "today or the next workday"
    /// should check `is_workday` first.
    pub fn next_workday(&self, date: NaiveDate) -> NaiveDate {
        let mut cursor = date.succ_opt().expect("date arithmetic should not overflow");
        while !self.is_workday(cursor) {
            cursor = cursor.succ_opt().expect("date arithmetic should not overflow");
        }
        cursor
    }

    /// `date` itself if it's a workday, otherwise the next workday.
    pub fn same_or_next_workday(&self, date: NaiveDate) -> NaiveDate {
        if self.is_workday(date) {
            date
        } else {
            self.next_workday(date)
        }
    }
}

/// Parse `HH:MM` into minutes since midnight.
pub fn time_to_minutes(s: &str) -> Result<u32, CalendarError> {
    let (h, m) = s
        .split_once(':')
        .ok_or_else(|| CalendarError::MalformedTime(s.to_string()))?;
    let h: u32 = h.parse().map_err(|_| CalendarError::MalformedTime(s.to_string()))?;
    let m: u32 = m.parse().map_err(|_| CalendarError::MalformedTime(s.to_string()))?;
    if h > 23 || m > 59 {
        return Err(CalendarError::MalformedTime(s.to_string()));
    }
    Ok(h * 60 + m)
}

/// Format minutes since midnight as `HH:MM`.
pub fn minutes_to_time(minutes: u32) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_round_trips() {
        assert_eq!(time_to_minutes("07:00").unwrap(), 420);
        assert_eq!(minutes_to_time(420), "07:00");
        assert_eq!(time_to_minutes("15:30").unwrap(), 930);
    }

    #[test]
    fn malformed_time_is_rejected() {
        assert!(time_to_minutes("abc").is_err());
        assert!(time_to_minutes("25:00").is_err());
        assert!(time_to_minutes("10:99").is_err());
    }

    #[test]
    fn regular_minutes_per_day_is_480() {
        assert_eq!(WorkCalendar::default().regular_minutes_per_day(), 480);
    }

    #[test]
    fn work_minutes_excludes_lunch_overlap() {
        let cal = WorkCalendar::default();
        // 10:00 to 12:00 crosses the 30-minute lunch window.
        assert_eq!(cal.work_minutes(600, 720), 90);
        // Entirely before lunch.
        assert_eq!(cal.work_minutes(420, 480), 60);
    }

    #[test]
    fn advance_time_jumps_lunch() {
        let cal = WorkCalendar::default();
        // 10:50 + 20 minutes of work should land at 11:40 (skips the 30m lunch).
        let start = time_to_minutes("10:50").unwrap();
        let end = cal.advance_time(start, 20);
        assert_eq!(end, time_to_minutes("11:40").unwrap());
    }

    #[test]
    fn advance_time_clips_at_afternoon_end() {
        let cal = WorkCalendar::default();
        let start = time_to_minutes("15:00").unwrap();
        let end = cal.advance_time(start, 120);
        assert_eq!(end, cal.afternoon_end_minutes);
    }

    #[test]
    fn next_workday_skips_weekend() {
        let cal = WorkCalendar::default();
        // Friday 2026-07-31 -> Monday 2026-08-03
        let friday = NaiveDate::from_ymd_opt(2026, 7, 31).unwrap();
        assert_eq!(cal.next_workday(friday), NaiveDate::from_ymd_opt(2026, 8, 3).unwrap());
    }

    #[test]
    fn next_workday_skips_configured_holiday() {
        let mut cal = WorkCalendar::default();
        let monday = NaiveDate::from_ymd_opt(2026, 8, 3).unwrap();
        let tuesday = NaiveDate::from_ymd_opt(2026, 8, 4).unwrap();
        cal.holidays.insert(tuesday);
        assert_eq!(cal.next_workday(monday), NaiveDate::from_ymd_opt(2026, 8, 5).unwrap());
    }

    #[test]
    fn overtime_end_is_clamped() {
        let cal = WorkCalendar::default();
        assert_eq!(cal.overtime_end_minutes(4), time_to_minutes("19:30").unwrap());
        // Requesting an 8-hour window would exceed the hard cap; clip it.
        assert_eq!(cal.overtime_end_minutes(8), cal.overtime_window_end_minutes);
    }
}
