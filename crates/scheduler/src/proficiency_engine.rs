//! C9 — derives a worker's proficiency level from recent completed-work
//! efficiency, and proposes (never applies) automatic level adjustments
//! (spec §4.9).

use planning_config::ProficiencyBandsConfig;
use planning_domain::{
    CompletedAssignment, OutputHistorySample, OutputTrend, ProficiencyAdjustment, ProficiencyAdjustmentReason,
    ProficiencyLevel, ProficiencyTrigger, ProductStepId, WorkerId,
};

/// Fewer samples than this and the engine declines to propose a change —
/// there isn't enough signal yet (spec §4.9 "sufficient recent history").
pub const MIN_SAMPLE_SIZE: usize = 5;

/// Map an average efficiency percentage to a level 1..5 using the band
/// cut-points (spec §4.9, §3): `>= band_5_min` is level 5, down to `< band_2_min`
/// which is level 1.
pub fn level_for_efficiency(avg_efficiency_pct: f64, bands: &ProficiencyBandsConfig) -> ProficiencyLevel {
    if avg_efficiency_pct >= bands.band_5_min {
        5
    } else if avg_efficiency_pct >= bands.band_4_min {
        4
    } else if avg_efficiency_pct >= bands.band_3_min {
        3
    } else if avg_efficiency_pct >= bands.band_2_min {
        2
    } else {
        1
    }
}

/// Average `efficiency_pct()` over `assignments`, ignoring any with a zero
/// `actual_seconds` (undefined rate). `None` if nothing is measurable.
fn average_efficiency(assignments: &[CompletedAssignment]) -> Option<(f64, usize)> {
    let measured: Vec<f64> = assignments.iter().filter_map(|a| a.efficiency_pct()).collect();
    if measured.is_empty() {
        return None;
    }
    let sum: f64 = measured.iter().sum();
    Some((sum / measured.len() as f64, measured.len()))
}

/// Mean efficiency above which sustained performance earns a level bump
/// (spec §4.9 "Auto-adjustment batch").
const AUTO_INCREASE_THRESHOLD_PCT: f64 = 120.0;

/// Mean efficiency below which sustained underperformance costs a level
/// (spec §4.9 "Auto-adjustment batch").
const AUTO_DECREASE_THRESHOLD_PCT: f64 = 80.0;

/// Compare a worker's current level against their recent completed
/// assignments for `step_id` and propose a single-level change if
/// warranted. Unlike `level_for_efficiency` (which derives a worker's
/// *initial* level from the band table), the auto-adjustment batch only
/// ever steps one level at a time, off a separate pair of thresholds: an
/// increase when the mean is above 120% and there is still room to grow,
/// a decrease when it's below 80% and there is still room to fall (spec
/// §4.9). Returns `None` when there isn't enough data or no threshold is
/// crossed — callers persist the result via
/// `Repository::insert_proficiency_adjustment` only when `Some`.
pub fn propose_adjustment(
    worker_id: WorkerId,
    step_id: ProductStepId,
    current_level: ProficiencyLevel,
    recent_assignments: &[CompletedAssignment],
    _bands: &ProficiencyBandsConfig,
) -> Option<ProficiencyAdjustment> {
    let (avg_efficiency_pct, sample_size) = average_efficiency(recent_assignments)?;
    if sample_size < MIN_SAMPLE_SIZE {
        return None;
    }

    let (new_level, reason) = if avg_efficiency_pct > AUTO_INCREASE_THRESHOLD_PCT && current_level < 5 {
        (current_level + 1, ProficiencyAdjustmentReason::AutoIncrease)
    } else if avg_efficiency_pct < AUTO_DECREASE_THRESHOLD_PCT && current_level > 1 {
        (current_level - 1, ProficiencyAdjustmentReason::AutoDecrease)
    } else {
        return None;
    };

    Some(ProficiencyAdjustment {
        worker_id,
        step_id,
        previous_level: current_level,
        new_level,
        reason,
        trigger: ProficiencyTrigger {
            avg_efficiency_pct,
            sample_size: sample_size as u32,
        },
    })
}

/// Stage-by-stage speedup across one assignment's output-history stream
/// (spec §3, §4.9): `samples` must already be in chronological order. Each
/// consecutive pair yields a seconds-per-unit rate; those rates are then
/// split into thirds (begin/middle/end) and averaged. `None` if there
/// aren't at least two samples to derive a rate from.
pub fn output_trend(samples: &[OutputHistorySample]) -> Option<OutputTrend> {
    if samples.len() < 2 {
        return None;
    }

    let rates: Vec<f64> = samples
        .windows(2)
        .filter_map(|pair| {
            let delta_output = pair[1].output;
            if delta_output == 0 {
                return None;
            }
            let delta_seconds = (pair[1].recorded_at - pair[0].recorded_at).num_seconds().max(0) as f64;
            Some(delta_seconds / delta_output as f64)
        })
        .collect();

    if rates.is_empty() {
        return None;
    }

    let third = (rates.len() + 2) / 3;
    let begin = average(&rates[..third.min(rates.len())]);
    let end_start = rates.len().saturating_sub(third);
    let end = average(&rates[end_start..]);
    let middle = average(&rates[third.min(rates.len())..end_start.max(third.min(rates.len()))]);

    let speedup_pct = if begin > 0.0 { (begin - end) / begin * 100.0 } else { 0.0 };

    Some(OutputTrend {
        begin_seconds_per_unit: begin,
        middle_seconds_per_unit: middle,
        end_seconds_per_unit: end,
        speedup_pct,
    })
}

fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn assignment(worker_id: WorkerId, step_id: ProductStepId, time_per_piece_seconds: u32, actual_output: u32, actual_seconds: u32) -> CompletedAssignment {
        CompletedAssignment {
            worker_id,
            step_id,
            time_per_piece_seconds,
            actual_output,
            actual_seconds,
            completed_at: now(),
        }
    }

    fn bands() -> ProficiencyBandsConfig {
        ProficiencyBandsConfig {
            band_5_min: 130.0,
            band_4_min: 115.0,
            band_3_min: 85.0,
            band_2_min: 70.0,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 27, 0, 0, 0).unwrap()
    }

    #[test]
    fn level_bands_match_spec_cutpoints() {
        let b = bands();
        assert_eq!(level_for_efficiency(150.0, &b), 5);
        assert_eq!(level_for_efficiency(120.0, &b), 4);
        assert_eq!(level_for_efficiency(90.0, &b), 3);
        assert_eq!(level_for_efficiency(75.0, &b), 2);
        assert_eq!(level_for_efficiency(40.0, &b), 1);
    }

    #[test]
    fn insufficient_samples_proposes_nothing() {
        let b = bands();
        let assignments: Vec<_> = (0..3).map(|_| assignment(1, 1, 60, 100, 40)).collect();
        assert!(propose_adjustment(1, 1, 3, &assignments, &b).is_none());
    }

    #[test]
    fn sustained_high_efficiency_proposes_a_single_level_increase() {
        let b = bands();
        // 100 pieces at 60s/piece planned (6000s), done in 4000s actual
        // => 150% efficiency, well above the 120% trigger.
        let assignments: Vec<_> = (0..MIN_SAMPLE_SIZE).map(|_| assignment(1, 1, 60, 100, 4000)).collect();
        let adjustment = propose_adjustment(1, 1, 3, &assignments, &b).unwrap();
        assert_eq!(adjustment.new_level, 4);
        assert_eq!(adjustment.reason, ProficiencyAdjustmentReason::AutoIncrease);
    }

    #[test]
    fn level_already_at_cap_proposes_nothing_even_with_high_efficiency() {
        let b = bands();
        let assignments: Vec<_> = (0..MIN_SAMPLE_SIZE).map(|_| assignment(1, 1, 60, 100, 4000)).collect();
        assert!(propose_adjustment(1, 1, 5, &assignments, &b).is_none());
    }

    #[test]
    fn sustained_low_efficiency_proposes_a_single_level_decrease() {
        let b = bands();
        // 100 pieces at 60s/piece planned (6000s), done in 15000s actual => 40% efficiency.
        let assignments: Vec<_> = (0..MIN_SAMPLE_SIZE).map(|_| assignment(1, 1, 60, 100, 15000)).collect();
        let adjustment = propose_adjustment(1, 1, 3, &assignments, &b).unwrap();
        assert_eq!(adjustment.new_level, 2);
        assert_eq!(adjustment.reason, ProficiencyAdjustmentReason::AutoDecrease);
    }

    #[test]
    fn level_already_at_floor_proposes_nothing_even_with_low_efficiency() {
        let b = bands();
        let assignments: Vec<_> = (0..MIN_SAMPLE_SIZE).map(|_| assignment(1, 1, 60, 100, 15000)).collect();
        assert!(propose_adjustment(1, 1, 1, &assignments, &b).is_none());
    }

    #[test]
    fn matching_efficiency_proposes_nothing() {
        let b = bands();
        // 100 pieces at 60s/piece planned, done in 6000s actual => 100% efficiency,
        // inside the 80-120% band where no adjustment is warranted.
        let assignments: Vec<_> = (0..MIN_SAMPLE_SIZE).map(|_| assignment(1, 1, 60, 100, 6000)).collect();
        assert!(propose_adjustment(1, 1, 3, &assignments, &b).is_none());
    }

    #[test]
    fn efficiency_above_band_cutpoint_but_below_increase_threshold_proposes_nothing() {
        let b = bands();
        // 100 pieces at 60s/piece planned (6000s), done in 5100s actual
        // => ~117.6% efficiency: above band_4_min (115) but below the
        // 120% auto-increase trigger.
        let assignments: Vec<_> = (0..MIN_SAMPLE_SIZE).map(|_| assignment(1, 1, 60, 100, 5100)).collect();
        assert!(propose_adjustment(1, 1, 3, &assignments, &b).is_none());
    }

    #[test]
    fn output_trend_detects_speedup_across_the_stream() {
        let t0 = Utc.with_ymd_and_hms(2026, 7, 27, 8, 0, 0).unwrap();
        let samples = vec![
            OutputHistorySample { output: 10, recorded_at: t0 },
            OutputHistorySample { output: 10, recorded_at: t0 + chrono::Duration::seconds(600) },
            OutputHistorySample { output: 10, recorded_at: t0 + chrono::Duration::seconds(1100) },
            OutputHistorySample { output: 10, recorded_at: t0 + chrono::Duration::seconds(1500) },
            OutputHistorySample { output: 10, recorded_at: t0 + chrono::Duration::seconds(1850) },
        ];
        let trend = output_trend(&samples).unwrap();
        assert!(trend.end_seconds_per_unit < trend.begin_seconds_per_unit);
        assert!(trend.speedup_pct > 0.0);
    }

    #[test]
    fn output_trend_needs_at_least_two_samples() {
        let t0 = Utc.with_ymd_and_hms(2026, 7, 27, 8, 0, 0).unwrap();
        let samples = vec![OutputHistorySample { output: 10, recorded_at: t0 }];
        assert!(output_trend(&samples).is_none());
    }
}
