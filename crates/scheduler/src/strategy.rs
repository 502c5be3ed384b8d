//! C6 — the strategy layer: runs the kernel once per generated strategy
//! and returns the three candidate scenarios a planning run always produces
//! (spec §4.5 tuning table, §4.6).

use crate::cancellation::CancellationToken;
use crate::kernel::{run_kernel, BomSteps, ScenarioInput, ScenarioOutput};
use crate::WorkCalendar;
use chrono::{DateTime, NaiveDate, Utc};
use planning_domain::{DemandEntry, DemandEntryId, EquipmentCertification, PlanningError, Strategy, Worker, GENERATED_STRATEGIES};
use std::collections::HashMap;

/// One of the three strategies' kernel output, plus the tuning it ran with.
#[derive(Debug, Clone)]
pub struct GeneratedScenario {
    pub strategy: Strategy,
    pub allow_overtime: bool,
    pub overtime_limit_hours_per_day: u32,
    pub output: ScenarioOutput,
}

/// Run the kernel once per entry in `GENERATED_STRATEGIES`, in that fixed
/// order. A single infeasible strategy aborts the whole batch — the BOM
/// graph that makes one strategy's kernel run cyclic is cyclic for all
/// three, so there is nothing to gain from scheduling the others (spec
/// §4.5, §4.6).
#[allow(clippy::too_many_arguments)]
pub fn generate_scenarios(
    planning_window: (NaiveDate, NaiveDate),
    demand_entries: &[DemandEntry],
    bom_steps_by_demand: &HashMap<DemandEntryId, BomSteps>,
    workers: &[Worker],
    certifications: &[EquipmentCertification],
    certification_reference_time: DateTime<Utc>,
    calendar: &WorkCalendar,
    cancellation: &dyn CancellationToken,
) -> Result<Vec<GeneratedScenario>, PlanningError> {
    GENERATED_STRATEGIES
        .iter()
        .map(|&strategy| {
            let config = strategy.config();
            let input = ScenarioInput {
                planning_window,
                demand_entries: demand_entries.to_vec(),
                bom_steps_by_demand: bom_steps_by_demand.clone(),
                workers,
                certifications,
                certification_reference_time,
                calendar,
                strategy: config,
            };
            let output = run_kernel(&input, cancellation)?;
            Ok(GeneratedScenario {
                strategy,
                allow_overtime: config.allow_overtime,
                overtime_limit_hours_per_day: config.overtime_limit_hours_per_day,
                output,
            })
        })
        .collect()
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

    #[test]
    fn generates_one_scenario_per_strategy_in_order() {
        let calendar = WorkCalendar::default();
        let workers = vec![worker(1), worker(2)];
        let window_start = NaiveDate::from_ymd_opt(2026, 7, 27).unwrap();
        let window_end = NaiveDate::from_ymd_opt(2026, 8, 20).unwrap();

        let demand = DemandEntry {
            id: 1,
            source: DemandSource::Internal,
            quantity: 20,
            due_date: window_end,
            customer_name: None,
            priority: 2,
            status: DemandStatus::Pending,
            bom: BomReference::ProductDefault(1),
            batching: BatchingPreferences::none(),
        };
        let mut boms = HashMap::new();
        boms.insert(
            1,
            BomSteps {
                steps: vec![ProductStep {
                    id: 1,
                    product_id: 1,
                    name: "Cut".to_string(),
                    step_code: "S1".to_string(),
                    category: StepCategory::Cutting,
                    time_per_piece_seconds: 30,
                    sequence: 1,
                    equipment_id: None,
                    work_category: None,
                }],
                dependencies: vec![],
            },
        );

        let scenarios = generate_scenarios(
            (window_start, window_end),
            &[demand],
            &boms,
            &workers,
            &[],
            Utc.with_ymd_and_hms(2026, 7, 27, 0, 0, 0).unwrap(),
            &calendar,
            &NeverCancelled,
        )
        .unwrap();

        assert_eq!(scenarios.len(), 3);
        assert_eq!(
            scenarios.iter().map(|s| s.strategy).collect::<Vec<_>>(),
            GENERATED_STRATEGIES.to_vec()
        );
        // MinimizeCost never allows overtime (spec §4.5 tuning table).
        assert!(!scenarios[1].allow_overtime);
    }
}
