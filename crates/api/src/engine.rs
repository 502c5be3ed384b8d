//! `PlanningEngine` — the only place that mixes the scheduler's pure,
//! synchronous compute with the async `Repository` (C11). Every method
//! here does all of its reads, then all of its compute, then all of its
//! writes, so one logical operation sees one consistent snapshot (spec §5).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use planning_config::ProficiencyBandsConfig;
use planning_domain::{
    CompletedAssignment, DemandEntry, DemandEntryId, DemandFilter, DemandStatus, NewPlanningRun, NewScenario,
    PlanningError, PlanningRun, PlanningRunId, PlanningScenario, PlanningScenarioId, ProductStep, ProductStepId,
    ProficiencyAdjustment, ProficiencyFilter, ProficiencyHistoryEntry, Repository, RunFilter, ScheduleBlock,
    ScheduleId, Worker, WorkerId,
};
use planning_scheduler::capacity::{at_risk_demand, deadline_risk, suggest_overtime, weekly_breakdown, AtRiskDemand, CapacityDemand, OvertimeSuggestion};
use planning_scheduler::kernel::BomSteps as KernelBomSteps;
use planning_scheduler::proficiency_engine::propose_adjustment;
use planning_scheduler::replan::{replan as run_replan, ReplanInput, ReplanPolicy};
use planning_scheduler::strategy::generate_scenarios;
use planning_scheduler::{NeverCancelled, WorkCalendar};

use crate::dto::{CapacityRiskResponse, DeadlineRiskView, DemandProjectionView, StepProductivity, WeeklyBreakdownView, WorkerProductivityResponse};

pub struct PlanningEngine {
    pub repo: Arc<dyn Repository>,
    pub calendar: WorkCalendar,
    pub proficiency_bands: ProficiencyBandsConfig,
}

/// Request to `generate_run` (spec §6 `POST /api/planning/runs`).
pub struct GenerateRunRequest {
    pub name: String,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub demand_entry_ids: Option<Vec<DemandEntryId>>,
    pub created_by: Option<String>,
}

/// `{draft_entries, overtime_suggestions, regular_hours_needed,
/// overtime_hours_needed, can_meet_deadline, available_workers}` (spec
/// §4.7 step 5).
#[derive(Debug, Clone, serde::Serialize)]
pub struct ReplanResult {
    pub draft_entries: Vec<ScheduleBlock>,
    pub overtime_suggestions: Vec<OvertimeSuggestionView>,
    pub regular_hours_needed: f64,
    pub overtime_hours_needed: f64,
    pub can_meet_deadline: bool,
    pub available_workers: Vec<Worker>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct OvertimeSuggestionView {
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

impl From<OvertimeSuggestion> for OvertimeSuggestionView {
    fn from(s: OvertimeSuggestion) -> Self {
        Self {
            demand_entry_id: s.demand_entry_id,
            step_id: s.step_id,
            batch_number: s.batch_number,
            worker_id: s.worker_id,
            date: s.date,
            start_minutes: s.start_minutes,
            end_minutes: s.end_minutes,
            is_overtime: s.is_overtime,
            is_auto_suggested: s.is_auto_suggested,
            reason: s.reason,
        }
    }
}

impl PlanningEngine {
    pub fn new(repo: Arc<dyn Repository>, calendar: WorkCalendar, proficiency_bands: ProficiencyBandsConfig) -> Self {
        Self {
            repo,
            calendar,
            proficiency_bands,
        }
    }

    /// Load demand (and its resolved BOM), active workers, and live
    /// certifications in one snapshot keyed by `now`.
    async fn load_bom_steps(&self, demand: &[DemandEntry]) -> Result<HashMap<DemandEntryId, KernelBomSteps>, PlanningError> {
        let mut out = HashMap::new();
        for d in demand {
            let resolved = self.repo.get_bom_steps_with_deps(&d.bom).await?;
            out.insert(
                d.id,
                KernelBomSteps {
                    steps: resolved.steps,
                    dependencies: resolved.dependencies,
                },
            );
        }
        Ok(out)
    }

    /// Generate a planning run: loads demand/BOM/workers/certifications,
    /// runs the kernel once per strategy (C6), and persists the run plus
    /// its three scenarios (spec §4.6, §6).
    pub async fn generate_run(&self, req: GenerateRunRequest, now: DateTime<Utc>) -> Result<(PlanningRun, Vec<PlanningScenario>), PlanningError> {
        if req.window_start > req.window_end {
            return Err(PlanningError::Precondition("planning window is inverted".to_string()));
        }

        let filter = DemandFilter {
            status: if req.demand_entry_ids.is_some() { None } else { Some(DemandStatus::Pending) },
            due_before: None,
            ids: req.demand_entry_ids.clone(),
        };
        let demand = self.repo.get_demand_entries(&filter).await?;
        if demand.is_empty() {
            return Err(PlanningError::Precondition("no demand entries to plan".to_string()));
        }
        let demand_ids: Vec<DemandEntryId> = demand.iter().map(|d| d.id).collect();

        let bom_steps_by_demand = self.load_bom_steps(&demand).await?;
        let workers = self.repo.get_active_workers().await?;
        let certifications = self.repo.get_certifications(now).await?;

        let generated = generate_scenarios(
            (req.window_start, req.window_end),
            &demand,
            &bom_steps_by_demand,
            &workers,
            &certifications,
            now,
            &self.calendar,
            &NeverCancelled,
        )?;

        let run = self
            .repo
            .create_planning_run(NewPlanningRun {
                name: req.name,
                window_start: req.window_start,
                window_end: req.window_end,
                created_by: req.created_by,
            })
            .await?;

        let mut scenarios = Vec::with_capacity(generated.len());
        for g in generated {
            let scenario = self
                .repo
                .create_scenario(
                    run.id,
                    NewScenario {
                        name: format!("{:?}", g.strategy),
                        strategy: g.strategy,
                        allow_overtime: g.allow_overtime,
                        overtime_limit_hours_per_day: g.overtime_limit_hours_per_day,
                        metrics: g.output.metrics,
                        blocks: g.output.blocks,
                        warnings: g.output.warnings,
                        parent_scenario_id: None,
                    },
                )
                .await?;
            self.repo.link_scenario_demand(scenario.id, &demand_ids).await?;
            scenarios.push(scenario);
        }

        Ok((run, scenarios))
    }

    pub async fn list_runs(&self, filter: &RunFilter) -> Result<Vec<PlanningRun>, PlanningError> {
        self.repo.list_runs(filter).await
    }

    pub async fn active_run(&self) -> Result<Option<PlanningRun>, PlanningError> {
        self.repo.get_active_run().await
    }

    /// `run` plus its scenarios and the demand it was generated against
    /// (spec §6 `GET /api/planning/runs/{id}`).
    pub async fn run_detail(&self, run_id: PlanningRunId) -> Result<Option<(PlanningRun, Vec<PlanningScenario>, Vec<DemandEntry>)>, PlanningError> {
        let Some(run) = self.repo.get_run(run_id).await? else {
            return Ok(None);
        };
        let scenarios = self.repo.list_scenarios_for_run(run_id).await?;
        let mut demand_ids: Vec<DemandEntryId> = scenarios.iter().flat_map(|s| s.blocks.iter().map(|b| b.demand_entry_id)).collect();
        demand_ids.sort_unstable();
        demand_ids.dedup();
        let demand = if demand_ids.is_empty() {
            Vec::new()
        } else {
            self.repo
                .get_demand_entries(&DemandFilter {
                    status: None,
                    due_before: None,
                    ids: Some(demand_ids),
                })
                .await?
        };
        Ok(Some((run, scenarios, demand)))
    }

    pub async fn accept_scenario(&self, run_id: PlanningRunId, scenario_id: PlanningScenarioId) -> Result<u32, PlanningError> {
        self.repo.accept_scenario_as_plan_tasks(run_id, scenario_id).await
    }

    pub async fn archive_run(&self, run_id: PlanningRunId) -> Result<(), PlanningError> {
        self.repo.archive_run(run_id).await
    }

    pub async fn scenario_detail(&self, scenario_id: PlanningScenarioId) -> Result<Option<(PlanningScenario, Vec<DemandProjectionView>)>, PlanningError> {
        let Some(scenario) = self.repo.get_scenario(scenario_id).await? else {
            return Ok(None);
        };
        let projections = self.scenario_projections(&scenario).await?;
        Ok(Some((scenario, projections)))
    }

    async fn scenario_projections(&self, scenario: &PlanningScenario) -> Result<Vec<DemandProjectionView>, PlanningError> {
        let mut demand_ids: Vec<DemandEntryId> = scenario.blocks.iter().map(|b| b.demand_entry_id).collect();
        demand_ids.sort_unstable();
        demand_ids.dedup();

        let mut projections = Vec::with_capacity(demand_ids.len());
        for demand_entry_id in demand_ids {
            let demand = self.repo.get_order(demand_entry_id).await?;
            let projected_completion_date = scenario.blocks.iter().filter(|b| b.demand_entry_id == demand_entry_id).map(|b| b.date).max();
            let can_meet_target = projected_completion_date.is_some_and(|d| d <= demand.due_date);
            projections.push(DemandProjectionView {
                demand_entry_id,
                due_date: demand.due_date,
                projected_completion_date,
                can_meet_target,
            });
        }
        projections.sort_by_key(|p| p.demand_entry_id);
        Ok(projections)
    }

    pub async fn compare_run(&self, run_id: PlanningRunId) -> Result<Option<(PlanningRun, Vec<PlanningScenario>)>, PlanningError> {
        let Some(run) = self.repo.get_run(run_id).await? else {
            return Ok(None);
        };
        let scenarios = self.repo.list_scenarios_for_run(run_id).await?;
        Ok(Some((run, scenarios)))
    }

    /// Replan draft (spec §4.7 steps 1-5): folds the existing schedule's
    /// elapsed/completed work back in, runs the kernel fresh for the rest,
    /// and surfaces overtime suggestions (C10) for any demand still
    /// projected late.
    pub async fn replan(&self, schedule_id: ScheduleId, as_of: NaiveDate, policy: ReplanPolicy, now: DateTime<Utc>) -> Result<ReplanResult, PlanningError> {
        let scenario = self.repo.get_schedule(schedule_id).await?;
        let existing_blocks = self.repo.get_schedule_blocks(schedule_id).await?;

        let mut demand_ids: Vec<DemandEntryId> = existing_blocks.iter().map(|b| b.demand_entry_id).collect();
        demand_ids.sort_unstable();
        demand_ids.dedup();

        let mut demand_entries = Vec::with_capacity(demand_ids.len());
        for id in &demand_ids {
            demand_entries.push(self.repo.get_order(*id).await?);
        }

        let bom_steps_by_demand = self.load_bom_steps(&demand_entries).await?;
        let workers = self.repo.get_active_workers().await?;
        let certifications = self.repo.get_certifications(now).await?;

        let mut steps_by_id: HashMap<ProductStepId, ProductStep> = HashMap::new();
        for bom in bom_steps_by_demand.values() {
            for step in &bom.steps {
                steps_by_id.insert(step.id, step.clone());
            }
        }

        let window_end = demand_entries.iter().map(|d| d.due_date).max().unwrap_or(as_of);
        let planning_window = (as_of, window_end.max(as_of));
        let due_dates: HashMap<DemandEntryId, NaiveDate> = demand_entries.iter().map(|d| (d.id, d.due_date)).collect();

        let strategy_config = planning_domain::StrategyConfig {
            allow_overtime: scenario.allow_overtime,
            overtime_limit_hours_per_day: scenario.overtime_limit_hours_per_day,
            priority_weight: scenario.strategy.config().priority_weight,
        };

        let replan_input = ReplanInput {
            as_of,
            existing_blocks,
            completed_block_ids: Default::default(),
            policy,
            planning_window,
            demand_entries,
            bom_steps_by_demand,
            workers: &workers,
            certifications: &certifications,
            certification_reference_time: now,
            calendar: &self.calendar,
            strategy: strategy_config,
        };

        let output = run_replan(replan_input, &NeverCancelled)?;

        let projected_completions: HashMap<DemandEntryId, NaiveDate> = output
            .demand_projections
            .iter()
            .filter_map(|p| p.projected_completion_date.map(|c| (p.demand_entry_id, c)))
            .collect();

        let at_risk: Vec<AtRiskDemand> = at_risk_demand(&due_dates, &projected_completions);
        let overtime_suggestions: Vec<OvertimeSuggestion> = suggest_overtime(
            as_of,
            &at_risk,
            &output.blocks,
            &steps_by_id,
            &workers,
            &certifications,
            now,
            &self.calendar,
            scenario.overtime_limit_hours_per_day,
        );
        let overtime_hours_needed: f64 = overtime_suggestions.iter().map(|s| (s.end_minutes - s.start_minutes) as f64 / 60.0).sum();
        let overtime_suggestions = overtime_suggestions.into_iter().map(OvertimeSuggestionView::from).collect();
        let can_meet_deadline = output.demand_projections.iter().all(|p| p.can_meet_target);

        Ok(ReplanResult {
            draft_entries: output.blocks,
            overtime_suggestions,
            regular_hours_needed: output.metrics.labor_hours,
            overtime_hours_needed,
            can_meet_deadline,
            available_workers: workers,
        })
    }

    pub async fn commit_replan(&self, schedule_id: ScheduleId, accepted_blocks: Vec<ScheduleBlock>) -> Result<Vec<ScheduleBlock>, PlanningError> {
        self.repo.commit_replan_blocks(schedule_id, accepted_blocks).await?;
        self.repo.get_schedule_blocks(schedule_id).await
    }

    /// C9 rollup for one worker: recent completed-assignment efficiency,
    /// broken down by step (spec §6 "productivity").
    pub async fn worker_productivity(&self, worker_id: WorkerId, since: DateTime<Utc>) -> Result<WorkerProductivityResponse, PlanningError> {
        let assignments = self.repo.get_completed_assignments(worker_id, None, since).await?;
        let proficiencies = self
            .repo
            .get_proficiencies(&ProficiencyFilter {
                worker_ids: Some(vec![worker_id]),
                step_ids: None,
            })
            .await?;

        let overall = average_efficiency(&assignments);
        let mut by_step_ids: Vec<i64> = assignments.iter().map(|a| a.step_id).collect();
        by_step_ids.sort_unstable();
        by_step_ids.dedup();

        let mut by_step = Vec::with_capacity(by_step_ids.len());
        for step_id in by_step_ids {
            let step_assignments: Vec<CompletedAssignment> = assignments.iter().filter(|a| a.step_id == step_id).cloned().collect();
            let (avg_efficiency_pct, sample_size) = match average_efficiency(&step_assignments) {
                Some((avg, n)) => (Some(avg), n as u32),
                None => (None, 0),
            };
            let current_level = proficiencies
                .iter()
                .find(|p| p.step_id == step_id)
                .map(|p| p.level)
                .unwrap_or(planning_domain::DEFAULT_PROFICIENCY_LEVEL);
            by_step.push(StepProductivity {
                step_id,
                current_level,
                avg_efficiency_pct,
                sample_size,
            });
        }

        let (overall_avg_efficiency_pct, overall_sample_size) = match overall {
            Some((avg, n)) => (Some(avg), n as u32),
            None => (None, 0),
        };

        Ok(WorkerProductivityResponse {
            worker_id,
            overall_avg_efficiency_pct,
            overall_sample_size,
            by_step,
        })
    }

    /// C9 batch: proposes and applies an adjustment for every
    /// worker/step proficiency with sufficient recent history (spec §4.9).
    pub async fn recalculate_proficiencies(&self, since: DateTime<Utc>, now: DateTime<Utc>) -> Result<Vec<ProficiencyAdjustment>, PlanningError> {
        let proficiencies = self.repo.get_proficiencies(&ProficiencyFilter::default()).await?;
        let mut adjustments = Vec::new();

        for p in proficiencies {
            let assignments = self.repo.get_completed_assignments(p.worker_id, Some(p.step_id), since).await?;
            let Some(adjustment) = propose_adjustment(p.worker_id, p.step_id, p.level, &assignments, &self.proficiency_bands) else {
                continue;
            };
            self.repo.insert_proficiency_adjustment(&adjustment).await?;
            self.repo
                .append_proficiency_history(ProficiencyHistoryEntry {
                    worker_id: adjustment.worker_id,
                    step_id: adjustment.step_id,
                    previous_level: adjustment.previous_level,
                    new_level: adjustment.new_level,
                    reason: adjustment.reason,
                    trigger: Some(adjustment.trigger),
                    recorded_at: now,
                })
                .await?;
            adjustments.push(adjustment);
        }

        Ok(adjustments)
    }

    /// C10, scenario-independent half (spec §4.10): open demand vs.
    /// workforce hours over `[from, horizon_end]`, with a per-demand
    /// deadline-risk table and a weekly breakdown. Never reads a generated
    /// scenario — this is the "what-if and risk screens" consultation named
    /// in spec §2's dataflow paragraph, not a post-hoc check of one.
    pub async fn capacity_risk(&self, from: NaiveDate, horizon_end: NaiveDate) -> Result<CapacityRiskResponse, PlanningError> {
        if from > horizon_end {
            return Err(PlanningError::Precondition("capacity horizon is inverted".to_string()));
        }

        let demand = self
            .repo
            .get_demand_entries(&DemandFilter {
                status: None,
                due_before: None,
                ids: None,
            })
            .await?;
        let open_demand: Vec<DemandEntry> = demand.into_iter().filter(|d| d.status != DemandStatus::Completed).collect();

        let bom_steps_by_demand = self.load_bom_steps(&open_demand).await?;
        let workers = self.repo.get_active_workers().await?;
        let active_worker_ids: Vec<WorkerId> = workers.iter().map(|w| w.id).collect();
        let overrides = HashMap::new();

        let demands: Vec<CapacityDemand> = open_demand
            .iter()
            .map(|d| {
                let total_seconds_per_piece = bom_steps_by_demand
                    .get(&d.id)
                    .map(|b| b.steps.iter().map(|s| s.time_per_piece_seconds as u64).sum())
                    .unwrap_or(0);
                CapacityDemand {
                    demand_entry_id: d.id,
                    due_date: d.due_date,
                    quantity: d.quantity,
                    total_seconds_per_piece,
                    proficiency_multiplier: None,
                }
            })
            .collect();

        let risk = deadline_risk(from, &demands, &active_worker_ids, &overrides, &self.calendar);
        let weeks = weekly_breakdown((from, horizon_end), &demands, &active_worker_ids, &overrides, &self.calendar);

        Ok(CapacityRiskResponse {
            deadline_risk: risk
                .into_iter()
                .map(|r| DeadlineRiskView {
                    demand_entry_id: r.demand_entry_id,
                    required_hours: r.required_hours,
                    available_hours_until_due: r.available_hours_until_due,
                    can_meet: r.can_meet,
                    shortfall_hours: r.shortfall_hours,
                })
                .collect(),
            weekly_breakdown: weeks
                .into_iter()
                .map(|w| WeeklyBreakdownView {
                    week_start: w.week_start,
                    available_hours: w.available_hours,
                    required_hours: w.required_hours,
                })
                .collect(),
        })
    }
}

fn average_efficiency(assignments: &[CompletedAssignment]) -> Option<(f64, usize)> {
    let measured: Vec<f64> = assignments.iter().filter_map(|a| a.efficiency_pct()).collect();
    if measured.is_empty() {
        return None;
    }
    let sum: f64 = measured.iter().sum();
    Some((sum / measured.len() as f64, measured.len()))
}

/// Parse the `policy` field of a replan request (spec §4.7); unknown or
/// absent values default to preserving already-scheduled future work.
pub fn parse_replan_policy(raw: Option<&str>) -> ReplanPolicy {
    match raw {
        Some("reschedule_all") => ReplanPolicy::RescheduleAll,
        _ => ReplanPolicy::PreserveFutureWork,
    }
}
