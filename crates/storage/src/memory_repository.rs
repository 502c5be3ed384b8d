//! An in-memory `Repository` fake (spec §4.11 "snapshot isolation ... to
//! enable unit testing with in-memory fakes", design notes "globally
//! mutable `db` module"). Used by `crates/api`'s integration tests and by
//! `crates/storage`'s own tests below; never built against a real
//! database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use planning_domain::*;
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Default)]
struct State {
    demand_entries: Vec<DemandEntry>,
    bom_steps: HashMap<i64, BomSteps>,
    workers: Vec<Worker>,
    equipment: Vec<Equipment>,
    certifications: Vec<EquipmentCertification>,
    proficiencies: Vec<WorkerProficiency>,
    runs: Vec<PlanningRun>,
    scenarios: Vec<PlanningScenario>,
    completed_assignments: Vec<CompletedAssignment>,
    output_history: HashMap<ScheduleBlockId, Vec<OutputHistorySample>>,
    proficiency_history: Vec<ProficiencyHistoryEntry>,
    plan_task_demand_ids: std::collections::HashSet<(PlanningRunId, DemandEntryId)>,
    next_run_id: i64,
    next_scenario_id: i64,
    next_block_id: i64,
    next_worker_id: i64,
}

/// `bom_steps` is keyed by whatever raw id a `BomReference` carries — this
/// fake does not distinguish build-version ids from product ids, so seed
/// tests must use disjoint id spaces for the two if both are exercised.
pub struct InMemoryRepository {
    state: Mutex<State>,
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                next_run_id: 1,
                next_scenario_id: 1,
                next_block_id: 1,
                next_worker_id: 1,
                ..Default::default()
            }),
        }
    }

    pub async fn seed_demand(&self, entries: Vec<DemandEntry>) {
        self.state.lock().await.demand_entries = entries;
    }

    pub async fn seed_bom(&self, bom_id: i64, steps: BomSteps) {
        self.state.lock().await.bom_steps.insert(bom_id, steps);
    }

    pub async fn seed_workers(&self, workers: Vec<Worker>) {
        self.state.lock().await.workers = workers;
    }

    pub async fn seed_equipment(&self, equipment: Vec<Equipment>) {
        self.state.lock().await.equipment = equipment;
    }

    pub async fn seed_certifications(&self, certifications: Vec<EquipmentCertification>) {
        self.state.lock().await.certifications = certifications;
    }

    pub async fn seed_proficiencies(&self, proficiencies: Vec<WorkerProficiency>) {
        self.state.lock().await.proficiencies = proficiencies;
    }

    pub async fn seed_completed_assignments(&self, assignments: Vec<CompletedAssignment>) {
        self.state.lock().await.completed_assignments = assignments;
    }

    fn bom_id(bom: &BomReference) -> i64 {
        match bom {
            BomReference::BuildVersion(id) => *id,
            BomReference::ProductDefault(id) => *id,
        }
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_demand_entries(&self, filter: &DemandFilter) -> Result<Vec<DemandEntry>, PlanningError> {
        let state = self.state.lock().await;
        Ok(state
            .demand_entries
            .iter()
            .filter(|d| filter.status.is_none_or(|s| d.status == s))
            .filter(|d| filter.due_before.is_none_or(|due| d.due_date <= due))
            .filter(|d| filter.ids.as_ref().is_none_or(|ids| ids.contains(&d.id)))
            .cloned()
            .collect())
    }

    async fn get_bom_steps_with_deps(&self, bom: &BomReference) -> Result<BomSteps, PlanningError> {
        let state = self.state.lock().await;
        Ok(state.bom_steps.get(&Self::bom_id(bom)).cloned().unwrap_or_default())
    }

    async fn get_active_workers(&self) -> Result<Vec<Worker>, PlanningError> {
        let state = self.state.lock().await;
        Ok(state.workers.iter().filter(|w| w.is_active()).cloned().collect())
    }

    async fn get_equipment(&self) -> Result<Vec<Equipment>, PlanningError> {
        Ok(self.state.lock().await.equipment.clone())
    }

    async fn get_certifications(&self, _now: DateTime<Utc>) -> Result<Vec<EquipmentCertification>, PlanningError> {
        Ok(self.state.lock().await.certifications.clone())
    }

    async fn get_proficiencies(&self, filter: &ProficiencyFilter) -> Result<Vec<WorkerProficiency>, PlanningError> {
        let state = self.state.lock().await;
        Ok(state
            .proficiencies
            .iter()
            .filter(|p| filter.worker_ids.as_ref().is_none_or(|ids| ids.contains(&p.worker_id)))
            .filter(|p| filter.step_ids.as_ref().is_none_or(|ids| ids.contains(&p.step_id)))
            .cloned()
            .collect())
    }

    async fn get_schedule(&self, schedule_id: ScheduleId) -> Result<PlanningScenario, PlanningError> {
        let state = self.state.lock().await;
        state
            .scenarios
            .iter()
            .find(|s| s.id == schedule_id)
            .cloned()
            .ok_or_else(|| PlanningError::NotFound(format!("schedule {schedule_id}")))
    }

    async fn get_schedule_blocks(&self, schedule_id: ScheduleId) -> Result<Vec<ScheduleBlock>, PlanningError> {
        let state = self.state.lock().await;
        Ok(state
            .scenarios
            .iter()
            .find(|s| s.id == schedule_id)
            .map(|s| s.blocks.clone())
            .unwrap_or_default())
    }

    async fn get_order(&self, demand_entry_id: DemandEntryId) -> Result<DemandEntry, PlanningError> {
        let state = self.state.lock().await;
        state
            .demand_entries
            .iter()
            .find(|d| d.id == demand_entry_id)
            .cloned()
            .ok_or_else(|| PlanningError::NotFound(format!("demand entry {demand_entry_id}")))
    }

    async fn list_runs(&self, filter: &RunFilter) -> Result<Vec<PlanningRun>, PlanningError> {
        let state = self.state.lock().await;
        let limit = filter.limit.unwrap_or(100) as usize;
        Ok(state
            .runs
            .iter()
            .rev()
            .filter(|r| filter.status.is_none_or(|s| r.status == s))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get_run(&self, run_id: PlanningRunId) -> Result<Option<PlanningRun>, PlanningError> {
        Ok(self.state.lock().await.runs.iter().find(|r| r.id == run_id).cloned())
    }

    async fn get_active_run(&self) -> Result<Option<PlanningRun>, PlanningError> {
        let state = self.state.lock().await;
        Ok(state.runs.iter().rev().find(|r| r.status == RunStatus::Accepted).cloned())
    }

    async fn get_scenario(&self, scenario_id: PlanningScenarioId) -> Result<Option<PlanningScenario>, PlanningError> {
        Ok(self.state.lock().await.scenarios.iter().find(|s| s.id == scenario_id).cloned())
    }

    async fn list_scenarios_for_run(&self, run_id: PlanningRunId) -> Result<Vec<PlanningScenario>, PlanningError> {
        let state = self.state.lock().await;
        Ok(state.scenarios.iter().filter(|s| s.run_id == run_id).cloned().collect())
    }

    async fn get_completed_assignments(
        &self,
        worker_id: WorkerId,
        step_id: Option<ProductStepId>,
        since: DateTime<Utc>,
    ) -> Result<Vec<CompletedAssignment>, PlanningError> {
        let state = self.state.lock().await;
        Ok(state
            .completed_assignments
            .iter()
            .filter(|a| a.worker_id == worker_id)
            .filter(|a| step_id.is_none_or(|s| a.step_id == s))
            .filter(|a| a.completed_at >= since)
            .cloned()
            .collect())
    }

    async fn get_output_history(
        &self,
        schedule_block_id: ScheduleBlockId,
    ) -> Result<Vec<OutputHistorySample>, PlanningError> {
        let state = self.state.lock().await;
        Ok(state.output_history.get(&schedule_block_id).cloned().unwrap_or_default())
    }

    async fn create_planning_run(&self, new_run: NewPlanningRun) -> Result<PlanningRun, PlanningError> {
        if new_run.window_start > new_run.window_end {
            return Err(PlanningError::Precondition(
                "planning window start must not be after its end".to_string(),
            ));
        }
        let mut state = self.state.lock().await;
        let id = state.next_run_id;
        state.next_run_id += 1;
        let run = PlanningRun {
            id,
            name: new_run.name,
            window_start: new_run.window_start,
            window_end: new_run.window_end,
            status: RunStatus::Draft,
            accepted_scenario_id: None,
            created_by: new_run.created_by,
            created_at: Utc::now(),
        };
        state.runs.push(run.clone());
        Ok(run)
    }

    async fn create_scenario(
        &self,
        run_id: PlanningRunId,
        scenario: NewScenario,
    ) -> Result<PlanningScenario, PlanningError> {
        let mut state = self.state.lock().await;
        let scenario_id = state.next_scenario_id;
        state.next_scenario_id += 1;

        let blocks: Vec<ScheduleBlock> = scenario
            .blocks
            .into_iter()
            .map(|mut b| {
                b.id = Some(state.next_block_id);
                state.next_block_id += 1;
                b
            })
            .collect();

        let persisted = PlanningScenario {
            id: scenario_id,
            run_id,
            name: scenario.name,
            strategy: scenario.strategy,
            allow_overtime: scenario.allow_overtime,
            overtime_limit_hours_per_day: scenario.overtime_limit_hours_per_day,
            metrics: scenario.metrics,
            blocks,
            warnings: scenario.warnings,
            parent_scenario_id: scenario.parent_scenario_id,
        };

        if let Some(idx) = state.runs.iter().position(|r| r.id == run_id) {
            if state.runs[idx].status == RunStatus::Draft {
                state.runs[idx].status = RunStatus::Pending;
            }
        }

        state.scenarios.push(persisted.clone());
        Ok(persisted)
    }

    async fn link_scenario_demand(
        &self,
        _scenario_id: PlanningScenarioId,
        _demand_ids: &[DemandEntryId],
    ) -> Result<(), PlanningError> {
        // Linkage is derivable from the scenario's own blocks in this
        // fake; nothing to record separately.
        Ok(())
    }

    async fn accept_scenario_as_plan_tasks(
        &self,
        run_id: PlanningRunId,
        scenario_id: PlanningScenarioId,
    ) -> Result<u32, PlanningError> {
        let mut state = self.state.lock().await;

        let scenario = state
            .scenarios
            .iter()
            .find(|s| s.id == scenario_id)
            .cloned()
            .ok_or_else(|| PlanningError::NotFound(format!("scenario {scenario_id}")))?;

        if scenario.run_id != run_id {
            return Err(PlanningError::Precondition(format!(
                "scenario {scenario_id} does not belong to run {run_id}"
            )));
        }

        let demand_ids: std::collections::HashSet<DemandEntryId> =
            scenario.blocks.iter().map(|b| b.demand_entry_id).collect();

        let conflict = state
            .plan_task_demand_ids
            .iter()
            .any(|(owning_run, demand_id)| *owning_run != run_id && demand_ids.contains(demand_id));
        if conflict {
            return Err(PlanningError::Conflict(
                "one or more demand entries already have accepted plan tasks from another run".to_string(),
            ));
        }

        for &demand_id in &demand_ids {
            state.plan_task_demand_ids.insert((run_id, demand_id));
        }

        if let Some(idx) = state.runs.iter().position(|r| r.id == run_id) {
            state.runs[idx].status = RunStatus::Accepted;
            state.runs[idx].accepted_scenario_id = Some(scenario_id);
        }

        for entry in state.demand_entries.iter_mut() {
            if demand_ids.contains(&entry.id) && entry.status == DemandStatus::Pending {
                entry.status = DemandStatus::Planned;
            }
        }

        Ok(scenario.blocks.len() as u32)
    }

    async fn archive_run(&self, run_id: PlanningRunId) -> Result<(), PlanningError> {
        let mut state = self.state.lock().await;
        let run = state
            .runs
            .iter_mut()
            .find(|r| r.id == run_id)
            .ok_or_else(|| PlanningError::NotFound(format!("run {run_id}")))?;
        run.status = RunStatus::Archived;
        Ok(())
    }

    async fn create_temporary_worker(&self, worker: NewTemporaryWorker) -> Result<Worker, PlanningError> {
        let mut state = self.state.lock().await;
        let id = state.next_worker_id;
        state.next_worker_id += 1;
        let created = Worker {
            id,
            name: worker.name,
            employee_id: None,
            status: WorkerStatus::Active,
            work_category: worker.work_category,
            cost_per_hour: worker.cost_per_hour,
        };
        state.workers.push(created.clone());
        Ok(created)
    }

    async fn commit_replan_blocks(
        &self,
        schedule_id: ScheduleId,
        accepted_blocks: Vec<ScheduleBlock>,
    ) -> Result<(), PlanningError> {
        let mut state = self.state.lock().await;
        let scenario = state
            .scenarios
            .iter_mut()
            .find(|s| s.id == schedule_id)
            .ok_or_else(|| PlanningError::NotFound(format!("schedule {schedule_id}")))?;

        let locked_ids: std::collections::HashSet<ScheduleBlockId> =
            accepted_blocks.iter().filter_map(|b| b.id).collect();
        scenario.blocks.retain(|b| b.id.is_some_and(|id| locked_ids.contains(&id)));

        let mut next_id_holder = 0i64;
        for mut block in accepted_blocks {
            if block.id.is_none() {
                if next_id_holder == 0 {
                    next_id_holder = state.next_block_id;
                }
                block.id = Some(next_id_holder);
                next_id_holder += 1;
                scenario.blocks.push(block);
            }
        }
        if next_id_holder != 0 {
            state.next_block_id = next_id_holder;
        }
        Ok(())
    }

    async fn insert_proficiency_adjustment(&self, adjustment: &ProficiencyAdjustment) -> Result<(), PlanningError> {
        let mut state = self.state.lock().await;
        match state
            .proficiencies
            .iter_mut()
            .find(|p| p.worker_id == adjustment.worker_id && p.step_id == adjustment.step_id)
        {
            Some(existing) => existing.level = adjustment.new_level,
            None => state.proficiencies.push(WorkerProficiency {
                worker_id: adjustment.worker_id,
                step_id: adjustment.step_id,
                level: adjustment.new_level,
            }),
        }
        state.proficiency_history.push(ProficiencyHistoryEntry {
            worker_id: adjustment.worker_id,
            step_id: adjustment.step_id,
            previous_level: adjustment.previous_level,
            new_level: adjustment.new_level,
            reason: adjustment.reason,
            trigger: Some(adjustment.trigger),
            recorded_at: Utc::now(),
        });
        Ok(())
    }

    async fn append_output_history(
        &self,
        schedule_block_id: ScheduleBlockId,
        output: u32,
        recorded_at: DateTime<Utc>,
    ) -> Result<(), PlanningError> {
        let mut state = self.state.lock().await;
        state
            .output_history
            .entry(schedule_block_id)
            .or_default()
            .push(OutputHistorySample { output, recorded_at });
        Ok(())
    }

    async fn append_proficiency_history(&self, entry: ProficiencyHistoryEntry) -> Result<(), PlanningError> {
        self.state.lock().await.proficiency_history.push(entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn demand(id: DemandEntryId, status: DemandStatus) -> DemandEntry {
        DemandEntry {
            id,
            source: DemandSource::Internal,
            quantity: 10,
            due_date: NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
            customer_name: None,
            priority: 1,
            status,
            bom: BomReference::ProductDefault(1),
            batching: BatchingPreferences::none(),
        }
    }

    #[tokio::test]
    async fn filters_demand_by_status() {
        let repo = InMemoryRepository::new();
        repo.seed_demand(vec![demand(1, DemandStatus::Pending), demand(2, DemandStatus::Completed)])
            .await;

        let filter = DemandFilter {
            status: Some(DemandStatus::Pending),
            ..Default::default()
        };
        let result = repo.get_demand_entries(&filter).await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, 1);
    }

    #[tokio::test]
    async fn accepting_a_scenario_updates_run_status_and_demand_status() {
        let repo = InMemoryRepository::new();
        repo.seed_demand(vec![demand(1, DemandStatus::Pending)]).await;

        let run = repo
            .create_planning_run(NewPlanningRun {
                name: "Run".to_string(),
                window_start: NaiveDate::from_ymd_opt(2026, 7, 27).unwrap(),
                window_end: NaiveDate::from_ymd_opt(2026, 8, 20).unwrap(),
                created_by: None,
            })
            .await
            .unwrap();

        let scenario = repo
            .create_scenario(
                run.id,
                NewScenario {
                    name: "meet_deadlines".to_string(),
                    strategy: Strategy::MeetDeadlines,
                    allow_overtime: true,
                    overtime_limit_hours_per_day: 4,
                    metrics: ScenarioMetrics::default(),
                    blocks: vec![ScheduleBlock {
                        id: None,
                        demand_entry_id: 1,
                        step_id: 1,
                        batch_number: 1,
                        batch_quantity: 10,
                        date: NaiveDate::from_ymd_opt(2026, 7, 27).unwrap(),
                        start_minutes: 420,
                        end_minutes: 480,
                        planned_output: 10,
                        worker_ids: vec![1],
                        assignment_reason: "only qualified worker".to_string(),
                        constraint_notes: vec![],
                        is_overtime: false,
                        is_auto_suggested: false,
                    }],
                    warnings: vec![],
                    parent_scenario_id: None,
                },
            )
            .await
            .unwrap();

        let tasks_created = repo.accept_scenario_as_plan_tasks(run.id, scenario.id).await.unwrap();
        assert_eq!(tasks_created, 1);

        let run_after = repo.get_run(run.id).await.unwrap().unwrap();
        assert_eq!(run_after.status, RunStatus::Accepted);
        assert_eq!(run_after.accepted_scenario_id, Some(scenario.id));

        let order = repo.get_order(1).await.unwrap();
        assert_eq!(order.status, DemandStatus::Planned);
    }

    #[tokio::test]
    async fn accepting_a_scenario_for_the_wrong_run_is_a_precondition_error() {
        let repo = InMemoryRepository::new();
        let run_a = repo
            .create_planning_run(NewPlanningRun {
                name: "A".to_string(),
                window_start: NaiveDate::from_ymd_opt(2026, 7, 27).unwrap(),
                window_end: NaiveDate::from_ymd_opt(2026, 8, 20).unwrap(),
                created_by: None,
            })
            .await
            .unwrap();
        let run_b = repo
            .create_planning_run(NewPlanningRun {
                name: "B".to_string(),
                window_start: NaiveDate::from_ymd_opt(2026, 7, 27).unwrap(),
                window_end: NaiveDate::from_ymd_opt(2026, 8, 20).unwrap(),
                created_by: None,
            })
            .await
            .unwrap();
        let scenario = repo
            .create_scenario(
                run_a.id,
                NewScenario {
                    name: "s".to_string(),
                    strategy: Strategy::Balanced,
                    allow_overtime: true,
                    overtime_limit_hours_per_day: 2,
                    metrics: ScenarioMetrics::default(),
                    blocks: vec![],
                    warnings: vec![],
                    parent_scenario_id: None,
                },
            )
            .await
            .unwrap();

        let result = repo.accept_scenario_as_plan_tasks(run_b.id, scenario.id).await;
        assert!(matches!(result, Err(PlanningError::Precondition(_))));
    }
}
