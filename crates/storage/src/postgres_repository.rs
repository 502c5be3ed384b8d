//! Postgres implementation of the C11 `Repository` port (spec §4.11).
//!
//! Every method issues its own round trip; multi-statement writes
//! (`create_scenario`, `accept_scenario_as_plan_tasks`,
//! `commit_replan_blocks`) run inside one transaction so they commit or
//! fail atomically, matching the teacher's `sync_repository.rs` pattern of
//! wrapping related writes in `pool.begin()`.

use crate::error::StorageError;
use crate::rows::{
    self, CompletedAssignmentRow, DemandEntryRow, EquipmentCertificationRow, EquipmentRow, OutputHistoryRow,
    PlanningRunRow, PlanningScenarioRow, ProductStepRow, ScheduleBlockRow, StepDependencyRow, WorkerProficiencyRow,
    WorkerRow,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use planning_domain::{
    BomReference, BomSteps, DemandEntry, DemandEntryId, DemandFilter, Equipment, EquipmentCertification,
    NewPlanningRun, NewScenario, NewTemporaryWorker, PlanningError, PlanningRun, PlanningRunId, PlanningScenario,
    PlanningScenarioId, ProficiencyAdjustment, ProficiencyFilter, ProficiencyHistoryEntry, ProductStepId, Repository,
    RunFilter, ScheduleBlock, ScheduleBlockId, ScheduleId, Worker, WorkerId, WorkerProficiency,
};
use sqlx::PgPool;

fn q(err: sqlx::Error) -> PlanningError {
    StorageError::Query(err).into()
}

#[derive(Clone)]
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn resolve_build_version_steps(&self, build_version_id: i64) -> Result<Vec<i64>, PlanningError> {
        let step_ids: Vec<i64> = sqlx::query_scalar(
            "SELECT step_id FROM build_version_steps WHERE build_version_id = $1 ORDER BY position",
        )
        .bind(build_version_id)
        .fetch_all(&self.pool)
        .await
        .map_err(q)?;
        Ok(step_ids)
    }

    async fn default_build_version_id(&self, product_id: i64) -> Result<Option<i64>, PlanningError> {
        let id: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM build_versions WHERE product_id = $1 AND is_default = true",
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(q)?;
        Ok(id)
    }

    async fn steps_for_product(&self, product_id: i64) -> Result<Vec<i64>, PlanningError> {
        let step_ids: Vec<i64> = sqlx::query_scalar(
            "SELECT id FROM product_steps WHERE product_id = $1 ORDER BY sequence",
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await
        .map_err(q)?;
        Ok(step_ids)
    }

    async fn steps_by_ids(&self, step_ids: &[i64]) -> Result<Vec<planning_domain::ProductStep>, PlanningError> {
        if step_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<ProductStepRow> = sqlx::query_as(
            "SELECT id, product_id, name, step_code, category, time_per_piece_seconds, sequence, equipment_id, work_category
             FROM product_steps WHERE id = ANY($1) ORDER BY sequence",
        )
        .bind(step_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(q)?;
        rows.into_iter().map(|r| r.into_domain().map_err(Into::into)).collect()
    }

    async fn dependencies_for_steps(&self, step_ids: &[i64]) -> Result<Vec<planning_domain::StepDependency>, PlanningError> {
        if step_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<StepDependencyRow> = sqlx::query_as(
            "SELECT step_id, depends_on_step_id, kind FROM step_dependencies WHERE step_id = ANY($1)",
        )
        .bind(step_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(q)?;
        rows.into_iter().map(|r| r.into_domain().map_err(Into::into)).collect()
    }

    async fn load_blocks_for_scenario(&self, scenario_id: i64) -> Result<Vec<ScheduleBlock>, PlanningError> {
        let rows: Vec<ScheduleBlockRow> = sqlx::query_as(
            "SELECT id, demand_entry_id, step_id, batch_number, batch_quantity, date, start_minutes, end_minutes,
                    planned_output, worker_ids, assignment_reason, constraint_notes, is_overtime, is_auto_suggested
             FROM schedule_blocks WHERE scenario_id = $1 ORDER BY id",
        )
        .bind(scenario_id)
        .fetch_all(&self.pool)
        .await
        .map_err(q)?;
        rows.into_iter().map(|r| r.into_domain().map_err(Into::into)).collect()
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_demand_entries(&self, filter: &DemandFilter) -> Result<Vec<DemandEntry>, PlanningError> {
        let status = filter.status.map(rows::demand_status_to_db);
        let due_before = filter.due_before;
        let ids = filter.ids.clone();

        let rows: Vec<DemandEntryRow> = sqlx::query_as(
            "SELECT id, source, quantity, due_date, customer_name, priority, status, build_version_id, product_id,
                    min_batch_size, max_batch_size
             FROM demand_entries
             WHERE ($1::text IS NULL OR status = $1)
               AND ($2::date IS NULL OR due_date <= $2)
               AND ($3::bigint[] IS NULL OR id = ANY($3))
             ORDER BY id",
        )
        .bind(status)
        .bind(due_before)
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(q)?;

        rows.into_iter().map(|r| r.into_domain().map_err(Into::into)).collect()
    }

    async fn get_bom_steps_with_deps(&self, bom: &BomReference) -> Result<BomSteps, PlanningError> {
        let step_ids = match bom {
            BomReference::BuildVersion(build_version_id) => self.resolve_build_version_steps(*build_version_id).await?,
            BomReference::ProductDefault(product_id) => match self.default_build_version_id(*product_id).await? {
                Some(build_version_id) => self.resolve_build_version_steps(build_version_id).await?,
                None => self.steps_for_product(*product_id).await?,
            },
        };

        let steps = self.steps_by_ids(&step_ids).await?;
        let dependencies = self.dependencies_for_steps(&step_ids).await?;
        Ok(BomSteps { steps, dependencies })
    }

    async fn get_active_workers(&self) -> Result<Vec<Worker>, PlanningError> {
        let rows: Vec<WorkerRow> = sqlx::query_as(
            "SELECT id, name, employee_id, status, work_category, cost_per_hour FROM workers WHERE status = 'active' ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(q)?;
        rows.into_iter().map(|r| r.into_domain().map_err(Into::into)).collect()
    }

    async fn get_equipment(&self) -> Result<Vec<Equipment>, PlanningError> {
        let rows: Vec<EquipmentRow> = sqlx::query_as(
            "SELECT id, name, status, station_count, hourly_cost FROM equipment ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(q)?;
        rows.into_iter().map(|r| r.into_domain().map_err(Into::into)).collect()
    }

    async fn get_certifications(&self, now: DateTime<Utc>) -> Result<Vec<EquipmentCertification>, PlanningError> {
        // Loaded as a full snapshot; validity at `now` is re-checked by the
        // caller via `is_valid_at` so the same snapshot can be reused for a
        // horizon that outlives this one instant (spec §4.11 snapshot
        // isolation; `now` here only orders the query, it never filters).
        let _ = now;
        let rows: Vec<EquipmentCertificationRow> = sqlx::query_as(
            "SELECT worker_id, equipment_id, certified_at, expires_at FROM equipment_certifications ORDER BY worker_id, equipment_id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(q)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get_proficiencies(&self, filter: &ProficiencyFilter) -> Result<Vec<WorkerProficiency>, PlanningError> {
        let worker_ids = filter.worker_ids.clone();
        let step_ids = filter.step_ids.clone();

        let rows: Vec<WorkerProficiencyRow> = sqlx::query_as(
            "SELECT worker_id, step_id, level FROM worker_proficiencies
             WHERE ($1::bigint[] IS NULL OR worker_id = ANY($1))
               AND ($2::bigint[] IS NULL OR step_id = ANY($2))
             ORDER BY worker_id, step_id",
        )
        .bind(worker_ids)
        .bind(step_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(q)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get_schedule(&self, schedule_id: ScheduleId) -> Result<PlanningScenario, PlanningError> {
        let row: Option<PlanningScenarioRow> = sqlx::query_as(
            "SELECT id, run_id, name, strategy, allow_overtime, overtime_limit_hours_per_day, labor_hours,
                    overtime_hours, labor_cost, equipment_cost, deadlines_met, deadlines_missed,
                    latest_completion_date, warnings, parent_scenario_id
             FROM planning_scenarios WHERE id = $1",
        )
        .bind(schedule_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(q)?;

        let row = row.ok_or_else(|| PlanningError::NotFound(format!("schedule {schedule_id}")))?;
        let blocks = self.load_blocks_for_scenario(schedule_id).await?;
        row.into_domain(blocks).map_err(Into::into)
    }

    async fn get_schedule_blocks(&self, schedule_id: ScheduleId) -> Result<Vec<ScheduleBlock>, PlanningError> {
        self.load_blocks_for_scenario(schedule_id).await
    }

    async fn get_order(&self, demand_entry_id: DemandEntryId) -> Result<DemandEntry, PlanningError> {
        let row: Option<DemandEntryRow> = sqlx::query_as(
            "SELECT id, source, quantity, due_date, customer_name, priority, status, build_version_id, product_id,
                    min_batch_size, max_batch_size
             FROM demand_entries WHERE id = $1",
        )
        .bind(demand_entry_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(q)?;

        row.ok_or_else(|| PlanningError::NotFound(format!("demand entry {demand_entry_id}")))?
            .into_domain()
            .map_err(Into::into)
    }

    async fn list_runs(&self, filter: &RunFilter) -> Result<Vec<PlanningRun>, PlanningError> {
        let status = filter.status.map(rows::run_status_to_db);
        let limit = filter.limit.unwrap_or(100).min(500) as i64;

        let rows: Vec<PlanningRunRow> = sqlx::query_as(
            "SELECT id, name, window_start, window_end, status, accepted_scenario_id, created_by, created_at
             FROM planning_runs
             WHERE ($1::text IS NULL OR status = $1)
             ORDER BY created_at DESC
             LIMIT $2",
        )
        .bind(status)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(q)?;

        rows.into_iter().map(|r| r.into_domain().map_err(Into::into)).collect()
    }

    async fn get_run(&self, run_id: PlanningRunId) -> Result<Option<PlanningRun>, PlanningError> {
        let row: Option<PlanningRunRow> = sqlx::query_as(
            "SELECT id, name, window_start, window_end, status, accepted_scenario_id, created_by, created_at
             FROM planning_runs WHERE id = $1",
        )
        .bind(run_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(q)?;

        row.map(|r| r.into_domain().map_err(Into::into)).transpose()
    }

    async fn get_active_run(&self) -> Result<Option<PlanningRun>, PlanningError> {
        let row: Option<PlanningRunRow> = sqlx::query_as(
            "SELECT id, name, window_start, window_end, status, accepted_scenario_id, created_by, created_at
             FROM planning_runs WHERE status = 'accepted' ORDER BY created_at DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(q)?;

        row.map(|r| r.into_domain().map_err(Into::into)).transpose()
    }

    async fn get_scenario(&self, scenario_id: PlanningScenarioId) -> Result<Option<PlanningScenario>, PlanningError> {
        let row: Option<PlanningScenarioRow> = sqlx::query_as(
            "SELECT id, run_id, name, strategy, allow_overtime, overtime_limit_hours_per_day, labor_hours,
                    overtime_hours, labor_cost, equipment_cost, deadlines_met, deadlines_missed,
                    latest_completion_date, warnings, parent_scenario_id
             FROM planning_scenarios WHERE id = $1",
        )
        .bind(scenario_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(q)?;

        match row {
            None => Ok(None),
            Some(row) => {
                let blocks = self.load_blocks_for_scenario(scenario_id).await?;
                row.into_domain(blocks).map(Some).map_err(Into::into)
            }
        }
    }

    async fn list_scenarios_for_run(&self, run_id: PlanningRunId) -> Result<Vec<PlanningScenario>, PlanningError> {
        let header_rows: Vec<PlanningScenarioRow> = sqlx::query_as(
            "SELECT id, run_id, name, strategy, allow_overtime, overtime_limit_hours_per_day, labor_hours,
                    overtime_hours, labor_cost, equipment_cost, deadlines_met, deadlines_missed,
                    latest_completion_date, warnings, parent_scenario_id
             FROM planning_scenarios WHERE run_id = $1 ORDER BY id",
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await
        .map_err(q)?;

        let mut scenarios = Vec::with_capacity(header_rows.len());
        for row in header_rows {
            let blocks = self.load_blocks_for_scenario(row.id).await?;
            scenarios.push(row.into_domain(blocks)?);
        }
        Ok(scenarios)
    }

    async fn get_completed_assignments(
        &self,
        worker_id: WorkerId,
        step_id: Option<ProductStepId>,
        since: DateTime<Utc>,
    ) -> Result<Vec<planning_domain::CompletedAssignment>, PlanningError> {
        let rows: Vec<CompletedAssignmentRow> = sqlx::query_as(
            "SELECT worker_id, step_id, time_per_piece_seconds, actual_output, actual_seconds, completed_at
             FROM completed_assignments
             WHERE worker_id = $1
               AND ($2::bigint IS NULL OR step_id = $2)
               AND completed_at >= $3
             ORDER BY completed_at",
        )
        .bind(worker_id)
        .bind(step_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(q)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get_output_history(
        &self,
        schedule_block_id: ScheduleBlockId,
    ) -> Result<Vec<planning_domain::OutputHistorySample>, PlanningError> {
        let rows: Vec<OutputHistoryRow> = sqlx::query_as(
            "SELECT output, recorded_at FROM output_history WHERE schedule_block_id = $1 ORDER BY recorded_at",
        )
        .bind(schedule_block_id)
        .fetch_all(&self.pool)
        .await
        .map_err(q)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn create_planning_run(&self, new_run: NewPlanningRun) -> Result<PlanningRun, PlanningError> {
        if new_run.window_start > new_run.window_end {
            return Err(PlanningError::Precondition(
                "planning window start must not be after its end".to_string(),
            ));
        }

        let row: PlanningRunRow = sqlx::query_as(
            "INSERT INTO planning_runs (name, window_start, window_end, status, created_by)
             VALUES ($1, $2, $3, 'draft', $4)
             RETURNING id, name, window_start, window_end, status, accepted_scenario_id, created_by, created_at",
        )
        .bind(&new_run.name)
        .bind(new_run.window_start)
        .bind(new_run.window_end)
        .bind(&new_run.created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(q)?;

        row.into_domain().map_err(Into::into)
    }

    async fn create_scenario(
        &self,
        run_id: PlanningRunId,
        scenario: NewScenario,
    ) -> Result<PlanningScenario, PlanningError> {
        let mut tx = self.pool.begin().await.map_err(q)?;

        let warnings = serde_json::to_value(&scenario.warnings)
            .map_err(|e| StorageError::Decode(format!("scenario warnings: {e}")))?;

        let row: PlanningScenarioRow = sqlx::query_as(
            "INSERT INTO planning_scenarios
                (run_id, name, strategy, allow_overtime, overtime_limit_hours_per_day, labor_hours, overtime_hours,
                 labor_cost, equipment_cost, deadlines_met, deadlines_missed, latest_completion_date, warnings,
                 parent_scenario_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
             RETURNING id, run_id, name, strategy, allow_overtime, overtime_limit_hours_per_day, labor_hours,
                       overtime_hours, labor_cost, equipment_cost, deadlines_met, deadlines_missed,
                       latest_completion_date, warnings, parent_scenario_id",
        )
        .bind(run_id)
        .bind(&scenario.name)
        .bind(rows::strategy_to_db(scenario.strategy))
        .bind(scenario.allow_overtime)
        .bind(scenario.overtime_limit_hours_per_day as i32)
        .bind(scenario.metrics.labor_hours)
        .bind(scenario.metrics.overtime_hours)
        .bind(scenario.metrics.labor_cost)
        .bind(scenario.metrics.equipment_cost)
        .bind(scenario.metrics.deadlines_met as i32)
        .bind(scenario.metrics.deadlines_missed as i32)
        .bind(scenario.metrics.latest_completion_date)
        .bind(warnings)
        .bind(scenario.parent_scenario_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(q)?;

        for block in &scenario.blocks {
            insert_block(&mut tx, row.id, block).await?;
        }

        tx.commit().await.map_err(q)?;

        let blocks = self.load_blocks_for_scenario(row.id).await?;
        row.into_domain(blocks).map_err(Into::into)
    }

    async fn link_scenario_demand(
        &self,
        scenario_id: PlanningScenarioId,
        demand_ids: &[DemandEntryId],
    ) -> Result<(), PlanningError> {
        let mut tx = self.pool.begin().await.map_err(q)?;
        for &demand_id in demand_ids {
            sqlx::query(
                "INSERT INTO scenario_demand_links (scenario_id, demand_entry_id) VALUES ($1, $2)
                 ON CONFLICT DO NOTHING",
            )
            .bind(scenario_id)
            .bind(demand_id)
            .execute(&mut *tx)
            .await
            .map_err(q)?;
        }
        tx.commit().await.map_err(q)?;
        Ok(())
    }

    async fn accept_scenario_as_plan_tasks(
        &self,
        run_id: PlanningRunId,
        scenario_id: PlanningScenarioId,
    ) -> Result<u32, PlanningError> {
        let mut tx = self.pool.begin().await.map_err(q)?;

        let scenario_run_id: Option<i64> = sqlx::query_scalar("SELECT run_id FROM planning_scenarios WHERE id = $1")
            .bind(scenario_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(q)?;

        match scenario_run_id {
            None => return Err(PlanningError::NotFound(format!("scenario {scenario_id}"))),
            Some(owner) if owner != run_id => {
                return Err(PlanningError::Precondition(format!(
                    "scenario {scenario_id} does not belong to run {run_id}"
                )));
            }
            Some(_) => {}
        }

        // Refuse if any demand covered by this scenario already has
        // accepted plan tasks from a different, still-accepted run (spec
        // §5 cross-run ordering: acceptance is the serializing commit
        // point).
        let conflicting: i64 = sqlx::query_scalar(
            "SELECT count(*) FROM plan_tasks pt
             JOIN schedule_blocks sb ON sb.id = pt.schedule_block_id
             JOIN planning_scenarios ps ON ps.id = sb.scenario_id
             WHERE ps.run_id != $1
               AND sb.demand_entry_id IN (
                   SELECT demand_entry_id FROM schedule_blocks WHERE scenario_id = $2
               )",
        )
        .bind(run_id)
        .bind(scenario_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(q)?;

        if conflicting > 0 {
            return Err(PlanningError::Conflict(
                "one or more demand entries already have accepted plan tasks from another run".to_string(),
            ));
        }

        let task_count: i64 = sqlx::query_scalar::<_, i64>(
            "WITH inserted AS (
                 INSERT INTO plan_tasks (schedule_block_id, demand_entry_id)
                 SELECT id, demand_entry_id FROM schedule_blocks WHERE scenario_id = $1
                 RETURNING 1
             )
             SELECT count(*) FROM inserted",
        )
        .bind(scenario_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(q)?;

        sqlx::query("UPDATE planning_runs SET status = 'accepted', accepted_scenario_id = $1 WHERE id = $2")
            .bind(scenario_id)
            .bind(run_id)
            .execute(&mut *tx)
            .await
            .map_err(q)?;

        sqlx::query(
            "UPDATE demand_entries SET status = 'planned'
             WHERE id IN (SELECT demand_entry_id FROM schedule_blocks WHERE scenario_id = $1)
               AND status = 'pending'",
        )
        .bind(scenario_id)
        .execute(&mut *tx)
        .await
        .map_err(q)?;

        tx.commit().await.map_err(q)?;
        Ok(task_count as u32)
    }

    async fn archive_run(&self, run_id: PlanningRunId) -> Result<(), PlanningError> {
        let result = sqlx::query("UPDATE planning_runs SET status = 'archived' WHERE id = $1")
            .bind(run_id)
            .execute(&self.pool)
            .await
            .map_err(q)?;

        if result.rows_affected() == 0 {
            return Err(PlanningError::NotFound(format!("run {run_id}")));
        }
        Ok(())
    }

    async fn create_temporary_worker(&self, worker: NewTemporaryWorker) -> Result<Worker, PlanningError> {
        let row: WorkerRow = sqlx::query_as(
            "INSERT INTO workers (name, status, work_category, cost_per_hour)
             VALUES ($1, 'active', $2, $3)
             RETURNING id, name, employee_id, status, work_category, cost_per_hour",
        )
        .bind(&worker.name)
        .bind(&worker.work_category)
        .bind(worker.cost_per_hour)
        .fetch_one(&self.pool)
        .await
        .map_err(q)?;

        row.into_domain().map_err(Into::into)
    }

    async fn commit_replan_blocks(
        &self,
        schedule_id: ScheduleId,
        accepted_blocks: Vec<ScheduleBlock>,
    ) -> Result<(), PlanningError> {
        let mut tx = self.pool.begin().await.map_err(q)?;

        sqlx::query(
            "DELETE FROM schedule_blocks WHERE scenario_id = $1 AND id NOT IN (
                 SELECT schedule_block_id FROM plan_tasks
             )",
        )
        .bind(schedule_id)
        .execute(&mut *tx)
        .await
        .map_err(q)?;

        for block in &accepted_blocks {
            if block.id.is_none() {
                insert_block(&mut tx, schedule_id, block).await?;
            }
        }

        tx.commit().await.map_err(q)?;
        Ok(())
    }

    async fn insert_proficiency_adjustment(&self, adjustment: &ProficiencyAdjustment) -> Result<(), PlanningError> {
        let mut tx = self.pool.begin().await.map_err(q)?;

        sqlx::query(
            "INSERT INTO worker_proficiencies (worker_id, step_id, level) VALUES ($1, $2, $3)
             ON CONFLICT (worker_id, step_id) DO UPDATE SET level = excluded.level",
        )
        .bind(adjustment.worker_id)
        .bind(adjustment.step_id)
        .bind(adjustment.new_level as i16)
        .execute(&mut *tx)
        .await
        .map_err(q)?;

        sqlx::query(
            "INSERT INTO proficiency_history
                (worker_id, step_id, previous_level, new_level, reason, trigger_avg_efficiency_pct, trigger_sample_size)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(adjustment.worker_id)
        .bind(adjustment.step_id)
        .bind(adjustment.previous_level as i16)
        .bind(adjustment.new_level as i16)
        .bind(rows::proficiency_adjustment_reason_to_db(adjustment.reason))
        .bind(adjustment.trigger.avg_efficiency_pct)
        .bind(adjustment.trigger.sample_size as i32)
        .execute(&mut *tx)
        .await
        .map_err(q)?;

        tx.commit().await.map_err(q)?;
        Ok(())
    }

    async fn append_output_history(
        &self,
        schedule_block_id: ScheduleBlockId,
        output: u32,
        recorded_at: DateTime<Utc>,
    ) -> Result<(), PlanningError> {
        sqlx::query("INSERT INTO output_history (schedule_block_id, output, recorded_at) VALUES ($1, $2, $3)")
            .bind(schedule_block_id)
            .bind(output as i32)
            .bind(recorded_at)
            .execute(&self.pool)
            .await
            .map_err(q)?;
        Ok(())
    }

    async fn append_proficiency_history(&self, entry: ProficiencyHistoryEntry) -> Result<(), PlanningError> {
        sqlx::query(
            "INSERT INTO proficiency_history
                (worker_id, step_id, previous_level, new_level, reason, trigger_avg_efficiency_pct,
                 trigger_sample_size, recorded_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(entry.worker_id)
        .bind(entry.step_id)
        .bind(entry.previous_level as i16)
        .bind(entry.new_level as i16)
        .bind(rows::proficiency_adjustment_reason_to_db(entry.reason))
        .bind(entry.trigger.map(|t| t.avg_efficiency_pct))
        .bind(entry.trigger.map(|t| t.sample_size as i32))
        .bind(entry.recorded_at)
        .execute(&self.pool)
        .await
        .map_err(q)?;
        Ok(())
    }
}

async fn insert_block(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    scenario_id: i64,
    block: &ScheduleBlock,
) -> Result<(), PlanningError> {
    let constraint_notes = serde_json::to_value(&block.constraint_notes)
        .map_err(|e| StorageError::Decode(format!("constraint notes: {e}")))?;

    sqlx::query(
        "INSERT INTO schedule_blocks
            (scenario_id, demand_entry_id, step_id, batch_number, batch_quantity, date, start_minutes, end_minutes,
             planned_output, worker_ids, assignment_reason, constraint_notes, is_overtime, is_auto_suggested)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
    )
    .bind(scenario_id)
    .bind(block.demand_entry_id)
    .bind(block.step_id)
    .bind(block.batch_number as i32)
    .bind(block.batch_quantity as i32)
    .bind(block.date)
    .bind(block.start_minutes as i32)
    .bind(block.end_minutes as i32)
    .bind(block.planned_output as i32)
    .bind(&block.worker_ids)
    .bind(&block.assignment_reason)
    .bind(constraint_notes)
    .bind(block.is_overtime)
    .bind(block.is_auto_suggested)
    .execute(&mut **tx)
    .await
    .map_err(q)?;
    Ok(())
}
