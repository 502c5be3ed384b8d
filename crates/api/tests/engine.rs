//! `PlanningEngine` exercised against an in-memory `Repository` fake
//! (SPEC_FULL.md test-tooling promise), end to end: generate a run, accept
//! one of its scenarios, then replan and commit the replan draft — with no
//! database involved.

use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};

use planning_api::engine::{GenerateRunRequest, PlanningEngine};
use planning_domain::{
    BatchingPreferences, BomReference, DemandEntry, DemandEntryId, DemandSource, DemandStatus, ProductStep,
    Repository, RunStatus, StepCategory, Worker, WorkerStatus,
};
use planning_scheduler::{ReplanPolicy, WorkCalendar};
use planning_storage::InMemoryRepository;

fn window_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 7, 27).unwrap()
}

fn window_end() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 9, 1).unwrap()
}

fn worker(id: i64) -> Worker {
    Worker {
        id,
        name: format!("Worker {id}"),
        employee_id: None,
        status: WorkerStatus::Active,
        work_category: None,
        cost_per_hour: Some(18.0),
    }
}

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

fn demand(id: DemandEntryId, quantity: u32, due_date: NaiveDate) -> DemandEntry {
    DemandEntry {
        id,
        source: DemandSource::Internal,
        quantity,
        due_date,
        customer_name: None,
        priority: 1,
        status: DemandStatus::Pending,
        bom: BomReference::ProductDefault(1),
        batching: BatchingPreferences::none(),
    }
}

async fn seeded_repo() -> Arc<InMemoryRepository> {
    let repo = Arc::new(InMemoryRepository::new());
    repo.seed_demand(vec![demand(1, 10, window_end())]).await;
    repo.seed_bom(
        1,
        planning_domain::BomSteps {
            steps: vec![step()],
            dependencies: vec![],
        },
    )
    .await;
    repo.seed_workers(vec![worker(1)]).await;
    repo
}

fn engine(repo: Arc<InMemoryRepository>) -> PlanningEngine {
    PlanningEngine::new(repo, WorkCalendar::default(), planning_config::ProficiencyBandsConfig::default())
}

#[tokio::test]
async fn generate_run_produces_three_scenarios_and_a_schedulable_plan() {
    let repo = seeded_repo().await;
    let engine = engine(repo);

    let (run, scenarios) = engine
        .generate_run(
            GenerateRunRequest {
                name: "weekly plan".to_string(),
                window_start: window_start(),
                window_end: window_end(),
                demand_entry_ids: None,
                created_by: Some("planner@example.com".to_string()),
            },
            Utc.with_ymd_and_hms(2026, 7, 27, 0, 0, 0).unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Draft);
    assert_eq!(scenarios.len(), 3);
    for scenario in &scenarios {
        assert_eq!(scenario.blocks.iter().map(|b| b.planned_output).sum::<u32>(), 10);
    }
}

#[tokio::test]
async fn generate_run_with_no_demand_is_a_precondition_error() {
    let repo = Arc::new(InMemoryRepository::new());
    // No demand seeded.
    repo.seed_workers(vec![worker(1)]).await;
    let engine = engine(repo);

    let result = engine
        .generate_run(
            GenerateRunRequest {
                name: "empty plan".to_string(),
                window_start: window_start(),
                window_end: window_end(),
                demand_entry_ids: None,
                created_by: None,
            },
            Utc.with_ymd_and_hms(2026, 7, 27, 0, 0, 0).unwrap(),
        )
        .await;

    assert!(matches!(result, Err(planning_domain::PlanningError::Precondition(_))));
}

#[tokio::test]
async fn accepting_a_scenario_advances_the_run_and_materializes_plan_tasks() {
    let repo = seeded_repo().await;
    let engine = engine(repo);

    let (run, scenarios) = engine
        .generate_run(
            GenerateRunRequest {
                name: "weekly plan".to_string(),
                window_start: window_start(),
                window_end: window_end(),
                demand_entry_ids: None,
                created_by: None,
            },
            Utc.with_ymd_and_hms(2026, 7, 27, 0, 0, 0).unwrap(),
        )
        .await
        .unwrap();

    let chosen = &scenarios[0];
    let tasks_created = engine.accept_scenario(run.id, chosen.id).await.unwrap();
    assert!(tasks_created > 0);

    let (run_after, _, _) = engine.run_detail(run.id).await.unwrap().unwrap();
    assert_eq!(run_after.status, RunStatus::Accepted);
    assert_eq!(run_after.accepted_scenario_id, Some(chosen.id));
}

#[tokio::test]
async fn replan_then_commit_round_trips_through_the_repository() {
    let repo = seeded_repo().await;
    let engine = engine(repo);

    let (run, scenarios) = engine
        .generate_run(
            GenerateRunRequest {
                name: "weekly plan".to_string(),
                window_start: window_start(),
                window_end: window_end(),
                demand_entry_ids: None,
                created_by: None,
            },
            Utc.with_ymd_and_hms(2026, 7, 27, 0, 0, 0).unwrap(),
        )
        .await
        .unwrap();

    let chosen = &scenarios[0];
    engine.accept_scenario(run.id, chosen.id).await.unwrap();

    let replan_result = engine
        .replan(
            chosen.id,
            window_start(),
            ReplanPolicy::PreserveFutureWork,
            Utc.with_ymd_and_hms(2026, 7, 27, 0, 0, 0).unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(replan_result.draft_entries.iter().map(|b| b.planned_output).sum::<u32>(), 10);

    let committed = engine.commit_replan(chosen.id, replan_result.draft_entries).await.unwrap();
    assert_eq!(committed.iter().map(|b| b.planned_output).sum::<u32>(), 10);
}
