//! The pure, synchronous scheduling kernel (spec §2, §4.1-§4.10, §5).
//!
//! Every module here is deterministic and free of I/O: no `tokio`, no
//! `sqlx`, no wall-clock reads, no randomness. `crates/api`'s
//! `PlanningEngine` is the only caller that mixes this crate's sync compute
//! with the async `Repository` (spec §5).

pub mod calendar;
pub mod cancellation;
pub mod capacity;
pub mod dependency_tracker;
pub mod kernel;
pub mod proficiency_engine;
pub mod qualified_worker;
pub mod replan;
pub mod strategy;
pub mod validator;
pub mod worker_day_book;

pub use calendar::WorkCalendar;
pub use cancellation::{CancellationToken, NeverCancelled};
pub use kernel::{run_kernel, run_kernel_with_seed, BatchSeed, BomSteps, DemandProjection, ScenarioInput, ScenarioOutput};
pub use proficiency_engine::{level_for_efficiency, output_trend, propose_adjustment};
pub use replan::{replan, ReplanInput, ReplanPolicy};
pub use strategy::{generate_scenarios, GeneratedScenario};
pub use validator::{check_kernel_invariants, validate, ValidationContext, ValidationError, ValidationReport, ValidationWarning};
pub use worker_day_book::WorkerDayBook;
