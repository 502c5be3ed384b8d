//! Catalog entities: products, steps, equipment, workers, certifications.
//!
//! These are the long-lived entities of spec §3; they are read-mostly and
//! consumed as immutable snapshots by the scheduler (spec §5).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type ProductId = i64;
pub type ProductStepId = i64;
pub type BuildVersionId = i64;
pub type EquipmentId = i64;
pub type WorkerId = i64;

/// A finished-goods product. Owns `ProductStep`s.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
}

/// One of the five production-step categories (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepCategory {
    Cutting,
    Silkscreen,
    Prep,
    Sewing,
    Inspection,
}

/// A single operation in a product's bill of materials.
///
/// Invariant: `time_per_piece_seconds > 0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductStep {
    pub id: ProductStepId,
    pub product_id: ProductId,
    pub name: String,
    /// Unique within the owning product.
    pub step_code: String,
    pub category: StepCategory,
    pub time_per_piece_seconds: u32,
    /// Total order within the product; used only as a tie-break (spec §4.3).
    pub sequence: u32,
    pub equipment_id: Option<EquipmentId>,
    pub work_category: Option<String>,
}

impl ProductStep {
    pub fn requires_equipment(&self) -> bool {
        self.equipment_id.is_some()
    }
}

/// Dependency kind between two steps of the same product (spec §3).
///
/// `Finish` means the dependency must be `completed` for a batch before the
/// dependent step can start that batch; `Start` means it is enough that the
/// dependency has merely `started`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    Start,
    Finish,
}

/// Ordered pair `(step, depends_on_step)` with a dependency kind.
///
/// Invariant (enforced by the caller that builds the dependency graph, not
/// by this type): no cycles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDependency {
    pub step_id: ProductStepId,
    pub depends_on_step_id: ProductStepId,
    pub kind: DependencyKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildVersionStatus {
    Draft,
    Active,
    Deprecated,
}

/// A named selection & ordering of `ProductStep`s — a "recipe revision".
///
/// Invariant: at most one `is_default` `BuildVersion` per product (enforced
/// by the repository's write path, not checked here).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildVersion {
    pub id: BuildVersionId,
    pub product_id: ProductId,
    pub name: String,
    pub status: BuildVersionStatus,
    pub is_default: bool,
    pub step_ids: Vec<ProductStepId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentStatus {
    Available,
    InUse,
    Maintenance,
    Retired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Equipment {
    pub id: EquipmentId,
    /// Globally unique.
    pub name: String,
    pub status: EquipmentStatus,
    pub station_count: Option<u32>,
    pub hourly_cost: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Active,
    Inactive,
    OnLeave,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    pub id: WorkerId,
    pub name: String,
    /// Unique when present.
    pub employee_id: Option<String>,
    pub status: WorkerStatus,
    /// Descriptive only — never used to filter eligibility (spec §4.4).
    pub work_category: Option<String>,
    pub cost_per_hour: Option<f64>,
}

impl Worker {
    pub fn is_active(&self) -> bool {
        self.status == WorkerStatus::Active
    }
}

/// `(worker, equipment)` attestation. Uniqueness: at most one row per pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquipmentCertification {
    pub worker_id: WorkerId,
    pub equipment_id: EquipmentId,
    pub certified_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl EquipmentCertification {
    /// A certification is valid at time `now` iff `expires_at` is null or
    /// strictly in the future (spec §3).
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expiry) => expiry > now,
            None => true,
        }
    }
}
