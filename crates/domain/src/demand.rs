//! Demand entries — the scheduler's unit of input work (spec §3).

use crate::catalog::{BuildVersionId, ProductId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub type DemandEntryId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemandSource {
    Internal,
    ExternalSalesOrder,
    ExternalWorkOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemandStatus {
    Pending,
    Planned,
    InProgress,
    Completed,
}

/// Which BOM a demand entry draws on: either a specific recipe revision, or
/// "whatever build version is currently the product's default".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BomReference {
    BuildVersion(BuildVersionId),
    ProductDefault(ProductId),
}

/// Optional batching preferences (spec §4.3). Both default to the demand's
/// full quantity, i.e. no batching.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BatchingPreferences {
    pub min_batch_size: Option<u32>,
    pub max_batch_size: Option<u32>,
}

impl BatchingPreferences {
    pub const fn none() -> Self {
        Self {
            min_batch_size: None,
            max_batch_size: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemandEntry {
    pub id: DemandEntryId,
    pub source: DemandSource,
    pub quantity: u32,
    pub due_date: NaiveDate,
    pub customer_name: Option<String>,
    /// 1 highest priority .. 5 lowest.
    pub priority: u8,
    pub status: DemandStatus,
    pub bom: BomReference,
    pub batching: BatchingPreferences,
}
