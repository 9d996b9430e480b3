use async_trait::async_trait;
use serde_json::Value;

use cascade_core::{CascadeResult, ExtractionError};

use crate::entities::{PersonFinding, PlateFinding, RecordKind, VehicleFinding, VehicleQuery};
use crate::value_objects::{NationalId, Plate};

pub type ExtractionResult<T> = std::result::Result<T, ExtractionError>;

/// The external agent performing the actual lookups, one method per tier.
///
/// Implementations must be cheap to clone behind `Arc` and safe to call
/// concurrently; the pipeline guarantees at most one in-flight call per tier.
#[async_trait]
pub trait ExtractionAgent: Send + Sync {
    /// Discover vehicles matching a search query.
    async fn fetch_vehicles(&self, query: &VehicleQuery) -> ExtractionResult<Vec<VehicleFinding>>;

    /// Resolve the ownership of a plate.
    async fn fetch_plate_owner(&self, plate: &Plate) -> ExtractionResult<PlateFinding>;

    /// Resolve the person behind a national id.
    async fn fetch_person(&self, national_id: &NationalId) -> ExtractionResult<PersonFinding>;
}

/// Write-only audit trail. The pipeline never reads it back, and a failed
/// save never rolls back a job state transition.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn save(&self, kind: RecordKind, payload: &Value, correlation_id: &str)
        -> CascadeResult<()>;
}
