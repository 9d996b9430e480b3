use chrono::Utc;

use cascade_core::{CascadeError, CascadeResult};
use cascade_domain::{ChainSummary, CompositeRecord, PersonJob, PersonRecord};

use crate::cache::ResultCache;

const NO_ADDRESS: &str = "Address not provided";

/// Walks a resolved person back through its provenance links and joins the
/// three tier records into one composite.
///
/// The plate record is found under the job's origin plate, the vehicle
/// record under the plate record's origin vehicle id. Either link missing
/// is a `DependencyMissing` error; the person result itself stays valid.
pub async fn build_composite(
    cache: &ResultCache,
    job: &PersonJob,
    person: &PersonRecord,
) -> CascadeResult<CompositeRecord> {
    let now = Utc::now();

    let plate = cache
        .plate(job.origin_plate.as_str(), now)
        .await
        .ok_or_else(|| {
            CascadeError::dependency_missing(format!(
                "no plate record for {} while joining person {}",
                job.origin_plate, job.national_id
            ))
        })?;

    let vehicle = cache
        .vehicle(&plate.origin_vehicle_id)
        .await
        .ok_or_else(|| {
            CascadeError::dependency_missing(format!(
                "no vehicle record {} behind plate {}",
                plate.origin_vehicle_id, job.origin_plate
            ))
        })?;

    let summary = ChainSummary {
        model: vehicle.model.clone(),
        plate: job.origin_plate.formatted(),
        national_id: job.national_id.formatted(),
        owner_name: plate.owner.name.clone(),
        full_address: person
            .address
            .as_ref()
            .map(|a| a.full_line())
            .unwrap_or_else(|| NO_ADDRESS.to_string()),
    };

    Ok(CompositeRecord::new(
        job.origin_request_id,
        vehicle,
        plate,
        person.clone(),
        summary,
    ))
}
