use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use cascade_core::{CascadeError, CascadeResult};

use crate::value_objects::{NationalId, Plate};

/// The three consultation tiers, in cascade order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    #[serde(rename = "VEHICLE")]
    Vehicle,
    #[serde(rename = "PLATE")]
    Plate,
    #[serde(rename = "PERSON")]
    Person,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Vehicle => "VEHICLE",
            Tier::Plate => "PLATE",
            Tier::Person => "PERSON",
        }
    }

    pub const ALL: [Tier; 3] = [Tier::Vehicle, Tier::Plate, Tier::Person];
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Queue priority. Orders candidate selection in the vehicle tier only.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum Priority {
    #[serde(rename = "LOW")]
    Low,
    #[default]
    #[serde(rename = "NORMAL")]
    Normal,
    #[serde(rename = "HIGH")]
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "PROCESSING")]
    Processing,
    #[serde(rename = "DONE")]
    Done,
    #[serde(rename = "ERROR")]
    Error,
}

/// A tier-1 search request as submitted by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub model: String,
    pub color: String,
    pub year_start: i32,
    pub year_end: Option<i32>,
    pub priority: Priority,
    pub batch_id: Option<String>,
}

impl SearchRequest {
    pub fn new(model: String, color: String, year_start: i32) -> Self {
        Self {
            model,
            color,
            year_start,
            year_end: None,
            priority: Priority::Normal,
            batch_id: None,
        }
    }

    /// Synchronous admission check. A failing request never reaches a queue.
    pub fn validate(&self) -> CascadeResult<()> {
        if self.model.trim().is_empty() {
            return Err(CascadeError::validation_error("model must not be empty"));
        }
        if self.color.trim().is_empty() {
            return Err(CascadeError::validation_error("color must not be empty"));
        }
        if !(1900..=2100).contains(&self.year_start) {
            return Err(CascadeError::validation_error(format!(
                "year_start out of range: {}",
                self.year_start
            )));
        }
        if let Some(year_end) = self.year_end {
            if !(1900..=2100).contains(&year_end) {
                return Err(CascadeError::validation_error(format!(
                    "year_end out of range: {year_end}"
                )));
            }
            if year_end < self.year_start {
                return Err(CascadeError::validation_error(
                    "year_end must not precede year_start",
                ));
            }
        }
        Ok(())
    }
}

/// The agent-facing slice of a search request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleQuery {
    pub model: String,
    pub color: String,
    pub year_start: i32,
    pub year_end: Option<i32>,
}

impl From<&SearchRequest> for VehicleQuery {
    fn from(request: &SearchRequest) -> Self {
        Self {
            model: request.model.clone(),
            color: request.color.clone(),
            year_start: request.year_start,
            year_end: request.year_end,
        }
    }
}

/// Tier-1 job: discover vehicles matching a search request.
#[derive(Debug, Clone, Serialize)]
pub struct VehicleJob {
    pub id: Uuid,
    pub request: SearchRequest,
    pub status: JobStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl VehicleJob {
    pub fn new(request: SearchRequest, max_attempts: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            request,
            status: JobStatus::Pending,
            attempts: 0,
            max_attempts,
            next_retry_at: None,
            created_at: Utc::now(),
            completed_at: None,
            last_error: None,
        }
    }

    pub fn begin_attempt(&mut self) {
        self.status = JobStatus::Processing;
        self.attempts += 1;
        self.next_retry_at = None;
    }

    pub fn complete(&mut self) {
        self.status = JobStatus::Done;
        if self.completed_at.is_none() {
            self.completed_at = Some(Utc::now());
        }
    }

    pub fn fail_transient(&mut self, error: String, next_retry_at: DateTime<Utc>) {
        self.status = JobStatus::Error;
        self.last_error = Some(error);
        self.next_retry_at = Some(next_retry_at);
    }

    pub fn fail_terminal(&mut self, error: String) {
        self.status = JobStatus::Error;
        self.last_error = Some(error);
        self.next_retry_at = None;
        if self.completed_at.is_none() {
            self.completed_at = Some(Utc::now());
        }
    }

    /// Terminal jobs are never dispatched again: Done, or Error without a
    /// scheduled retry.
    pub fn is_terminal(&self) -> bool {
        match self.status {
            JobStatus::Done => true,
            JobStatus::Error => self.next_retry_at.is_none(),
            _ => false,
        }
    }
}

/// Tier-2 job: resolve the ownership of one discovered plate.
#[derive(Debug, Clone, Serialize)]
pub struct PlateJob {
    pub id: Uuid,
    pub plate: Plate,
    pub origin_vehicle_id: Uuid,
    pub origin_request_id: Uuid,
    pub status: JobStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl PlateJob {
    pub fn new(
        plate: Plate,
        origin_vehicle_id: Uuid,
        origin_request_id: Uuid,
        max_attempts: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            plate,
            origin_vehicle_id,
            origin_request_id,
            status: JobStatus::Pending,
            attempts: 0,
            max_attempts,
            next_retry_at: None,
            created_at: Utc::now(),
            completed_at: None,
            last_error: None,
        }
    }

    pub fn begin_attempt(&mut self) {
        self.status = JobStatus::Processing;
        self.attempts += 1;
        self.next_retry_at = None;
    }

    pub fn complete(&mut self) {
        self.status = JobStatus::Done;
        if self.completed_at.is_none() {
            self.completed_at = Some(Utc::now());
        }
    }

    pub fn fail_transient(&mut self, error: String, next_retry_at: DateTime<Utc>) {
        self.status = JobStatus::Error;
        self.last_error = Some(error);
        self.next_retry_at = Some(next_retry_at);
    }

    pub fn fail_terminal(&mut self, error: String) {
        self.status = JobStatus::Error;
        self.last_error = Some(error);
        self.next_retry_at = None;
        if self.completed_at.is_none() {
            self.completed_at = Some(Utc::now());
        }
    }

    pub fn is_terminal(&self) -> bool {
        match self.status {
            JobStatus::Done => true,
            JobStatus::Error => self.next_retry_at.is_none(),
            _ => false,
        }
    }
}

/// Tier-3 job: resolve the person behind one national id.
#[derive(Debug, Clone, Serialize)]
pub struct PersonJob {
    pub id: Uuid,
    pub national_id: NationalId,
    pub origin_plate: Plate,
    pub origin_request_id: Uuid,
    pub status: JobStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl PersonJob {
    pub fn new(
        national_id: NationalId,
        origin_plate: Plate,
        origin_request_id: Uuid,
        max_attempts: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            national_id,
            origin_plate,
            origin_request_id,
            status: JobStatus::Pending,
            attempts: 0,
            max_attempts,
            next_retry_at: None,
            created_at: Utc::now(),
            completed_at: None,
            last_error: None,
        }
    }

    pub fn begin_attempt(&mut self) {
        self.status = JobStatus::Processing;
        self.attempts += 1;
        self.next_retry_at = None;
    }

    pub fn complete(&mut self) {
        self.status = JobStatus::Done;
        if self.completed_at.is_none() {
            self.completed_at = Some(Utc::now());
        }
    }

    pub fn fail_transient(&mut self, error: String, next_retry_at: DateTime<Utc>) {
        self.status = JobStatus::Error;
        self.last_error = Some(error);
        self.next_retry_at = Some(next_retry_at);
    }

    pub fn fail_terminal(&mut self, error: String) {
        self.status = JobStatus::Error;
        self.last_error = Some(error);
        self.next_retry_at = None;
        if self.completed_at.is_none() {
            self.completed_at = Some(Utc::now());
        }
    }

    pub fn is_terminal(&self) -> bool {
        match self.status {
            JobStatus::Done => true,
            JobStatus::Error => self.next_retry_at.is_none(),
            _ => false,
        }
    }
}

/// One vehicle as reported by the agent, before provenance is attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleFinding {
    pub plate: String,
    pub model: String,
    pub color: String,
    pub year: i32,
    pub chassis: Option<String>,
    pub registration_id: Option<String>,
    pub source: String,
    /// Agent payload as received, kept for the audit trail.
    pub raw_payload: serde_json::Value,
}

/// Ownership data for a plate as reported by the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlateFinding {
    pub owner: Owner,
    pub vehicle: VehicleInfo,
    pub address: Option<Address>,
    pub source: String,
    pub latency_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Owner {
    pub name: String,
    /// National id as reported, unvalidated. Fan-out validates before any
    /// person job is created.
    pub national_id: Option<String>,
    pub id_document: Option<String>,
}

/// Descriptive vehicle data echoed back by the plate lookup, all free text
/// as the source site reports it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VehicleInfo {
    pub make: Option<String>,
    pub model: Option<String>,
    pub color: Option<String>,
    pub year: Option<String>,
    pub status: Option<String>,
    pub category: Option<String>,
}

/// Person data for a national id as reported by the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonFinding {
    pub name: String,
    pub birth_date: Option<NaiveDate>,
    pub mother_name: Option<String>,
    pub address: Option<Address>,
    pub phones: Vec<String>,
    pub emails: Vec<String>,
    pub source: String,
    pub latency_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub number: String,
    pub complement: Option<String>,
    pub district: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
}

impl Address {
    /// Single-line rendering used by chain summaries.
    pub fn full_line(&self) -> String {
        let complement = self
            .complement
            .as_deref()
            .map(|c| format!(" - {c}"))
            .unwrap_or_default();
        format!(
            "{}, {}{}, {}, {}/{} - CEP: {}",
            self.street, self.number, complement, self.district, self.city, self.state,
            self.zip_code
        )
    }
}

/// A discovered vehicle with provenance, stored and persisted at tier 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleRecord {
    pub id: Uuid,
    pub plate: String,
    pub model: String,
    pub color: String,
    pub year: i32,
    pub chassis: Option<String>,
    pub registration_id: Option<String>,
    pub source: String,
    pub raw_payload: serde_json::Value,
    pub origin_job_id: Uuid,
    pub collected_at: DateTime<Utc>,
}

impl VehicleRecord {
    pub fn from_finding(finding: VehicleFinding, origin_job_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            plate: finding.plate,
            model: finding.model,
            color: finding.color,
            year: finding.year,
            chassis: finding.chassis,
            registration_id: finding.registration_id,
            source: finding.source,
            raw_payload: finding.raw_payload,
            origin_job_id,
            collected_at: Utc::now(),
        }
    }
}

/// Resolved ownership of a plate, stored and persisted at tier 2.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlateRecord {
    /// Normalized plate, the cache key for this record.
    pub plate: String,
    pub owner: Owner,
    pub vehicle: VehicleInfo,
    pub address: Option<Address>,
    pub source: String,
    pub latency_ms: u64,
    pub origin_vehicle_id: Uuid,
    pub collected_at: DateTime<Utc>,
}

impl PlateRecord {
    pub fn from_finding(finding: PlateFinding, plate: &Plate, origin_vehicle_id: Uuid) -> Self {
        Self {
            plate: plate.as_str().to_string(),
            owner: finding.owner,
            vehicle: finding.vehicle,
            address: finding.address,
            source: finding.source,
            latency_ms: finding.latency_ms,
            origin_vehicle_id,
            collected_at: Utc::now(),
        }
    }
}

/// Resolved person data, stored and persisted at tier 3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonRecord {
    /// National id digits, the cache key for this record.
    pub national_id: String,
    pub name: String,
    pub birth_date: Option<NaiveDate>,
    pub mother_name: Option<String>,
    pub address: Option<Address>,
    pub phones: Vec<String>,
    pub emails: Vec<String>,
    pub source: String,
    pub latency_ms: u64,
    pub origin_plate: String,
    pub collected_at: DateTime<Utc>,
}

impl PersonRecord {
    pub fn from_finding(
        finding: PersonFinding,
        national_id: &NationalId,
        origin_plate: &Plate,
    ) -> Self {
        Self {
            national_id: national_id.as_str().to_string(),
            name: finding.name,
            birth_date: finding.birth_date,
            mother_name: finding.mother_name,
            address: finding.address,
            phones: finding.phones,
            emails: finding.emails,
            source: finding.source,
            latency_ms: finding.latency_ms,
            origin_plate: origin_plate.as_str().to_string(),
            collected_at: Utc::now(),
        }
    }
}

/// Flattened view of one completed chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainSummary {
    pub model: String,
    pub plate: String,
    pub national_id: String,
    pub owner_name: String,
    pub full_address: String,
}

/// The joined vehicle + plate + person records of one origin chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeRecord {
    pub id: Uuid,
    pub origin_request_id: Uuid,
    pub vehicle: VehicleRecord,
    pub plate: PlateRecord,
    pub person: PersonRecord,
    pub summary: ChainSummary,
    pub created_at: DateTime<Utc>,
}

impl CompositeRecord {
    pub fn new(
        origin_request_id: Uuid,
        vehicle: VehicleRecord,
        plate: PlateRecord,
        person: PersonRecord,
        summary: ChainSummary,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            origin_request_id,
            vehicle,
            plate,
            person,
            summary,
            created_at: Utc::now(),
        }
    }
}

/// Audit trail record categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    #[serde(rename = "VEHICLE")]
    Vehicle,
    #[serde(rename = "PLATE")]
    Plate,
    #[serde(rename = "PERSON")]
    Person,
    #[serde(rename = "COMPOSITE")]
    Composite,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Vehicle => "VEHICLE",
            RecordKind::Plate => "PLATE",
            RecordKind::Person => "PERSON",
            RecordKind::Composite => "COMPOSITE",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
