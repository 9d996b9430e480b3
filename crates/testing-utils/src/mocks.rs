//! Mock implementations of the pipeline's external collaborators
//!
//! This module provides in-memory test doubles that can be used for unit
//! testing without a running extraction agent or a real database.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use cascade_core::{CascadeError, CascadeResult, ExtractionError};
use cascade_domain::entities::{PersonFinding, PlateFinding, RecordKind, VehicleFinding, VehicleQuery};
use cascade_domain::ports::{AuditStore, ExtractionAgent, ExtractionResult};
use cascade_domain::value_objects::{NationalId, Plate};

use crate::builders::{PersonFindingBuilder, PlateFindingBuilder};

/// Scripted mock of the extraction agent.
///
/// Responses are queued per tier and consumed in order; once a queue runs
/// dry the mock falls back to a benign default (empty vehicle list, builder
/// defaults for plate and person). Every call is recorded for assertions.
#[derive(Debug, Clone, Default)]
pub struct MockExtractionAgent {
    vehicle_results: Arc<Mutex<VecDeque<ExtractionResult<Vec<VehicleFinding>>>>>,
    plate_results: Arc<Mutex<VecDeque<ExtractionResult<PlateFinding>>>>,
    person_results: Arc<Mutex<VecDeque<ExtractionResult<PersonFinding>>>>,
    vehicle_calls: Arc<Mutex<Vec<VehicleQuery>>>,
    plate_calls: Arc<Mutex<Vec<String>>>,
    person_calls: Arc<Mutex<Vec<String>>>,
}

impl MockExtractionAgent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_vehicles(&self, findings: Vec<VehicleFinding>) {
        self.vehicle_results.lock().unwrap().push_back(Ok(findings));
    }

    pub fn push_vehicle_error(&self, error: ExtractionError) {
        self.vehicle_results.lock().unwrap().push_back(Err(error));
    }

    pub fn push_plate(&self, finding: PlateFinding) {
        self.plate_results.lock().unwrap().push_back(Ok(finding));
    }

    pub fn push_plate_error(&self, error: ExtractionError) {
        self.plate_results.lock().unwrap().push_back(Err(error));
    }

    pub fn push_person(&self, finding: PersonFinding) {
        self.person_results.lock().unwrap().push_back(Ok(finding));
    }

    pub fn push_person_error(&self, error: ExtractionError) {
        self.person_results.lock().unwrap().push_back(Err(error));
    }

    pub fn vehicle_calls(&self) -> Vec<VehicleQuery> {
        self.vehicle_calls.lock().unwrap().clone()
    }

    /// Normalized plates this agent was asked to resolve, in call order.
    pub fn plate_calls(&self) -> Vec<String> {
        self.plate_calls.lock().unwrap().clone()
    }

    /// National id digits this agent was asked to resolve, in call order.
    pub fn person_calls(&self) -> Vec<String> {
        self.person_calls.lock().unwrap().clone()
    }

    pub fn vehicle_call_count(&self) -> usize {
        self.vehicle_calls.lock().unwrap().len()
    }

    pub fn plate_call_count(&self) -> usize {
        self.plate_calls.lock().unwrap().len()
    }

    pub fn person_call_count(&self) -> usize {
        self.person_calls.lock().unwrap().len()
    }

    pub fn clear(&self) {
        self.vehicle_results.lock().unwrap().clear();
        self.plate_results.lock().unwrap().clear();
        self.person_results.lock().unwrap().clear();
        self.vehicle_calls.lock().unwrap().clear();
        self.plate_calls.lock().unwrap().clear();
        self.person_calls.lock().unwrap().clear();
    }
}

#[async_trait]
impl ExtractionAgent for MockExtractionAgent {
    async fn fetch_vehicles(&self, query: &VehicleQuery) -> ExtractionResult<Vec<VehicleFinding>> {
        self.vehicle_calls.lock().unwrap().push(query.clone());
        self.vehicle_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(vec![]))
    }

    async fn fetch_plate_owner(&self, plate: &Plate) -> ExtractionResult<PlateFinding> {
        self.plate_calls
            .lock()
            .unwrap()
            .push(plate.as_str().to_string());
        self.plate_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(PlateFindingBuilder::new().build()))
    }

    async fn fetch_person(&self, national_id: &NationalId) -> ExtractionResult<PersonFinding> {
        self.person_calls
            .lock()
            .unwrap()
            .push(national_id.as_str().to_string());
        self.person_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(PersonFindingBuilder::new().build()))
    }
}

/// One save captured by [`MockAuditStore`].
#[derive(Debug, Clone)]
pub struct SavedRecord {
    pub kind: RecordKind,
    pub payload: Value,
    pub correlation_id: String,
}

/// Recording mock of the audit store.
#[derive(Debug, Clone, Default)]
pub struct MockAuditStore {
    records: Arc<Mutex<Vec<SavedRecord>>>,
    failing: Arc<Mutex<bool>>,
}

impl MockAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent save fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    pub fn records(&self) -> Vec<SavedRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn count_by_kind(&self, kind: RecordKind) -> usize {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.kind == kind)
            .count()
    }

    pub fn records_by_kind(&self, kind: RecordKind) -> Vec<SavedRecord> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.kind == kind)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.records.lock().unwrap().clear();
    }
}

#[async_trait]
impl AuditStore for MockAuditStore {
    async fn save(
        &self,
        kind: RecordKind,
        payload: &Value,
        correlation_id: &str,
    ) -> CascadeResult<()> {
        if *self.failing.lock().unwrap() {
            return Err(CascadeError::persistence_error("audit store unavailable"));
        }
        self.records.lock().unwrap().push(SavedRecord {
            kind,
            payload: payload.clone(),
            correlation_id: correlation_id.to_string(),
        });
        Ok(())
    }
}
