use std::cmp::Reverse;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use cascade_domain::{JobStatus, PersonJob, PlateJob, Priority, VehicleJob};

/// Queue view over a tier job. Read access plus the failure transitions the
/// shared completion path needs; everything else stays on the concrete types.
pub trait QueuedJob {
    fn id(&self) -> Uuid;
    fn status(&self) -> JobStatus;
    fn attempts(&self) -> u32;
    fn next_retry_at(&self) -> Option<DateTime<Utc>>;
    fn created_at(&self) -> DateTime<Utc>;
    fn is_terminal(&self) -> bool;
    fn fail_transient(&mut self, error: String, next_retry_at: DateTime<Utc>);
    fn fail_terminal(&mut self, error: String);

    fn priority(&self) -> Priority {
        Priority::Normal
    }

    /// Eligible for dispatch: pending, or failed with its retry time reached.
    fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        match self.status() {
            JobStatus::Pending => true,
            JobStatus::Error => self.next_retry_at().map(|at| at <= now).unwrap_or(false),
            JobStatus::Processing | JobStatus::Done => false,
        }
    }
}

impl QueuedJob for VehicleJob {
    fn id(&self) -> Uuid {
        self.id
    }
    fn status(&self) -> JobStatus {
        self.status
    }
    fn attempts(&self) -> u32 {
        self.attempts
    }
    fn next_retry_at(&self) -> Option<DateTime<Utc>> {
        self.next_retry_at
    }
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
    fn is_terminal(&self) -> bool {
        self.is_terminal()
    }
    fn fail_transient(&mut self, error: String, next_retry_at: DateTime<Utc>) {
        self.fail_transient(error, next_retry_at);
    }
    fn fail_terminal(&mut self, error: String) {
        self.fail_terminal(error);
    }
    fn priority(&self) -> Priority {
        self.request.priority
    }
}

impl QueuedJob for PlateJob {
    fn id(&self) -> Uuid {
        self.id
    }
    fn status(&self) -> JobStatus {
        self.status
    }
    fn attempts(&self) -> u32 {
        self.attempts
    }
    fn next_retry_at(&self) -> Option<DateTime<Utc>> {
        self.next_retry_at
    }
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
    fn is_terminal(&self) -> bool {
        self.is_terminal()
    }
    fn fail_transient(&mut self, error: String, next_retry_at: DateTime<Utc>) {
        self.fail_transient(error, next_retry_at);
    }
    fn fail_terminal(&mut self, error: String) {
        self.fail_terminal(error);
    }
}

impl QueuedJob for PersonJob {
    fn id(&self) -> Uuid {
        self.id
    }
    fn status(&self) -> JobStatus {
        self.status
    }
    fn attempts(&self) -> u32 {
        self.attempts
    }
    fn next_retry_at(&self) -> Option<DateTime<Utc>> {
        self.next_retry_at
    }
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
    fn is_terminal(&self) -> bool {
        self.is_terminal()
    }
    fn fail_transient(&mut self, error: String, next_retry_at: DateTime<Utc>) {
        self.fail_transient(error, next_retry_at);
    }
    fn fail_terminal(&mut self, error: String) {
        self.fail_terminal(error);
    }
}

/// Per-status job counts for one tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub processing: usize,
    pub done: usize,
    pub error: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.pending + self.processing + self.done + self.error
    }
}

/// In-memory queue for one tier, keyed by job id.
#[derive(Debug)]
pub struct TierQueue<J: QueuedJob> {
    jobs: HashMap<Uuid, J>,
}

impl<J: QueuedJob> TierQueue<J> {
    pub fn new() -> Self {
        Self {
            jobs: HashMap::new(),
        }
    }

    pub fn insert(&mut self, job: J) -> Uuid {
        let id = job.id();
        self.jobs.insert(id, job);
        id
    }

    pub fn get(&self, id: &Uuid) -> Option<&J> {
        self.jobs.get(id)
    }

    pub fn get_mut(&mut self, id: &Uuid) -> Option<&mut J> {
        self.jobs.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &J> {
        self.jobs.values()
    }

    /// True when a non-terminal job matches the predicate. Live jobs block
    /// duplicate fan-out for the same natural key.
    pub fn any_live(&self, matches: impl Fn(&J) -> bool) -> bool {
        self.jobs.values().any(|j| !j.is_terminal() && matches(j))
    }

    /// The single next candidate: highest priority first, then oldest,
    /// then id for a deterministic tie-break.
    pub fn select_next(&self, now: DateTime<Utc>) -> Option<Uuid> {
        self.jobs
            .values()
            .filter(|j| j.is_eligible(now))
            .min_by_key(|j| (Reverse(j.priority()), j.created_at(), j.id()))
            .map(|j| j.id())
    }

    pub fn status_counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for job in self.jobs.values() {
            match job.status() {
                JobStatus::Pending => counts.pending += 1,
                JobStatus::Processing => counts.processing += 1,
                JobStatus::Done => counts.done += 1,
                JobStatus::Error => counts.error += 1,
            }
        }
        counts
    }

    /// Jobs still owed a dispatch: pending plus failed-with-scheduled-retry.
    pub fn waiting_count(&self) -> usize {
        self.jobs
            .values()
            .filter(|j| {
                matches!(j.status(), JobStatus::Pending)
                    || (matches!(j.status(), JobStatus::Error) && j.next_retry_at().is_some())
            })
            .count()
    }

    /// Removes Done jobs only. Terminal errors stay visible for inspection.
    pub fn purge_done(&mut self) -> usize {
        let before = self.jobs.len();
        self.jobs.retain(|_, j| j.status() != JobStatus::Done);
        before - self.jobs.len()
    }
}

impl<J: QueuedJob> Default for TierQueue<J> {
    fn default() -> Self {
        Self::new()
    }
}
