use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use cascade_core::{CascadeResult, ExtractionError, PipelineConfig};
use cascade_domain::{
    AuditStore, ExtractionAgent, ExtractionResult, NationalId, PersonFinding, PersonJob,
    PersonRecord, Plate, PlateFinding, PlateJob, PlateRecord, RecordKind, SearchRequest, Tier,
    VehicleFinding, VehicleJob, VehicleQuery, VehicleRecord,
};

use crate::cache::ResultCache;
use crate::queue::{QueuedJob, TierQueue};
use crate::rate::RateController;
use crate::relationship::build_composite;
use crate::retry::{RetryDecision, RetryPolicy};
use crate::stats::{EtaEstimate, EtaEstimates, PurgeReport, StatisticsSnapshot, TierStats};

/// One atomic flag per tier, claimed for the whole span of an agent call.
#[derive(Debug, Default)]
struct TierFlags {
    vehicle: AtomicBool,
    plate: AtomicBool,
    person: AtomicBool,
}

impl TierFlags {
    fn flag(&self, tier: Tier) -> &AtomicBool {
        match tier {
            Tier::Vehicle => &self.vehicle,
            Tier::Plate => &self.plate,
            Tier::Person => &self.person,
        }
    }

    fn try_claim(&self, tier: Tier) -> bool {
        self.flag(tier)
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn release(&self, tier: Tier) {
        self.flag(tier).store(false, Ordering::Release);
    }

    fn is_in_flight(&self, tier: Tier) -> bool {
        self.flag(tier).load(Ordering::Acquire)
    }
}

struct PipelineInner {
    config: PipelineConfig,
    agent: Arc<dyn ExtractionAgent>,
    audit: Arc<dyn AuditStore>,
    vehicles: RwLock<TierQueue<VehicleJob>>,
    plates: RwLock<TierQueue<PlateJob>>,
    persons: RwLock<TierQueue<PersonJob>>,
    rate: RwLock<RateController>,
    retry: RetryPolicy,
    cache: ResultCache,
    in_flight: TierFlags,
    /// Set on stop. Ticks refuse to dispatch and late agent results are
    /// dropped once this is up.
    stopped: AtomicBool,
    is_running: RwLock<bool>,
    shutdown_tx: RwLock<Option<broadcast::Sender<()>>>,
}

/// The cascading consultation pipeline.
///
/// Owns the three tier queues, the shared result cache, the per-tier rate
/// state and the retry policy. Each tier is dispatched by its own periodic
/// ticker and is strictly sequential internally; the only cross-tier write
/// is the fan-out of derived jobs performed when a dispatch completes.
///
/// Cloning is cheap and every clone drives the same pipeline.
#[derive(Clone)]
pub struct CascadePipeline {
    inner: Arc<PipelineInner>,
}

impl CascadePipeline {
    pub fn new(
        config: &PipelineConfig,
        agent: Arc<dyn ExtractionAgent>,
        audit: Arc<dyn AuditStore>,
    ) -> Self {
        Self {
            inner: Arc::new(PipelineInner {
                config: config.clone(),
                agent,
                audit,
                vehicles: RwLock::new(TierQueue::default()),
                plates: RwLock::new(TierQueue::default()),
                persons: RwLock::new(TierQueue::default()),
                rate: RwLock::new(RateController::from_config(config)),
                retry: RetryPolicy::from_config(config),
                cache: ResultCache::from_config(config),
                in_flight: TierFlags::default(),
                stopped: AtomicBool::new(false),
                is_running: RwLock::new(false),
                shutdown_tx: RwLock::new(None),
            }),
        }
    }

    /// Queues a vehicle search. Fails only on malformed parameters; every
    /// later failure attaches to the job itself.
    pub async fn enqueue_vehicle_search(&self, request: SearchRequest) -> CascadeResult<Uuid> {
        request.validate()?;

        let model = request.model.clone();
        let color = request.color.clone();
        let job = VehicleJob::new(request, self.inner.config.max_attempts);
        let id = self.inner.vehicles.write().await.insert(job);

        info!("vehicle search queued: job_id={id}, model={model}, color={color}");
        Ok(id)
    }

    /// Queues several searches under one batch id. Validation failure stops
    /// the batch at the offending request; earlier jobs stay queued.
    pub async fn enqueue_vehicle_search_batch(
        &self,
        requests: Vec<SearchRequest>,
    ) -> CascadeResult<Vec<Uuid>> {
        let batch_id = format!("batch-{}", Uuid::new_v4());
        let mut ids = Vec::with_capacity(requests.len());

        for mut request in requests {
            request.batch_id = Some(batch_id.clone());
            request.validate()?;
            let job = VehicleJob::new(request, self.inner.config.max_attempts);
            ids.push(self.inner.vehicles.write().await.insert(job));
        }

        info!(
            "vehicle search batch queued: batch_id={batch_id}, count={}, estimated_seconds={}",
            ids.len(),
            ids.len() as u64 * self.inner.config.vehicle_delay_seconds
        );
        Ok(ids)
    }

    /// Starts the three tier tickers. Idempotent.
    pub async fn start(&self) -> CascadeResult<()> {
        let mut is_running = self.inner.is_running.write().await;
        if *is_running {
            warn!("pipeline already running");
            return Ok(());
        }

        let (shutdown_tx, _) = broadcast::channel(1);
        let tick = Duration::from_secs(self.inner.config.tick_interval_seconds);

        for tier in Tier::ALL {
            let pipeline = self.clone();
            let mut shutdown_rx = shutdown_tx.subscribe();
            tokio::spawn(async move {
                let mut ticker = interval(tick);
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            pipeline.tick_tier(tier).await;
                        }
                        _ = shutdown_rx.recv() => {
                            info!("{tier} dispatch loop stopped");
                            break;
                        }
                    }
                }
            });
        }

        *self.inner.shutdown_tx.write().await = Some(shutdown_tx);
        self.inner.stopped.store(false, Ordering::Release);
        *is_running = true;

        info!(
            "pipeline started: tick={}s, delays={}s/{}s/{}s, max_attempts={}",
            self.inner.config.tick_interval_seconds,
            self.inner.config.vehicle_delay_seconds,
            self.inner.config.plate_delay_seconds,
            self.inner.config.person_delay_seconds,
            self.inner.config.max_attempts
        );
        Ok(())
    }

    /// Halts all tickers. In-flight agent calls are not aborted; their
    /// results are discarded on arrival.
    pub async fn stop(&self) -> CascadeResult<()> {
        let mut is_running = self.inner.is_running.write().await;
        self.inner.stopped.store(true, Ordering::Release);
        if !*is_running {
            return Ok(());
        }

        if let Some(shutdown_tx) = self.inner.shutdown_tx.write().await.take() {
            let _ = shutdown_tx.send(());
        }
        *is_running = false;

        info!("pipeline stopped, late agent results will be discarded");
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        *self.inner.is_running.read().await
    }

    async fn tick_tier(&self, tier: Tier) {
        let handle = match tier {
            Tier::Vehicle => self.tick_vehicles().await,
            Tier::Plate => self.tick_plates().await,
            Tier::Person => self.tick_persons().await,
        };
        // Completion is reported by the spawned call itself.
        drop(handle);
    }

    /// One dispatch pass over the vehicle tier. Returns the handle of the
    /// spawned agent call, or `None` when nothing was dispatched.
    pub async fn tick_vehicles(&self) -> Option<JoinHandle<()>> {
        if self.inner.stopped.load(Ordering::Acquire) {
            return None;
        }
        if self.inner.in_flight.is_in_flight(Tier::Vehicle) {
            return None;
        }

        let now = Utc::now();
        let mut vehicles = self.inner.vehicles.write().await;
        let candidate = vehicles.select_next(now)?;

        if !self.rate_gate(Tier::Vehicle, now).await {
            return None;
        }
        if !self.inner.in_flight.try_claim(Tier::Vehicle) {
            return None;
        }

        let (job_id, attempt, query) = match vehicles.get_mut(&candidate) {
            Some(job) => {
                job.begin_attempt();
                (job.id, job.attempts, VehicleQuery::from(&job.request))
            }
            None => {
                self.inner.in_flight.release(Tier::Vehicle);
                return None;
            }
        };
        self.inner
            .rate
            .write()
            .await
            .mark_dispatched(Tier::Vehicle, now);
        drop(vehicles);

        info!(
            "vehicle search dispatched: job_id={job_id}, attempt={attempt}, model={}, color={}",
            query.model, query.color
        );

        let pipeline = self.clone();
        Some(tokio::spawn(async move {
            let result = pipeline.inner.agent.fetch_vehicles(&query).await;
            pipeline.finish_vehicle(job_id, result).await;
        }))
    }

    /// One dispatch pass over the plate tier.
    pub async fn tick_plates(&self) -> Option<JoinHandle<()>> {
        if self.inner.stopped.load(Ordering::Acquire) {
            return None;
        }
        if self.inner.in_flight.is_in_flight(Tier::Plate) {
            return None;
        }

        let now = Utc::now();
        let mut plates = self.inner.plates.write().await;
        let candidate = plates.select_next(now)?;
        let key = plates.get(&candidate)?.plate.as_str().to_string();

        // A plate resolved since this job was queued completes without an
        // agent call and without consuming the rate window.
        if self.inner.cache.contains_plate(&key, now).await {
            if let Some(job) = plates.get_mut(&candidate) {
                info!(
                    "plate already resolved, completing from cache: plate={key}, job_id={}",
                    job.id
                );
                job.complete();
            }
            return None;
        }

        if !self.rate_gate(Tier::Plate, now).await {
            return None;
        }
        if !self.inner.in_flight.try_claim(Tier::Plate) {
            return None;
        }

        let (job_id, attempt, plate) = match plates.get_mut(&candidate) {
            Some(job) => {
                job.begin_attempt();
                (job.id, job.attempts, job.plate.clone())
            }
            None => {
                self.inner.in_flight.release(Tier::Plate);
                return None;
            }
        };
        self.inner
            .rate
            .write()
            .await
            .mark_dispatched(Tier::Plate, now);
        drop(plates);

        info!("plate lookup dispatched: job_id={job_id}, attempt={attempt}, plate={plate}");

        let pipeline = self.clone();
        Some(tokio::spawn(async move {
            let result = pipeline.inner.agent.fetch_plate_owner(&plate).await;
            pipeline.finish_plate(job_id, result).await;
        }))
    }

    /// One dispatch pass over the person tier.
    pub async fn tick_persons(&self) -> Option<JoinHandle<()>> {
        if self.inner.stopped.load(Ordering::Acquire) {
            return None;
        }
        if self.inner.in_flight.is_in_flight(Tier::Person) {
            return None;
        }

        let now = Utc::now();
        let mut persons = self.inner.persons.write().await;
        let candidate = persons.select_next(now)?;
        let key = persons.get(&candidate)?.national_id.as_str().to_string();

        if self.inner.cache.contains_person(&key, now).await {
            if let Some(job) = persons.get_mut(&candidate) {
                info!(
                    "person already resolved, completing from cache: national_id={key}, job_id={}",
                    job.id
                );
                job.complete();
            }
            return None;
        }

        if !self.rate_gate(Tier::Person, now).await {
            return None;
        }
        if !self.inner.in_flight.try_claim(Tier::Person) {
            return None;
        }

        let (job_id, attempt, national_id) = match persons.get_mut(&candidate) {
            Some(job) => {
                job.begin_attempt();
                (job.id, job.attempts, job.national_id.clone())
            }
            None => {
                self.inner.in_flight.release(Tier::Person);
                return None;
            }
        };
        self.inner
            .rate
            .write()
            .await
            .mark_dispatched(Tier::Person, now);
        drop(persons);

        info!(
            "person lookup dispatched: job_id={job_id}, attempt={attempt}, national_id={national_id}"
        );

        let pipeline = self.clone();
        Some(tokio::spawn(async move {
            let result = pipeline.inner.agent.fetch_person(&national_id).await;
            pipeline.finish_person(job_id, result).await;
        }))
    }

    /// True when the tier's rate window is open at `now`.
    async fn rate_gate(&self, tier: Tier, now: DateTime<Utc>) -> bool {
        let rate = self.inner.rate.read().await;
        if rate.is_ready(tier, now) {
            return true;
        }
        debug!(
            "{tier} rate window closed, next dispatch in {}s",
            rate.remaining(tier, now).num_seconds()
        );
        false
    }

    async fn finish_vehicle(&self, job_id: Uuid, result: ExtractionResult<Vec<VehicleFinding>>) {
        if self.inner.stopped.load(Ordering::Acquire) {
            debug!("pipeline stopped, discarding vehicle result: job_id={job_id}");
            self.inner.in_flight.release(Tier::Vehicle);
            return;
        }

        match result {
            Ok(findings) => self.complete_vehicle(job_id, findings).await,
            Err(error) => {
                self.fail_job(&self.inner.vehicles, Tier::Vehicle, job_id, error)
                    .await
            }
        }
        self.inner.in_flight.release(Tier::Vehicle);
    }

    async fn finish_plate(&self, job_id: Uuid, result: ExtractionResult<PlateFinding>) {
        if self.inner.stopped.load(Ordering::Acquire) {
            debug!("pipeline stopped, discarding plate result: job_id={job_id}");
            self.inner.in_flight.release(Tier::Plate);
            return;
        }

        match result {
            Ok(finding) => self.complete_plate(job_id, finding).await,
            Err(error) => {
                self.fail_job(&self.inner.plates, Tier::Plate, job_id, error)
                    .await
            }
        }
        self.inner.in_flight.release(Tier::Plate);
    }

    async fn finish_person(&self, job_id: Uuid, result: ExtractionResult<PersonFinding>) {
        if self.inner.stopped.load(Ordering::Acquire) {
            debug!("pipeline stopped, discarding person result: job_id={job_id}");
            self.inner.in_flight.release(Tier::Person);
            return;
        }

        match result {
            Ok(finding) => self.complete_person(job_id, finding).await,
            Err(error) => {
                self.fail_job(&self.inner.persons, Tier::Person, job_id, error)
                    .await
            }
        }
        self.inner.in_flight.release(Tier::Person);
    }

    /// An empty result list is a successful search that found nothing.
    async fn complete_vehicle(&self, job_id: Uuid, findings: Vec<VehicleFinding>) {
        let correlation = job_id.to_string();
        let found = findings.len();

        let mut queued = 0;
        for finding in findings {
            let record = VehicleRecord::from_finding(finding, job_id);
            self.persist(RecordKind::Vehicle, &record, &correlation).await;
            self.inner.cache.put_vehicle(record.clone()).await;
            if self.fan_out_plate(&record, job_id).await {
                queued += 1;
            }
        }

        {
            let mut vehicles = self.inner.vehicles.write().await;
            if let Some(job) = vehicles.get_mut(&job_id) {
                job.complete();
            }
        }

        info!("vehicle search completed: job_id={job_id}, found={found}, plates_queued={queued}");
    }

    /// Queues a plate lookup for one discovered vehicle. Returns false when
    /// the plate is unparseable, already resolved, or already queued.
    async fn fan_out_plate(&self, record: &VehicleRecord, origin_request_id: Uuid) -> bool {
        let now = Utc::now();
        let plate = match Plate::parse(&record.plate) {
            Ok(plate) => plate,
            Err(error) => {
                warn!(
                    "skipping discovered vehicle with bad plate: plate={}, error={error}",
                    record.plate
                );
                return false;
            }
        };

        if self.inner.cache.contains_plate(plate.as_str(), now).await {
            debug!("plate already resolved, skipping fan-out: plate={plate}");
            return false;
        }

        let mut plates = self.inner.plates.write().await;
        if plates.any_live(|job| job.plate == plate) {
            debug!("plate already queued, skipping fan-out: plate={plate}");
            return false;
        }

        let job = PlateJob::new(
            plate,
            record.id,
            origin_request_id,
            self.inner.config.max_attempts,
        );
        info!("plate lookup queued: plate={}, job_id={}", job.plate, job.id);
        plates.insert(job);
        true
    }

    async fn complete_plate(&self, job_id: Uuid, finding: PlateFinding) {
        let (plate, origin_vehicle_id, origin_request_id) = {
            let plates = self.inner.plates.read().await;
            match plates.get(&job_id) {
                Some(job) => (job.plate.clone(), job.origin_vehicle_id, job.origin_request_id),
                None => return,
            }
        };

        let record = PlateRecord::from_finding(finding, &plate, origin_vehicle_id);
        let correlation = origin_request_id.to_string();
        self.persist(RecordKind::Plate, &record, &correlation).await;
        self.inner.cache.put_plate(record.clone()).await;

        let queued = self.fan_out_person(&record, &plate, origin_request_id).await;

        {
            let mut plates = self.inner.plates.write().await;
            if let Some(job) = plates.get_mut(&job_id) {
                job.complete();
            }
        }

        info!(
            "plate lookup completed: job_id={job_id}, plate={plate}, owner={}, person_queued={queued}",
            record.owner.name
        );
    }

    /// Queues a person lookup for a plate's owner. The chain ends here when
    /// the owner carries no usable national id.
    async fn fan_out_person(
        &self,
        record: &PlateRecord,
        plate: &Plate,
        origin_request_id: Uuid,
    ) -> bool {
        let now = Utc::now();
        let national_id = match record.owner.national_id.as_deref() {
            Some(raw) => match NationalId::parse(raw) {
                Ok(id) => id,
                Err(error) => {
                    warn!("owner national id rejected: plate={plate}, error={error}");
                    return false;
                }
            },
            None => {
                warn!(
                    "owner has no national id, chain ends: plate={plate}, owner={}",
                    record.owner.name
                );
                return false;
            }
        };

        if self
            .inner
            .cache
            .contains_person(national_id.as_str(), now)
            .await
        {
            debug!("person already resolved, skipping fan-out: national_id={national_id}");
            return false;
        }

        let mut persons = self.inner.persons.write().await;
        if persons.any_live(|job| job.national_id == national_id) {
            debug!("person already queued, skipping fan-out: national_id={national_id}");
            return false;
        }

        let job = PersonJob::new(
            national_id,
            plate.clone(),
            origin_request_id,
            self.inner.config.max_attempts,
        );
        info!(
            "person lookup queued: national_id={}, job_id={}",
            job.national_id, job.id
        );
        persons.insert(job);
        true
    }

    async fn complete_person(&self, job_id: Uuid, finding: PersonFinding) {
        let job = {
            let persons = self.inner.persons.read().await;
            match persons.get(&job_id) {
                Some(job) => job.clone(),
                None => return,
            }
        };

        let record = PersonRecord::from_finding(finding, &job.national_id, &job.origin_plate);
        let correlation = job.origin_request_id.to_string();
        self.persist(RecordKind::Person, &record, &correlation).await;
        self.inner.cache.put_person(record.clone()).await;

        // The composite is a best-effort secondary artifact: a missing
        // sibling leg is logged and never retried.
        match build_composite(&self.inner.cache, &job, &record).await {
            Ok(composite) => {
                self.persist(RecordKind::Composite, &composite, &correlation)
                    .await;
                info!(
                    "chain completed: national_id={}, plate={}, owner={}",
                    job.national_id, job.origin_plate, composite.summary.owner_name
                );
            }
            Err(error) => {
                warn!(
                    "chain left incomplete: national_id={}, error={error}",
                    job.national_id
                );
            }
        }

        {
            let mut persons = self.inner.persons.write().await;
            if let Some(job) = persons.get_mut(&job_id) {
                job.complete();
            }
        }

        info!(
            "person lookup completed: job_id={job_id}, national_id={}",
            job.national_id
        );
    }

    async fn fail_job<J: QueuedJob>(
        &self,
        queue: &RwLock<TierQueue<J>>,
        tier: Tier,
        job_id: Uuid,
        error: ExtractionError,
    ) {
        let now = Utc::now();
        let mut queue = queue.write().await;
        let job = match queue.get_mut(&job_id) {
            Some(job) => job,
            None => return,
        };

        match self.inner.retry.decide(job.attempts(), &error, now) {
            RetryDecision::RetryAt(at) => {
                warn!(
                    "{tier} dispatch failed, retrying in {}s: job_id={job_id}, attempt={}, error={error}",
                    (at - now).num_seconds(),
                    job.attempts()
                );
                job.fail_transient(error.to_string(), at);
            }
            RetryDecision::GiveUp => {
                error!(
                    "{tier} dispatch failed permanently: job_id={job_id}, attempts={}, error={error}",
                    job.attempts()
                );
                job.fail_terminal(error.to_string());
            }
        }
    }

    /// Serializes and saves one record. Failures are logged and never roll
    /// back the in-memory job state.
    async fn persist<T: Serialize>(&self, kind: RecordKind, record: &T, correlation_id: &str) {
        let payload = match serde_json::to_value(record) {
            Ok(payload) => payload,
            Err(error) => {
                error!("failed to serialize {kind} record: correlation_id={correlation_id}, error={error}");
                return;
            }
        };
        if let Err(error) = self.inner.audit.save(kind, &payload, correlation_id).await {
            error!("failed to persist {kind} record: correlation_id={correlation_id}, error={error}");
        }
    }

    pub async fn statistics(&self) -> StatisticsSnapshot {
        let now = Utc::now();
        StatisticsSnapshot {
            vehicles: self.tier_stats(Tier::Vehicle, &self.inner.vehicles, now).await,
            plates: self.tier_stats(Tier::Plate, &self.inner.plates, now).await,
            persons: self.tier_stats(Tier::Person, &self.inner.persons, now).await,
            cache: self.inner.cache.stats().await,
            generated_at: now,
        }
    }

    async fn tier_stats<J: QueuedJob>(
        &self,
        tier: Tier,
        queue: &RwLock<TierQueue<J>>,
        now: DateTime<Utc>,
    ) -> TierStats {
        let (counts, waiting) = {
            let queue = queue.read().await;
            (queue.status_counts(), queue.waiting_count())
        };
        let rate_remaining_seconds = {
            let rate = self.inner.rate.read().await;
            rate.remaining(tier, now).num_seconds()
        };
        TierStats {
            tier,
            counts,
            waiting,
            in_flight: self.inner.in_flight.is_in_flight(tier),
            rate_remaining_seconds,
        }
    }

    /// Worst-case drain times assuming strictly sequential rate-limited
    /// dispatching per tier.
    pub async fn eta_estimates(&self) -> EtaEstimates {
        let vehicles = self.inner.vehicles.read().await.waiting_count();
        let plates = self.inner.plates.read().await.waiting_count();
        let persons = self.inner.persons.read().await.waiting_count();

        let rate = self.inner.rate.read().await;
        EtaEstimates {
            vehicles: EtaEstimate::new(
                Tier::Vehicle,
                vehicles,
                rate.min_delay(Tier::Vehicle).num_seconds(),
            ),
            plates: EtaEstimate::new(
                Tier::Plate,
                plates,
                rate.min_delay(Tier::Plate).num_seconds(),
            ),
            persons: EtaEstimate::new(
                Tier::Person,
                persons,
                rate.min_delay(Tier::Person).num_seconds(),
            ),
            generated_at: Utc::now(),
        }
    }

    /// Drops `done` jobs from every tier. Pending, processing and error jobs
    /// stay untouched.
    pub async fn purge_completed_jobs(&self) -> PurgeReport {
        let report = PurgeReport {
            vehicles: self.inner.vehicles.write().await.purge_done(),
            plates: self.inner.plates.write().await.purge_done(),
            persons: self.inner.persons.write().await.purge_done(),
        };
        info!(
            "purged completed jobs: vehicles={}, plates={}, persons={}",
            report.vehicles, report.plates, report.persons
        );
        report
    }

    pub fn cache(&self) -> &ResultCache {
        &self.inner.cache
    }

    /// Snapshot of one vehicle job, mainly for tests and diagnostics.
    pub async fn vehicle_job(&self, id: &Uuid) -> Option<VehicleJob> {
        self.inner.vehicles.read().await.get(id).cloned()
    }

    pub async fn vehicle_jobs(&self) -> Vec<VehicleJob> {
        self.inner.vehicles.read().await.iter().cloned().collect()
    }

    pub async fn plate_jobs(&self) -> Vec<PlateJob> {
        self.inner.plates.read().await.iter().cloned().collect()
    }

    pub async fn person_jobs(&self) -> Vec<PersonJob> {
        self.inner.persons.read().await.iter().cloned().collect()
    }
}
