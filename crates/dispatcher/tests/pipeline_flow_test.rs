use std::sync::Arc;
use std::time::Duration;

use cascade_core::{ExtractionError, PipelineConfig};
use cascade_domain::JobStatus;
use cascade_domain::RecordKind;
use cascade_testing_utils::{
    MockAuditStore, MockExtractionAgent, PlateFindingBuilder, SearchRequestBuilder,
    VehicleFindingBuilder,
};
use tokio::task::JoinHandle;

use cascade_dispatcher::CascadePipeline;

fn fast_config() -> PipelineConfig {
    PipelineConfig {
        tick_interval_seconds: 1,
        vehicle_delay_seconds: 0,
        plate_delay_seconds: 0,
        person_delay_seconds: 0,
        max_attempts: 3,
        retry_backoff_seconds: 0,
        cache_ttl_seconds: None,
    }
}

fn build_pipeline(config: PipelineConfig) -> (CascadePipeline, MockExtractionAgent, MockAuditStore) {
    let agent = MockExtractionAgent::new();
    let audit = MockAuditStore::new();
    let pipeline = CascadePipeline::new(&config, Arc::new(agent.clone()), Arc::new(audit.clone()));
    (pipeline, agent, audit)
}

async fn run_tick(handle: Option<JoinHandle<()>>) {
    handle
        .expect("tick should dispatch")
        .await
        .expect("dispatch task panicked");
}

#[tokio::test]
async fn test_search_fans_out_plates_under_independent_rate_windows() {
    let config = PipelineConfig {
        vehicle_delay_seconds: 30,
        plate_delay_seconds: 30,
        person_delay_seconds: 30,
        retry_backoff_seconds: 60,
        ..fast_config()
    };
    let (pipeline, agent, _) = build_pipeline(config);

    agent.push_vehicles(vec![
        VehicleFindingBuilder::new().with_plate("ABC1234").build(),
        VehicleFindingBuilder::new().with_plate("XYZ5678").build(),
    ]);

    pipeline
        .enqueue_vehicle_search(SearchRequestBuilder::new().build())
        .await
        .unwrap();

    run_tick(pipeline.tick_vehicles().await).await;

    let plates = pipeline.plate_jobs().await;
    assert_eq!(plates.len(), 2);
    let mut keys: Vec<String> = plates
        .iter()
        .map(|j| j.plate.as_str().to_string())
        .collect();
    keys.sort();
    assert_eq!(keys, vec!["ABC1234", "XYZ5678"]);

    // Vehicle window consumed; plate tier gated independently, so its first
    // dispatch goes out and only the second is held back.
    assert!(pipeline.tick_vehicles().await.is_none());
    run_tick(pipeline.tick_plates().await).await;
    assert!(pipeline.tick_plates().await.is_none());

    let stats = pipeline.statistics().await;
    assert!(stats.vehicles.rate_remaining_seconds > 0);
    assert!(stats.plates.rate_remaining_seconds > 0);
    assert_eq!(stats.plates.counts.done, 1);
    assert_eq!(stats.plates.counts.pending, 1);
}

#[tokio::test]
async fn test_plate_lookup_recovers_after_two_failures() {
    let (pipeline, agent, _) = build_pipeline(fast_config());

    agent.push_vehicles(vec![VehicleFindingBuilder::new().build()]);
    agent.push_plate_error(ExtractionError::Timeout(25));
    agent.push_plate_error(ExtractionError::AgentUnavailable("bridge down".into()));
    agent.push_plate(PlateFindingBuilder::new().build());

    pipeline
        .enqueue_vehicle_search(SearchRequestBuilder::new().build())
        .await
        .unwrap();
    run_tick(pipeline.tick_vehicles().await).await;

    run_tick(pipeline.tick_plates().await).await;
    run_tick(pipeline.tick_plates().await).await;
    run_tick(pipeline.tick_plates().await).await;

    let plates = pipeline.plate_jobs().await;
    assert_eq!(plates.len(), 1);
    assert_eq!(plates[0].attempts, 3);
    assert_eq!(plates[0].status, JobStatus::Done);
    assert_eq!(agent.plate_call_count(), 3);

    // The successful third attempt still fans out the person lookup.
    assert_eq!(pipeline.person_jobs().await.len(), 1);
}

#[tokio::test]
async fn test_plate_lookup_exhausting_attempts_leaves_chain_headless() {
    let (pipeline, agent, audit) = build_pipeline(fast_config());

    agent.push_vehicles(vec![VehicleFindingBuilder::new().build()]);
    agent.push_plate_error(ExtractionError::Timeout(25));
    agent.push_plate_error(ExtractionError::Timeout(25));
    agent.push_plate_error(ExtractionError::Timeout(25));

    pipeline
        .enqueue_vehicle_search(SearchRequestBuilder::new().build())
        .await
        .unwrap();
    run_tick(pipeline.tick_vehicles().await).await;

    run_tick(pipeline.tick_plates().await).await;
    run_tick(pipeline.tick_plates().await).await;
    run_tick(pipeline.tick_plates().await).await;

    let plates = pipeline.plate_jobs().await;
    assert_eq!(plates[0].status, JobStatus::Error);
    assert_eq!(plates[0].attempts, 3);
    assert!(plates[0].next_retry_at.is_none());

    // Terminal: no fourth dispatch, no person job, no downstream records.
    assert!(pipeline.tick_plates().await.is_none());
    assert_eq!(agent.plate_call_count(), 3);
    assert!(pipeline.person_jobs().await.is_empty());
    assert_eq!(audit.count_by_kind(RecordKind::Vehicle), 1);
    assert_eq!(audit.count_by_kind(RecordKind::Plate), 0);
    assert_eq!(audit.count_by_kind(RecordKind::Composite), 0);
}

#[tokio::test]
async fn test_vehicles_sharing_a_plate_produce_one_chain() {
    let (pipeline, agent, audit) = build_pipeline(fast_config());

    agent.push_vehicles(vec![
        VehicleFindingBuilder::new()
            .with_plate("ABC1234")
            .with_color("BLACK")
            .build(),
        VehicleFindingBuilder::new()
            .with_plate("ABC1234")
            .with_color("GRAY")
            .build(),
    ]);

    pipeline
        .enqueue_vehicle_search(SearchRequestBuilder::new().build())
        .await
        .unwrap();
    run_tick(pipeline.tick_vehicles().await).await;

    assert_eq!(pipeline.plate_jobs().await.len(), 1);
    assert_eq!(audit.count_by_kind(RecordKind::Vehicle), 2);

    run_tick(pipeline.tick_plates().await).await;
    run_tick(pipeline.tick_persons().await).await;

    assert_eq!(agent.plate_call_count(), 1);
    assert_eq!(agent.person_call_count(), 1);
    assert_eq!(audit.count_by_kind(RecordKind::Composite), 1);
}

#[tokio::test]
async fn test_same_plate_from_two_searches_queues_once() {
    let (pipeline, agent, _) = build_pipeline(fast_config());

    agent.push_vehicles(vec![VehicleFindingBuilder::new().with_plate("ABC1234").build()]);
    agent.push_vehicles(vec![VehicleFindingBuilder::new().with_plate("ABC1234").build()]);

    pipeline
        .enqueue_vehicle_search(SearchRequestBuilder::new().build())
        .await
        .unwrap();
    pipeline
        .enqueue_vehicle_search(SearchRequestBuilder::new().with_color("GRAY").build())
        .await
        .unwrap();

    run_tick(pipeline.tick_vehicles().await).await;
    run_tick(pipeline.tick_vehicles().await).await;

    assert_eq!(pipeline.plate_jobs().await.len(), 1);

    run_tick(pipeline.tick_plates().await).await;
    assert!(pipeline.tick_plates().await.is_none());
    assert_eq!(agent.plate_call_count(), 1);
}

#[tokio::test]
async fn test_composite_record_joins_all_three_tiers() {
    let (pipeline, agent, audit) = build_pipeline(fast_config());
    agent.push_vehicles(vec![VehicleFindingBuilder::new().build()]);

    let origin = pipeline
        .enqueue_vehicle_search(SearchRequestBuilder::new().build())
        .await
        .unwrap();

    run_tick(pipeline.tick_vehicles().await).await;
    run_tick(pipeline.tick_plates().await).await;
    run_tick(pipeline.tick_persons().await).await;

    let composites = audit.records_by_kind(RecordKind::Composite);
    assert_eq!(composites.len(), 1);
    assert_eq!(composites[0].correlation_id, origin.to_string());

    let summary = &composites[0].payload["summary"];
    assert_eq!(summary["model"], "CIVIC");
    assert_eq!(summary["plate"], "ABC-1234");
    assert_eq!(summary["national_id"], "529.982.247-25");
    assert_eq!(summary["owner_name"], "MARIA SILVA");

    // Every tier record carries the same correlation id.
    assert!(audit
        .records()
        .iter()
        .all(|r| r.correlation_id == origin.to_string()));
}

#[tokio::test]
async fn test_purge_sweeps_done_jobs_across_all_tiers() {
    let (pipeline, agent, _) = build_pipeline(fast_config());

    // First search resolves a full chain; second one dies at the plate tier;
    // third never gets dispatched.
    agent.push_vehicles(vec![VehicleFindingBuilder::new().with_plate("ABC1234").build()]);
    agent.push_vehicles(vec![VehicleFindingBuilder::new().with_plate("XYZ5678").build()]);
    agent.push_plate(PlateFindingBuilder::new().build());
    agent.push_plate_error(ExtractionError::NotFound("plate XYZ5678".into()));

    pipeline
        .enqueue_vehicle_search(SearchRequestBuilder::new().build())
        .await
        .unwrap();
    pipeline
        .enqueue_vehicle_search(SearchRequestBuilder::new().with_model("COROLLA").build())
        .await
        .unwrap();
    pipeline
        .enqueue_vehicle_search(SearchRequestBuilder::new().with_model("ONIX").build())
        .await
        .unwrap();

    run_tick(pipeline.tick_vehicles().await).await;
    run_tick(pipeline.tick_vehicles().await).await;
    run_tick(pipeline.tick_plates().await).await;
    run_tick(pipeline.tick_plates().await).await;
    run_tick(pipeline.tick_persons().await).await;

    let report = pipeline.purge_completed_jobs().await;
    assert_eq!(report.vehicles, 2);
    assert_eq!(report.plates, 1);
    assert_eq!(report.persons, 1);

    // Pending and terminal-error jobs survive the sweep.
    let stats = pipeline.statistics().await;
    assert_eq!(stats.vehicles.counts.pending, 1);
    assert_eq!(stats.vehicles.counts.done, 0);
    assert_eq!(stats.plates.counts.error, 1);
    assert_eq!(stats.persons.counts.total(), 0);
}

#[tokio::test]
async fn test_running_tickers_drive_chain_to_completion() {
    let (pipeline, agent, audit) = build_pipeline(fast_config());
    agent.push_vehicles(vec![VehicleFindingBuilder::new().build()]);

    pipeline
        .enqueue_vehicle_search(SearchRequestBuilder::new().build())
        .await
        .unwrap();
    pipeline.start().await.unwrap();

    let mut chain_done = false;
    for _ in 0..100 {
        if audit.count_by_kind(RecordKind::Composite) == 1 {
            chain_done = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(chain_done, "chain did not complete under running tickers");

    pipeline.stop().await.unwrap();
    assert!(!pipeline.is_running().await);
}
