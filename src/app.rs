use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tokio::time::{interval, Duration};
use tracing::info;

use cascade_core::AppConfig;
use cascade_dispatcher::CascadePipeline;
use cascade_infrastructure::{HttpExtractionAgent, SqliteAuditStore};

/// Wires the audit store, the bridge client and the pipeline together and
/// keeps them running until shutdown.
pub struct Application {
    config: AppConfig,
    pipeline: CascadePipeline,
    audit: Arc<SqliteAuditStore>,
}

impl Application {
    pub async fn new(config: AppConfig) -> Result<Self> {
        info!("initializing cascade application");

        let audit = Arc::new(
            SqliteAuditStore::connect(&config.database)
                .await
                .context("opening audit database")?,
        );
        audit
            .health_check()
            .await
            .context("audit database health check")?;
        info!("audit database ready: url={}", config.database.url);

        let agent =
            Arc::new(HttpExtractionAgent::new(&config.agent).context("building bridge client")?);
        info!("bridge client ready: base_url={}", config.agent.base_url);

        let pipeline = CascadePipeline::new(&config.pipeline, agent, audit.clone());

        Ok(Self {
            config,
            pipeline,
            audit,
        })
    }

    /// The pipeline behind this application, for enqueueing and inspection.
    pub fn pipeline(&self) -> &CascadePipeline {
        &self.pipeline
    }

    /// Runs until the shutdown signal arrives, then stops the pipeline and
    /// closes the audit store.
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        info!(
            "starting cascade pipeline: tick={}s, agent={}",
            self.config.pipeline.tick_interval_seconds, self.config.agent.base_url
        );
        self.pipeline.start().await?;

        let reporter = self.spawn_statistics_reporter();

        let _ = shutdown_rx.recv().await;
        info!("shutdown signal received, stopping pipeline");

        reporter.abort();
        self.pipeline.stop().await?;
        self.audit.close().await;

        info!("cascade application stopped");
        Ok(())
    }

    /// Periodic queue and cache summary in the log, the embedded-mode
    /// replacement for an external metrics surface.
    fn spawn_statistics_reporter(&self) -> tokio::task::JoinHandle<()> {
        let pipeline = self.pipeline.clone();

        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(60));
            // The first tick of a tokio interval fires immediately.
            ticker.tick().await;

            loop {
                ticker.tick().await;

                let stats = pipeline.statistics().await;
                info!(
                    "pipeline status: total_jobs={}, waiting={}, cached_plates={}, cached_persons={}",
                    stats.total_jobs(),
                    stats.total_waiting(),
                    stats.cache.plates,
                    stats.cache.persons
                );

                let etas = pipeline.eta_estimates().await;
                for eta in [&etas.vehicles, &etas.plates, &etas.persons] {
                    if eta.waiting > 0 {
                        info!(
                            "tier backlog: tier={}, waiting={}, eta={}",
                            eta.tier, eta.waiting, eta.human
                        );
                    }
                }
            }
        })
    }
}
