//! Cascading Consultation Dispatcher
//!
//! This crate contains the pipeline core: the three tier queues, the
//! per-tier rate controller, the linear-backoff retry policy, the shared
//! result cache, the relationship builder joining completed chains, and
//! the `CascadePipeline` orchestrating all of them.

pub mod cache;
pub mod pipeline;
pub mod queue;
pub mod rate;
pub mod relationship;
pub mod retry;
pub mod stats;

pub use cache::ResultCache;
pub use pipeline::CascadePipeline;
pub use queue::{QueuedJob, StatusCounts, TierQueue};
pub use rate::RateController;
pub use relationship::build_composite;
pub use retry::{RetryDecision, RetryPolicy};
pub use stats::{
    CacheStats, EtaEstimate, EtaEstimates, PurgeReport, StatisticsSnapshot, TierStats,
};
