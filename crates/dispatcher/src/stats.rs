use chrono::{DateTime, Utc};
use serde::Serialize;

use cascade_domain::Tier;

use crate::queue::StatusCounts;

/// Job counts for one tier at snapshot time.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TierStats {
    pub tier: Tier,
    pub counts: StatusCounts,
    /// Jobs still owed a dispatch: pending plus scheduled retries.
    pub waiting: usize,
    /// Whether a dispatch for this tier is currently awaiting the agent.
    pub in_flight: bool,
    /// Seconds until the rate window admits the next dispatch, zero when open.
    pub rate_remaining_seconds: i64,
}

/// Entry counts per cache namespace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub vehicles: usize,
    pub plates: usize,
    pub persons: usize,
}

/// Point-in-time view over all three tiers and the result cache.
#[derive(Debug, Clone, Serialize)]
pub struct StatisticsSnapshot {
    pub vehicles: TierStats,
    pub plates: TierStats,
    pub persons: TierStats,
    pub cache: CacheStats,
    pub generated_at: DateTime<Utc>,
}

impl StatisticsSnapshot {
    pub fn total_jobs(&self) -> usize {
        self.vehicles.counts.total() + self.plates.counts.total() + self.persons.counts.total()
    }

    pub fn total_waiting(&self) -> usize {
        self.vehicles.waiting + self.plates.waiting + self.persons.waiting
    }
}

/// Worst-case drain time for one tier under its rate window.
#[derive(Debug, Clone, Serialize)]
pub struct EtaEstimate {
    pub tier: Tier,
    pub waiting: usize,
    pub estimated_seconds: i64,
    pub human: String,
}

impl EtaEstimate {
    pub fn new(tier: Tier, waiting: usize, min_delay_seconds: i64) -> Self {
        let estimated_seconds = waiting as i64 * min_delay_seconds;
        Self {
            tier,
            waiting,
            estimated_seconds,
            human: format_duration(estimated_seconds),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EtaEstimates {
    pub vehicles: EtaEstimate,
    pub plates: EtaEstimate,
    pub persons: EtaEstimate,
    pub generated_at: DateTime<Utc>,
}

/// Jobs removed from each tier by a purge pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    pub vehicles: usize,
    pub plates: usize,
    pub persons: usize,
}

impl PurgeReport {
    pub fn total(&self) -> usize {
        self.vehicles + self.plates + self.persons
    }
}

/// Human-readable duration: seconds below a minute, then minutes and
/// seconds, then hours, minutes and seconds.
pub fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    if seconds < 60 {
        format!("{seconds}s")
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else {
        format!(
            "{}h {}m {}s",
            seconds / 3600,
            (seconds % 3600) / 60,
            seconds % 60
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration_ranges() {
        assert_eq!(format_duration(0), "0s");
        assert_eq!(format_duration(45), "45s");
        assert_eq!(format_duration(60), "1m 0s");
        assert_eq!(format_duration(330), "5m 30s");
        assert_eq!(format_duration(3600), "1h 0m 0s");
        assert_eq!(format_duration(7500), "2h 5m 0s");
        assert_eq!(format_duration(7530), "2h 5m 30s");
    }

    #[test]
    fn test_format_duration_clamps_negative() {
        assert_eq!(format_duration(-5), "0s");
    }

    #[test]
    fn test_eta_estimate_multiplies_waiting_by_delay() {
        let eta = EtaEstimate::new(Tier::Plate, 7, 30);
        assert_eq!(eta.estimated_seconds, 210);
        assert_eq!(eta.human, "3m 30s");

        let empty = EtaEstimate::new(Tier::Person, 0, 30);
        assert_eq!(empty.estimated_seconds, 0);
        assert_eq!(empty.human, "0s");
    }

    #[test]
    fn test_purge_report_total() {
        let report = PurgeReport {
            vehicles: 2,
            plates: 3,
            persons: 1,
        };
        assert_eq!(report.total(), 6);
    }
}
