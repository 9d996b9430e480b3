use chrono::{DateTime, Duration, Utc};

use cascade_core::PipelineConfig;
use cascade_domain::Tier;

/// Dispatch rate state for one tier.
#[derive(Debug, Clone)]
struct TierRate {
    min_delay: Duration,
    last_dispatch_at: Option<DateTime<Utc>>,
}

impl TierRate {
    fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            last_dispatch_at: None,
        }
    }
}

/// Global per-tier dispatch rate limiter. No jitter: the window opens
/// exactly `min_delay` after the previous dispatch.
///
/// All readiness questions take `now` explicitly so the arithmetic stays
/// testable without a clock. Each tier's state is mutated only by its own
/// dispatcher.
#[derive(Debug, Clone)]
pub struct RateController {
    vehicle: TierRate,
    plate: TierRate,
    person: TierRate,
}

impl RateController {
    pub fn new(vehicle_delay: Duration, plate_delay: Duration, person_delay: Duration) -> Self {
        Self {
            vehicle: TierRate::new(vehicle_delay),
            plate: TierRate::new(plate_delay),
            person: TierRate::new(person_delay),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            Duration::seconds(config.vehicle_delay_seconds as i64),
            Duration::seconds(config.plate_delay_seconds as i64),
            Duration::seconds(config.person_delay_seconds as i64),
        )
    }

    fn tier(&self, tier: Tier) -> &TierRate {
        match tier {
            Tier::Vehicle => &self.vehicle,
            Tier::Plate => &self.plate,
            Tier::Person => &self.person,
        }
    }

    fn tier_mut(&mut self, tier: Tier) -> &mut TierRate {
        match tier {
            Tier::Vehicle => &mut self.vehicle,
            Tier::Plate => &mut self.plate,
            Tier::Person => &mut self.person,
        }
    }

    /// True when the tier may dispatch at `now`.
    pub fn is_ready(&self, tier: Tier, now: DateTime<Utc>) -> bool {
        match self.next_allowed_at(tier) {
            Some(at) => now >= at,
            None => true,
        }
    }

    /// Remaining wait until the tier's window opens. Zero when ready.
    pub fn remaining(&self, tier: Tier, now: DateTime<Utc>) -> Duration {
        match self.next_allowed_at(tier) {
            Some(at) if at > now => at - now,
            _ => Duration::zero(),
        }
    }

    pub fn mark_dispatched(&mut self, tier: Tier, at: DateTime<Utc>) {
        self.tier_mut(tier).last_dispatch_at = Some(at);
    }

    pub fn next_allowed_at(&self, tier: Tier) -> Option<DateTime<Utc>> {
        let state = self.tier(tier);
        state.last_dispatch_at.map(|last| last + state.min_delay)
    }

    pub fn min_delay(&self, tier: Tier) -> Duration {
        self.tier(tier).min_delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> RateController {
        RateController::new(
            Duration::seconds(30),
            Duration::seconds(30),
            Duration::seconds(30),
        )
    }

    #[test]
    fn test_fresh_controller_is_ready_everywhere() {
        let controller = controller();
        let now = Utc::now();
        for tier in Tier::ALL {
            assert!(controller.is_ready(tier, now));
            assert_eq!(controller.remaining(tier, now), Duration::zero());
            assert!(controller.next_allowed_at(tier).is_none());
        }
    }

    #[test]
    fn test_window_closes_after_dispatch_and_reopens_on_schedule() {
        let mut controller = controller();
        let t0 = Utc::now();

        controller.mark_dispatched(Tier::Plate, t0);

        assert!(!controller.is_ready(Tier::Plate, t0));
        assert!(!controller.is_ready(Tier::Plate, t0 + Duration::seconds(29)));
        assert!(controller.is_ready(Tier::Plate, t0 + Duration::seconds(30)));
        assert!(controller.is_ready(Tier::Plate, t0 + Duration::seconds(31)));

        assert_eq!(
            controller.next_allowed_at(Tier::Plate),
            Some(t0 + Duration::seconds(30))
        );
    }

    #[test]
    fn test_remaining_counts_down() {
        let mut controller = controller();
        let t0 = Utc::now();

        controller.mark_dispatched(Tier::Vehicle, t0);

        assert_eq!(
            controller.remaining(Tier::Vehicle, t0 + Duration::seconds(10)),
            Duration::seconds(20)
        );
        assert_eq!(
            controller.remaining(Tier::Vehicle, t0 + Duration::seconds(30)),
            Duration::zero()
        );
    }

    #[test]
    fn test_tiers_are_independent() {
        let mut controller = controller();
        let t0 = Utc::now();

        controller.mark_dispatched(Tier::Vehicle, t0);

        assert!(!controller.is_ready(Tier::Vehicle, t0));
        assert!(controller.is_ready(Tier::Plate, t0));
        assert!(controller.is_ready(Tier::Person, t0));
    }

    #[test]
    fn test_per_tier_delays_from_config() {
        let config = PipelineConfig {
            vehicle_delay_seconds: 10,
            plate_delay_seconds: 20,
            person_delay_seconds: 40,
            ..PipelineConfig::default()
        };
        let controller = RateController::from_config(&config);

        assert_eq!(controller.min_delay(Tier::Vehicle), Duration::seconds(10));
        assert_eq!(controller.min_delay(Tier::Plate), Duration::seconds(20));
        assert_eq!(controller.min_delay(Tier::Person), Duration::seconds(40));
    }
}
