use chrono::{DateTime, Duration, Utc};

use cascade_core::{ExtractionError, PipelineConfig};

/// What to do with a job after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Keep the job error-but-eligible; redispatch no earlier than this.
    RetryAt(DateTime<Utc>),
    /// Terminal: permanent error or attempts exhausted.
    GiveUp,
}

/// Linear backoff retry policy: the nth failure waits `backoff * n`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::seconds(config.retry_backoff_seconds as i64),
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn next_retry_at(&self, attempts: u32, now: DateTime<Utc>) -> DateTime<Utc> {
        now + self.backoff * attempts as i32
    }

    /// `attempts` is the attempt count including the one that just failed.
    pub fn decide(
        &self,
        attempts: u32,
        error: &ExtractionError,
        now: DateTime<Utc>,
    ) -> RetryDecision {
        if !error.is_retryable() {
            return RetryDecision::GiveUp;
        }
        if attempts >= self.max_attempts {
            return RetryDecision::GiveUp;
        }
        RetryDecision::RetryAt(self.next_retry_at(attempts, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::seconds(60))
    }

    #[test]
    fn test_backoff_grows_linearly() {
        let policy = policy();
        let now = Utc::now();

        assert_eq!(policy.next_retry_at(1, now), now + Duration::seconds(60));
        assert_eq!(policy.next_retry_at(2, now), now + Duration::seconds(120));
    }

    #[test]
    fn test_transient_errors_retry_until_attempts_exhausted() {
        let policy = policy();
        let now = Utc::now();
        let err = ExtractionError::Timeout(25);

        assert_eq!(
            policy.decide(1, &err, now),
            RetryDecision::RetryAt(now + Duration::seconds(60))
        );
        assert_eq!(
            policy.decide(2, &err, now),
            RetryDecision::RetryAt(now + Duration::seconds(120))
        );
        assert_eq!(policy.decide(3, &err, now), RetryDecision::GiveUp);
    }

    #[test]
    fn test_permanent_errors_give_up_immediately() {
        let policy = policy();
        let now = Utc::now();
        let err = ExtractionError::NotFound("plate XYZ9876".to_string());

        assert_eq!(policy.decide(1, &err, now), RetryDecision::GiveUp);
    }

    #[test]
    fn test_single_attempt_policy_never_retries() {
        let policy = RetryPolicy::new(1, Duration::seconds(60));
        let now = Utc::now();
        let err = ExtractionError::AgentUnavailable("connect refused".to_string());

        assert_eq!(policy.decide(1, &err, now), RetryDecision::GiveUp);
    }
}
