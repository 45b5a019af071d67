use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::errors::PipelineError;

/// Token bucket admission gate for one caller.
///
/// Tokens refill continuously at `rpm / 60` per second up to `capacity`.
/// Time comes from a monotonic clock, so a wall-clock regression can never
/// produce a negative refill.
#[derive(Clone, Debug)]
pub struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    updated_at: Instant,
}

impl TokenBucket {
    /// Bucket for an `rpm` requests-per-minute budget; burst capacity
    /// defaults to `rpm`.
    pub fn per_minute(rpm: u32) -> Result<Self, PipelineError> {
        Self::with_burst(rpm, rpm)
    }

    pub fn with_burst(rpm: u32, burst: u32) -> Result<Self, PipelineError> {
        if rpm == 0 {
            return Err(PipelineError::InvalidConfiguration("limiter.rpm must be > 0".to_owned()));
        }
        if burst == 0 {
            return Err(PipelineError::InvalidConfiguration("limiter.burst must be > 0".to_owned()));
        }
        let capacity = f64::from(burst);
        Ok(Self {
            capacity,
            tokens: capacity,
            refill_per_sec: f64::from(rpm) / 60.0,
            updated_at: Instant::now(),
        })
    }

    /// Non-blocking admission check: refill, then admit iff `tokens >= cost`.
    /// A rejected call leaves the balance untouched.
    pub fn allow(&mut self, cost: f64) -> bool {
        self.allow_at(Instant::now(), cost)
    }

    fn allow_at(&mut self, now: Instant, cost: f64) -> bool {
        let elapsed = now.saturating_duration_since(self.updated_at).as_secs_f64();
        self.updated_at = now;
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);

        if self.tokens >= cost {
            self.tokens -= cost;
            return true;
        }
        false
    }

    pub fn remaining(&self) -> f64 {
        self.tokens
    }
}

/// Soft cap on tracked sessions before an idle sweep runs.
const SWEEP_THRESHOLD: usize = 4096;

/// A bucket untouched for this long is dropped by the sweep. An evicted
/// caller reappears with a full bucket, which grants no less budget than an
/// hour of refill would have.
const IDLE_EVICTION: Duration = Duration::from_secs(3600);

struct BucketSlot {
    bucket: TokenBucket,
    last_seen: Instant,
}

/// Per-caller admission state: an explicit map from session identity to its
/// own bucket. Buckets are never shared across sessions, and the whole
/// read-refill-consume step happens atomically behind one lock.
pub struct SessionBuckets {
    template: TokenBucket,
    inner: Mutex<HashMap<String, BucketSlot>>,
}

impl SessionBuckets {
    pub fn new(rpm: u32, burst: Option<u32>) -> Result<Self, PipelineError> {
        // Budget validation happens here, at startup, not on first use.
        let template = TokenBucket::with_burst(rpm, burst.unwrap_or(rpm))?;
        Ok(Self { template, inner: Mutex::new(HashMap::new()) })
    }

    pub async fn allow(&self, session_id: &str, cost: f64) -> bool {
        let now = Instant::now();
        let mut sessions = self.inner.lock().await;

        if sessions.len() > SWEEP_THRESHOLD {
            sessions.retain(|_, slot| now.saturating_duration_since(slot.last_seen) < IDLE_EVICTION);
        }

        let slot = sessions
            .entry(session_id.to_owned())
            .or_insert_with(|| BucketSlot { bucket: self.template.clone(), last_seen: now });
        slot.last_seen = now;
        slot.bucket.allow_at(now, cost)
    }

    pub async fn tracked_sessions(&self) -> usize {
        self.inner.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::{SessionBuckets, TokenBucket};
    use crate::errors::PipelineError;

    #[test]
    fn zero_rpm_is_rejected_at_construction() {
        assert!(matches!(
            TokenBucket::per_minute(0),
            Err(PipelineError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            TokenBucket::with_burst(60, 0),
            Err(PipelineError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn full_bucket_admits_rpm_calls_then_rejects() {
        let mut bucket = TokenBucket::per_minute(60).expect("bucket");
        let t0 = Instant::now();

        for call in 0..60 {
            assert!(bucket.allow_at(t0, 1.0), "call {call} should be admitted");
        }
        assert!(!bucket.allow_at(t0, 1.0), "61st call must be rejected");
    }

    #[test]
    fn one_second_of_refill_admits_exactly_one_more_call() {
        let mut bucket = TokenBucket::per_minute(60).expect("bucket");
        let t0 = Instant::now();

        for _ in 0..60 {
            assert!(bucket.allow_at(t0, 1.0));
        }
        assert!(!bucket.allow_at(t0, 1.0));

        let t1 = t0 + Duration::from_secs(1);
        assert!(bucket.allow_at(t1, 1.0), "one second refills one token at 60 rpm");
        assert!(!bucket.allow_at(t1, 1.0), "and only one");
    }

    #[test]
    fn rejection_does_not_consume_tokens() {
        let mut bucket = TokenBucket::per_minute(60).expect("bucket");
        let t0 = Instant::now();

        assert!(!bucket.allow_at(t0, 120.0), "cost above capacity is rejected");
        let before = bucket.remaining();
        assert!(!bucket.allow_at(t0, 120.0));
        assert_eq!(bucket.remaining(), before);

        // The full original budget is still available.
        for _ in 0..60 {
            assert!(bucket.allow_at(t0, 1.0));
        }
    }

    #[test]
    fn refill_never_exceeds_capacity() {
        let mut bucket = TokenBucket::per_minute(60).expect("bucket");
        let t0 = Instant::now();

        assert!(bucket.allow_at(t0, 10.0));
        // A long idle period tops the bucket up to capacity, no further.
        assert!(bucket.allow_at(t0 + Duration::from_secs(3600), 60.0));
        assert!(!bucket.allow_at(t0 + Duration::from_secs(3600), 1.0));
    }

    #[test]
    fn burst_overrides_capacity() {
        let mut bucket = TokenBucket::with_burst(60, 5).expect("bucket");
        let t0 = Instant::now();

        for _ in 0..5 {
            assert!(bucket.allow_at(t0, 1.0));
        }
        assert!(!bucket.allow_at(t0, 1.0));
    }

    #[tokio::test]
    async fn sessions_own_independent_buckets() {
        let sessions = SessionBuckets::new(2, None).expect("sessions");

        assert!(sessions.allow("alice", 1.0).await);
        assert!(sessions.allow("alice", 1.0).await);
        assert!(!sessions.allow("alice", 1.0).await, "alice exhausted her budget");

        assert!(sessions.allow("bob", 1.0).await, "bob's bucket is untouched");
        assert_eq!(sessions.tracked_sessions().await, 2);
    }

    #[tokio::test]
    async fn invalid_session_budget_is_rejected_at_construction() {
        assert!(matches!(
            SessionBuckets::new(0, None),
            Err(PipelineError::InvalidConfiguration(_))
        ));
    }
}
