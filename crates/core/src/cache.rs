use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::time::Instant;

use crate::domain::PolicyVariant;
use crate::errors::PipelineError;

/// Cache key for a (variant, query) pair. The query is whitespace-trimmed but
/// otherwise untouched: case and punctuation are significant, so near
/// duplicates do not collide.
pub fn cache_key(variant: PolicyVariant, query: &str) -> String {
    format!("{}|{}", variant.as_str(), query.trim())
}

type FlightResult<V> = Option<Result<V, PipelineError>>;

enum Flight<V> {
    Lead(watch::Sender<FlightResult<V>>),
    Wait(watch::Receiver<FlightResult<V>>),
}

/// Memoizes pipeline results with a freshness window and a bounded size.
///
/// Concurrency contract: at most one computation runs per key. The first
/// caller for a missing key becomes the leader; concurrent callers for the
/// same key wait and receive the leader's result, success or failure, without
/// running their own computation.
///
/// Eviction is insertion-order (oldest inserted goes first), not LRU. Expired
/// entries are purged lazily on access.
pub struct ResponseCache<V> {
    ttl: Duration,
    maxsize: usize,
    inner: Mutex<Inner<V>>,
}

struct Inner<V> {
    entries: HashMap<String, Entry<V>>,
    order: VecDeque<String>,
    in_flight: HashMap<String, watch::Receiver<FlightResult<V>>>,
}

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> ResponseCache<V> {
    pub fn new(ttl_seconds: u64, maxsize: usize) -> Result<Self, PipelineError> {
        if ttl_seconds == 0 {
            return Err(PipelineError::InvalidConfiguration(
                "cache.ttl_seconds must be > 0".to_owned(),
            ));
        }
        if maxsize == 0 {
            return Err(PipelineError::InvalidConfiguration("cache.maxsize must be > 0".to_owned()));
        }
        Ok(Self {
            ttl: Duration::from_secs(ttl_seconds),
            maxsize,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: VecDeque::new(),
                in_flight: HashMap::new(),
            }),
        })
    }

    /// Drops all entries immediately. Administrative reset, never the hot
    /// path; in-flight computations are left to finish.
    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        inner.entries.clear();
        inner.order.clear();
    }

    /// Number of live (non-expired) entries.
    pub async fn len(&self) -> usize {
        let mut inner = self.inner.lock().await;
        inner.purge_expired(Instant::now());
        inner.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl<V: Clone> ResponseCache<V> {
    /// Live value for `key`, if present and unexpired.
    pub async fn get(&self, key: &str) -> Option<V> {
        let mut inner = self.inner.lock().await;
        inner.purge_expired(Instant::now());
        inner.entries.get(key).map(|entry| entry.value.clone())
    }

    /// Returns the cached value for `key`, or runs `compute` to produce one.
    ///
    /// `compute` is `Fn` rather than `FnOnce` because a waiter can be forced
    /// to take over leadership when a cancelled leader vanished without
    /// publishing; in every uncontended path it is invoked at most once.
    pub async fn get_or_compute<F, Fut>(&self, key: &str, compute: F) -> Result<V, PipelineError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<V, PipelineError>>,
    {
        loop {
            let flight = {
                let mut inner = self.inner.lock().await;
                inner.purge_expired(Instant::now());
                if let Some(entry) = inner.entries.get(key) {
                    return Ok(entry.value.clone());
                }
                // A closed channel means the previous leader was dropped
                // before publishing; replace it instead of waiting forever.
                let live = match inner.in_flight.get(key) {
                    Some(receiver) if receiver.has_changed().is_ok() => Some(receiver.clone()),
                    _ => None,
                };
                match live {
                    Some(receiver) => Flight::Wait(receiver),
                    None => {
                        let (sender, receiver) = watch::channel(None);
                        inner.in_flight.insert(key.to_owned(), receiver);
                        Flight::Lead(sender)
                    }
                }
            };

            match flight {
                Flight::Wait(mut receiver) => loop {
                    if let Some(result) = receiver.borrow_and_update().clone() {
                        return result;
                    }
                    if receiver.changed().await.is_err() {
                        break;
                    }
                },
                Flight::Lead(sender) => {
                    let result = compute().await;
                    {
                        let mut inner = self.inner.lock().await;
                        inner.in_flight.remove(key);
                        if let Ok(value) = &result {
                            inner.insert(
                                key.to_owned(),
                                value.clone(),
                                Instant::now() + self.ttl,
                                self.maxsize,
                            );
                        }
                    }
                    let _ = sender.send(Some(result.clone()));
                    return result;
                }
            }
        }
    }
}

impl<V> Inner<V> {
    fn purge_expired(&mut self, now: Instant) {
        self.entries.retain(|_, entry| entry.expires_at > now);
        let entries = &self.entries;
        self.order.retain(|key| entries.contains_key(key));
    }

    fn insert(&mut self, key: String, value: V, expires_at: Instant, maxsize: usize) {
        if let Some(entry) = self.entries.get_mut(&key) {
            // Refresh in place; the key keeps its original insertion slot.
            entry.value = value;
            entry.expires_at = expires_at;
            return;
        }
        while self.entries.len() >= maxsize {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, Entry { value, expires_at });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::{cache_key, ResponseCache};
    use crate::domain::PolicyVariant;
    use crate::errors::PipelineError;

    type BoxedCompute = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<String, PipelineError>> + Send>,
    >;

    fn counting_compute(
        calls: &Arc<AtomicUsize>,
        value: &str,
    ) -> impl Clone + Fn() -> BoxedCompute {
        let calls = Arc::clone(calls);
        let value = value.to_owned();
        move || {
            let calls = Arc::clone(&calls);
            let value = value.clone();
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(value)
            })
        }
    }

    #[test]
    fn zero_ttl_and_zero_maxsize_are_rejected() {
        assert!(matches!(
            ResponseCache::<String>::new(0, 8),
            Err(PipelineError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            ResponseCache::<String>::new(300, 0),
            Err(PipelineError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn key_trims_whitespace_but_preserves_case_and_punctuation() {
        assert_eq!(
            cache_key(PolicyVariant::A, "  Where is my invoice?  "),
            cache_key(PolicyVariant::A, "Where is my invoice?")
        );
        assert_ne!(
            cache_key(PolicyVariant::A, "Where is my invoice?"),
            cache_key(PolicyVariant::A, "where is my invoice")
        );
        assert_ne!(
            cache_key(PolicyVariant::A, "Where is my invoice?"),
            cache_key(PolicyVariant::B, "Where is my invoice?")
        );
    }

    #[tokio::test]
    async fn hit_within_ttl_skips_recomputation() {
        let cache = ResponseCache::new(300, 16).expect("cache");
        let calls = Arc::new(AtomicUsize::new(0));

        let first = cache.get_or_compute("k", counting_compute(&calls, "answer")).await;
        let second = cache.get_or_compute("k", counting_compute(&calls, "other")).await;

        assert_eq!(first.expect("first"), "answer");
        assert_eq!(second.expect("second"), "answer");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn entry_expires_after_ttl_and_triggers_recomputation() {
        let cache = ResponseCache::new(5, 16).expect("cache");
        let calls = Arc::new(AtomicUsize::new(0));

        cache.get_or_compute("k", counting_compute(&calls, "v1")).await.expect("prime");
        tokio::time::advance(Duration::from_secs(6)).await;

        assert!(cache.get("k").await.is_none(), "entry must be unreadable past its ttl");
        let recomputed = cache.get_or_compute("k", counting_compute(&calls, "v2")).await;
        assert_eq!(recomputed.expect("recomputed"), "v2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn eviction_is_insertion_order_not_access_order() {
        let cache = ResponseCache::new(300, 2).expect("cache");
        let calls = Arc::new(AtomicUsize::new(0));

        cache.get_or_compute("a", counting_compute(&calls, "va")).await.expect("a");
        cache.get_or_compute("b", counting_compute(&calls, "vb")).await.expect("b");

        // Touch "a" before inserting "c": under LRU that would protect it,
        // under insertion-order it must still be the one evicted.
        assert_eq!(cache.get("a").await.as_deref(), Some("va"));
        cache.get_or_compute("c", counting_compute(&calls, "vc")).await.expect("c");

        assert!(cache.get("a").await.is_none());
        assert_eq!(cache.get("b").await.as_deref(), Some("vb"));
        assert_eq!(cache.get("c").await.as_deref(), Some("vc"));
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_for_one_key_share_a_single_computation() {
        let cache = Arc::new(ResponseCache::new(300, 16).expect("cache"));
        let calls = Arc::new(AtomicUsize::new(0));

        let slow_compute = {
            let calls = Arc::clone(&calls);
            move || {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok("shared".to_owned())
                }
            }
        };

        let first = tokio::spawn({
            let cache = Arc::clone(&cache);
            let compute = slow_compute.clone();
            async move { cache.get_or_compute("k", compute).await }
        });
        let second = tokio::spawn({
            let cache = Arc::clone(&cache);
            let compute = slow_compute.clone();
            async move { cache.get_or_compute("k", compute).await }
        });

        let first = first.await.expect("join").expect("first result");
        let second = second.await.expect("join").expect("second result");

        assert_eq!(first, "shared");
        assert_eq!(second, "shared");
        assert_eq!(calls.load(Ordering::SeqCst), 1, "exactly one computation per key");
    }

    #[tokio::test(start_paused = true)]
    async fn waiters_receive_the_leaders_failure_without_recomputing() {
        let cache = Arc::new(ResponseCache::<String>::new(300, 16).expect("cache"));
        let calls = Arc::new(AtomicUsize::new(0));

        let failing_compute = {
            let calls = Arc::clone(&calls);
            move || {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Err(PipelineError::Generation("upstream unavailable".to_owned()))
                }
            }
        };

        let first = tokio::spawn({
            let cache = Arc::clone(&cache);
            let compute = failing_compute.clone();
            async move { cache.get_or_compute("k", compute).await }
        });
        let second = tokio::spawn({
            let cache = Arc::clone(&cache);
            let compute = failing_compute.clone();
            async move { cache.get_or_compute("k", compute).await }
        });

        let first = first.await.expect("join").expect_err("leader fails");
        let second = second.await.expect("join").expect_err("waiter sees the same failure");

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Failures are not cached: the next caller computes again.
        let retry = cache.get_or_compute("k", failing_compute.clone()).await;
        assert!(retry.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn clear_drops_everything() {
        let cache = ResponseCache::new(300, 16).expect("cache");
        let calls = Arc::new(AtomicUsize::new(0));

        cache.get_or_compute("a", counting_compute(&calls, "va")).await.expect("a");
        cache.get_or_compute("b", counting_compute(&calls, "vb")).await.expect("b");
        assert_eq!(cache.len().await, 2);

        cache.clear().await;
        assert!(cache.is_empty().await);
        assert!(cache.get("a").await.is_none());
    }
}
