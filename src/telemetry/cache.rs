use futures::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::CacheError;

type BuildFn<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, CacheError>> + Send + Sync>;
type InFlight<T> = Shared<BoxFuture<'static, Result<T, CacheError>>>;

struct CacheEntry<T> {
    data: Option<T>,
    expires_at: Option<Instant>,
    in_flight: Option<InFlight<T>>,
}

impl<T: Clone> CacheEntry<T> {
    fn fresh(&self, now: Instant) -> Option<T> {
        match (&self.data, self.expires_at) {
            (Some(data), Some(expires_at)) if now < expires_at => Some(data.clone()),
            _ => None,
        }
    }
}

/// TTL cache for one resource that coalesces concurrent misses onto a single build.
///
/// The build runs in its own task: callers that stop waiting (a closed connection, say) never
/// cancel it, and its result still lands in the cache for everyone else.
pub struct SingleFlightCache<T> {
    name: &'static str,
    ttl: Duration,
    build: BuildFn<T>,
    entry: Arc<Mutex<CacheEntry<T>>>,
}

impl<T> SingleFlightCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new<F, Fut>(name: &'static str, ttl: Duration, build: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, CacheError>> + Send + 'static,
    {
        Self {
            name,
            ttl,
            build: Arc::new(move || build().boxed()),
            entry: Arc::new(Mutex::new(CacheEntry {
                data: None,
                expires_at: None,
                in_flight: None,
            })),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the cached value if still fresh, otherwise joins (or starts) the single build.
    pub async fn get(&self) -> Result<T, CacheError> {
        let in_flight = {
            // Hold the guard across check-and-set so two misses cannot both start a build.
            let mut entry = self.entry.lock().await;
            if let Some(data) = entry.fresh(Instant::now()) {
                return Ok(data);
            }
            match &entry.in_flight {
                Some(in_flight) => {
                    tracing::trace!("Joining in-flight {} build", self.name);
                    in_flight.clone()
                }
                None => {
                    let in_flight = self.start_build();
                    entry.in_flight = Some(in_flight.clone());
                    in_flight
                }
            }
        };

        in_flight.await
    }

    /// Must be called with the entry lock held; the spawned task blocks on the same lock
    /// before publishing, so it cannot clear a marker that has not been set yet.
    fn start_build(&self) -> InFlight<T> {
        tracing::debug!("Building {}", self.name);

        let name = self.name;
        let ttl = self.ttl;
        let entry = Arc::clone(&self.entry);
        let build = (self.build)();

        let task = tokio::spawn(async move {
            let result = match AssertUnwindSafe(build).catch_unwind().await {
                Ok(result) => result,
                Err(_) => Err(CacheError::Aborted(name.to_string())),
            };

            let mut entry = entry.lock().await;
            entry.in_flight = None;
            match &result {
                Ok(data) => {
                    entry.data = Some(data.clone());
                    entry.expires_at = Some(Instant::now() + ttl);
                }
                Err(err) => {
                    tracing::warn!("Build of {} failed: {}", name, err);
                    entry.data = None;
                    entry.expires_at = None;
                }
            }
            result
        });

        async move {
            match task.await {
                Ok(result) => result,
                Err(_) => Err(CacheError::Aborted(name.to_string())),
            }
        }
        .boxed()
        .shared()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_cache(
        ttl: Duration,
        delay: Duration,
    ) -> (SingleFlightCache<usize>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let cache = SingleFlightCache::new("counter", ttl, move || {
            let counter = Arc::clone(&counter);
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                tokio::time::sleep(delay).await;
                Ok(n)
            }
        });
        (cache, calls)
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_gets_share_one_build() {
        let (cache, calls) = counting_cache(Duration::from_secs(2), Duration::from_millis(300));
        let cache = Arc::new(cache);

        let mut handles = Vec::new();
        for _ in 0..10 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move { cache.get().await }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok(1));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_respected() {
        let ttl = Duration::from_millis(2_000);
        let (cache, calls) = counting_cache(ttl, Duration::ZERO);

        assert_eq!(cache.get().await, Ok(1));
        tokio::time::advance(Duration::from_millis(1_999)).await;
        assert_eq!(cache.get().await, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_millis(2)).await;
        assert_eq!(cache.get().await, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_reaches_every_waiter_and_clears_entry() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let cache = Arc::new(SingleFlightCache::new("flaky", Duration::from_secs(60), move || {
            let counter = Arc::clone(&counter);
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                tokio::time::sleep(Duration::from_millis(100)).await;
                if n == 2 {
                    Err(CacheError::Build("camera offline".to_string()))
                } else {
                    Ok(n)
                }
            }
        }));

        assert_eq!(cache.get().await, Ok(1));
        tokio::time::advance(Duration::from_secs(61)).await;

        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.get().await })
            })
            .collect();
        for waiter in waiters {
            assert_eq!(
                waiter.await.unwrap(),
                Err(CacheError::Build("camera offline".to_string()))
            );
        }

        // The stale value from the first build is not served; a new build is triggered.
        assert_eq!(cache.get().await, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_rejected_build_retried_immediately() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let cache = SingleFlightCache::new("always-failing", Duration::from_secs(60), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err::<u8, _>(CacheError::Build("nope".to_string())) }
        });

        tokio_test::assert_err!(cache.get().await);
        tokio_test::assert_err!(cache.get().await);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_panicking_build_reports_aborted() {
        let cache: SingleFlightCache<u8> =
            SingleFlightCache::new("panicky", Duration::from_secs(1), || async {
                let parsed: Option<u8> = None;
                Ok(parsed.expect("parser blew up"))
            });

        assert_eq!(
            cache.get().await,
            Err(CacheError::Aborted("panicky".to_string()))
        );
        // The in-flight marker was cleared, so the next call builds again.
        assert_eq!(
            cache.get().await,
            Err(CacheError::Aborted("panicky".to_string()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_caller_does_not_cancel_build() {
        let (cache, calls) = counting_cache(Duration::from_secs(10), Duration::from_millis(500));
        let cache = Arc::new(cache);

        let abandoned = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get().await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        abandoned.abort();

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(cache.get().await, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
