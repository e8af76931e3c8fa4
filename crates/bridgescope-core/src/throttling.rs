use std::num::NonZeroU32;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::Quota;
use tokio::sync::Mutex;

/// Lower bound on the spacing between two granted slots.
pub const MIN_INTERVAL_FLOOR: Duration = Duration::from_millis(100);

type DirectRateLimiter = governor::RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Process-wide outbound call pacer.
///
/// Slots are granted one at a time, in arrival order, at least
/// `min_interval` apart. Waiters queue without bound: a burst of N callers
/// will take roughly `N * min_interval` to drain.
pub struct RateLimiter {
    min_interval: Duration,
    limiter: DirectRateLimiter,
    // tokio's mutex is FIFO; holding it across `until_ready` orders grants by arrival.
    queue: Mutex<()>,
}

impl RateLimiter {
    /// `min_interval = max(100ms, 1000ms / requests_per_second)`.
    pub fn new(requests_per_second: u32) -> Self {
        Self::with_min_interval(min_interval_for(requests_per_second))
    }

    /// Uses `min_interval` as given, without the 100ms floor.
    pub fn with_min_interval(min_interval: Duration) -> Self {
        let period = min_interval.max(Duration::from_nanos(1));
        let quota =
            Quota::with_period(period).unwrap_or_else(|| Quota::per_second(NonZeroU32::MAX));
        Self {
            min_interval,
            limiter: governor::RateLimiter::direct(quota),
            queue: Mutex::new(()),
        }
    }

    /// Suspends until the next slot is available, then claims it.
    pub async fn acquire_slot(&self) {
        let _turn = self.queue.lock().await;
        self.limiter.until_ready().await;
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("min_interval", &self.min_interval)
            .finish_non_exhaustive()
    }
}

pub fn min_interval_for(requests_per_second: u32) -> Duration {
    let per_request = Duration::from_secs(1) / requests_per_second.max(1);
    per_request.max(MIN_INTERVAL_FLOOR)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Instant;

    use super::*;

    #[test]
    fn interval_is_floored_at_100ms() {
        assert_eq!(min_interval_for(50), Duration::from_millis(100));
        assert_eq!(min_interval_for(10), Duration::from_millis(100));
        assert_eq!(min_interval_for(4), Duration::from_millis(250));
        assert_eq!(min_interval_for(0), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn sequential_slots_are_spaced_by_min_interval() {
        let limiter = RateLimiter::with_min_interval(Duration::from_millis(20));
        let started = Instant::now();

        for _ in 0..5 {
            limiter.acquire_slot().await;
        }

        assert!(started.elapsed() >= Duration::from_millis(78));
    }

    #[tokio::test]
    async fn concurrent_acquirers_are_serialized() {
        let limiter = Arc::new(RateLimiter::with_min_interval(Duration::from_millis(15)));
        let started = Instant::now();

        let mut handles = Vec::new();
        for _ in 0..4 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move { limiter.acquire_slot().await }));
        }
        for handle in handles {
            handle.await.expect("task completes");
        }

        assert!(started.elapsed() >= Duration::from_millis(44));
    }

    #[tokio::test]
    async fn grants_follow_arrival_order() {
        let limiter = Arc::new(RateLimiter::with_min_interval(Duration::from_millis(20)));
        let granted = Arc::new(std::sync::Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for caller in 0..4u64 {
            let limiter = Arc::clone(&limiter);
            let granted = Arc::clone(&granted);
            handles.push(tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(caller * 3)).await;
                limiter.acquire_slot().await;
                granted.lock().expect("lock").push(caller);
            }));
        }
        for handle in handles {
            handle.await.expect("task completes");
        }

        assert_eq!(*granted.lock().expect("lock"), vec![0, 1, 2, 3]);
    }
}
