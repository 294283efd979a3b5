//! Sliding-window admission control for outbound publishing calls
//!
//! One instance is shared by every pipeline in the process. Grants are not
//! FIFO: any waiter whose sleep ends first may take a freed slot.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};
use tracing::debug;

#[derive(Debug)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    grants: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// At most `max_requests` grants in any trailing `window`
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window,
            grants: Mutex::new(VecDeque::with_capacity(max_requests.max(1))),
        }
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Wait until one more request fits in the window, then record it
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut grants = self.grants.lock().await;
                let now = Instant::now();
                Self::evict_expired(&mut grants, now, self.window);

                if grants.len() < self.max_requests {
                    grants.push_back(now);
                    return;
                }

                match grants.front() {
                    Some(oldest) => self.window.saturating_sub(now.duration_since(*oldest)),
                    None => Duration::ZERO,
                }
            };

            debug!(
                "Rate limit reached ({} per {:?}), waiting {:?}",
                self.max_requests, self.window, wait
            );
            // The lock is released while sleeping; the check reruns on wake
            sleep(wait).await;
        }
    }

    /// Number of grants still inside the trailing window
    pub async fn in_window(&self) -> usize {
        let mut grants = self.grants.lock().await;
        Self::evict_expired(&mut grants, Instant::now(), self.window);
        grants.len()
    }

    /// Forget all recorded grants
    pub async fn reset(&self) {
        self.grants.lock().await.clear();
    }

    fn evict_expired(grants: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while let Some(oldest) = grants.front() {
            if now.duration_since(*oldest) >= window {
                grants.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_eleventh_call_waits_for_the_window() {
        let limiter = RateLimiter::new(10, Duration::from_secs(60));
        let start = Instant::now();

        for _ in 0..10 {
            limiter.acquire().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);

        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_any_window_holds_at_most_max_grants() {
        let limiter = Arc::new(RateLimiter::new(10, Duration::from_secs(60)));
        let start = Instant::now();
        let mut grants = Vec::new();

        for i in 0..25u64 {
            // uneven arrivals, including bursts
            if i % 7 == 3 {
                sleep(Duration::from_secs(13)).await;
            }
            limiter.acquire().await;
            grants.push(start.elapsed());
        }

        for i in 10..grants.len() {
            assert!(
                grants[i] - grants[i - 10] >= Duration::from_secs(60),
                "grant {i} at {:?} too close to grant {} at {:?}",
                grants[i],
                i - 10,
                grants[i - 10]
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_window() {
        let limiter = Arc::new(RateLimiter::new(2, Duration::from_secs(10)));
        let start = Instant::now();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move {
                    limiter.acquire().await;
                    start.elapsed()
                })
            })
            .collect();

        let mut elapsed = Vec::new();
        for handle in handles {
            elapsed.push(handle.await.unwrap());
        }
        elapsed.sort();

        assert_eq!(elapsed[0], Duration::ZERO);
        assert_eq!(elapsed[1], Duration::ZERO);
        assert!(elapsed[2] >= Duration::from_secs(10));
        assert!(elapsed[3] >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_clears_the_window() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        limiter.acquire().await;
        assert_eq!(limiter.in_window().await, 1);

        limiter.reset().await;
        assert_eq!(limiter.in_window().await, 0);

        let start = Instant::now();
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_zero_max_requests_still_admits_one_call() {
        let limiter = RateLimiter::new(0, Duration::from_secs(60));
        assert_eq!(limiter.max_requests(), 1);
        assert_eq!(limiter.window(), Duration::from_secs(60));
    }
}
