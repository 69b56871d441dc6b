//! API call rate limiting using token bucket algorithm
//!
//! The RateLimiter provides a global calls-per-minute budget shared across
//! all concurrently running collection tasks, using an efficient lock-free
//! token bucket implementation.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Global API call limiter shared across all collection tasks
///
/// Uses a token bucket algorithm for efficient, lock-free call budgeting.
/// All concurrent tasks share the same bucket, naturally distributing the
/// call budget based on demand. The limiter sits above the API client: the
/// collection service acquires a token before every external call.
///
/// # Algorithm
///
/// - Tokens represent API calls that may be made
/// - Tokens refill at a constant rate (limit / 60 per second)
/// - A task acquires one token before each call
/// - If no token is available, the task waits until refill
///
/// # Implementation
///
/// Uses AtomicU64 for lock-free token tracking:
/// - `limit_per_min`: Call limit per minute (0 = unlimited)
/// - `tokens`: Available tokens (calls that can be made now)
/// - `last_refill`: Timestamp of last token refill (nanoseconds since an arbitrary epoch)
#[derive(Clone)]
pub struct RateLimiter {
    /// Call limit per minute (0 = unlimited)
    limit_per_min: Arc<AtomicU64>,
    /// Available tokens (current bucket capacity in calls)
    tokens: Arc<AtomicU64>,
    /// Last refill timestamp (nanoseconds since arbitrary epoch)
    last_refill: Arc<AtomicU64>,
}

impl RateLimiter {
    /// Create a new RateLimiter with the specified calls-per-minute limit
    ///
    /// # Examples
    ///
    /// ```
    /// use vk_harvest::rate_limiter::RateLimiter;
    ///
    /// // 180 calls per minute
    /// let limiter = RateLimiter::new(Some(180));
    ///
    /// // Unlimited
    /// let unlimited = RateLimiter::new(None);
    /// ```
    #[must_use]
    pub fn new(limit_per_min: Option<u32>) -> Self {
        let limit = u64::from(limit_per_min.unwrap_or(0));
        let now = Self::now_nanos();

        Self {
            limit_per_min: Arc::new(AtomicU64::new(limit)),
            tokens: Arc::new(AtomicU64::new(limit)),
            last_refill: Arc::new(AtomicU64::new(now)),
        }
    }

    /// Set a new calls-per-minute limit
    ///
    /// This takes effect immediately. If increasing the limit, tokens are
    /// refilled to the new capacity. If decreasing, excess tokens remain
    /// until consumed.
    pub fn set_limit(&self, limit_per_min: Option<u32>) {
        let new_limit = u64::from(limit_per_min.unwrap_or(0));
        let old_limit = self.limit_per_min.swap(new_limit, Ordering::SeqCst);

        // If increasing limit, add extra tokens to bucket
        if new_limit > old_limit {
            let extra_tokens = new_limit - old_limit;
            self.tokens.fetch_add(extra_tokens, Ordering::SeqCst);
        }
    }

    /// Get the current calls-per-minute limit
    ///
    /// Returns None if unlimited.
    pub fn get_limit(&self) -> Option<u32> {
        let limit = self.limit_per_min.load(Ordering::Relaxed);
        if limit == 0 { None } else { Some(limit as u32) }
    }

    /// Acquire permission to make one API call
    ///
    /// This method suspends until a token is available. For an unlimited
    /// limiter (limit = 0), this returns immediately.
    pub async fn acquire(&self) {
        // Fast path: unlimited
        if self.limit_per_min.load(Ordering::Relaxed) == 0 {
            return;
        }

        loop {
            // Re-read the limit each iteration so dynamic changes take effect
            let limit = self.limit_per_min.load(Ordering::Relaxed);
            if limit == 0 {
                // Limit was removed while we were waiting — no throttle needed
                return;
            }

            // Refill tokens based on elapsed time
            self.refill_tokens();

            let current_tokens = self.tokens.load(Ordering::SeqCst);
            if current_tokens > 0 {
                if self
                    .tokens
                    .compare_exchange(
                        current_tokens,
                        current_tokens - 1,
                        Ordering::SeqCst,
                        Ordering::SeqCst,
                    )
                    .is_ok()
                {
                    return;
                }
                // CAS lost to another task — retry immediately
                continue;
            }

            // No tokens available — wait roughly one token's worth of refill
            // time, capped so dynamic limit changes take effect promptly.
            let wait_ms = (60_000.0 / limit as f64) as u64;
            tokio::time::sleep(Duration::from_millis(wait_ms.clamp(10, 1_000))).await;
        }
    }

    /// Refill tokens based on elapsed time since last refill
    ///
    /// This is called automatically by acquire(), but can be called manually
    /// for testing or monitoring purposes.
    fn refill_tokens(&self) {
        let limit = self.limit_per_min.load(Ordering::Relaxed);
        if limit == 0 {
            return; // Unlimited
        }

        let now = Self::now_nanos();
        let last = self.last_refill.load(Ordering::SeqCst);

        // Calculate elapsed time in seconds
        let elapsed_nanos = now.saturating_sub(last);
        let elapsed_secs = elapsed_nanos as f64 / 1_000_000_000.0;

        // Tokens to add: calls per minute * minutes elapsed
        let tokens_to_add = (limit as f64 * elapsed_secs / 60.0) as u64;

        // Only advance last_refill once at least one whole token has accrued,
        // so fractional refill time keeps accumulating across calls
        if tokens_to_add > 0 {
            if self
                .last_refill
                .compare_exchange(last, now, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                // Add tokens, but cap at limit (one minute's worth of burst)
                let current_tokens = self.tokens.load(Ordering::SeqCst);
                let new_tokens = (current_tokens + tokens_to_add).min(limit);
                self.tokens.store(new_tokens, Ordering::SeqCst);
            }
        }
    }

    /// Get current monotonic time in nanoseconds
    ///
    /// Uses a monotonic clock that is not affected by system time changes.
    /// The epoch is arbitrary but consistent within a process lifetime.
    fn now_nanos() -> u64 {
        static START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
        let start = START.get_or_init(Instant::now);
        start.elapsed().as_nanos() as u64
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_with_limit_starts_with_full_bucket() {
        let limiter = RateLimiter::new(Some(120));
        assert_eq!(limiter.get_limit(), Some(120));
        assert_eq!(limiter.tokens.load(Ordering::Relaxed), 120);
    }

    #[test]
    fn new_none_is_unlimited() {
        let limiter = RateLimiter::new(None);
        assert_eq!(limiter.get_limit(), None);
        assert_eq!(limiter.limit_per_min.load(Ordering::Relaxed), 0);
        assert_eq!(limiter.tokens.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn set_limit_increase_adds_tokens() {
        let limiter = RateLimiter::new(Some(60));
        let old_tokens = limiter.tokens.load(Ordering::Relaxed);

        limiter.set_limit(Some(120));

        assert_eq!(limiter.get_limit(), Some(120));
        assert_eq!(limiter.tokens.load(Ordering::Relaxed), old_tokens + 60);
    }

    #[test]
    fn set_limit_decrease_keeps_existing_tokens() {
        let limiter = RateLimiter::new(Some(120));
        let old_tokens = limiter.tokens.load(Ordering::Relaxed);

        limiter.set_limit(Some(60));

        assert_eq!(limiter.get_limit(), Some(60));
        assert_eq!(limiter.tokens.load(Ordering::Relaxed), old_tokens);
    }

    #[test]
    fn transition_limited_unlimited_limited() {
        let limiter = RateLimiter::new(Some(60));
        limiter.set_limit(None);
        assert_eq!(limiter.get_limit(), None);

        limiter.set_limit(Some(90));
        assert_eq!(limiter.get_limit(), Some(90));
    }

    #[tokio::test]
    async fn acquire_unlimited_returns_immediately() {
        let limiter = RateLimiter::new(None);

        let start = Instant::now();
        for _ in 0..1_000 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn acquire_consumes_one_token_per_call() {
        let limiter = RateLimiter::new(Some(600));

        for _ in 0..10 {
            limiter.acquire().await;
        }

        let remaining = limiter.tokens.load(Ordering::Relaxed);
        assert!(
            (589..=591).contains(&remaining),
            "expected ~590 tokens remaining, got {remaining}"
        );
    }

    #[tokio::test]
    async fn acquire_blocks_when_tokens_exhausted() {
        // 600 calls/min = 10 calls/sec; one token takes ~100ms to accrue
        let limiter = RateLimiter::new(Some(600));
        limiter.tokens.store(0, Ordering::SeqCst);
        limiter
            .last_refill
            .store(RateLimiter::now_nanos(), Ordering::SeqCst);

        let start = Instant::now();
        limiter.acquire().await;
        let elapsed = start.elapsed();

        // Expected ~100ms; generous bounds for CI scheduling
        assert!(
            elapsed >= Duration::from_millis(50),
            "acquire should have waited for a token, but only took {:?}",
            elapsed
        );
        assert!(
            elapsed <= Duration::from_millis(600),
            "acquire took too long: {:?}",
            elapsed
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn set_limit_to_unlimited_unblocks_waiting_acquire() {
        // 1 call/min — a drained bucket would block for ~60 seconds
        let limiter = RateLimiter::new(Some(1));
        limiter.tokens.store(0, Ordering::SeqCst);
        limiter
            .last_refill
            .store(RateLimiter::now_nanos(), Ordering::SeqCst);

        let limiter_for_task = limiter.clone();
        let acquire_handle = tokio::spawn(async move {
            limiter_for_task.acquire().await;
        });

        // Let the acquire loop start spinning
        tokio::time::sleep(Duration::from_millis(300)).await;

        // Switch to unlimited — the loop should see limit==0 and return
        limiter.set_limit(None);

        let result = tokio::time::timeout(Duration::from_secs(3), acquire_handle).await;
        assert!(
            result.is_ok(),
            "acquire should complete promptly after limit set to unlimited, but timed out"
        );
        result.unwrap().unwrap();
    }

    #[test]
    fn clone_shares_state() {
        let original = RateLimiter::new(Some(60));
        let clone = original.clone();

        clone.set_limit(Some(300));
        assert_eq!(original.get_limit(), Some(300));

        original.set_limit(None);
        assert_eq!(clone.get_limit(), None);
    }
}
