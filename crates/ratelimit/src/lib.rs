//! # Book Gateway Rate Limiter
//!
//! The atomic per-client rate limiter:
//! `check_and_increment(client_id) -> {allowed, remaining, reset_at, retry_after}`,
//! fixed 60s window, 10 requests per window, lazy reset on first request
//! after `reset_at`.
//!
//! A generic key/value store with a separate read then write is
//! insufficient here — the whole check-and-increment must be one atomic
//! step per `client_id`. This is implemented the same way the cache
//! crate's single-flight coalescing is: a `DashMap<String, Mutex<Window>>`
//! giving each client identity its own lock, so the read-modify-write is a
//! single critical section rather than two racing operations against
//! shared state.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::warn;

const WINDOW: Duration = Duration::from_secs(60);
const LIMIT: u32 = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
    pub retry_after: Option<Duration>,
}

struct Window {
    count: u32,
    window_start: Instant,
    window_start_utc: DateTime<Utc>,
}

impl Window {
    fn new(now: Instant) -> Self {
        Self {
            count: 0,
            window_start: now,
            window_start_utc: Utc::now(),
        }
    }
}

/// The atomic per-client limiter. One instance is shared process-wide.
pub struct RateLimiter {
    windows: DashMap<String, Arc<Mutex<Window>>>,
    window: Duration,
    limit: u32,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_limits(WINDOW, LIMIT)
    }

    pub fn with_limits(window: Duration, limit: u32) -> Self {
        Self {
            windows: DashMap::new(),
            window,
            limit,
        }
    }

    pub fn check_and_increment(&self, client_id: &str) -> RateLimitDecision {
        let slot = self
            .windows
            .entry(client_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Window::new(Instant::now()))))
            .clone();

        // Everything that follows runs while holding this client's lock:
        // the lazy reset check, the limit comparison, and the increment
        // are one atomic step.
        let mut window = slot.lock().expect("window mutex is never poisoned");
        let now = Instant::now();
        if now.duration_since(window.window_start) >= self.window {
            window.count = 0;
            window.window_start = now;
            window.window_start_utc = Utc::now();
        }

        let reset_at = window.window_start_utc + chrono::Duration::from_std(self.window).unwrap_or_default();

        if window.count < self.limit {
            window.count += 1;
            RateLimitDecision {
                allowed: true,
                remaining: self.limit - window.count,
                reset_at,
                retry_after: None,
            }
        } else {
            let elapsed = now.duration_since(window.window_start);
            let retry_after = self.window.saturating_sub(elapsed);
            RateLimitDecision {
                allowed: false,
                remaining: 0,
                reset_at,
                retry_after: Some(retry_after),
            }
        }
    }
}

/// The fail-open wrapper used for multi-instance deployments where the
/// limiter substrate (e.g. a shared Redis-backed store) can itself become
/// unreachable: if the substrate is unreachable, fail open (allow) and emit
/// a warning, preferring availability over correctness at this layer.
pub trait Fallible {
    fn try_check(&self, client_id: &str) -> Result<RateLimitDecision, String>;
}

pub struct DistributedRateLimiter<L> {
    inner: L,
    limit: u32,
    window: Duration,
}

impl<L: Fallible> DistributedRateLimiter<L> {
    pub fn new(inner: L, window: Duration, limit: u32) -> Self {
        Self { inner, limit, window }
    }

    pub fn check_and_increment(&self, client_id: &str) -> RateLimitDecision {
        match self.inner.try_check(client_id) {
            Ok(decision) => decision,
            Err(reason) => {
                warn!(client_id, reason, "rate limiter substrate unreachable, failing open");
                RateLimitDecision {
                    allowed: true,
                    remaining: self.limit,
                    reset_at: Utc::now() + chrono::Duration::from_std(self.window).unwrap_or_default(),
                    retry_after: None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenth_request_allowed_eleventh_denied() {
        let limiter = RateLimiter::new();
        for i in 1..=10 {
            let decision = limiter.check_and_increment("client-a");
            assert!(decision.allowed, "request {i} should be allowed");
        }
        let eleventh = limiter.check_and_increment("client-a");
        assert!(!eleventh.allowed);
        assert!(eleventh.retry_after.unwrap() <= WINDOW);
    }

    #[test]
    fn remaining_counts_down_from_limit() {
        let limiter = RateLimiter::new();
        let first = limiter.check_and_increment("client-a");
        assert_eq!(first.remaining, 9);
        let second = limiter.check_and_increment("client-a");
        assert_eq!(second.remaining, 8);
    }

    #[test]
    fn distinct_clients_have_independent_counters() {
        let limiter = RateLimiter::new();
        for _ in 0..10 {
            assert!(limiter.check_and_increment("client-a").allowed);
        }
        assert!(limiter.check_and_increment("client-b").allowed);
    }

    #[test]
    fn window_resets_lazily_after_elapsed() {
        let limiter = RateLimiter::with_limits(Duration::from_millis(20), 1);
        assert!(limiter.check_and_increment("client-a").allowed);
        assert!(!limiter.check_and_increment("client-a").allowed);
        std::thread::sleep(Duration::from_millis(25));
        assert!(limiter.check_and_increment("client-a").allowed);
    }

    struct AlwaysFails;
    impl Fallible for AlwaysFails {
        fn try_check(&self, _client_id: &str) -> Result<RateLimitDecision, String> {
            Err("connection refused".to_string())
        }
    }

    #[test]
    fn distributed_limiter_fails_open() {
        let limiter = DistributedRateLimiter::new(AlwaysFails, WINDOW, LIMIT);
        let decision = limiter.check_and_increment("client-a");
        assert!(decision.allowed);
    }
}
