//! Fixed-window per-user request counter.

use std::time::Duration;
use std::time::Instant;

use dashmap::DashMap;

use crate::config::RateLimitConfig;

struct Window {
    started: Instant,
    count: u32,
}

/// Counts requests per user id inside a fixed time window. The counter
/// resets when the window elapses; no sliding behavior.
pub struct RateLimiter {
    window: Duration,
    max_requests: u32,
    counters: DashMap<String, Window>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            window: Duration::from_secs(config.window_secs),
            max_requests: config.max_requests,
            counters: DashMap::new(),
        }
    }

    #[cfg(test)]
    fn with_window(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            counters: DashMap::new(),
        }
    }

    /// Record one request for `user_id`. Returns false when the user is
    /// over the limit for the current window.
    pub fn check(&self, user_id: &str) -> bool {
        let now = Instant::now();
        let mut entry = self
            .counters
            .entry(user_id.to_string())
            .or_insert_with(|| Window {
                started: now,
                count: 0,
            });

        if now.duration_since(entry.started) >= self.window {
            entry.started = now;
            entry.count = 0;
        }

        if entry.count >= self.max_requests {
            return false;
        }
        entry.count += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_up_to_limit() {
        let limiter = RateLimiter::with_window(Duration::from_secs(60), 3);
        assert!(limiter.check("alice"));
        assert!(limiter.check("alice"));
        assert!(limiter.check("alice"));
        assert!(!limiter.check("alice"));
    }

    #[test]
    fn test_users_counted_independently() {
        let limiter = RateLimiter::with_window(Duration::from_secs(60), 1);
        assert!(limiter.check("alice"));
        assert!(!limiter.check("alice"));
        assert!(limiter.check("bob"));
    }

    #[test]
    fn test_window_expiry_resets_count() {
        let limiter = RateLimiter::with_window(Duration::from_millis(20), 1);
        assert!(limiter.check("alice"));
        assert!(!limiter.check("alice"));
        std::thread::sleep(Duration::from_millis(30));
        assert!(limiter.check("alice"));
    }
}
