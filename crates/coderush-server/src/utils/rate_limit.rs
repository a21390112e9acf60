//! Per-session fixed-window rate limiting for the Q&A path. Registration
//! turns are never throttled; only free-text questions count against the
//! window.

use std::time::{Duration, Instant};

use dashmap::DashMap;

struct Window {
    count: u32,
    window_start: Instant,
}

pub struct RateLimiter {
    windows: DashMap<String, Window>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            windows: DashMap::new(),
            max_requests,
            window,
        }
    }

    /// Records one request for `key` and reports whether it is allowed.
    /// The window resets lazily on the first request after it expires.
    pub fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut entry = self.windows.entry(key.to_string()).or_insert(Window {
            count: 0,
            window_start: now,
        });

        if now.duration_since(entry.window_start) >= self.window {
            entry.count = 0;
            entry.window_start = now;
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
    fn allows_up_to_the_limit_then_blocks() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        assert!(limiter.check("s1"));
        assert!(limiter.check("s1"));
        assert!(limiter.check("s1"));
        assert!(!limiter.check("s1"));
        assert!(!limiter.check("s1"));
    }

    #[test]
    fn sessions_are_isolated() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.check("s1"));
        assert!(!limiter.check("s1"));
        assert!(limiter.check("s2"));
    }

    #[test]
    fn window_resets_after_expiry() {
        let limiter = RateLimiter::new(1, Duration::from_millis(10));
        assert!(limiter.check("s1"));
        assert!(!limiter.check("s1"));
        std::thread::sleep(Duration::from_millis(20));
        assert!(limiter.check("s1"));
    }
}
