//! Per-caller fixed-window rate limiting.
//!
//! Implemented as an explicit check called inside each handler, ahead of
//! the quota-reserve call, so that `auth -> rate-limit -> quota` reads as
//! visible, sequential steps rather than implicit middleware ordering.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use cc_domain::{Error, RateLimitConfig};
use parking_lot::Mutex;

struct Windows {
    minute_start: Instant,
    minute_count: u32,
    hour_start: Instant,
    hour_count: u32,
}

pub struct RateLimiter {
    config: RateLimitConfig,
    windows: Mutex<HashMap<String, Windows>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self { config, windows: Mutex::new(HashMap::new()) }
    }

    /// `key` identifies the caller (user id, api key id, or source IP for
    /// anonymous requests). Returns `Error::RateLimited` once either window
    /// is exhausted.
    pub fn check(&self, key: &str) -> Result<(), Error> {
        let now = Instant::now();
        let mut windows = self.windows.lock();
        let entry = windows.entry(key.to_string()).or_insert_with(|| Windows {
            minute_start: now,
            minute_count: 0,
            hour_start: now,
            hour_count: 0,
        });

        if now.duration_since(entry.minute_start) >= Duration::from_secs(60) {
            entry.minute_start = now;
            entry.minute_count = 0;
        }
        if now.duration_since(entry.hour_start) >= Duration::from_secs(3600) {
            entry.hour_start = now;
            entry.hour_count = 0;
        }

        if entry.minute_count >= self.config.requests_per_minute {
            let retry_after_secs = 60 - now.duration_since(entry.minute_start).as_secs();
            return Err(Error::RateLimited { retry_after_secs: retry_after_secs.max(1) });
        }
        if entry.hour_count >= self.config.requests_per_hour {
            let retry_after_secs = 3600 - now.duration_since(entry.hour_start).as_secs();
            return Err(Error::RateLimited { retry_after_secs: retry_after_secs.max(1) });
        }

        entry.minute_count += 1;
        entry.hour_count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exceeding_the_per_minute_cap_rate_limits() {
        let limiter = RateLimiter::new(RateLimitConfig { requests_per_minute: 2, requests_per_hour: 1000 });
        limiter.check("caller-a").unwrap();
        limiter.check("caller-a").unwrap();
        let err = limiter.check("caller-a").unwrap_err();
        assert!(matches!(err, Error::RateLimited { .. }));
    }

    #[test]
    fn distinct_callers_have_independent_windows() {
        let limiter = RateLimiter::new(RateLimitConfig { requests_per_minute: 1, requests_per_hour: 1000 });
        limiter.check("caller-a").unwrap();
        limiter.check("caller-b").unwrap();
    }
}
