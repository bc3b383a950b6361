//! Sliding-window rate limiting for the trigger endpoint, keyed on client IP.
//!
//! The number of tracked addresses is capped; once the cap is reached, idle
//! entries are dropped and unknown addresses are rejected until room frees up.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::warn;

use crate::config::RateLimitConfig;
use super::error::ApiError;

pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    max_tracked_ips: usize,
    state: Mutex<HashMap<IpAddr, Vec<Instant>>>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            max_requests: config.max_requests as usize,
            window: Duration::from_secs(config.window_secs),
            max_tracked_ips: config.max_tracked_ips,
            state: Mutex::new(HashMap::new()),
        }
    }

    pub fn check(&self, ip: IpAddr) -> Result<(), ApiError> {
        self.check_at(ip, Instant::now())
    }

    fn check_at(&self, ip: IpAddr, now: Instant) -> Result<(), ApiError> {
        let cutoff = now.checked_sub(self.window).unwrap_or(now);
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if !state.contains_key(&ip) && state.len() >= self.max_tracked_ips {
            state.retain(|_, hits| {
                hits.retain(|&t| t > cutoff);
                !hits.is_empty()
            });

            if state.len() >= self.max_tracked_ips {
                warn!(ip = %ip, tracked = state.len(), "rejecting trigger: too many tracked clients");
                return Err(ApiError::RateLimited);
            }
        }

        let hits = state.entry(ip).or_default();
        hits.retain(|&t| t > cutoff);

        if hits.len() >= self.max_requests {
            warn!(ip = %ip, requests = hits.len(), "trigger rate limit exceeded");
            return Err(ApiError::RateLimited);
        }

        hits.push(now);
        Ok(())
    }

    pub fn tracked_ips(&self) -> usize {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    fn limiter(max_requests: u32, max_tracked_ips: usize) -> RateLimiter {
        RateLimiter::new(&RateLimitConfig {
            max_requests,
            window_secs: 60,
            max_tracked_ips,
        })
    }

    #[test]
    fn test_rejects_after_limit() {
        let limiter = limiter(3, 100);
        for _ in 0..3 {
            assert!(limiter.check(ip(1)).is_ok());
        }
        assert!(matches!(limiter.check(ip(1)), Err(ApiError::RateLimited)));
        // other clients are unaffected
        assert!(limiter.check(ip(2)).is_ok());
    }

    #[test]
    fn test_window_expiry() {
        let limiter = limiter(1, 100);
        let start = Instant::now();

        assert!(limiter.check_at(ip(1), start).is_ok());
        assert!(limiter.check_at(ip(1), start + Duration::from_secs(30)).is_err());
        assert!(limiter.check_at(ip(1), start + Duration::from_secs(61)).is_ok());
    }

    #[test]
    fn test_tracked_ip_cap() {
        let limiter = limiter(5, 2);
        let start = Instant::now();

        assert!(limiter.check_at(ip(1), start).is_ok());
        assert!(limiter.check_at(ip(2), start).is_ok());
        assert!(limiter.check_at(ip(3), start).is_err());
        assert_eq!(limiter.tracked_ips(), 2);

        // idle entries are evicted to make room
        assert!(limiter.check_at(ip(3), start + Duration::from_secs(61)).is_ok());
        assert_eq!(limiter.tracked_ips(), 1);
    }
}
