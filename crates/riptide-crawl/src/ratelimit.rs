//! Per-host minimum request spacing.
//!
//! `host -> last_access_time` and `host -> min_delay` each live in their own
//! lock-free `DashMap`, the same per-host concurrent-map idiom this
//! codebase uses for rate limiting and robots compliance.

use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

pub struct RateLimiter {
    last_access: DashMap<String, Instant>,
    min_delay: DashMap<String, Duration>,
    default_min_delay: Duration,
}

impl RateLimiter {
    pub fn new(default_min_delay: Duration) -> Self {
        Self {
            last_access: DashMap::new(),
            min_delay: DashMap::new(),
            default_min_delay,
        }
    }

    /// Raises (never lowers) the minimum delay for `host`, e.g. when the
    /// Robots Oracle discovers a published `Crawl-delay` larger than the
    /// configured floor.
    pub fn raise_min_delay(&self, host: &str, delay: Duration) {
        let mut entry = self.min_delay.entry(host.to_string()).or_insert(self.default_min_delay);
        if delay > *entry {
            *entry = delay;
        }
    }

    fn min_delay_for(&self, host: &str) -> Duration {
        self.min_delay
            .get(host)
            .map(|d| *d)
            .unwrap_or(self.default_min_delay)
    }

    /// Sleeps until `min_delay(host)` has elapsed since the last access to
    /// `host`, then records this moment as the new last-access time.
    pub async fn wait(&self, host: &str) {
        let min_delay = self.min_delay_for(host);
        let now = Instant::now();

        let wait_for = match self.last_access.get(host) {
            Some(last) => {
                let elapsed = now.saturating_duration_since(*last);
                min_delay.saturating_sub(elapsed)
            }
            None => Duration::ZERO,
        };

        if !wait_for.is_zero() {
            tokio::time::sleep(wait_for).await;
        }

        self.last_access.insert(host.to_string(), Instant::now());
    }

    /// Seeds `last_access` for `host` as if it were accessed `secs_ago`
    /// seconds before now. Used to rehydrate rate-limiter state from a
    /// [`crate::snapshot::JobSnapshot`] across a process restart, since a
    /// `tokio::time::Instant` itself cannot be serialized.
    pub fn seed_last_access(&self, host: &str, secs_ago: f64) {
        let now = Instant::now();
        let delta = Duration::from_secs_f64(secs_ago.max(0.0));
        let last = now.checked_sub(delta).unwrap_or(now);
        self.last_access.insert(host.to_string(), last);
    }

    pub fn snapshot_last_access_secs_ago(&self) -> std::collections::HashMap<String, f64> {
        let now = Instant::now();
        self.last_access
            .iter()
            .map(|entry| (entry.key().clone(), now.saturating_duration_since(*entry.value()).as_secs_f64()))
            .collect()
    }

    pub fn clear(&self) {
        self.last_access.clear();
        self.min_delay.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn enforces_minimum_spacing_between_fetches() {
        let limiter = RateLimiter::new(Duration::from_millis(50));
        let t0 = Instant::now();
        limiter.wait("h").await;
        limiter.wait("h").await;
        assert!(t0.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn different_hosts_do_not_block_each_other() {
        let limiter = RateLimiter::new(Duration::from_millis(200));
        let t0 = Instant::now();
        limiter.wait("h1").await;
        limiter.wait("h2").await;
        assert!(t0.elapsed() < Duration::from_millis(200));
    }

    #[test]
    fn raising_min_delay_never_lowers_it() {
        let limiter = RateLimiter::new(Duration::from_secs(1));
        limiter.raise_min_delay("h", Duration::from_millis(100));
        assert_eq!(limiter.min_delay_for("h"), Duration::from_secs(1));
        limiter.raise_min_delay("h", Duration::from_secs(5));
        assert_eq!(limiter.min_delay_for("h"), Duration::from_secs(5));
    }
}
