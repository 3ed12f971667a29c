//! Token-bucket rate limiting (spec §4.2): per-user, per-workspace, and
//! global buckets, each with capacity/refill-rate/burst allowance.

use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    burst_allowance: f64,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(requests_per_minute: u32, burst_allowance: f64) -> Self {
        let capacity = requests_per_minute as f64;
        Self {
            capacity,
            tokens: capacity * burst_allowance,
            refill_per_sec: capacity / 60.0,
            burst_allowance,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        let max = self.capacity * self.burst_allowance;
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(max);
        self.last_refill = now;
    }

    /// Consumes one token if available; returns the seconds until one more
    /// token would be available otherwise.
    pub fn try_acquire(&mut self, now: Instant) -> Result<(), f64> {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            let deficit = 1.0 - self.tokens;
            Err(deficit / self.refill_per_sec.max(f64::MIN_POSITIVE))
        }
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub per_user_rpm: u32,
    pub per_workspace_rpm: u32,
    pub global_rpm: u32,
    pub window: Duration,
    pub burst_allowance: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_user_rpm: 60,
            per_workspace_rpm: 600,
            global_rpm: 6000,
            window: Duration::from_secs(60),
            burst_allowance: 1.2,
        }
    }
}

/// Which bucket denied admission (spec §4.2: "structured limit info").
#[derive(Debug, Clone, PartialEq)]
pub struct LimitDenied {
    pub bucket: String,
    pub retry_after_secs: u64,
}

pub struct RateLimiter {
    config: RateLimitConfig,
    per_user: std::sync::Mutex<HashMap<String, TokenBucket>>,
    per_workspace: std::sync::Mutex<HashMap<String, TokenBucket>>,
    global: std::sync::Mutex<TokenBucket>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let global = TokenBucket::new(config.global_rpm, config.burst_allowance);
        Self {
            per_user: std::sync::Mutex::new(HashMap::new()),
            per_workspace: std::sync::Mutex::new(HashMap::new()),
            global: std::sync::Mutex::new(global),
            config,
        }
    }

    /// Admission check across all three buckets; any exhausted bucket
    /// denies with structured limit info (spec §4.2). Denial is
    /// independent per user (spec §8 testable property). `workspace_ids`
    /// is checked in full, not just its first entry: a request is
    /// admitted only if every targeted workspace's bucket has capacity.
    pub fn check(&self, user_id: &str, workspace_ids: &[String]) -> Result<(), LimitDenied> {
        let now = Instant::now();

        {
            let mut global = self.global.lock().unwrap();
            if let Err(wait) = global.try_acquire(now) {
                return Err(LimitDenied {
                    bucket: "global".to_string(),
                    retry_after_secs: wait.ceil().max(0.0) as u64,
                });
            }
        }

        {
            let mut users = self.per_user.lock().unwrap();
            let bucket = users
                .entry(user_id.to_string())
                .or_insert_with(|| TokenBucket::new(self.config.per_user_rpm, self.config.burst_allowance));
            if let Err(wait) = bucket.try_acquire(now) {
                return Err(LimitDenied {
                    bucket: "per_user".to_string(),
                    retry_after_secs: wait.ceil().max(0.0) as u64,
                });
            }
        }

        for workspace_id in workspace_ids {
            let mut workspaces = self.per_workspace.lock().unwrap();
            let bucket = workspaces.entry(workspace_id.clone()).or_insert_with(|| {
                TokenBucket::new(self.config.per_workspace_rpm, self.config.burst_allowance)
            });
            if let Err(wait) = bucket.try_acquire(now) {
                return Err(LimitDenied {
                    bucket: format!("per_workspace:{}", workspace_id),
                    retry_after_secs: wait.ceil().max(0.0) as u64,
                });
            }
        }

        Ok(())
    }
}
