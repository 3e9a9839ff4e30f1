//! Per-client sliding-log rate limiter.
//!
//! Each client key owns the timestamps of its admitted requests inside the
//! trailing window. `admit` prunes, decides, and appends under one lock, so two
//! requests racing at the quota boundary cannot both get in. Denied attempts
//! are never recorded.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::services::rate_limit::clock::{Clock, SystemClock};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitPolicy {
    pub window: Duration,
    pub max_requests: usize,
    /// Chance that an `admit` call also sweeps idle clients, in `[0, 1]`.
    pub sweep_probability: f64,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(15 * 60),
            max_requests: 100,
            sweep_probability: 0.01,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed { remaining: usize },
    Denied { retry_after: Duration },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed { .. })
    }
}

type WindowLog = HashMap<String, VecDeque<Instant>>;

pub struct RateLimiter {
    policy: RateLimitPolicy,
    clock: Arc<dyn Clock>,
    log: Mutex<WindowLog>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("policy", &self.policy)
            .field("tracked_clients", &self.tracked_clients())
            .finish()
    }
}

fn prune(entries: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&oldest) = entries.front() {
        if now.saturating_duration_since(oldest) > window {
            entries.pop_front();
        } else {
            break;
        }
    }
}

impl RateLimiter {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self::with_clock(policy, Arc::new(SystemClock))
    }

    pub fn with_clock(mut policy: RateLimitPolicy, clock: Arc<dyn Clock>) -> Self {
        policy.sweep_probability = policy.sweep_probability.clamp(0.0, 1.0);
        Self {
            policy,
            clock,
            log: Mutex::new(HashMap::new()),
        }
    }

    /// Admit or reject one request for `key`.
    pub fn admit(&self, key: &str) -> Admission {
        let mut log = self.log.lock();
        // read the clock under the lock so each key's log stays ordered
        let now = self.clock.now();
        let window = self.policy.window;

        let entries = log.entry(key.to_string()).or_default();
        prune(entries, now, window);

        let admission = if entries.len() >= self.policy.max_requests {
            let retry_after = entries
                .front()
                .map(|oldest| window.saturating_sub(now.saturating_duration_since(*oldest)))
                .unwrap_or(window);
            Admission::Denied { retry_after }
        } else {
            entries.push_back(now);
            Admission::Allowed {
                remaining: self.policy.max_requests - entries.len(),
            }
        };

        if self.should_sweep() {
            Self::sweep_locked(&mut log, now, window);
        }
        admission
    }

    /// Number of recorded requests for `key` still inside the window.
    pub fn in_window(&self, key: &str) -> usize {
        let now = self.clock.now();
        self.log
            .lock()
            .get(key)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|t| now.saturating_duration_since(**t) <= self.policy.window)
                    .count()
            })
            .unwrap_or(0)
    }

    pub fn tracked_clients(&self) -> usize {
        self.log.lock().len()
    }

    /// Drop every client whose log is empty after pruning. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let mut log = self.log.lock();
        let now = self.clock.now();
        Self::sweep_locked(&mut log, now, self.policy.window)
    }

    /// Forget every client. Tests use it to start from a clean window.
    pub fn reset(&self) {
        self.log.lock().clear();
    }

    fn sweep_locked(log: &mut WindowLog, now: Instant, window: Duration) -> usize {
        let before = log.len();
        log.retain(|_, entries| {
            prune(entries, now, window);
            !entries.is_empty()
        });
        before - log.len()
    }

    fn should_sweep(&self) -> bool {
        let p = self.policy.sweep_probability;
        p > 0.0 && rand::random_bool(p)
    }
}

/// Timer-driven sweep, for deployments that want a deterministic bound on idle
/// entries instead of (or on top of) the probabilistic one.
pub fn spawn_sweeper(limiter: Arc<RateLimiter>, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let removed = limiter.sweep();
            tracing::debug!(
                removed,
                remaining = limiter.tracked_clients(),
                "rate limit sweep"
            );
        }
    })
}
