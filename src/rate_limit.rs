use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::interval;

use crate::clock::Clock;
use crate::metrics::{RATE_LIMIT_SWEPT, RATE_LIMIT_TRACKED_CLIENTS};

pub const DEFAULT_WINDOW_MS: i64 = 10 * 60 * 1000;
pub const DEFAULT_MAX_IN_WINDOW: usize = 10;
pub const DEFAULT_COOLDOWN_MS: i64 = 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub window_ms: i64,
    pub max_in_window: usize,
    pub cooldown_ms: i64,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            window_ms: DEFAULT_WINDOW_MS,
            max_in_window: DEFAULT_MAX_IN_WINDOW,
            cooldown_ms: DEFAULT_COOLDOWN_MS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    TooManyInWindow,
    TooSoon,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::TooManyInWindow => "too_many_in_window",
            DenyReason::TooSoon => "too_soon",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied {
        reason: DenyReason,
        retry_after_ms: i64,
    },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateStatus {
    #[serde(rename = "commentsInLast10Minutes")]
    pub count_10m: usize,
    #[serde(rename = "commentsInLastMinute")]
    pub count_1m: usize,
    #[serde(rename = "remainingCommentsIn10Minutes")]
    pub remaining: usize,
    #[serde(rename = "canCommentNow")]
    pub can_act_now: bool,
}

// Rate limit entry - recent action timestamps for one client key
#[derive(Debug, Default)]
pub struct RateLimitEntry {
    pub timestamps: Vec<i64>,
}

impl RateLimitEntry {
    fn prune(&mut self, now: i64, window_ms: i64) {
        self.timestamps.retain(|t| now - t < window_ms);
    }
}

pub struct RateLimiter {
    entries: DashMap<String, RateLimitEntry>,
    policy: RateLimitPolicy,
}

impl RateLimiter {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self {
            entries: DashMap::new(),
            policy,
        }
    }

    pub fn policy(&self) -> RateLimitPolicy {
        self.policy
    }

    // The entry guard holds the shard lock across prune, evaluate and record
    pub fn check_and_record(&self, key: &str, now: i64) -> Decision {
        let decision = {
            let mut entry = self.entries.entry(key.to_string()).or_default();
            entry.prune(now, self.policy.window_ms);

            let decision = self.evaluate(&entry.timestamps, now);
            if decision.is_allowed() {
                entry.timestamps.push(now);
            }
            decision
        };

        // Denials with nothing left in the window must not leave an empty entry behind
        if !decision.is_allowed() {
            self.entries
                .remove_if(key, |_, entry| entry.timestamps.is_empty());
        }
        decision
    }

    fn evaluate(&self, recent: &[i64], now: i64) -> Decision {
        let policy = &self.policy;

        if recent.len() >= policy.max_in_window {
            let oldest = recent.iter().copied().min().unwrap_or(now);
            return Decision::Denied {
                reason: DenyReason::TooManyInWindow,
                retry_after_ms: (oldest + policy.window_ms - now).max(0),
            };
        }

        let cooldown_start = now - policy.cooldown_ms;
        if let Some(newest) = recent.iter().copied().filter(|t| *t > cooldown_start).max() {
            return Decision::Denied {
                reason: DenyReason::TooSoon,
                retry_after_ms: (newest + policy.cooldown_ms - now).max(0),
            };
        }

        Decision::Allowed
    }

    pub fn status(&self, key: &str, now: i64) -> RateStatus {
        let policy = &self.policy;
        let (count_10m, count_1m) = match self.entries.get(key) {
            Some(entry) => {
                let cooldown_start = now - policy.cooldown_ms;
                let recent = entry
                    .timestamps
                    .iter()
                    .filter(|t| now - **t < policy.window_ms);
                let mut in_window = 0;
                let mut in_cooldown = 0;
                for t in recent {
                    in_window += 1;
                    if *t > cooldown_start {
                        in_cooldown += 1;
                    }
                }
                (in_window, in_cooldown)
            }
            None => (0, 0),
        };

        RateStatus {
            count_10m,
            count_1m,
            remaining: policy.max_in_window.saturating_sub(count_10m),
            can_act_now: count_1m == 0 && count_10m < policy.max_in_window,
        }
    }

    // Returns how many clients were dropped
    pub fn sweep(&self, now: i64) -> usize {
        let before = self.entries.len();
        let window_ms = self.policy.window_ms;
        self.entries.retain(|_, entry| {
            entry.prune(now, window_ms);
            !entry.timestamps.is_empty()
        });
        before.saturating_sub(self.entries.len())
    }

    pub fn tracked_clients(&self) -> usize {
        self.entries.len()
    }

    pub fn start_sweeper(self: Arc<Self>, every: Duration, clock: Arc<dyn Clock>) -> SweeperHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let mut ticker = interval(every);
            tracing::info!(interval = ?every, "Rate limit sweeper started");

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {
                        let removed = self.sweep(clock.now_millis());
                        let tracked = self.tracked_clients();
                        RATE_LIMIT_SWEPT.inc_by(removed as u64);
                        RATE_LIMIT_TRACKED_CLIENTS.set(tracked as i64);
                        if removed > 0 {
                            tracing::debug!(removed, tracked, "Swept idle rate limit entries");
                        }
                    }
                }
            }

            tracing::info!("Rate limit sweeper stopped");
        });

        SweeperHandle {
            shutdown: Some(shutdown_tx),
            task,
        }
    }
}

pub struct SweeperHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "Rate limit sweeper ended abnormally");
        }
    }
}
