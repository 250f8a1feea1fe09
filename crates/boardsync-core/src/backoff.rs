//! Reconnect delay policy and a general exponential backoff helper.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_MS: u64 = 1_000;
pub const DEFAULT_MULTIPLIER: u32 = 2;
pub const DEFAULT_MAX_MS: u64 = 30_000;

/// Delay before reconnect attempt `attempt` (1-based) under the default policy.
///
/// `delay(n) = min(1000 * 2^(n-1), 30000)` milliseconds.
pub fn reconnect_delay(attempt: u32) -> Duration {
    BackoffPolicy::default().delay(attempt)
}

/// Capped exponential policy used by the reconnect loop. No jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffPolicy {
    pub base_ms: u64,
    pub multiplier: u32,
    pub max_ms: u64,
}

impl BackoffPolicy {
    /// Delay for a 1-based attempt. Attempt 0 is treated as 1.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = u64::from(self.multiplier.max(1)).saturating_pow(exponent);
        let millis = self.base_ms.saturating_mul(factor).min(self.max_ms);
        Duration::from_millis(millis)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_ms: DEFAULT_BASE_MS,
            multiplier: DEFAULT_MULTIPLIER,
            max_ms: DEFAULT_MAX_MS,
        }
    }
}

/// Stateful exponential backoff for retrying one-shot operations.
///
/// Starts at attempt 0. Each `next_delay` advances the attempt and returns
/// `base * 2^(attempt-1)` plus up to `jitter * delay`, capped at `max`.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    base: Duration,
    max: Duration,
    jitter: f64,
    attempt: u32,
}

impl ExponentialBackoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            jitter: 0.0,
            attempt: 0,
        }
    }

    /// Set the jitter fraction, clamped to `[0, 1]`.
    pub fn with_jitter(mut self, fraction: f64) -> Self {
        self.jitter = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn next_delay(&mut self) -> Duration {
        self.attempt = self.attempt.saturating_add(1);
        let exponent = (self.attempt - 1).min(31);
        let delay = self.base.saturating_mul(1u32 << exponent).min(self.max);
        if self.jitter == 0.0 {
            return delay;
        }
        let spread = delay.mul_f64(self.jitter);
        let extra = rand::thread_rng().gen_range(Duration::ZERO..=spread);
        (delay + extra).min(self.max)
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(DEFAULT_BASE_MS),
            Duration::from_millis(DEFAULT_MAX_MS),
        )
    }
}
