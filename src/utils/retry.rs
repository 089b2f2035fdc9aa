//! Retry backoff
//!
//! Exponential backoff with additive jitter for the attempts an orchestrator
//! makes against one service. The retry loop itself lives with the caller,
//! since every attempt has to go back through credential selection.

use rand::Rng;
use std::time::Duration;

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Attempts per service, counting the first one
    pub max_attempts: u32,

    /// Delay before the second attempt
    pub initial_delay: Duration,

    /// Upper bound on the exponential part of the delay
    pub max_delay: Duration,

    /// Growth factor between consecutive delays
    pub multiplier: f64,

    /// Upper bound of the uniform random delay added on top
    pub jitter: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::key_rotation()
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Three attempts, 2s doubling up to 30s, plus up to 1s of jitter
    pub fn key_rotation() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: Duration::from_secs(1),
        }
    }

    /// A single attempt per service
    pub fn no_retry() -> Self {
        Self::key_rotation().with_max_attempts(1)
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Set the jitter bound; zero disables it
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay after the failed attempt `attempt` (0-indexed), without jitter
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let delay_ms = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let delay_ms = delay_ms.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(delay_ms as u64)
    }

    /// Delay with jitter drawn from `rng`
    pub fn calculate_delay_with<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let base = self.base_delay(attempt);
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return base;
        }
        base + Duration::from_millis(rng.gen_range(0..=jitter_ms))
    }

    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        self.calculate_delay_with(attempt, &mut rand::thread_rng())
    }
}
