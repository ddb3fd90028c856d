//! Reconnect Backoff
//!
//! Exponential delay between reconnect attempts: `floor * 2^attempt`,
//! capped at `ceiling`, with a random spread of `jitter_ratio` either way.

use rand::Rng;
use std::time::Duration;

/// Exponential backoff with jitter.
#[derive(Debug, Clone)]
pub struct Backoff {
    floor: Duration,
    ceiling: Duration,
    jitter_ratio: f64,
    attempt: u32,
}

impl Backoff {
    /// Create a backoff. `ceiling` is raised to `floor` if lower and
    /// `jitter_ratio` is clamped to `0.0..=1.0`; a non-finite ratio disables
    /// jitter.
    pub fn new(floor: Duration, ceiling: Duration, jitter_ratio: f64) -> Self {
        let jitter_ratio = if jitter_ratio.is_finite() {
            jitter_ratio.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            floor,
            ceiling: ceiling.max(floor),
            jitter_ratio,
            attempt: 0,
        }
    }

    /// Delay before the next attempt, then count the attempt.
    pub fn next_delay(&mut self) -> Duration {
        let base = self.base_delay(self.attempt);
        self.attempt = self.attempt.saturating_add(1);

        if self.jitter_ratio == 0.0 || base.is_zero() {
            return base;
        }
        let spread = rand::thread_rng().gen_range(-self.jitter_ratio..=self.jitter_ratio);
        let jittered = base.as_secs_f64() * (1.0 + spread);
        Duration::from_secs_f64(jittered).min(self.ceiling)
    }

    /// Un-jittered delay for the given attempt number.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        // 2^31 * any realistic floor is far past any ceiling.
        let factor = 1u32.checked_shl(attempt.min(31)).unwrap_or(u32::MAX);
        self.floor.saturating_mul(factor).min(self.ceiling)
    }

    /// Start over from the floor.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Delays handed out since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempt
    }
}
