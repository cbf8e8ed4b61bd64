//! Fetch policy
//!
//! Every throttle number lives here as a tunable. The defaults are what the
//! CRM's undocumented rolling-window quota tolerated in practice.

use crate::error::FetchError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Pacing, backoff and cooldown settings for one batch
///
/// Durations are seconds as `f64` so they can be written naturally in TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchPolicy {
    /// Pause after each item at the start of a batch
    pub base_delay: f64,
    /// Ceiling for the pacing pause
    pub max_delay: f64,
    /// Increase applied to the pacing pause when an item exhausts its retries
    pub backoff_step: f64,
    /// Request count after which throttling is expected to begin
    pub failure_window_start: u64,
    /// Items between cooldowns; zero or negative disables cooldown
    pub cooldown_threshold: i64,
    /// Length of a cooldown pause
    pub cooldown_duration: f64,
    /// Extra attempts for a rate-limited item
    pub max_retries_per_item: u32,
    /// Pause before each retry
    pub retry_pause: f64,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            base_delay: 0.75,
            max_delay: 10.0,
            backoff_step: 2.0,
            failure_window_start: 76,
            cooldown_threshold: 75,
            cooldown_duration: 180.0,
            max_retries_per_item: 1,
            retry_pause: 2.0,
        }
    }
}

impl FetchPolicy {
    /// Set base and max delay
    #[inline]
    #[must_use]
    pub fn with_delays(mut self, base_delay: f64, max_delay: f64) -> Self {
        self.base_delay = base_delay;
        self.max_delay = max_delay;
        self
    }

    /// Set backoff step
    #[inline]
    #[must_use]
    pub fn with_backoff_step(mut self, step: f64) -> Self {
        self.backoff_step = step;
        self
    }

    /// Set cooldown threshold and duration
    #[inline]
    #[must_use]
    pub fn with_cooldown(mut self, threshold: i64, duration: f64) -> Self {
        self.cooldown_threshold = threshold;
        self.cooldown_duration = duration;
        self
    }

    /// Set retry count and pause
    #[inline]
    #[must_use]
    pub fn with_retries(mut self, max_retries: u32, retry_pause: f64) -> Self {
        self.max_retries_per_item = max_retries;
        self.retry_pause = retry_pause;
        self
    }

    /// Check the policy is usable
    ///
    /// # Errors
    /// Returns [`FetchError::InvalidPolicy`] naming the first bad setting.
    pub fn validate(&self) -> Result<(), FetchError> {
        let finite = [
            ("base_delay", self.base_delay),
            ("max_delay", self.max_delay),
            ("backoff_step", self.backoff_step),
            ("cooldown_duration", self.cooldown_duration),
            ("retry_pause", self.retry_pause),
        ];
        if let Some((name, value)) = finite.iter().find(|(_, v)| !v.is_finite()) {
            return Err(FetchError::InvalidPolicy(format!("{name} must be finite, got {value}")));
        }
        if let Some((name, value)) = finite
            .iter()
            .find(|(_, v)| *v > 0.0 && Duration::try_from_secs_f64(*v).is_err())
        {
            return Err(FetchError::InvalidPolicy(format!(
                "{name} is too large for a duration, got {value}"
            )));
        }
        if self.base_delay <= 0.0 {
            return Err(FetchError::InvalidPolicy(format!(
                "base_delay must be > 0, got {}",
                self.base_delay
            )));
        }
        if self.max_delay < self.base_delay {
            return Err(FetchError::InvalidPolicy(format!(
                "max_delay ({}) must be >= base_delay ({})",
                self.max_delay, self.base_delay
            )));
        }
        if self.backoff_step <= 0.0 {
            return Err(FetchError::InvalidPolicy(format!(
                "backoff_step must be > 0, got {}",
                self.backoff_step
            )));
        }
        if self.cooldown_duration < 0.0 {
            return Err(FetchError::InvalidPolicy(format!(
                "cooldown_duration must be >= 0, got {}",
                self.cooldown_duration
            )));
        }
        if self.retry_pause < 0.0 {
            return Err(FetchError::InvalidPolicy(format!(
                "retry_pause must be >= 0, got {}",
                self.retry_pause
            )));
        }
        Ok(())
    }

    /// Pause after each item at the start of a batch
    #[inline]
    #[must_use]
    pub fn base_delay(&self) -> Duration {
        Duration::from_secs_f64(self.base_delay)
    }

    /// Ceiling for the pacing pause
    #[inline]
    #[must_use]
    pub fn max_delay(&self) -> Duration {
        Duration::from_secs_f64(self.max_delay)
    }

    /// Backoff increment
    #[inline]
    #[must_use]
    pub fn backoff_step(&self) -> Duration {
        Duration::from_secs_f64(self.backoff_step)
    }

    /// Cooldown pause
    #[inline]
    #[must_use]
    pub fn cooldown_duration(&self) -> Duration {
        Duration::from_secs_f64(self.cooldown_duration)
    }

    /// Retry pause
    #[inline]
    #[must_use]
    pub fn retry_pause(&self) -> Duration {
        Duration::from_secs_f64(self.retry_pause)
    }

    /// Whether a cooldown is due before the next item
    #[must_use]
    pub fn cooldown_due(&self, items_processed: usize) -> bool {
        match usize::try_from(self.cooldown_threshold) {
            Ok(threshold) if threshold > 0 => {
                items_processed > 0 && items_processed % threshold == 0
            }
            _ => false,
        }
    }

    /// Total attempts allowed for one item
    #[inline]
    #[must_use]
    pub fn attempts_per_item(&self) -> u32 {
        self.max_retries_per_item.saturating_add(1)
    }
}
