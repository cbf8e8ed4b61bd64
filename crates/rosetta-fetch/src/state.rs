//! Per-batch controller state

use serde::Serialize;
use std::time::Duration;

/// Controller mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    /// Pacing at the base delay
    #[default]
    Normal,
    /// Pacing above the base delay after exhausted retries
    Backoff,
    /// Inside a cooldown pause
    Cooldown,
}

/// Run-wide counters for one batch
///
/// Owned by the controller for the duration of one batch and handed back in
/// the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchState {
    /// Current pacing pause
    pub current_delay: Duration,
    /// Items finished so far (fetched or failed)
    pub items_processed: usize,
    /// Rate-limit signals since the last success or cooldown
    pub consecutive_failures: u32,
    /// Requests sent, retries included
    pub requests_issued: u64,
    /// Cooldowns taken
    pub cooldowns: u32,
    /// Current mode
    pub mode: FetchMode,
}

impl FetchState {
    /// Fresh state pacing at `base_delay`
    #[inline]
    #[must_use]
    pub fn new(base_delay: Duration) -> Self {
        Self {
            current_delay: base_delay,
            items_processed: 0,
            consecutive_failures: 0,
            requests_issued: 0,
            cooldowns: 0,
            mode: FetchMode::Normal,
        }
    }

    /// Enter cooldown
    pub fn begin_cooldown(&mut self) {
        self.mode = FetchMode::Cooldown;
        self.cooldowns += 1;
    }

    /// Leave cooldown, returning to Backoff if the delay was ever raised
    pub fn end_cooldown(&mut self, base_delay: Duration) {
        self.consecutive_failures = 0;
        self.mode = if self.current_delay > base_delay {
            FetchMode::Backoff
        } else {
            FetchMode::Normal
        };
    }

    /// Note a successful fetch
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    /// Note a rate-limit signal
    pub fn record_rate_limit(&mut self) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }

    /// Raise the pacing delay by `step`, capped at `max`; never lowers it
    pub fn ratchet(&mut self, step: Duration, max: Duration) {
        let raised = self.current_delay.saturating_add(step).min(max);
        self.current_delay = self.current_delay.max(raised);
        self.mode = FetchMode::Backoff;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratchet_caps_at_max() {
        let mut state = FetchState::new(Duration::from_secs(8));
        state.ratchet(Duration::from_secs(2), Duration::from_secs(10));
        state.ratchet(Duration::from_secs(2), Duration::from_secs(10));
        assert_eq!(state.current_delay, Duration::from_secs(10));
        assert_eq!(state.mode, FetchMode::Backoff);
    }

    #[test]
    fn ratchet_never_lowers() {
        let mut state = FetchState::new(Duration::from_secs(12));
        state.ratchet(Duration::from_secs(2), Duration::from_secs(10));
        assert_eq!(state.current_delay, Duration::from_secs(12));
    }

    #[test]
    fn cooldown_restores_mode() {
        let base = Duration::from_secs(1);
        let mut state = FetchState::new(base);
        state.record_rate_limit();
        state.begin_cooldown();
        assert_eq!(state.mode, FetchMode::Cooldown);
        state.end_cooldown(base);
        assert_eq!(state.mode, FetchMode::Normal);
        assert_eq!(state.consecutive_failures, 0);

        state.ratchet(Duration::from_secs(1), Duration::from_secs(5));
        state.begin_cooldown();
        state.end_cooldown(base);
        assert_eq!(state.mode, FetchMode::Backoff);
        assert_eq!(state.cooldowns, 2);
    }
}
