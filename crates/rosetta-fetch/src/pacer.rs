//! Real-time pacing

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

/// Why the controller is pausing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PauseReason {
    /// Gap after an item
    Pacing,
    /// Gap before retrying a rate-limited item
    Retry,
    /// Long pause every `cooldown_threshold` items
    Cooldown,
}

/// Source of real-time waits
#[async_trait]
pub trait Pacer: Send + Sync {
    /// Wait for `duration`
    async fn pause(&self, duration: Duration, reason: PauseReason);
}

/// Pacer backed by `tokio::time::sleep`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioPacer;

#[async_trait]
impl Pacer for TokioPacer {
    async fn pause(&self, duration: Duration, reason: PauseReason) {
        if duration.is_zero() {
            return;
        }
        if reason == PauseReason::Cooldown {
            tracing::info!("Cooling down for {:.0}s", duration.as_secs_f64());
        }
        tokio::time::sleep(duration).await;
    }
}
