//! Adaptive fetch controller
//!
//! Issues an ordered batch of dependent requests one at a time while tuning
//! its own pace:
//! - a fixed pause after every item, raised by `backoff_step` each time an item
//!   exhausts its retries and never lowered again within the batch
//! - a long cooldown every `cooldown_threshold` items
//! - a short retry pause before re-trying a rate-limited item
//!
//! A failing item is recorded and the batch moves on. Only a hard error (the
//! session was rejected) stops the batch.

use crate::error::FetchError;
use crate::pacer::{Pacer, PauseReason};
use crate::policy::FetchPolicy;
use crate::state::FetchState;
use crate::transport::{FetchDescriptor, FetchOutcome, Transport};
use serde::Serialize;
use serde_json::Value;

/// Why an item ended without a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Every attempt was rate limited
    RateLimited,
    /// The item itself was rejected
    ItemError,
}

/// Terminal failure for one item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    /// Descriptor key
    pub key: String,
    /// Failure class
    pub kind: FailureKind,
    /// Last reason reported by the transport
    pub reason: String,
    /// Requests sent for this item
    pub attempts: u32,
}

/// Result for one attempted item
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    /// Document fetched
    Fetched(Value),
    /// Terminal failure
    Failed(ItemFailure),
}

/// Per-item entry in a [`BatchReport`]
#[derive(Debug, Clone, PartialEq)]
pub struct ItemReport {
    /// Descriptor key
    pub key: String,
    /// What happened
    pub outcome: ItemOutcome,
}

/// Item that aborted the batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchAbort {
    /// Descriptor key of the aborting item
    pub key: String,
    /// Reason reported by the transport
    pub reason: String,
}

/// Everything a batch produced
#[derive(Debug, Clone)]
pub struct BatchReport {
    items: Vec<ItemReport>,
    aborted: Option<BatchAbort>,
    not_attempted: Vec<String>,
    state: FetchState,
}

impl BatchReport {
    /// Attempted items in input order (the aborting item excluded)
    #[inline]
    #[must_use]
    pub fn items(&self) -> &[ItemReport] {
        &self.items
    }

    /// Fetched documents in input order
    pub fn successes(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.items.iter().filter_map(|item| match &item.outcome {
            ItemOutcome::Fetched(value) => Some((item.key.as_str(), value)),
            ItemOutcome::Failed(_) => None,
        })
    }

    /// Terminal failures in input order
    pub fn failures(&self) -> impl Iterator<Item = &ItemFailure> {
        self.items.iter().filter_map(|item| match &item.outcome {
            ItemOutcome::Failed(failure) => Some(failure),
            ItemOutcome::Fetched(_) => None,
        })
    }

    /// Number of fetched documents
    #[must_use]
    pub fn success_count(&self) -> usize {
        self.successes().count()
    }

    /// Abort marker, if a hard error stopped the batch
    #[inline]
    #[must_use]
    pub fn aborted(&self) -> Option<&BatchAbort> {
        self.aborted.as_ref()
    }

    /// Keys never attempted because the batch was aborted
    #[inline]
    #[must_use]
    pub fn not_attempted(&self) -> &[String] {
        &self.not_attempted
    }

    /// Controller state at the end of the batch
    #[inline]
    #[must_use]
    pub fn state(&self) -> &FetchState {
        &self.state
    }

    /// Surface an abort as an error
    ///
    /// # Errors
    /// Returns [`FetchError::HardError`] if the batch was aborted.
    pub fn into_result(self) -> Result<Self, FetchError> {
        match &self.aborted {
            Some(abort) => Err(FetchError::HardError {
                key: abort.key.clone(),
                reason: abort.reason.clone(),
            }),
            None => Ok(self),
        }
    }

    /// Split an aborted report into what was completed and the error
    #[must_use]
    pub fn into_parts(self) -> (Self, Option<FetchError>) {
        let error = self.aborted.as_ref().map(|abort| FetchError::HardError {
            key: abort.key.clone(),
            reason: abort.reason.clone(),
        });
        (self, error)
    }
}

enum Attempted {
    Done(ItemOutcome),
    Abort(String),
}

/// Sequential fetcher with backoff and cooldown
#[derive(Debug)]
pub struct FetchController<T, P> {
    transport: T,
    pacer: P,
    policy: FetchPolicy,
}

impl<T: Transport, P: Pacer> FetchController<T, P> {
    /// Create controller
    ///
    /// # Errors
    /// Returns [`FetchError::InvalidPolicy`] if the policy fails validation.
    pub fn new(transport: T, pacer: P, policy: FetchPolicy) -> Result<Self, FetchError> {
        policy.validate()?;
        Ok(Self {
            transport,
            pacer,
            policy,
        })
    }

    /// Policy in use
    #[inline]
    #[must_use]
    pub fn policy(&self) -> &FetchPolicy {
        &self.policy
    }

    /// Underlying transport
    #[inline]
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Underlying pacer
    #[inline]
    #[must_use]
    pub fn pacer(&self) -> &P {
        &self.pacer
    }

    /// Fetch every descriptor in order
    ///
    /// Each batch starts from a fresh [`FetchState`].
    pub async fn run(&self, label: &str, descriptors: Vec<FetchDescriptor>) -> BatchReport {
        let total = descriptors.len();
        let mut state = FetchState::new(self.policy.base_delay());
        let mut items = Vec::with_capacity(total);
        let mut aborted = None;
        let mut not_attempted = Vec::new();

        tracing::info!("[{label}] fetching {total} items");

        let mut pending = descriptors.into_iter();
        while let Some(descriptor) = pending.next() {
            if self.policy.cooldown_due(state.items_processed) {
                state.begin_cooldown();
                tracing::info!(
                    "[{label}] cooldown after {} items ({:.0}s)",
                    state.items_processed,
                    self.policy.cooldown_duration
                );
                self.pacer
                    .pause(self.policy.cooldown_duration(), PauseReason::Cooldown)
                    .await;
                state.end_cooldown(self.policy.base_delay());
            }

            tracing::debug!(
                "[{label}] [{}/{total}] {}",
                state.items_processed + 1,
                descriptor.key
            );

            match self.attempt(label, &descriptor, &mut state).await {
                Attempted::Done(outcome) => {
                    items.push(ItemReport {
                        key: descriptor.key,
                        outcome,
                    });
                }
                Attempted::Abort(reason) => {
                    tracing::error!("[{label}] hard error at {}: {reason}", descriptor.key);
                    not_attempted = pending.by_ref().map(|d| d.key).collect();
                    aborted = Some(BatchAbort {
                        key: descriptor.key,
                        reason,
                    });
                    break;
                }
            }

            state.items_processed += 1;
            self.pacer
                .pause(state.current_delay, PauseReason::Pacing)
                .await;
        }

        let report = BatchReport {
            items,
            aborted,
            not_attempted,
            state,
        };
        tracing::info!(
            "[{label}] done: {} fetched, {} failed, {} not attempted, final delay {:.2}s",
            report.success_count(),
            report.failures().count(),
            report.not_attempted.len(),
            report.state.current_delay.as_secs_f64()
        );
        report
    }

    async fn attempt(
        &self,
        label: &str,
        descriptor: &FetchDescriptor,
        state: &mut FetchState,
    ) -> Attempted {
        let max_attempts = self.policy.attempts_per_item();
        let mut last_reason = String::new();
        let mut attempts = 0;

        while attempts < max_attempts {
            if attempts > 0 {
                self.pacer
                    .pause(self.policy.retry_pause(), PauseReason::Retry)
                    .await;
            }
            attempts += 1;
            state.requests_issued += 1;

            match self.transport.fetch(descriptor).await {
                FetchOutcome::Success(value) => {
                    state.record_success();
                    return Attempted::Done(ItemOutcome::Fetched(value));
                }
                FetchOutcome::ItemError(reason) => {
                    tracing::warn!("[{label}] {} rejected: {reason}", descriptor.key);
                    return Attempted::Done(ItemOutcome::Failed(ItemFailure {
                        key: descriptor.key.clone(),
                        kind: FailureKind::ItemError,
                        reason,
                        attempts,
                    }));
                }
                FetchOutcome::HardError(reason) => return Attempted::Abort(reason),
                FetchOutcome::RateLimited(reason) => {
                    state.record_rate_limit();
                    if state.requests_issued < self.policy.failure_window_start {
                        tracing::warn!(
                            "[{label}] throttled early at request {} ({}): {reason}",
                            state.requests_issued,
                            descriptor.key
                        );
                    } else {
                        tracing::debug!(
                            "[{label}] throttled at request {} ({}): {reason}",
                            state.requests_issued,
                            descriptor.key
                        );
                    }
                    last_reason = reason;
                }
            }
        }

        state.ratchet(self.policy.backoff_step(), self.policy.max_delay());
        tracing::warn!(
            "[{label}] {} failed after {attempts} attempts, delay now {:.2}s ({} consecutive)",
            descriptor.key,
            state.current_delay.as_secs_f64(),
            state.consecutive_failures
        );

        Attempted::Done(ItemOutcome::Failed(ItemFailure {
            key: descriptor.key.clone(),
            kind: FailureKind::RateLimited,
            reason: last_reason,
            attempts,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingPacer;
    use crate::transport::MockTransport;
    use mockall::predicate::function;
    use mockall::Sequence;
    use serde_json::json;
    use std::time::Duration;

    fn descriptors(n: usize) -> Vec<FetchDescriptor> {
        (1..=n)
            .map(|i| FetchDescriptor::new(format!("item-{i}"), format!("https://crm.test/{i}")))
            .collect()
    }

    fn fast_policy() -> FetchPolicy {
        FetchPolicy::default()
            .with_delays(1.0, 5.0)
            .with_backoff_step(1.0)
            .with_cooldown(0, 0.0)
            .with_retries(1, 0.5)
    }

    #[tokio::test]
    async fn retries_once_then_succeeds() {
        let mut transport = MockTransport::new();
        let mut seq = Sequence::new();
        transport
            .expect_fetch()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| FetchOutcome::RateLimited("429".into()));
        transport
            .expect_fetch()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| FetchOutcome::Success(json!({"ok": true})));

        let controller =
            FetchController::new(transport, RecordingPacer::new(), fast_policy()).unwrap();
        let report = controller.run("test", descriptors(1)).await;

        assert_eq!(report.success_count(), 1);
        assert_eq!(report.state().current_delay, Duration::from_secs(1));
        assert_eq!(report.state().consecutive_failures, 0);
        assert_eq!(controller.pacer().count(PauseReason::Retry), 1);
    }

    #[tokio::test]
    async fn item_error_is_not_retried() {
        let mut transport = MockTransport::new();
        transport
            .expect_fetch()
            .with(function(|d: &FetchDescriptor| d.key == "item-1"))
            .times(1)
            .returning(|_| FetchOutcome::ItemError("HTTP 404".into()));
        transport
            .expect_fetch()
            .with(function(|d: &FetchDescriptor| d.key == "item-2"))
            .times(1)
            .returning(|_| FetchOutcome::Success(json!([])));

        let controller =
            FetchController::new(transport, RecordingPacer::new(), fast_policy()).unwrap();
        let report = controller.run("test", descriptors(2)).await;

        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].kind, FailureKind::ItemError);
        assert_eq!(failures[0].attempts, 1);
        assert_eq!(report.state().current_delay, Duration::from_secs(1));
        assert_eq!(controller.pacer().count(PauseReason::Retry), 0);
    }

    #[tokio::test]
    async fn hard_error_stops_without_pacing() {
        let mut transport = MockTransport::new();
        transport
            .expect_fetch()
            .times(1)
            .returning(|_| FetchOutcome::HardError("HTTP 401".into()));

        let controller =
            FetchController::new(transport, RecordingPacer::new(), fast_policy()).unwrap();
        let report = controller.run("test", descriptors(3)).await;

        assert_eq!(report.aborted().map(|a| a.key.as_str()), Some("item-1"));
        assert_eq!(report.not_attempted(), ["item-2", "item-3"]);
        assert!(controller.pacer().pauses().is_empty());
        assert!(report.into_result().unwrap_err().requires_new_session());
    }

    #[test]
    fn invalid_policy_is_rejected_up_front() {
        let transport = MockTransport::new();
        let policy = FetchPolicy::default().with_delays(-1.0, 1.0);
        let err = FetchController::new(transport, RecordingPacer::new(), policy).unwrap_err();
        assert!(matches!(err, FetchError::InvalidPolicy(_)));
    }
}
