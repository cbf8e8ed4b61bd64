//! Deterministic doubles for driving the controller without a network or a clock

use crate::pacer::{Pacer, PauseReason};
use crate::transport::{FetchDescriptor, FetchOutcome, Transport};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

/// Pacer that records pauses instead of sleeping
#[derive(Debug, Default)]
pub struct RecordingPacer {
    pauses: Mutex<Vec<(Duration, PauseReason)>>,
}

impl RecordingPacer {
    /// Create an empty recorder
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every pause in call order
    #[must_use]
    pub fn pauses(&self) -> Vec<(Duration, PauseReason)> {
        self.pauses.lock().clone()
    }

    /// Durations of pauses with `reason`, in call order
    #[must_use]
    pub fn durations(&self, reason: PauseReason) -> Vec<Duration> {
        self.pauses
            .lock()
            .iter()
            .filter(|(_, r)| *r == reason)
            .map(|(d, _)| *d)
            .collect()
    }

    /// Number of pauses with `reason`
    #[must_use]
    pub fn count(&self, reason: PauseReason) -> usize {
        self.pauses.lock().iter().filter(|(_, r)| *r == reason).count()
    }
}

#[async_trait]
impl Pacer for RecordingPacer {
    async fn pause(&self, duration: Duration, reason: PauseReason) {
        self.pauses.lock().push((duration, reason));
    }
}

/// Transport answering from per-key scripts
///
/// Each key has a queue of outcomes consumed one per call; once a queue is
/// empty (or a key was never scripted) the fallback outcome is returned.
#[derive(Debug)]
pub struct ScriptedTransport {
    scripts: Mutex<HashMap<String, VecDeque<FetchOutcome>>>,
    fallback: FetchOutcome,
    calls: Mutex<Vec<String>>,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new(FetchOutcome::Success(Value::Null))
    }
}

impl ScriptedTransport {
    /// Create transport with a fallback outcome
    #[must_use]
    pub fn new(fallback: FetchOutcome) -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            fallback,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue outcomes for `key`
    #[must_use]
    pub fn with_script(
        self,
        key: impl Into<String>,
        outcomes: impl IntoIterator<Item = FetchOutcome>,
    ) -> Self {
        self.scripts
            .lock()
            .entry(key.into())
            .or_default()
            .extend(outcomes);
        self
    }

    /// Keys fetched, in call order
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Number of calls for `key`
    #[must_use]
    pub fn call_count(&self, key: &str) -> usize {
        self.calls.lock().iter().filter(|k| k.as_str() == key).count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn fetch(&self, descriptor: &FetchDescriptor) -> FetchOutcome {
        self.calls.lock().push(descriptor.key.clone());
        self.scripts
            .lock()
            .get_mut(&descriptor.key)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| self.fallback.clone())
    }
}
