//! Error types for the fetch pipeline
//!
//! Only two things can stop a caller:
//! - A policy that makes no sense (rejected before any request is issued)
//! - A hard error from the remote side, which aborts the batch
//!
//! Rate limiting and bad items are recorded in the batch report, not raised.

/// Fetch pipeline errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Policy failed validation
    #[error("invalid fetch policy: {0}")]
    InvalidPolicy(String),

    /// Remote side refused the session; the batch was aborted
    #[error("batch aborted at '{key}': {reason}")]
    HardError {
        /// Descriptor key of the aborting item
        key: String,
        /// Reason reported by the transport
        reason: String,
    },

    /// HTTP client could not be constructed
    #[error("transport setup failed: {0}")]
    TransportSetup(String),
}

impl FetchError {
    /// Whether the remote session must be refreshed before retrying
    #[inline]
    #[must_use]
    pub fn requires_new_session(&self) -> bool {
        matches!(self, Self::HardError { .. })
    }
}
