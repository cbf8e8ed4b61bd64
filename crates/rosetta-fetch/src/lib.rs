//! Rosetta Fetch
//!
//! Rate-limit aware retrieval of CRM metadata.
//!
//! # Core Concepts
//!
//! - [`Transport`]: performs one request and classifies the response
//! - [`FetchController`]: walks an ordered batch with pacing, backoff and cooldown
//! - [`Pacer`]: the only place the controller waits, so tests never sleep
//! - [`BatchReport`]: per-item documents or failures, plus the abort marker
//!
//! # Example
//!
//! ```rust,no_run
//! use rosetta_fetch::{FetchController, FetchDescriptor, FetchPolicy, HttpTransport,
//!     SessionCredentials, TokioPacer};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), rosetta_fetch::FetchError> {
//! let credentials = SessionCredentials {
//!     cookie: "...".into(),
//!     csrf_token: "crmcsrfparam=...".into(),
//!     org_id: "123".into(),
//! };
//! let transport = HttpTransport::new(&credentials, Duration::from_secs(30))?;
//! let controller = FetchController::new(transport, TokioPacer, FetchPolicy::default())?;
//!
//! let batch = vec![FetchDescriptor::new("fn-1", "https://crm.zoho.com/crm/v2/settings/functions/1")];
//! let report = controller.run("functions", batch).await.into_result()?;
//! println!("{} fetched", report.success_count());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

mod controller;
mod error;
mod pacer;
mod policy;
mod state;
mod transport;

pub mod testing;

pub use controller::{
    BatchAbort, BatchReport, FailureKind, FetchController, ItemFailure, ItemOutcome, ItemReport,
};
pub use error::FetchError;
pub use pacer::{Pacer, PauseReason, TokioPacer};
pub use policy::FetchPolicy;
pub use state::{FetchMode, FetchState};
pub use transport::{
    classify_response, FetchDescriptor, FetchOutcome, HttpTransport, SessionCredentials, Transport,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for driving a fetch batch
    pub use crate::{
        BatchReport, FetchController, FetchDescriptor, FetchError, FetchOutcome, FetchPolicy,
        Pacer, PauseReason, Transport,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
