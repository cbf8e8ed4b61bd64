//! Rosetta CLI
//!
//! Library half of the `crm-rosetta` binary.
//!
//! - `extract`: pull module schemas, workflow rules, blueprints and functions
//!   from the CRM through the paced fetch controller and persist them
//! - `analyze`: turn a persisted tree into the field Rosetta map
//!
//! Configuration is a TOML file (see [`RosettaConfig`]); credentials come
//! from an ordered list of [`CredentialSource`]s.

#![warn(unreachable_pub)]

pub mod analyze;
pub mod config;
pub mod credentials;
pub mod endpoints;
pub mod extract;
pub mod logging;
pub mod persist;

pub use analyze::{analyze, AnalysisOptions, AnalysisReport};
pub use config::{ApiConfig, ConfigError, OutputConfig, RosettaConfig};
pub use credentials::{
    resolve_credentials, CredentialError, CredentialSource, SourceLookup, SystemLookup,
};
pub use endpoints::Endpoints;
pub use extract::{ExtractionRun, RunSummary, Subsystem, SubsystemSummary};
pub use logging::init_logging;
pub use persist::DataLayout;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
