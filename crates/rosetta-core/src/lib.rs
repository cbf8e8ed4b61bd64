//! Rosetta Core
//!
//! Data model shared by every stage of the field correlation pipeline.
//!
//! # Core Concepts
//!
//! - [`FieldReference`]: one spelling of a field as emitted by one construct
//! - [`FieldCatalogEntry`]: one row of the authoritative module schema
//! - [`FieldIdentity`]: the canonical field a reference resolves to
//! - [`SourceKind`] / [`RawKey`]: which subsystem spoke, and which spelling it used
//!
//! # Example
//!
//! ```rust
//! use rosetta_core::{FieldReference, RawKey, SourceKind};
//!
//! let reference = FieldReference::builder(SourceKind::Workflow, "Stage Sync")
//!     .construct_id("42")
//!     .key(RawKey::ApiName, "Stage")
//!     .target_value("Closed Won")
//!     .module("Deals")
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(reference.key(RawKey::ApiName), Some("Stage"));
//! ```

#![warn(unreachable_pub)]

mod error;
mod field;
mod kind;
mod reference;

pub use error::ModelError;
pub use field::{FieldCatalogEntry, FieldIdentity, IdentityKey};
pub use kind::{Confidence, RawKey, SourceKind, UsageKind};
pub use reference::{FieldReference, FieldReferenceBuilder};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the field model
    pub use crate::{
        Confidence, FieldCatalogEntry, FieldIdentity, FieldReference, IdentityKey, RawKey,
        SourceKind, UsageKind,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
