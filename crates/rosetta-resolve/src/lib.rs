//! Rosetta Resolve
//!
//! Collapses field references from every subsystem into canonical field
//! identities using the module schema as the source of truth.
//!
//! # Example
//!
//! ```rust
//! use rosetta_core::{FieldCatalogEntry, FieldReference, RawKey, SourceKind};
//! use rosetta_resolve::{FieldCatalog, IdentityResolver};
//!
//! let catalog = FieldCatalog::from_entries([
//!     FieldCatalogEntry::new("Deals", "Stage", "Stage").with_field_id("F1"),
//! ])
//! .unwrap();
//!
//! let reference = FieldReference::builder(SourceKind::Blueprint, "Qualify")
//!     .key(RawKey::Label, "Stage")
//!     .module("Potentials")
//!     .build()
//!     .unwrap();
//!
//! let resolution = IdentityResolver::new(&catalog).resolve([&reference]);
//! assert_eq!(resolution.identities.len(), 1);
//! assert!(resolution.unresolved.is_empty());
//! ```

#![warn(unreachable_pub)]

mod catalog;
mod error;
mod resolver;

pub use catalog::FieldCatalog;
pub use error::CatalogError;
pub use resolver::{CatalogMatch, IdentityResolver, Resolution, ResolutionStats, ResolvedIdentity};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for resolving references
    pub use crate::{FieldCatalog, IdentityResolver, Resolution, ResolvedIdentity};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
