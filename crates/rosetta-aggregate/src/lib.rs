//! Rosetta Aggregate
//!
//! Final stage of the pipeline: one record per canonical field listing every
//! construct that modifies or reads it, grouped by subsystem.
//!
//! # Output
//!
//! ```json
//! {
//!   "generated_at": "2024-01-01T00:00:00Z",
//!   "summary": {"entries": 1, "...": "..."},
//!   "fields": {
//!     "Potentials:F1": {
//!       "module": "Potentials", "field_id": "F1", "label": "Stage",
//!       "modified_by": {"blueprint": ["Deal Pipeline > Qualify"], "workflow": ["Stage Sync"]},
//!       "read_by": {}, "ambiguous": false, "candidate_only": false
//!     }
//!   },
//!   "unmapped": []
//! }
//! ```
//!
//! # Example
//!
//! ```rust
//! use rosetta_aggregate::RosettaAggregator;
//! use rosetta_core::{FieldCatalogEntry, FieldReference, RawKey, SourceKind};
//! use rosetta_resolve::{FieldCatalog, IdentityResolver};
//!
//! let catalog = FieldCatalog::from_entries([
//!     FieldCatalogEntry::new("Deals", "Stage", "Stage").with_field_id("F1"),
//! ])
//! .unwrap();
//! let reference = FieldReference::builder(SourceKind::Workflow, "Stage Sync")
//!     .key(RawKey::ApiName, "Stage")
//!     .module("Deals")
//!     .build()
//!     .unwrap();
//!
//! let resolution = IdentityResolver::new(&catalog).resolve([&reference]);
//! let map = RosettaAggregator::new().aggregate(&resolution);
//! assert_eq!(map.summary.entries, 1);
//! ```

#![warn(unreachable_pub)]

mod aggregator;
mod entry;

pub use aggregator::{RosettaAggregator, RosettaMap, RosettaSummary};
pub use entry::{ConstructsByKind, RosettaEntry};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for building the Rosetta map
    pub use crate::{RosettaAggregator, RosettaEntry, RosettaMap};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
