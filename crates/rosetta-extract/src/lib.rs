//! Rosetta Extract
//!
//! Turns fetched CRM documents into normalized field references.
//!
//! # Extractors
//!
//! | subsystem  | primary spelling       | usage            |
//! |------------|------------------------|------------------|
//! | workflows  | API name               | write, read      |
//! | blueprints | label (+ id, column)   | write, entry     |
//! | functions  | API name (candidate)   | write, read      |
//!
//! Module schema documents are not references; [`parse_module_document`]
//! turns them into catalog rows for the resolver.
//!
//! # Example
//!
//! ```rust
//! use rosetta_extract::{ExtractContext, ReferenceExtractor, WorkflowExtractor};
//! use serde_json::json;
//!
//! let rule = json!({
//!     "id": "1", "name": "Stage Sync", "module": {"api_name": "Deals"},
//!     "conditions": [{"instant_actions": {"actions": [
//!         {"type": "field_updates", "field_api_name": "Stage", "field_value": "Closed Won"}
//!     ]}}]
//! });
//! let extraction = WorkflowExtractor.extract(&rule, &ExtractContext::default());
//! assert_eq!(extraction.references.len(), 1);
//! ```

#![warn(unreachable_pub)]

mod extractor;

pub mod blueprints;
pub mod functions;
pub mod json;
pub mod modules;
pub mod workflows;

pub use blueprints::BlueprintExtractor;
pub use extractor::{ExtractContext, Extraction, FunctionCall, ReferenceExtractor};
pub use functions::FunctionExtractor;
pub use modules::{is_extractable_module, parse_module_document, ModuleFields};
pub use workflows::WorkflowExtractor;

use rosetta_core::SourceKind;

/// Extractor for a source kind
#[must_use]
pub fn extractor_for(kind: SourceKind) -> &'static dyn ReferenceExtractor {
    match kind {
        SourceKind::Blueprint => &BlueprintExtractor,
        SourceKind::Function => &FunctionExtractor,
        SourceKind::Workflow => &WorkflowExtractor,
    }
}

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for extracting references
    pub use crate::{
        extractor_for, BlueprintExtractor, ExtractContext, Extraction, FunctionExtractor,
        ReferenceExtractor, WorkflowExtractor,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
