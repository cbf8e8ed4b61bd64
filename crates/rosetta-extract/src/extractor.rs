//! Extractor trait and its input/output types

use rosetta_core::{FieldReference, ModelError, SourceKind};
use serde::Serialize;
use serde_json::Value;

/// Converts one fetched document into field references
///
/// Implement this trait to support another automation subsystem.
/// Extractors never fail: whatever cannot be parsed is counted in
/// [`Extraction::skipped`] and described in [`Extraction::diagnostics`].
pub trait ReferenceExtractor: Send + Sync {
    /// Subsystem this extractor reads
    fn source_kind(&self) -> SourceKind;

    /// Extract every field reference the document carries
    fn extract(&self, document: &Value, context: &ExtractContext) -> Extraction;
}

/// What the caller knows about the construct owning a document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractContext {
    /// Construct id
    pub construct_id: String,
    /// Construct display name
    pub construct_name: String,
    /// Name of the enclosing construct (the blueprint for a transition)
    pub parent_name: Option<String>,
    /// Module the construct is declared on
    pub module: Option<String>,
}

impl ExtractContext {
    /// Create context for a construct
    #[inline]
    #[must_use]
    pub fn new(construct_id: impl Into<String>, construct_name: impl Into<String>) -> Self {
        Self {
            construct_id: construct_id.into(),
            construct_name: construct_name.into(),
            parent_name: None,
            module: None,
        }
    }

    /// Set the enclosing construct name
    #[inline]
    #[must_use]
    pub fn with_parent(mut self, parent_name: impl Into<String>) -> Self {
        self.parent_name = Some(parent_name.into());
        self
    }

    /// Set the declared module
    #[inline]
    #[must_use]
    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }
}

/// References pulled from one document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    /// Field references in document order
    pub references: Vec<FieldReference>,
    /// Entries that could not be turned into a reference
    pub skipped: usize,
    /// Why entries were skipped
    pub diagnostics: Vec<String>,
}

impl Extraction {
    /// Keep a built reference, or count the failure
    pub fn push(&mut self, reference: Result<FieldReference, ModelError>) {
        match reference {
            Ok(reference) => self.references.push(reference),
            Err(e) => self.skip(e.to_string()),
        }
    }

    /// Count an entry that was not a field reference
    pub fn skip(&mut self, reason: impl Into<String>) {
        self.skipped += 1;
        self.diagnostics.push(reason.into());
    }

    /// Fold another extraction into this one
    pub fn merge(&mut self, other: Extraction) {
        self.references.extend(other.references);
        self.skipped += other.skipped;
        self.diagnostics.extend(other.diagnostics);
    }

    /// Whether nothing was found or skipped
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.references.is_empty() && self.skipped == 0
    }
}

/// A function invoked by a workflow action or blueprint transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionCall {
    /// Function name as shown in the caller
    pub function_name: String,
    /// Function id, when given
    pub function_id: Option<String>,
    /// Calling construct
    pub caller: String,
    /// Subsystem of the caller
    pub caller_kind: SourceKind,
    /// Module the caller runs on
    pub module: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rosetta_core::RawKey;

    #[test]
    fn push_counts_failed_builds() {
        let mut extraction = Extraction::default();
        extraction.push(
            FieldReference::builder(SourceKind::Workflow, "wf")
                .key(RawKey::ApiName, "Stage")
                .build(),
        );
        extraction.push(FieldReference::builder(SourceKind::Workflow, "wf").build());

        assert_eq!(extraction.references.len(), 1);
        assert_eq!(extraction.skipped, 1);
        assert!(extraction.diagnostics[0].contains("no field key"));
    }

    #[test]
    fn merge_sums_counts() {
        let mut a = Extraction::default();
        a.skip("info entry");
        let mut b = Extraction::default();
        b.skip("noise");
        b.skip("noise");
        a.merge(b);
        assert_eq!(a.skipped, 3);
        assert_eq!(a.diagnostics.len(), 3);
        assert!(!a.is_empty());
    }
}
