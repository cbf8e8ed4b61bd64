//! Per-field Rosetta records

use indexmap::{IndexMap, IndexSet};
use rosetta_core::{Confidence, FieldIdentity, FieldReference, IdentityKey, SourceKind};
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};

/// Construct names per source kind, in first-seen order
pub type ConstructsByKind = IndexMap<SourceKind, IndexSet<String>>;

/// Everything known about one field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RosettaEntry {
    #[serde(skip)]
    key: IdentityKey,
    /// Module API name
    pub module: String,
    /// Field id
    pub field_id: Option<String>,
    /// Display label
    pub label: String,
    /// API name
    pub api_name: String,
    /// Storage column
    pub column_name: Option<String>,
    /// Catalog data type
    pub data_type: Option<String>,
    /// Constructs that write or prompt for the field
    #[serde(serialize_with = "sorted_constructs")]
    pub modified_by: ConstructsByKind,
    /// Constructs that only read the field
    #[serde(serialize_with = "sorted_constructs")]
    pub read_by: ConstructsByKind,
    /// Some reference matched this field and at least one other
    pub ambiguous: bool,
    /// Every contributing reference came from a script scan
    pub candidate_only: bool,
}

impl RosettaEntry {
    /// Empty entry for an identity
    #[must_use]
    pub fn new(identity: FieldIdentity, data_type: Option<String>) -> Self {
        Self {
            key: identity.key(),
            module: identity.module,
            field_id: identity.field_id,
            label: identity.label,
            api_name: identity.api_name,
            column_name: identity.column_name,
            data_type,
            modified_by: IndexMap::new(),
            read_by: IndexMap::new(),
            ambiguous: false,
            candidate_only: false,
        }
    }

    /// Merge key
    #[inline]
    #[must_use]
    pub fn key(&self) -> &IdentityKey {
        &self.key
    }

    /// Whether no construct touches the field
    #[inline]
    #[must_use]
    pub fn is_unreferenced(&self) -> bool {
        self.modified_by.is_empty() && self.read_by.is_empty()
    }

    /// Constructs of `kind` that modify the field
    pub fn modifiers(&self, kind: SourceKind) -> impl Iterator<Item = &str> {
        self.modified_by
            .get(&kind)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// Constructs of `kind` that read the field
    pub fn readers(&self, kind: SourceKind) -> impl Iterator<Item = &str> {
        self.read_by
            .get(&kind)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// Fold references into the entry
    pub fn absorb<'r>(&mut self, references: impl IntoIterator<Item = &'r FieldReference>) {
        let was_empty = self.is_unreferenced();
        let mut all_candidates = true;
        let mut any = false;

        for reference in references {
            any = true;
            all_candidates &= reference.confidence() == Confidence::Candidate;
            let target = if reference.usage().is_modification() {
                &mut self.modified_by
            } else {
                &mut self.read_by
            };
            target
                .entry(reference.source_kind())
                .or_default()
                .insert(reference.construct_name().to_string());
        }

        if any {
            self.candidate_only = if was_empty {
                all_candidates
            } else {
                self.candidate_only && all_candidates
            };
        }
    }

    /// Tuple used to order entries
    #[must_use]
    pub fn sort_key(&self) -> (&str, &str, &str, &str) {
        (
            self.module.as_str(),
            self.api_name.as_str(),
            self.label.as_str(),
            self.field_id.as_deref().unwrap_or(""),
        )
    }
}

fn sorted_constructs<S: Serializer>(map: &ConstructsByKind, serializer: S) -> Result<S::Ok, S::Error> {
    let sorted: BTreeMap<SourceKind, BTreeSet<&str>> = map
        .iter()
        .map(|(kind, names)| (*kind, names.iter().map(String::as_str).collect()))
        .collect();
    sorted.serialize(serializer)
}
