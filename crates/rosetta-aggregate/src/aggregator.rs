//! Resolution to Rosetta map

use crate::entry::RosettaEntry;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use rosetta_core::{FieldReference, SourceKind};
use rosetta_resolve::{FieldCatalog, Resolution};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// Headline counts for a Rosetta map
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RosettaSummary {
    /// Entries emitted
    pub entries: usize,
    /// Entries flagged ambiguous
    pub ambiguous_entries: usize,
    /// Catalog fields no construct touches
    pub unreferenced_entries: usize,
    /// References that matched no field
    pub unmapped_references: usize,
    /// Distinct references per source kind, mapped or not
    pub references_by_kind: BTreeMap<SourceKind, usize>,
}

/// Final per-field correlation output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RosettaMap {
    /// Generation time
    pub generated_at: DateTime<Utc>,
    /// Headline counts
    pub summary: RosettaSummary,
    /// Entries keyed by identity key, ordered by module, API name, label, id
    pub fields: IndexMap<String, RosettaEntry>,
    /// References that matched no catalog field
    pub unmapped: Vec<FieldReference>,
}

impl RosettaMap {
    /// Entry by rendered identity key
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&RosettaEntry> {
        self.fields.get(key)
    }

    /// Entries whose API name is `api_name`
    pub fn by_api_name<'a>(&'a self, api_name: &'a str) -> impl Iterator<Item = &'a RosettaEntry> + 'a {
        self.fields
            .values()
            .filter(move |entry| entry.api_name == api_name)
    }

    /// Pretty JSON document
    ///
    /// # Errors
    /// Returns the serializer error, which only occurs for non-string map keys.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Builds a [`RosettaMap`] from a [`Resolution`]
#[derive(Debug, Clone, Copy, Default)]
pub struct RosettaAggregator<'a> {
    catalog: Option<&'a FieldCatalog>,
}

impl<'a> RosettaAggregator<'a> {
    /// Aggregator that only emits referenced fields
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self { catalog: None }
    }

    /// Also emit an empty entry for every catalog field nothing references
    #[inline]
    #[must_use]
    pub fn with_catalog(mut self, catalog: &'a FieldCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Aggregate, stamped with the current time
    #[must_use]
    pub fn aggregate(&self, resolution: &Resolution) -> RosettaMap {
        self.aggregate_at(resolution, Utc::now())
    }

    /// Aggregate with an explicit timestamp
    #[must_use]
    pub fn aggregate_at(&self, resolution: &Resolution, generated_at: DateTime<Utc>) -> RosettaMap {
        let mut entries: Vec<RosettaEntry> = resolution
            .identities
            .values()
            .map(|resolved| {
                let mut entry =
                    RosettaEntry::new(resolved.identity.clone(), resolved.data_type.clone());
                entry.ambiguous = resolved.ambiguous;
                entry.absorb(&resolved.references);
                entry
            })
            .collect();

        if let Some(catalog) = self.catalog {
            let present: HashSet<_> = resolution.identities.keys().cloned().collect();
            entries.extend(
                catalog
                    .entries()
                    .iter()
                    .filter(|row| !present.contains(&row.identity().key()))
                    .map(|row| RosettaEntry::new(row.identity(), row.data_type.clone())),
            );
        }

        entries.sort_by(|a, b| {
            a.sort_key()
                .cmp(&b.sort_key())
                .then_with(|| a.key().cmp(b.key()))
        });

        let mut references_by_kind = BTreeMap::new();
        let distinct: HashSet<&FieldReference> = resolution
            .identities
            .values()
            .flat_map(|resolved| resolved.references.iter())
            .chain(resolution.unresolved.iter())
            .collect();
        for reference in distinct {
            *references_by_kind.entry(reference.source_kind()).or_insert(0) += 1;
        }

        let summary = RosettaSummary {
            entries: entries.len(),
            ambiguous_entries: entries.iter().filter(|e| e.ambiguous).count(),
            unreferenced_entries: entries.iter().filter(|e| e.is_unreferenced()).count(),
            unmapped_references: resolution.unresolved.len(),
            references_by_kind,
        };

        tracing::info!(
            "rosetta map: {} fields ({} ambiguous, {} unreferenced), {} unmapped references",
            summary.entries,
            summary.ambiguous_entries,
            summary.unreferenced_entries,
            summary.unmapped_references
        );

        let mut fields = IndexMap::with_capacity(entries.len());
        for entry in entries {
            let key = entry.key().to_string();
            if fields.contains_key(&key) {
                tracing::warn!("duplicate identity key {key}; keeping the first entry");
                continue;
            }
            fields.insert(key, entry);
        }

        let mut unmapped = resolution.unresolved.clone();
        unmapped.sort();

        RosettaMap {
            generated_at,
            summary,
            fields,
            unmapped,
        }
    }
}
