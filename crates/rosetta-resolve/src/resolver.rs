//! Identity resolution
//!
//! Maps each [`FieldReference`] onto catalog rows by trying its spellings in
//! authority order:
//!
//! 1. field id within the module, then the org-wide id index
//! 2. column name within the module
//! 3. API name within the module
//! 4. label within the module (may match several rows)
//!
//! The first spelling that matches anything decides the result. A reference
//! matching several rows is attached to each of them and the identities are
//! flagged ambiguous. A reference matching nothing is kept verbatim in
//! [`Resolution::unresolved`].

use crate::catalog::FieldCatalog;
use indexmap::IndexMap;
use rosetta_core::{FieldIdentity, FieldReference, IdentityKey, RawKey};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// Catalog rows one reference resolved to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogMatch {
    /// Spelling that produced the match
    pub matched_by: RawKey,
    /// Catalog row positions, in catalog order
    pub entries: Vec<usize>,
}

impl CatalogMatch {
    /// Whether more than one row matched
    #[inline]
    #[must_use]
    pub fn is_ambiguous(&self) -> bool {
        self.entries.len() > 1
    }
}

/// One canonical field and every reference attached to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    /// Canonical field
    pub identity: FieldIdentity,
    /// Catalog data type
    pub data_type: Option<String>,
    /// Set when any attached reference matched more than one row
    pub ambiguous: bool,
    /// Attached references in first-seen order
    pub references: Vec<FieldReference>,
}

/// Counters for one resolution pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionStats {
    /// Distinct references seen
    pub total: usize,
    /// References matched to at least one row
    pub resolved: usize,
    /// References matched to more than one row
    pub ambiguous: usize,
    /// References matched to nothing
    pub unresolved: usize,
    /// Resolved references per deciding spelling
    pub by_key: BTreeMap<RawKey, usize>,
}

/// Output of [`IdentityResolver::resolve`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Identities keyed by merge key, in first-seen order
    pub identities: IndexMap<IdentityKey, ResolvedIdentity>,
    /// References that matched no catalog row
    pub unresolved: Vec<FieldReference>,
    /// Counters
    pub stats: ResolutionStats,
}

impl Resolution {
    /// Identity for a merge key
    #[must_use]
    pub fn get(&self, key: &IdentityKey) -> Option<&ResolvedIdentity> {
        self.identities.get(key)
    }

    /// Identities whose catalog API name is `api_name`
    pub fn by_api_name<'a>(
        &'a self,
        api_name: &'a str,
    ) -> impl Iterator<Item = &'a ResolvedIdentity> + 'a {
        self.identities
            .values()
            .filter(move |resolved| resolved.identity.api_name == api_name)
    }
}

/// Resolves references against a [`FieldCatalog`]
#[derive(Debug, Clone, Copy)]
pub struct IdentityResolver<'a> {
    catalog: &'a FieldCatalog,
}

impl<'a> IdentityResolver<'a> {
    /// Create a resolver over a materialized catalog
    #[inline]
    #[must_use]
    pub fn new(catalog: &'a FieldCatalog) -> Self {
        Self { catalog }
    }

    /// Catalog being resolved against
    #[inline]
    #[must_use]
    pub fn catalog(&self) -> &'a FieldCatalog {
        self.catalog
    }

    /// Resolve a batch of references
    ///
    /// Identical references are counted once.
    pub fn resolve<'r>(&self, references: impl IntoIterator<Item = &'r FieldReference>) -> Resolution {
        let mut resolution = Resolution::default();
        let mut seen: HashSet<&FieldReference> = HashSet::new();

        for reference in references {
            if !seen.insert(reference) {
                continue;
            }
            resolution.stats.total += 1;

            let Some(found) = self.resolve_one(reference) else {
                tracing::debug!(
                    "unresolved {} reference {}={} from '{}'",
                    reference.source_kind(),
                    reference.raw_key(),
                    reference.raw_value(),
                    reference.construct_name()
                );
                resolution.stats.unresolved += 1;
                resolution.unresolved.push(reference.clone());
                continue;
            };

            resolution.stats.resolved += 1;
            *resolution.stats.by_key.entry(found.matched_by).or_default() += 1;
            let ambiguous = found.is_ambiguous();
            if ambiguous {
                resolution.stats.ambiguous += 1;
                tracing::warn!(
                    "{} '{}' from {} '{}' matches {} fields",
                    found.matched_by,
                    reference.key(found.matched_by).unwrap_or_default(),
                    reference.source_kind(),
                    reference.construct_name(),
                    found.entries.len()
                );
            }

            for index in found.entries {
                let Some(entry) = self.catalog.get(index) else {
                    continue;
                };
                let identity = entry.identity();
                let resolved = resolution
                    .identities
                    .entry(identity.key())
                    .or_insert_with(|| ResolvedIdentity {
                        identity,
                        data_type: entry.data_type.clone(),
                        ambiguous: false,
                        references: Vec::new(),
                    });
                resolved.ambiguous |= ambiguous;
                resolved.references.push(reference.clone());
            }
        }

        tracing::info!(
            "resolved {}/{} references into {} fields ({} ambiguous, {} unresolved)",
            resolution.stats.resolved,
            resolution.stats.total,
            resolution.identities.len(),
            resolution.stats.ambiguous,
            resolution.stats.unresolved
        );
        resolution
    }

    /// Catalog rows for one reference, `None` when nothing matches
    ///
    /// A module hint that names neither a catalog module nor an alias of one
    /// only gets the org-wide id lookup. A reference without a hint is
    /// searched in every module.
    #[must_use]
    pub fn resolve_one(&self, reference: &FieldReference) -> Option<CatalogMatch> {
        let scope: Vec<&str> = match reference.module_hint() {
            Some(hint) => self.catalog.canonical_module(hint).into_iter().collect(),
            None => self.catalog.modules().collect(),
        };

        for (key, value) in reference.keys() {
            let mut entries: Vec<usize> = scope
                .iter()
                .flat_map(|module| self.catalog.lookup(module, key, value))
                .collect();
            if entries.is_empty() && key == RawKey::FieldId {
                entries.extend(self.catalog.lookup_global_id(value));
            }
            if !entries.is_empty() {
                entries.sort_unstable();
                entries.dedup();
                return Some(CatalogMatch {
                    matched_by: key,
                    entries,
                });
            }
        }
        None
    }
}
