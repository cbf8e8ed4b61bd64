//! Field catalog index
//!
//! Indexes every catalog row per module by each spelling the resolver may
//! look up. Labels are not unique within a module, so the label index is
//! multi-valued. Field ids are unique within a module (enforced) and, on the
//! CRM side, unique across the org, so a global id index is kept as well.

use crate::error::CatalogError;
use indexmap::IndexMap;
use rosetta_core::{FieldCatalogEntry, RawKey};
use std::collections::HashMap;

/// Module names the CRM uses interchangeably
const DEFAULT_ALIASES: &[(&str, &str)] = &[
    ("Potentials", "Deals"),
    ("Salesorders", "Sales_Orders"),
    ("SalesOrders", "Sales_Orders"),
    ("Purchaseorders", "Purchase_Orders"),
];

#[derive(Debug, Clone, Default)]
struct ModuleIndex {
    by_id: HashMap<String, usize>,
    by_column: HashMap<String, usize>,
    by_api: HashMap<String, usize>,
    by_label: HashMap<String, Vec<usize>>,
}

/// Read-only index over the authoritative field schema
#[derive(Debug, Clone, Default)]
pub struct FieldCatalog {
    entries: Vec<FieldCatalogEntry>,
    modules: IndexMap<String, ModuleIndex>,
    by_global_id: HashMap<String, usize>,
    aliases: HashMap<String, String>,
}

impl FieldCatalog {
    /// Create empty catalog with the default module aliases
    #[must_use]
    pub fn new() -> Self {
        let mut catalog = Self::default();
        for (from, to) in DEFAULT_ALIASES {
            catalog.aliases.insert((*from).to_string(), (*to).to_string());
        }
        catalog
    }

    /// Build a catalog from rows
    ///
    /// # Errors
    /// Returns the first [`CatalogError`] encountered.
    pub fn from_entries(
        entries: impl IntoIterator<Item = FieldCatalogEntry>,
    ) -> Result<Self, CatalogError> {
        let mut catalog = Self::new();
        for entry in entries {
            catalog.insert(entry)?;
        }
        Ok(catalog)
    }

    /// Add an alias from a raw module name to a catalog module
    #[must_use]
    pub fn with_alias(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.aliases.insert(from.into(), to.into());
        self
    }

    /// Index one row
    ///
    /// A repeated column or API name within a module keeps the first row.
    ///
    /// # Errors
    /// - [`CatalogError::DuplicateFieldId`] if the module already has the id
    /// - [`CatalogError::MissingModule`] if the row has no module
    pub fn insert(&mut self, entry: FieldCatalogEntry) -> Result<(), CatalogError> {
        if entry.module.trim().is_empty() {
            return Err(CatalogError::MissingModule {
                api_name: entry.api_name,
            });
        }

        let index = self.entries.len();
        let module = self.modules.entry(entry.module.clone()).or_default();

        if let Some(id) = entry.field_id.as_deref().filter(|id| !id.is_empty()) {
            if module.by_id.contains_key(id) {
                return Err(CatalogError::DuplicateFieldId {
                    module: entry.module,
                    field_id: id.to_string(),
                });
            }
            module.by_id.insert(id.to_string(), index);
            if let Some(previous) = self.by_global_id.get(id) {
                tracing::warn!(
                    "field id {id} appears in {} and {}; keeping the first",
                    self.entries[*previous].module,
                    entry.module
                );
            } else {
                self.by_global_id.insert(id.to_string(), index);
            }
        }

        if let Some(column) = entry.column_name.as_deref().filter(|c| !c.is_empty()) {
            module.by_column.entry(column.to_string()).or_insert(index);
        }
        if !entry.api_name.is_empty() {
            module.by_api.entry(entry.api_name.clone()).or_insert(index);
        }
        if !entry.label.is_empty() {
            module
                .by_label
                .entry(entry.label.clone())
                .or_default()
                .push(index);
        }

        self.entries.push(entry);
        Ok(())
    }

    /// All rows in insertion order
    #[inline]
    #[must_use]
    pub fn entries(&self) -> &[FieldCatalogEntry] {
        &self.entries
    }

    /// Row by position
    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&FieldCatalogEntry> {
        self.entries.get(index)
    }

    /// Module names in first-seen order
    pub fn modules(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    /// Number of rows
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog has no rows
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Catalog module a raw module name refers to
    ///
    /// The raw name wins when it is itself a catalog module; the alias is
    /// only consulted otherwise.
    #[must_use]
    pub fn canonical_module<'a>(&'a self, raw: &'a str) -> Option<&'a str> {
        if self.modules.contains_key(raw) {
            return Some(raw);
        }
        self.aliases
            .get(raw)
            .map(String::as_str)
            .filter(|target| self.modules.contains_key(*target))
    }

    /// Rows in `module` whose `key` spelling equals `value`
    #[must_use]
    pub fn lookup(&self, module: &str, key: RawKey, value: &str) -> Vec<usize> {
        let Some(index) = self.modules.get(module) else {
            return Vec::new();
        };
        match key {
            RawKey::FieldId => index.by_id.get(value).copied().into_iter().collect(),
            RawKey::ColumnName => index.by_column.get(value).copied().into_iter().collect(),
            RawKey::ApiName => index.by_api.get(value).copied().into_iter().collect(),
            RawKey::Label => index.by_label.get(value).cloned().unwrap_or_default(),
        }
    }

    /// Row with `field_id` in any module
    #[must_use]
    pub fn lookup_global_id(&self, field_id: &str) -> Option<usize> {
        self.by_global_id.get(field_id).copied()
    }
}
