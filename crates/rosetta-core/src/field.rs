//! Field catalog rows and canonical identities
//!
//! A [`FieldCatalogEntry`] is what the module schema says a field is. A
//! [`FieldIdentity`] is what a resolved reference points at. Both share the
//! same four spellings; the identity drops the data type and gains a stable
//! [`IdentityKey`].

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// One row of the authoritative module schema
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldCatalogEntry {
    /// Owning module API name (e.g. `Deals`)
    pub module: String,
    /// Opaque numeric id, unique within a module when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_id: Option<String>,
    /// Display label
    #[serde(default)]
    pub label: String,
    /// API name
    #[serde(default)]
    pub api_name: String,
    /// Storage column name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_name: Option<String>,
    /// Declared data type (e.g. `picklist`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
}

impl FieldCatalogEntry {
    /// Create an entry with module, label, and API name
    #[inline]
    #[must_use]
    pub fn new(
        module: impl Into<String>,
        label: impl Into<String>,
        api_name: impl Into<String>,
    ) -> Self {
        Self {
            module: module.into(),
            field_id: None,
            label: label.into(),
            api_name: api_name.into(),
            column_name: None,
            data_type: None,
        }
    }

    /// Set field id
    #[inline]
    #[must_use]
    pub fn with_field_id(mut self, field_id: impl Into<String>) -> Self {
        self.field_id = Some(field_id.into());
        self
    }

    /// Set column name
    #[inline]
    #[must_use]
    pub fn with_column_name(mut self, column_name: impl Into<String>) -> Self {
        self.column_name = Some(column_name.into());
        self
    }

    /// Set data type
    #[inline]
    #[must_use]
    pub fn with_data_type(mut self, data_type: impl Into<String>) -> Self {
        self.data_type = Some(data_type.into());
        self
    }

    /// Canonical identity of this row
    #[must_use]
    pub fn identity(&self) -> FieldIdentity {
        FieldIdentity {
            module: self.module.clone(),
            field_id: self.field_id.clone(),
            label: self.label.clone(),
            api_name: self.api_name.clone(),
            column_name: self.column_name.clone(),
        }
    }
}

/// Canonical resolved field
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldIdentity {
    /// Owning module
    pub module: String,
    /// Field id, when the catalog knows it
    pub field_id: Option<String>,
    /// Display label
    pub label: String,
    /// API name
    pub api_name: String,
    /// Storage column name
    pub column_name: Option<String>,
}

impl FieldIdentity {
    /// Stable merge key: id, else API name, else column
    #[must_use]
    pub fn key(&self) -> IdentityKey {
        if let Some(id) = self.field_id.as_deref().filter(|id| !id.is_empty()) {
            return IdentityKey::Id(self.module.clone(), id.to_string());
        }
        if !self.api_name.is_empty() {
            return IdentityKey::ApiName(self.module.clone(), self.api_name.clone());
        }
        IdentityKey::Column(
            self.module.clone(),
            self.column_name.clone().unwrap_or_default(),
        )
    }

    /// Tuple used to order serialized entries
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

/// Key two references must share to be merged into one identity
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IdentityKey {
    /// `(module, field_id)`
    Id(String, String),
    /// `(module, api_name)`
    ApiName(String, String),
    /// `(module, column_name)`
    Column(String, String),
}

impl IdentityKey {
    /// Module half of the key
    #[inline]
    #[must_use]
    pub fn module(&self) -> &str {
        match self {
            Self::Id(module, _) | Self::ApiName(module, _) | Self::Column(module, _) => module,
        }
    }
}

impl Display for IdentityKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(module, id) => write!(f, "{module}:{id}"),
            Self::ApiName(module, api) => write!(f, "{module}:api:{api}"),
            Self::Column(module, column) => write!(f, "{module}:column:{column}"),
        }
    }
}

impl Serialize for IdentityKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage() -> FieldCatalogEntry {
        FieldCatalogEntry::new("Deals", "Stage", "Stage")
            .with_field_id("F1")
            .with_column_name("STAGE")
            .with_data_type("picklist")
    }

    #[test]
    fn identity_prefers_field_id() {
        let key = stage().identity().key();
        assert_eq!(key, IdentityKey::Id("Deals".into(), "F1".into()));
        assert_eq!(key.to_string(), "Deals:F1");
    }

    #[test]
    fn identity_falls_back_to_api_then_column() {
        let mut entry = FieldCatalogEntry::new("Deals", "Stage", "Stage");
        assert_eq!(entry.identity().key().to_string(), "Deals:api:Stage");

        entry.api_name.clear();
        entry.column_name = Some("STAGE".into());
        assert_eq!(entry.identity().key().to_string(), "Deals:column:STAGE");
    }

    #[test]
    fn empty_field_id_is_ignored() {
        let entry = FieldCatalogEntry::new("Deals", "Stage", "Stage").with_field_id("");
        assert!(matches!(entry.identity().key(), IdentityKey::ApiName(..)));
    }

    #[test]
    fn catalog_entry_deserializes_with_missing_optionals() {
        let entry: FieldCatalogEntry =
            serde_json::from_str(r#"{"module":"Leads","label":"Email","api_name":"Email"}"#)
                .unwrap();
        assert_eq!(entry.field_id, None);
        assert_eq!(entry.column_name, None);
    }

    #[test]
    fn sort_key_orders_by_module_first() {
        let a = FieldCatalogEntry::new("Accounts", "Z", "Z").identity();
        let b = FieldCatalogEntry::new("Deals", "A", "A").identity();
        assert!(a.sort_key() < b.sort_key());
    }
}
