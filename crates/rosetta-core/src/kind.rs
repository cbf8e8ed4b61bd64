//! Small classification enums used across the model

use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Subsystem a reference was extracted from
///
/// Variant order is alphabetical; serialized output sorts on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Blueprint transition
    Blueprint,
    /// Standalone script
    Function,
    /// Workflow rule
    Workflow,
}

impl SourceKind {
    /// Every source kind, in serialization order
    pub const ALL: [SourceKind; 3] = [Self::Blueprint, Self::Function, Self::Workflow];

    /// Stable lowercase name
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Blueprint => "blueprint",
            Self::Function => "function",
            Self::Workflow => "workflow",
        }
    }
}

impl Display for SourceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "blueprint" | "blueprints" => Ok(Self::Blueprint),
            "function" | "functions" => Ok(Self::Function),
            "workflow" | "workflows" => Ok(Self::Workflow),
            other => Err(ModelError::UnknownSourceKind(other.to_string())),
        }
    }
}

/// Spelling of a field reference
///
/// Ordered by authority: a field id outranks a column name, which outranks an
/// API name, which outranks a display label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawKey {
    /// Opaque numeric field id
    FieldId,
    /// Storage column name (e.g. `POTENTIALCF156`)
    ColumnName,
    /// API name (e.g. `Flag_Reason`)
    ApiName,
    /// Display label (e.g. `Flag Reason`)
    Label,
}

impl RawKey {
    /// Every key, most authoritative first
    pub const BY_AUTHORITY: [RawKey; 4] = [Self::FieldId, Self::ColumnName, Self::ApiName, Self::Label];

    /// Stable snake_case name
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FieldId => "field_id",
            Self::ColumnName => "column_name",
            Self::ApiName => "api_name",
            Self::Label => "label",
        }
    }
}

impl Display for RawKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RawKey {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "field_id" | "id" => Ok(Self::FieldId),
            "column_name" | "column" => Ok(Self::ColumnName),
            "api_name" => Ok(Self::ApiName),
            "label" | "field_label" => Ok(Self::Label),
            other => Err(ModelError::UnknownRawKey(other.to_string())),
        }
    }
}

/// How a construct touches a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageKind {
    /// Value set by automation
    #[default]
    Write,
    /// Presented for manual entry during a blueprint transition
    Entry,
    /// Evaluated in a condition or read by a script
    Read,
}

impl UsageKind {
    /// Whether this usage changes the field's value
    #[inline]
    #[must_use]
    pub fn is_modification(self) -> bool {
        matches!(self, Self::Write | Self::Entry)
    }
}

/// How sure the extractor is that the token names a real field
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// Taken from a structured document entry
    #[default]
    Certain,
    /// Found by scanning free-form script text
    Candidate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_kind_orders_alphabetically() {
        let mut kinds = vec![SourceKind::Workflow, SourceKind::Blueprint, SourceKind::Function];
        kinds.sort();
        assert_eq!(kinds, SourceKind::ALL.to_vec());
    }

    #[test]
    fn source_kind_parses_plural_forms() {
        assert_eq!("workflows".parse::<SourceKind>().unwrap(), SourceKind::Workflow);
        assert_eq!(" Blueprint ".parse::<SourceKind>().unwrap(), SourceKind::Blueprint);
        assert!("approvals".parse::<SourceKind>().is_err());
    }

    #[test]
    fn raw_key_authority_order() {
        assert!(RawKey::FieldId < RawKey::ColumnName);
        assert!(RawKey::ColumnName < RawKey::ApiName);
        assert!(RawKey::ApiName < RawKey::Label);
        assert_eq!(RawKey::BY_AUTHORITY[0], RawKey::FieldId);
    }

    #[test]
    fn serde_names_are_snake_case() {
        assert_eq!(serde_json::to_string(&RawKey::ColumnName).unwrap(), "\"column_name\"");
        assert_eq!(serde_json::to_string(&SourceKind::Function).unwrap(), "\"function\"");
        assert_eq!(serde_json::to_string(&Confidence::Candidate).unwrap(), "\"candidate\"");
    }

    #[test]
    fn only_write_and_entry_modify() {
        assert!(UsageKind::Write.is_modification());
        assert!(UsageKind::Entry.is_modification());
        assert!(!UsageKind::Read.is_modification());
    }
}
