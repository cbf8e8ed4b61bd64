//! Field references emitted by extractors

use crate::error::ModelError;
use crate::kind::{Confidence, RawKey, SourceKind, UsageKind};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// One spelling of a field as emitted by one construct
///
/// Immutable once built. The primary spelling is the one the subsystem used
/// for the field; any other spellings found in the same document entry are
/// kept in `alternate_keys` so the resolver can try the more authoritative
/// ones first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldReference {
    source_kind: SourceKind,
    construct_id: String,
    construct_name: String,
    raw_key: RawKey,
    raw_value: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    alternate_keys: BTreeMap<RawKey, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    target_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    module_hint: Option<String>,
    #[serde(default)]
    usage: UsageKind,
    #[serde(default)]
    confidence: Confidence,
}

impl FieldReference {
    /// Start building a reference for a construct
    #[inline]
    #[must_use]
    pub fn builder(
        source_kind: SourceKind,
        construct_name: impl Into<String>,
    ) -> FieldReferenceBuilder {
        FieldReferenceBuilder::new(source_kind, construct_name)
    }

    /// Subsystem that emitted the reference
    #[inline]
    #[must_use]
    pub fn source_kind(&self) -> SourceKind {
        self.source_kind
    }

    /// Id of the owning construct
    #[inline]
    #[must_use]
    pub fn construct_id(&self) -> &str {
        &self.construct_id
    }

    /// Display name of the owning construct
    #[inline]
    #[must_use]
    pub fn construct_name(&self) -> &str {
        &self.construct_name
    }

    /// Primary spelling kind
    #[inline]
    #[must_use]
    pub fn raw_key(&self) -> RawKey {
        self.raw_key
    }

    /// Primary spelling value
    #[inline]
    #[must_use]
    pub fn raw_value(&self) -> &str {
        &self.raw_value
    }

    /// Spellings other than the primary one
    #[inline]
    #[must_use]
    pub fn alternate_keys(&self) -> &BTreeMap<RawKey, String> {
        &self.alternate_keys
    }

    /// Value for `key`, from the primary spelling or an alternate
    #[must_use]
    pub fn key(&self, key: RawKey) -> Option<&str> {
        if key == self.raw_key {
            return Some(&self.raw_value);
        }
        self.alternate_keys.get(&key).map(String::as_str)
    }

    /// Every spelling carried, most authoritative first
    pub fn keys(&self) -> impl Iterator<Item = (RawKey, &str)> + '_ {
        RawKey::BY_AUTHORITY
            .into_iter()
            .filter_map(move |key| self.key(key).map(|value| (key, value)))
    }

    /// Value the construct assigns, if any
    #[inline]
    #[must_use]
    pub fn target_value(&self) -> Option<&str> {
        self.target_value.as_deref()
    }

    /// Module the construct declared for this field
    #[inline]
    #[must_use]
    pub fn module_hint(&self) -> Option<&str> {
        self.module_hint.as_deref()
    }

    /// How the construct touches the field
    #[inline]
    #[must_use]
    pub fn usage(&self) -> UsageKind {
        self.usage
    }

    /// Extraction confidence
    #[inline]
    #[must_use]
    pub fn confidence(&self) -> Confidence {
        self.confidence
    }
}

/// Orders by source kind, construct name, then primary spelling
impl Ord for FieldReference {
    fn cmp(&self, other: &Self) -> Ordering {
        (
            self.source_kind,
            &self.construct_name,
            self.raw_key,
            &self.raw_value,
            &self.module_hint,
            &self.construct_id,
        )
            .cmp(&(
                other.source_kind,
                &other.construct_name,
                other.raw_key,
                &other.raw_value,
                &other.module_hint,
                &other.construct_id,
            ))
            .then_with(|| self.usage.cmp(&other.usage))
            .then_with(|| self.confidence.cmp(&other.confidence))
            .then_with(|| self.target_value.cmp(&other.target_value))
            .then_with(|| self.alternate_keys.cmp(&other.alternate_keys))
    }
}

impl PartialOrd for FieldReference {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Builder for [`FieldReference`]
///
/// The first key added becomes the primary spelling.
#[derive(Debug, Clone)]
pub struct FieldReferenceBuilder {
    source_kind: SourceKind,
    construct_id: String,
    construct_name: String,
    keys: Vec<(RawKey, String)>,
    target_value: Option<String>,
    module_hint: Option<String>,
    usage: UsageKind,
    confidence: Confidence,
}

impl FieldReferenceBuilder {
    /// Create builder
    #[inline]
    #[must_use]
    pub fn new(source_kind: SourceKind, construct_name: impl Into<String>) -> Self {
        Self {
            source_kind,
            construct_id: String::new(),
            construct_name: construct_name.into(),
            keys: Vec::new(),
            target_value: None,
            module_hint: None,
            usage: UsageKind::default(),
            confidence: Confidence::default(),
        }
    }

    /// Set construct id
    #[inline]
    #[must_use]
    pub fn construct_id(mut self, id: impl Into<String>) -> Self {
        self.construct_id = id.into();
        self
    }

    /// Add a spelling; a repeated key replaces the earlier value
    #[must_use]
    pub fn key(mut self, key: RawKey, value: impl Into<String>) -> Self {
        let value = value.into();
        match self.keys.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.keys.push((key, value)),
        }
        self
    }

    /// Add a spelling when present and non-empty
    #[must_use]
    pub fn key_opt(self, key: RawKey, value: Option<impl Into<String>>) -> Self {
        match value.map(Into::into) {
            Some(value) if !value.trim().is_empty() => self.key(key, value),
            _ => self,
        }
    }

    /// Set the assigned value
    #[inline]
    #[must_use]
    pub fn target_value(mut self, value: impl Into<String>) -> Self {
        self.target_value = Some(value.into());
        self
    }

    /// Set the assigned value when present
    #[inline]
    #[must_use]
    pub fn target_value_opt(mut self, value: Option<String>) -> Self {
        self.target_value = value;
        self
    }

    /// Set module hint; empty strings are ignored
    #[must_use]
    pub fn module(mut self, module: impl Into<String>) -> Self {
        let module = module.into();
        if !module.trim().is_empty() {
            self.module_hint = Some(module);
        }
        self
    }

    /// Set usage
    #[inline]
    #[must_use]
    pub fn usage(mut self, usage: UsageKind) -> Self {
        self.usage = usage;
        self
    }

    /// Set confidence
    #[inline]
    #[must_use]
    pub fn confidence(mut self, confidence: Confidence) -> Self {
        self.confidence = confidence;
        self
    }

    /// Build the reference
    ///
    /// # Errors
    /// Returns [`ModelError::MissingKey`] when no spelling was added and
    /// [`ModelError::EmptyKey`] when a spelling is blank.
    pub fn build(self) -> Result<FieldReference, ModelError> {
        let mut keys = self.keys.into_iter();
        let Some((raw_key, raw_value)) = keys.next() else {
            return Err(ModelError::MissingKey {
                construct: self.construct_name,
            });
        };

        let mut alternate_keys = BTreeMap::new();
        for (key, value) in std::iter::once((raw_key, raw_value.clone())).chain(keys) {
            if value.trim().is_empty() {
                return Err(ModelError::EmptyKey {
                    key: key.as_str(),
                    construct: self.construct_name,
                });
            }
            if key != raw_key {
                alternate_keys.insert(key, value);
            }
        }

        Ok(FieldReference {
            source_kind: self.source_kind,
            construct_id: self.construct_id,
            construct_name: self.construct_name,
            raw_key,
            raw_value,
            alternate_keys,
            target_value: self.target_value,
            module_hint: self.module_hint,
            usage: self.usage,
            confidence: self.confidence,
        })
    }
}
