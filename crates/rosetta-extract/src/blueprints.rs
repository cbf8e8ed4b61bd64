//! Blueprint transition extractor
//!
//! A transition document names fields three ways:
//! - `Actions.Fieldupdate[]`: label plus field id, written on transition
//! - `Fields[]`: field id only, presented for manual entry
//! - `FieldsMeta`: id to column name and label, for whatever else appears
//!
//! The blueprint's own name is not in the transition document; callers pass
//! it as the context parent.

use crate::extractor::{ExtractContext, Extraction, FunctionCall, ReferenceExtractor};
use crate::json::{array_at, get_path, module_name, text_at};
use rosetta_core::{FieldReference, FieldReferenceBuilder, RawKey, SourceKind, UsageKind};
use serde_json::Value;
use std::collections::HashMap;

/// Extracts writes from field update actions and entries from during-fields
#[derive(Debug, Clone, Copy, Default)]
pub struct BlueprintExtractor;

#[derive(Debug, Default)]
struct FieldMeta {
    column_name: Option<String>,
    label: Option<String>,
}

struct Transition {
    id: String,
    name: String,
    module: Option<String>,
    meta: HashMap<String, FieldMeta>,
}

impl Transition {
    fn from_document(document: &Value, context: &ExtractContext) -> Self {
        let id = Some(context.construct_id.trim())
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .or_else(|| text_at(document, "TransitionId"))
            .or_else(|| text_at(document, "Id"))
            .unwrap_or_default();
        let transition_name = Some(context.construct_name.trim())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .or_else(|| text_at(document, "Name"))
            .unwrap_or_else(|| format!("transition_{id}"));
        let name = match &context.parent_name {
            Some(parent) => format!("{parent} > {transition_name}"),
            None => transition_name,
        };
        let module = get_path(document, "Module")
            .and_then(module_name)
            .or_else(|| context.module.clone());

        Self {
            id,
            name,
            module,
            meta: fields_meta(document),
        }
    }

    fn reference(&self, usage: UsageKind) -> FieldReferenceBuilder {
        let builder = FieldReference::builder(SourceKind::Blueprint, self.name.clone())
            .construct_id(self.id.clone())
            .usage(usage);
        match &self.module {
            Some(module) => builder.module(module.clone()),
            None => builder,
        }
    }

    fn column_for(&self, field_id: Option<&str>) -> Option<String> {
        field_id
            .and_then(|id| self.meta.get(id))
            .and_then(|meta| meta.column_name.clone())
    }

    fn label_for(&self, field_id: Option<&str>) -> Option<String> {
        field_id
            .and_then(|id| self.meta.get(id))
            .and_then(|meta| meta.label.clone())
    }
}

/// `FieldsMeta` is an object of arrays keyed by section
fn fields_meta(document: &Value) -> HashMap<String, FieldMeta> {
    let mut meta = HashMap::new();
    let Some(Value::Object(sections)) = get_path(document, "FieldsMeta") else {
        return meta;
    };
    for rows in sections.values().filter_map(Value::as_array) {
        for row in rows {
            let Some(id) = text_at(row, "Id") else {
                continue;
            };
            meta.entry(id).or_insert_with(|| FieldMeta {
                column_name: text_at(row, "Name"),
                label: text_at(row, "Label"),
            });
        }
    }
    meta
}

impl ReferenceExtractor for BlueprintExtractor {
    fn source_kind(&self) -> SourceKind {
        SourceKind::Blueprint
    }

    fn extract(&self, document: &Value, context: &ExtractContext) -> Extraction {
        let transition = Transition::from_document(document, context);
        let mut extraction = Extraction::default();

        for update in array_at(document, "Actions.Fieldupdate") {
            let field_id = text_at(update, "fieldId");
            let label = text_at(update, "fieldLabel");
            if label.is_none() && field_id.is_none() {
                extraction.skip(format!("{}: field update without field", transition.name));
                continue;
            }
            let column = transition.column_for(field_id.as_deref());
            let builder = transition
                .reference(UsageKind::Write)
                .key_opt(RawKey::Label, label)
                .key_opt(RawKey::FieldId, field_id)
                .key_opt(RawKey::ColumnName, column)
                .target_value_opt(text_at(update, "fieldValue"));
            extraction.push(builder.build());
        }

        for field in array_at(document, "Fields") {
            match text_at(field, "Type").as_deref() {
                Some("Field") => {}
                Some("Info") => {
                    extraction.skip(format!("{}: info entry", transition.name));
                    continue;
                }
                other => {
                    extraction.skip(format!(
                        "{}: {} entry",
                        transition.name,
                        other.unwrap_or("untyped")
                    ));
                    continue;
                }
            }

            let Some(field_id) = text_at(field, "Id") else {
                extraction.skip(format!("{}: during-field without id", transition.name));
                continue;
            };
            let column = transition.column_for(Some(&field_id));
            let label = transition.label_for(Some(&field_id));
            let mut builder = transition
                .reference(UsageKind::Entry)
                .key(RawKey::FieldId, field_id)
                .key_opt(RawKey::ColumnName, column)
                .key_opt(RawKey::Label, label);
            if let Some(module) = get_path(field, "Module").and_then(module_name) {
                builder = builder.module(module);
            }
            extraction.push(builder.build());
        }

        tracing::debug!(
            "transition {}: {} references, {} skipped",
            transition.name,
            extraction.references.len(),
            extraction.skipped
        );
        extraction
    }
}

/// Functions invoked by a transition's `Actions.Deluge`
#[must_use]
pub fn function_calls(document: &Value, context: &ExtractContext) -> Vec<FunctionCall> {
    let transition = Transition::from_document(document, context);
    array_at(document, "Actions.Deluge")
        .iter()
        .filter_map(|call| {
            Some(FunctionCall {
                function_name: text_at(call, "Name")?,
                function_id: text_at(call, "Id"),
                caller: transition.name.clone(),
                caller_kind: SourceKind::Blueprint,
                module: transition.module.clone(),
            })
        })
        .collect()
}

/// `(id, name)` pairs a blueprint document declares
///
/// Persisted blueprints are `{metadata: {Id, Name}, details}`; raw list
/// responses carry a `Processes` array instead.
#[must_use]
pub fn blueprint_names(document: &Value) -> Vec<(String, String)> {
    if let (Some(id), Some(name)) = (
        text_at(document, "metadata.Id"),
        text_at(document, "metadata.Name"),
    ) {
        return vec![(id, name)];
    }
    let processes: Vec<&Value> = match get_path(document, "Processes") {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(single @ Value::Object(_)) => vec![single],
        _ => Vec::new(),
    };
    processes
        .into_iter()
        .filter_map(|process| Some((text_at(process, "Id")?, text_at(process, "Name")?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn transition() -> Value {
        json!({
            "Name": "Qualify",
            "TransitionId": "T1",
            "Module": "Potentials",
            "FieldsMeta": {
                "Potentials": [
                    {"Id": "F1", "Name": "STAGE", "Label": "Stage"},
                    {"Id": "F2", "Name": "POTENTIALCF156", "Label": "Flag Reason"}
                ]
            },
            "Actions": {
                "Fieldupdate": [
                    {"fieldId": "F1", "fieldLabel": "Stage", "fieldValue": "Qualified"}
                ],
                "Deluge": [{"Name": "notify_owner", "Id": "88"}]
            },
            "Fields": [
                {"Type": "Info", "Content": "Fill in the reason"},
                {"Type": "Field", "Id": "F2", "Module": "Potentials", "IsNonMandatory": false}
            ]
        })
    }

    fn context() -> ExtractContext {
        ExtractContext::default().with_parent("Deal Pipeline")
    }

    #[test]
    fn field_update_carries_label_id_and_column() {
        let extraction = BlueprintExtractor.extract(&transition(), &context());
        let write = &extraction.references[0];

        assert_eq!(write.usage(), UsageKind::Write);
        assert_eq!(write.raw_key(), RawKey::Label);
        assert_eq!(write.raw_value(), "Stage");
        assert_eq!(write.key(RawKey::FieldId), Some("F1"));
        assert_eq!(write.key(RawKey::ColumnName), Some("STAGE"));
        assert_eq!(write.target_value(), Some("Qualified"));
        assert_eq!(write.construct_name(), "Deal Pipeline > Qualify");
        assert_eq!(write.construct_id(), "T1");
        assert_eq!(write.module_hint(), Some("Potentials"));
    }

    #[test]
    fn during_fields_become_entries_and_info_is_skipped() {
        let extraction = BlueprintExtractor.extract(&transition(), &context());

        let entries: Vec<_> = extraction
            .references
            .iter()
            .filter(|r| r.usage() == UsageKind::Entry)
            .collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].raw_key(), RawKey::FieldId);
        assert_eq!(entries[0].raw_value(), "F2");
        assert_eq!(entries[0].key(RawKey::ColumnName), Some("POTENTIALCF156"));
        assert_eq!(entries[0].key(RawKey::Label), Some("Flag Reason"));
        assert_eq!(extraction.skipped, 1);
    }

    #[test]
    fn without_parent_name_is_transition_only() {
        let extraction = BlueprintExtractor.extract(&transition(), &ExtractContext::default());
        assert_eq!(extraction.references[0].construct_name(), "Qualify");
    }

    #[test]
    fn missing_sections_are_tolerated() {
        let extraction = BlueprintExtractor.extract(&json!({"Name": "Empty"}), &context());
        assert!(extraction.is_empty());
    }

    #[test]
    fn deluge_actions_are_function_calls() {
        let calls = function_calls(&transition(), &context());
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function_name, "notify_owner");
        assert_eq!(calls[0].caller, "Deal Pipeline > Qualify");
        assert_eq!(calls[0].caller_kind, SourceKind::Blueprint);
    }

    #[test]
    fn blueprint_names_from_metadata_or_processes() {
        let persisted = json!({"metadata": {"Id": 5, "Name": "Deal Pipeline"}, "details": {}});
        assert_eq!(blueprint_names(&persisted), vec![("5".to_string(), "Deal Pipeline".to_string())]);

        let listed = json!({"Processes": [{"Id": "6", "Name": "Lead Flow"}, {"Id": "7"}]});
        assert_eq!(blueprint_names(&listed), vec![("6".to_string(), "Lead Flow".to_string())]);
    }
}
