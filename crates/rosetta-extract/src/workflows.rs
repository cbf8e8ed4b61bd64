//! Workflow rule extractor
//!
//! A workflow rule holds conditions; each condition has criteria (fields read)
//! and instant or scheduled actions. Only `field_updates` actions write a field.
//! Field update actions carry `field_api_name`/`field_id` once enriched from
//! their detail documents; unenriched ones are skipped.

use crate::extractor::{ExtractContext, Extraction, FunctionCall, ReferenceExtractor};
use crate::json::{array_at, as_text, get_path, module_name, text_at, unwrap_envelope};
use rosetta_core::{FieldReference, FieldReferenceBuilder, RawKey, SourceKind, UsageKind};
use serde_json::Value;

const FIELD_UPDATE: &str = "field_updates";
const FUNCTION_CALL: &str = "functions";

/// Extracts writes from field update actions and reads from criteria
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkflowExtractor;

struct Rule {
    id: String,
    name: String,
    module: Option<String>,
}

impl Rule {
    fn from_document(rule: &Value, context: &ExtractContext) -> Self {
        let id = non_empty(&context.construct_id)
            .or_else(|| text_at(rule, "id"))
            .unwrap_or_default();
        let name = non_empty(&context.construct_name)
            .or_else(|| text_at(rule, "name"))
            .unwrap_or_else(|| format!("workflow_{id}"));
        let module = context
            .module
            .clone()
            .or_else(|| get_path(rule, "module").and_then(module_name));
        Self { id, name, module }
    }

    fn reference(&self, usage: UsageKind) -> FieldReferenceBuilder {
        let builder = FieldReference::builder(SourceKind::Workflow, self.name.clone())
            .construct_id(self.id.clone())
            .usage(usage);
        match &self.module {
            Some(module) => builder.module(module.clone()),
            None => builder,
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Actions of a condition, instant first, then every scheduled group
pub fn condition_actions(condition: &Value) -> impl Iterator<Item = &Value> {
    let instant = array_at(condition, "instant_actions.actions").iter();
    let scheduled: Vec<&Value> = match get_path(condition, "scheduled_actions") {
        Some(Value::Object(_)) => array_at(condition, "scheduled_actions.actions").iter().collect(),
        Some(Value::Array(groups)) => groups
            .iter()
            .flat_map(|group| array_at(group, "actions").iter())
            .collect(),
        _ => Vec::new(),
    };
    instant.chain(scheduled)
}

/// Actions of every condition of a rule, in condition order
pub fn rule_actions(rule: &Value) -> impl Iterator<Item = &Value> {
    array_at(rule, "conditions").iter().flat_map(condition_actions)
}

impl ReferenceExtractor for WorkflowExtractor {
    fn source_kind(&self) -> SourceKind {
        SourceKind::Workflow
    }

    fn extract(&self, document: &Value, context: &ExtractContext) -> Extraction {
        let document = unwrap_envelope(document, "workflow_rules");
        let rule = Rule::from_document(document, context);
        let mut extraction = Extraction::default();

        let conditions = array_at(document, "conditions");
        if conditions.is_empty() {
            extraction.skip(format!("{}: no conditions", rule.name));
        }

        for condition in conditions {
            if let Some(criteria) = get_path(condition, "criteria_details.criteria") {
                walk_criteria(criteria, &rule, &mut extraction);
            }

            for action in condition_actions(condition) {
                match text_at(action, "type").as_deref() {
                    Some(FIELD_UPDATE) => field_update(action, &rule, &mut extraction),
                    other => extraction.skip(format!(
                        "{}: {} action '{}'",
                        rule.name,
                        other.unwrap_or("untyped"),
                        text_at(action, "name").unwrap_or_default()
                    )),
                }
            }
        }

        tracing::debug!(
            "workflow {}: {} references, {} skipped",
            rule.name,
            extraction.references.len(),
            extraction.skipped
        );
        extraction
    }
}

fn field_update(action: &Value, rule: &Rule, extraction: &mut Extraction) {
    let api_name = text_at(action, "field_api_name").or_else(|| text_at(action, "field.api_name"));
    let field_id = text_at(action, "field_id").or_else(|| text_at(action, "field.id"));

    if api_name.is_none() && field_id.is_none() {
        extraction.skip(format!(
            "{}: field update '{}' has no field details",
            rule.name,
            text_at(action, "name").unwrap_or_default()
        ));
        return;
    }

    let target = get_path(action, "field_value")
        .or_else(|| get_path(action, "value"))
        .and_then(render_value);
    let module = get_path(action, "related_details.module")
        .and_then(module_name)
        .or_else(|| get_path(action, "module").and_then(module_name));

    let mut builder = rule
        .reference(UsageKind::Write)
        .key_opt(RawKey::ApiName, api_name)
        .key_opt(RawKey::FieldId, field_id)
        .target_value_opt(target);
    if let Some(module) = module {
        builder = builder.module(module);
    }
    extraction.push(builder.build());
}

fn walk_criteria(criteria: &Value, rule: &Rule, extraction: &mut Extraction) {
    if let Some(group) = get_path(criteria, "group").and_then(Value::as_array) {
        for member in group {
            walk_criteria(member, rule, extraction);
        }
        return;
    }

    let Some(field) = get_path(criteria, "field") else {
        return;
    };
    let api_name = text_at(field, "api_name");
    let field_id = text_at(field, "id");
    if api_name.is_none() && field_id.is_none() {
        extraction.skip(format!("{}: criterion without field name", rule.name));
        return;
    }

    let builder = rule
        .reference(UsageKind::Read)
        .key_opt(RawKey::ApiName, api_name)
        .key_opt(RawKey::FieldId, field_id)
        .target_value_opt(get_path(criteria, "value").and_then(render_value));
    extraction.push(builder.build());
}

fn render_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
        scalar => as_text(scalar),
    }
}

/// Functions invoked by a workflow rule's actions
#[must_use]
pub fn function_calls(document: &Value, context: &ExtractContext) -> Vec<FunctionCall> {
    let document = unwrap_envelope(document, "workflow_rules");
    let rule = Rule::from_document(document, context);

    array_at(document, "conditions")
        .iter()
        .flat_map(condition_actions)
        .filter(|action| text_at(action, "type").as_deref() == Some(FUNCTION_CALL))
        .filter_map(|action| {
            Some(FunctionCall {
                function_name: text_at(action, "name")?,
                function_id: text_at(action, "id"),
                caller: rule.name.clone(),
                caller_kind: SourceKind::Workflow,
                module: rule.module.clone(),
            })
        })
        .collect()
}
