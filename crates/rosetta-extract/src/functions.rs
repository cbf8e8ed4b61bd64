//! Script scanner for standalone functions
//!
//! Scripts are not parsed. The scanner tracks two kinds of variables:
//! - record variables, assigned from `getRecordById`, `searchRecords`,
//!   `getRelatedRecords` or iterated with `for each`
//! - update maps, passed to `updateRecord` or `createRecord`
//!
//! `.get("X")` on a record variable is a read of `X`; `.put("X", v)` on an
//! update map is a write. Everything found this way is a candidate, since the
//! string literal may not be a field at all.

use crate::extractor::{ExtractContext, Extraction, ReferenceExtractor};
use crate::json::{get_path, module_name, text_at, unwrap_envelope};
use once_cell::sync::Lazy;
use regex::Regex;
use rosetta_core::{Confidence, FieldReference, RawKey, SourceKind, UsageKind};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

static RECORD_FETCH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)(\w+)\s*=\s*zoho\.crm\.(?:getRecordById|searchRecords|getRelatedRecords)\(\s*"(\w+)""#,
    )
    .expect("record fetch pattern")
});

static FOR_EACH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)for\s+each\s+(\w+)\s+in\s+(\w+)").expect("for-each pattern"));

static UPDATE_RECORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)zoho\.crm\.updateRecord\(\s*"(\w+)"\s*,\s*[\w.()"]+\s*,\s*(\w+)"#)
        .expect("update pattern")
});

static CREATE_RECORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)zoho\.crm\.createRecord\(\s*"(\w+)"\s*,\s*(\w+)"#).expect("create pattern")
});

static DOT_GET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(\w+)\.get\(\s*"(\w+)"\s*\)"#).expect("get pattern"));

static DOT_PUT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(\w+)\.put\(\s*"(\w+)"\s*,\s*([^;\n]*?)\)\s*;"#).expect("put pattern")
});

/// Variables that hold request plumbing, never record data
const NOISE_VARIABLES: &[&str] = &[
    "errlogmap",
    "inputparams",
    "headers",
    "params",
    "queryparams",
    "body",
    "response",
    "resp",
    "result",
    "config",
    "settings",
    "options",
];

/// Keys scripts commonly put in maps that are not CRM fields
const NOISE_FIELDS: &[&str] = &[
    "Function",
    "Email_Error",
    "Params",
    "See_Line",
    "Module",
    "Error",
    "status",
    "code",
    "message",
    "data",
    "details",
    "id",
    "select_query",
    "email",
    "user_name",
    "users",
    "name",
    "content",
    "result",
    "response",
    "info",
    "trigger",
    "workflow",
    "blueprint",
    "approval",
];

fn is_noise_variable(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    NOISE_VARIABLES.contains(&lower.as_str())
}

fn is_noise_field(name: &str) -> bool {
    NOISE_FIELDS.contains(&name)
}

/// Scans function scripts for candidate field reads and writes
#[derive(Debug, Clone, Copy, Default)]
pub struct FunctionExtractor;

impl FunctionExtractor {
    /// Scan a script directly
    #[must_use]
    pub fn scan(&self, script: &str, context: &ExtractContext) -> Extraction {
        let records = record_variables(script);
        let update_maps = update_maps(script);
        let mut extraction = Extraction::default();
        let mut seen = HashSet::new();

        let reference = |usage: UsageKind, module: &str, field: &str| {
            FieldReference::builder(SourceKind::Function, context.construct_name.clone())
                .construct_id(context.construct_id.clone())
                .key(RawKey::ApiName, field)
                .module(module)
                .usage(usage)
                .confidence(Confidence::Candidate)
        };

        for capture in DOT_GET.captures_iter(script) {
            let (variable, field) = (&capture[1], &capture[2]);
            let Some(module) = records.get(variable) else {
                continue;
            };
            if is_noise_field(field) {
                extraction.skip(format!("{}: noise field {variable}.get(\"{field}\")", context.construct_name));
                continue;
            }
            if seen.insert((UsageKind::Read, module.clone(), field.to_string())) {
                extraction.push(reference(UsageKind::Read, module, field).build());
            }
        }

        for capture in DOT_PUT.captures_iter(script) {
            let (variable, field, value) = (&capture[1], &capture[2], capture[3].trim());
            let Some(module) = update_maps.get(variable) else {
                continue;
            };
            if is_noise_variable(variable) || is_noise_field(field) {
                extraction.skip(format!("{}: noise put {variable}.put(\"{field}\")", context.construct_name));
                continue;
            }
            if seen.insert((UsageKind::Write, module.clone(), field.to_string())) {
                let mut builder = reference(UsageKind::Write, module, field);
                if !value.is_empty() {
                    builder = builder.target_value(value);
                }
                extraction.push(builder.build());
            }
        }

        extraction
    }
}

/// Record variable name to module
fn record_variables(script: &str) -> HashMap<String, String> {
    let mut records: HashMap<String, String> = RECORD_FETCH
        .captures_iter(script)
        .map(|c| (c[1].to_string(), c[2].to_string()))
        .collect();

    for capture in FOR_EACH.captures_iter(script) {
        if let Some(module) = records.get(&capture[2]).cloned() {
            records.insert(capture[1].to_string(), module);
        }
    }
    records
}

/// Update map variable name to module
fn update_maps(script: &str) -> HashMap<String, String> {
    UPDATE_RECORD
        .captures_iter(script)
        .chain(CREATE_RECORD.captures_iter(script))
        .map(|c| (c[2].to_string(), c[1].to_string()))
        .collect()
}

impl ReferenceExtractor for FunctionExtractor {
    fn source_kind(&self) -> SourceKind {
        SourceKind::Function
    }

    fn extract(&self, document: &Value, context: &ExtractContext) -> Extraction {
        let document = unwrap_envelope(document, "functions");
        let mut context = context.clone();
        if context.construct_name.trim().is_empty() {
            context.construct_name = text_at(document, "display_name")
                .or_else(|| text_at(document, "name"))
                .unwrap_or_default();
        }
        if context.construct_id.trim().is_empty() {
            context.construct_id = text_at(document, "id").unwrap_or_default();
        }
        if context.module.is_none() {
            context.module = get_path(document, "module").and_then(module_name);
        }

        match get_path(document, "script").and_then(Value::as_str) {
            Some(script) => {
                let extraction = self.scan(script, &context);
                tracing::debug!(
                    "function {}: {} candidates, {} skipped",
                    context.construct_name,
                    extraction.references.len(),
                    extraction.skipped
                );
                extraction
            }
            None => {
                let mut extraction = Extraction::default();
                extraction.skip(format!("{}: no script", context.construct_name));
                extraction
            }
        }
    }
}
