//! Module schema loader
//!
//! A persisted module document is `{metadata: {api_name, ...}, fields:
//! {fields: [...]}}`. Each field row becomes one catalog entry.

use crate::json::{array_at, get_path, text_at};
use rosetta_core::FieldCatalogEntry;
use serde_json::Value;

/// Catalog rows parsed from one module document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleFields {
    /// Module API name
    pub module: String,
    /// Parsed rows in document order
    pub entries: Vec<FieldCatalogEntry>,
    /// Rows without id or API name
    pub skipped: usize,
    /// Why rows were skipped
    pub diagnostics: Vec<String>,
}

/// Parse a module document into catalog entries
///
/// `fallback_module` is used when the document carries no module name
/// (e.g. a bare fields response).
#[must_use]
pub fn parse_module_document(document: &Value, fallback_module: Option<&str>) -> ModuleFields {
    let module = text_at(document, "metadata.api_name")
        .or_else(|| text_at(document, "metadata.module_name"))
        .or_else(|| fallback_module.map(str::to_string));

    let rows = match get_path(document, "fields") {
        Some(Value::Array(rows)) => rows.as_slice(),
        Some(Value::Object(_)) => array_at(document, "fields.fields"),
        _ => &[],
    };

    let Some(module) = module else {
        return ModuleFields {
            module: String::new(),
            entries: Vec::new(),
            skipped: rows.len(),
            diagnostics: vec!["module document has no module name".to_string()],
        };
    };

    let mut parsed = ModuleFields {
        module: module.clone(),
        ..ModuleFields::default()
    };

    for (index, row) in rows.iter().enumerate() {
        let field_id = text_at(row, "id");
        let api_name = text_at(row, "api_name");
        if field_id.is_none() && api_name.is_none() {
            parsed.skipped += 1;
            parsed
                .diagnostics
                .push(format!("{module}: field row {index} has neither id nor api_name"));
            continue;
        }

        parsed.entries.push(FieldCatalogEntry {
            module: module.clone(),
            field_id,
            label: text_at(row, "field_label")
                .or_else(|| text_at(row, "display_label"))
                .unwrap_or_default(),
            api_name: api_name.unwrap_or_default(),
            column_name: text_at(row, "column_name"),
            data_type: text_at(row, "data_type"),
        });
    }

    tracing::debug!(
        "module {module}: {} fields, {} skipped",
        parsed.entries.len(),
        parsed.skipped
    );
    parsed
}

/// Whether a module listing row is worth extracting
///
/// Keeps API-supported, visible, creatable modules shown as tabs, and drops
/// system modules (API names ending in `__s`).
#[must_use]
pub fn is_extractable_module(row: &Value) -> bool {
    let flag = |path: &str| get_path(row, path).and_then(Value::as_bool).unwrap_or(false);
    let api_name = text_at(row, "api_name").unwrap_or_default();

    flag("api_supported")
        && text_at(row, "status").as_deref() == Some("visible")
        && !api_name.is_empty()
        && !api_name.ends_with("__s")
        && flag("creatable")
        && flag("show_as_tab")
}
