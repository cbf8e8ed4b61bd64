//! Testing utilities for the rosetta workspace
//!
//! Shared catalog rows, references and CRM documents.

#![allow(missing_docs)]

use rosetta_core::{
    Confidence, FieldCatalogEntry, FieldReference, RawKey, SourceKind, UsageKind,
};
use serde_json::{json, Value};

pub fn stage_field() -> FieldCatalogEntry {
    FieldCatalogEntry::new("Potentials", "Stage", "Stage")
        .with_field_id("F1")
        .with_column_name("STAGE")
        .with_data_type("picklist")
}

pub fn flag_reason_field() -> FieldCatalogEntry {
    FieldCatalogEntry::new("Potentials", "Flag Reason", "Flag_Reason")
        .with_field_id("F2")
        .with_column_name("POTENTIALCF156")
        .with_data_type("text")
}

pub fn amount_field() -> FieldCatalogEntry {
    FieldCatalogEntry::new("Potentials", "Amount", "Amount")
        .with_field_id("F3")
        .with_column_name("AMOUNT")
        .with_data_type("currency")
}

pub fn lead_status_field() -> FieldCatalogEntry {
    FieldCatalogEntry::new("Leads", "Lead Status", "Lead_Status")
        .with_field_id("L1")
        .with_column_name("STATUS")
        .with_data_type("picklist")
}

/// Two Leads fields sharing the label "Status"
pub fn duplicate_label_fields() -> Vec<FieldCatalogEntry> {
    vec![
        FieldCatalogEntry::new("Leads", "Status", "Status")
            .with_field_id("L2")
            .with_column_name("LEADCF1"),
        FieldCatalogEntry::new("Leads", "Status", "Status_2")
            .with_field_id("L3")
            .with_column_name("LEADCF2"),
    ]
}

pub fn sample_catalog() -> Vec<FieldCatalogEntry> {
    vec![
        stage_field(),
        flag_reason_field(),
        amount_field(),
        lead_status_field(),
    ]
}

pub fn workflow_ref(construct: &str, api_name: &str, module: &str) -> FieldReference {
    FieldReference::builder(SourceKind::Workflow, construct)
        .construct_id(format!("wf-{construct}"))
        .key(RawKey::ApiName, api_name)
        .module(module)
        .build()
        .unwrap()
}

pub fn blueprint_ref(construct: &str, label: &str, module: &str) -> FieldReference {
    FieldReference::builder(SourceKind::Blueprint, construct)
        .construct_id(format!("bp-{construct}"))
        .key(RawKey::Label, label)
        .module(module)
        .build()
        .unwrap()
}

pub fn read_ref(construct: &str, api_name: &str, module: &str) -> FieldReference {
    FieldReference::builder(SourceKind::Workflow, construct)
        .construct_id(format!("wf-{construct}"))
        .key(RawKey::ApiName, api_name)
        .module(module)
        .usage(UsageKind::Read)
        .build()
        .unwrap()
}

pub fn candidate_ref(construct: &str, api_name: &str, module: &str, usage: UsageKind) -> FieldReference {
    FieldReference::builder(SourceKind::Function, construct)
        .construct_id(format!("fn-{construct}"))
        .key(RawKey::ApiName, api_name)
        .module(module)
        .usage(usage)
        .confidence(Confidence::Candidate)
        .build()
        .unwrap()
}

pub fn module_document(module: &str, fields: &[FieldCatalogEntry]) -> Value {
    let rows: Vec<Value> = fields
        .iter()
        .map(|f| {
            json!({
                "id": f.field_id,
                "field_label": f.label,
                "api_name": f.api_name,
                "column_name": f.column_name,
                "data_type": f.data_type,
            })
        })
        .collect();
    json!({
        "metadata": {"api_name": module, "module_name": module},
        "fields": {"fields": rows}
    })
}

pub fn workflow_document() -> Value {
    json!({
        "id": "4001",
        "name": "Stage Sync",
        "module": {"api_name": "Potentials"},
        "conditions": [{
            "sequence_number": 1,
            "criteria_details": {"criteria": {
                "comparator": "greater_than",
                "field": {"api_name": "Amount", "id": "F3"},
                "value": "1000"
            }},
            "instant_actions": {"actions": [
                {"type": "field_updates", "id": "a1", "name": "Set Stage",
                 "field_api_name": "Stage", "field_id": "F1", "field_value": "Closed Won",
                 "update_type": "static", "module": "Potentials"},
                {"type": "functions", "id": "77", "name": "sync_stage"},
                {"type": "email_notifications", "id": "a3", "name": "Notify owner"}
            ]}
        }]
    })
}

pub fn blueprint_document() -> Value {
    json!({
        "metadata": {"Id": "900", "Name": "Deal Pipeline", "Tab": {"Name": "Potentials"}},
        "details": {"Layout": {"Id": "L-1"}}
    })
}

pub fn transition_document() -> Value {
    json!({
        "Name": "Qualify",
        "TransitionId": "T1",
        "Module": "Potentials",
        "FieldsMeta": {"Potentials": [
            {"Id": "F1", "Name": "STAGE", "Label": "Stage"},
            {"Id": "F2", "Name": "POTENTIALCF156", "Label": "Flag Reason"}
        ]},
        "Actions": {
            "Fieldupdate": [{"fieldId": "F1", "fieldLabel": "Stage", "fieldValue": "Qualified"}],
            "Deluge": [{"Name": "notify_owner", "Id": "88"}]
        },
        "Fields": [
            {"Type": "Info", "Content": "Explain the flag"},
            {"Type": "Field", "Id": "F2", "Module": "Potentials", "IsNonMandatory": false}
        ]
    })
}

pub fn function_document() -> Value {
    json!({
        "id": "77",
        "name": "sync_stage",
        "display_name": "Sync Stage",
        "module": "Potentials",
        "script": "deal = zoho.crm.getRecordById(\"Potentials\", dealId);\namt = deal.get(\"Amount\");\nup = Map();\nup.put(\"Flag_Reason\", \"Large\");\nzoho.crm.updateRecord(\"Potentials\", dealId, up);\n"
    })
}
