//! End-to-end tests for extraction and analysis runs

use pretty_assertions::assert_eq;
use rosetta_cli::persist::{read_documents, write_json, FAILED_EXTRACTIONS};
use rosetta_cli::{analyze, AnalysisOptions, DataLayout, Endpoints, ExtractionRun, Subsystem};
use rosetta_core::SourceKind;
use rosetta_fetch::testing::{RecordingPacer, ScriptedTransport};
use rosetta_fetch::{FetchController, FetchOutcome, FetchPolicy};
use rosetta_test_utils::{
    amount_field, blueprint_document, flag_reason_field, function_document, module_document,
    stage_field, transition_document, workflow_document,
};
use serde_json::{json, Value};
use std::fs;

fn unscripted() -> FetchOutcome {
    FetchOutcome::ItemError("unscripted request".into())
}

fn controller(transport: ScriptedTransport) -> FetchController<ScriptedTransport, RecordingPacer> {
    FetchController::new(transport, RecordingPacer::new(), FetchPolicy::default()).unwrap()
}

fn endpoints() -> Endpoints {
    Endpoints::new("https://crm.example.com/crm", "123")
}

fn read(path: &std::path::Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[tokio::test]
async fn test_modules_are_filtered_and_persisted_with_fields() {
    let modules = json!({"modules": [
        {"api_name": "Potentials", "status": "visible", "api_supported": true,
         "creatable": true, "show_as_tab": true},
        {"api_name": "Approvals__s", "status": "visible", "api_supported": true,
         "creatable": true, "show_as_tab": true},
        {"api_name": "Hidden", "status": "user_hidden", "api_supported": true,
         "creatable": true, "show_as_tab": true}
    ]});
    let fields = json!({"fields": [{"id": "F1", "field_label": "Stage", "api_name": "Stage"}]});
    let transport = ScriptedTransport::new(unscripted())
        .with_script("modules", [FetchOutcome::Success(modules)])
        .with_script("fields:Potentials", [FetchOutcome::Success(fields.clone())]);
    let controller = controller(transport);
    let dir = tempfile::tempdir().unwrap();
    let layout = DataLayout::new(dir.path());
    let endpoints = endpoints();

    let summary = ExtractionRun::new(&controller, &endpoints, &layout)
        .run(&[Subsystem::Modules])
        .await
        .unwrap();

    assert!(!summary.is_aborted());
    assert_eq!(summary.subsystems["modules"].listed, 3);
    assert_eq!(summary.subsystems["modules"].persisted, 1);
    assert_eq!(summary.subsystems["modules"].failed, 0);

    let document = read(&layout.subsystem_dir("modules").join("Potentials.json"));
    assert_eq!(document["metadata"]["api_name"], "Potentials");
    assert_eq!(document["fields"], fields);
    assert!(layout.index_file("modules").is_file());
    assert!(!layout.subsystem_dir("modules").join("Hidden.json").exists());
}

#[tokio::test]
async fn test_workflow_field_updates_are_enriched_before_persisting() {
    let rule = json!({
        "id": "4001",
        "name": "Stage Sync",
        "conditions": [{"instant_actions": {"actions": [
            {"type": "field_updates", "id": "a1", "name": "Set Stage"}
        ]}}]
    });
    let detail = json!({
        "field": {"api_name": "Stage", "id": "F1"},
        "value": "Closed Won",
        "type": "static",
        "module": {"api_name": "Potentials"}
    });
    let transport = ScriptedTransport::new(unscripted())
        .with_script(
            "workflows:page:1",
            [FetchOutcome::Success(json!({"workflow_rules": [{"id": "4001", "name": "Stage Sync"}]}))],
        )
        .with_script(
            "workflow:4001",
            [FetchOutcome::Success(json!({"workflow_rules": [rule]}))],
        )
        .with_script(
            "field_update:a1",
            [FetchOutcome::Success(json!({"field_updates": [detail]}))],
        );
    let controller = controller(transport);
    let dir = tempfile::tempdir().unwrap();
    let layout = DataLayout::new(dir.path());
    let endpoints = endpoints();

    let summary = ExtractionRun::new(&controller, &endpoints, &layout)
        .run(&[Subsystem::Workflows])
        .await
        .unwrap();
    assert_eq!(summary.persisted(), 1);

    let persisted = read(
        &layout
            .subsystem_dir("workflows")
            .join("Stage Sync_4001.json"),
    );
    let action = &persisted["conditions"][0]["instant_actions"]["actions"][0];
    assert_eq!(action["field_api_name"], "Stage");
    assert_eq!(action["field_id"], "F1");
    assert_eq!(action["module"], "Potentials");
    assert_eq!(
        persisted["field_updates_summary"],
        json!({"total_field_update_actions": 1, "enriched_actions": 1})
    );
}

#[tokio::test]
async fn test_hard_error_keeps_completed_documents_and_stops_the_run() {
    let transport = ScriptedTransport::new(unscripted())
        .with_script(
            "workflows:page:1",
            [FetchOutcome::Success(json!({"workflow_rules": [
                {"id": "1", "name": "First"},
                {"id": "2", "name": "Second"},
                {"id": "3", "name": "Third"}
            ]}))],
        )
        .with_script(
            "workflow:1",
            [FetchOutcome::Success(json!({"workflow_rules": [{"id": "1", "name": "First"}]}))],
        )
        .with_script("workflow:2", [FetchOutcome::HardError("HTTP 401".into())]);
    let controller = controller(transport);
    let dir = tempfile::tempdir().unwrap();
    let layout = DataLayout::new(dir.path());
    let endpoints = endpoints();

    let summary = ExtractionRun::new(&controller, &endpoints, &layout)
        .run(&[Subsystem::Workflows, Subsystem::Functions])
        .await
        .unwrap();

    assert!(summary.is_aborted());
    assert!(summary.hard_error.as_ref().is_some_and(|e| e.requires_new_session()));
    assert!(!summary.subsystems.contains_key("functions"));
    assert_eq!(summary.subsystems["workflows"].persisted, 1);
    assert!(summary.subsystems["workflows"].aborted.is_some());

    let (documents, _) = read_documents(&layout.subsystem_dir("workflows"));
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].1["name"], "First");

    let log = read(&layout.subsystem_dir("workflows").join(FAILED_EXTRACTIONS));
    let kinds: Vec<(&str, &str)> = log["failures"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| (f["key"].as_str().unwrap(), f["kind"].as_str().unwrap()))
        .collect();
    assert_eq!(
        kinds,
        vec![("workflow:2", "hard_error"), ("workflow:3", "not_attempted")]
    );
    assert_eq!(controller.transport().call_count("workflow:3"), 0);
}

#[tokio::test]
async fn test_short_function_page_ends_pagination() {
    let transport = ScriptedTransport::new(unscripted())
        .with_script(
            "functions:start:1",
            [FetchOutcome::Success(json!({"functions": [
                {"id": "77", "api_name": "sync_stage", "display_name": "Sync Stage",
                 "module": "Potentials"}
            ]}))],
        )
        .with_script(
            "function:77",
            [FetchOutcome::Success(json!({"functions": [{"script": "info 1;"}]}))],
        );
    let controller = controller(transport);
    let dir = tempfile::tempdir().unwrap();
    let layout = DataLayout::new(dir.path());
    let endpoints = endpoints();

    ExtractionRun::new(&controller, &endpoints, &layout)
        .run(&[Subsystem::Functions])
        .await
        .unwrap();

    assert_eq!(controller.transport().call_count("functions:start:51"), 0);
    let document = read(&layout.subsystem_dir("functions").join("sync_stage_77.json"));
    assert_eq!(
        document,
        json!({
            "id": "77",
            "name": "sync_stage",
            "display_name": "Sync Stage",
            "module": "Potentials",
            "script": "info 1;"
        })
    );
}

fn write_extraction_tree(layout: &DataLayout) {
    let module = module_document("Potentials", &[stage_field(), flag_reason_field(), amount_field()]);
    write_json(&layout.subsystem_dir("modules").join("Potentials.json"), &module).unwrap();
    write_json(
        &layout.subsystem_dir("workflows").join("Stage Sync_4001.json"),
        &workflow_document(),
    )
    .unwrap();
    write_json(
        &layout.subsystem_dir("blueprints").join("Deal Pipeline_900.json"),
        &blueprint_document(),
    )
    .unwrap();
    write_json(
        &layout.transitions_dir().join("900_Qualify_T1.json"),
        &transition_document(),
    )
    .unwrap();
    write_json(
        &layout.subsystem_dir("functions").join("sync_stage_77.json"),
        &function_document(),
    )
    .unwrap();
}

#[test]
fn test_analyze_correlates_a_field_across_constructs() {
    let dir = tempfile::tempdir().unwrap();
    let layout = DataLayout::new(dir.path().join("data"));
    write_extraction_tree(&layout);
    let output = dir.path().join("rosetta.json");

    let report = analyze(&AnalysisOptions {
        data_dir: layout.root().to_path_buf(),
        output: output.clone(),
        include_unreferenced: false,
    })
    .unwrap();

    assert_eq!(report.catalog_rows, 3);
    assert_eq!(report.unreadable_files, 0);
    let stage = report.map.get("Potentials:F1").unwrap();
    assert_eq!(
        stage.modifiers(SourceKind::Workflow).collect::<Vec<_>>(),
        vec!["Stage Sync"]
    );
    assert_eq!(
        stage.modifiers(SourceKind::Blueprint).collect::<Vec<_>>(),
        vec!["Deal Pipeline > Qualify"]
    );
    assert!(report
        .function_calls
        .iter()
        .any(|call| call.caller_kind == SourceKind::Workflow));

    let written = read(&output);
    assert_eq!(written["fields"]["Potentials:F1"]["api_name"], "Stage");
}

#[test]
fn test_analyze_can_list_unreferenced_fields() {
    let dir = tempfile::tempdir().unwrap();
    let layout = DataLayout::new(dir.path());
    let module = module_document("Leads", &[rosetta_test_utils::lead_status_field()]);
    write_json(&layout.subsystem_dir("modules").join("Leads.json"), &module).unwrap();

    let report = analyze(&AnalysisOptions {
        data_dir: layout.root().to_path_buf(),
        output: dir.path().join("out").join("rosetta.json"),
        include_unreferenced: true,
    })
    .unwrap();

    assert_eq!(report.references, 0);
    assert_eq!(report.map.summary.unreferenced_entries, 1);
    assert!(report.map.get("Leads:L1").unwrap().is_unreferenced());
}
