use pretty_assertions::assert_eq;
use rosetta_core::{Confidence, RawKey, SourceKind, UsageKind};
use rosetta_extract::{
    blueprints, extractor_for, parse_module_document, workflows, ExtractContext,
    ReferenceExtractor,
};
use rosetta_test_utils::{
    blueprint_document, function_document, module_document, sample_catalog, transition_document,
    workflow_document,
};

#[test]
fn test_every_kind_has_an_extractor() {
    for kind in SourceKind::ALL {
        assert_eq!(extractor_for(kind).source_kind(), kind);
    }
}

#[test]
fn test_workflow_fixture() {
    let extraction =
        extractor_for(SourceKind::Workflow).extract(&workflow_document(), &ExtractContext::default());

    let summary: Vec<(UsageKind, &str)> = extraction
        .references
        .iter()
        .map(|r| (r.usage(), r.raw_value()))
        .collect();
    assert_eq!(summary, vec![(UsageKind::Read, "Amount"), (UsageKind::Write, "Stage")]);
    // function call and email notification
    assert_eq!(extraction.skipped, 2);

    let calls = workflows::function_calls(&workflow_document(), &ExtractContext::default());
    assert_eq!(calls[0].function_name, "sync_stage");
}

#[test]
fn test_transition_fixture_with_blueprint_name() {
    let names = blueprints::blueprint_names(&blueprint_document());
    let (_, blueprint_name) = &names[0];
    let context = ExtractContext::default().with_parent(blueprint_name.clone());

    let extraction = extractor_for(SourceKind::Blueprint).extract(&transition_document(), &context);

    assert_eq!(extraction.references.len(), 2);
    assert!(extraction
        .references
        .iter()
        .all(|r| r.construct_name() == "Deal Pipeline > Qualify"));
    assert_eq!(extraction.references[1].usage(), UsageKind::Entry);
    assert_eq!(extraction.references[1].key(RawKey::ColumnName), Some("POTENTIALCF156"));
}

#[test]
fn test_function_fixture() {
    let extraction =
        extractor_for(SourceKind::Function).extract(&function_document(), &ExtractContext::default());

    let summary: Vec<(UsageKind, &str, Option<&str>)> = extraction
        .references
        .iter()
        .map(|r| (r.usage(), r.raw_value(), r.module_hint()))
        .collect();
    assert_eq!(
        summary,
        vec![
            (UsageKind::Read, "Amount", Some("Potentials")),
            (UsageKind::Write, "Flag_Reason", Some("Potentials")),
        ]
    );
    assert!(extraction
        .references
        .iter()
        .all(|r| r.confidence() == Confidence::Candidate && r.construct_name() == "Sync Stage"));
}

#[test]
fn test_module_fixture_round_trips_catalog() {
    let catalog = sample_catalog();
    let potentials: Vec<_> = catalog
        .iter()
        .filter(|f| f.module == "Potentials")
        .cloned()
        .collect();

    let parsed = parse_module_document(&module_document("Potentials", &potentials), None);
    assert_eq!(parsed.entries, potentials);
    assert_eq!(parsed.skipped, 0);
}
