use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rosetta_core::{FieldReference, IdentityKey, RawKey, SourceKind, UsageKind};
use rosetta_resolve::{FieldCatalog, IdentityResolver, Resolution};
use rosetta_test_utils::{
    blueprint_ref, candidate_ref, duplicate_label_fields, read_ref, sample_catalog, stage_field,
    workflow_ref,
};

fn catalog() -> FieldCatalog {
    FieldCatalog::from_entries(sample_catalog().into_iter().chain(duplicate_label_fields()))
        .unwrap()
}

fn references() -> Vec<FieldReference> {
    vec![
        workflow_ref("Stage Sync", "Stage", "Potentials"),
        blueprint_ref("Deal Pipeline > Qualify", "Stage", "Potentials"),
        blueprint_ref("Lead Flow > Triage", "Status", "Leads"),
        read_ref("Stage Sync", "Amount", "Potentials"),
        candidate_ref("Sync Stage", "Flag_Reason", "Potentials", UsageKind::Write),
        workflow_ref("Legacy Rule", "Old_Field", "Potentials"),
        workflow_ref("Contact Rule", "Email", "Contacts"),
    ]
}

/// Order-insensitive view of a resolution
fn normalized(resolution: &Resolution) -> (Vec<(IdentityKey, bool, Vec<FieldReference>)>, Vec<FieldReference>) {
    let mut identities: Vec<_> = resolution
        .identities
        .iter()
        .map(|(key, resolved)| {
            let mut refs = resolved.references.clone();
            refs.sort_by(|a, b| format!("{a:?}").cmp(&format!("{b:?}")));
            (key.clone(), resolved.ambiguous, refs)
        })
        .collect();
    identities.sort_by(|a, b| a.0.cmp(&b.0));

    let mut unresolved = resolution.unresolved.clone();
    unresolved.sort_by(|a, b| format!("{a:?}").cmp(&format!("{b:?}")));
    (identities, unresolved)
}

#[test]
fn test_stage_spellings_collapse_to_one_identity() {
    let catalog = FieldCatalog::from_entries([stage_field()]).unwrap();
    let refs = [
        workflow_ref("Stage Sync", "Stage", "Potentials"),
        blueprint_ref("Deal Pipeline > Qualify", "Stage", "Potentials"),
    ];

    let resolution = IdentityResolver::new(&catalog).resolve(&refs);

    assert_eq!(resolution.identities.len(), 1);
    let stage = &resolution.identities[&IdentityKey::Id("Potentials".into(), "F1".into())];
    let names: Vec<&str> = stage.references.iter().map(FieldReference::construct_name).collect();
    assert_eq!(names, vec!["Stage Sync", "Deal Pipeline > Qualify"]);
    assert_eq!(stage.data_type.as_deref(), Some("picklist"));
    assert!(!stage.ambiguous);
}

#[test]
fn test_label_shared_by_two_fields_is_ambiguous() {
    let catalog = catalog();
    let reference = blueprint_ref("Lead Flow > Triage", "Status", "Leads");

    let resolution = IdentityResolver::new(&catalog).resolve([&reference]);

    let keys: Vec<String> = resolution.identities.keys().map(ToString::to_string).collect();
    assert_eq!(keys, vec!["Leads:L2", "Leads:L3"]);
    assert!(resolution.identities.values().all(|r| r.ambiguous));
    assert_eq!(resolution.stats.ambiguous, 1);
}

#[test]
fn test_unmatched_reference_is_kept_verbatim() {
    let catalog = catalog();
    let reference = workflow_ref("Legacy Rule", "Old_Field", "Potentials");

    let resolution = IdentityResolver::new(&catalog).resolve([&reference]);

    assert!(resolution.identities.is_empty());
    assert_eq!(resolution.unresolved, vec![reference]);
}

#[test]
fn test_unknown_module_without_id_is_unresolved() {
    let catalog = catalog();
    let reference = workflow_ref("Contact Rule", "Email", "Contacts");
    assert!(IdentityResolver::new(&catalog).resolve_one(&reference).is_none());
}

#[test]
fn test_column_name_from_blueprint_alternates() {
    let catalog = catalog();
    let reference = FieldReference::builder(SourceKind::Blueprint, "Deal Pipeline > Qualify")
        .key(RawKey::Label, "Flag reason (renamed)")
        .key(RawKey::ColumnName, "POTENTIALCF156")
        .module("Potentials")
        .build()
        .unwrap();

    let found = IdentityResolver::new(&catalog).resolve_one(&reference).unwrap();
    assert_eq!(found.matched_by, RawKey::ColumnName);
    assert_eq!(catalog.get(found.entries[0]).unwrap().api_name, "Flag_Reason");
}

#[test]
fn test_resolution_is_idempotent() {
    let catalog = catalog();
    let resolver = IdentityResolver::new(&catalog);
    let refs = references();

    let first = resolver.resolve(&refs);
    let second = resolver.resolve(&refs);
    assert_eq!(first, second);

    let doubled: Vec<&FieldReference> = refs.iter().chain(refs.iter()).collect();
    assert_eq!(normalized(&resolver.resolve(doubled)), normalized(&first));
}

proptest! {
    #[test]
    fn prop_resolution_is_order_independent(refs in Just(references()).prop_shuffle()) {
        let catalog = catalog();
        let resolver = IdentityResolver::new(&catalog);

        let baseline = resolver.resolve(&references());
        let shuffled = resolver.resolve(&refs);

        prop_assert_eq!(normalized(&shuffled), normalized(&baseline));
        prop_assert_eq!(shuffled.stats, baseline.stats);
    }

    #[test]
    fn prop_every_reference_is_accounted_for(take in 0usize..=7) {
        let catalog = catalog();
        let refs: Vec<FieldReference> = references().into_iter().take(take).collect();

        let resolution = IdentityResolver::new(&catalog).resolve(&refs);

        prop_assert_eq!(resolution.stats.total, refs.len());
        prop_assert_eq!(
            resolution.stats.resolved + resolution.stats.unresolved,
            resolution.stats.total
        );
        prop_assert_eq!(resolution.unresolved.len(), resolution.stats.unresolved);
    }
}
