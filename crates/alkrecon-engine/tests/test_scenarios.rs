//! End-to-end scenarios: one case each, default rule tables.
//!
//! Run with:
//! ```bash
//! cargo test --package alkrecon-engine --test test_scenarios
//! ```

use alkrecon_common::{
    BucketKey, CaseSnapshot, EngineConfig, EvidenceId, EvidenceLayer, MechanismClass, Verdict,
};
use alkrecon_engine::{CaseOutcome, Engine};
use alkrecon_test_utils::assertions::{assert_provenance, score_of, top_class};
use alkrecon_test_utils::fixtures;
use pretty_assertions::assert_eq;

fn engine() -> Engine {
    Engine::new(EngineConfig::default()).expect("default config is valid")
}

fn run(snapshot: CaseSnapshot) -> CaseSnapshot {
    match engine().run_case(snapshot) {
        CaseOutcome::Complete { snapshot } => *snapshot,
        other => panic!("expected a complete outcome, got {other:?}"),
    }
}

fn flag_names(snapshot: &CaseSnapshot) -> Vec<&str> {
    snapshot.features().names()
}

fn bucket_keys(snapshot: &CaseSnapshot) -> Vec<BucketKey> {
    snapshot.routing().iter().map(|b| b.key).collect()
}

#[test]
fn test_single_solvent_front_mutation() {
    let snap = run(fixtures::snapshot("CASE_1", vec![fixtures::alk_snv("G1202R")]));

    assert_eq!(flag_names(&snap), vec!["has_G1202R", "alk_category_solvent_front"]);
    let entries = snap.ledger().entries();
    assert_eq!(entries.len(), 2);
    assert_eq!((entries[0].evidence_id, entries[0].layer), (EvidenceId(1), EvidenceLayer::Known));
    assert_eq!((entries[1].evidence_id, entries[1].layer), (EvidenceId(2), EvidenceLayer::Inferred));

    assert_eq!(top_class(&snap), MechanismClass::OnTargetAlk);
    assert!(score_of(&snap, MechanismClass::OnTargetAlk) > 0.0);
    assert_eq!(score_of(&snap, MechanismClass::Bypass), 0.0);
    assert_eq!(score_of(&snap, MechanismClass::Persistence), 0.0);
    assert_eq!(snap.verdict(), &Verdict::Supported { top: MechanismClass::OnTargetAlk });

    assert_eq!(bucket_keys(&snap), vec![BucketKey::A, BucketKey::C]);
    assert_eq!(snap.routing()[0].justification, "selected by alk_category_solvent_front");
    assert_provenance(&snap);
}

#[test]
fn test_compound_mutation_scores_higher_than_single() {
    let single = run(fixtures::snapshot("CASE_1", vec![fixtures::alk_snv("G1202R")]));
    let compound = run(fixtures::snapshot(
        "CASE_2",
        vec![fixtures::alk_snv("G1202R"), fixtures::alk_snv("L1196M")],
    ));

    let names = flag_names(&compound);
    for expected in ["has_G1202R", "has_L1196M", "has_compound_alk_mutations"] {
        assert!(names.contains(&expected), "missing {expected} in {names:?}");
    }
    assert!(
        score_of(&compound, MechanismClass::OnTargetAlk) > score_of(&single, MechanismClass::OnTargetAlk)
    );
    assert!(bucket_keys(&compound).contains(&BucketKey::B));
    assert_provenance(&compound);
}

#[test]
fn test_changes_outside_site_table_still_count() {
    let snap = run(fixtures::snapshot(
        "CASE_8",
        vec![fixtures::alk_snv("R1275Q"), fixtures::alk_snv("F1245C")],
    ));

    assert_eq!(
        flag_names(&snap),
        vec!["has_R1275Q", "alk_category_unclassified", "has_F1245C", "has_compound_alk_mutations"]
    );
    assert!(score_of(&snap, MechanismClass::OnTargetAlk) > 0.5);
    assert_eq!(snap.verdict(), &Verdict::Supported { top: MechanismClass::OnTargetAlk });
    assert_eq!(bucket_keys(&snap), vec![BucketKey::A, BucketKey::B, BucketKey::C]);
    assert_eq!(snap.routing()[0].justification, "selected by alk_category_unclassified");
    assert_provenance(&snap);
}

#[test]
fn test_met_amplification_is_bypass() {
    let snap = run(fixtures::snapshot("CASE_3", vec![fixtures::met_amp(8.0)]));

    assert_eq!(flag_names(&snap), vec!["bypass_MET_event"]);
    assert_eq!(top_class(&snap), MechanismClass::Bypass);
    assert_eq!(score_of(&snap, MechanismClass::OnTargetAlk), 0.0);
    assert_eq!(score_of(&snap, MechanismClass::Persistence), 0.0);
    assert_eq!(bucket_keys(&snap), vec![BucketKey::E]);
    assert_eq!(snap.routing()[0].justification, "selected by bypass_MET_event");
    assert_provenance(&snap);
}

#[test]
fn test_met_below_threshold_is_ignored() {
    let snap = run(fixtures::snapshot("CASE_3b", vec![fixtures::met_amp(4.0)]));
    assert!(snap.features().is_empty());
    assert_eq!(snap.verdict(), &Verdict::NoEvidence);
}

#[test]
fn test_elevated_signature_is_persistence() {
    let snap = run(fixtures::snapshot_with_expression("CASE_4", vec![], fixtures::expression_with_score(1.8)));

    assert_eq!(flag_names(&snap), vec!["signature_elevated"]);
    assert_eq!(top_class(&snap), MechanismClass::Persistence);
    assert_eq!(score_of(&snap, MechanismClass::OnTargetAlk), 0.0);
    assert_eq!(score_of(&snap, MechanismClass::Bypass), 0.0);
    assert_eq!(bucket_keys(&snap), vec![BucketKey::D]);
    assert_provenance(&snap);
}

#[test]
fn test_on_target_plus_bypass_is_mixed_mode() {
    let snap = run(fixtures::snapshot(
        "CASE_5",
        vec![fixtures::alk_snv("G1202R"), fixtures::met_amp(8.0)],
    ));

    let threshold = EngineConfig::default().rules.scoring.significance_threshold;
    for class in [MechanismClass::OnTargetAlk, MechanismClass::Bypass] {
        assert!(score_of(&snap, class) > threshold, "{class} not significant");
        let s = snap.mechanism_scores().iter().find(|s| s.class == class).unwrap();
        assert!(s.contradicted, "{class} not marked contradicted");
    }
    let persistence = snap.mechanism_scores().iter().find(|s| s.class == MechanismClass::Persistence).unwrap();
    assert!(!persistence.contradicted);

    let speculative: Vec<_> = snap
        .ledger()
        .entries()
        .iter()
        .filter(|e| e.layer == EvidenceLayer::Speculative)
        .collect();
    assert_eq!(speculative.len(), 1);
    assert_eq!(speculative[0].feature_name, "mixed_mode");
    assert_eq!(snap.ledger().entries().last().map(|e| e.feature_name.as_str()), Some("mixed_mode"));

    assert_eq!(
        snap.verdict(),
        &Verdict::MixedMode { classes: vec![MechanismClass::OnTargetAlk, MechanismClass::Bypass] }
    );
    assert!(bucket_keys(&snap).contains(&BucketKey::E));
    assert_provenance(&snap);
}

#[test]
fn test_empty_case_is_no_evidence_not_error() {
    let snap = run(fixtures::snapshot("CASE_6", vec![]));

    assert!(snap.mechanism_scores().iter().all(|s| s.score == 0.0));
    assert_eq!(snap.mechanism_scores().len(), 3);
    assert!(snap.ledger().is_empty());
    assert!(snap.routing().is_empty());
    assert_eq!(snap.verdict(), &Verdict::NoEvidence);
    assert!(snap.is_no_evidence());
}

#[test]
fn test_unrelated_gene_is_ignored() {
    let snap = run(fixtures::snapshot(
        "CASE_7",
        vec![alkrecon_common::Alteration::new("TP53", alkrecon_common::VariantType::Snv).with_protein_change("R273H")],
    ));
    assert!(snap.features().is_empty());
    assert!(snap.ledger().is_empty());
}
