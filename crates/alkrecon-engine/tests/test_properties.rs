//! Cross-cutting guarantees over varied inputs: provenance, determinism,
//! monotonicity and batch isolation.

use alkrecon_common::{
    Alteration, CaseKey, CaseSnapshot, EngineConfig, MechanismClass, VariantType,
};
use alkrecon_engine::{CaseOutcome, Engine, PARALLEL_THRESHOLD};
use alkrecon_test_utils::assertions::{assert_provenance, score_of};
use alkrecon_test_utils::fixtures;
use pretty_assertions::assert_eq;

fn engine() -> Engine {
    Engine::new(EngineConfig::default()).expect("default config is valid")
}

fn varied_cases() -> Vec<CaseSnapshot> {
    vec![
        fixtures::snapshot("P01", vec![fixtures::alk_snv("G1202R")]),
        fixtures::snapshot("P02", vec![fixtures::alk_snv("G1202R"), fixtures::alk_snv("L1196M")]),
        fixtures::snapshot("P03", vec![fixtures::met_amp(8.0)]),
        fixtures::snapshot_with_expression("P04", vec![], fixtures::expression_with_score(1.8)),
        fixtures::snapshot("P05", vec![fixtures::alk_snv("G1202R"), fixtures::met_amp(8.0)]),
        fixtures::snapshot("P06", vec![]),
        fixtures::snapshot("P07", vec![fixtures::egfr_snv("L858R"), fixtures::alk_snv("p.Gly1269Ala")]),
        fixtures::snapshot(
            "P08",
            vec![
                Alteration::new("KRAS", VariantType::Snv).with_protein_change("G12C"),
                Alteration::new("BRAF", VariantType::Snv).with_protein_change("V600E"),
            ],
        ),
        fixtures::snapshot_with_expression(
            "P09",
            vec![fixtures::alk_snv("I1171N")],
            fixtures::expression_with_score(0.4),
        ),
        fixtures::snapshot("P10", vec![Alteration::new("ALK", VariantType::Fusion).with_note("EML4-ALK v3")]),
        fixtures::snapshot("P11", vec![fixtures::alk_snv("G1202R").with_vaf(1.7)]),
    ]
}

fn processed(outcome: &CaseOutcome) -> &CaseSnapshot {
    outcome.snapshot().unwrap_or_else(|| panic!("{} failed: {outcome:?}", outcome.key()))
}

#[test]
fn test_every_flag_is_backed_and_ids_are_contiguous() {
    let report = engine().run_batch(varied_cases());
    assert_eq!(report.summary.failed, 0);
    for outcome in &report.outcomes {
        let snap = processed(outcome);
        assert!(snap.ledger().len() >= snap.features().len());
        assert_provenance(snap);
    }
}

#[test]
fn test_scores_are_non_negative_and_complete() {
    let report = engine().run_batch(varied_cases());
    for snap in report.snapshots() {
        assert_eq!(snap.mechanism_scores().len(), MechanismClass::ALL.len());
        assert!(snap.mechanism_scores().iter().all(|s| s.score >= 0.0 && s.score.is_finite()));
    }
}

#[test]
fn test_identical_input_gives_identical_output() {
    let engine = engine();
    for snapshot in varied_cases() {
        let first = engine.run_case(snapshot.clone());
        let second = engine.run_case(snapshot);
        let a = processed(&first).to_json().unwrap();
        let b = processed(&second).to_json().unwrap();
        assert_eq!(a, b);
    }
}

#[test]
fn test_adding_a_qualifying_alteration_never_lowers_its_class() {
    let engine = engine();
    let base = vec![fixtures::alk_snv("G1202R")];
    let before = engine.run_case(fixtures::snapshot("M1", base.clone()));

    let mut extended = base;
    extended.push(fixtures::alk_snv("F1174L"));
    let after = engine.run_case(fixtures::snapshot("M1", extended));

    assert!(
        score_of(processed(&after), MechanismClass::OnTargetAlk)
            >= score_of(processed(&before), MechanismClass::OnTargetAlk)
    );
}

#[test]
fn test_snapshot_json_round_trip_preserves_result() {
    let engine = engine();
    let outcome = engine.run_case(fixtures::snapshot(
        "RT",
        vec![fixtures::alk_snv("G1202R"), fixtures::met_amp(8.0)],
    ));
    let snap = processed(&outcome);
    let restored = CaseSnapshot::from_json(&snap.to_json().unwrap()).unwrap();
    assert_eq!(&restored, snap);
    assert!(restored.audit().is_ok());
}

#[test]
fn test_large_batch_keeps_input_order() {
    let cases: Vec<CaseSnapshot> = (0..PARALLEL_THRESHOLD * 4)
        .map(|i| {
            let alts = if i % 3 == 0 { vec![fixtures::met_amp(8.0)] } else { vec![fixtures::alk_snv("L1196M")] };
            fixtures::snapshot(&format!("B{i:03}"), alts)
        })
        .collect();
    let keys: Vec<CaseKey> = cases.iter().map(CaseSnapshot::key).collect();

    let report = engine().run_batch(cases);
    let out: Vec<CaseKey> = report.outcomes.iter().map(CaseOutcome::key).collect();
    assert_eq!(out, keys);
    assert_eq!(report.summary.total, PARALLEL_THRESHOLD * 4);
}

#[test]
fn test_failing_case_does_not_disturb_neighbours() {
    let mut cases = varied_cases();
    cases.insert(3, CaseSnapshot::new(CaseKey::new("P_BAD", "", "T1"), vec![], None));
    let expected_ok = cases.len() - 1;

    let report = engine().run_batch(cases);
    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.summary.complete + report.summary.partial, expected_ok);
    assert!(matches!(report.outcomes[3], CaseOutcome::Failed { .. }));
}

#[test]
fn test_corrupt_alteration_drops_flag_but_case_completes() {
    let outcome = engine().run_case(fixtures::snapshot("P11", vec![fixtures::alk_snv("G1202R").with_vaf(1.7)]));
    match outcome {
        CaseOutcome::Partial { snapshot, warnings } => {
            assert!(!warnings.is_empty());
            assert!(!snapshot.features().contains("has_G1202R"));
            assert!(!snapshot.features().contains("alk_category_solvent_front"));
            assert_provenance(&snapshot);
        }
        other => panic!("expected partial outcome, got {other:?}"),
    }
}
