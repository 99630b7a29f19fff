//! Configuration files drive the engine end to end.

use alkrecon_common::{BucketKey, ConfigError, EngineConfig, MechanismClass};
use alkrecon_engine::{CaseOutcome, Engine};
use alkrecon_test_utils::fixtures;
use pretty_assertions::assert_eq;

const EXAMPLE_TOML: &str = include_str!("../../../alkrecon.example.toml");

#[test]
fn test_example_file_matches_built_in_defaults() {
    let config = EngineConfig::from_toml(EXAMPLE_TOML).expect("example config parses");
    assert_eq!(config, EngineConfig::default());
}

#[test]
fn test_partial_file_overrides_only_what_it_names() {
    let config = EngineConfig::from_toml("[rules.bypass]\ncn_amp_min = 10.0\n").unwrap();
    assert_eq!(config.rules.bypass.cn_amp_min, 10.0);
    assert_eq!(config.rules.alk, EngineConfig::default().rules.alk);

    let engine = Engine::new(config).unwrap();
    match engine.run_case(fixtures::snapshot("CASE_3", vec![fixtures::met_amp(8.0)])) {
        CaseOutcome::Complete { snapshot } => assert!(snapshot.features().is_empty()),
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[test]
fn test_custom_routing_table_from_yaml() {
    let yaml = r#"
routing:
  rules:
    - bucket: D
      when:
        op: top_mechanism
        class: bypass
"#;
    let config = EngineConfig::from_yaml(yaml).unwrap();
    let engine = Engine::new(config).unwrap();
    let outcome = engine.run_case(fixtures::snapshot("CASE_3", vec![fixtures::met_amp(8.0)]));
    let snapshot = outcome.snapshot().unwrap();
    assert_eq!(snapshot.routing().len(), 1);
    assert_eq!(snapshot.routing()[0].key, BucketKey::D);
    assert_eq!(snapshot.routing()[0].justification, "selected by bypass_MET_event");
}

#[test]
fn test_weight_override_changes_ranking() {
    let json = r#"{"rules": {"scoring": {"weights": {
        "on_target_alk": {"has_*": 0.1},
        "bypass": {"bypass_*_event": 0.9},
        "persistence": {"signature_elevated": 0.75}
    }}}}"#;
    let engine = Engine::new(EngineConfig::from_json(json).unwrap()).unwrap();
    let outcome = engine.run_case(fixtures::snapshot(
        "CASE_5",
        vec![fixtures::alk_snv("G1202R"), fixtures::met_amp(8.0)],
    ));
    let snapshot = outcome.snapshot().unwrap();
    assert_eq!(snapshot.mechanism_scores()[0].class, MechanismClass::Bypass);
    assert!(!snapshot.features().contains("mixed_mode"));
}

#[test]
fn test_malformed_file_names_the_field() {
    let err = EngineConfig::from_toml("[rules.scoring]\nsignificance_threshold = -1.0\n").unwrap_err();
    match err {
        ConfigError::MalformedRuleConfig { field, .. } => assert_eq!(field, "scoring.significance_threshold"),
        other => panic!("unexpected error {other}"),
    }
}

#[test]
fn test_misspelled_threshold_fails_before_any_case_runs() {
    let err = EngineConfig::from_toml("[rules.bypass]\ncn_amp_mn = 10.0\n").unwrap_err();
    assert!(matches!(err, ConfigError::MalformedRuleConfig { .. }));
    assert!(err.to_string().contains("cn_amp_mn"));
}
