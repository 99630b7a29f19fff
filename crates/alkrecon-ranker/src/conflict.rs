//! Contradiction (mixed-mode) detection.
//!
//! Two or more classes above the significance threshold are all marked
//! contradicted. Scores are never rewritten; the conflict is added as one
//! SPECULATIVE `mixed_mode` ledger entry per snapshot.

use std::collections::BTreeSet;

use alkrecon_common::{
    EvidenceDraft, EvidenceId, FeatureSet, FeatureValue, MechanismClass, MechanismScore, SourceRef,
};

pub const MIXED_MODE_FLAG: &str = "mixed_mode";

/// Classes strictly above `threshold`, in declaration order, when there are
/// at least two of them.
pub fn detect(scores: &[MechanismScore], threshold: f64) -> Option<Vec<MechanismClass>> {
    let significant: BTreeSet<MechanismClass> = scores
        .iter()
        .filter(|s| s.score > threshold)
        .map(|s| s.class)
        .collect();
    (significant.len() >= 2).then(|| significant.into_iter().collect())
}

/// Set `contradicted` on every significant class. Returns the classes marked.
pub fn mark_contradictions(scores: &mut [MechanismScore], threshold: f64) -> Option<Vec<MechanismClass>> {
    let classes = detect(scores, threshold)?;
    for s in scores.iter_mut() {
        if classes.contains(&s.class) {
            s.contradicted = true;
        }
    }
    Some(classes)
}

/// Ledger draft for the mixed-mode marker, citing the evidence behind every
/// contributing flag of the contradicted classes.
pub fn mixed_mode_draft(scores: &[MechanismScore], flags: &FeatureSet) -> Option<EvidenceDraft> {
    let contradicted: BTreeSet<MechanismClass> =
        scores.iter().filter(|s| s.contradicted).map(|s| s.class).collect();
    if contradicted.len() < 2 {
        return None;
    }

    let mut ids: BTreeSet<EvidenceId> = BTreeSet::new();
    for s in scores.iter().filter(|s| s.contradicted) {
        for name in &s.contributing_flags {
            if let Some(flag) = flags.get(name) {
                ids.extend(flag.evidence_ids.iter().copied());
            }
        }
    }
    if ids.is_empty() {
        return None;
    }

    let label: Vec<&str> = contradicted.iter().map(MechanismClass::as_str).collect();
    let detail: Vec<String> = scores
        .iter()
        .filter(|s| s.contradicted)
        .map(|s| format!("{}={:.2}", s.class, s.score))
        .collect();

    Some(
        EvidenceDraft::speculative(MIXED_MODE_FLAG, FeatureValue::Text(label.join("+")))
            .cite(SourceRef::Evidence { ids: ids.into_iter().collect() })
            .note(format!("significant in more than one class: {}", detail.join(", "))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use alkrecon_common::EvidenceLayer;

    fn score(class: MechanismClass, score: f64, flags: &[&str]) -> MechanismScore {
        MechanismScore {
            class,
            score,
            contributing_flags: flags.iter().map(|f| f.to_string()).collect(),
            contradicted: false,
        }
    }

    #[test]
    fn test_single_significant_class_is_not_a_conflict() {
        let scores = vec![
            score(MechanismClass::OnTargetAlk, 0.75, &["has_G1202R"]),
            score(MechanismClass::Bypass, 0.2, &["bypass_pathway_mapk"]),
        ];
        assert!(detect(&scores, 0.5).is_none());
    }

    #[test]
    fn test_threshold_is_strict() {
        let scores = vec![
            score(MechanismClass::OnTargetAlk, 0.5, &[]),
            score(MechanismClass::Bypass, 0.7, &[]),
        ];
        assert!(detect(&scores, 0.5).is_none());
    }

    #[test]
    fn test_three_way_conflict_marks_all() {
        let mut scores = vec![
            score(MechanismClass::Persistence, 0.75, &[]),
            score(MechanismClass::OnTargetAlk, 0.75, &[]),
            score(MechanismClass::Bypass, 0.7, &[]),
        ];
        let classes = mark_contradictions(&mut scores, 0.5).unwrap();
        assert_eq!(classes, MechanismClass::ALL.to_vec());
        assert!(scores.iter().all(|s| s.contradicted));
    }

    #[test]
    fn test_mixed_mode_draft_cites_contributing_evidence() {
        let mut flags = FeatureSet::new();
        flags.record("has_G1202R", FeatureValue::Bool(true), EvidenceLayer::Known, EvidenceId(1));
        flags.record("alk_category_solvent_front", FeatureValue::Bool(true), EvidenceLayer::Inferred, EvidenceId(2));
        flags.record("bypass_MET_event", FeatureValue::Bool(true), EvidenceLayer::Known, EvidenceId(3));

        let mut scores = vec![
            score(MechanismClass::OnTargetAlk, 0.75, &["has_G1202R", "alk_category_solvent_front"]),
            score(MechanismClass::Bypass, 0.7, &["bypass_MET_event"]),
            score(MechanismClass::Persistence, 0.0, &[]),
        ];
        mark_contradictions(&mut scores, 0.5);

        let draft = mixed_mode_draft(&scores, &flags).unwrap();
        assert_eq!(draft.layer, EvidenceLayer::Speculative);
        assert_eq!(draft.feature_value, FeatureValue::Text("on_target_alk+bypass".into()));
        assert_eq!(
            draft.source_ref,
            Some(SourceRef::Evidence { ids: vec![EvidenceId(1), EvidenceId(2), EvidenceId(3)] })
        );
    }
}
