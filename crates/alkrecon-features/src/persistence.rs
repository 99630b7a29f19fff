//! Persistence (drug-tolerant persister) rule family.

use alkrecon_common::rule_config::PersistenceRules;
use alkrecon_common::{EvidenceDraft, ExpressionSummary, FeatureValue, SourceRef, SourceType};

use crate::extractor::Recorder;

pub const SIGNATURE_FLAG: &str = "signature_elevated";

/// A computed signature score and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureScore {
    pub score: f64,
    pub source: SourceRef,
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

/// `mean(up) − mean(down)` over signature genes present in the case, when at
/// least `min_genes` up-genes are present. Otherwise the precomputed
/// `signature_scores[score_key]`.
pub fn signature_score(rules: &PersistenceRules, expr: &ExpressionSummary) -> Option<SignatureScore> {
    let present = |genes: &[String]| -> Vec<(String, f64)> {
        genes
            .iter()
            .filter_map(|g| expr.gene_score(g).map(|z| (g.to_uppercase(), z)))
            .collect()
    };
    let up = present(&rules.up_genes);
    let down = present(&rules.down_genes);

    if up.len() >= rules.min_genes {
        let up_z: Vec<f64> = up.iter().map(|(_, z)| *z).collect();
        let down_z: Vec<f64> = down.iter().map(|(_, z)| *z).collect();
        let score = mean(&up_z)? - mean(&down_z).unwrap_or(0.0);
        let genes = up.into_iter().chain(down).map(|(g, _)| g).collect();
        return Some(SignatureScore { score, source: SourceRef::ExpressionGenes { genes } });
    }

    expr.signature_score(&rules.score_key).map(|score| SignatureScore {
        score,
        source: SourceRef::ExpressionScore { key: rules.score_key.clone() },
    })
}

pub(crate) fn extract(rules: &PersistenceRules, rec: &mut Recorder<'_>) {
    let Some(expr) = rec.sources.expression else {
        return;
    };
    let Some(sig) = signature_score(rules, expr) else {
        return;
    };
    if !sig.score.is_finite() || sig.score < rules.threshold {
        return;
    }

    rec.emit(
        EvidenceDraft::inferred(SIGNATURE_FLAG, FeatureValue::Number(sig.score))
            .source_type(SourceType::Expression)
            .cite(sig.source)
            .note(format!("score {:.3} >= threshold {}", sig.score, rules.threshold)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use alkrecon_common::rule_config::RuleConfig;
    use alkrecon_test_utils::fixtures;

    use crate::FeatureExtractor;

    #[test]
    fn test_gene_level_score_takes_precedence() {
        let rules = PersistenceRules {
            up_genes: vec!["AXL".into(), "VIM".into(), "CD44".into()],
            down_genes: vec!["CDH1".into()],
            min_genes: 2,
            ..PersistenceRules::default()
        };
        let expr = ExpressionSummary::default()
            .with_signature_score("persister_score", 0.1)
            .with_gene_score("AXL", 2.0)
            .with_gene_score("VIM", 1.0)
            .with_gene_score("CDH1", -1.0);

        let sig = signature_score(&rules, &expr).unwrap();
        assert!((sig.score - 2.5).abs() < 1e-12);
        assert_eq!(
            sig.source,
            SourceRef::ExpressionGenes { genes: vec!["AXL".into(), "VIM".into(), "CDH1".into()] }
        );
    }

    #[test]
    fn test_falls_back_to_precomputed_score() {
        let expr = ExpressionSummary::default().with_signature_score("persister_score", 1.4);
        let sig = signature_score(&PersistenceRules::default(), &expr).unwrap();
        assert_eq!(sig.score, 1.4);
        assert_eq!(sig.source, SourceRef::ExpressionScore { key: "persister_score".into() });
    }

    #[test]
    fn test_elevated_signature_is_flagged_with_numeric_value() {
        let extractor = FeatureExtractor::new(&RuleConfig::default()).unwrap();
        let mut snap = fixtures::snapshot_with_expression("CASE_4", vec![], fixtures::expression_with_score(1.8));
        extractor.extract(&mut snap).unwrap();

        let flag = snap.features().get(SIGNATURE_FLAG).unwrap();
        assert_eq!(flag.value, FeatureValue::Number(1.8));
        assert_eq!(snap.ledger().entries()[0].source_type, SourceType::Expression);
    }

    #[test]
    fn test_below_threshold_and_nan_are_not_flagged() {
        let extractor = FeatureExtractor::new(&RuleConfig::default()).unwrap();
        for score in [0.4, f64::NAN] {
            let mut snap =
                fixtures::snapshot_with_expression("CASE_4", vec![], fixtures::expression_with_score(score));
            extractor.extract(&mut snap).unwrap();
            assert!(snap.features().is_empty());
        }
    }
}
