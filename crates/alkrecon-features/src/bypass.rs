//! Bypass-signalling rule family.

use alkrecon_common::{Alteration, EvidenceDraft, FeatureValue, SourceRef, VariantType};

use crate::extractor::{FeatureExtractor, Recorder};

/// Why an alteration counts as an activating bypass event, if it does.
fn activation(ex: &FeatureExtractor, gene: &str, alt: &Alteration) -> Option<String> {
    let rules = &ex.rules().bypass;
    match alt.variant_type {
        VariantType::Amp => alt
            .copy_number
            .filter(|cn| *cn >= rules.cn_amp_min)
            .map(|cn| format!("AMP copy_number={cn} (min {})", rules.cn_amp_min)),
        VariantType::Snv => {
            let raw = alt.protein_change.as_deref().unwrap_or_default();
            match ex.hotspots(gene) {
                None => Some(if raw.is_empty() { "SNV".to_string() } else { format!("SNV {raw}") }),
                Some(hotspots) => {
                    let change = ex.normalise(raw)?;
                    hotspots
                        .iter()
                        .any(|h| *h == change)
                        .then(|| format!("SNV {change} (hotspot)"))
                }
            }
        }
        VariantType::Fusion | VariantType::Other => None,
    }
}

/// One KNOWN `bypass_<GENE>_event` entry per qualifying alteration, then one
/// INFERRED `bypass_pathway_<name>` per pathway with a qualifying member.
pub(crate) fn extract(ex: &FeatureExtractor, rec: &mut Recorder<'_>) {
    let rules = &ex.rules().bypass;
    let mut recorded: Vec<(usize, String)> = Vec::new();

    let alterations = rec.sources.alterations;
    for (index, alt) in alterations.iter().enumerate() {
        let gene = alt.gene_symbol();
        let Some(canonical) = rules.canonical(&gene) else {
            continue;
        };
        let Some(reason) = activation(ex, &gene, alt) else {
            continue;
        };

        let draft = EvidenceDraft::known(format!("bypass_{canonical}_event"), FeatureValue::Bool(true))
            .cite(SourceRef::Alteration { index })
            .gene(canonical)
            .note(reason);
        if rec.emit(draft).is_some() {
            recorded.push((index, gene));
        }
    }

    for (name, members) in &rules.pathways {
        let hits: Vec<&(usize, String)> = recorded
            .iter()
            .filter(|(_, gene)| members.iter().any(|m| m.eq_ignore_ascii_case(gene)))
            .collect();
        if hits.is_empty() {
            continue;
        }
        // first-seen order, each gene once
        let mut genes: Vec<&str> = Vec::new();
        for (_, gene) in &hits {
            if !genes.contains(&gene.as_str()) {
                genes.push(gene.as_str());
            }
        }
        rec.emit(
            EvidenceDraft::inferred(format!("bypass_pathway_{name}"), FeatureValue::Bool(true))
                .cite(SourceRef::Alterations { indices: hits.iter().map(|(i, _)| *i).collect() })
                .note(format!("{name} members hit: {}", genes.join(", "))),
        );
    }
}

#[cfg(test)]
mod tests {
    use alkrecon_common::rule_config::RuleConfig;
    use alkrecon_common::{Alteration, SourceRef, VariantType};
    use alkrecon_test_utils::fixtures;
    use pretty_assertions::assert_eq;

    use crate::FeatureExtractor;

    fn run(alterations: Vec<Alteration>) -> alkrecon_common::CaseSnapshot {
        let extractor = FeatureExtractor::new(&RuleConfig::default()).unwrap();
        let mut snap = fixtures::snapshot("CASE_1", alterations);
        extractor.extract(&mut snap).unwrap();
        snap
    }

    #[test]
    fn test_met_amplification_above_threshold() {
        let snap = run(vec![fixtures::met_amp(8.0)]);
        assert_eq!(snap.features().names(), vec!["bypass_MET_event"]);
        assert_eq!(
            snap.ledger().entries()[0].source_ref,
            Some(SourceRef::Alteration { index: 0 })
        );
    }

    #[test]
    fn test_amplification_below_threshold_or_missing_cn_is_ignored() {
        let missing_cn = Alteration::new("MET", VariantType::Amp);
        let snap = run(vec![fixtures::met_amp(4.0), missing_cn]);
        assert!(snap.features().is_empty());
        assert!(snap.ledger().is_empty());
    }

    #[test]
    fn test_hotspot_gene_requires_listed_change() {
        let hot = Alteration::new("KRAS", VariantType::Snv).with_protein_change("p.Gly12Cys");
        let cold = Alteration::new("KRAS", VariantType::Snv).with_protein_change("A146T");
        let snap = run(vec![cold, hot]);
        assert_eq!(snap.features().names(), vec!["bypass_KRAS_event", "bypass_pathway_mapk"]);
        assert_eq!(
            snap.ledger().entries()[1].source_ref,
            Some(SourceRef::Alterations { indices: vec![1] })
        );
    }

    #[test]
    fn test_pathway_note_names_each_gene_once() {
        let snap = run(vec![
            Alteration::new("KRAS", VariantType::Snv).with_protein_change("G12C"),
            Alteration::new("NRAS", VariantType::Snv).with_protein_change("Q61K"),
            Alteration::new("KRAS", VariantType::Snv).with_protein_change("G12D"),
        ]);
        let pathway = snap
            .ledger()
            .entries()
            .iter()
            .find(|e| e.feature_name == "bypass_pathway_mapk")
            .unwrap();
        assert_eq!(pathway.note.as_deref(), Some("mapk members hit: KRAS, NRAS"));
        assert_eq!(pathway.source_ref, Some(SourceRef::Alterations { indices: vec![0, 1, 2] }));
    }

    #[test]
    fn test_gene_without_hotspots_accepts_any_snv() {
        let snap = run(vec![Alteration::new("egfr", VariantType::Snv).with_protein_change("T790M")]);
        assert_eq!(snap.features().names(), vec!["bypass_EGFR_event"]);
    }

    #[test]
    fn test_unlisted_gene_is_silently_ignored() {
        let snap = run(vec![Alteration::new("TP53", VariantType::Snv).with_protein_change("R273H")]);
        assert!(snap.features().is_empty());
    }
}
