//! On-target ALK rule family.

use std::collections::BTreeSet;

use alkrecon_common::{EvidenceDraft, FeatureValue, SourceRef, VariantType};

use crate::extractor::{FeatureExtractor, Recorder};

pub const COMPOUND_FLAG: &str = "has_compound_alk_mutations";

/// For each parsed ALK change, one KNOWN `has_<change>` entry followed by an
/// INFERRED `alk_category_<category>` entry. Changes no site category lists
/// fall into the unlisted category, or are skipped when that is switched off.
/// Then the compound flag when enough distinct changes were recorded.
pub(crate) fn extract(ex: &FeatureExtractor, rec: &mut Recorder<'_>) {
    let rules = &ex.rules().alk;
    let target = rules.gene.to_uppercase();

    let mut distinct = BTreeSet::new();
    let mut cited = Vec::new();

    let alterations = rec.sources.alterations;
    for (index, alt) in alterations.iter().enumerate() {
        if alt.gene_symbol() != target {
            continue;
        }
        // Amplifications and fusions carry no resistance site.
        if !matches!(alt.variant_type, VariantType::Snv | VariantType::Other) {
            continue;
        }
        let Some(change) = alt.protein_change.as_deref().and_then(|raw| ex.normalise(raw)) else {
            continue;
        };
        let (category, listed) = match ex.site_category(&change) {
            Some(category) => (category, true),
            None if rules.classify_unlisted => (rules.unlisted_category.as_str(), false),
            None => continue,
        };

        let mut observed = EvidenceDraft::known(format!("has_{change}"), FeatureValue::Bool(true))
            .cite(SourceRef::Alteration { index })
            .gene(&rules.gene);
        if let Some(vaf) = alt.vaf {
            observed = observed.note(format!("vaf={vaf}"));
        }
        if rec.emit(observed).is_none() {
            continue;
        }

        rec.emit(
            EvidenceDraft::inferred(format!("alk_category_{category}"), FeatureValue::Bool(true))
                .cite(SourceRef::Alteration { index })
                .gene(&rules.gene)
                .note(if listed {
                    format!("{change} is a {} site", category.replace('_', " "))
                } else {
                    format!("{change} is not in the site table")
                }),
        );

        if distinct.insert(change) {
            cited.push(index);
        }
    }

    if distinct.len() >= rules.compound_threshold {
        let changes: Vec<&str> = distinct.iter().map(String::as_str).collect();
        rec.emit(
            EvidenceDraft::inferred(COMPOUND_FLAG, FeatureValue::Bool(true))
                .cite(SourceRef::Alterations { indices: cited })
                .gene(&rules.gene)
                .note(format!(
                    "{} distinct resistance changes: {}",
                    changes.len(),
                    changes.join(", ")
                )),
        );
    }
}
