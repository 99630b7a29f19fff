//! Fixture builders for alterations, expression summaries and snapshots.

use alkrecon_common::{
    Alteration, CaseKey, CaseSnapshot, EvidenceDraft, ExpressionSummary, FeatureValue, SourceRef,
    VariantType,
};

pub const SAMPLE_ID: &str = "S1";
pub const TIMEPOINT_ID: &str = "T1";

/// ALK SNV with the given protein change and a plausible VAF.
pub fn alk_snv(change: &str) -> Alteration {
    Alteration::new("ALK", VariantType::Snv)
        .with_protein_change(change)
        .with_vaf(0.22)
}

/// MET amplification at copy number `cn`.
pub fn met_amp(cn: f64) -> Alteration {
    Alteration::new("MET", VariantType::Amp).with_copy_number(cn)
}

pub fn egfr_snv(change: &str) -> Alteration {
    Alteration::new("EGFR", VariantType::Snv)
        .with_protein_change(change)
        .with_vaf(0.10)
}

/// Expression summary carrying only a precomputed `persister_score`.
pub fn expression_with_score(score: f64) -> ExpressionSummary {
    ExpressionSummary {
        platform: Some("RNA-seq".to_string()),
        signature_name: Some("persister".to_string()),
        ..ExpressionSummary::default()
    }
    .with_signature_score("persister_score", score)
}

pub fn key(case_id: &str) -> CaseKey {
    CaseKey::new(case_id, SAMPLE_ID, TIMEPOINT_ID)
}

pub fn snapshot(case_id: &str, alterations: Vec<Alteration>) -> CaseSnapshot {
    CaseSnapshot::new(key(case_id), alterations, None)
}

pub fn snapshot_with_expression(
    case_id: &str,
    alterations: Vec<Alteration>,
    expression: ExpressionSummary,
) -> CaseSnapshot {
    CaseSnapshot::new(key(case_id), alterations, Some(expression))
}

/// Complete the extraction stage with the given flag names, each backed by an
/// INFERRED entry citing the case id. For testing later stages in isolation.
pub fn record_flags(snapshot: &mut CaseSnapshot, names: &[&str]) {
    snapshot
        .record_extraction(|sources, ledger, flags| {
            for name in names {
                let draft = EvidenceDraft::inferred(*name, FeatureValue::Bool(true))
                    .cite(SourceRef::Metadata { field: "case_id".to_string() });
                let layer = draft.layer;
                let id = ledger.append(draft, &sources).expect("metadata source resolves");
                flags.record(name, FeatureValue::Bool(true), layer, id);
            }
        })
        .expect("snapshot is freshly ingested");
}
