//! Observation and result types carried by a `CaseSnapshot`.
//! Observations arrive already type-checked from the ingestion layer.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Alteration
// ---------------------------------------------------------------------------

/// Variant classes understood by the rule families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariantType {
    #[serde(rename = "SNV")]
    Snv,
    #[serde(rename = "AMP")]
    Amp,
    #[serde(rename = "FUSION")]
    Fusion,
    #[serde(rename = "OTHER")]
    Other,
}

impl VariantType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariantType::Snv    => "SNV",
            VariantType::Amp    => "AMP",
            VariantType::Fusion => "FUSION",
            VariantType::Other  => "OTHER",
        }
    }

    /// Lenient parse used when grouping ingested rows.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "SNV" | "MISSENSE" | "SNP" => VariantType::Snv,
            "AMP" | "AMPLIFICATION"    => VariantType::Amp,
            "FUSION" | "REARRANGEMENT" => VariantType::Fusion,
            _                          => VariantType::Other,
        }
    }
}

/// One observed genomic event in a case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alteration {
    pub gene: String,
    #[serde(default)]
    pub protein_change: Option<String>,
    pub variant_type: VariantType,
    /// Variant allele fraction, 0.0–1.0.
    #[serde(default)]
    pub vaf: Option<f64>,
    #[serde(default)]
    pub copy_number: Option<f64>,
    #[serde(default)]
    pub note: String,
}

impl Alteration {
    pub fn new(gene: &str, variant_type: VariantType) -> Self {
        Self {
            gene: gene.trim().to_string(),
            protein_change: None,
            variant_type,
            vaf: None,
            copy_number: None,
            note: String::new(),
        }
    }

    pub fn with_protein_change(mut self, change: &str) -> Self {
        self.protein_change = Some(change.trim().to_string());
        self
    }

    pub fn with_vaf(mut self, vaf: f64) -> Self {
        self.vaf = Some(vaf);
        self
    }

    pub fn with_copy_number(mut self, cn: f64) -> Self {
        self.copy_number = Some(cn);
        self
    }

    pub fn with_note(mut self, note: &str) -> Self {
        self.note = note.to_string();
        self
    }

    /// Upper-cased gene symbol used for every rule lookup.
    pub fn gene_symbol(&self) -> String {
        self.gene.trim().to_uppercase()
    }

    /// Whether the record can be cited as a provenance source.
    /// A VAF outside 0–1 or a non-finite copy number means the row is corrupt.
    pub fn is_citable(&self) -> bool {
        if self.gene.trim().is_empty() {
            return false;
        }
        if let Some(vaf) = self.vaf {
            if !vaf.is_finite() || !(0.0..=1.0).contains(&vaf) {
                return false;
            }
        }
        if let Some(cn) = self.copy_number {
            if !cn.is_finite() || cn < 0.0 {
                return false;
            }
        }
        true
    }
}

// ---------------------------------------------------------------------------
// Expression summary
// ---------------------------------------------------------------------------

/// Per-case expression signals derived upstream from an RNA-seq matrix.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExpressionSummary {
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub signature_name: Option<String>,
    /// Precomputed signature scores, e.g. `persister_score`.
    #[serde(default)]
    pub signature_scores: BTreeMap<String, f64>,
    /// Within-case standardised expression per gene (z-scores).
    #[serde(default)]
    pub gene_scores: BTreeMap<String, f64>,
    /// Genes actually present in the source matrix.
    #[serde(default)]
    pub genes_found: Vec<String>,
}

impl ExpressionSummary {
    pub fn with_signature_score(mut self, key: &str, value: f64) -> Self {
        self.signature_scores.insert(key.to_string(), value);
        self
    }

    pub fn with_gene_score(mut self, gene: &str, z: f64) -> Self {
        let gene = gene.trim().to_uppercase();
        if !self.genes_found.contains(&gene) {
            self.genes_found.push(gene.clone());
        }
        self.gene_scores.insert(gene, z);
        self
    }

    /// Finite precomputed score for `key`, if any.
    pub fn signature_score(&self, key: &str) -> Option<f64> {
        self.signature_scores.get(key).copied().filter(|v| v.is_finite())
    }

    /// Finite per-gene score, looked up case-insensitively.
    pub fn gene_score(&self, gene: &str) -> Option<f64> {
        self.gene_scores
            .get(&gene.trim().to_uppercase())
            .copied()
            .filter(|v| v.is_finite())
    }
}

// ---------------------------------------------------------------------------
// Mechanism classes and scores
// ---------------------------------------------------------------------------

/// Top-level resistance mechanism hypotheses.
/// Declaration order is the fallback ranking order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MechanismClass {
    OnTargetAlk,
    Bypass,
    Persistence,
}

impl MechanismClass {
    pub const ALL: [MechanismClass; 3] = [
        MechanismClass::OnTargetAlk,
        MechanismClass::Bypass,
        MechanismClass::Persistence,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MechanismClass::OnTargetAlk => "on_target_alk",
            MechanismClass::Bypass      => "bypass",
            MechanismClass::Persistence => "persistence",
        }
    }
}

impl fmt::Display for MechanismClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Score for one mechanism class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MechanismScore {
    pub class: MechanismClass,
    pub score: f64,
    /// Flag names that contributed, in flag order.
    pub contributing_flags: Vec<String>,
    pub contradicted: bool,
}

// ---------------------------------------------------------------------------
// Routing buckets
// ---------------------------------------------------------------------------

/// Research-strategy buckets (non-prescriptive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BucketKey {
    A,
    B,
    C,
    D,
    E,
}

impl BucketKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            BucketKey::A => "A",
            BucketKey::B => "B",
            BucketKey::C => "C",
            BucketKey::D => "D",
            BucketKey::E => "E",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            BucketKey::A => "next-generation ATP-site inhibitor",
            BucketKey::B => "allosteric conformation lock",
            BucketKey::C => "targeted degradation",
            BucketKey::D => "persistence / epigenetic adjunct",
            BucketKey::E => "sequencing and monitoring logic",
        }
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A selected routing bucket and the flags that selected it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingBucket {
    pub key: BucketKey,
    pub justification: String,
}
