//! Append-only evidence ledger and the feature flags it backs.
//!
//! Entries reference their origin by index (alteration position, expression
//! field, or earlier evidence ids), never by pointer, so the ledger is a plain
//! insertion-ordered arena. Ids start at 1 and are never reused.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entities::{Alteration, ExpressionSummary};
use crate::error::ProvenanceError;

// ---------------------------------------------------------------------------
// Identifiers and vocabularies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvidenceId(pub u32);

impl fmt::Display for EvidenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

/// Provenance layer: observed, derived, or labelled hypothesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvidenceLayer {
    Known,
    Inferred,
    Speculative,
}

impl EvidenceLayer {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvidenceLayer::Known       => "KNOWN",
            EvidenceLayer::Inferred    => "INFERRED",
            EvidenceLayer::Speculative => "SPECULATIVE",
        }
    }

    /// KNOWN and INFERRED entries must cite a resolvable source.
    pub fn requires_source(&self) -> bool {
        !matches!(self, EvidenceLayer::Speculative)
    }
}

impl fmt::Display for EvidenceLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Variants,
    Expression,
    Metadata,
    Derived,
}

/// Pointer back to the datum an entry was computed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceRef {
    /// One alteration, by position in the snapshot.
    Alteration { index: usize },
    /// Several alterations (compound or pathway-level facts).
    Alterations { indices: Vec<usize> },
    /// `ExpressionSummary::signature_scores[key]`.
    ExpressionScore { key: String },
    /// `ExpressionSummary::gene_scores` for the listed genes.
    ExpressionGenes { genes: Vec<String> },
    /// A snapshot identity field.
    Metadata { field: String },
    /// Earlier ledger entries.
    Evidence { ids: Vec<EvidenceId> },
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceRef::Alteration { index } => write!(f, "alterations[{index}]"),
            SourceRef::Alterations { indices } => {
                let idx: Vec<String> = indices.iter().map(|i| i.to_string()).collect();
                write!(f, "alterations[{}]", idx.join(","))
            }
            SourceRef::ExpressionScore { key } => write!(f, "expression.signature_scores[{key}]"),
            SourceRef::ExpressionGenes { genes } => {
                write!(f, "expression.gene_scores[{}]", genes.join(","))
            }
            SourceRef::Metadata { field } => write!(f, "metadata.{field}"),
            SourceRef::Evidence { ids } => {
                let ids: Vec<String> = ids.iter().map(|i| i.to_string()).collect();
                write!(f, "evidence[{}]", ids.join(","))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Source resolution
// ---------------------------------------------------------------------------

/// Checks that a source reference points at a real, citable datum.
pub trait SourceResolver {
    fn resolves(&self, source_ref: &SourceRef) -> bool;
}

/// Read-only view of a snapshot's observations.
#[derive(Debug, Clone, Copy)]
pub struct CaseSources<'a> {
    pub alterations: &'a [Alteration],
    pub expression: Option<&'a ExpressionSummary>,
    pub has_study_id: bool,
}

impl SourceResolver for CaseSources<'_> {
    fn resolves(&self, source_ref: &SourceRef) -> bool {
        let citable = |i: &usize| self.alterations.get(*i).is_some_and(Alteration::is_citable);
        match source_ref {
            SourceRef::Alteration { index } => citable(index),
            SourceRef::Alterations { indices } => !indices.is_empty() && indices.iter().all(citable),
            SourceRef::ExpressionScore { key } => self
                .expression
                .and_then(|e| e.signature_score(key))
                .is_some(),
            SourceRef::ExpressionGenes { genes } => match self.expression {
                Some(expr) => !genes.is_empty() && genes.iter().all(|g| expr.gene_score(g).is_some()),
                None => false,
            },
            SourceRef::Metadata { field } => match field.as_str() {
                "case_id" | "sample_id" | "timepoint_id" => true,
                "study_id" => self.has_study_id,
                _ => false,
            },
            // Resolved by the ledger itself.
            SourceRef::Evidence { .. } => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

/// Value attached to a feature flag / ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl FeatureValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FeatureValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            FeatureValue::Bool(b)   => *b,
            FeatureValue::Number(n) => n.is_finite(),
            FeatureValue::Text(s)   => !s.is_empty(),
        }
    }
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureValue::Bool(b)   => write!(f, "{b}"),
            FeatureValue::Number(n) => write!(f, "{n:.3}"),
            FeatureValue::Text(s)   => f.write_str(s),
        }
    }
}

/// An entry before the ledger assigns its id.
#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceDraft {
    pub layer: EvidenceLayer,
    pub feature_name: String,
    pub feature_value: FeatureValue,
    pub source_type: SourceType,
    pub source_ref: Option<SourceRef>,
    pub gene: Option<String>,
    pub note: Option<String>,
}

impl EvidenceDraft {
    pub fn new(
        layer: EvidenceLayer,
        feature_name: impl Into<String>,
        feature_value: FeatureValue,
        source_type: SourceType,
    ) -> Self {
        Self {
            layer,
            feature_name: feature_name.into(),
            feature_value,
            source_type,
            source_ref: None,
            gene: None,
            note: None,
        }
    }

    /// Directly observed in the variant table.
    pub fn known(feature_name: impl Into<String>, value: FeatureValue) -> Self {
        Self::new(EvidenceLayer::Known, feature_name, value, SourceType::Variants)
    }

    pub fn inferred(feature_name: impl Into<String>, value: FeatureValue) -> Self {
        Self::new(EvidenceLayer::Inferred, feature_name, value, SourceType::Derived)
    }

    pub fn speculative(feature_name: impl Into<String>, value: FeatureValue) -> Self {
        Self::new(EvidenceLayer::Speculative, feature_name, value, SourceType::Derived)
    }

    pub fn source_type(mut self, source_type: SourceType) -> Self {
        self.source_type = source_type;
        self
    }

    pub fn cite(mut self, source_ref: SourceRef) -> Self {
        self.source_ref = Some(source_ref);
        self
    }

    pub fn gene(mut self, gene: &str) -> Self {
        self.gene = Some(gene.to_string());
        self
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// One provenance record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceEntry {
    pub evidence_id: EvidenceId,
    pub layer: EvidenceLayer,
    pub feature_name: String,
    pub feature_value: FeatureValue,
    pub source_type: SourceType,
    pub source_ref: Option<SourceRef>,
    #[serde(default)]
    pub gene: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Per-case, append-only log. There is no update or removal operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<EvidenceEntry>", into = "Vec<EvidenceEntry>")]
pub struct EvidenceLedger {
    entries: Vec<EvidenceEntry>,
}

impl EvidenceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a draft, assigning the next id.
    ///
    /// KNOWN and INFERRED drafts must cite a source that `sources` (or, for
    /// `SourceRef::Evidence`, this ledger) can resolve.
    pub fn append(
        &mut self,
        draft: EvidenceDraft,
        sources: &dyn SourceResolver,
    ) -> Result<EvidenceId, ProvenanceError> {
        match &draft.source_ref {
            None if draft.layer.requires_source() => {
                return Err(ProvenanceError::MissingSource {
                    feature_name: draft.feature_name,
                    layer: draft.layer,
                });
            }
            Some(source_ref) if !self.resolves(source_ref, sources) => {
                return Err(ProvenanceError::UnresolvedSource {
                    feature_name: draft.feature_name,
                    source_ref: source_ref.clone(),
                });
            }
            _ => {}
        }

        let evidence_id = self.next_id();
        self.entries.push(EvidenceEntry {
            evidence_id,
            layer: draft.layer,
            feature_name: draft.feature_name,
            feature_value: draft.feature_value,
            source_type: draft.source_type,
            source_ref: draft.source_ref,
            gene: draft.gene,
            note: draft.note,
        });
        Ok(evidence_id)
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> &[EvidenceEntry] {
        &self.entries
    }

    pub fn get(&self, id: EvidenceId) -> Option<&EvidenceEntry> {
        let idx = (id.0 as usize).checked_sub(1)?;
        self.entries.get(idx)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries_for<'a>(&'a self, feature_name: &'a str) -> impl Iterator<Item = &'a EvidenceEntry> + 'a {
        self.entries.iter().filter(move |e| e.feature_name == feature_name)
    }

    fn next_id(&self) -> EvidenceId {
        EvidenceId(self.entries.len() as u32 + 1)
    }

    fn resolves(&self, source_ref: &SourceRef, sources: &dyn SourceResolver) -> bool {
        match source_ref {
            SourceRef::Evidence { ids } => !ids.is_empty() && ids.iter().all(|id| self.get(*id).is_some()),
            other => sources.resolves(other),
        }
    }
}

impl TryFrom<Vec<EvidenceEntry>> for EvidenceLedger {
    type Error = ProvenanceError;

    fn try_from(entries: Vec<EvidenceEntry>) -> Result<Self, Self::Error> {
        for (i, entry) in entries.iter().enumerate() {
            let expected = i as u32 + 1;
            if entry.evidence_id.0 != expected {
                return Err(ProvenanceError::IdSequence {
                    expected,
                    found: entry.evidence_id.0,
                });
            }
        }
        Ok(Self { entries })
    }
}

impl From<EvidenceLedger> for Vec<EvidenceEntry> {
    fn from(ledger: EvidenceLedger) -> Self {
        ledger.entries
    }
}

// ---------------------------------------------------------------------------
// Feature flags
// ---------------------------------------------------------------------------

/// A named fact, always backed by at least one ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureFlag {
    pub name: String,
    pub value: FeatureValue,
    pub layer: EvidenceLayer,
    pub evidence_ids: Vec<EvidenceId>,
}

/// Flags in emission order. Recording an existing name adds evidence to it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSet {
    flags: Vec<FeatureFlag>,
}

impl FeatureSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a flag backed by `evidence_id`. Returns true if the name is new.
    pub fn record(
        &mut self,
        name: &str,
        value: FeatureValue,
        layer: EvidenceLayer,
        evidence_id: EvidenceId,
    ) -> bool {
        if let Some(flag) = self.flags.iter_mut().find(|f| f.name == name) {
            if !flag.evidence_ids.contains(&evidence_id) {
                flag.evidence_ids.push(evidence_id);
            }
            return false;
        }
        self.flags.push(FeatureFlag {
            name: name.to_string(),
            value,
            layer,
            evidence_ids: vec![evidence_id],
        });
        true
    }

    pub fn get(&self, name: &str) -> Option<&FeatureFlag> {
        self.flags.iter().find(|f| f.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Position in emission order; used to order justifications.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.flags.iter().position(|f| f.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FeatureFlag> {
        self.flags.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.flags.iter().map(|f| f.name.as_str()).collect()
    }

    /// Flags whose names match a single-`*` wildcard pattern.
    pub fn matching<'a>(&'a self, pattern: &'a str) -> impl Iterator<Item = &'a FeatureFlag> + 'a {
        self.flags.iter().filter(move |f| pattern_matches(pattern, &f.name))
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

/// Match `name` against a pattern containing at most one `*` wildcard.
/// A pattern without `*` must match exactly.
pub fn pattern_matches(pattern: &str, name: &str) -> bool {
    match pattern.split_once('*') {
        None => pattern == name,
        Some((prefix, suffix)) => {
            name.len() >= prefix.len() + suffix.len()
                && name.starts_with(prefix)
                && name.ends_with(suffix)
        }
    }
}
