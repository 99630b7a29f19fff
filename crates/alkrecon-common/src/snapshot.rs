//! The canonical unit of analysis: one case / sample / timepoint.
//!
//! Observations are fixed at construction. Derived results are added by one
//! stage at a time (extraction, scoring, routing) through the `record_*`
//! methods, each of which runs exactly once. After routing the snapshot is
//! read-only.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entities::{Alteration, ExpressionSummary, MechanismClass, MechanismScore, RoutingBucket};
use crate::error::{PipelineError, ProvenanceError};
use crate::evidence::{CaseSources, EvidenceId, EvidenceLedger, FeatureSet};

/// Identity of a snapshot. Missing timepoints are `unspecified`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CaseKey {
    pub study_id: Option<String>,
    pub case_id: String,
    pub sample_id: String,
    pub timepoint_id: String,
}

pub const UNSPECIFIED_TIMEPOINT: &str = "unspecified";

impl CaseKey {
    pub fn new(case_id: &str, sample_id: &str, timepoint_id: &str) -> Self {
        let timepoint = timepoint_id.trim();
        Self {
            study_id: None,
            case_id: case_id.trim().to_string(),
            sample_id: sample_id.trim().to_string(),
            timepoint_id: if timepoint.is_empty() {
                UNSPECIFIED_TIMEPOINT.to_string()
            } else {
                timepoint.to_string()
            },
        }
    }

    pub fn with_study(mut self, study_id: &str) -> Self {
        let s = study_id.trim();
        self.study_id = (!s.is_empty()).then(|| s.to_string());
        self
    }
}

impl fmt::Display for CaseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(study) = &self.study_id {
            write!(f, "{study}/")?;
        }
        write!(f, "{}/{}/{}", self.case_id, self.sample_id, self.timepoint_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotStage {
    Ingested,
    Extracted,
    Scored,
    Routed,
}

impl fmt::Display for SnapshotStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SnapshotStage::Ingested  => "ingested",
            SnapshotStage::Extracted => "extracted",
            SnapshotStage::Scored    => "scored",
            SnapshotStage::Routed    => "routed",
        };
        f.write_str(s)
    }
}

/// Outcome of scoring, explicit even when nothing was found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Verdict {
    #[default]
    Pending,
    NoEvidence,
    Supported { top: MechanismClass },
    MixedMode { classes: Vec<MechanismClass> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseSnapshot {
    pub case_id: String,
    pub sample_id: String,
    pub timepoint_id: String,
    #[serde(default)]
    pub study_id: Option<String>,
    alterations: Vec<Alteration>,
    #[serde(default)]
    expression: Option<ExpressionSummary>,
    #[serde(default = "default_stage")]
    stage: SnapshotStage,
    #[serde(default)]
    features: FeatureSet,
    #[serde(default)]
    ledger: EvidenceLedger,
    #[serde(default)]
    mechanism_scores: Vec<MechanismScore>,
    #[serde(default)]
    verdict: Verdict,
    #[serde(default)]
    routing: Vec<RoutingBucket>,
}

fn default_stage() -> SnapshotStage { SnapshotStage::Ingested }

impl CaseSnapshot {
    pub fn new(key: CaseKey, alterations: Vec<Alteration>, expression: Option<ExpressionSummary>) -> Self {
        Self {
            case_id: key.case_id,
            sample_id: key.sample_id,
            timepoint_id: key.timepoint_id,
            study_id: key.study_id,
            alterations,
            expression,
            stage: SnapshotStage::Ingested,
            features: FeatureSet::new(),
            ledger: EvidenceLedger::new(),
            mechanism_scores: Vec::new(),
            verdict: Verdict::Pending,
            routing: Vec::new(),
        }
    }

    pub fn key(&self) -> CaseKey {
        CaseKey {
            study_id: self.study_id.clone(),
            case_id: self.case_id.clone(),
            sample_id: self.sample_id.clone(),
            timepoint_id: self.timepoint_id.clone(),
        }
    }

    pub fn alterations(&self) -> &[Alteration] { &self.alterations }
    pub fn expression(&self) -> Option<&ExpressionSummary> { self.expression.as_ref() }
    pub fn stage(&self) -> SnapshotStage { self.stage }
    pub fn features(&self) -> &FeatureSet { &self.features }
    pub fn ledger(&self) -> &EvidenceLedger { &self.ledger }
    pub fn mechanism_scores(&self) -> &[MechanismScore] { &self.mechanism_scores }
    pub fn verdict(&self) -> &Verdict { &self.verdict }
    pub fn routing(&self) -> &[RoutingBucket] { &self.routing }

    /// Attach expression to a freshly ingested snapshot that has none.
    pub fn attach_expression(&mut self, expression: ExpressionSummary) -> Result<(), PipelineError> {
        self.expect_stage(SnapshotStage::Ingested)?;
        if self.expression.is_some() {
            return Err(PipelineError::InvalidSnapshot {
                reason: format!("{} already has an expression summary", self.key()),
            });
        }
        self.expression = Some(expression);
        Ok(())
    }

    pub fn sources(&self) -> CaseSources<'_> {
        CaseSources {
            alterations: &self.alterations,
            expression: self.expression.as_ref(),
            has_study_id: self.study_id.is_some(),
        }
    }

    /// Identity fields must be present before any stage runs.
    pub fn validate_identity(&self) -> Result<(), PipelineError> {
        for (field, value) in [
            ("case_id", &self.case_id),
            ("sample_id", &self.sample_id),
            ("timepoint_id", &self.timepoint_id),
        ] {
            if value.trim().is_empty() {
                return Err(PipelineError::InvalidSnapshot {
                    reason: format!("empty {field}"),
                });
            }
        }
        Ok(())
    }

    /// Run the extraction stage: `f` receives the observations plus the
    /// ledger and flag set to append to.
    pub fn record_extraction<R>(
        &mut self,
        f: impl FnOnce(CaseSources<'_>, &mut EvidenceLedger, &mut FeatureSet) -> R,
    ) -> Result<R, PipelineError> {
        self.expect_stage(SnapshotStage::Ingested)?;
        let sources = CaseSources {
            alterations: &self.alterations,
            expression: self.expression.as_ref(),
            has_study_id: self.study_id.is_some(),
        };
        let out = f(sources, &mut self.ledger, &mut self.features);
        self.stage = SnapshotStage::Extracted;
        Ok(out)
    }

    /// Run the scoring stage. The closure returns the ranked scores and verdict.
    pub fn record_scoring(
        &mut self,
        f: impl FnOnce(CaseSources<'_>, &mut EvidenceLedger, &mut FeatureSet) -> (Vec<MechanismScore>, Verdict),
    ) -> Result<(), PipelineError> {
        self.expect_stage(SnapshotStage::Extracted)?;
        let sources = CaseSources {
            alterations: &self.alterations,
            expression: self.expression.as_ref(),
            has_study_id: self.study_id.is_some(),
        };
        let (scores, verdict) = f(sources, &mut self.ledger, &mut self.features);
        self.mechanism_scores = scores;
        self.verdict = verdict;
        self.stage = SnapshotStage::Scored;
        Ok(())
    }

    pub fn record_routing(&mut self, buckets: Vec<RoutingBucket>) -> Result<(), PipelineError> {
        self.expect_stage(SnapshotStage::Scored)?;
        self.routing = buckets;
        self.stage = SnapshotStage::Routed;
        Ok(())
    }

    /// True once scored with every class at zero.
    pub fn is_no_evidence(&self) -> bool {
        self.verdict == Verdict::NoEvidence
    }

    /// Re-check the provenance invariants over the whole snapshot.
    pub fn audit(&self) -> Result<(), ProvenanceError> {
        for (i, entry) in self.ledger.entries().iter().enumerate() {
            let expected = i as u32 + 1;
            if entry.evidence_id != EvidenceId(expected) {
                return Err(ProvenanceError::IdSequence { expected, found: entry.evidence_id.0 });
            }
            if entry.layer.requires_source() {
                let Some(source_ref) = &entry.source_ref else {
                    return Err(ProvenanceError::MissingSource {
                        feature_name: entry.feature_name.clone(),
                        layer: entry.layer,
                    });
                };
                if !self.sources().resolves_or_cites(source_ref, entry.evidence_id) {
                    return Err(ProvenanceError::UnresolvedSource {
                        feature_name: entry.feature_name.clone(),
                        source_ref: source_ref.clone(),
                    });
                }
            }
        }

        for flag in self.features.iter() {
            let backed = !flag.evidence_ids.is_empty()
                && flag.evidence_ids.iter().all(|id| {
                    self.ledger.get(*id).is_some_and(|e| e.feature_name == flag.name)
                });
            if !backed {
                return Err(ProvenanceError::UnbackedFlag { feature_name: flag.name.clone() });
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    fn expect_stage(&self, expected: SnapshotStage) -> Result<(), PipelineError> {
        if self.stage != expected {
            return Err(PipelineError::StageViolation { expected, found: self.stage });
        }
        Ok(())
    }
}

impl CaseSources<'_> {
    /// Like `resolves`, but evidence citations must point strictly backwards from `at`.
    fn resolves_or_cites(&self, source_ref: &crate::evidence::SourceRef, at: EvidenceId) -> bool {
        use crate::evidence::{SourceRef, SourceResolver};
        match source_ref {
            SourceRef::Evidence { ids } => !ids.is_empty() && ids.iter().all(|id| id.0 >= 1 && *id < at),
            other => self.resolves(other),
        }
    }
}
