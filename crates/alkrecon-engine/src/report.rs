//! Batch results: one outcome per input case, in input order.

use alkrecon_common::{CaseKey, CaseSnapshot, PipelineError, ProvenanceError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CaseOutcome {
    /// Fully processed, no dropped flags.
    Complete { snapshot: Box<CaseSnapshot> },
    /// Processed; some flags were dropped for lack of a citable source.
    Partial {
        snapshot: Box<CaseSnapshot>,
        warnings: Vec<ProvenanceError>,
    },
    /// Excluded from the batch.
    Failed { case: CaseKey, error: PipelineError },
}

impl CaseOutcome {
    pub fn snapshot(&self) -> Option<&CaseSnapshot> {
        match self {
            CaseOutcome::Complete { snapshot } | CaseOutcome::Partial { snapshot, .. } => Some(snapshot),
            CaseOutcome::Failed { .. } => None,
        }
    }

    pub fn key(&self) -> CaseKey {
        match self {
            CaseOutcome::Complete { snapshot } | CaseOutcome::Partial { snapshot, .. } => snapshot.key(),
            CaseOutcome::Failed { case, .. } => case.clone(),
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            CaseOutcome::Complete { .. } => "complete",
            CaseOutcome::Partial { .. }  => "partial",
            CaseOutcome::Failed { .. }   => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub complete: usize,
    pub partial: usize,
    pub failed: usize,
    /// Processed cases whose verdict is `no_evidence`.
    pub no_evidence: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub summary: BatchSummary,
    pub outcomes: Vec<CaseOutcome>,
}

impl BatchReport {
    pub fn new(run_id: Uuid, started_at: DateTime<Utc>, duration_ms: u64, outcomes: Vec<CaseOutcome>) -> Self {
        let mut summary = BatchSummary { total: outcomes.len(), ..BatchSummary::default() };
        for outcome in &outcomes {
            match outcome {
                CaseOutcome::Complete { .. } => summary.complete += 1,
                CaseOutcome::Partial { .. }  => summary.partial += 1,
                CaseOutcome::Failed { .. }   => summary.failed += 1,
            }
            if outcome.snapshot().is_some_and(CaseSnapshot::is_no_evidence) {
                summary.no_evidence += 1;
            }
        }
        Self { run_id, started_at, duration_ms, summary, outcomes }
    }

    /// Processed snapshots, skipping failures.
    pub fn snapshots(&self) -> impl Iterator<Item = &CaseSnapshot> {
        self.outcomes.iter().filter_map(CaseOutcome::snapshot)
    }

    pub fn failures(&self) -> impl Iterator<Item = (CaseKey, &PipelineError)> {
        self.outcomes.iter().filter_map(|o| match o {
            CaseOutcome::Failed { case, error } => Some((case.clone(), error)),
            _ => None,
        })
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
