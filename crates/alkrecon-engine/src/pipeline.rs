//! Per-case pipeline and batch runner.
//!
//! Orchestrates, for each snapshot:
//!   1. Identity / freshness check
//!   2. Feature extraction (writes flags + ledger)
//!   3. Mechanism scoring (ranks classes, may append `mixed_mode`)
//!   4. Routing (selects buckets)
//!
//! Each case is independent; the engine is read-only after construction and
//! shared by reference across rayon workers.

use std::time::Instant;

use alkrecon_common::{
    AlkReconError, CaseSnapshot, EngineConfig, PipelineError, ProvenanceError, SnapshotStage,
};
use alkrecon_features::FeatureExtractor;
use alkrecon_ranker::MechanismScorer;
use chrono::Utc;
use rayon::prelude::*;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::report::{BatchReport, CaseOutcome};

/// Batches larger than this are processed on the rayon pool.
pub const PARALLEL_THRESHOLD: usize = 8;

/// Validated, immutable engine context.
pub struct Engine {
    config: EngineConfig,
    extractor: FeatureExtractor,
    scorer: MechanismScorer,
}

impl Engine {
    /// Validate `config` and compile the rule tables. Any configuration
    /// problem is reported here, before a single case runs.
    pub fn new(config: EngineConfig) -> Result<Self, AlkReconError> {
        config.validate()?;
        let extractor = FeatureExtractor::new(&config.rules)?;
        let scorer = MechanismScorer::new(&config.rules.scoring);
        info!(
            routing_rules = config.routing.rules.len(),
            significance = scorer.significance_threshold(),
            "engine ready"
        );
        Ok(Self { config, extractor, scorer })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run extraction → scoring → routing on one snapshot.
    #[instrument(skip(self, snapshot), fields(case = %snapshot.key()))]
    pub fn run_case(&self, mut snapshot: CaseSnapshot) -> CaseOutcome {
        let key = snapshot.key();
        match self.process(&mut snapshot) {
            Ok(warnings) if warnings.is_empty() => CaseOutcome::Complete { snapshot: Box::new(snapshot) },
            Ok(warnings) => {
                warn!(dropped = warnings.len(), "case completed with dropped flags");
                CaseOutcome::Partial { snapshot: Box::new(snapshot), warnings }
            }
            Err(error) => {
                warn!(%error, "case failed");
                CaseOutcome::Failed { case: key, error }
            }
        }
    }

    fn process(&self, snapshot: &mut CaseSnapshot) -> Result<Vec<ProvenanceError>, PipelineError> {
        check_fresh(snapshot)?;

        let report = self.extractor.extract(snapshot)?;
        debug!(flags = report.flags_recorded, entries = snapshot.ledger().len(), "extracted");

        self.scorer.score_snapshot(snapshot)?;
        debug!(verdict = ?snapshot.verdict(), "scored");

        let routing = alkrecon_router::route_snapshot(snapshot, &self.config.routing)?;
        debug!(
            buckets = routing.buckets.len(),
            undefined_refs = routing.undefined.len(),
            "routed"
        );

        snapshot.audit().map_err(|e| PipelineError::InvalidSnapshot {
            reason: format!("provenance audit failed: {e}"),
        })?;
        Ok(report.warnings)
    }

    /// Run every case. Output order equals input order; one case failing
    /// never affects another.
    pub fn run_batch(&self, snapshots: Vec<CaseSnapshot>) -> BatchReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let timer = Instant::now();
        info!(%run_id, cases = snapshots.len(), "batch started");

        let outcomes: Vec<CaseOutcome> = if snapshots.len() > PARALLEL_THRESHOLD {
            snapshots.into_par_iter().map(|s| self.run_case(s)).collect()
        } else {
            snapshots.into_iter().map(|s| self.run_case(s)).collect()
        };

        let report = BatchReport::new(run_id, started_at, timer.elapsed().as_millis() as u64, outcomes);
        info!(
            %run_id,
            complete = report.summary.complete,
            partial = report.summary.partial,
            failed = report.summary.failed,
            duration_ms = report.duration_ms,
            "batch finished"
        );
        report
    }
}

/// A case entering the pipeline must have identity fields and no derived
/// results yet.
fn check_fresh(snapshot: &CaseSnapshot) -> Result<(), PipelineError> {
    snapshot.validate_identity()?;
    if snapshot.stage() != SnapshotStage::Ingested {
        return Err(PipelineError::StageViolation {
            expected: SnapshotStage::Ingested,
            found: snapshot.stage(),
        });
    }
    if !snapshot.ledger().is_empty() || !snapshot.features().is_empty() {
        return Err(PipelineError::InvalidSnapshot {
            reason: "ingested snapshot already carries evidence".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alkrecon_common::{CaseKey, ConfigError};
    use alkrecon_test_utils::fixtures;

    #[test]
    fn test_invalid_config_fails_before_any_case() {
        let mut config = EngineConfig::default();
        config.rules.alk.compound_threshold = 0;
        let err = Engine::new(config).err().unwrap();
        assert!(matches!(err, AlkReconError::Config(ConfigError::MalformedRuleConfig { .. })));
    }

    #[test]
    fn test_unparseable_site_is_config_error() {
        let mut config = EngineConfig::default();
        config.rules.alk.sites.insert("odd".into(), vec!["exon 20 insertion".into()]);
        let err = Engine::new(config).err().unwrap();
        assert!(matches!(err, AlkReconError::Config(_)));
    }

    #[test]
    fn test_blank_case_id_fails_that_case_only() {
        let engine = Engine::new(EngineConfig::default()).unwrap();
        let bad = CaseSnapshot::new(CaseKey::new("", "S1", "T1"), vec![], None);
        let good = fixtures::snapshot("CASE_1", vec![fixtures::alk_snv("G1202R")]);

        let report = engine.run_batch(vec![bad, good]);
        assert_eq!(report.summary.failed, 1);
        assert_eq!(report.summary.complete, 1);
        assert!(matches!(report.outcomes[0], CaseOutcome::Failed { .. }));
        assert!(matches!(report.outcomes[1], CaseOutcome::Complete { .. }));
    }

    #[test]
    fn test_already_processed_snapshot_is_rejected() {
        let engine = Engine::new(EngineConfig::default()).unwrap();
        let done = match engine.run_case(fixtures::snapshot("CASE_1", vec![fixtures::alk_snv("G1202R")])) {
            CaseOutcome::Complete { snapshot } => *snapshot,
            other => panic!("unexpected outcome {other:?}"),
        };
        match engine.run_case(done) {
            CaseOutcome::Failed { error, .. } => {
                assert!(matches!(error, PipelineError::StageViolation { found: SnapshotStage::Routed, .. }))
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }
}
