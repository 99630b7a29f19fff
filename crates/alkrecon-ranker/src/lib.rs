//! alkrecon-ranker — Mechanism Scorer.
//!
//! Sums configured flag weights per mechanism class, ranks the classes and
//! surfaces contradictions as a `mixed_mode` ledger entry.

pub mod conflict;
pub mod scorer;
pub mod weights;

use alkrecon_common::{CaseSnapshot, MechanismScore, PipelineError, Verdict};
use tracing::{debug, warn};

pub use conflict::MIXED_MODE_FLAG;
pub use scorer::MechanismScorer;
pub use weights::{WeightResolver, WeightTable};

/// Verdict for a ranked, contradiction-marked score list.
pub fn verdict(scores: &[MechanismScore]) -> Verdict {
    let contradicted: Vec<_> = scores.iter().filter(|s| s.contradicted).map(|s| s.class).collect();
    if contradicted.len() >= 2 {
        let mut classes = contradicted;
        classes.sort();
        return Verdict::MixedMode { classes };
    }
    match scores.first() {
        Some(top) if top.score > 0.0 => Verdict::Supported { top: top.class },
        _ => Verdict::NoEvidence,
    }
}

impl MechanismScorer {
    /// Run scoring as the snapshot's scoring stage. The mixed-mode marker is
    /// the only ledger entry written here.
    pub fn score_snapshot(&self, snapshot: &mut CaseSnapshot) -> Result<(), PipelineError> {
        snapshot.record_scoring(|sources, ledger, flags| {
            let scores = self.score(flags);

            if let Some(draft) = conflict::mixed_mode_draft(&scores, flags) {
                let value = draft.feature_value.clone();
                let layer = draft.layer;
                let label = value.to_string();
                match ledger.append(draft, &sources) {
                    Ok(id) => {
                        debug!(evidence = %id, classes = %label, "mixed mode recorded");
                        flags.record(MIXED_MODE_FLAG, value, layer, id);
                    }
                    Err(e) => warn!(error = %e, "could not record mixed mode"),
                }
            }

            let verdict = verdict(&scores);
            (scores, verdict)
        })
    }
}
