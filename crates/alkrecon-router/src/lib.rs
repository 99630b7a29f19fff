//! alkrecon-router — Routing Engine.
//!
//! Applies the routing table in order; every rule whose predicate holds
//! selects its bucket. Selection is additive. Justifications list the
//! witnessing flags in flag order.

pub mod evaluate;

use alkrecon_common::{
    CaseSnapshot, FeatureSet, MechanismScore, PipelineError, RoutingBucket, RoutingRules,
    UndefinedFlagReference,
};
use tracing::debug;

pub use evaluate::{Evaluation, RoutingContext};

/// Selected buckets plus the undefined flag references met on the way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoutingOutcome {
    pub buckets: Vec<RoutingBucket>,
    pub undefined: Vec<UndefinedFlagReference>,
}

/// Deterministic justification: witnesses sorted by position in `flags`.
pub fn justification(witnesses: impl IntoIterator<Item = String>, flags: &FeatureSet) -> String {
    let mut ordered: Vec<(usize, String)> = witnesses
        .into_iter()
        .map(|w| (flags.position(&w).unwrap_or(usize::MAX), w))
        .collect();
    ordered.sort();
    if ordered.is_empty() {
        return "selected by score conditions".to_string();
    }
    let names: Vec<String> = ordered.into_iter().map(|(_, w)| w).collect();
    format!("selected by {}", names.join(", "))
}

/// Evaluate `rules` against ranked `scores` and `flags`.
pub fn route(scores: &[MechanismScore], flags: &FeatureSet, rules: &RoutingRules) -> RoutingOutcome {
    let ctx = RoutingContext::new(scores, flags);
    let mut outcome = RoutingOutcome::default();

    for rule in rules.iter() {
        let ev = ctx.evaluate(&rule.when);
        for flag in ev.undefined {
            debug!(bucket = %rule.bucket, flag = %flag, "routing predicate references undefined flag");
            outcome.undefined.push(UndefinedFlagReference { bucket: rule.bucket, flag });
        }
        if ev.satisfied {
            outcome.buckets.push(RoutingBucket {
                key: rule.bucket,
                justification: justification(ev.witnesses, flags),
            });
        }
    }
    outcome
}

/// Run routing as the snapshot's final stage.
pub fn route_snapshot(snapshot: &mut CaseSnapshot, rules: &RoutingRules) -> Result<RoutingOutcome, PipelineError> {
    let outcome = route(snapshot.mechanism_scores(), snapshot.features(), rules);
    snapshot.record_routing(outcome.buckets.clone())?;
    Ok(outcome)
}
