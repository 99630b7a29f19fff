//! Mechanism scoring and ranking.
//!
//! score(class) = Σ weight(flag) over flags present, each flag counted once.
//! Absent flags contribute nothing; every class is always reported.

use std::cmp::Ordering;

use alkrecon_common::rule_config::{ClassPriority, ScoringRules};
use alkrecon_common::{FeatureSet, MechanismClass, MechanismScore};

use crate::conflict;
use crate::weights::{WeightResolver, WeightTable};

/// Score one class against the flag set. Contributing flags keep flag order.
pub fn score_class(class: MechanismClass, table: &WeightTable, flags: &FeatureSet) -> MechanismScore {
    let mut score = 0.0;
    let mut contributing = Vec::new();
    for flag in flags.iter() {
        match table.weight_for(&flag.name) {
            Some(w) if w > 0.0 => {
                score += w;
                contributing.push(flag.name.clone());
            }
            _ => {}
        }
    }
    MechanismScore {
        class,
        score,
        contributing_flags: contributing,
        contradicted: false,
    }
}

/// Ranking order: score descending, then class priority, then more
/// contributing flags, then declaration order.
pub fn compare(a: &MechanismScore, b: &MechanismScore, priority: &ClassPriority) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| priority.rank(a.class).cmp(&priority.rank(b.class)))
        .then_with(|| b.contributing_flags.len().cmp(&a.contributing_flags.len()))
        .then_with(|| a.class.cmp(&b.class))
}

pub fn rank(scores: &mut [MechanismScore], priority: &ClassPriority) {
    scores.sort_by(|a, b| compare(a, b, priority));
}

/// Compiled scorer for one `ScoringRules`.
#[derive(Debug, Clone)]
pub struct MechanismScorer {
    weights: WeightResolver,
    significance_threshold: f64,
    priority: ClassPriority,
}

impl MechanismScorer {
    pub fn new(rules: &ScoringRules) -> Self {
        Self {
            weights: WeightResolver::new(&rules.weights),
            significance_threshold: rules.significance_threshold,
            priority: rules.priority.clone(),
        }
    }

    pub fn significance_threshold(&self) -> f64 {
        self.significance_threshold
    }

    /// Ranked scores for every class, with contradiction markers set.
    pub fn score(&self, flags: &FeatureSet) -> Vec<MechanismScore> {
        let mut scores: Vec<MechanismScore> = MechanismClass::ALL
            .iter()
            .map(|class| score_class(*class, self.weights.table(*class), flags))
            .collect();
        rank(&mut scores, &self.priority);
        conflict::mark_contradictions(&mut scores, self.significance_threshold);
        scores
    }
}
