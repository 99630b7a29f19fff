//! Predicate evaluation over flags and ranked mechanism scores.

use std::collections::BTreeSet;

use alkrecon_common::{FeatureSet, MechanismClass, MechanismScore, Predicate};

/// Inputs a predicate may look at.
#[derive(Debug, Clone, Copy)]
pub struct RoutingContext<'a> {
    /// Ranked, best first.
    pub scores: &'a [MechanismScore],
    pub flags: &'a FeatureSet,
}

/// Result of evaluating one predicate tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    pub satisfied: bool,
    /// Flags that made the predicate true. Empty when unsatisfied.
    pub witnesses: BTreeSet<String>,
    /// Exact flag names referenced but never computed for this case.
    pub undefined: BTreeSet<String>,
}

impl Evaluation {
    fn holds(satisfied: bool, witnesses: impl IntoIterator<Item = String>) -> Self {
        Self {
            satisfied,
            witnesses: if satisfied { witnesses.into_iter().collect() } else { BTreeSet::new() },
            undefined: BTreeSet::new(),
        }
    }

    fn undefined(name: &str) -> Self {
        Self {
            satisfied: false,
            witnesses: BTreeSet::new(),
            undefined: BTreeSet::from([name.to_string()]),
        }
    }
}

impl<'a> RoutingContext<'a> {
    pub fn new(scores: &'a [MechanismScore], flags: &'a FeatureSet) -> Self {
        Self { scores, flags }
    }

    fn score(&self, class: MechanismClass) -> Option<&'a MechanismScore> {
        self.scores.iter().find(|s| s.class == class)
    }

    /// Highest-ranked class, if it scored above zero.
    pub fn top(&self) -> Option<&'a MechanismScore> {
        self.scores.first().filter(|s| s.score > 0.0)
    }

    fn top_score(&self) -> f64 {
        self.scores.first().map(|s| s.score).unwrap_or(0.0)
    }

    /// Evaluate every operand (no short-circuit) so undefined references are
    /// reported consistently.
    pub fn evaluate(&self, predicate: &Predicate) -> Evaluation {
        match predicate {
            Predicate::Flag { name } => match self.flags.get(name) {
                Some(flag) => Evaluation::holds(flag.value.is_truthy(), [name.clone()]),
                None => Evaluation::undefined(name),
            },

            Predicate::FlagMatches { pattern } => {
                let hits: Vec<String> = self
                    .flags
                    .matching(pattern)
                    .filter(|f| f.value.is_truthy())
                    .map(|f| f.name.clone())
                    .collect();
                Evaluation::holds(!hits.is_empty(), hits)
            }

            Predicate::FlagAtLeast { name, min } => match self.flags.get(name) {
                Some(flag) => {
                    let ok = flag.value.as_number().is_some_and(|v| v >= *min);
                    Evaluation::holds(ok, [name.clone()])
                }
                None => Evaluation::undefined(name),
            },

            Predicate::TopMechanism { class } => match self.top() {
                Some(top) if top.class == *class => Evaluation::holds(true, top.contributing_flags.clone()),
                _ => Evaluation::default(),
            },

            Predicate::ScoreAtLeast { class, min } => match self.score(*class) {
                Some(s) if s.score >= *min => Evaluation::holds(true, s.contributing_flags.clone()),
                _ => Evaluation::default(),
            },

            Predicate::TopScoreBelow { max } => Evaluation::holds(self.top_score() < *max, Vec::new()),

            Predicate::Contradicted { class } => match self.score(*class) {
                Some(s) if s.contradicted => Evaluation::holds(true, s.contributing_flags.clone()),
                _ => Evaluation::default(),
            },

            Predicate::All { of } => {
                let parts: Vec<Evaluation> = of.iter().map(|p| self.evaluate(p)).collect();
                let satisfied = parts.iter().all(|e| e.satisfied);
                combine(satisfied, parts, |_| true)
            }

            Predicate::Any { of } => {
                let parts: Vec<Evaluation> = of.iter().map(|p| self.evaluate(p)).collect();
                let satisfied = parts.iter().any(|e| e.satisfied);
                combine(satisfied, parts, |e| e.satisfied)
            }

            Predicate::Not { of } => {
                let inner = self.evaluate(of);
                Evaluation {
                    satisfied: !inner.satisfied,
                    witnesses: BTreeSet::new(),
                    undefined: inner.undefined,
                }
            }
        }
    }
}

/// Merge operand results: witnesses from operands selected by `keep` when
/// satisfied; undefined references from every operand.
fn combine(satisfied: bool, parts: Vec<Evaluation>, keep: impl Fn(&Evaluation) -> bool) -> Evaluation {
    let mut out = Evaluation { satisfied, ..Evaluation::default() };
    for part in parts {
        if satisfied && keep(&part) {
            out.witnesses.extend(part.witnesses);
        }
        out.undefined.extend(part.undefined);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use alkrecon_common::{EvidenceId, EvidenceLayer, FeatureValue};

    fn flags() -> FeatureSet {
        let mut set = FeatureSet::new();
        set.record("has_G1202R", FeatureValue::Bool(true), EvidenceLayer::Known, EvidenceId(1));
        set.record("alk_category_solvent_front", FeatureValue::Bool(true), EvidenceLayer::Inferred, EvidenceId(2));
        set.record("signature_elevated", FeatureValue::Number(1.3), EvidenceLayer::Inferred, EvidenceId(3));
        set
    }

    fn scores() -> Vec<MechanismScore> {
        vec![
            MechanismScore {
                class: MechanismClass::OnTargetAlk,
                score: 0.75,
                contributing_flags: vec!["has_G1202R".into(), "alk_category_solvent_front".into()],
                contradicted: true,
            },
            MechanismScore {
                class: MechanismClass::Persistence,
                score: 0.75,
                contributing_flags: vec!["signature_elevated".into()],
                contradicted: true,
            },
            MechanismScore { class: MechanismClass::Bypass, score: 0.0, contributing_flags: vec![], contradicted: false },
        ]
    }

    #[test]
    fn test_undefined_flag_is_false_and_reported() {
        let (s, f) = (scores(), flags());
        let ev = RoutingContext::new(&s, &f).evaluate(&Predicate::flag("has_compound_alk_mutations"));
        assert!(!ev.satisfied);
        assert!(ev.undefined.contains("has_compound_alk_mutations"));
    }

    #[test]
    fn test_flag_at_least_reads_numeric_value() {
        let (s, f) = (scores(), flags());
        let ctx = RoutingContext::new(&s, &f);
        let hit = Predicate::FlagAtLeast { name: "signature_elevated".into(), min: 1.2 };
        let miss = Predicate::FlagAtLeast { name: "signature_elevated".into(), min: 2.0 };
        assert!(ctx.evaluate(&hit).satisfied);
        assert!(!ctx.evaluate(&miss).satisfied);
    }

    #[test]
    fn test_mechanism_predicates_witness_contributing_flags() {
        let (s, f) = (scores(), flags());
        let ctx = RoutingContext::new(&s, &f);
        let ev = ctx.evaluate(&Predicate::TopMechanism { class: MechanismClass::OnTargetAlk });
        assert!(ev.satisfied);
        assert_eq!(ev.witnesses.len(), 2);
        assert!(!ctx.evaluate(&Predicate::TopMechanism { class: MechanismClass::Bypass }).satisfied);
        assert!(ctx.evaluate(&Predicate::Contradicted { class: MechanismClass::Persistence }).satisfied);
    }

    #[test]
    fn test_combinators() {
        let (s, f) = (scores(), flags());
        let ctx = RoutingContext::new(&s, &f);
        let any = Predicate::Any {
            of: vec![Predicate::flag("bypass_MET_event"), Predicate::flag_matches("alk_category_*")],
        };
        let ev = ctx.evaluate(&any);
        assert!(ev.satisfied);
        assert_eq!(ev.witnesses, BTreeSet::from(["alk_category_solvent_front".to_string()]));
        assert!(ev.undefined.contains("bypass_MET_event"));

        let all = Predicate::All {
            of: vec![Predicate::flag("has_G1202R"), Predicate::TopScoreBelow { max: 0.35 }],
        };
        assert!(!ctx.evaluate(&all).satisfied);

        let not = Predicate::Not { of: Box::new(Predicate::flag("has_G1202R")) };
        assert!(!ctx.evaluate(&not).satisfied);
    }

    #[test]
    fn test_no_top_mechanism_when_everything_is_zero() {
        let s = vec![MechanismScore {
            class: MechanismClass::OnTargetAlk,
            score: 0.0,
            contributing_flags: vec![],
            contradicted: false,
        }];
        let f = FeatureSet::new();
        let ctx = RoutingContext::new(&s, &f);
        assert!(ctx.top().is_none());
        assert!(ctx.evaluate(&Predicate::TopScoreBelow { max: 0.35 }).satisfied);
    }
}
