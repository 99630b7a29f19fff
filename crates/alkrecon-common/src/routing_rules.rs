//! Declarative routing table: ordered `(bucket, predicate)` pairs.
//!
//! Predicates are plain data; the router crate evaluates them. New strategy
//! logic is added by editing this table, never the evaluator.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::entities::{BucketKey, MechanismClass};
use crate::error::ConfigError;

/// Condition over flags and mechanism scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Predicate {
    /// Flag is present and truthy.
    Flag { name: String },
    /// At least one flag matches a single-`*` pattern.
    FlagMatches { pattern: String },
    /// Numeric flag value is at least `min`.
    FlagAtLeast { name: String, min: f64 },
    /// `class` is ranked first with a non-zero score.
    TopMechanism { class: MechanismClass },
    ScoreAtLeast { class: MechanismClass, min: f64 },
    /// The best score is strictly below `max`.
    TopScoreBelow { max: f64 },
    Contradicted { class: MechanismClass },
    All { of: Vec<Predicate> },
    Any { of: Vec<Predicate> },
    Not { of: Box<Predicate> },
}

impl Predicate {
    pub fn flag(name: &str) -> Self {
        Predicate::Flag { name: name.to_string() }
    }

    pub fn flag_matches(pattern: &str) -> Self {
        Predicate::FlagMatches { pattern: pattern.to_string() }
    }

    fn validate(&self, field: &str) -> Result<(), ConfigError> {
        match self {
            Predicate::Flag { name } if name.trim().is_empty() => {
                Err(ConfigError::malformed(field, "flag name is empty"))
            }
            Predicate::FlagMatches { pattern } if pattern.matches('*').count() > 1 => {
                Err(ConfigError::malformed(field, format!("pattern {pattern:?} has more than one `*`")))
            }
            Predicate::FlagAtLeast { min, .. } | Predicate::ScoreAtLeast { min, .. } if !min.is_finite() => {
                Err(ConfigError::malformed(field, "threshold must be finite"))
            }
            Predicate::TopScoreBelow { max } if !max.is_finite() => {
                Err(ConfigError::malformed(field, "threshold must be finite"))
            }
            Predicate::All { of } | Predicate::Any { of } => {
                if of.is_empty() {
                    return Err(ConfigError::malformed(field, "combinator has no operands"));
                }
                of.iter().try_for_each(|p| p.validate(field))
            }
            Predicate::Not { of } => of.validate(field),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoutingRule {
    pub bucket: BucketKey,
    pub when: Predicate,
}

impl RoutingRule {
    pub fn new(bucket: BucketKey, when: Predicate) -> Self {
        Self { bucket, when }
    }
}

/// Rules in evaluation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoutingRules {
    #[serde(default = "default_rules")]
    pub rules: Vec<RoutingRule>,
}

impl Default for RoutingRules {
    fn default() -> Self {
        Self { rules: default_rules() }
    }
}

fn default_rules() -> Vec<RoutingRule> {
    vec![
        RoutingRule::new(BucketKey::A, Predicate::flag_matches("alk_category_*")),
        RoutingRule::new(BucketKey::B, Predicate::flag("has_compound_alk_mutations")),
        RoutingRule::new(BucketKey::C, Predicate::flag_matches("alk_category_*")),
        RoutingRule::new(BucketKey::D, Predicate::flag("signature_elevated")),
        RoutingRule::new(
            BucketKey::E,
            Predicate::Any {
                of: vec![
                    Predicate::flag_matches("bypass_*_event"),
                    Predicate::flag("mixed_mode"),
                    // weak evidence of any kind
                    Predicate::All {
                        of: vec![Predicate::TopScoreBelow { max: 0.35 }, Predicate::flag_matches("*")],
                    },
                ],
            },
        ),
    ]
}

impl RoutingRules {
    pub fn new(rules: Vec<RoutingRule>) -> Self {
        Self { rules }
    }

    pub fn iter(&self) -> impl Iterator<Item = &RoutingRule> {
        self.rules.iter()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = BTreeSet::new();
        for rule in &self.rules {
            let field = format!("routing.rules.{}", rule.bucket);
            if !seen.insert(rule.bucket) {
                return Err(ConfigError::malformed(field, "bucket has more than one rule"));
            }
            rule.when.validate(&field)?;
        }
        Ok(())
    }
}
