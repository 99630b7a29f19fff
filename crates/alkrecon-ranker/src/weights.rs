//! Weight lookup for mechanism scoring.
//!
//! Keys are exact flag names or patterns with one `*`. Resolution order for
//! a flag: exact key, then the pattern with the longest literal part, then
//! key order.

use std::collections::BTreeMap;

use alkrecon_common::evidence::pattern_matches;
use alkrecon_common::rule_config::ClassWeights;
use alkrecon_common::MechanismClass;

/// Compiled weight table for one mechanism class.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeightTable {
    exact: BTreeMap<String, f64>,
    /// Sorted by literal length (descending), then key.
    patterns: Vec<(String, f64)>,
}

impl WeightTable {
    pub fn from_map(map: &BTreeMap<String, f64>) -> Self {
        let mut exact = BTreeMap::new();
        let mut patterns = Vec::new();
        for (key, weight) in map {
            if key.contains('*') {
                patterns.push((key.clone(), *weight));
            } else {
                exact.insert(key.clone(), *weight);
            }
        }
        // BTreeMap iteration already gives key order; the stable sort keeps it.
        patterns.sort_by_key(|(key, _)| std::cmp::Reverse(key.len() - 1));
        Self { exact, patterns }
    }

    /// Weight applied to `flag`, if any key covers it.
    pub fn weight_for(&self, flag: &str) -> Option<f64> {
        if let Some(w) = self.exact.get(flag) {
            return Some(*w);
        }
        self.patterns
            .iter()
            .find(|(pattern, _)| pattern_matches(pattern, flag))
            .map(|(_, w)| *w)
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.patterns.is_empty()
    }
}

/// One compiled table per mechanism class.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeightResolver {
    on_target_alk: WeightTable,
    bypass: WeightTable,
    persistence: WeightTable,
}

impl WeightResolver {
    pub fn new(weights: &ClassWeights) -> Self {
        Self {
            on_target_alk: WeightTable::from_map(&weights.on_target_alk),
            bypass:        WeightTable::from_map(&weights.bypass),
            persistence:   WeightTable::from_map(&weights.persistence),
        }
    }

    pub fn table(&self, class: MechanismClass) -> &WeightTable {
        match class {
            MechanismClass::OnTargetAlk => &self.on_target_alk,
            MechanismClass::Bypass      => &self.bypass,
            MechanismClass::Persistence => &self.persistence,
        }
    }
}
