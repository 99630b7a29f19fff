//! Batch input: assembles `CaseSnapshot`s from flat alteration and
//! expression rows.
//!
//! Alteration rows are grouped by `(study, case, sample, timepoint)` in
//! first-seen order. Expression summaries are then attached through an
//! `ExpressionIndex`, which also answers for the key with no study and/or an
//! unspecified timepoint. Expression that matches no case becomes a case of
//! its own; expression for a case that already carries a summary is dropped
//! and reported.

use std::collections::{HashMap, HashSet};

use alkrecon_common::snapshot::UNSPECIFIED_TIMEPOINT;
use alkrecon_common::{Alteration, CaseKey, CaseSnapshot, ExpressionSummary};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// One alteration with its case identity, e.g. one line of a MAF-like table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlterationRow {
    #[serde(default)]
    pub study_id: Option<String>,
    pub case_id: String,
    pub sample_id: String,
    #[serde(default)]
    pub timepoint_id: Option<String>,
    #[serde(flatten)]
    pub alteration: Alteration,
}

impl AlterationRow {
    pub fn key(&self) -> CaseKey {
        row_key(&self.study_id, &self.case_id, &self.sample_id, &self.timepoint_id)
    }
}

/// Expression summary for one case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpressionRow {
    #[serde(default)]
    pub study_id: Option<String>,
    pub case_id: String,
    pub sample_id: String,
    #[serde(default)]
    pub timepoint_id: Option<String>,
    #[serde(flatten)]
    pub expression: ExpressionSummary,
}

impl ExpressionRow {
    pub fn key(&self) -> CaseKey {
        row_key(&self.study_id, &self.case_id, &self.sample_id, &self.timepoint_id)
    }
}

fn row_key(study: &Option<String>, case_id: &str, sample_id: &str, timepoint: &Option<String>) -> CaseKey {
    let key = CaseKey::new(case_id, sample_id, timepoint.as_deref().unwrap_or(""));
    match study {
        Some(s) => key.with_study(s),
        None => key,
    }
}

/// A case given whole rather than as rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseInput {
    #[serde(default)]
    pub study_id: Option<String>,
    pub case_id: String,
    pub sample_id: String,
    #[serde(default)]
    pub timepoint_id: Option<String>,
    #[serde(default)]
    pub alterations: Vec<Alteration>,
    #[serde(default)]
    pub expression: Option<ExpressionSummary>,
}

impl CaseInput {
    pub fn key(&self) -> CaseKey {
        row_key(&self.study_id, &self.case_id, &self.sample_id, &self.timepoint_id)
    }
}

/// Snapshots assembled from a `BatchInput`.
#[derive(Debug)]
pub struct AssembledBatch {
    pub snapshots: Vec<CaseSnapshot>,
    /// Expression rows whose only matching cases already had inline expression.
    pub shadowed_expression: Vec<CaseKey>,
}

/// Input document for one batch run. Any of the three sections may be empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchInput {
    #[serde(default)]
    pub cases: Vec<CaseInput>,
    #[serde(default)]
    pub alterations: Vec<AlterationRow>,
    #[serde(default)]
    pub expression: Vec<ExpressionRow>,
}

impl BatchInput {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn into_snapshots(self) -> Vec<CaseSnapshot> {
        self.assemble().snapshots
    }

    /// Whole cases first, then grouped alteration rows, then expression.
    pub fn assemble(self) -> AssembledBatch {
        let mut table = CaseTable::default();
        for case in self.cases {
            let key = case.key();
            let slot = table.entry(key.clone());
            slot.alterations.extend(case.alterations);
            if let Some(expr) = case.expression {
                slot.set_expression(&key, expr);
            }
        }
        for row in self.alterations {
            table.entry(row.key()).alterations.push(row.alteration);
        }
        let mut snapshots = table.into_snapshots();

        let index = ExpressionIndex::from_rows(self.expression);
        let pending: Vec<bool> = snapshots.iter().map(|s| s.expression().is_none()).collect();
        let attached = attach_expression(&mut snapshots, &index);
        debug!(attached, indexed = index.len(), "expression attached");

        // An entry is consumed once any case without inline expression
        // resolves to it.
        let mut used: HashSet<&CaseKey> = HashSet::new();
        let mut matched: HashSet<&CaseKey> = HashSet::new();
        for (snapshot, was_pending) in snapshots.iter().zip(&pending) {
            if let Some(key) = index.resolve(&snapshot.key()) {
                matched.insert(key);
                if *was_pending {
                    used.insert(key);
                }
            }
        }

        let mut shadowed_expression = Vec::new();
        let mut orphans = Vec::new();
        for (key, expr) in index.iter() {
            if used.contains(key) {
                continue;
            }
            if matched.contains(key) {
                warn!(case = %key, "expression row ignored, case already has inline expression");
                shadowed_expression.push(key.clone());
            } else {
                orphans.push(CaseSnapshot::new(key.clone(), Vec::new(), Some(expr.clone())));
            }
        }
        snapshots.extend(orphans);
        AssembledBatch { snapshots, shadowed_expression }
    }
}

/// Group alteration rows into snapshots, preserving first-seen case order.
pub fn group_alterations(rows: Vec<AlterationRow>) -> Vec<CaseSnapshot> {
    let mut table = CaseTable::default();
    for row in rows {
        table.entry(row.key()).alterations.push(row.alteration);
    }
    table.into_snapshots()
}

// ── Expression index ─────────────────────────────────────────────────────────

/// Expression summaries by case key, in first-seen order. A repeated key
/// keeps the first summary.
#[derive(Debug, Clone, Default)]
pub struct ExpressionIndex {
    order: Vec<CaseKey>,
    by_key: HashMap<CaseKey, ExpressionSummary>,
}

impl ExpressionIndex {
    pub fn from_rows(rows: Vec<ExpressionRow>) -> Self {
        let mut index = Self::default();
        for row in rows {
            index.insert(row.key(), row.expression);
        }
        index
    }

    pub fn insert(&mut self, key: CaseKey, expression: ExpressionSummary) -> bool {
        if self.by_key.contains_key(&key) {
            warn!(case = %key, "duplicate expression summary ignored");
            return false;
        }
        self.order.push(key.clone());
        self.by_key.insert(key, expression);
        true
    }

    /// Index key that answers for `key`: exact, then without study, then
    /// with an unspecified timepoint, then both.
    pub fn resolve(&self, key: &CaseKey) -> Option<&CaseKey> {
        aliases(key)
            .into_iter()
            .find_map(|alias| self.by_key.get_key_value(&alias).map(|(k, _)| k))
    }

    pub fn get(&self, key: &CaseKey) -> Option<&ExpressionSummary> {
        self.resolve(key).and_then(|k| self.by_key.get(k))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CaseKey, &ExpressionSummary)> {
        self.order.iter().filter_map(|k| self.by_key.get_key_value(k))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

fn aliases(key: &CaseKey) -> Vec<CaseKey> {
    let no_study = CaseKey { study_id: None, ..key.clone() };
    let unspecified = CaseKey { timepoint_id: UNSPECIFIED_TIMEPOINT.to_string(), ..key.clone() };
    let both = CaseKey { study_id: None, ..unspecified.clone() };
    let mut out = vec![key.clone()];
    for alias in [no_study, unspecified, both] {
        if !out.contains(&alias) {
            out.push(alias);
        }
    }
    out
}

/// Attach indexed expression to every snapshot that has none yet. Returns
/// how many snapshots received a summary.
pub fn attach_expression(snapshots: &mut [CaseSnapshot], index: &ExpressionIndex) -> usize {
    let mut attached = 0;
    for snapshot in snapshots.iter_mut().filter(|s| s.expression().is_none()) {
        let key = snapshot.key();
        let Some(expr) = index.get(&key) else {
            continue;
        };
        match snapshot.attach_expression(expr.clone()) {
            Ok(()) => attached += 1,
            Err(error) => warn!(case = %key, %error, "expression not attached"),
        }
    }
    attached
}

// ── Case table ───────────────────────────────────────────────────────────────

#[derive(Default)]
struct CaseSlot {
    alterations: Vec<Alteration>,
    expression: Option<ExpressionSummary>,
}

impl CaseSlot {
    fn set_expression(&mut self, key: &CaseKey, expression: ExpressionSummary) {
        if self.expression.is_some() {
            warn!(case = %key, "duplicate expression summary ignored");
            return;
        }
        self.expression = Some(expression);
    }
}

#[derive(Default)]
struct CaseTable {
    order: Vec<CaseKey>,
    slots: HashMap<CaseKey, CaseSlot>,
}

impl CaseTable {
    fn entry(&mut self, key: CaseKey) -> &mut CaseSlot {
        if !self.slots.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.slots.entry(key).or_default()
    }

    fn into_snapshots(mut self) -> Vec<CaseSnapshot> {
        self.order
            .into_iter()
            .filter_map(|key| {
                let slot = self.slots.remove(&key)?;
                Some(CaseSnapshot::new(key, slot.alterations, slot.expression))
            })
            .collect()
    }
}
