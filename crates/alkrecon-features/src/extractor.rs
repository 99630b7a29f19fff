//! Feature Extractor: turns a snapshot's alterations and expression into
//! evidence-backed feature flags.
//!
//! Rule families run in a fixed order (on-target ALK, bypass, persistence),
//! each walking alterations in input order, so evidence ids are stable for a
//! given input ordering.

use std::collections::BTreeMap;

use alkrecon_common::rule_config::RuleConfig;
use alkrecon_common::{
    CaseSnapshot, CaseSources, ConfigError, EvidenceDraft, EvidenceId, EvidenceLedger, FeatureSet,
    PipelineError, ProvenanceError,
};
use tracing::{debug, warn};

use crate::normalise::ProteinChangeNormaliser;
use crate::{alk, bypass, persistence};

/// Per-case extraction summary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionReport {
    pub flags_recorded: usize,
    /// Flags dropped because their source could not be cited.
    pub warnings: Vec<ProvenanceError>,
}

/// Compiled extractor for one rule configuration. Immutable and shareable
/// across threads.
pub struct FeatureExtractor {
    rules: RuleConfig,
    normaliser: ProteinChangeNormaliser,
    /// Normalised protein change → site category.
    site_index: BTreeMap<String, String>,
    /// Normalised hotspot changes per upper-cased bypass gene.
    hotspot_index: BTreeMap<String, Vec<String>>,
}

impl FeatureExtractor {
    /// Compile the site and hotspot tables. Entries that are not parseable
    /// protein changes are a configuration error.
    pub fn new(rules: &RuleConfig) -> Result<Self, ConfigError> {
        let normaliser = ProteinChangeNormaliser::new()
            .map_err(|e| ConfigError::malformed("<protein change pattern>", e.to_string()))?;

        let mut site_index = BTreeMap::new();
        for (category, changes) in &rules.alk.sites {
            for change in changes {
                let key = normaliser.normalise(change).ok_or_else(|| {
                    ConfigError::malformed(
                        format!("alk.sites.{category}"),
                        format!("{change:?} is not a protein change"),
                    )
                })?;
                site_index.insert(key, category.clone());
            }
        }

        let mut hotspot_index = BTreeMap::new();
        for (gene, changes) in &rules.bypass.hotspots {
            let mut normalised = Vec::with_capacity(changes.len());
            for change in changes {
                normalised.push(normaliser.normalise(change).ok_or_else(|| {
                    ConfigError::malformed(
                        format!("bypass.hotspots.{gene}"),
                        format!("{change:?} is not a protein change"),
                    )
                })?);
            }
            hotspot_index.insert(gene.to_uppercase(), normalised);
        }

        debug!(
            sites = site_index.len(),
            hotspot_genes = hotspot_index.len(),
            "feature extractor compiled"
        );

        Ok(Self {
            rules: rules.clone(),
            normaliser,
            site_index,
            hotspot_index,
        })
    }

    pub fn rules(&self) -> &RuleConfig {
        &self.rules
    }

    /// Run extraction as the snapshot's extraction stage.
    pub fn extract(&self, snapshot: &mut CaseSnapshot) -> Result<ExtractionReport, PipelineError> {
        snapshot.record_extraction(|sources, ledger, flags| self.extract_into(sources, ledger, flags))
    }

    /// Append entries and flags for `sources` to `ledger` / `flags`.
    pub fn extract_into(
        &self,
        sources: CaseSources<'_>,
        ledger: &mut EvidenceLedger,
        flags: &mut FeatureSet,
    ) -> ExtractionReport {
        let mut rec = Recorder::new(sources, ledger, flags);

        alk::extract(self, &mut rec);
        bypass::extract(self, &mut rec);
        persistence::extract(&self.rules.persistence, &mut rec);

        rec.finish()
    }

    pub(crate) fn normalise(&self, raw: &str) -> Option<String> {
        self.normaliser.normalise(raw)
    }

    pub(crate) fn site_category(&self, change: &str) -> Option<&str> {
        self.site_index.get(change).map(String::as_str)
    }

    pub(crate) fn hotspots(&self, gene: &str) -> Option<&[String]> {
        self.hotspot_index.get(gene).map(Vec::as_slice)
    }
}

// ── Recorder ──────────────────────────────────────────────────────────────────

/// Appends drafts to the ledger and records the matching flag. A draft whose
/// source cannot be cited is dropped with a warning.
pub(crate) struct Recorder<'a> {
    pub sources: CaseSources<'a>,
    ledger: &'a mut EvidenceLedger,
    flags: &'a mut FeatureSet,
    report: ExtractionReport,
}

impl<'a> Recorder<'a> {
    fn new(sources: CaseSources<'a>, ledger: &'a mut EvidenceLedger, flags: &'a mut FeatureSet) -> Self {
        Self { sources, ledger, flags, report: ExtractionReport::default() }
    }

    pub fn emit(&mut self, draft: EvidenceDraft) -> Option<EvidenceId> {
        let name = draft.feature_name.clone();
        let value = draft.feature_value.clone();
        let layer = draft.layer;
        match self.ledger.append(draft, &self.sources) {
            Ok(id) => {
                if self.flags.record(&name, value, layer, id) {
                    self.report.flags_recorded += 1;
                }
                Some(id)
            }
            Err(e) => {
                warn!(error = %e, "dropping feature flag");
                self.report.warnings.push(e);
                None
            }
        }
    }

    fn finish(self) -> ExtractionReport {
        self.report
    }
}
