//! Rule configuration: site tables, bypass genes, signature definitions,
//! scoring weights and the routing table.
//!
//! Loaded once per process from TOML, YAML or JSON, validated, then held
//! read-only by the engine. Every threshold and gene list has a documented
//! default so a partial file only overrides what it names.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::entities::MechanismClass;
use crate::error::ConfigError;
use crate::routing_rules::RoutingRules;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "ALKRECON_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "alkrecon.toml";

/// Complete engine configuration: rule tables plus the routing table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    #[serde(default)]
    pub rules: RuleConfig,

    #[serde(default)]
    pub routing: RoutingRules,
}

impl EngineConfig {
    /// Load from the path in `ALKRECON_CONFIG`, else `alkrecon.toml` in the
    /// working directory. A missing default file yields the built-in tables.
    pub fn load() -> Result<Self, ConfigError> {
        match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::from_path(&path),
            Err(_) if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::from_path(DEFAULT_CONFIG_FILE),
            Err(_) => {
                debug!("no {} found, using built-in rule tables", DEFAULT_CONFIG_FILE);
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Load and validate a config file. The format follows the extension
    /// (`.toml`, `.yaml`/`.yml`, `.json`); anything else is read as TOML.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("yaml") | Some("yml") => Self::from_yaml(&content),
            Some("json") => Self::from_json(&content),
            _ => Self::from_toml(&content),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ConfigError::malformed("<toml>", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| ConfigError::malformed("<yaml>", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| ConfigError::malformed("<json>", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::malformed("<toml>", e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.rules.validate()?;
        self.routing.validate()
    }
}

/// Rule tables consumed by the extractor and scorer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    #[serde(default)]
    pub alk: AlkRules,

    #[serde(default)]
    pub bypass: BypassRules,

    #[serde(default)]
    pub persistence: PersistenceRules,

    #[serde(default)]
    pub scoring: ScoringRules,
}

impl RuleConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.alk.validate()?;
        self.bypass.validate()?;
        self.persistence.validate()?;
        self.scoring.validate()
    }
}

// ── On-target ALK ─────────────────────────────────────────────────────────────

/// Resistance-site table for the on-target gene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AlkRules {
    /// Gene symbol the on-target family applies to.
    #[serde(default = "default_alk_gene")]
    pub gene: String,

    /// Category name -> protein changes, e.g. `solvent_front = ["G1202R"]`.
    #[serde(default = "default_alk_sites")]
    pub sites: BTreeMap<String, Vec<String>>,

    /// Distinct classified changes needed for `has_compound_alk_mutations`.
    #[serde(default = "default_compound_threshold")]
    pub compound_threshold: usize,

    /// Classify parsed changes that no site category lists.
    #[serde(default = "default_true")]
    pub classify_unlisted: bool,

    /// Category given to unlisted changes when `classify_unlisted` is set.
    #[serde(default = "default_unlisted_category")]
    pub unlisted_category: String,
}

fn default_alk_gene() -> String { "ALK".to_string() }
fn default_compound_threshold() -> usize { 2 }
fn default_true() -> bool { true }
fn default_unlisted_category() -> String { "unclassified".to_string() }

fn default_alk_sites() -> BTreeMap<String, Vec<String>> {
    let mut sites = BTreeMap::new();
    sites.insert("solvent_front".to_string(), strings(&["G1202R", "G1202del", "D1203N", "S1206Y"]));
    sites.insert("gatekeeper".to_string(), strings(&["L1196M"]));
    sites.insert(
        "other".to_string(),
        strings(&["C1156Y", "I1171N", "I1171T", "F1174L", "V1180L", "L1198F", "G1269A"]),
    );
    sites
}

impl Default for AlkRules {
    fn default() -> Self {
        Self {
            gene: default_alk_gene(),
            sites: default_alk_sites(),
            compound_threshold: default_compound_threshold(),
            classify_unlisted: true,
            unlisted_category: default_unlisted_category(),
        }
    }
}

impl AlkRules {
    fn validate(&self) -> Result<(), ConfigError> {
        require_gene("alk.gene", &self.gene)?;
        if self.compound_threshold == 0 {
            return Err(ConfigError::malformed("alk.compound_threshold", "must be at least 1"));
        }
        if self.sites.is_empty() {
            return Err(ConfigError::malformed("alk.sites", "site table is empty"));
        }
        require_identifier("alk.unlisted_category", &self.unlisted_category)?;
        if self.sites.contains_key(&self.unlisted_category) {
            return Err(ConfigError::malformed(
                "alk.unlisted_category",
                format!("{} is also a site category", self.unlisted_category),
            ));
        }
        let mut seen: BTreeMap<String, &str> = BTreeMap::new();
        for (category, changes) in &self.sites {
            require_identifier(&format!("alk.sites.{category}"), category)?;
            if changes.is_empty() {
                return Err(ConfigError::malformed(format!("alk.sites.{category}"), "no protein changes listed"));
            }
            for change in changes {
                let key = change.trim().to_uppercase();
                if key.is_empty() {
                    return Err(ConfigError::malformed(format!("alk.sites.{category}"), "empty protein change"));
                }
                if let Some(previous) = seen.insert(key, category.as_str()) {
                    if previous != category.as_str() {
                        return Err(ConfigError::malformed(
                            format!("alk.sites.{category}"),
                            format!("{change} is already listed under {previous}"),
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

// ── Bypass ────────────────────────────────────────────────────────────────────

/// Bypass-signalling genes and their activation thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BypassRules {
    #[serde(default = "default_bypass_genes")]
    pub genes: Vec<String>,

    /// Minimum copy number for an amplification to count.
    #[serde(default = "default_cn_amp_min")]
    pub cn_amp_min: f64,

    /// Optional activating-SNV hotspots per gene. Genes without an entry
    /// accept any SNV.
    #[serde(default = "default_hotspots")]
    pub hotspots: BTreeMap<String, Vec<String>>,

    /// Pathway name -> member genes, for `bypass_pathway_<name>`.
    #[serde(default = "default_pathways")]
    pub pathways: BTreeMap<String, Vec<String>>,
}

fn default_cn_amp_min() -> f64 { 6.0 }

fn default_bypass_genes() -> Vec<String> {
    strings(&["MET", "EGFR", "KRAS", "NRAS", "BRAF", "MAP2K1", "MAP2K2", "ERBB2", "PIK3CA", "PTEN"])
}

fn default_hotspots() -> BTreeMap<String, Vec<String>> {
    let mut hotspots = BTreeMap::new();
    hotspots.insert("KRAS".to_string(), strings(&["G12C", "G12D", "G12V", "G12A", "G13D", "Q61H", "Q61L"]));
    hotspots.insert("NRAS".to_string(), strings(&["G12D", "G13R", "Q61K", "Q61L", "Q61R"]));
    hotspots.insert("BRAF".to_string(), strings(&["V600E", "G469A", "K601E"]));
    hotspots.insert("PIK3CA".to_string(), strings(&["E542K", "E545K", "H1047R", "H1047L"]));
    hotspots
}

fn default_pathways() -> BTreeMap<String, Vec<String>> {
    let mut pathways = BTreeMap::new();
    pathways.insert("mapk".to_string(), strings(&["KRAS", "NRAS", "BRAF", "MAP2K1", "MAP2K2"]));
    pathways
}

impl Default for BypassRules {
    fn default() -> Self {
        Self {
            genes: default_bypass_genes(),
            cn_amp_min: default_cn_amp_min(),
            hotspots: default_hotspots(),
            pathways: default_pathways(),
        }
    }
}

impl BypassRules {
    /// Whether `gene` (any case) is a configured bypass gene.
    pub fn contains(&self, gene: &str) -> bool {
        self.genes.iter().any(|g| g.eq_ignore_ascii_case(gene))
    }

    /// Configured spelling of `gene`, used in flag names.
    pub fn canonical<'a>(&'a self, gene: &str) -> Option<&'a str> {
        self.genes
            .iter()
            .find(|g| g.eq_ignore_ascii_case(gene))
            .map(String::as_str)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.genes.is_empty() {
            return Err(ConfigError::malformed("bypass.genes", "gene list is empty"));
        }
        let mut seen = BTreeSet::new();
        for gene in &self.genes {
            require_gene("bypass.genes", gene)?;
            if !seen.insert(gene.to_uppercase()) {
                return Err(ConfigError::malformed("bypass.genes", format!("{gene} listed twice")));
            }
        }
        require_non_negative("bypass.cn_amp_min", self.cn_amp_min)?;
        for gene in self.hotspots.keys() {
            if !self.contains(gene) {
                return Err(ConfigError::malformed(
                    format!("bypass.hotspots.{gene}"),
                    "gene is not in bypass.genes",
                ));
            }
        }
        for (name, members) in &self.pathways {
            require_identifier(&format!("bypass.pathways.{name}"), name)?;
            if members.is_empty() {
                return Err(ConfigError::malformed(format!("bypass.pathways.{name}"), "pathway has no members"));
            }
            if let Some(stray) = members.iter().find(|g| !self.contains(g)) {
                return Err(ConfigError::malformed(
                    format!("bypass.pathways.{name}"),
                    format!("{stray} is not in bypass.genes"),
                ));
            }
        }
        Ok(())
    }
}

// ── Persistence ───────────────────────────────────────────────────────────────

/// Drug-tolerant persister signature definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PersistenceRules {
    /// Precomputed score consulted when too few signature genes are present.
    #[serde(default = "default_score_key")]
    pub score_key: String,

    #[serde(default = "default_signature_threshold")]
    pub threshold: f64,

    #[serde(default = "default_up_genes")]
    pub up_genes: Vec<String>,

    #[serde(default)]
    pub down_genes: Vec<String>,

    /// Up-genes that must be present for the gene-level score to be used.
    #[serde(default = "default_min_genes")]
    pub min_genes: usize,
}

fn default_score_key() -> String { "persister_score".to_string() }
fn default_signature_threshold() -> f64 { 1.0 }
fn default_min_genes() -> usize { 3 }

fn default_up_genes() -> Vec<String> {
    strings(&["AXL", "ALDH1A1", "KDM5A", "CD44", "VIM", "NNMT"])
}

impl Default for PersistenceRules {
    fn default() -> Self {
        Self {
            score_key: default_score_key(),
            threshold: default_signature_threshold(),
            up_genes: default_up_genes(),
            down_genes: Vec::new(),
            min_genes: default_min_genes(),
        }
    }
}

impl PersistenceRules {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.score_key.trim().is_empty() {
            return Err(ConfigError::malformed("persistence.score_key", "must not be empty"));
        }
        if !self.threshold.is_finite() {
            return Err(ConfigError::malformed("persistence.threshold", "must be finite"));
        }
        if self.min_genes == 0 {
            return Err(ConfigError::malformed("persistence.min_genes", "must be at least 1"));
        }
        for gene in self.up_genes.iter().chain(&self.down_genes) {
            require_gene("persistence.up_genes/down_genes", gene)?;
        }
        Ok(())
    }
}

// ── Scoring ───────────────────────────────────────────────────────────────────

/// Per-class weight tables. Keys are exact flag names or single-`*` patterns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassWeights {
    #[serde(default)]
    pub on_target_alk: BTreeMap<String, f64>,

    #[serde(default)]
    pub bypass: BTreeMap<String, f64>,

    #[serde(default)]
    pub persistence: BTreeMap<String, f64>,
}

impl ClassWeights {
    pub fn for_class(&self, class: MechanismClass) -> &BTreeMap<String, f64> {
        match class {
            MechanismClass::OnTargetAlk => &self.on_target_alk,
            MechanismClass::Bypass      => &self.bypass,
            MechanismClass::Persistence => &self.persistence,
        }
    }
}

impl Default for ClassWeights {
    fn default() -> Self {
        Self {
            on_target_alk: weights(&[
                ("has_*", 0.40),
                ("alk_category_solvent_front", 0.35),
                ("alk_category_gatekeeper", 0.25),
                ("alk_category_other", 0.20),
                ("alk_category_unclassified", 0.10),
                ("has_compound_alk_mutations", 0.35),
            ]),
            bypass: weights(&[
                ("bypass_MET_event", 0.70),
                ("bypass_EGFR_event", 0.60),
                ("bypass_*_event", 0.50),
                ("bypass_pathway_*", 0.20),
            ]),
            persistence: weights(&[("signature_elevated", 0.75)]),
        }
    }
}

/// Tie-break rank per class; lower ranks first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassPriority {
    #[serde(default)]
    pub on_target_alk: u32,
    #[serde(default = "one")]
    pub bypass: u32,
    #[serde(default = "two")]
    pub persistence: u32,
}

fn one() -> u32 { 1 }
fn two() -> u32 { 2 }

impl Default for ClassPriority {
    fn default() -> Self {
        Self { on_target_alk: 0, bypass: 1, persistence: 2 }
    }
}

impl ClassPriority {
    pub fn rank(&self, class: MechanismClass) -> u32 {
        match class {
            MechanismClass::OnTargetAlk => self.on_target_alk,
            MechanismClass::Bypass      => self.bypass,
            MechanismClass::Persistence => self.persistence,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScoringRules {
    #[serde(default)]
    pub weights: ClassWeights,

    /// A class is significant when its score is strictly above this.
    #[serde(default = "default_significance_threshold")]
    pub significance_threshold: f64,

    #[serde(default)]
    pub priority: ClassPriority,
}

fn default_significance_threshold() -> f64 { 0.5 }

impl Default for ScoringRules {
    fn default() -> Self {
        Self {
            weights: ClassWeights::default(),
            significance_threshold: default_significance_threshold(),
            priority: ClassPriority::default(),
        }
    }
}

impl ScoringRules {
    fn validate(&self) -> Result<(), ConfigError> {
        require_non_negative("scoring.significance_threshold", self.significance_threshold)?;
        for class in MechanismClass::ALL {
            for (key, weight) in self.weights.for_class(class) {
                let field = format!("scoring.weights.{class}.{key}");
                if key.trim().is_empty() {
                    return Err(ConfigError::malformed(field, "empty weight key"));
                }
                if key.matches('*').count() > 1 {
                    return Err(ConfigError::malformed(field, "at most one `*` wildcard is allowed"));
                }
                require_non_negative(&field, *weight)?;
            }
        }
        Ok(())
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn weights(items: &[(&str, f64)]) -> BTreeMap<String, f64> {
    items.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

fn require_non_negative(field: &str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::malformed(field, format!("{value} is not a finite non-negative number")));
    }
    Ok(())
}

fn require_gene(field: &str, gene: &str) -> Result<(), ConfigError> {
    if gene.trim().is_empty() || gene.chars().any(char::is_whitespace) {
        return Err(ConfigError::malformed(field, format!("invalid gene symbol {gene:?}")));
    }
    Ok(())
}

/// Names that end up inside flag names: `[A-Za-z0-9_]+`.
fn require_identifier(field: &str, name: &str) -> Result<(), ConfigError> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ConfigError::malformed(field, format!("{name:?} is not a valid identifier")));
    }
    Ok(())
}
