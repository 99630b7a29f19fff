//! alkrecon-common — Case model, evidence ledger, rule configuration and
//! errors shared by every ALK-RECON stage.

pub mod error;
pub mod entities;
pub mod evidence;
pub mod snapshot;
pub mod rule_config;
pub mod routing_rules;

// Re-export commonly used types
pub use entities::{
    Alteration, BucketKey, ExpressionSummary, MechanismClass, MechanismScore, RoutingBucket,
    VariantType,
};
pub use error::{AlkReconError, ConfigError, PipelineError, ProvenanceError, Result, UndefinedFlagReference};
pub use evidence::{
    CaseSources, EvidenceDraft, EvidenceEntry, EvidenceId, EvidenceLayer, EvidenceLedger,
    FeatureFlag, FeatureSet, FeatureValue, SourceRef, SourceResolver, SourceType,
};
pub use rule_config::{EngineConfig, RuleConfig};
pub use routing_rules::{Predicate, RoutingRule, RoutingRules};
pub use snapshot::{CaseKey, CaseSnapshot, SnapshotStage, Verdict};
