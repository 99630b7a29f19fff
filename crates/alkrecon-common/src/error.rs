use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entities::BucketKey;
use crate::evidence::{EvidenceLayer, SourceRef};
use crate::snapshot::SnapshotStage;

/// A feature could not cite a valid source. The flag is dropped, the case continues.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProvenanceError {
    #[error("feature `{feature_name}` ({layer}) has no source reference")]
    MissingSource {
        feature_name: String,
        layer: EvidenceLayer,
    },

    #[error("feature `{feature_name}` cites unresolvable source {source_ref}")]
    UnresolvedSource {
        feature_name: String,
        source_ref: SourceRef,
    },

    #[error("feature flag `{feature_name}` has no ledger entry")]
    UnbackedFlag { feature_name: String },

    #[error("ledger entry {found} breaks the id sequence (expected {expected})")]
    IdSequence { expected: u32, found: u32 },
}

/// A routing predicate named a flag that was never computed.
/// Evaluates to false; recorded and logged, never raised.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("routing rule for bucket {bucket} references undefined flag `{flag}`")]
pub struct UndefinedFlagReference {
    pub bucket: BucketKey,
    pub flag: String,
}

/// Configuration failures. Fatal for the whole run.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read rule config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed rule config: {field}: {reason}")]
    MalformedRuleConfig { field: String, reason: String },
}

impl ConfigError {
    pub fn malformed(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::MalformedRuleConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Hard per-case failures; the case is excluded from the batch and reported.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PipelineError {
    #[error("stage violation: expected snapshot at {expected}, found {found}")]
    StageViolation {
        expected: SnapshotStage,
        found: SnapshotStage,
    },

    #[error("invalid snapshot: {reason}")]
    InvalidSnapshot { reason: String },
}

#[derive(Debug, Error)]
pub enum AlkReconError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Provenance error: {0}")]
    Provenance(#[from] ProvenanceError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AlkReconError>;
