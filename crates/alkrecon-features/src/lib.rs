//! alkrecon-features — Feature Extractor.
//!
//! Three rule families, each driven by `RuleConfig` tables:
//! - on-target ALK: site-table lookup of normalised protein changes, with an
//!   unlisted category for the rest
//! - bypass: configured genes with amplification / activating SNV thresholds
//! - persistence: expression signature score against a threshold
//!
//! Every flag is backed by a ledger entry written at the same time.

pub mod alk;
pub mod bypass;
pub mod extractor;
pub mod normalise;
pub mod persistence;

pub use extractor::{ExtractionReport, FeatureExtractor};
pub use normalise::ProteinChangeNormaliser;
pub use persistence::{signature_score, SignatureScore};
