//! alkrecon-engine — batch orchestration.
//!
//! Builds snapshots from batch input, runs each one through extraction,
//! scoring and routing, and collects a per-case outcome report.
//!
//! ```rust,no_run
//! use alkrecon_common::EngineConfig;
//! use alkrecon_engine::{BatchInput, Engine};
//!
//! fn main() -> anyhow::Result<()> {
//!     let engine = Engine::new(EngineConfig::load()?)?;
//!     let input = BatchInput::from_json(&std::fs::read_to_string("cases.json")?)?;
//!     let report = engine.run_batch(input.into_snapshots());
//!     println!("{}", report.to_json()?);
//!     Ok(())
//! }
//! ```

pub mod ingest;
pub mod pipeline;
pub mod report;

pub use ingest::{
    attach_expression, group_alterations, AlterationRow, AssembledBatch, BatchInput, CaseInput, ExpressionIndex,
    ExpressionRow,
};
pub use pipeline::{Engine, PARALLEL_THRESHOLD};
pub use report::{BatchReport, BatchSummary, CaseOutcome};
