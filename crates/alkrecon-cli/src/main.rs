//! `alkrecon` command-line entry point.

mod cli;

use std::path::Path;

use alkrecon_common::{BucketKey, EngineConfig};
use alkrecon_engine::{BatchInput, Engine};
use anyhow::{bail, Context};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so the report can be piped.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("alkrecon=info,warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run { input, output, strict } => {
            let engine = Engine::new(config)?;

            let raw = std::fs::read_to_string(&input)
                .with_context(|| format!("cannot read batch input {}", input.display()))?;
            let batch = BatchInput::from_json(&raw)
                .with_context(|| format!("{} is not a valid batch input", input.display()))?;
            let assembled = batch.assemble();
            let snapshots = assembled.snapshots;
            info!(
                cases = snapshots.len(),
                shadowed_expression = assembled.shadowed_expression.len(),
                input = %input.display(),
                "batch loaded"
            );

            let report = engine.run_batch(snapshots);
            let json = report.to_json()?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("cannot write report {}", path.display()))?;
                    info!(path = %path.display(), "report written");
                }
                None => println!("{json}"),
            }

            if strict && report.summary.failed > 0 {
                bail!("{} of {} cases failed", report.summary.failed, report.summary.total);
            }
        }

        Commands::Config => {
            print!("{}", config.to_toml()?);
        }

        Commands::Buckets => {
            for key in [BucketKey::A, BucketKey::B, BucketKey::C, BucketKey::D, BucketKey::E] {
                println!("{key}  {}", key.description());
            }
        }
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    let config = match path {
        Some(p) => EngineConfig::from_path(p)?,
        None => EngineConfig::load()?,
    };
    info!(
        routing_rules = config.routing.rules.len(),
        bypass_genes = config.rules.bypass.genes.len(),
        "configuration loaded"
    );
    Ok(config)
}
