use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "alkrecon",
    about = "ALK-RECON: resistance mechanism classification with per-flag provenance",
    version
)]
pub struct Cli {
    /// Rule config (TOML, YAML or JSON). Defaults to $ALKRECON_CONFIG, then ./alkrecon.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Classify every case in a batch input file
    Run {
        /// Batch input JSON (`cases`, `alterations`, `expression`)
        #[arg(long)]
        input: PathBuf,

        /// Write the report here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,

        /// Exit non-zero when any case fails
        #[arg(long)]
        strict: bool,
    },

    /// Validate the rule config and print the effective tables as TOML
    Config,

    /// List routing buckets and their strategy descriptions
    Buckets,
}
