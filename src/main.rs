mod cli;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use scope_embed::config::ScopeEmbedConfig;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "scope-embed",
    version,
    about = "Attach precomputed embeddings to a Parquet table by row position"
)]
struct Cli {
    /// Config file to load instead of ~/.scope-embed/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Attach the embeddings to the table and write the output file (default)
    Merge,
    /// Re-read the output file and check its embeddings match the matrix
    Verify,
    /// Show the shape and head of a Parquet file, or the tensors in a safetensors file
    Inspect {
        /// File to inspect
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ScopeEmbedConfig::load_from(path)?,
        None => ScopeEmbedConfig::load()?,
    };

    // Log to stderr so stdout carries only the data preview.
    let filter = EnvFilter::try_new(&config.logging.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command.unwrap_or(Command::Merge) {
        Command::Merge => cli::merge::merge(&config)?,
        Command::Verify => cli::verify::verify(&config)?,
        Command::Inspect { file } => cli::inspect::inspect(&config, &file)?,
    }

    Ok(())
}
