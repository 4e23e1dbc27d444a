//! docskill CLI: derive a writing skill from a directory of documents.
//!
//! Analyzes every document with a language model, scores and ranks them,
//! and synthesizes a reusable SKILL.md from the corpus.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
