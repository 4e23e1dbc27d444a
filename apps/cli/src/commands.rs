//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::Ordering;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use docskill_core::pipeline::{Pipeline, ProgressReporter, RunReport};
use docskill_openrouter::OpenRouterTransport;
use docskill_shared::{
    AnalysisConfig, AppConfig, DocumentId, DocumentOutcome, RunOutcome, init_config, load_config,
    validate_api_key,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// docskill: turn a folder of documents into a writing skill.
#[derive(Parser)]
#[command(
    name = "docskill",
    version,
    about = "Analyze a directory of documents and synthesize a reusable writing skill (SKILL.md).",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Analyze every document in a directory and write the skill.
    Analyze {
        /// Directory holding the documents.
        dir: PathBuf,

        /// Model id to use (defaults to `openrouter.default_model`).
        #[arg(short, long)]
        model: Option<String>,

        /// Documents analyzed concurrently.
        #[arg(short, long)]
        concurrency: Option<u32>,

        /// Output directory (defaults to `<dir>/<output_dir_name>`).
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Recompute every artifact even if it already exists.
        #[arg(long)]
        force: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "docskill=info",
        1 => "docskill=debug",
        _ => "docskill=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Analyze {
            dir,
            model,
            concurrency,
            out,
            force,
        } => cmd_analyze(&dir, model.as_deref(), concurrency, out, force).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// analyze
// ---------------------------------------------------------------------------

async fn cmd_analyze(
    dir: &Path,
    model: Option<&str>,
    concurrency: Option<u32>,
    out: Option<PathBuf>,
    force: bool,
) -> Result<()> {
    // Validate API key before doing anything
    let config = load_config()?;
    validate_api_key(&config)?;

    if !dir.is_dir() {
        return Err(eyre!("'{}' is not a directory", dir.display()));
    }

    let mut analysis = AnalysisConfig::new(&config, dir);
    if let Some(n) = concurrency {
        analysis.concurrency = n.max(1);
    }
    if let Some(out) = out {
        analysis.output_dir = out;
    }
    analysis.force = force;

    let transport = Arc::new(OpenRouterTransport::from_config(&config, model)?);

    info!(
        dir = %dir.display(),
        model = model.unwrap_or(&config.openrouter.default_model),
        concurrency = analysis.concurrency,
        force,
        "analyzing documents"
    );

    let pipeline = Pipeline::new(transport, analysis);

    // Ctrl-C stops new documents; in-flight ones finish and are persisted.
    let cancel = pipeline.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing in-flight documents");
            cancel.store(true, Ordering::SeqCst);
        }
    });

    let progress = Arc::new(CliProgress::new());
    let report = pipeline.run(progress).await?;

    print_summary(&report);

    match &report.outcome {
        RunOutcome::Done => Ok(()),
        RunOutcome::Failed { reason } => Err(eyre!("run failed: {reason}")),
    }
}

fn print_summary(report: &RunReport) {
    println!();
    match &report.outcome {
        RunOutcome::Done => println!("  Skill generated successfully!"),
        RunOutcome::Failed { reason } => println!("  Run failed: {reason}"),
    }
    println!("  Run:     {}", report.run_id);
    println!("  Output:  {}", report.output_dir.display());
    println!("  Time:    {:.1}s", report.elapsed.as_secs_f64());
    println!();

    if !report.ranking.entries.is_empty() {
        println!("  Scored ({}):", report.ranking.entries.len());
        for entry in &report.ranking.entries {
            println!("    {:>3}. {:<40} {:>5.1}", entry.rank, entry.id.as_str(), entry.composite);
        }
    }

    for (label, title) in [
        ("unscorable", "Unscorable"),
        ("reports-missing", "Reports missing"),
        ("not-started", "Not started"),
    ] {
        let docs: Vec<_> = report
            .documents
            .iter()
            .filter(|(_, o)| o.label() == label)
            .collect();
        if docs.is_empty() {
            continue;
        }
        println!("  {title} ({}):", docs.len());
        for (id, outcome) in docs {
            match outcome.reason() {
                Some(reason) => println!("    - {id}: {reason}"),
                None => println!("    - {id}"),
            }
        }
    }

    if !report.skipped.is_empty() {
        println!("  Skipped files ({}):", report.skipped.len());
        for skipped in &report.skipped {
            println!("    - {}: {}", skipped.path.display(), skipped.reason);
        }
    }

    if report.outcome.is_done() {
        println!();
        println!("  Skill:   {}", report.output_dir.join("SKILL.md").display());
    }
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn document_started(&self, id: &DocumentId, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Analyzing [{current}/{total}] {id}"));
    }

    fn document_finished(&self, id: &DocumentId, outcome: &DocumentOutcome) {
        match outcome {
            DocumentOutcome::Scored { composite } => {
                self.spinner.println(format!("  ✓ {id} ({composite:.1})"));
            }
            other => {
                self.spinner.println(format!("  ✗ {id} [{}]", other.label()));
            }
        }
    }

    fn done(&self, _report: &RunReport) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn analyze_flags_parse() {
        let cli = Cli::try_parse_from([
            "docskill",
            "-vv",
            "analyze",
            "reports",
            "--model",
            "openai/gpt-4o",
            "--concurrency",
            "2",
            "--force",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Analyze {
                dir,
                model,
                concurrency,
                out,
                force,
            } => {
                assert_eq!(dir, PathBuf::from("reports"));
                assert_eq!(model.as_deref(), Some("openai/gpt-4o"));
                assert_eq!(concurrency, Some(2));
                assert!(out.is_none());
                assert!(force);
            }
            Command::Config { .. } => panic!("expected analyze"),
        }
    }
}
