use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use plangate_kernel::check::check_plan;
use plangate_kernel::evaluate::EvaluationReport;

mod loader;
mod render;

/// Plangate change gate CLI
#[derive(Parser, Debug)]
#[command(name = "plangate")]
#[command(about = "Check an infrastructure plan against allow-list policies", long_about = None)]
struct Cli {
    /// Path to the plan JSON
    plan: PathBuf,

    /// Paths to policy JSON documents, merged in order
    #[arg(required = true)]
    policies: Vec<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Log level for diagnostics on stderr (overridden by RUST_LOG)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

/// Wrapper for JSON output
#[derive(Debug, Serialize)]
struct CliOutput<'a> {
    plan: String,
    policies: Vec<String>,
    #[serde(flatten)]
    report: &'a EvaluationReport,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    // ----------------------------
    // Load policies
    // ----------------------------
    let documents = cli
        .policies
        .iter()
        .map(|path| loader::load_policy(path))
        .collect::<Result<Vec<_>>>()?;

    // ----------------------------
    // Load plan
    // ----------------------------
    let plan = loader::load_plan(&cli.plan)?;

    // ----------------------------
    // Evaluate
    // ----------------------------
    let report = check_plan(&plan, documents)
        .with_context(|| format!("checking {}", cli.plan.display()))?;
    info!(
        entries = report.entries.len(),
        denied = report.denied().count(),
        verdict = %report.verdict,
        "plan checked"
    );

    // ----------------------------
    // Emit
    // ----------------------------
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match cli.format {
        Format::Text => render::render_text(&report, &mut out)?,
        Format::Json => {
            let output = CliOutput {
                plan: cli.plan.display().to_string(),
                policies: cli
                    .policies
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect(),
                report: &report,
            };
            serde_json::to_writer_pretty(&mut out, &output)?;
            writeln!(out)?;
        }
    }
    out.flush()?;

    Ok(if report.verdict.is_allowed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("plangate={level},plangate_kernel={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}
