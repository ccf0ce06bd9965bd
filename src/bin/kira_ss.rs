use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use kira_structure_selector::app::{self, HttpApp, InputSource, ResolveRequest};
use kira_structure_selector::config::{ConfigLoader, ConfigOverrides};
use kira_structure_selector::domain::{StructureFormat, StructureId};
use kira_structure_selector::error::SelectorError;
use kira_structure_selector::output::{self, JsonOutput, OutputMode};
use kira_structure_selector::pipeline::CancellationToken;
use kira_structure_selector::rcsb::RcsbHttpClient;

#[derive(Parser)]
#[command(name = "kira-ss")]
#[command(about = "Select and download one representative PDB structure per UniProt entry")]
#[command(version, author)]
struct Cli {
    /// Print machine-readable JSON instead of a summary
    #[arg(long, global = true)]
    json: bool,

    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG wins when set
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to kira-ss.json
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Resolve proteins to structures and download them")]
    Resolve(ResolveArgs),
    #[command(about = "Score PDB entries without downloading anything")]
    Score(ScoreArgs),
}

#[derive(Args)]
struct ResolveArgs {
    /// Plain id list, or a CSV/TSV table with a header row
    input: Utf8PathBuf,

    /// Column holding protein ids (default `Entry` for tables)
    #[arg(long)]
    column: Option<String>,

    #[arg(long, short = 'd')]
    destination: Option<Utf8PathBuf>,

    #[arg(long)]
    format: Option<StructureFormat>,

    #[arg(long, short = 'j')]
    workers: Option<usize>,

    #[arg(long)]
    max_retries: Option<usize>,

    /// Write the protein -> structure mapping as TSV
    #[arg(long)]
    mapping: Option<Utf8PathBuf>,

    /// Write the input table back with a Selected_PDB column
    #[arg(long)]
    annotate: Option<Utf8PathBuf>,

    #[arg(long)]
    absent_marker: Option<String>,
}

#[derive(Args)]
struct ScoreArgs {
    #[arg(required = true)]
    ids: Vec<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<SelectorError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &SelectorError) -> u8 {
    match error {
        SelectorError::ConfigRead(_)
        | SelectorError::ConfigParse(_)
        | SelectorError::InvalidConfig(_)
        | SelectorError::InputRead { .. }
        | SelectorError::MissingColumn(_)
        | SelectorError::InvalidProteinId(_)
        | SelectorError::InvalidStructureId(_) => 2,
        SelectorError::PdbeHttp(_)
        | SelectorError::PdbeStatus { .. }
        | SelectorError::RcsbHttp(_)
        | SelectorError::RcsbStatus { .. } => 3,
        _ => 1,
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Ctrl-C stops dispatching new proteins; in-flight ones finish and the
/// partial mapping is still written.
fn install_interrupt_handler(cancel: &CancellationToken) {
    let cancel = cancel.clone();
    let installed = ctrlc::set_handler(move || {
        tracing::warn!("interrupted, finishing in-flight proteins");
        cancel.cancel();
    });
    if let Err(err) = installed {
        tracing::warn!(error = %err, "Ctrl-C handler not installed");
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    match cli.command {
        Commands::Resolve(args) => run_resolve(args, cli.config.as_deref(), output_mode),
        Commands::Score(args) => run_score(args, cli.config.as_deref(), output_mode),
    }
}

fn run_resolve(
    args: ResolveArgs,
    config_path: Option<&str>,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let ResolveArgs {
        input,
        column,
        destination,
        format,
        workers,
        max_retries,
        mapping,
        annotate,
        absent_marker,
    } = args;

    let overrides = ConfigOverrides {
        destination,
        format,
        workers,
        max_retries,
        absent_marker,
    };
    let config = ConfigLoader::resolve(config_path, overrides)?;
    let app = HttpApp::from_config(&config)?;

    let request = ResolveRequest {
        input: InputSource::detect(input, column),
        mapping,
        annotate,
    };
    let cancel = CancellationToken::new();
    install_interrupt_handler(&cancel);
    let report = app.resolve(&request, &cancel)?;

    match output_mode {
        OutputMode::Json => JsonOutput::print_report(&report).into_diagnostic()?,
        OutputMode::Human => output::print_summary(&report),
    }
    Ok(())
}

fn run_score(
    args: ScoreArgs,
    config_path: Option<&str>,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let config = ConfigLoader::resolve(config_path, ConfigOverrides::default())?;
    let ids = args
        .ids
        .iter()
        .map(|value| value.parse::<StructureId>())
        .collect::<Result<Vec<_>, _>>()?;

    let rcsb = RcsbHttpClient::new(&config)?;
    let result = app::score_structures(&rcsb, &ids);

    match output_mode {
        OutputMode::Json => JsonOutput::print_scores(&result).into_diagnostic()?,
        OutputMode::Human => output::print_scores(&result),
    }
    Ok(())
}
