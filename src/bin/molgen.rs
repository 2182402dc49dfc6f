use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use molgen_client::app::{App, Cancellation, RunOutcome};
use molgen_client::config::{ConfigLoader, ResolvedConfig, parse_filter_arg};
use molgen_client::domain::{StructureList, UploadedStructure};
use molgen_client::error::MolgenError;
use molgen_client::output::{GenerateReport, JsonOutput, OutputMode, StderrProgress};
use molgen_client::record::{SortKey, sort_records};
use molgen_client::service::GenerationHttpClient;
use molgen_client::state::MoleculeStore;
use molgen_client::tui::Tui;
use molgen_client::viewer::{ColorScheme, DisplayStyle, Representation, StructureViewer, SummaryViewer};

#[derive(Parser)]
#[command(name = "molgen")]
#[command(about = "Generate candidate molecules against protein structures on a remote service")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Upload structures and stream generated molecules")]
    Generate(GenerateArgs),
    #[command(about = "Print the resolved property filters")]
    Filters(SettingsArgs),
    #[command(about = "Summarize structure files without uploading them")]
    Inspect(InspectArgs),
}

#[derive(Args, Clone, Default)]
struct SettingsArgs {
    #[arg(long)]
    config: Option<String>,

    #[arg(long)]
    endpoint: Option<String>,

    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    #[arg(long)]
    num_molecules: Option<u32>,

    #[arg(long = "filter", value_name = "NAME=MIN:MAX")]
    filters: Vec<String>,
}

#[derive(Args, Clone)]
struct GenerateArgs {
    paths: Vec<Utf8PathBuf>,

    #[command(flatten)]
    settings: SettingsArgs,

    #[arg(long, value_name = "FILE")]
    output: Option<Utf8PathBuf>,

    #[arg(long, value_enum, default_value_t = SortKey::Arrival)]
    sort: SortKey,

    #[arg(long)]
    desc: bool,

    #[arg(long, value_enum, default_value_t = Representation::Cartoon)]
    style: Representation,

    #[arg(long, value_enum, default_value_t = ColorScheme::ChainIndex)]
    color: ColorScheme,
}

#[derive(Args)]
struct InspectArgs {
    #[arg(required = true)]
    paths: Vec<Utf8PathBuf>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(molgen) = report.downcast_ref::<MolgenError>() {
            return ExitCode::from(map_exit_code(molgen));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &MolgenError) -> u8 {
    match error {
        MolgenError::NoInput
        | MolgenError::InvalidFilter(_)
        | MolgenError::InvalidStructure(_)
        | MolgenError::ConfigRead(_)
        | MolgenError::ConfigParse(_) => 2,
        MolgenError::ServiceHttp(_) | MolgenError::ServiceStatus { .. } => 3,
        MolgenError::Cancelled => 130,
        MolgenError::Filesystem(_) => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    match cli.command {
        Some(Commands::Generate(args)) => run_generate(args, output_mode),
        Some(Commands::Filters(args)) => {
            let resolved = resolve_settings(&args)?;
            JsonOutput::print_filters(&resolved.filters).into_diagnostic()
        }
        Some(Commands::Inspect(args)) => run_inspect(args),
        None => match output_mode {
            OutputMode::Interactive => {
                let resolved = resolve_settings(&SettingsArgs::default())?;
                let structures = load_structures(&resolved.structures)?;
                let store = MoleculeStore::new();
                let service = GenerationHttpClient::new(&resolved.endpoint, resolved.timeout)
                    .into_diagnostic()?;
                let app = Arc::new(App::new(store.clone(), service));
                let session = Tui::new(store, structures, resolved.filters, DisplayStyle::default())
                    .run(app, false)?;
                if let Some(outcome) = &session.outcome {
                    print_summary(outcome, session.last_error.as_deref());
                }
                Ok(())
            }
            OutputMode::NonInteractive => Err(miette::Report::msg(
                "command required (try `molgen generate --help`)",
            )),
        },
    }
}

fn run_generate(args: GenerateArgs, output_mode: OutputMode) -> miette::Result<()> {
    let mut resolved = resolve_settings(&args.settings)?;
    if !args.paths.is_empty() {
        resolved.structures = args.paths.clone();
    }
    let structures = load_structures(&resolved.structures)?;

    let store = MoleculeStore::new();
    let service =
        GenerationHttpClient::new(&resolved.endpoint, resolved.timeout).into_diagnostic()?;
    let app = App::new(store.clone(), service);

    match output_mode {
        OutputMode::NonInteractive => {
            let result = app.run(
                structures.as_slice(),
                &resolved.filters,
                &Cancellation::new(),
                &StderrProgress,
            );
            let state = store.snapshot();
            let mut records = state.records.clone();
            sort_records(&mut records, args.sort, args.desc);
            if let Some(path) = &args.output {
                JsonOutput::save_records(path, &records)?;
            }
            JsonOutput::print_report(&GenerateReport::new(result.as_ref().ok(), &state, &records))
                .into_diagnostic()?;
            result.map(|_| ()).map_err(miette::Report::new)
        }
        OutputMode::Interactive => {
            let style = DisplayStyle {
                representation: args.style,
                color_scheme: args.color,
                ..DisplayStyle::default()
            };
            let session = Tui::new(store.clone(), structures, resolved.filters, style)
                .with_sort(args.sort, args.desc)
                .run(Arc::new(app), true)?;

            let mut records = store.records();
            sort_records(&mut records, args.sort, args.desc);
            if let Some(path) = &args.output {
                JsonOutput::save_records(path, &records)?;
            }
            match &session.outcome {
                Some(outcome) => print_summary(outcome, session.last_error.as_deref()),
                None => {
                    if let Some(error) = &session.last_error {
                        eprintln!("molgen: {error} ({} molecule(s) kept)", records.len());
                    }
                }
            }
            Ok(())
        }
    }
}

fn run_inspect(args: InspectArgs) -> miette::Result<()> {
    let viewer = SummaryViewer;
    let style = DisplayStyle::default();
    let mut summaries = Vec::with_capacity(args.paths.len());
    for path in &args.paths {
        let structure = UploadedStructure::from_path(path)?;
        summaries.push(viewer.load(&structure, &style)?.summary);
    }
    JsonOutput::print_summaries(&summaries).into_diagnostic()
}

fn resolve_settings(args: &SettingsArgs) -> miette::Result<ResolvedConfig> {
    let mut resolved = ConfigLoader::resolve(args.config.as_deref())?;
    if let Some(endpoint) = &args.endpoint {
        resolved.endpoint = endpoint.clone();
    }
    if let Some(timeout) = args.timeout {
        resolved.timeout = Duration::from_secs(timeout);
    }
    if let Some(count) = args.num_molecules {
        resolved.filters.set_num_molecules(count)?;
    }
    for filter in &args.filters {
        let (property, interval) = parse_filter_arg(filter, &resolved.filters)?;
        resolved.filters.set_interval(property, interval);
    }
    Ok(resolved)
}

fn load_structures(paths: &[Utf8PathBuf]) -> Result<StructureList, MolgenError> {
    paths
        .iter()
        .map(|path| UploadedStructure::from_path(path))
        .collect()
}

fn print_summary(outcome: &RunOutcome, error: Option<&str>) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let cyan = "\x1b[36m";
    let red = "\x1b[31m";
    let reset = "\x1b[0m";

    println!("{cyan}MOLGEN summary{reset}");
    println!("{green}Molecules: {}{reset}", outcome.accepted);
    println!(
        "{yellow}Duplicates: {}  Rejected: {}  Incomplete: {}  Malformed: {}{reset}",
        outcome.duplicates, outcome.rejected, outcome.incomplete, outcome.malformed
    );
    println!(
        "{cyan}Records read: {} in {} ms{reset}",
        outcome.total_records, outcome.elapsed_ms
    );
    if let Some(error) = error {
        println!("{red}Last run failed: {error}{reset}");
    }
}
