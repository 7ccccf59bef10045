use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pathway_index::app::{App, BuildOptions};
use pathway_index::config::{ConfigLoader, ConfigOverrides};
use pathway_index::error::IndexError;
use pathway_index::graph::{GraphClient, Neo4jHttpClient, QueryParams, Record};
use pathway_index::output::{self, ConsoleProgress, JsonOutput, OutputMode};
use pathway_index::pipeline::Target;
use pathway_index::store::IndexStore;

/// Exit status when the run finished but some relations could not be built.
const PARTIAL_BUILD: u8 = 5;

#[derive(Parser)]
#[command(name = "pathway-index")]
#[command(about = "Builds gene, protein, proteoform, reaction, pathway and variant lookup tables from a pathway knowledge graph")]
#[command(version, author)]
struct Cli {
    /// Print machine-readable JSON on stdout instead of a summary.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Query the graph and write the index")]
    Build(BuildArgs),
    #[command(about = "List artifacts recorded in the index manifest")]
    List(LocationArgs),
    #[command(about = "Show the first entries of one artifact")]
    Inspect(InspectArgs),
}

#[derive(Args, Clone, Default)]
struct LocationArgs {
    #[arg(long)]
    config: Option<String>,

    #[arg(long)]
    output: Option<String>,
}

#[derive(Args, Clone)]
struct BuildArgs {
    #[command(flatten)]
    location: LocationArgs,

    /// Target or artifact name; repeat to build several. Defaults to all.
    #[arg(long = "relation", value_name = "NAME")]
    relations: Vec<String>,

    #[arg(long)]
    endpoint: Option<String>,

    #[arg(long)]
    database: Option<String>,

    #[arg(long)]
    username: Option<String>,

    #[arg(long)]
    species: Option<String>,

    /// Directory holding the per-chromosome tables `1.gz` to `22.gz`.
    #[arg(long)]
    variants: Option<String>,
}

#[derive(Args, Clone)]
struct InspectArgs {
    name: String,

    #[command(flatten)]
    location: LocationArgs,

    #[arg(long, default_value_t = 10)]
    limit: usize,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(report) => {
            eprintln!("{report:?}");
            if let Some(error) = report.downcast_ref::<IndexError>() {
                return ExitCode::from(map_exit_code(error));
            }
            ExitCode::from(1)
        }
    }
}

fn map_exit_code(error: &IndexError) -> u8 {
    match error {
        IndexError::ConfigRead(_)
        | IndexError::ConfigParse(_)
        | IndexError::InvalidRelation(_)
        | IndexError::ArtifactNotFound(_) => 2,
        IndexError::Persistence { .. } => 4,
        error if error.is_graph() => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    match cli.command {
        Commands::Build(args) => run_build(args, output_mode),
        Commands::List(args) => {
            run_list(args, output_mode)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Inspect(args) => {
            run_inspect(args, output_mode)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn run_build(args: BuildArgs, output_mode: OutputMode) -> miette::Result<ExitCode> {
    let BuildArgs {
        location,
        relations,
        endpoint,
        database,
        username,
        species,
        variants,
    } = args;

    let targets = relations
        .iter()
        .map(|name| name.parse::<Target>())
        .collect::<Result<Vec<_>, _>>()?;

    let overrides = ConfigOverrides {
        endpoint,
        database,
        username,
        species,
        variant_dir: variants,
        output_dir: location.output,
    };
    let config = ConfigLoader::resolve(location.config.as_deref(), overrides)?;

    let graph = Neo4jHttpClient::new(&config.graph)?;
    match graph.probe() {
        Ok(()) => info!(endpoint = graph.endpoint(), "graph database reachable"),
        Err(err) => warn!("{err}; queries will be attempted anyway"),
    }

    let app = App::new(IndexStore::new(config.output_dir.clone()), graph);
    let options = BuildOptions { targets };
    let report = match output_mode {
        OutputMode::Json => {
            let report = app.build(&config, options, &JsonOutput)?;
            JsonOutput::print_build(&report).into_diagnostic()?;
            report
        }
        OutputMode::Human => {
            let report = app.build(&config, options, &ConsoleProgress)?;
            output::print_build_summary(&report);
            report
        }
    };

    if report.is_complete() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(PARTIAL_BUILD))
    }
}

fn run_list(args: LocationArgs, output_mode: OutputMode) -> miette::Result<()> {
    let app = local_app(&args)?;
    match output_mode {
        OutputMode::Json => {
            let result = app.list(&JsonOutput)?;
            JsonOutput::print_list(&result).into_diagnostic()?;
        }
        OutputMode::Human => {
            let result = app.list(&ConsoleProgress)?;
            output::print_list(&result);
        }
    }
    Ok(())
}

fn run_inspect(args: InspectArgs, output_mode: OutputMode) -> miette::Result<()> {
    let app = local_app(&args.location)?;
    match output_mode {
        OutputMode::Json => {
            let result = app.inspect(&args.name, args.limit, &JsonOutput)?;
            JsonOutput::print_inspect(&result).into_diagnostic()?;
        }
        OutputMode::Human => {
            let result = app.inspect(&args.name, args.limit, &ConsoleProgress)?;
            output::print_inspect(&result).into_diagnostic()?;
        }
    }
    Ok(())
}

/// An app over the configured output directory that never talks to the graph.
fn local_app(location: &LocationArgs) -> miette::Result<App<NopGraph>> {
    let overrides = ConfigOverrides {
        output_dir: location.output.clone(),
        ..ConfigOverrides::default()
    };
    let config = ConfigLoader::resolve(location.config.as_deref(), overrides)?;
    Ok(App::new(IndexStore::new(config.output_dir), NopGraph))
}

struct NopGraph;

impl GraphClient for NopGraph {
    fn execute(&self, _query: &str, _params: &QueryParams) -> Result<Vec<Record>, IndexError> {
        Err(IndexError::GraphHttp(
            "graph access is not available for this command".to_string(),
        ))
    }
}
