use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use rosetta_cli::logging::DEFAULT_LOG_LEVEL;
use rosetta_cli::{
    analyze, init_logging, resolve_credentials, AnalysisOptions, DataLayout, Endpoints,
    ExtractionRun, RosettaConfig, Subsystem, SystemLookup,
};
use rosetta_fetch::{FetchController, HttpTransport, TokioPacer};
use std::path::PathBuf;
use std::process::ExitCode;

/// Exit code when the CRM refused the session mid-run
const EXIT_HARD_ERROR: u8 = 2;

fn cli() -> Command {
    Command::new("crm-rosetta")
        .version(rosetta_cli::VERSION)
        .about("Correlate CRM fields across workflows, blueprints and functions")
        .subcommand_required(true)
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Log at debug level"),
        )
        .subcommand(
            Command::new("extract")
                .about("Fetch automation metadata from the CRM and persist it")
                .arg(
                    Arg::new("config")
                        .long("config")
                        .short('c')
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("TOML configuration file"),
                )
                .arg(
                    Arg::new("only")
                        .long("only")
                        .value_delimiter(',')
                        .value_parser(value_parser!(String))
                        .help("Subsystems to extract: modules,workflows,blueprints,functions"),
                ),
        )
        .subcommand(
            Command::new("analyze")
                .about("Build the field Rosetta map from a persisted extraction")
                .arg(
                    Arg::new("data")
                        .long("data")
                        .default_value("data")
                        .value_parser(value_parser!(PathBuf))
                        .help("Extraction directory"),
                )
                .arg(
                    Arg::new("output")
                        .long("output")
                        .short('o')
                        .default_value("rosetta.json")
                        .value_parser(value_parser!(PathBuf))
                        .help("Rosetta JSON output file"),
                )
                .arg(
                    Arg::new("include-unreferenced")
                        .long("include-unreferenced")
                        .action(ArgAction::SetTrue)
                        .help("Also list catalog fields no construct touches"),
                ),
        )
}

async fn run_extract(args: &ArgMatches, verbose: bool) -> anyhow::Result<ExitCode> {
    let config_path = args
        .get_one::<PathBuf>("config")
        .context("--config is required")?;
    let config = RosettaConfig::from_path(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    init_logging(&config.output.log_level, verbose);

    let subsystems: Vec<Subsystem> = match args.get_many::<String>("only") {
        Some(names) => names
            .map(|name| name.parse::<Subsystem>().map_err(anyhow::Error::msg))
            .collect::<anyhow::Result<_>>()?,
        None => Subsystem::ALL.to_vec(),
    };

    let credentials = resolve_credentials(&config.credential_sources(), &SystemLookup)?;
    let org_id = config
        .api
        .org_id
        .clone()
        .unwrap_or_else(|| credentials.org_id.clone());
    let transport = HttpTransport::new(&credentials, config.api.request_timeout())?;
    let controller = FetchController::new(transport, TokioPacer, config.fetch.clone())?;
    let endpoints = Endpoints::new(config.api.base_url.clone(), org_id);
    let layout = DataLayout::new(config.output.data_dir.clone());

    let summary = ExtractionRun::new(&controller, &endpoints, &layout)
        .run(&subsystems)
        .await?;
    tracing::info!(
        "extraction finished: {} documents in {}",
        summary.persisted(),
        layout.root().display()
    );

    match &summary.hard_error {
        Some(error) => {
            tracing::error!("{error}");
            if error.requires_new_session() {
                tracing::error!("refresh the session cookie and CSRF token, then rerun");
            }
            Ok(ExitCode::from(EXIT_HARD_ERROR))
        }
        None => Ok(ExitCode::SUCCESS),
    }
}

fn run_analyze(args: &ArgMatches, verbose: bool) -> anyhow::Result<ExitCode> {
    init_logging(DEFAULT_LOG_LEVEL, verbose);
    let options = AnalysisOptions {
        data_dir: args
            .get_one::<PathBuf>("data")
            .cloned()
            .unwrap_or_else(|| PathBuf::from("data")),
        output: args
            .get_one::<PathBuf>("output")
            .cloned()
            .unwrap_or_else(|| PathBuf::from("rosetta.json")),
        include_unreferenced: args.get_flag("include-unreferenced"),
    };
    analyze(&options)?;
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    let matches = cli().get_matches();
    let verbose = matches.get_flag("verbose");

    let result = match matches.subcommand() {
        Some(("extract", args)) => run_extract(args, verbose).await,
        Some(("analyze", args)) => run_analyze(args, verbose),
        _ => Ok(ExitCode::SUCCESS),
    };

    match result {
        Ok(code) => code,
        Err(error) => {
            init_logging(DEFAULT_LOG_LEVEL, verbose);
            tracing::error!("{error:#}");
            eprintln!("error: {error:#}");
            ExitCode::FAILURE
        }
    }
}
