//! Command-line front end for the verdict engine.
//!
//! # Usage
//!
//! ```bash
//! # Standard run, JSON artifact on stdout
//! claimgate --input observations.json --seed 42
//!
//! # Quick sanity run with a human-readable summary
//! claimgate --input observations.json --seed 42 --profile smoke --format summary
//!
//! # Separate group files, custom lanes, artifact written to disk
//! claimgate --group-a proximate.json --group-b distant.json --seed 7 \
//!   --lanes lanes.json --output artifact.json
//! ```
//!
//! Exit codes: 0 when an artifact was produced (whatever the verdict),
//! 2 when input or configuration was rejected, 1 on any other failure.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use claimgate::data::{load_observations, load_separate_files};
use claimgate::entitlement::PolicyTable;
use claimgate::output::{format_summary, to_json_pretty};
use claimgate::{
    ConfigError, EngineConfig, EngineError, LaneMatrix, PolicyRegistry, Profile, VerdictEngine,
};

/// Confirmatory verdicts with bounded claim entitlement
#[derive(Parser, Debug)]
#[command(name = "claimgate")]
#[command(about = "Produce a verdict artifact from two groups of observations")]
#[command(version)]
struct Args {
    /// Combined observation document ({ "group_a": .., "group_b": .. })
    #[arg(
        short,
        long,
        required_unless_present = "group_a",
        conflicts_with_all = ["group_a", "group_b"]
    )]
    input: Option<PathBuf>,

    /// Group A observations, when groups are stored separately
    #[arg(long, requires = "group_b")]
    group_a: Option<PathBuf>,

    /// Group B observations, when groups are stored separately
    #[arg(long, requires = "group_a")]
    group_b: Option<PathBuf>,

    /// Resampling seed
    #[arg(short, long)]
    seed: u64,

    /// Bootstrap and permutation iterations (overrides --profile)
    #[arg(short = 'n', long)]
    iterations: Option<usize>,

    /// Iteration preset: smoke (200), standard (2000), deep (10000)
    #[arg(short, long)]
    profile: Option<Profile>,

    /// Engine configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Policy version (overrides the configuration file)
    #[arg(long)]
    policy_version: Option<String>,

    /// Lane matrix replacing the built-in one
    #[arg(long)]
    lanes: Option<PathBuf>,

    /// Additional entitlement policy table
    #[arg(long)]
    policy: Option<PathBuf>,

    /// Write the JSON artifact to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// What to print on stdout
    #[arg(short, long, value_enum, default_value_t = Format::Json)]
    format: Format,

    /// Show debug logs
    #[arg(short, long)]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    /// Pretty-printed JSON artifact
    Json,
    /// Colored terminal summary
    Summary,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(&args);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::Engine(e)) if e.is_user_error() => {
            eprintln!("error: {}", e);
            ExitCode::from(2)
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(args: &Args) {
    let default = if args.verbose {
        "debug"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };
    let filter = if args.verbose || args.quiet {
        EnvFilter::new(default)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn run(args: &Args) -> Result<(), CliError> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::from_file(path).map_err(EngineError::from)?,
        None => EngineConfig::default(),
    };
    if let Some(version) = &args.policy_version {
        config.policy_version = version.clone();
    }

    let mut registry = PolicyRegistry::builtin().map_err(EngineError::from)?;
    if let Some(path) = &args.policy {
        let table = PolicyTable::from_file(path).map_err(EngineError::from)?;
        registry.register(table).map_err(EngineError::from)?;
    }

    let mut engine = VerdictEngine::with_config(config)
        .seed(args.seed)
        .policy_registry(registry);
    if let Some(path) = &args.lanes {
        engine = engine.lane_matrix(LaneMatrix::from_file(path).map_err(EngineError::from)?);
    }
    if let Some(profile) = args.profile {
        engine = engine.profile(profile);
    }
    if let Some(n) = args.iterations {
        if n == 0 {
            return Err(EngineError::from(ConfigError::Invalid(
                "iterations must be > 0".to_string(),
            ))
            .into());
        }
        engine = engine.iterations(n);
    }

    let observations = match (&args.input, &args.group_a, &args.group_b) {
        (Some(path), _, _) => load_observations(path),
        (None, Some(a), Some(b)) => load_separate_files(a, b),
        _ => {
            return Err(EngineError::from(ConfigError::Invalid(
                "either --input or both --group-a and --group-b are required".to_string(),
            ))
            .into())
        }
    }
    .map_err(EngineError::from)?;

    let artifact = engine.run(&observations)?;
    let json = to_json_pretty(&artifact).map_err(EngineError::Serialize)?;

    if let Some(path) = &args.output {
        fs::write(path, format!("{}\n", json)).map_err(|source| CliError::Write {
            path: path.clone(),
            source,
        })?;
    }
    match args.format {
        Format::Json if args.output.is_none() => println!("{}", json),
        Format::Json => {}
        Format::Summary => print!("{}", format_summary(&artifact)),
    }
    Ok(())
}
