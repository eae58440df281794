//! Equitable Classrooms solver
//!
//! Forms next year's classes for every grade of a roster.
//!
//! **Usage:**
//! ```bash
//! eqc-solver solve [--config FILE] [--roster FILE] [--output FILE] [--seed N]
//!                  [--classes GRADE=N]... [--max-attempts N] [--interactive]
//! eqc-solver init-config [--path FILE]
//! ```

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use eqc_common::config::{default_config_path, write_toml_config};
use eqc_common::{ExitGrade, SolverConfig};
use eqc_solver::cohort::GradeCohort;
use eqc_solver::planner::{
    collect_placements, parse_class_override, prompt_class_count, random_seed, resolve_class_counts, ClassPlanner,
};
use eqc_solver::report::{CliFormatter, PlacementReport};
use eqc_solver::roster::{group_by_grade, load_roster};
use eqc_solver::{PatternBook, SearchOutcome};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Balanced classroom placement
#[derive(Parser, Debug)]
#[command(name = "eqc-solver", version)]
#[command(about = "Form balanced classrooms for next year from a student roster")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Solve every grade of a roster
    Solve(SolveArgs),

    /// Write the default configuration file
    InitConfig {
        /// Target file (defaults to the platform config location)
        #[arg(long, value_name = "FILE")]
        path: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct SolveArgs {
    /// Configuration file (overrides EQC_CONFIG)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Roster JSON file
    #[arg(long, value_name = "FILE")]
    roster: Option<PathBuf>,

    /// Write the placement report to this JSON file
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,

    /// Classes for a grade, e.g. KG=3 (repeatable)
    #[arg(long = "classes", value_name = "GRADE=N", value_parser = parse_class_arg)]
    classes: Vec<(ExitGrade, usize)>,

    /// Maximum attempts per grade
    #[arg(long)]
    max_attempts: Option<u64>,

    /// Ask for class counts missing from the configuration
    #[arg(long)]
    interactive: bool,
}

fn parse_class_arg(value: &str) -> std::result::Result<(ExitGrade, usize), String> {
    parse_class_override(value).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Solve(args) => solve(args).await,
        Command::InitConfig { path } => init_config(path),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // No-op when logging is already set up
            init_logging("info", None);
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Initialize tracing; `RUST_LOG` wins over the configured level
fn init_logging(level: &str, file: Option<&Path>) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let log_file = file.map(|path| OpenOptions::new().create(true).append(true).open(path));
    match log_file {
        Some(Ok(handle)) => {
            let _ = builder.with_ansi(false).with_writer(Mutex::new(handle)).try_init();
        }
        Some(Err(e)) => {
            let _ = builder.with_writer(std::io::stderr).try_init();
            warn!("Cannot open log file, logging to stderr: {}", e);
        }
        None => {
            let _ = builder.with_writer(std::io::stderr).try_init();
        }
    }
}

async fn solve(args: SolveArgs) -> Result<()> {
    let (mut config, source) =
        SolverConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    let log_file = config.logging.file.as_ref().map(|p| config.resolve_path(p));
    init_logging(&config.logging.level, log_file.as_deref());

    info!("Starting Equitable Classrooms solver v{}", env!("CARGO_PKG_VERSION"));
    match source.path() {
        Some(path) => info!("Configuration: {}", path.display()),
        None => warn!("No configuration file found, using built-in defaults"),
    }

    if let Some(max_attempts) = args.max_attempts {
        config.search.max_attempts = max_attempts;
        config.validate().context("Invalid --max-attempts")?;
    }

    let roster_path = args
        .roster
        .or_else(|| config.roster.as_ref().map(|p| config.resolve_path(p)))
        .context("No roster file; pass --roster or set `roster` in the configuration")?;
    let students = load_roster(&roster_path)
        .with_context(|| format!("Failed to load roster {}", roster_path.display()))?;
    let cohorts = group_by_grade(students)?;

    let clusters_path = config.resolve_path(&config.patterns.clusters);
    let affinity_path = config.resolve_path(&config.patterns.affinity);
    let patterns = PatternBook::load(&clusters_path, &affinity_path).context("Failed to load pattern files")?;

    let counts = if args.interactive {
        let mut input = std::io::stdin().lock();
        let mut output = std::io::stdout();
        resolve_class_counts(
            &config,
            &args.classes,
            &cohorts,
            Some(|cohort: &GradeCohort| prompt_class_count(&mut input, &mut output, cohort)),
        )?
    } else {
        resolve_class_counts(
            &config,
            &args.classes,
            &cohorts,
            None::<fn(&GradeCohort) -> eqc_solver::Result<usize>>,
        )?
    };

    let seed = args.seed.or(config.seed).unwrap_or_else(random_seed);
    let planner = ClassPlanner::from_config(&config, Arc::new(patterns), seed);
    let outcomes = planner.solve_outcomes(cohorts, &counts).await?;

    for (_, outcome) in &outcomes {
        if let Ok(SearchOutcome::Exhausted(exhaustion)) = outcome {
            eprint!("{}", CliFormatter::format_exhaustion(exhaustion));
        }
    }
    let placements = collect_placements(outcomes)?;

    let report = PlacementReport::new(planner.seed(), config.tolerances, config.large_group_threshold, &placements);
    for grade in &report.grades {
        print!("{}", CliFormatter::format_grade(grade));
    }
    print!("{}", CliFormatter::format_summary(&report));

    let output_path = args
        .output
        .or_else(|| config.output.as_ref().map(|p| config.resolve_path(p)));
    if let Some(path) = output_path {
        report
            .export_json(&path)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
        info!("Report written to {}", path.display());
    }

    Ok(())
}

fn init_config(path: Option<PathBuf>) -> Result<()> {
    init_logging("info", None);

    let target = path
        .or_else(default_config_path)
        .context("No platform config directory; pass --path")?;
    if target.exists() {
        anyhow::bail!("{} already exists; not overwriting", target.display());
    }

    write_toml_config(&SolverConfig::default(), &target)
        .with_context(|| format!("Failed to write {}", target.display()))?;
    info!("Default configuration written to {}", target.display());
    Ok(())
}
