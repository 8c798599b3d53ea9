#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]

use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use rate::progress::ConsoleKldProgress;
use rate::shared::files::{load_matrix, load_names};
use rate::{RateConfig, RateInput, RateResult, rate_with_progress};

/// Number of top-ranked predictors echoed to the console after a run.
const TOP_PREDICTORS_SHOWN: usize = 10;

#[derive(Args)]
pub struct ComputeArgs {
    /// Design matrix X (n samples x p predictors), whitespace/tab/comma separated
    #[arg(long, value_name = "PATH")]
    pub design: PathBuf,

    /// Function-space posterior draws (n_draws x n samples)
    #[arg(long, value_name = "PATH", required_unless_present = "beta_draws")]
    pub f_draws: Option<PathBuf>,

    /// Effect-size posterior draws (n_draws x p predictors)
    #[arg(long, value_name = "PATH")]
    pub beta_draws: Option<PathBuf>,

    /// Predictor names, one per line (defaults to 1..p)
    #[arg(long, value_name = "PATH")]
    pub names: Option<PathBuf>,

    /// TOML file with RATE settings; command-line flags take precedence
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Proportion of design-matrix variance to keep in low-rank mode
    #[arg(long, value_name = "FRACTION")]
    pub prop_var: Option<f64>,

    /// Use the low-rank approximation through a truncated SVD of X
    #[arg(long)]
    pub low_rank: bool,

    /// Evaluate per-predictor KLDs on a worker pool
    #[arg(long)]
    pub parallel: bool,

    /// Worker pool size for --parallel (defaults to all hardware threads)
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,

    /// Output TSV with one row per predictor
    #[arg(long, value_name = "PATH", default_value = "rate.tsv")]
    pub out: PathBuf,

    /// Optional TOML file receiving the full result
    #[arg(long, value_name = "PATH")]
    pub summary: Option<PathBuf>,
}

#[derive(Parser)]
#[command(
    name = "rate",
    about = "Variable importance for Bayesian models via RelATive cEntrality (RATE)",
    long_about = "Computes per-predictor Kullback-Leibler divergences from posterior draws \
                 and normalizes them into RATE scores, together with the entropic deviation \
                 from uniformity (delta) and its effective sample size calibration."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute RATE scores from a design matrix and posterior draws
    #[command(about = "Compute RATE scores (outputs: rate.tsv)")]
    Compute(ComputeArgs),

    /// Display version information
    #[command(about = "Display version information")]
    Version,
}

fn resolve_config(args: &ComputeArgs) -> Result<RateConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => {
            println!("Loading settings from: {}", path.display());
            RateConfig::load(&path.to_string_lossy())?
        }
        None => RateConfig::default(),
    };
    if let Some(prop_var) = args.prop_var {
        config.prop_var = prop_var;
    }
    if args.low_rank {
        config.low_rank = true;
    }
    if args.parallel {
        config.parallel = true;
    }
    if args.workers.is_some() {
        config.workers = args.workers;
    }
    Ok(config)
}

pub fn compute(args: ComputeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = resolve_config(&args)?;

    println!("Loading design matrix from: {}", args.design.display());
    let design = load_matrix(&args.design)?;
    println!(
        "Loaded {} samples with {} predictors",
        design.nrows(),
        design.ncols()
    );

    let f_draws = match &args.f_draws {
        Some(path) => {
            println!("Loading function-space draws from: {}", path.display());
            Some(load_matrix(path)?)
        }
        None => None,
    };
    let beta_draws = match &args.beta_draws {
        Some(path) => {
            println!("Loading effect-size draws from: {}", path.display());
            Some(load_matrix(path)?)
        }
        None => None,
    };

    let mut input = RateInput::new(design.view());
    if let Some(f_draws) = &f_draws {
        input = input.with_function_draws(f_draws.view());
    }
    if let Some(beta_draws) = &beta_draws {
        input = input.with_effect_draws(beta_draws.view());
    }
    if let Some(path) = &args.names {
        input = input.with_names(load_names(path)?);
    }

    println!("Calculating RATE...");
    let mut progress = ConsoleKldProgress::new();
    let result = rate_with_progress(&input, &config, &mut progress)?;
    print_report(&result);

    let out = args.out.to_string_lossy();
    result.save_tsv(&out)?;
    println!("RATE scores saved to: {out}");

    if let Some(path) = &args.summary {
        let summary = path.to_string_lossy();
        result.save_summary(&summary)?;
        println!("Summary saved to: {summary}");
    }
    Ok(())
}

fn print_report(result: &RateResult) {
    let diagnostics = &result.diagnostics;
    match diagnostics.design_rank {
        Some(rank) => println!(
            "Mode: {:?} (design rank {rank}, precision rank {})",
            diagnostics.mode, diagnostics.precision_rank
        ),
        None => println!(
            "Mode: {:?} (precision rank {})",
            diagnostics.mode, diagnostics.precision_rank
        ),
    }

    println!("Top predictors by RATE:");
    for (position, row) in result
        .ranked()
        .iter()
        .take(TOP_PREDICTORS_SHOWN)
        .enumerate()
    {
        println!(
            "  {:>3}. {:<20} rate = {:.6}  kld = {:.6e}",
            position + 1,
            row.name,
            row.rate,
            row.kld
        );
    }
    println!("delta = {:.6}", result.delta);
    println!("effective sample size = {:.2}%", result.eff_samp_size);
}

fn print_version_info() {
    println!("rate {}", env!("CARGO_PKG_VERSION"));
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let Cli { command } = cli;

    let result = match command {
        Some(Commands::Compute(args)) => compute(args),
        Some(Commands::Version) => {
            print_version_info();
            Ok(())
        }
        None => {
            Cli::command().print_help().expect("print help");
            println!();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
