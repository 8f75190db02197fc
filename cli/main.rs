#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

use clap::{Args, CommandFactory, Parser, Subcommand};
use itertools::Itertools;
use std::fs;
use std::path::PathBuf;
use std::process;

use vadelay::config::{
    DEFAULT_INELIGIBLE_THRESHOLD, DEFAULT_LOSS_MODE, DEFAULT_N_EYES, DEFAULT_NORMAL_MEAN,
    DEFAULT_NORMAL_SD, DEFAULT_NUMBER_SIMULATIONS, DEFAULT_UNIFORM_LOWER, DEFAULT_UNIFORM_UPPER,
    ScenarioSpec, SimulationConfig, load_scenarios,
};
use vadelay::data::load_emr;
use vadelay::engine::{RunOptions, SimulationContext, run_scenarios};
use vadelay::report::{render_summary, write_iteration_table, write_summary_table};
use vadelay::summary::summarize_by_scenario;

const ITERATIONS_FILE: &str = "iterations.tsv";
const SUMMARY_FILE: &str = "summary.tsv";

#[derive(Args)]
pub struct OutputArgs {
    /// Directory receiving iterations.tsv and summary.tsv
    #[arg(long, default_value = ".")]
    pub out_dir: PathBuf,

    /// Run iterations across all available cores
    #[arg(long)]
    pub parallel: bool,
}

#[derive(Args)]
pub struct RunArgs {
    /// Path to EMR TSV file with eye_id,baseline_va,one_year_va columns
    pub emr_data: String,

    /// Scenario file (.toml) with one [[scenario]] table per scenario
    #[arg(long)]
    pub scenarios: String,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Args)]
pub struct SimulateArgs {
    /// Path to EMR TSV file with eye_id,baseline_va,one_year_va columns
    pub emr_data: String,

    /// Scenario name used in the output tables
    #[arg(long, default_value = "scenario")]
    pub name: String,

    /// Eyes drawn per iteration
    #[arg(long, default_value_t = DEFAULT_N_EYES as i64, allow_negative_numbers = true)]
    pub n_eyes: i64,

    /// Number of iterations
    #[arg(long, default_value_t = DEFAULT_NUMBER_SIMULATIONS as i64, allow_negative_numbers = true)]
    pub number_simulations: i64,

    /// Disable letter loss and the ineligibility override
    #[arg(long)]
    pub no_delay: bool,

    /// Letter-loss distribution: uniform or normal
    #[arg(long, default_value = DEFAULT_LOSS_MODE)]
    pub loss: String,

    /// Lower bound of the uniform letter loss
    #[arg(long, default_value_t = DEFAULT_UNIFORM_LOWER, allow_negative_numbers = true)]
    pub lower: f64,

    /// Upper bound of the uniform letter loss
    #[arg(long, default_value_t = DEFAULT_UNIFORM_UPPER, allow_negative_numbers = true)]
    pub upper: f64,

    /// Mean of the normal letter loss
    #[arg(long, default_value_t = DEFAULT_NORMAL_MEAN, allow_negative_numbers = true)]
    pub mean: f64,

    /// Standard deviation of the normal letter loss
    #[arg(long, default_value_t = DEFAULT_NORMAL_SD, allow_negative_numbers = true)]
    pub sd: f64,

    /// Baseline VA at or below which an eye gets no treatment benefit
    #[arg(long, default_value_t = DEFAULT_INELIGIBLE_THRESHOLD, allow_negative_numbers = true)]
    pub ineligible_threshold: i32,

    #[command(flatten)]
    pub output: OutputArgs,
}

impl SimulateArgs {
    fn to_config(&self) -> Result<SimulationConfig, Box<dyn std::error::Error>> {
        let spec = ScenarioSpec {
            name: self.name.clone(),
            n_eyes: self.n_eyes,
            number_simulations: self.number_simulations,
            delay: !self.no_delay,
            loss: self.loss.clone(),
            lower: self.lower,
            upper: self.upper,
            mean: self.mean,
            sd: self.sd,
            ineligible_threshold: self.ineligible_threshold,
        };
        Ok(spec.into_config()?)
    }
}

#[derive(Parser)]
#[command(
    name = "vadelay",
    about = "Monte Carlo estimates of visual-acuity outcomes under nAMD treatment delay",
    long_about = "Resamples synthetic cohorts from real-world EMR data, applies delay-induced \
                 letter loss and the treatment-eligibility rule, and reports bootstrap \
                 intervals of one-year visual-acuity outcomes per scenario."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Run every scenario in a TOML file (outputs: iterations.tsv, summary.tsv)")]
    Run(RunArgs),
    #[command(about = "Run one scenario configured by flags (outputs: iterations.tsv, summary.tsv)")]
    Simulate(SimulateArgs),
    #[command(about = "Display version information")]
    Version,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let Cli { command } = cli;

    let result = match command {
        Some(Commands::Run(args)) => run(args),
        Some(Commands::Simulate(args)) => simulate(args),
        Some(Commands::Version) => {
            println!("vadelay {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        None => Cli::command()
            .print_help()
            .map(|_| println!())
            .map_err(Into::into),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let configs = load_scenarios(&args.scenarios)?;
    execute(&args.emr_data, &configs, &args.output)
}

fn simulate(args: SimulateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.to_config()?;
    execute(&args.emr_data, &[config], &args.output)
}

fn execute(
    emr_path: &str,
    configs: &[SimulationConfig],
    output: &OutputArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Loading EMR data from: {emr_path}");
    let table = load_emr(emr_path)?;
    println!("Loaded {} eyes", table.len());
    println!(
        "Scenarios: {}",
        configs.iter().map(|c| c.name.as_str()).join(", ")
    );

    let ctx = SimulationContext::new(&table);
    let options = RunOptions {
        parallel: output.parallel,
        show_progress: true,
    };
    let rows = run_scenarios(&ctx, configs, options)?;
    let summaries = summarize_by_scenario(&rows);

    fs::create_dir_all(&output.out_dir)?;
    let iterations_path = output.out_dir.join(ITERATIONS_FILE);
    let summary_path = output.out_dir.join(SUMMARY_FILE);
    write_iteration_table(&iterations_path, &rows)?;
    write_summary_table(&summary_path, &summaries)?;

    print!("{}", render_summary(&summaries));
    println!(
        "Results saved to: {} and {}",
        iterations_path.display(),
        summary_path.display()
    );
    Ok(())
}
