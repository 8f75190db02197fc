//! # Simulation Engine
//!
//! Runs the per-iteration pipeline
//! (letter loss, category reweighting, cohort sampling, outcome resolution,
//! aggregation) and the loop over iterations and scenarios.
//!
//! Iterations share only read-only state: the EMR table, the baseline pools and
//! the identifier index held by [`SimulationContext`]. Each iteration seeds its
//! own randomness from its index, so a run gives identical results whether it
//! executes sequentially or across a rayon pool.

use crate::aggregate::{IterationSummary, summarize_iteration};
use crate::classify::VaCategory;
use crate::cohort::{BaselinePools, sample_cohort};
use crate::config::{ConfigError, SimulationConfig};
use crate::data::EmrTable;
use crate::loss::{IterationSeed, sample_letter_loss};
use crate::resolve::{CohortRow, EyeLookup, ResolveOptions, resolve_cohort};
use crate::reweight::allocate;
use crate::summary::ScenarioIteration;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use rayon::prelude::*;
use std::io::IsTerminal;
use thiserror::Error;

/// Errors raised while running a simulation.
#[derive(Error, Debug)]
pub enum SimulationError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(
        "Cannot draw {requested} eye(s) from VA band {category}: no eye in the EMR table has a baseline VA in that band."
    )]
    EmptyPool {
        category: VaCategory,
        requested: usize,
    },
    #[error("Sampled eye '{0}' is not present in the EMR table.")]
    UnknownEye(String),
    #[error("Failed to build a sampling distribution: {0}")]
    Distribution(String),
    #[error("Scenario '{scenario}', iteration {iteration}: {source}")]
    Iteration {
        scenario: String,
        iteration: usize,
        #[source]
        source: Box<SimulationError>,
    },
}

/// Read-only state shared by every iteration of a run.
pub struct SimulationContext<'a> {
    table: &'a EmrTable,
    pools: BaselinePools,
    lookup: EyeLookup<'a>,
}

impl<'a> SimulationContext<'a> {
    /// Builds the baseline pools and identifier index from the unperturbed table.
    pub fn new(table: &'a EmrTable) -> Self {
        let pools = BaselinePools::from_table(table);
        let lookup = EyeLookup::new(table);
        log::info!(
            "Built baseline pools from {} eyes (band sizes {:?})",
            pools.total(),
            pools.sizes()
        );
        for category in VaCategory::ALL {
            if pools.pool(category).is_empty() {
                log::warn!(
                    "No eye has a baseline VA in band {category}; any iteration that allocates eyes to it will fail"
                );
            }
        }
        Self {
            table,
            pools,
            lookup,
        }
    }
}

/// Execution options that do not affect results.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Spread iterations across the rayon thread pool.
    pub parallel: bool,
    /// Draw a progress bar on stderr when it is a terminal.
    pub show_progress: bool,
}

/// Baseline VA of every table row after this iteration's letter loss. Without
/// delay no loss is drawn and the recorded baseline is used.
fn perturbed_baseline(
    ctx: &SimulationContext<'_>,
    config: &SimulationConfig,
    seed: IterationSeed,
) -> Result<Vec<i32>, SimulationError> {
    let records = ctx.table.records();
    if !config.delay {
        return Ok(records.iter().map(|r| r.baseline_va).collect());
    }
    let losses = sample_letter_loss(records.len(), &config.loss, seed)?;
    Ok(records
        .iter()
        .zip(losses)
        .map(|(record, loss)| record.baseline_va.saturating_sub(loss))
        .collect())
}

fn cohort_for_iteration<'c>(
    ctx: &'c SimulationContext<'_>,
    config: &SimulationConfig,
    iteration: usize,
) -> Result<Vec<CohortRow<'c>>, SimulationError> {
    let seed = IterationSeed::new(iteration);
    let perturbed = perturbed_baseline(ctx, config, seed)?;
    let (_, allocation) = allocate(&perturbed, config.n_eyes, seed)?;
    let sampled = sample_cohort(&ctx.pools, &allocation, config.n_eyes, seed)?;
    resolve_cohort(
        &sampled,
        &ctx.lookup,
        &perturbed,
        ResolveOptions {
            delay: config.delay,
            ineligible_threshold: config.ineligible_threshold,
        },
    )
}

fn iteration_error(
    config: &SimulationConfig,
    iteration: usize,
    source: SimulationError,
) -> SimulationError {
    SimulationError::Iteration {
        scenario: config.name.clone(),
        iteration,
        source: Box::new(source),
    }
}

/// Produces the resolved cohort of one iteration. Mostly useful for inspection
/// and testing; [`simulate_iteration`] reduces it straight away.
pub fn simulate_cohort<'c>(
    ctx: &'c SimulationContext<'_>,
    config: &SimulationConfig,
    iteration: usize,
) -> Result<Vec<CohortRow<'c>>, SimulationError> {
    config.validate()?;
    cohort_for_iteration(ctx, config, iteration)
        .map_err(|e| iteration_error(config, iteration, e))
}

/// Runs one iteration end to end, seeded by its index.
pub fn simulate_iteration(
    ctx: &SimulationContext<'_>,
    config: &SimulationConfig,
    iteration: usize,
) -> Result<IterationSummary, SimulationError> {
    config.validate()?;
    let cohort = cohort_for_iteration(ctx, config, iteration)
        .map_err(|e| iteration_error(config, iteration, e))?;
    Ok(summarize_iteration(iteration, &cohort))
}

fn create_progress_bar(len: u64, message: &str, visible: bool) -> ProgressBar {
    let draw_target = if visible && std::io::stderr().is_terminal() {
        ProgressDrawTarget::stderr_with_hz(20)
    } else {
        ProgressDrawTarget::hidden()
    };

    let pb = ProgressBar::with_draw_target(Some(len), draw_target);
    if let Ok(style) = ProgressStyle::with_template(
        "> [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
    ) {
        pb.set_style(style.progress_chars("█▉▊▋▌▍▎▏  "));
    }
    pb.set_message(message.to_string());
    pb
}

/// Runs iterations `1..=number_simulations` of one scenario and returns their
/// summaries ordered by iteration index.
pub fn run_simulation(
    ctx: &SimulationContext<'_>,
    config: &SimulationConfig,
    options: RunOptions,
) -> Result<Vec<IterationSummary>, SimulationError> {
    config.validate()?;
    log::info!(
        "Running scenario '{}': {} iterations of {} eyes (delay={}, loss={:?}, threshold={})",
        config.name,
        config.number_simulations,
        config.n_eyes,
        config.delay,
        config.loss,
        config.ineligible_threshold
    );

    let pb = create_progress_bar(
        config.number_simulations as u64,
        &config.name,
        options.show_progress,
    );
    let iterations = 1..=config.number_simulations;
    let summaries: Result<Vec<IterationSummary>, SimulationError> = if options.parallel {
        // Gather every outcome first so the reported failure is the lowest
        // failing iteration, as in a sequential run.
        let outcomes: Vec<Result<IterationSummary, SimulationError>> = iterations
            .into_par_iter()
            .map(|iteration| {
                let summary = simulate_iteration(ctx, config, iteration);
                pb.inc(1);
                summary
            })
            .collect();
        outcomes.into_iter().collect()
    } else {
        iterations
            .map(|iteration| {
                let summary = simulate_iteration(ctx, config, iteration);
                pb.inc(1);
                summary
            })
            .collect()
    };
    pb.finish_and_clear();

    let summaries = summaries?;
    log::info!(
        "Scenario '{}' finished {} iterations",
        config.name,
        summaries.len()
    );
    Ok(summaries)
}

/// Runs every scenario in order. The result is the combined per-iteration table,
/// tagged by scenario name.
pub fn run_scenarios(
    ctx: &SimulationContext<'_>,
    configs: &[SimulationConfig],
    options: RunOptions,
) -> Result<Vec<ScenarioIteration>, SimulationError> {
    // Fail fast on any bad scenario before sampling the first one.
    for config in configs {
        config.validate()?;
    }

    let mut rows = Vec::with_capacity(configs.iter().map(|c| c.number_simulations).sum());
    for config in configs {
        let summaries = run_simulation(ctx, config, options)?;
        rows.extend(summaries.into_iter().map(|summary| ScenarioIteration {
            scenario: config.name.clone(),
            summary,
        }));
    }
    Ok(rows)
}
