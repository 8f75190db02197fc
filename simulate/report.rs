//! # Report Writers
//!
//! Writes the two output tables as tab-separated files: the per-iteration
//! statistics tagged by scenario and iteration number, and the final summary with
//! one row per scenario. Also renders a compact terminal table of the summary.

use crate::summary::{BootstrapEstimate, ScenarioIteration, ScenarioSummary};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to write report: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to serialize report row: {0}")]
    CsvError(#[from] csv::Error),
}

/// Flat output row of the per-iteration table.
#[derive(Debug, Serialize)]
pub struct IterationRow<'a> {
    pub scenario: &'a str,
    pub iteration: usize,
    pub n_eyes: usize,
    pub mean_one_year_va: f64,
    pub mean_baseline_va: f64,
    pub pct_worse_than_6_60: f64,
    pub pct_worse_than_6_24: f64,
    pub pct_better_than_6_12: f64,
    pub pct_overridden: f64,
    pub baseline_cat1: f64,
    pub baseline_cat2: f64,
    pub baseline_cat3: f64,
    pub baseline_cat4: f64,
    pub one_year_cat1: f64,
    pub one_year_cat2: f64,
    pub one_year_cat3: f64,
    pub one_year_cat4: f64,
}

impl<'a> From<&'a ScenarioIteration> for IterationRow<'a> {
    fn from(row: &'a ScenarioIteration) -> Self {
        let s = &row.summary;
        Self {
            scenario: &row.scenario,
            iteration: s.iteration,
            n_eyes: s.n_eyes,
            mean_one_year_va: s.mean_one_year_va,
            mean_baseline_va: s.mean_baseline_va,
            pct_worse_than_6_60: s.pct_worse_than_6_60,
            pct_worse_than_6_24: s.pct_worse_than_6_24,
            pct_better_than_6_12: s.pct_better_than_6_12,
            pct_overridden: s.pct_overridden,
            baseline_cat1: s.baseline_category[0],
            baseline_cat2: s.baseline_category[1],
            baseline_cat3: s.baseline_category[2],
            baseline_cat4: s.baseline_category[3],
            one_year_cat1: s.one_year_category[0],
            one_year_cat2: s.one_year_category[1],
            one_year_cat3: s.one_year_category[2],
            one_year_cat4: s.one_year_category[3],
        }
    }
}

/// Flat output row of the summary table. Each tracked statistic contributes a
/// mean, SD and 95% interval column.
#[derive(Debug, Serialize)]
pub struct SummaryRow<'a> {
    pub scenario: &'a str,
    pub iterations: usize,
    pub one_year_va_mean: f64,
    pub one_year_va_sd: f64,
    pub one_year_va_ci_lower: f64,
    pub one_year_va_ci_upper: f64,
    pub baseline_va_mean: f64,
    pub baseline_va_sd: f64,
    pub baseline_va_ci_lower: f64,
    pub baseline_va_ci_upper: f64,
    pub worse_than_6_60_mean: f64,
    pub worse_than_6_60_sd: f64,
    pub worse_than_6_60_ci_lower: f64,
    pub worse_than_6_60_ci_upper: f64,
    pub worse_than_6_24_mean: f64,
    pub worse_than_6_24_sd: f64,
    pub worse_than_6_24_ci_lower: f64,
    pub worse_than_6_24_ci_upper: f64,
    pub better_than_6_12_mean: f64,
    pub better_than_6_12_sd: f64,
    pub better_than_6_12_ci_lower: f64,
    pub better_than_6_12_ci_upper: f64,
    pub baseline_cat1_mean: f64,
    pub baseline_cat2_mean: f64,
    pub baseline_cat3_mean: f64,
    pub baseline_cat4_mean: f64,
    pub one_year_cat1_mean: f64,
    pub one_year_cat2_mean: f64,
    pub one_year_cat3_mean: f64,
    pub one_year_cat4_mean: f64,
}

impl<'a> From<&'a ScenarioSummary> for SummaryRow<'a> {
    fn from(s: &'a ScenarioSummary) -> Self {
        Self {
            scenario: &s.scenario,
            iterations: s.iterations,
            one_year_va_mean: s.mean_one_year_va.mean,
            one_year_va_sd: s.mean_one_year_va.sd,
            one_year_va_ci_lower: s.mean_one_year_va.ci_lower,
            one_year_va_ci_upper: s.mean_one_year_va.ci_upper,
            baseline_va_mean: s.mean_baseline_va.mean,
            baseline_va_sd: s.mean_baseline_va.sd,
            baseline_va_ci_lower: s.mean_baseline_va.ci_lower,
            baseline_va_ci_upper: s.mean_baseline_va.ci_upper,
            worse_than_6_60_mean: s.pct_worse_than_6_60.mean,
            worse_than_6_60_sd: s.pct_worse_than_6_60.sd,
            worse_than_6_60_ci_lower: s.pct_worse_than_6_60.ci_lower,
            worse_than_6_60_ci_upper: s.pct_worse_than_6_60.ci_upper,
            worse_than_6_24_mean: s.pct_worse_than_6_24.mean,
            worse_than_6_24_sd: s.pct_worse_than_6_24.sd,
            worse_than_6_24_ci_lower: s.pct_worse_than_6_24.ci_lower,
            worse_than_6_24_ci_upper: s.pct_worse_than_6_24.ci_upper,
            better_than_6_12_mean: s.pct_better_than_6_12.mean,
            better_than_6_12_sd: s.pct_better_than_6_12.sd,
            better_than_6_12_ci_lower: s.pct_better_than_6_12.ci_lower,
            better_than_6_12_ci_upper: s.pct_better_than_6_12.ci_upper,
            baseline_cat1_mean: s.baseline_category_mean[0],
            baseline_cat2_mean: s.baseline_category_mean[1],
            baseline_cat3_mean: s.baseline_category_mean[2],
            baseline_cat4_mean: s.baseline_category_mean[3],
            one_year_cat1_mean: s.one_year_category_mean[0],
            one_year_cat2_mean: s.one_year_category_mean[1],
            one_year_cat3_mean: s.one_year_category_mean[2],
            one_year_cat4_mean: s.one_year_category_mean[3],
        }
    }
}

fn write_tsv<P, T, I>(path: P, rows: I) -> Result<(), ReportError>
where
    P: AsRef<Path>,
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path.as_ref())?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes the per-iteration table.
pub fn write_iteration_table<P: AsRef<Path>>(
    path: P,
    rows: &[ScenarioIteration],
) -> Result<(), ReportError> {
    write_tsv(&path, rows.iter().map(IterationRow::from))?;
    log::info!(
        "Wrote {} iteration rows to '{}'",
        rows.len(),
        path.as_ref().display()
    );
    Ok(())
}

/// Writes the final summary table.
pub fn write_summary_table<P: AsRef<Path>>(
    path: P,
    rows: &[ScenarioSummary],
) -> Result<(), ReportError> {
    write_tsv(&path, rows.iter().map(SummaryRow::from))?;
    log::info!(
        "Wrote {} summary rows to '{}'",
        rows.len(),
        path.as_ref().display()
    );
    Ok(())
}

fn format_estimate(estimate: &BootstrapEstimate) -> String {
    format!(
        "{:.2} ({:.2}, {:.2})",
        estimate.mean, estimate.ci_lower, estimate.ci_upper
    )
}

/// Human-readable summary: point estimate with 95% interval per statistic.
pub fn render_summary(rows: &[ScenarioSummary]) -> String {
    let name_width = rows
        .iter()
        .map(|r| r.scenario.len())
        .max()
        .unwrap_or(0)
        .max("scenario".len());

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<name_width$}  {:>6}  {:<24}  {:<24}  {:<24}  {:<24}",
        "scenario", "iters", "one-year VA", "% worse than 6/60", "% worse than 6/24", "% better than 6/12"
    );
    for row in rows {
        let _ = writeln!(
            out,
            "{:<name_width$}  {:>6}  {:<24}  {:<24}  {:<24}  {:<24}",
            row.scenario,
            row.iterations,
            format_estimate(&row.mean_one_year_va),
            format_estimate(&row.pct_worse_than_6_60),
            format_estimate(&row.pct_worse_than_6_24),
            format_estimate(&row.pct_better_than_6_12),
        );
    }
    out
}
