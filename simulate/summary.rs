//! # Cross-Iteration Summaries
//!
//! Reduces the per-iteration statistics of each named scenario into bootstrap
//! point estimates, standard deviations and 95% percentile intervals.
//!
//! The interval is the empirical 2.5th to 97.5th percentile range across
//! iterations, not a parametric interval. Percentiles interpolate linearly
//! between order statistics (Hyndman and Fan type 7).

use crate::aggregate::IterationSummary;
use crate::classify::CATEGORY_COUNT;
use ahash::AHashMap;
use ndarray::Array1;

/// Lower percentile of the reported interval.
pub const CI_LOWER_QUANTILE: f64 = 0.025;
/// Upper percentile of the reported interval.
pub const CI_UPPER_QUANTILE: f64 = 0.975;

/// One iteration's summary tagged with the scenario that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioIteration {
    pub scenario: String,
    pub summary: IterationSummary,
}

/// Bootstrap estimate of one statistic across iterations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BootstrapEstimate {
    pub mean: f64,
    /// Sample standard deviation (n - 1 denominator). NaN for a single iteration.
    pub sd: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
}

/// Final summary row for one scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioSummary {
    pub scenario: String,
    pub iterations: usize,
    pub mean_one_year_va: BootstrapEstimate,
    pub mean_baseline_va: BootstrapEstimate,
    pub pct_worse_than_6_60: BootstrapEstimate,
    pub pct_worse_than_6_24: BootstrapEstimate,
    pub pct_better_than_6_12: BootstrapEstimate,
    /// Mean band shares at baseline, point estimates only.
    pub baseline_category_mean: [f64; CATEGORY_COUNT],
    /// Mean band shares at one year, point estimates only.
    pub one_year_category_mean: [f64; CATEGORY_COUNT],
}

/// Empirical quantile of ascending-sorted data by linear interpolation.
///
/// Returns NaN for empty input.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    if n == 1 {
        return sorted[0];
    }
    let h = (n - 1) as f64 * q.clamp(0.0, 1.0);
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

/// Point estimate, dispersion and percentile interval of one statistic.
pub fn bootstrap_estimate(values: &[f64]) -> BootstrapEstimate {
    let column = Array1::from(values.to_vec());
    let mean = column.mean().unwrap_or(f64::NAN);
    let sd = if column.len() > 1 {
        column.std(1.0)
    } else {
        f64::NAN
    };

    let mut sorted = column.to_vec();
    sorted.sort_by(f64::total_cmp);

    BootstrapEstimate {
        mean,
        sd,
        ci_lower: quantile_sorted(&sorted, CI_LOWER_QUANTILE),
        ci_upper: quantile_sorted(&sorted, CI_UPPER_QUANTILE),
    }
}

fn column_mean(values: impl Iterator<Item = f64>) -> f64 {
    let column: Array1<f64> = values.collect();
    column.mean().unwrap_or(f64::NAN)
}

/// Summarizes all iterations of a single scenario.
pub fn summarize_scenario(scenario: &str, iterations: &[IterationSummary]) -> ScenarioSummary {
    let estimate = |statistic: fn(&IterationSummary) -> f64| {
        let values: Vec<f64> = iterations.iter().map(statistic).collect();
        bootstrap_estimate(&values)
    };

    let mut baseline_category_mean = [f64::NAN; CATEGORY_COUNT];
    let mut one_year_category_mean = [f64::NAN; CATEGORY_COUNT];
    for i in 0..CATEGORY_COUNT {
        baseline_category_mean[i] = column_mean(iterations.iter().map(|s| s.baseline_category[i]));
        one_year_category_mean[i] = column_mean(iterations.iter().map(|s| s.one_year_category[i]));
    }

    ScenarioSummary {
        scenario: scenario.to_string(),
        iterations: iterations.len(),
        mean_one_year_va: estimate(|s| s.mean_one_year_va),
        mean_baseline_va: estimate(|s| s.mean_baseline_va),
        pct_worse_than_6_60: estimate(|s| s.pct_worse_than_6_60),
        pct_worse_than_6_24: estimate(|s| s.pct_worse_than_6_24),
        pct_better_than_6_12: estimate(|s| s.pct_better_than_6_12),
        baseline_category_mean,
        one_year_category_mean,
    }
}

/// Groups items by key and reduces each group, yielding one output per key in
/// order of the key's first appearance.
pub fn group_reduce<'t, T, R>(
    items: &'t [T],
    key: impl Fn(&T) -> &str,
    reduce: impl Fn(&str, Vec<&'t T>) -> R,
) -> Vec<R> {
    let mut order: Vec<&str> = Vec::new();
    let mut groups: AHashMap<&str, Vec<&'t T>> = AHashMap::new();
    for item in items {
        let k = key(item);
        groups
            .entry(k)
            .or_insert_with(|| {
                order.push(k);
                Vec::new()
            })
            .push(item);
    }
    order
        .into_iter()
        .map(|k| {
            let members = groups.remove(k).unwrap_or_default();
            reduce(k, members)
        })
        .collect()
}

/// Builds the final summary table: one row per scenario, in first-seen order.
pub fn summarize_by_scenario(rows: &[ScenarioIteration]) -> Vec<ScenarioSummary> {
    group_reduce(
        rows,
        |row| row.scenario.as_str(),
        |scenario, members| {
            let iterations: Vec<IterationSummary> =
                members.into_iter().map(|row| row.summary.clone()).collect();
            summarize_scenario(scenario, &iterations)
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn iteration(i: usize, one_year: f64) -> IterationSummary {
        IterationSummary {
            iteration: i,
            n_eyes: 10,
            mean_one_year_va: one_year,
            mean_baseline_va: 60.0,
            pct_worse_than_6_60: 10.0,
            pct_worse_than_6_24: 30.0,
            pct_better_than_6_12: 20.0,
            baseline_category: [0.4, 0.3, 0.2, 0.1],
            one_year_category: [0.5, 0.2, 0.2, 0.1],
            pct_overridden: 0.0,
        }
    }

    #[test]
    fn type_seven_quantiles() {
        let sorted: Vec<f64> = (1..=5).map(f64::from).collect();
        assert_abs_diff_eq!(quantile_sorted(&sorted, 0.5), 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(quantile_sorted(&sorted, 0.025), 1.1, epsilon = 1e-12);
        assert_abs_diff_eq!(quantile_sorted(&sorted, 0.975), 4.9, epsilon = 1e-12);
        assert_abs_diff_eq!(quantile_sorted(&sorted, 0.0), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(quantile_sorted(&sorted, 1.0), 5.0, epsilon = 1e-12);
        assert_eq!(quantile_sorted(&[7.0], 0.975), 7.0);
        assert!(quantile_sorted(&[], 0.5).is_nan());
    }

    #[test]
    fn bootstrap_estimate_of_known_values() {
        let values: Vec<f64> = (1..=100).map(f64::from).collect();
        let est = bootstrap_estimate(&values);
        assert_abs_diff_eq!(est.mean, 50.5, epsilon = 1e-12);
        // Sample sd of 1..=100 is sqrt(100 * 101 / 12).
        assert_abs_diff_eq!(est.sd, (100.0_f64 * 101.0 / 12.0).sqrt(), epsilon = 1e-9);
        assert_abs_diff_eq!(est.ci_lower, 3.475, epsilon = 1e-9);
        assert_abs_diff_eq!(est.ci_upper, 97.525, epsilon = 1e-9);
    }

    #[test]
    fn unsorted_input_is_handled() {
        let est = bootstrap_estimate(&[5.0, 1.0, 4.0, 2.0, 3.0]);
        assert_abs_diff_eq!(est.ci_lower, 1.1, epsilon = 1e-12);
        assert_abs_diff_eq!(est.ci_upper, 4.9, epsilon = 1e-12);
    }

    #[test]
    fn single_iteration_has_undefined_sd() {
        let est = bootstrap_estimate(&[42.0]);
        assert_eq!(est.mean, 42.0);
        assert!(est.sd.is_nan());
        assert_eq!(est.ci_lower, 42.0);
        assert_eq!(est.ci_upper, 42.0);
    }

    #[test]
    fn one_row_per_scenario_in_first_seen_order() {
        let rows = vec![
            ScenarioIteration {
                scenario: "delay".into(),
                summary: iteration(1, 50.0),
            },
            ScenarioIteration {
                scenario: "no_delay".into(),
                summary: iteration(1, 60.0),
            },
            ScenarioIteration {
                scenario: "delay".into(),
                summary: iteration(2, 54.0),
            },
        ];
        let summaries = summarize_by_scenario(&rows);
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].scenario, "delay");
        assert_eq!(summaries[0].iterations, 2);
        assert_abs_diff_eq!(summaries[0].mean_one_year_va.mean, 52.0, epsilon = 1e-12);
        assert_abs_diff_eq!(
            summaries[0].mean_one_year_va.sd,
            8.0_f64.sqrt(),
            epsilon = 1e-12
        );
        assert_eq!(summaries[1].scenario, "no_delay");
        assert_eq!(summaries[1].iterations, 1);
        assert_abs_diff_eq!(summaries[1].mean_one_year_va.mean, 60.0, epsilon = 1e-12);
    }

    #[test]
    fn category_means_are_averaged_per_band() {
        let mut second = iteration(2, 50.0);
        second.baseline_category = [0.2, 0.3, 0.4, 0.1];
        let summary = summarize_scenario("s", &[iteration(1, 50.0), second]);
        assert_abs_diff_eq!(summary.baseline_category_mean[0], 0.3, epsilon = 1e-12);
        assert_abs_diff_eq!(summary.baseline_category_mean[2], 0.3, epsilon = 1e-12);
        assert_abs_diff_eq!(summary.one_year_category_mean[0], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(summary.pct_worse_than_6_24.mean, 30.0, epsilon = 1e-12);
        assert_abs_diff_eq!(summary.pct_worse_than_6_24.sd, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn group_reduce_counts_members() {
        let items = ["a", "b", "a", "c", "a"];
        let counts = group_reduce(&items, |s| *s, |k, members| (k.to_string(), members.len()));
        assert_eq!(
            counts,
            vec![("a".to_string(), 3), ("b".to_string(), 1), ("c".to_string(), 1)]
        );
    }
}
