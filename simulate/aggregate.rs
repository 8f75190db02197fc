//! Per-iteration reduction of a resolved cohort into summary scalars.

use crate::classify::CATEGORY_COUNT;
use crate::resolve::CohortRow;

/// Summary statistics of one iteration's cohort. Immutable once produced.
///
/// Flag statistics are percentages (0 to 100). Band statistics are proportions
/// (0 to 1) indexed by [`crate::classify::VaCategory::index`].
#[derive(Debug, Clone, PartialEq)]
pub struct IterationSummary {
    pub iteration: usize,
    pub n_eyes: usize,
    pub mean_one_year_va: f64,
    pub mean_baseline_va: f64,
    pub pct_worse_than_6_60: f64,
    pub pct_worse_than_6_24: f64,
    pub pct_better_than_6_12: f64,
    pub baseline_category: [f64; CATEGORY_COUNT],
    pub one_year_category: [f64; CATEGORY_COUNT],
    /// Percentage of eyes whose one-year VA was replaced by the ineligibility rule.
    pub pct_overridden: f64,
}

/// Reduces a cohort to its summary statistics. Every share is a count divided by
/// the cohort size.
pub fn summarize_iteration(iteration: usize, cohort: &[CohortRow<'_>]) -> IterationSummary {
    let n = cohort.len();
    let n_f = n as f64;

    let mut sum_one_year = 0i64;
    let mut sum_baseline = 0i64;
    let mut worse_6_60 = 0usize;
    let mut worse_6_24 = 0usize;
    let mut better_6_12 = 0usize;
    let mut overridden = 0usize;
    let mut baseline_counts = [0usize; CATEGORY_COUNT];
    let mut one_year_counts = [0usize; CATEGORY_COUNT];

    for row in cohort {
        sum_one_year += row.one_year_va as i64;
        sum_baseline += row.baseline_va as i64;
        worse_6_60 += row.flags.worse_than_6_60 as usize;
        worse_6_24 += row.flags.worse_than_6_24 as usize;
        better_6_12 += row.flags.better_than_6_12 as usize;
        overridden += row.overridden as usize;
        baseline_counts[row.baseline_category.index()] += 1;
        one_year_counts[row.one_year_category.index()] += 1;
    }

    let pct = |count: usize| 100.0 * count as f64 / n_f;
    let share = |counts: [usize; CATEGORY_COUNT]| counts.map(|c| c as f64 / n_f);

    IterationSummary {
        iteration,
        n_eyes: n,
        mean_one_year_va: sum_one_year as f64 / n_f,
        mean_baseline_va: sum_baseline as f64 / n_f,
        pct_worse_than_6_60: pct(worse_6_60),
        pct_worse_than_6_24: pct(worse_6_24),
        pct_better_than_6_12: pct(better_6_12),
        baseline_category: share(baseline_counts),
        one_year_category: share(one_year_counts),
        pct_overridden: pct(overridden),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{EmrTable, EyeRecord};
    use crate::resolve::{EyeLookup, ResolveOptions, resolve_cohort};
    use approx::assert_abs_diff_eq;

    #[test]
    fn means_and_shares_over_a_small_cohort() {
        let table = EmrTable::new(vec![
            EyeRecord::new("a", 70, 75),
            EyeRecord::new("b", 55, 52),
            EyeRecord::new("c", 40, 30),
            EyeRecord::new("d", 20, 50),
        ])
        .unwrap();
        let lookup = EyeLookup::new(&table);
        let baseline: Vec<i32> = table.records().iter().map(|r| r.baseline_va).collect();
        let options = ResolveOptions {
            delay: true,
            ineligible_threshold: 25,
        };
        let cohort = resolve_cohort(&["a", "b", "c", "d", "a"], &lookup, &baseline, options).unwrap();

        let summary = summarize_iteration(3, &cohort);
        assert_eq!(summary.iteration, 3);
        assert_eq!(summary.n_eyes, 5);
        // One-year VA after override: 75, 52, 30, 20, 75.
        assert_abs_diff_eq!(summary.mean_one_year_va, 252.0 / 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(summary.mean_baseline_va, 255.0 / 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(summary.pct_worse_than_6_60, 40.0, epsilon = 1e-12);
        assert_abs_diff_eq!(summary.pct_worse_than_6_24, 60.0, epsilon = 1e-12);
        assert_abs_diff_eq!(summary.pct_better_than_6_12, 40.0, epsilon = 1e-12);
        assert_abs_diff_eq!(summary.pct_overridden, 20.0, epsilon = 1e-12);
        assert_eq!(summary.baseline_category, [0.4, 0.2, 0.2, 0.2]);
        assert_eq!(summary.one_year_category, [0.4, 0.2, 0.0, 0.4]);
    }

    #[test]
    fn band_shares_sum_to_one() {
        let table = EmrTable::new(
            (0..=100)
                .map(|va| EyeRecord::new(format!("eye{va}"), va, 100 - va))
                .collect(),
        )
        .unwrap();
        let lookup = EyeLookup::new(&table);
        let baseline: Vec<i32> = table.records().iter().map(|r| r.baseline_va).collect();
        let ids: Vec<&str> = table.records().iter().map(|r| r.eye_id.as_str()).collect();
        let options = ResolveOptions {
            delay: false,
            ineligible_threshold: 25,
        };
        let cohort = resolve_cohort(&ids, &lookup, &baseline, options).unwrap();
        let summary = summarize_iteration(1, &cohort);
        assert_abs_diff_eq!(summary.baseline_category.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(summary.one_year_category.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(summary.mean_baseline_va, 50.0, epsilon = 1e-12);
    }
}
