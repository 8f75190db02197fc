//! # Outcome Resolution
//!
//! Joins a sampled list of identifiers back to full eye records, carrying the
//! iteration's perturbed baseline VA, and applies the ineligibility override:
//! under a delay scenario an eye whose baseline VA is at or below the
//! treatment threshold receives no benefit, so its one-year VA is set to its
//! (perturbed) baseline VA. Bands and clinical flags are then recomputed.

use crate::classify::{ClinicalFlags, VaCategory};
use crate::data::{EmrTable, EyeRecord};
use crate::engine::SimulationError;
use ahash::AHashMap;

/// Identifier index over the EMR table, built once per run.
#[derive(Debug, Clone)]
pub struct EyeLookup<'a> {
    table: &'a EmrTable,
    index: AHashMap<&'a str, usize>,
}

impl<'a> EyeLookup<'a> {
    pub fn new(table: &'a EmrTable) -> Self {
        let index = table
            .records()
            .iter()
            .enumerate()
            .map(|(i, record)| (record.eye_id.as_str(), i))
            .collect();
        Self { table, index }
    }

    /// Row position of an eye in the table.
    pub fn position(&self, eye_id: &str) -> Option<usize> {
        self.index.get(eye_id).copied()
    }

    pub fn record(&self, position: usize) -> &'a EyeRecord {
        &self.table.records()[position]
    }
}

/// Parameters of the override step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    pub delay: bool,
    pub ineligible_threshold: i32,
}

/// One eye of a resolved cohort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CohortRow<'a> {
    pub eye_id: &'a str,
    /// Baseline VA after this iteration's letter loss.
    pub baseline_va: i32,
    pub one_year_va: i32,
    pub baseline_category: VaCategory,
    pub one_year_category: VaCategory,
    pub flags: ClinicalFlags,
    /// Whether the ineligibility override replaced the recorded one-year VA.
    pub overridden: bool,
}

impl<'a> CohortRow<'a> {
    fn new(eye_id: &'a str, baseline_va: i32, one_year_va: i32, overridden: bool) -> Self {
        Self {
            eye_id,
            baseline_va,
            one_year_va,
            baseline_category: VaCategory::from_va(baseline_va),
            one_year_category: VaCategory::from_va(one_year_va),
            flags: ClinicalFlags::from_one_year_va(one_year_va),
            overridden,
        }
    }
}

/// Resolves sampled identifiers into cohort rows.
///
/// `perturbed_baseline` is aligned with the table's record order. Duplicate
/// identifiers produce duplicate rows.
pub fn resolve_cohort<'a>(
    sampled_ids: &[&str],
    lookup: &EyeLookup<'a>,
    perturbed_baseline: &[i32],
    options: ResolveOptions,
) -> Result<Vec<CohortRow<'a>>, SimulationError> {
    debug_assert_eq!(perturbed_baseline.len(), lookup.table.len());

    let mut rows = Vec::with_capacity(sampled_ids.len());
    for &eye_id in sampled_ids {
        let position = lookup
            .position(eye_id)
            .ok_or_else(|| SimulationError::UnknownEye(eye_id.to_string()))?;
        let record = lookup.record(position);
        let baseline_va = perturbed_baseline[position];

        let ineligible = options.delay && baseline_va <= options.ineligible_threshold;
        let one_year_va = if ineligible {
            baseline_va
        } else {
            record.one_year_va
        };
        rows.push(CohortRow::new(
            record.eye_id.as_str(),
            baseline_va,
            one_year_va,
            ineligible,
        ));
    }
    Ok(rows)
}
