//! # Category Reweighting
//!
//! After letter loss is applied, the share of eyes in each VA band shifts. This
//! module re-estimates those shares, perturbs them with their binomial sampling
//! error, and allocates the iteration's cohort across the four bands.
//!
//! The perturbed shares are used as-is after taking their absolute value. They
//! are never renormalized, so they are sampling *weights* rather than a
//! probability vector; [`draw_allocation`] treats them accordingly.

use crate::classify::{CATEGORY_COUNT, VaCategory};
use crate::engine::SimulationError;
use crate::loss::IterationSeed;
use rand::Rng;
use rand::distributions::WeightedIndex;
use rand_distr::Normal;

/// Observed band shares of a (perturbed) baseline distribution.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryProportions {
    /// Share of eyes in each band, indexed by [`VaCategory::index`].
    pub proportion: [f64; CATEGORY_COUNT],
    /// Normal-approximation standard error, `sqrt(p(1-p)/n)`.
    pub sd: [f64; CATEGORY_COUNT],
    /// Number of eyes the shares were computed over.
    pub n: usize,
}

/// Number of eyes drawn from each band's pool in one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Allocation {
    counts: [usize; CATEGORY_COUNT],
}

impl Allocation {
    pub fn from_counts(counts: [usize; CATEGORY_COUNT]) -> Self {
        Self { counts }
    }

    pub fn count(&self, category: VaCategory) -> usize {
        self.counts[category.index()]
    }

    pub fn counts(&self) -> &[usize; CATEGORY_COUNT] {
        &self.counts
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}

/// Computes band shares and their standard errors for a set of baseline scores.
///
/// An empty band, or an empty input, yields a share and standard error of zero.
pub fn category_proportions(baseline_va: &[i32]) -> CategoryProportions {
    let n = baseline_va.len();
    let mut counts = [0usize; CATEGORY_COUNT];
    for &va in baseline_va {
        counts[VaCategory::from_va(va).index()] += 1;
    }

    let mut proportion = [0.0; CATEGORY_COUNT];
    let mut sd = [0.0; CATEGORY_COUNT];
    if n > 0 {
        let n_f = n as f64;
        for i in 0..CATEGORY_COUNT {
            let p = counts[i] as f64 / n_f;
            proportion[i] = p;
            sd[i] = (p * (1.0 - p) / n_f).sqrt();
        }
    }

    CategoryProportions { proportion, sd, n }
}

/// Draws one noisy weight per band from `N(p, sd)` and takes its absolute value.
pub fn noisy_weights<R: Rng + ?Sized>(
    proportions: &CategoryProportions,
    rng: &mut R,
) -> Result<[f64; CATEGORY_COUNT], SimulationError> {
    let mut weights = [0.0; CATEGORY_COUNT];
    for i in 0..CATEGORY_COUNT {
        let (p, sd) = (proportions.proportion[i], proportions.sd[i]);
        if !(sd >= 0.0) {
            return Err(SimulationError::Distribution(format!(
                "band {i} weight: standard deviation {sd} must be non-negative"
            )));
        }
        let normal = Normal::new(p, sd)
            .map_err(|e| SimulationError::Distribution(format!("normal({p}, {sd}): {e}")))?;
        weights[i] = rng.sample(normal).abs();
    }
    Ok(weights)
}

/// Categorical sampling with unnormalized weights: `n_eyes` independent band
/// draws, then a histogram of the draws per band.
///
/// A band whose weight is zero is never drawn.
pub fn draw_allocation<R: Rng + ?Sized>(
    weights: &[f64; CATEGORY_COUNT],
    n_eyes: usize,
    rng: &mut R,
) -> Result<Allocation, SimulationError> {
    let index = WeightedIndex::new(weights.iter().copied()).map_err(|e| {
        SimulationError::Distribution(format!("category weights {weights:?}: {e}"))
    })?;

    let mut counts = [0usize; CATEGORY_COUNT];
    for _ in 0..n_eyes {
        counts[rng.sample(&index)] += 1;
    }
    Ok(Allocation { counts })
}

/// Re-estimates band shares from perturbed baseline scores and allocates `n_eyes`
/// across the bands using this iteration's allocation stream.
pub fn allocate(
    perturbed_baseline: &[i32],
    n_eyes: usize,
    seed: IterationSeed,
) -> Result<(CategoryProportions, Allocation), SimulationError> {
    let proportions = category_proportions(perturbed_baseline);
    for category in VaCategory::ALL {
        if proportions.proportion[category.index()] == 0.0 {
            log::debug!("Band {category} holds no eyes after letter loss; it will not be sampled");
        }
    }

    let mut rng = seed.rng();
    let weights = noisy_weights(&proportions, &mut rng)?;
    let allocation = draw_allocation(&weights, n_eyes, &mut rng)?;
    log::debug!(
        "Iteration {}: weights {:?} -> allocation {:?}",
        seed.value(),
        weights,
        allocation.counts()
    );
    Ok((proportions, allocation))
}
