//! # Letter-Loss Sampling
//!
//! Draws the number of ETDRS letters each eye loses while waiting for treatment.
//!
//! Reproducibility hinges on seeding granularity: every random stage of an
//! iteration starts a fresh generator from the same [`IterationSeed`], so the
//! letter-loss stream, the category allocation stream and every pool draw all
//! begin at the same point of the same sequence. Re-running one iteration in
//! isolation therefore reproduces it exactly, regardless of which iterations ran
//! before it or on which thread.

use crate::config::LossDistribution;
use crate::engine::SimulationError;
use rand::SeedableRng;
use rand::distributions::Uniform;
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::Normal;

/// Seed shared by every random stage of one iteration. Its value is the
/// iteration index itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IterationSeed(u64);

impl IterationSeed {
    pub fn new(iteration: usize) -> Self {
        Self(iteration as u64)
    }

    pub fn value(self) -> u64 {
        self.0
    }

    /// A generator positioned at the start of this iteration's stream.
    pub fn rng(self) -> StdRng {
        StdRng::seed_from_u64(self.0)
    }
}

/// Rounds to the nearest integer, with exact halves going to the even neighbour.
pub fn round_letters(value: f64) -> i32 {
    value.round_ties_even() as i32
}

/// Continuous draws before rounding (and, for the normal family, before the zero floor).
pub fn raw_loss_draws(
    k: usize,
    distribution: &LossDistribution,
    seed: IterationSeed,
) -> Result<Vec<f64>, SimulationError> {
    let mut rng = seed.rng();
    match *distribution {
        LossDistribution::Uniform { lower, upper } => {
            // A non-finite bound also makes the width non-finite.
            if lower > upper || !(upper - lower).is_finite() {
                return Err(SimulationError::Distribution(format!(
                    "invalid uniform bounds [{lower}, {upper}]"
                )));
            }
            let uniform = Uniform::new_inclusive(lower, upper);
            Ok((0..k).map(|_| rng.sample(uniform)).collect())
        }
        LossDistribution::Normal { mean, sd } => {
            if !(sd >= 0.0) {
                return Err(SimulationError::Distribution(format!(
                    "normal({mean}, {sd}): standard deviation must be non-negative"
                )));
            }
            let normal = Normal::new(mean, sd)
                .map_err(|e| SimulationError::Distribution(format!("normal({mean}, {sd}): {e}")))?;
            Ok((0..k).map(|_| rng.sample(normal)).collect())
        }
    }
}

/// Produces `k` integer letter losses for one iteration.
///
/// Uniform draws are rounded. Normal draws are rounded and then floored at zero,
/// since an untreated nAMD eye does not spontaneously improve.
pub fn sample_letter_loss(
    k: usize,
    distribution: &LossDistribution,
    seed: IterationSeed,
) -> Result<Vec<i32>, SimulationError> {
    let raw = raw_loss_draws(k, distribution, seed)?;
    let losses = match distribution {
        LossDistribution::Uniform { .. } => raw.into_iter().map(round_letters).collect(),
        LossDistribution::Normal { .. } => raw
            .into_iter()
            .map(|draw| round_letters(draw).max(0))
            .collect(),
    };
    Ok(losses)
}
