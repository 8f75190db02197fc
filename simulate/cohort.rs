//! # Baseline Pools and Cohort Sampling
//!
//! The EMR population is split once, by *unperturbed* baseline VA band, into four
//! sampling pools. Each iteration then draws eye identifiers with replacement
//! from those pools in the quantities chosen by the category allocation.

use crate::classify::{CATEGORY_COUNT, VaCategory};
use crate::data::EmrTable;
use crate::engine::SimulationError;
use crate::loss::IterationSeed;
use crate::reweight::Allocation;
use rand::Rng;

/// Eye identifiers partitioned by baseline VA band. Built once per run and
/// read-only afterwards; every eye belongs to exactly one pool.
#[derive(Debug, Clone)]
pub struct BaselinePools {
    pools: [Vec<String>; CATEGORY_COUNT],
}

impl BaselinePools {
    pub fn from_table(table: &EmrTable) -> Self {
        let mut pools: [Vec<String>; CATEGORY_COUNT] = Default::default();
        for record in table.records() {
            let category = VaCategory::from_va(record.baseline_va);
            pools[category.index()].push(record.eye_id.clone());
        }
        let built = Self { pools };
        log::debug!("Baseline pool sizes: {:?}", built.sizes());
        built
    }

    pub fn pool(&self, category: VaCategory) -> &[String] {
        &self.pools[category.index()]
    }

    pub fn sizes(&self) -> [usize; CATEGORY_COUNT] {
        [
            self.pools[0].len(),
            self.pools[1].len(),
            self.pools[2].len(),
            self.pools[3].len(),
        ]
    }

    pub fn total(&self) -> usize {
        self.pools.iter().map(Vec::len).sum()
    }
}

/// Draws `count` identifiers uniformly with replacement from one pool.
///
/// Each call starts a fresh generator from `seed`, so every pool's draw begins at
/// the same point of the iteration's stream.
fn draw_from_pool<'p>(
    pool: &'p [String],
    category: VaCategory,
    count: usize,
    seed: IterationSeed,
) -> Result<Vec<&'p str>, SimulationError> {
    if count == 0 {
        return Ok(Vec::new());
    }
    if pool.is_empty() {
        return Err(SimulationError::EmptyPool {
            category,
            requested: count,
        });
    }

    let mut rng = seed.rng();
    Ok((0..count)
        .map(|_| pool[rng.gen_range(0..pool.len())].as_str())
        .collect())
}

/// Samples one iteration's cohort of identifiers.
///
/// The result holds band 1's draws, then band 2's, band 3's and band 4's.
/// Identifiers may repeat.
pub fn sample_cohort<'p>(
    pools: &'p BaselinePools,
    allocation: &Allocation,
    n_eyes: usize,
    seed: IterationSeed,
) -> Result<Vec<&'p str>, SimulationError> {
    assert_eq!(
        allocation.total(),
        n_eyes,
        "category allocation {:?} does not sum to the cohort size",
        allocation.counts()
    );

    let mut cohort = Vec::with_capacity(n_eyes);
    for category in VaCategory::ALL {
        let drawn = draw_from_pool(
            pools.pool(category),
            category,
            allocation.count(category),
            seed,
        )?;
        cohort.extend(drawn);
    }
    Ok(cohort)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::EyeRecord;
    use std::collections::HashSet;

    fn table() -> EmrTable {
        EmrTable::new(vec![
            EyeRecord::new("g1", 80, 82),
            EyeRecord::new("g2", 65, 70),
            EyeRecord::new("m1", 50, 52),
            EyeRecord::new("p1", 35, 30),
            EyeRecord::new("p2", 49, 50),
            EyeRecord::new("v1", 10, 40),
        ])
        .unwrap()
    }

    #[test]
    fn pools_partition_the_table() {
        let pools = BaselinePools::from_table(&table());
        assert_eq!(pools.sizes(), [2, 1, 2, 1]);
        assert_eq!(pools.total(), 6);
        assert_eq!(pools.pool(VaCategory::Poor), ["p1", "p2"]);
    }

    #[test]
    fn cohort_has_requested_size_and_known_ids() {
        let table = table();
        let pools = BaselinePools::from_table(&table);
        let known: HashSet<&str> = table.records().iter().map(|r| r.eye_id.as_str()).collect();
        let allocation = Allocation::from_counts([10, 3, 0, 7]);

        let cohort = sample_cohort(&pools, &allocation, 20, IterationSeed::new(5)).unwrap();
        assert_eq!(cohort.len(), 20);
        assert!(cohort.iter().all(|id| known.contains(id)));
        // With replacement, a one-eye pool repeats its only eye.
        assert!(cohort[10..13].iter().all(|&id| id == "m1"));
        assert!(cohort[13..].iter().all(|&id| id == "v1"));
    }

    #[test]
    fn cohort_blocks_follow_band_order() {
        let pools = BaselinePools::from_table(&table());
        let allocation = Allocation::from_counts([4, 0, 4, 0]);
        let cohort = sample_cohort(&pools, &allocation, 8, IterationSeed::new(1)).unwrap();
        assert!(cohort[..4].iter().all(|id| id.starts_with('g')));
        assert!(cohort[4..].iter().all(|id| id.starts_with('p')));
    }

    #[test]
    fn same_seed_gives_same_cohort() {
        let pools = BaselinePools::from_table(&table());
        let allocation = Allocation::from_counts([25, 5, 25, 5]);
        let a = sample_cohort(&pools, &allocation, 60, IterationSeed::new(12)).unwrap();
        let b = sample_cohort(&pools, &allocation, 60, IterationSeed::new(12)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn pools_of_equal_size_share_the_draw_sequence() {
        // Every pool draw restarts the iteration stream, so two pools of the same
        // size pick the same positions.
        let pools = BaselinePools::from_table(&table());
        let allocation = Allocation::from_counts([6, 0, 6, 0]);
        let cohort = sample_cohort(&pools, &allocation, 12, IterationSeed::new(3)).unwrap();
        let good_positions: Vec<&str> = cohort[..6].iter().map(|id| &id[1..]).collect();
        let poor_positions: Vec<&str> = cohort[6..].iter().map(|id| &id[1..]).collect();
        assert_eq!(good_positions, poor_positions);
    }

    #[test]
    fn empty_pool_with_zero_allocation_is_fine() {
        let table = EmrTable::new(vec![EyeRecord::new("a", 70, 70)]).unwrap();
        let pools = BaselinePools::from_table(&table);
        let allocation = Allocation::from_counts([3, 0, 0, 0]);
        let cohort = sample_cohort(&pools, &allocation, 3, IterationSeed::new(1)).unwrap();
        assert_eq!(cohort, vec!["a", "a", "a"]);
    }

    #[test]
    fn empty_pool_with_nonzero_allocation_is_an_error() {
        let table = EmrTable::new(vec![EyeRecord::new("a", 70, 70)]).unwrap();
        let pools = BaselinePools::from_table(&table);
        let allocation = Allocation::from_counts([1, 2, 0, 0]);
        match sample_cohort(&pools, &allocation, 3, IterationSeed::new(1)) {
            Err(SimulationError::EmptyPool {
                category,
                requested,
            }) => {
                assert_eq!(category, VaCategory::Moderate);
                assert_eq!(requested, 2);
            }
            other => panic!("Expected EmptyPool, got {other:?}"),
        }
    }

    #[test]
    #[should_panic(expected = "does not sum to the cohort size")]
    fn mismatched_allocation_is_an_internal_failure() {
        let pools = BaselinePools::from_table(&table());
        let allocation = Allocation::from_counts([1, 1, 1, 1]);
        let _ = sample_cohort(&pools, &allocation, 5, IterationSeed::new(1));
    }
}
