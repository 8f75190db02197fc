//! # Visual-Acuity Classification
//!
//! Maps ETDRS letter scores onto the four ordinal VA bands used for stratified
//! resampling, and onto the three clinical threshold flags reported per cohort.
//!
//! Both mappings are total over `i32`. Perturbed baseline scores can fall below
//! zero or (in principle) above 100 and are classified without clamping.

use std::fmt;

/// Number of VA bands. Allocation vectors and pools are indexed `0..CATEGORY_COUNT`.
pub const CATEGORY_COUNT: usize = 4;

/// Lower edge (inclusive) of band 1.
pub const BAND_1_MIN: i32 = 65;
/// Lower edge (inclusive) of band 2.
pub const BAND_2_MIN: i32 = 50;
/// Lower edge (inclusive) of band 3.
pub const BAND_3_MIN: i32 = 35;

/// One-year VA at or below this is worse than 6/60 Snellen.
pub const WORSE_THAN_6_60_MAX: i32 = 35;
/// One-year VA at or below this is worse than 6/24 Snellen.
pub const WORSE_THAN_6_24_MAX: i32 = 55;
/// One-year VA at or above this is better than 6/12 Snellen.
pub const BETTER_THAN_6_12_MIN: i32 = 70;

/// Ordinal VA band. Band 1 is the best vision, band 4 the worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VaCategory {
    /// 65 letters or more.
    Good,
    /// 50 to 64 letters.
    Moderate,
    /// 35 to 49 letters.
    Poor,
    /// Fewer than 35 letters.
    VeryPoor,
}

impl VaCategory {
    /// All bands in rank order; this is also the cohort concatenation order.
    pub const ALL: [VaCategory; CATEGORY_COUNT] = [
        VaCategory::Good,
        VaCategory::Moderate,
        VaCategory::Poor,
        VaCategory::VeryPoor,
    ];

    /// Classifies a letter score. Bands are tested high to low and the first match wins.
    pub fn from_va(va: i32) -> Self {
        if va >= BAND_1_MIN {
            VaCategory::Good
        } else if va >= BAND_2_MIN {
            VaCategory::Moderate
        } else if va >= BAND_3_MIN {
            VaCategory::Poor
        } else {
            VaCategory::VeryPoor
        }
    }

    /// Zero-based position, for indexing allocation vectors and pools.
    pub fn index(self) -> usize {
        match self {
            VaCategory::Good => 0,
            VaCategory::Moderate => 1,
            VaCategory::Poor => 2,
            VaCategory::VeryPoor => 3,
        }
    }

    /// The clinical band number, 1 through 4.
    pub fn rank(self) -> u8 {
        self.index() as u8 + 1
    }
}

impl fmt::Display for VaCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.rank())
    }
}

/// Binary clinical thresholds, derived from one-year VA only. Not mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClinicalFlags {
    pub worse_than_6_60: bool,
    pub worse_than_6_24: bool,
    pub better_than_6_12: bool,
}

impl ClinicalFlags {
    pub fn from_one_year_va(va: i32) -> Self {
        Self {
            worse_than_6_60: va <= WORSE_THAN_6_60_MAX,
            worse_than_6_24: va <= WORSE_THAN_6_24_MAX,
            better_than_6_12: va >= BETTER_THAN_6_12_MIN,
        }
    }
}
