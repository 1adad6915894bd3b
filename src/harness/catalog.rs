//! Test case catalog and case selection
//!
//! The catalog is fixed for the lifetime of a run. Every virtual user
//! owns its own selector so draws never contend on shared state.

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use thiserror::Error;

use crate::models::{PriceQuery, TestCase};

/// Product used by the reference traffic mix
pub const REFERENCE_PRODUCT_ID: i64 = 35455;
/// Brand used by the reference traffic mix
pub const REFERENCE_BRAND_ID: i32 = 1;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Test case catalog is empty")]
    Empty,

    #[error("Test case '{0}' has a non-finite expected price")]
    InvalidPrice(String),
}

/// Immutable, ordered set of test cases
#[derive(Clone, Debug)]
pub struct Catalog {
    cases: Arc<[TestCase]>,
}

impl Catalog {
    pub fn new(cases: Vec<TestCase>) -> Result<Self, CatalogError> {
        if cases.is_empty() {
            return Err(CatalogError::Empty);
        }
        if let Some(bad) = cases.iter().find(|c| !c.expected_price.is_finite()) {
            return Err(CatalogError::InvalidPrice(bad.name.clone()));
        }

        Ok(Self {
            cases: cases.into(),
        })
    }

    /// The five reference cases for product 35455 / brand 1
    pub fn reference() -> Self {
        Self {
            cases: reference_cases().into(),
        }
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    #[cfg(test)]
    pub fn get(&self, index: usize) -> Option<&TestCase> {
        self.cases.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TestCase> {
        self.cases.iter()
    }
}

fn reference_case(name: &str, day: u32, hour: u32, expected_price: f64) -> TestCase {
    // Fixed calendar values, always valid
    let date = NaiveDate::from_ymd_opt(2020, 6, day)
        .and_then(|d| d.and_hms_opt(hour, 0, 0))
        .unwrap_or_default();
    TestCase::new(
        name,
        PriceQuery::new(date, REFERENCE_PRODUCT_ID, REFERENCE_BRAND_ID),
        expected_price,
    )
}

/// Reference cases as plain values, e.g. for writing an example config
pub fn reference_cases() -> Vec<TestCase> {
    vec![
        reference_case("Test 1 - 10:00 Day 14", 14, 10, 35.50),
        reference_case("Test 2 - 16:00 Day 14", 14, 16, 25.45),
        reference_case("Test 3 - 21:00 Day 14", 14, 21, 35.50),
        reference_case("Test 4 - 10:00 Day 15", 15, 10, 30.50),
        reference_case("Test 5 - 21:00 Day 16", 16, 21, 38.95),
    ]
}

/// Uniform, history-free draw over a catalog
pub struct CaseSelector {
    catalog: Catalog,
    rng: StdRng,
}

impl CaseSelector {
    /// Selector seeded from the operating system
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            rng: StdRng::from_os_rng(),
        }
    }

    /// Deterministic selector for reproducible runs
    pub fn seeded(catalog: Catalog, seed: u64) -> Self {
        Self {
            catalog,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Build a selector for one virtual user
    ///
    /// With a run seed, each `(scenario, vu)` pair gets its own stream.
    pub fn for_vu(catalog: Catalog, run_seed: Option<u64>, scenario: usize, vu: usize) -> Self {
        match run_seed {
            Some(seed) => Self::seeded(catalog, derive_seed(seed, scenario as u64, vu as u64)),
            None => Self::new(catalog),
        }
    }

    /// Draw one case, with replacement
    pub fn select(&mut self) -> (usize, &TestCase) {
        let index = self.rng.random_range(0..self.catalog.len());
        (index, &self.catalog.cases[index])
    }
}

/// SplitMix64 finalizer over the mixed inputs
fn derive_seed(seed: u64, scenario: u64, vu: u64) -> u64 {
    let mut z = seed
        ^ scenario.wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ vu.wrapping_mul(0xC2B2_AE3D_27D4_EB4F);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_catalog() {
        let catalog = Catalog::reference();
        assert_eq!(catalog.len(), 5);

        let prices: Vec<f64> = catalog.iter().map(|c| c.expected_price).collect();
        assert_eq!(prices, vec![35.50, 25.45, 35.50, 30.50, 38.95]);

        let dates: Vec<String> = catalog
            .iter()
            .map(|c| c.params.application_date_param())
            .collect();
        assert_eq!(
            dates,
            vec![
                "2020-06-14T10:00:00",
                "2020-06-14T16:00:00",
                "2020-06-14T21:00:00",
                "2020-06-15T10:00:00",
                "2020-06-16T21:00:00",
            ]
        );
        assert!(catalog
            .iter()
            .all(|c| c.params.product_id == 35455 && c.params.brand_id == 1));
    }

    #[test]
    fn test_empty_catalog_rejected() {
        assert_eq!(Catalog::new(Vec::new()).unwrap_err(), CatalogError::Empty);
    }

    #[test]
    fn test_nan_price_rejected() {
        let mut cases = reference_cases();
        cases[2].expected_price = f64::NAN;
        assert!(matches!(
            Catalog::new(cases),
            Err(CatalogError::InvalidPrice(name)) if name == "Test 3 - 21:00 Day 14"
        ));
    }

    #[test]
    fn test_selection_stays_in_range() {
        let mut selector = CaseSelector::new(Catalog::reference());
        for _ in 0..1000 {
            let (index, case) = selector.select();
            assert!(index < 5);
            assert_eq!(Catalog::reference().get(index), Some(case));
        }
    }

    #[test]
    fn test_selection_reaches_every_case() {
        let mut selector = CaseSelector::seeded(Catalog::reference(), 7);
        let mut seen = [0usize; 5];
        for _ in 0..5000 {
            seen[selector.select().0] += 1;
        }
        // Uniform draw: each bucket near 1000
        assert!(seen.iter().all(|&n| n > 800 && n < 1200), "{seen:?}");
    }

    #[test]
    fn test_seeded_selection_is_reproducible() {
        let draw = |seed| {
            let mut selector = CaseSelector::seeded(Catalog::reference(), seed);
            (0..50).map(|_| selector.select().0).collect::<Vec<_>>()
        };
        assert_eq!(draw(42), draw(42));
    }

    #[test]
    fn test_per_vu_streams_differ() {
        let draw = |vu| {
            let mut selector = CaseSelector::for_vu(Catalog::reference(), Some(1), 0, vu);
            (0..50).map(|_| selector.select().0).collect::<Vec<_>>()
        };
        assert_ne!(draw(0), draw(1));
        assert_eq!(draw(3), draw(3));
    }

    #[test]
    fn test_single_case_catalog() {
        let catalog = Catalog::new(vec![reference_cases().remove(0)]).unwrap();
        let mut selector = CaseSelector::new(catalog);
        assert_eq!(selector.select().0, 0);
    }
}
