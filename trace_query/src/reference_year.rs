use crate::error::{QueryError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Modelled year -> reference year whose weather or demand shape it reuses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceYearMapping(BTreeMap<i32, i32>);

impl ReferenceYearMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every year in `start_year..=end_year` mapped to the same reference year.
    pub fn constant(start_year: i32, end_year: i32, reference_year: i32) -> Result<Self> {
        construct_reference_year_mapping(start_year, end_year, &[reference_year])
    }

    pub fn insert(&mut self, year: i32, reference_year: i32) -> Option<i32> {
        self.0.insert(year, reference_year)
    }

    pub fn get(&self, year: i32) -> Option<i32> {
        self.0.get(&year).copied()
    }

    /// Pairs in ascending modelled-year order.
    pub fn iter(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.0.iter().map(|(year, reference)| (*year, *reference))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<BTreeMap<i32, i32>> for ReferenceYearMapping {
    fn from(map: BTreeMap<i32, i32>) -> Self {
        ReferenceYearMapping(map)
    }
}

impl FromIterator<(i32, i32)> for ReferenceYearMapping {
    fn from_iter<I: IntoIterator<Item = (i32, i32)>>(iter: I) -> Self {
        ReferenceYearMapping(iter.into_iter().collect())
    }
}

/// Cycle `reference_years` across `start_year..=end_year`:
/// year `start_year + i` uses `reference_years[i % len]`.
pub fn construct_reference_year_mapping(
    start_year: i32,
    end_year: i32,
    reference_years: &[i32],
) -> Result<ReferenceYearMapping> {
    if end_year < start_year {
        return Err(QueryError::InvalidRange {
            start_year,
            end_year,
        });
    }
    if reference_years.is_empty() {
        return Err(QueryError::EmptyReferenceYears);
    }

    Ok((start_year..=end_year)
        .zip(reference_years.iter().cycle())
        .map(|(year, reference)| (year, *reference))
        .collect())
}
