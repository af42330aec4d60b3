use crate::data_loader::PartitionLoader;
use crate::entity_index::EntityIndex;
use crate::error::{QueryError, Result};
use crate::models::{EntitySelector, Trace, YearSelection, YearType};
use crate::reference_year::ReferenceYearMapping;
use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime};
use isp_trace_parser::partition::PartitionKey;
use isp_trace_parser::{Family, TimeSeriesRecord};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Resolves entity selectors against one family's parsed store.
pub struct TraceQuery {
    loader: PartitionLoader,
    index: EntityIndex,
    year_type: YearType,
}

impl TraceQuery {
    pub fn new(store_dir: &Path, index: EntityIndex) -> Self {
        Self {
            loader: PartitionLoader::new(store_dir),
            index,
            year_type: YearType::default(),
        }
    }

    /// Index `store_dir` and return a query over it.
    pub fn open(store_dir: &Path, family: Family) -> Result<Self> {
        let index = EntityIndex::build(store_dir, family)?;
        Ok(Self::new(store_dir, index))
    }

    pub fn with_year_type(mut self, year_type: YearType) -> Self {
        self.year_type = year_type;
        self
    }

    pub fn index(&self) -> &EntityIndex {
        &self.index
    }

    /// Trace for `start_year..=end_year`, every year drawn from `reference_year`.
    pub fn get_trace(
        &self,
        selector: &EntitySelector,
        start_year: i32,
        end_year: i32,
        reference_year: i32,
    ) -> Result<Trace> {
        let mapping = ReferenceYearMapping::constant(start_year, end_year, reference_year)?;
        self.get_trace_with_mapping(selector, &mapping)
    }

    pub fn get_trace_with_mapping(
        &self,
        selector: &EntitySelector,
        mapping: &ReferenceYearMapping,
    ) -> Result<Trace> {
        if mapping.is_empty() {
            return Err(QueryError::EmptyMapping);
        }

        let label = selector.label();
        let identity = selector.identity();
        let candidates: Vec<&PartitionKey> = if selector.family() == self.index.family() {
            self.index
                .partitions_for(&identity)
                .filter(|key| selector.matches_key(key))
                .collect()
        } else {
            Vec::new()
        };
        if candidates.is_empty() {
            return Err(QueryError::UnknownEntity { entity: label });
        }

        // Each reference year is read at most once per query.
        let mut loaded: HashMap<i32, Vec<TimeSeriesRecord>> = HashMap::new();
        let mut records = Vec::new();

        for (year, reference_year) in mapping.iter() {
            if !loaded.contains_key(&reference_year) {
                let keys: Vec<&PartitionKey> = candidates
                    .iter()
                    .copied()
                    .filter(|key| key.reference_year() == Some(reference_year))
                    .collect();
                if keys.is_empty() {
                    return Err(QueryError::PartitionNotFound {
                        entity: label,
                        reference_year,
                        partition: selector.expected_partition(reference_year),
                    });
                }

                let mut source = Vec::new();
                for key in keys {
                    source.extend(self.loader.load(key, &identity)?);
                }
                source.sort_by_key(|r| r.timestamp);
                log::debug!(
                    "{}: {} records for reference year {}",
                    label,
                    source.len(),
                    reference_year
                );
                loaded.insert(reference_year, source);
            }

            let source = loaded.get(&reference_year).map(Vec::as_slice).unwrap_or(&[]);
            let selected = select_year(source, year, reference_year, self.year_type);
            if selected.is_empty() {
                return Err(QueryError::YearNotCovered {
                    entity: label,
                    year,
                    reference_year,
                });
            }
            records.extend(selected);
        }

        Ok(Trace { label, records })
    }

    /// Resolve each selector independently, in parallel, keyed by selector label.
    pub fn get_traces(
        &self,
        selectors: &[EntitySelector],
        years: &YearSelection,
    ) -> Result<BTreeMap<String, Trace>> {
        let mapping = years.to_mapping()?;
        let traces = selectors
            .par_iter()
            .map(|selector| self.get_trace_with_mapping(selector, &mapping))
            .collect::<Result<Vec<Trace>>>()?;
        Ok(traces
            .into_iter()
            .map(|trace| (trace.label.clone(), trace))
            .collect())
    }
}

/// Records for modelled `year` out of a partition loaded for `reference_year`.
///
/// The year is resolved one calendar segment at a time. Records already dated
/// inside a segment are returned as they are. Otherwise the same stretch of the
/// reference year is moved onto the segment's calendar year, dropping any day
/// that does not exist there (29 February).
pub fn select_year(
    records: &[TimeSeriesRecord],
    year: i32,
    reference_year: i32,
    year_type: YearType,
) -> Vec<TimeSeriesRecord> {
    let Some(segments) = year_type.segments(year) else {
        return Vec::new();
    };
    segments
        .into_iter()
        .flat_map(|(calendar_year, start, end)| {
            select_segment(records, calendar_year, start, end, reference_year)
        })
        .collect()
}

fn select_segment(
    records: &[TimeSeriesRecord],
    calendar_year: i32,
    start: NaiveDateTime,
    end: NaiveDateTime,
    reference_year: i32,
) -> Vec<TimeSeriesRecord> {
    let native: Vec<TimeSeriesRecord> = records
        .iter()
        .filter(|r| r.timestamp > start && r.timestamp <= end)
        .copied()
        .collect();
    if !native.is_empty() || calendar_year == reference_year {
        return native;
    }

    let shift = calendar_year - reference_year;
    let (Some(ref_start), Some(ref_end)) = (shift_years(start, -shift), shift_years(end, -shift))
    else {
        return Vec::new();
    };
    records
        .iter()
        .filter(|r| r.timestamp > ref_start && r.timestamp <= ref_end)
        .filter_map(|r| redate(r, shift))
        .collect()
}

// Segment bounds fall on the first of a month, so this never hits 29 February.
fn shift_years(ts: NaiveDateTime, years: i32) -> Option<NaiveDateTime> {
    ts.with_year(ts.year() + years)
}

/// Shift a record by whole years, keeping its interval's day-of-year and
/// time. `None` when that day does not exist in the target year.
pub fn redate(record: &TimeSeriesRecord, years: i32) -> Option<TimeSeriesRecord> {
    // The interval ending at midnight belongs to the previous day.
    let interval_day = (record.timestamp - Duration::minutes(1)).date();
    let offset = record.timestamp - interval_day.and_time(NaiveTime::MIN);
    let target_day = interval_day.with_year(interval_day.year() + years)?;
    Some(TimeSeriesRecord {
        timestamp: target_day.and_time(NaiveTime::MIN) + offset,
        value: record.value,
    })
}
