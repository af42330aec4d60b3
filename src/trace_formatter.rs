use crate::error::{Result, TraceError};
use crate::partition::{DATETIME_COLUMN, VALUE_COLUMN};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Interval counts per day that map onto a whole number of minutes: 60, 30, 15
/// and 5 minute traces.
pub const SUPPORTED_INTERVAL_COUNTS: [usize; 4] = [24, 48, 96, 288];

pub const MINUTES_PER_DAY: usize = 1440;

pub const YEAR_COLUMN: &str = "Year";
pub const MONTH_COLUMN: &str = "Month";
pub const DAY_COLUMN: &str = "Day";

/// A single interval-ending observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesRecord {
    pub timestamp: NaiveDateTime,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WideRow {
    pub date: NaiveDate,
    pub values: Vec<Option<f64>>,
}

/// A raw trace table: one row per day, one column per interval of that day.
#[derive(Debug, Clone, PartialEq)]
pub struct WideTable {
    interval_count: usize,
    rows: Vec<WideRow>,
}

impl WideTable {
    pub fn new(interval_count: usize) -> Result<Self> {
        if !SUPPORTED_INTERVAL_COUNTS.contains(&interval_count) {
            return Err(TraceError::UnsupportedIntervalCount {
                count: interval_count,
            });
        }
        Ok(Self {
            interval_count,
            rows: Vec::new(),
        })
    }

    pub fn push_row(&mut self, date: NaiveDate, values: Vec<Option<f64>>) -> Result<()> {
        if values.len() != self.interval_count {
            return Err(TraceError::IntervalCountMismatch {
                row: self.rows.len() + 1,
                expected: self.interval_count,
                found: values.len(),
            });
        }
        self.rows.push(WideRow { date, values });
        Ok(())
    }

    pub fn interval_count(&self) -> usize {
        self.interval_count
    }

    pub fn interval_minutes(&self) -> i64 {
        (MINUTES_PER_DAY / self.interval_count) as i64
    }

    /// Column labels as they appear in raw files: `01`, `02`, ...
    pub fn interval_labels(&self) -> Vec<String> {
        (1..=self.interval_count).map(|i| format!("{:02}", i)).collect()
    }

    pub fn rows(&self) -> &[WideRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Unpivot a wide table into interval-ending records.
///
/// Interval `i` (1-indexed) of a day is stamped `midnight + i * spacing`, so the
/// last interval of a day lands on the following midnight.
pub fn reformat(table: &WideTable) -> Result<Vec<TimeSeriesRecord>> {
    let step = table.interval_minutes();
    let mut records = Vec::with_capacity(table.len() * table.interval_count());
    let mut previous: Option<NaiveDate> = None;

    for (idx, row) in table.rows().iter().enumerate() {
        if let Some(prev) = previous {
            if row.date <= prev {
                return Err(TraceError::UnsortedInput {
                    row: idx + 1,
                    previous: prev,
                    found: row.date,
                });
            }
        }
        previous = Some(row.date);

        let midnight = row.date.and_time(NaiveTime::MIN);
        for (interval, value) in row.values.iter().enumerate() {
            records.push(TimeSeriesRecord {
                timestamp: midnight + Duration::minutes(step * (interval as i64 + 1)),
                value: *value,
            });
        }
    }

    Ok(records)
}

/// In-memory variant of [`reformat`]: takes a frame with `Year`, `Month`, `Day`
/// and numerically labelled interval columns and returns `datetime, value`.
pub fn reformat_dataframe(df: &DataFrame) -> Result<DataFrame> {
    let years = int_column(df, YEAR_COLUMN)?;
    let months = int_column(df, MONTH_COLUMN)?;
    let days = int_column(df, DAY_COLUMN)?;

    let mut interval_columns: Vec<(usize, String)> = df
        .get_column_names()
        .iter()
        .filter_map(|name| {
            let label = name.to_string();
            label.trim().parse::<usize>().ok().map(|n| (n, label))
        })
        .collect();
    interval_columns.sort();

    let count = interval_columns.len();
    if interval_columns
        .iter()
        .enumerate()
        .any(|(idx, (n, _))| *n != idx + 1)
    {
        return Err(TraceError::UnsupportedIntervalCount { count });
    }
    let mut table = WideTable::new(count)?;

    let value_columns = interval_columns
        .iter()
        .map(|(_, name)| Ok(df.column(name)?.cast(&DataType::Float64)?))
        .collect::<Result<Vec<Series>>>()?;
    let value_columns = value_columns
        .iter()
        .map(|s| Ok(s.f64()?.clone()))
        .collect::<Result<Vec<_>>>()?;

    for row in 0..df.height() {
        let (year, month, day) = (years.get(row), months.get(row), days.get(row));
        let date = match (year, month, day) {
            (Some(y), Some(m), Some(d)) => {
                NaiveDate::from_ymd_opt(y as i32, m as u32, d as u32)
            }
            _ => None,
        }
        .ok_or_else(|| TraceError::InvalidDate {
            row: row + 1,
            year: display_opt(year),
            month: display_opt(month),
            day: display_opt(day),
        })?;

        let values = value_columns
            .iter()
            .map(|ca| ca.get(row).filter(|v| !v.is_nan()))
            .collect();
        table.push_row(date, values)?;
    }

    records_to_dataframe(&reformat(&table)?)
}

pub fn records_to_dataframe(records: &[TimeSeriesRecord]) -> Result<DataFrame> {
    let timestamps: Vec<NaiveDateTime> = records.iter().map(|r| r.timestamp).collect();
    let values: Vec<Option<f64>> = records.iter().map(|r| r.value).collect();
    Ok(DataFrame::new(vec![
        timestamp_series(DATETIME_COLUMN, &timestamps)?,
        Series::new(VALUE_COLUMN.into(), values),
    ])?)
}

/// Read `datetime, value` columns back into records, in frame order.
pub fn records_from_dataframe(df: &DataFrame) -> Result<Vec<TimeSeriesRecord>> {
    let millis = df
        .column(DATETIME_COLUMN)?
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?
        .cast(&DataType::Int64)?;
    let millis = millis.i64()?;
    let values = df.column(VALUE_COLUMN)?.cast(&DataType::Float64)?;
    let values = values.f64()?;

    let mut records = Vec::with_capacity(df.height());
    for (ms, value) in millis.into_iter().zip(values.into_iter()) {
        if let Some(timestamp) = ms.and_then(from_millis) {
            records.push(TimeSeriesRecord { timestamp, value });
        }
    }
    Ok(records)
}

/// Millisecond datetime series for naive (zone-less) timestamps.
pub fn timestamp_series(name: &str, timestamps: &[NaiveDateTime]) -> Result<Series> {
    let millis: Vec<i64> = timestamps.iter().map(|ts| to_millis(*ts)).collect();
    Ok(Series::new(name.into(), millis)
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?)
}

pub fn to_millis(ts: NaiveDateTime) -> i64 {
    ts.and_utc().timestamp_millis()
}

pub fn from_millis(ms: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(ms).map(|dt| dt.naive_utc())
}

fn int_column(df: &DataFrame, name: &str) -> Result<Int64Chunked> {
    let column = df
        .column(name)
        .map_err(|_| TraceError::MissingColumn(name.to_string()))?;
    Ok(column.cast(&DataType::Int64)?.i64()?.clone())
}

fn display_opt(value: Option<i64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        date(y, m, d).and_hms_opt(h, min, 0).unwrap()
    }

    #[test]
    fn test_half_hourly_day_is_interval_ending() {
        let mut table = WideTable::new(48).unwrap();
        let values: Vec<Option<f64>> = (1..=48).map(|v| Some(v as f64)).collect();
        table.push_row(date(2011, 1, 1), values).unwrap();

        let records = reformat(&table).unwrap();
        assert_eq!(records.len(), 48);
        assert_eq!(records[0].timestamp, at(2011, 1, 1, 0, 30));
        assert_eq!(records[0].value, Some(1.0));
        assert_eq!(records[47].timestamp, at(2011, 1, 2, 0, 0));
        assert_eq!(records[47].value, Some(48.0));
    }

    #[test]
    fn test_record_count_and_spacing_for_every_resolution() {
        for count in SUPPORTED_INTERVAL_COUNTS {
            let mut table = WideTable::new(count).unwrap();
            for day in 1..=3 {
                table.push_row(date(2020, 2, day), vec![None; count]).unwrap();
            }
            let records = reformat(&table).unwrap();
            assert_eq!(records.len(), 3 * count);

            let step = Duration::minutes((MINUTES_PER_DAY / count) as i64);
            assert!(records
                .windows(2)
                .all(|pair| pair[1].timestamp - pair[0].timestamp == step));
        }
    }

    #[test]
    fn test_unsupported_interval_count() {
        let err = WideTable::new(47).unwrap_err();
        assert!(matches!(err, TraceError::UnsupportedIntervalCount { count: 47 }));
    }

    #[test]
    fn test_row_width_must_match() {
        let mut table = WideTable::new(24).unwrap();
        let err = table.push_row(date(2011, 1, 1), vec![Some(1.0); 23]).unwrap_err();
        assert!(matches!(
            err,
            TraceError::IntervalCountMismatch { expected: 24, found: 23, .. }
        ));
    }

    #[test]
    fn test_unsorted_rows_are_rejected() {
        let mut table = WideTable::new(24).unwrap();
        table.push_row(date(2011, 1, 2), vec![Some(0.0); 24]).unwrap();
        table.push_row(date(2011, 1, 1), vec![Some(0.0); 24]).unwrap();

        let err = reformat(&table).unwrap_err();
        assert!(matches!(err, TraceError::UnsortedInput { row: 2, .. }));
    }

    #[test]
    fn test_reformat_dataframe() {
        let mut columns = vec![
            Series::new("Year".into(), vec![2012i64, 2012]),
            Series::new("Month".into(), vec![2i64, 2]),
            Series::new("Day".into(), vec![28i64, 29]),
        ];
        for i in 1..=24 {
            let label = format!("{:02}", i);
            columns.push(Series::new(label.as_str().into(), vec![i as f64, -(i as f64)]));
        }
        let df = DataFrame::new(columns).unwrap();

        let out = reformat_dataframe(&df).unwrap();
        assert_eq!(out.height(), 48);

        let records = records_from_dataframe(&out).unwrap();
        assert_eq!(records[0].timestamp, at(2012, 2, 28, 1, 0));
        assert_eq!(records[23].timestamp, at(2012, 2, 29, 0, 0));
        assert_eq!(records[47].timestamp, at(2012, 3, 1, 0, 0));
        assert_eq!(records[47].value, Some(-24.0));
    }

    #[test]
    fn test_reformat_dataframe_requires_date_columns() {
        let df = DataFrame::new(vec![Series::new("01".into(), vec![1.0f64])]).unwrap();
        let err = reformat_dataframe(&df).unwrap_err();
        assert!(matches!(err, TraceError::MissingColumn(ref c) if c == "Year"));
    }

    #[test]
    fn test_millis_round_trip() {
        let ts = at(2024, 2, 29, 23, 30);
        assert_eq!(from_millis(to_millis(ts)), Some(ts));
    }
}
