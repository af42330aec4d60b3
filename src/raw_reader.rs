use crate::error::{Result, TraceError};
use crate::trace_formatter::{WideTable, DAY_COLUMN, MONTH_COLUMN, YEAR_COLUMN};
use chrono::NaiveDate;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Load a raw trace CSV (`Year,Month,Day,01..NN`) into a [`WideTable`].
pub fn read_trace_csv(path: &Path) -> Result<WideTable> {
    let file = File::open(path)?;
    read_trace(BufReader::new(file))
}

pub fn read_trace<R: Read>(reader: R) -> Result<WideTable> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let position = |name: &str| {
        headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))
            .ok_or_else(|| TraceError::MissingColumn(name.to_string()))
    };
    let year_idx = position(YEAR_COLUMN)?;
    let month_idx = position(MONTH_COLUMN)?;
    let day_idx = position(DAY_COLUMN)?;

    // Interval columns are the numeric headers; they must run 1..=N.
    let mut intervals: Vec<(usize, usize)> = headers
        .iter()
        .enumerate()
        .filter_map(|(idx, h)| h.parse::<usize>().ok().map(|n| (n, idx)))
        .collect();
    intervals.sort();
    let count = intervals.len();
    if intervals
        .iter()
        .enumerate()
        .any(|(pos, (n, _))| *n != pos + 1)
    {
        return Err(TraceError::UnsupportedIntervalCount { count });
    }
    let mut table = WideTable::new(count)?;

    for (row_idx, record) in rdr.records().enumerate() {
        let record = record?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        let row = row_idx + 1;
        let field = |idx: usize| record.get(idx).unwrap_or("");

        let (year, month, day) = (field(year_idx), field(month_idx), field(day_idx));
        let date = parse_date(year, month, day).ok_or_else(|| TraceError::InvalidDate {
            row,
            year: year.to_string(),
            month: month.to_string(),
            day: day.to_string(),
        })?;

        let values = intervals
            .iter()
            .map(|(_, idx)| parse_value(field(*idx)))
            .collect();
        table.push_row(date, values)?;
    }

    Ok(table)
}

fn parse_date(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

/// Empty, non-numeric and NaN cells are all missing.
fn parse_value(cell: &str) -> Option<f64> {
    cell.parse::<f64>().ok().filter(|v| !v.is_nan())
}
