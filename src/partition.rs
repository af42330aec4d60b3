use crate::error::Result;
use crate::trace_formatter::{from_millis, timestamp_series, TimeSeriesRecord};
use polars::prelude::*;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};

pub const NAME_COLUMN: &str = "name";
pub const SUBREGION_COLUMN: &str = "subregion";
pub const POE_COLUMN: &str = "poe";
pub const DEMAND_TYPE_COLUMN: &str = "demand_type";
pub const ENTITY_KIND_COLUMN: &str = "entity_kind";
pub const TECHNOLOGY_COLUMN: &str = "technology";
pub const RESOURCE_QUALITY_COLUMN: &str = "resource_quality";
pub const SCENARIO_COLUMN: &str = "scenario";
pub const REFERENCE_YEAR_COLUMN: &str = "reference_year";
pub const DATETIME_COLUMN: &str = "datetime";
pub const VALUE_COLUMN: &str = "value";

pub const PART_FILE_PREFIX: &str = "part-";

/// Hive-style partition key, e.g. `entity_kind=zone/reference_year=2011/technology=SAT`.
///
/// Segment order is significant and fixed per family.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct PartitionKey {
    segments: Vec<(String, String)>,
}

impl PartitionKey {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: &str, value: impl fmt::Display) -> Self {
        self.segments
            .push((column.to_string(), sanitize_segment(&value.to_string())));
        self
    }

    pub fn segments(&self) -> &[(String, String)] {
        &self.segments
    }

    pub fn value(&self, column: &str) -> Option<&str> {
        self.segments
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    pub fn reference_year(&self) -> Option<i32> {
        self.value(REFERENCE_YEAR_COLUMN)?.parse().ok()
    }

    pub fn relative_dir(&self) -> PathBuf {
        self.segments
            .iter()
            .map(|(column, value)| format!("{}={}", column, value))
            .collect()
    }

    pub fn dir_in(&self, root: &Path) -> PathBuf {
        root.join(self.relative_dir())
    }

    /// Rebuild a key from a directory relative to the store root. Returns `None`
    /// when any component is not a `column=value` pair.
    pub fn from_relative_dir(dir: &Path) -> Option<Self> {
        let mut key = PartitionKey::new();
        for component in dir.components() {
            let Component::Normal(part) = component else {
                return None;
            };
            let (column, value) = part.to_str()?.split_once('=')?;
            if column.is_empty() || column.starts_with('.') || value.is_empty() {
                return None;
            }
            key.segments.push((column.to_string(), value.to_string()));
        }
        if key.segments.is_empty() {
            None
        } else {
            Some(key)
        }
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, (column, value)) in self.segments.iter().enumerate() {
            if idx > 0 {
                f.write_str("/")?;
            }
            write!(f, "{}={}", column, value)?;
        }
        Ok(())
    }
}

/// Make a value safe to use as a single directory name.
pub fn sanitize_segment(value: &str) -> String {
    value
        .trim()
        .chars()
        .filter(|c| *c != '*')
        .map(|c| match c {
            ' ' => '_',
            '/' | '\\' | '=' => '-',
            other => other,
        })
        .collect()
}

/// One entity's reformatted trace, tagged with the identity columns it is
/// stored under.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityTrace {
    pub identity: Vec<(&'static str, String)>,
    pub records: Vec<TimeSeriesRecord>,
}

impl EntityTrace {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Writes the part files of one partition. A partition has a single writer per
/// run. Parts go to a sibling staging directory that replaces the partition on
/// [`PartitionWriter::commit`], so an interrupted run leaves the old partition.
pub struct PartitionWriter {
    dir: PathBuf,
    staging: PathBuf,
    key: PartitionKey,
    compression: ParquetCompression,
    parts_written: usize,
    rows_written: usize,
}

impl PartitionWriter {
    pub fn create(root: &Path, key: PartitionKey, compression: ParquetCompression) -> Self {
        let dir = key.dir_in(root);
        let leaf = dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let staging = dir.with_file_name(format!(".{}.staging", leaf));
        Self {
            dir,
            staging,
            key,
            compression,
            parts_written: 0,
            rows_written: 0,
        }
    }

    pub fn parts_written(&self) -> usize {
        self.parts_written
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    /// Write the given traces as the next part file and return its row count.
    pub fn write_part(&mut self, traces: &[EntityTrace]) -> Result<usize> {
        if traces.iter().all(EntityTrace::is_empty) {
            return Ok(0);
        }
        let mut df = self.build_frame(traces)?;
        let rows = df.height();

        if self.parts_written == 0 {
            if self.staging.exists() {
                fs::remove_dir_all(&self.staging)?;
            }
            fs::create_dir_all(&self.staging)?;
        }

        let file_name = format!("{}{:05}.parquet", PART_FILE_PREFIX, self.parts_written);
        let path = self.staging.join(&file_name);
        ParquetWriter::new(fs::File::create(&path)?)
            .with_compression(self.compression)
            .finish(&mut df)?;

        log::debug!("staged {} rows for {} in {}", rows, self.key, file_name);
        self.parts_written += 1;
        self.rows_written += rows;
        Ok(rows)
    }

    /// Swap the staged parts in for the partition. Returns `false`, leaving the
    /// partition untouched, when nothing was written.
    pub fn commit(&mut self) -> Result<bool> {
        if self.parts_written == 0 {
            return Ok(false);
        }
        if self.dir.exists() {
            fs::remove_dir_all(&self.dir)?;
        }
        fs::rename(&self.staging, &self.dir)?;
        log::debug!(
            "partition {}: {} part files, {} rows",
            self.key,
            self.parts_written,
            self.rows_written
        );
        Ok(true)
    }

    fn build_frame(&self, traces: &[EntityTrace]) -> Result<DataFrame> {
        let rows: usize = traces.iter().map(EntityTrace::len).sum();

        let mut identity_columns: Vec<(&'static str, Vec<String>)> = Vec::new();
        if let Some(first) = traces.first() {
            for (column, _) in &first.identity {
                identity_columns.push((*column, Vec::with_capacity(rows)));
            }
        }

        let mut timestamps = Vec::with_capacity(rows);
        let mut values = Vec::with_capacity(rows);
        for trace in traces {
            for ((_, column_values), (_, value)) in
                identity_columns.iter_mut().zip(trace.identity.iter())
            {
                column_values.extend(std::iter::repeat(value.clone()).take(trace.len()));
            }
            for record in &trace.records {
                timestamps.push(record.timestamp);
                values.push(record.value);
            }
        }

        let mut columns: Vec<Series> = identity_columns
            .into_iter()
            .map(|(name, column_values)| Series::new(name.into(), column_values))
            .collect();

        for (column, value) in self.key.segments() {
            let series = if column == REFERENCE_YEAR_COLUMN {
                let year: i32 = value.parse().unwrap_or_default();
                Series::new(column.as_str().into(), vec![year; rows])
            } else {
                Series::new(column.as_str().into(), vec![value.clone(); rows])
            };
            columns.push(series);
        }

        columns.push(timestamp_series(DATETIME_COLUMN, &timestamps)?);
        columns.push(Series::new(VALUE_COLUMN.into(), values));

        Ok(DataFrame::new(columns)?)
    }
}

/// Part files of one partition directory, sorted by name.
pub fn part_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| {
            let path = entry.ok()?.path();
            let name = path.file_name()?.to_str()?;
            if name.starts_with(PART_FILE_PREFIX) && name.ends_with(".parquet") {
                Some(path)
            } else {
                None
            }
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Every entity stored in a partition directory, ordered by identity, with its
/// records sorted by timestamp. A missing directory holds no entities.
pub fn read_entities(dir: &Path, identity_columns: &[&'static str]) -> Result<Vec<EntityTrace>> {
    let mut entities: BTreeMap<Vec<(&'static str, String)>, Vec<TimeSeriesRecord>> =
        BTreeMap::new();

    for file in part_files(dir)? {
        let df = ParquetReader::new(fs::File::open(&file)?).finish()?;
        let identities = identity_columns
            .iter()
            .map(|column| Ok(df.column(column)?.str()?.clone()))
            .collect::<Result<Vec<StringChunked>>>()?;
        let millis = df.column(DATETIME_COLUMN)?.cast(&DataType::Int64)?;
        let millis = millis.i64()?;
        let values = df.column(VALUE_COLUMN)?.cast(&DataType::Float64)?;
        let values = values.f64()?;

        for row in 0..df.height() {
            let identity: Option<Vec<(&'static str, String)>> = identity_columns
                .iter()
                .zip(identities.iter())
                .map(|(column, ca)| ca.get(row).map(|v| (*column, v.to_string())))
                .collect();
            let timestamp = millis.get(row).and_then(from_millis);
            if let (Some(identity), Some(timestamp)) = (identity, timestamp) {
                entities.entry(identity).or_default().push(TimeSeriesRecord {
                    timestamp,
                    value: values.get(row),
                });
            }
        }
    }

    Ok(entities
        .into_iter()
        .map(|(identity, mut records)| {
            records.sort_by_key(|r| r.timestamp);
            EntityTrace { identity, records }
        })
        .collect())
}
