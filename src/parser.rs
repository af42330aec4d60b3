use crate::config::ParseConfig;
use crate::demand::parse_demand_traces;
use crate::error::{Result, TraceError};
use crate::family::Family;
use crate::filters::{MetadataFilter, TraceFilter};
use crate::metadata::file_name_of;
use crate::solar::parse_solar_traces;
use crate::wind::parse_wind_traces;
use crate::partition::{read_entities, EntityTrace, PartitionKey, PartitionWriter};
use crate::raw_reader::read_trace_csv;
use crate::trace_formatter::{reformat, TimeSeriesRecord};
use chrono::NaiveDateTime;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Everything that differs between the solar, wind and demand pipelines.
pub trait TraceFamily: Send + Sync + 'static {
    type Metadata: Clone + fmt::Debug + Send + Sync;
    type Filter: MetadataFilter<Metadata = Self::Metadata> + DeserializeOwned + Send + Sync;

    const FAMILY: Family;

    fn extract(filename: &str) -> Result<Self::Metadata>;

    fn partition_key(metadata: &Self::Metadata) -> PartitionKey;

    /// Identity column values of the entity a file belongs to, in store column order.
    fn identity(metadata: &Self::Metadata) -> Vec<(&'static str, String)>;

    fn entity_name(metadata: &Self::Metadata) -> &str;

    fn with_entity_name(metadata: Self::Metadata, name: &str) -> Self::Metadata;
}

#[derive(Debug)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: TraceError,
}

#[derive(Debug, Default)]
pub struct ParseReport {
    pub files_discovered: usize,
    pub files_skipped: usize,
    pub files_parsed: usize,
    pub partitions_written: Vec<PartitionKey>,
    /// Rows written, including entities carried over from the stored partition.
    pub rows_written: usize,
    /// Stored entities rewritten unchanged because this run did not re-parse them.
    pub entities_kept: usize,
    pub failures: Vec<FileFailure>,
}

impl ParseReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone)]
struct PlannedFile<M> {
    path: PathBuf,
    metadata: M,
}

#[derive(Debug, Default)]
struct PartitionOutcome {
    files_parsed: usize,
    rows_written: usize,
    entities_kept: usize,
    written: bool,
    failures: Vec<FileFailure>,
}

type EntityIdentity = Vec<(&'static str, String)>;

/// Parses every raw trace file of one family under `input_dir` into the
/// partitioned store at `parsed_dir`.
pub struct TraceParser<F: TraceFamily> {
    input_dir: PathBuf,
    parsed_dir: PathBuf,
    filter: Option<F::Filter>,
    config: ParseConfig,
    _family: PhantomData<F>,
}

impl<F: TraceFamily> TraceParser<F> {
    pub fn new(input_dir: &Path, parsed_dir: &Path, config: ParseConfig) -> Self {
        Self {
            input_dir: input_dir.to_path_buf(),
            parsed_dir: parsed_dir.to_path_buf(),
            filter: None,
            config,
            _family: PhantomData,
        }
    }

    pub fn with_filter(mut self, filter: Option<F::Filter>) -> Self {
        self.filter = filter;
        self
    }

    pub fn run(&self) -> Result<ParseReport> {
        if !self.input_dir.is_dir() {
            return Err(TraceError::InvalidInputDirectory(self.input_dir.clone()));
        }
        fs::create_dir_all(&self.parsed_dir)?;

        let files = discover_csv_files(&self.input_dir)?;
        log::info!(
            "found {} {} trace files under {}",
            files.len(),
            F::FAMILY,
            self.input_dir.display()
        );

        let mut report = ParseReport {
            files_discovered: files.len(),
            ..ParseReport::default()
        };

        let mut partitions: BTreeMap<PartitionKey, Vec<PlannedFile<F::Metadata>>> =
            BTreeMap::new();
        for path in files {
            match self.plan(&path) {
                Ok(Some(planned)) => partitions
                    .entry(F::partition_key(&planned.metadata))
                    .or_default()
                    .push(planned),
                Ok(None) => report.files_skipped += 1,
                Err(error) => {
                    log::warn!("skipping {}: {}", path.display(), error);
                    report.failures.push(FileFailure { path, error });
                }
            }
        }

        let planned_files: usize = partitions.values().map(Vec::len).sum();
        log::info!(
            "{} files planned into {} partitions, {} filtered out",
            planned_files,
            partitions.len(),
            report.files_skipped
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.worker_count())
            .build()?;
        let progress = self.progress_bar(planned_files);

        let partitions: Vec<(PartitionKey, Vec<PlannedFile<F::Metadata>>)> =
            partitions.into_iter().collect();
        let outcomes: Vec<(PartitionKey, Result<PartitionOutcome>)> = pool.install(|| {
            partitions
                .par_iter()
                .map(|(key, files)| (key.clone(), self.write_partition(key, files, &progress)))
                .collect()
        });
        progress.finish_and_clear();

        for (key, outcome) in outcomes {
            match outcome {
                Ok(outcome) => {
                    report.files_parsed += outcome.files_parsed;
                    report.rows_written += outcome.rows_written;
                    report.entities_kept += outcome.entities_kept;
                    report.failures.extend(outcome.failures);
                    if outcome.written {
                        report.partitions_written.push(key);
                    }
                }
                Err(error) => {
                    log::warn!("failed to write partition {}: {}", key, error);
                    report.failures.push(FileFailure {
                        path: key.dir_in(&self.parsed_dir),
                        error,
                    });
                }
            }
        }
        report.failures.sort_by(|a, b| a.path.cmp(&b.path));

        log::info!(
            "{} parse finished: {} files parsed, {} rows in {} partitions, {} failures",
            F::FAMILY,
            report.files_parsed,
            report.rows_written,
            report.partitions_written.len(),
            report.failures.len()
        );
        Ok(report)
    }

    /// Extract, alias and filter one file. `Ok(None)` means the filter excluded it.
    /// Filters see the stored entity name, after aliasing.
    fn plan(&self, path: &Path) -> Result<Option<PlannedFile<F::Metadata>>> {
        let filename = file_name_of(path, F::FAMILY)?;
        let metadata = F::extract(&filename)?;
        let name = self.config.alias_for(F::entity_name(&metadata)).to_string();
        let metadata = F::with_entity_name(metadata, &name);

        if let Some(filter) = &self.filter {
            if !filter.matches(&metadata) {
                log::debug!("filtered out {}", filename);
                return Ok(None);
            }
        }

        Ok(Some(PlannedFile {
            path: path.to_path_buf(),
            metadata,
        }))
    }

    fn write_partition(
        &self,
        key: &PartitionKey,
        files: &[PlannedFile<F::Metadata>],
        progress: &ProgressBar,
    ) -> Result<PartitionOutcome> {
        let mut entities: BTreeMap<EntityIdentity, Vec<&PlannedFile<F::Metadata>>> =
            BTreeMap::new();
        for file in files {
            entities.entry(F::identity(&file.metadata)).or_default().push(file);
        }
        let entities: Vec<(EntityIdentity, Vec<&PlannedFile<F::Metadata>>)> =
            entities.into_iter().collect();

        let mut writer = PartitionWriter::create(
            &self.parsed_dir,
            key.clone(),
            self.config.compression.to_parquet(),
        );
        let mut outcome = PartitionOutcome::default();
        let mut buffer: Vec<EntityTrace> = Vec::new();
        let mut buffered_rows = 0;
        let mut reparsed: BTreeSet<EntityIdentity> = BTreeSet::new();
        let mut failed: BTreeSet<EntityIdentity> = BTreeSet::new();

        // Bound memory to a handful of entities in flight per partition.
        let chunk_size = self.config.worker_count().max(1);
        for chunk in entities.chunks(chunk_size) {
            let loaded: Vec<(&EntityIdentity, Option<EntityTrace>, usize, Vec<FileFailure>)> =
                chunk
                    .par_iter()
                    .map(|(identity, files)| {
                        let (trace, parsed, failures) = load_entity(identity, files, progress);
                        (identity, trace, parsed, failures)
                    })
                    .collect();

            for (identity, trace, parsed, failures) in loaded {
                outcome.files_parsed += parsed;
                if !failures.is_empty() {
                    failed.insert(identity.clone());
                }
                outcome.failures.extend(failures);
                let Some(trace) = trace else { continue };
                reparsed.insert(identity.clone());

                buffered_rows += trace.len();
                buffer.push(trace);
                if buffered_rows >= self.config.max_rows_per_file {
                    outcome.rows_written += writer.write_part(&buffer)?;
                    buffer.clear();
                    buffered_rows = 0;
                }
            }
        }

        // A filtered run only rewrites the entities it parsed, and an entity whose
        // files all failed keeps what it had.
        let keep_unparsed = self.filter.is_some();
        if keep_unparsed || !failed.is_empty() {
            let stored = read_entities(&key.dir_in(&self.parsed_dir), F::FAMILY.identity_columns())?;
            for trace in stored {
                if reparsed.contains(&trace.identity)
                    || !(keep_unparsed || failed.contains(&trace.identity))
                {
                    continue;
                }
                log::debug!("partition {}: keeping stored {:?}", key, trace.identity);
                outcome.entities_kept += 1;
                buffered_rows += trace.len();
                buffer.push(trace);
                if buffered_rows >= self.config.max_rows_per_file {
                    outcome.rows_written += writer.write_part(&buffer)?;
                    buffer.clear();
                    buffered_rows = 0;
                }
            }
        }
        if !buffer.is_empty() {
            outcome.rows_written += writer.write_part(&buffer)?;
        }

        outcome.written = writer.commit()?;
        Ok(outcome)
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        pb
    }
}

/// Load every file of one entity and merge them into a single trace.
fn load_entity<M>(
    identity: &EntityIdentity,
    files: &[&PlannedFile<M>],
    progress: &ProgressBar,
) -> (Option<EntityTrace>, usize, Vec<FileFailure>) {
    let mut traces = Vec::with_capacity(files.len());
    let mut failures = Vec::new();

    for file in files {
        match read_trace_csv(&file.path).and_then(|table| reformat(&table)) {
            Ok(records) => traces.push(records),
            Err(error) => {
                log::warn!("failed to parse {}: {}", file.path.display(), error);
                failures.push(FileFailure {
                    path: file.path.clone(),
                    error,
                });
            }
        }
        progress.inc(1);
    }

    let parsed = traces.len();
    let records = match traces.len() {
        0 => return (None, 0, failures),
        1 => traces.pop().unwrap_or_default(),
        _ => average_traces(&traces),
    };
    let trace = EntityTrace {
        identity: identity.clone(),
        records,
    };
    (Some(trace), parsed, failures)
}

/// Average several traces of the same entity per timestamp. Missing values do
/// not count towards the mean; a timestamp with no values stays missing.
pub fn average_traces(traces: &[Vec<TimeSeriesRecord>]) -> Vec<TimeSeriesRecord> {
    let mut sums: BTreeMap<NaiveDateTime, (f64, usize)> = BTreeMap::new();
    for trace in traces {
        for record in trace {
            let entry = sums.entry(record.timestamp).or_insert((0.0, 0));
            if let Some(value) = record.value {
                entry.0 += value;
                entry.1 += 1;
            }
        }
    }
    sums.into_iter()
        .map(|(timestamp, (sum, count))| TimeSeriesRecord {
            timestamp,
            value: (count > 0).then(|| sum / count as f64),
        })
        .collect()
}

/// All `*.csv` files below `dir`, sorted by path.
pub fn discover_csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        let is_csv = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| ext.eq_ignore_ascii_case("csv"));
        if entry.file_type().is_file() && is_csv {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

/// Run the parser for `family`, checking that a supplied filter belongs to it.
pub fn parse_traces(
    family: Family,
    input_directory: &Path,
    parsed_directory: &Path,
    filter: Option<&TraceFilter>,
    config: &ParseConfig,
) -> Result<ParseReport> {
    if let Some(filter) = filter {
        if filter.family() != family {
            return Err(TraceError::FilterFamilyMismatch {
                expected: family,
                found: filter.family(),
            });
        }
    }

    match (family, filter) {
        (Family::Solar, Some(TraceFilter::Solar(f))) => {
            parse_solar_traces(input_directory, parsed_directory, Some(f), config)
        }
        (Family::Wind, Some(TraceFilter::Wind(f))) => {
            parse_wind_traces(input_directory, parsed_directory, Some(f), config)
        }
        (Family::Demand, Some(TraceFilter::Demand(f))) => {
            parse_demand_traces(input_directory, parsed_directory, Some(f), config)
        }
        (Family::Solar, _) => parse_solar_traces(input_directory, parsed_directory, None, config),
        (Family::Wind, _) => parse_wind_traces(input_directory, parsed_directory, None, config),
        (Family::Demand, _) => parse_demand_traces(input_directory, parsed_directory, None, config),
    }
}
