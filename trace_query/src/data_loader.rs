use crate::error::Result;
use crate::models::EntityIdentity;
use isp_trace_parser::partition::{part_files, PartitionKey, DATETIME_COLUMN, VALUE_COLUMN};
use isp_trace_parser::trace_formatter::records_from_dataframe;
use isp_trace_parser::TimeSeriesRecord;
use polars::prelude::*;
use std::path::{Path, PathBuf};

/// Reads one entity out of one partition of the parsed store.
#[derive(Debug, Clone)]
pub struct PartitionLoader {
    store_dir: PathBuf,
}

impl PartitionLoader {
    pub fn new(store_dir: &Path) -> Self {
        Self {
            store_dir: store_dir.to_path_buf(),
        }
    }

    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    /// Load the records of `identity` from `key`, sorted by timestamp. Only that
    /// partition's part files are scanned.
    pub fn load(&self, key: &PartitionKey, identity: &EntityIdentity) -> Result<Vec<TimeSeriesRecord>> {
        let files = part_files(&key.dir_in(&self.store_dir))?;
        let predicate = identity
            .iter()
            .map(|(column, value)| col(*column).eq(lit(value.as_str())))
            .reduce(|acc, expr| acc.and(expr));

        let mut records = Vec::new();
        for file in files {
            let mut lf = LazyFrame::scan_parquet(&file, scan_args())?;
            if let Some(predicate) = predicate.clone() {
                lf = lf.filter(predicate);
            }
            let df = lf
                .select([col(DATETIME_COLUMN), col(VALUE_COLUMN)])
                .collect()?;
            log::debug!("loaded {} rows from {}", df.height(), file.display());
            records.extend(records_from_dataframe(&df)?);
        }

        records.sort_by_key(|r| r.timestamp);
        Ok(records)
    }
}

/// Scan options for store part files. Partition columns are written into every
/// part file, so directory names are not parsed as hive columns.
pub(crate) fn scan_args() -> ScanArgsParquet {
    let mut args = ScanArgsParquet::default();
    args.hive_options.enabled = Some(false);
    args
}
