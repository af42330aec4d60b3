use crate::error::Result;
use polars::prelude::ParquetCompression;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub const DEFAULT_MAX_ROWS_PER_FILE: usize = 5_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreCompression {
    #[default]
    Snappy,
    Zstd,
    Uncompressed,
}

impl StoreCompression {
    pub fn to_parquet(self) -> ParquetCompression {
        match self {
            StoreCompression::Snappy => ParquetCompression::Snappy,
            StoreCompression::Zstd => ParquetCompression::Zstd(None),
            StoreCompression::Uncompressed => ParquetCompression::Uncompressed,
        }
    }
}

/// Settings for a parse run. Every field has a default, so a JSON file only
/// needs the keys it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParseConfig {
    /// Worker threads; `None` uses one per CPU.
    pub workers: Option<usize>,
    /// Rows buffered per partition before a part file is flushed.
    pub max_rows_per_file: usize,
    pub show_progress: bool,
    /// Raw filename name -> stored entity name.
    pub name_aliases: BTreeMap<String, String>,
    pub compression: StoreCompression,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            workers: None,
            max_rows_per_file: DEFAULT_MAX_ROWS_PER_FILE,
            show_progress: true,
            name_aliases: BTreeMap::new(),
            compression: StoreCompression::default(),
        }
    }
}

impl ParseConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        load_json(path)
    }

    pub fn worker_count(&self) -> usize {
        self.workers.filter(|n| *n > 0).unwrap_or_else(num_cpus::get)
    }

    pub fn alias_for<'a>(&'a self, name: &'a str) -> &'a str {
        self.name_aliases.get(name).map(String::as_str).unwrap_or(name)
    }
}

/// Load a metadata filter (or any other JSON document) from disk.
pub fn load_filter<T: DeserializeOwned>(path: &Path) -> Result<T> {
    load_json(path)
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}
