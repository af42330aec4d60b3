use crate::data_loader::scan_args;
use crate::error::Result;
use crate::models::EntityIdentity;
use glob::glob;
use isp_trace_parser::partition::{PartitionKey, PART_FILE_PREFIX};
use isp_trace_parser::Family;
use polars::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Which partitions of a store hold which entities.
#[derive(Debug, Clone)]
pub struct EntityIndex {
    family: Family,
    entities: BTreeMap<EntityIdentity, BTreeSet<PartitionKey>>,
}

impl EntityIndex {
    pub fn new(family: Family) -> Self {
        Self {
            family,
            entities: BTreeMap::new(),
        }
    }

    /// Scan every part file under `store_dir` for the identity columns of `family`.
    pub fn build(store_dir: &Path, family: Family) -> Result<Self> {
        let mut index = EntityIndex::new(family);
        let pattern = format!(
            "{}/**/{}*.parquet",
            glob::Pattern::escape(&store_dir.to_string_lossy()),
            PART_FILE_PREFIX
        );
        let columns = family.identity_columns();

        for path in glob(&pattern)?.filter_map(std::result::Result::ok) {
            let Some(key) = path
                .parent()
                .and_then(|dir| dir.strip_prefix(store_dir).ok())
                .and_then(PartitionKey::from_relative_dir)
            else {
                log::warn!("ignoring part file outside a partition: {}", path.display());
                continue;
            };

            let df = LazyFrame::scan_parquet(&path, scan_args())?
                .select(columns.iter().map(|c| col(*c)).collect::<Vec<_>>())
                .collect()?;
            let series = columns
                .iter()
                .map(|c| Ok(df.column(c)?.str()?.clone()))
                .collect::<Result<Vec<StringChunked>>>()?;

            let mut seen: BTreeSet<EntityIdentity> = BTreeSet::new();
            for row in 0..df.height() {
                let identity: Option<EntityIdentity> = columns
                    .iter()
                    .zip(series.iter())
                    .map(|(c, values)| values.get(row).map(|v| (*c, v.to_string())))
                    .collect();
                if let Some(identity) = identity {
                    seen.insert(identity);
                }
            }
            for identity in seen {
                index.insert(identity, key.clone());
            }
        }

        log::info!(
            "indexed {} {} entities under {}",
            index.len(),
            family,
            store_dir.display()
        );
        Ok(index)
    }

    pub fn family(&self) -> Family {
        self.family
    }

    pub fn insert(&mut self, identity: EntityIdentity, key: PartitionKey) {
        self.entities.entry(identity).or_default().insert(key);
    }

    pub fn partitions_for(&self, identity: &EntityIdentity) -> impl Iterator<Item = &PartitionKey> {
        self.entities.get(identity).into_iter().flatten()
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntityIdentity> {
        self.entities.keys()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
