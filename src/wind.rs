use crate::config::ParseConfig;
use crate::error::Result;
use crate::family::{EntityKind, Family, WindResourceQuality};
use crate::filters::WindMetadataFilter;
use crate::metadata::{extract_wind_metadata, WindMetadata};
use crate::parser::{ParseReport, TraceFamily, TraceParser};
use crate::partition::{
    PartitionKey, ENTITY_KIND_COLUMN, NAME_COLUMN, REFERENCE_YEAR_COLUMN,
    RESOURCE_QUALITY_COLUMN,
};
use std::path::Path;

pub struct Wind;

/// Wind partitions: `entity_kind=../reference_year=..`, plus
/// `resource_quality=..` for zone traces.
pub fn partition_key(
    entity_kind: EntityKind,
    reference_year: i32,
    resource_quality: Option<WindResourceQuality>,
) -> PartitionKey {
    let key = PartitionKey::new()
        .with(ENTITY_KIND_COLUMN, entity_kind)
        .with(REFERENCE_YEAR_COLUMN, reference_year);
    match resource_quality {
        Some(quality) => key.with(RESOURCE_QUALITY_COLUMN, quality),
        None => key,
    }
}

impl TraceFamily for Wind {
    type Metadata = WindMetadata;
    type Filter = WindMetadataFilter;

    const FAMILY: Family = Family::Wind;

    fn extract(filename: &str) -> Result<WindMetadata> {
        extract_wind_metadata(filename)
    }

    fn partition_key(m: &WindMetadata) -> PartitionKey {
        partition_key(m.entity_kind, m.reference_year, m.resource_quality)
    }

    fn identity(m: &WindMetadata) -> Vec<(&'static str, String)> {
        vec![(NAME_COLUMN, m.name.clone())]
    }

    fn entity_name(m: &WindMetadata) -> &str {
        &m.name
    }

    fn with_entity_name(m: WindMetadata, name: &str) -> WindMetadata {
        WindMetadata {
            name: name.to_string(),
            ..m
        }
    }
}

pub fn parse_wind_traces(
    input_directory: &Path,
    parsed_directory: &Path,
    filters: Option<&WindMetadataFilter>,
    config: &ParseConfig,
) -> Result<ParseReport> {
    TraceParser::<Wind>::new(input_directory, parsed_directory, config.clone())
        .with_filter(filters.cloned())
        .run()
}
