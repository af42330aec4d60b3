use crate::config::ParseConfig;
use crate::error::Result;
use crate::family::{EntityKind, Family, SolarTechnology};
use crate::filters::SolarMetadataFilter;
use crate::metadata::{extract_solar_metadata, SolarMetadata};
use crate::parser::{ParseReport, TraceFamily, TraceParser};
use crate::partition::{
    PartitionKey, ENTITY_KIND_COLUMN, NAME_COLUMN, REFERENCE_YEAR_COLUMN, TECHNOLOGY_COLUMN,
};
use std::path::Path;

pub struct Solar;

/// Solar partitions: `entity_kind=../reference_year=../technology=..`.
pub fn partition_key(
    entity_kind: EntityKind,
    reference_year: i32,
    technology: SolarTechnology,
) -> PartitionKey {
    PartitionKey::new()
        .with(ENTITY_KIND_COLUMN, entity_kind)
        .with(REFERENCE_YEAR_COLUMN, reference_year)
        .with(TECHNOLOGY_COLUMN, technology)
}

impl TraceFamily for Solar {
    type Metadata = SolarMetadata;
    type Filter = SolarMetadataFilter;

    const FAMILY: Family = Family::Solar;

    fn extract(filename: &str) -> Result<SolarMetadata> {
        extract_solar_metadata(filename)
    }

    fn partition_key(m: &SolarMetadata) -> PartitionKey {
        partition_key(m.entity_kind, m.reference_year, m.technology)
    }

    fn identity(m: &SolarMetadata) -> Vec<(&'static str, String)> {
        vec![(NAME_COLUMN, m.name.clone())]
    }

    fn entity_name(m: &SolarMetadata) -> &str {
        &m.name
    }

    fn with_entity_name(m: SolarMetadata, name: &str) -> SolarMetadata {
        SolarMetadata {
            name: name.to_string(),
            ..m
        }
    }
}

pub fn parse_solar_traces(
    input_directory: &Path,
    parsed_directory: &Path,
    filters: Option<&SolarMetadataFilter>,
    config: &ParseConfig,
) -> Result<ParseReport> {
    TraceParser::<Solar>::new(input_directory, parsed_directory, config.clone())
        .with_filter(filters.cloned())
        .run()
}
