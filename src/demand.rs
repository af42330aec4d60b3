use crate::config::ParseConfig;
use crate::error::Result;
use crate::family::{DemandScenario, Family};
use crate::filters::DemandMetadataFilter;
use crate::metadata::{extract_demand_metadata, DemandMetadata};
use crate::parser::{ParseReport, TraceFamily, TraceParser};
use crate::partition::{
    PartitionKey, DEMAND_TYPE_COLUMN, POE_COLUMN, REFERENCE_YEAR_COLUMN, SCENARIO_COLUMN,
    SUBREGION_COLUMN,
};
use std::path::Path;

pub struct Demand;

/// Demand partitions: `scenario=<label>/reference_year=..`. Subregion, POE and
/// demand type are columns inside the partition.
pub fn partition_key(scenario: DemandScenario, reference_year: i32) -> PartitionKey {
    PartitionKey::new()
        .with(SCENARIO_COLUMN, scenario.label())
        .with(REFERENCE_YEAR_COLUMN, reference_year)
}

impl TraceFamily for Demand {
    type Metadata = DemandMetadata;
    type Filter = DemandMetadataFilter;

    const FAMILY: Family = Family::Demand;

    fn extract(filename: &str) -> Result<DemandMetadata> {
        extract_demand_metadata(filename)
    }

    fn partition_key(m: &DemandMetadata) -> PartitionKey {
        partition_key(m.scenario, m.reference_year)
    }

    fn identity(m: &DemandMetadata) -> Vec<(&'static str, String)> {
        vec![
            (SUBREGION_COLUMN, m.subregion.clone()),
            (POE_COLUMN, m.poe.code().to_string()),
            (DEMAND_TYPE_COLUMN, m.demand_type.code().to_string()),
        ]
    }

    fn entity_name(m: &DemandMetadata) -> &str {
        &m.subregion
    }

    fn with_entity_name(m: DemandMetadata, name: &str) -> DemandMetadata {
        DemandMetadata {
            subregion: name.to_string(),
            ..m
        }
    }
}

pub fn parse_demand_traces(
    input_directory: &Path,
    parsed_directory: &Path,
    filters: Option<&DemandMetadataFilter>,
    config: &ParseConfig,
) -> Result<ParseReport> {
    TraceParser::<Demand>::new(input_directory, parsed_directory, config.clone())
        .with_filter(filters.cloned())
        .run()
}
