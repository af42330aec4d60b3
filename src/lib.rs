pub mod archive;
pub mod config;
pub mod demand;
pub mod error;
pub mod family;
pub mod filters;
pub mod metadata;
pub mod parser;
pub mod partition;
pub mod raw_reader;
pub mod solar;
pub mod trace_formatter;
pub mod wind;

pub use config::{ParseConfig, StoreCompression};
pub use demand::parse_demand_traces;
pub use error::{Result, TraceError};
pub use family::{
    DemandScenario, DemandType, EntityKind, Family, Poe, SolarTechnology, WindResourceQuality,
};
pub use filters::{
    AcceptSet, DemandMetadataFilter, MetadataFilter, SolarMetadataFilter, TraceFilter,
    WindMetadataFilter,
};
pub use metadata::{parse_filename, FileCategory, RawFileMetadata};
pub use parser::{parse_traces, FileFailure, ParseReport, TraceFamily, TraceParser};
pub use partition::PartitionKey;
pub use solar::parse_solar_traces;
pub use trace_formatter::{reformat, reformat_dataframe, TimeSeriesRecord, WideTable};
pub use wind::parse_wind_traces;
