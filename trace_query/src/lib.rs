pub mod data_loader;
pub mod entity_index;
pub mod error;
pub mod models;
pub mod reference_year;
pub mod resolver;

pub use data_loader::PartitionLoader;
pub use entity_index::EntityIndex;
pub use error::{QueryError, Result};
pub use models::{EntityIdentity, EntitySelector, Trace, YearSelection, YearType};
pub use reference_year::{construct_reference_year_mapping, ReferenceYearMapping};
pub use resolver::TraceQuery;
