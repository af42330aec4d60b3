use crate::error::{QueryError, Result};
use crate::reference_year::{construct_reference_year_mapping, ReferenceYearMapping};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use isp_trace_parser::partition::{
    PartitionKey, DEMAND_TYPE_COLUMN, ENTITY_KIND_COLUMN, NAME_COLUMN, POE_COLUMN,
    REFERENCE_YEAR_COLUMN, RESOURCE_QUALITY_COLUMN, SCENARIO_COLUMN, SUBREGION_COLUMN,
    TECHNOLOGY_COLUMN,
};
use isp_trace_parser::trace_formatter::records_to_dataframe;
use isp_trace_parser::{
    DemandScenario, DemandType, EntityKind, Family, Poe, SolarTechnology, TimeSeriesRecord,
    WindResourceQuality,
};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

/// Identity column values of one stored entity, in store column order.
pub type EntityIdentity = Vec<(&'static str, String)>;

/// How modelled years are delimited. Both kinds treat timestamps as interval
/// ending: a year owns `(start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum YearType {
    #[default]
    Calendar,
    /// Year `y` runs from 1 July of `y - 1` to 1 July of `y`.
    Financial,
}

impl YearType {
    /// Calendar-year pieces of `year` as `(calendar year, exclusive start,
    /// inclusive end)`. A financial year is the second half of `year - 1`
    /// followed by the first half of `year`.
    pub fn segments(&self, year: i32) -> Option<Vec<(i32, NaiveDateTime, NaiveDateTime)>> {
        let first_of = |y: i32, month: u32| {
            NaiveDate::from_ymd_opt(y, month, 1).map(|d| d.and_time(NaiveTime::MIN))
        };
        let segments = match self {
            YearType::Calendar => vec![(year, first_of(year, 1)?, first_of(year + 1, 1)?)],
            YearType::Financial => vec![
                (year - 1, first_of(year - 1, 7)?, first_of(year, 1)?),
                (year, first_of(year, 1)?, first_of(year, 7)?),
            ],
        };
        Some(segments)
    }
}

/// Names one stored entity of one family.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntitySelector {
    SolarProject {
        name: String,
    },
    SolarZone {
        zone: String,
        technology: SolarTechnology,
    },
    WindProject {
        name: String,
    },
    WindZone {
        zone: String,
        resource_quality: WindResourceQuality,
    },
    Demand {
        subregion: String,
        scenario: DemandScenario,
        poe: Poe,
        demand_type: DemandType,
    },
}

impl EntitySelector {
    pub fn family(&self) -> Family {
        match self {
            EntitySelector::SolarProject { .. } | EntitySelector::SolarZone { .. } => {
                Family::Solar
            }
            EntitySelector::WindProject { .. } | EntitySelector::WindZone { .. } => Family::Wind,
            EntitySelector::Demand { .. } => Family::Demand,
        }
    }

    /// Key under which batch results are returned.
    pub fn label(&self) -> String {
        match self {
            EntitySelector::SolarProject { name } | EntitySelector::WindProject { name } => {
                name.clone()
            }
            EntitySelector::SolarZone { zone, technology } => format!("{}_{}", zone, technology),
            EntitySelector::WindZone {
                zone,
                resource_quality,
            } => format!("{}_{}", zone, resource_quality),
            EntitySelector::Demand {
                subregion,
                scenario,
                poe,
                demand_type,
            } => format!("{}_{}_{}_{}", subregion, scenario, poe, demand_type),
        }
    }

    pub fn identity(&self) -> EntityIdentity {
        match self {
            EntitySelector::SolarProject { name } | EntitySelector::WindProject { name } => {
                vec![(NAME_COLUMN, name.clone())]
            }
            EntitySelector::SolarZone { zone, .. } | EntitySelector::WindZone { zone, .. } => {
                vec![(NAME_COLUMN, zone.clone())]
            }
            EntitySelector::Demand {
                subregion,
                poe,
                demand_type,
                ..
            } => vec![
                (SUBREGION_COLUMN, subregion.clone()),
                (POE_COLUMN, poe.code().to_string()),
                (DEMAND_TYPE_COLUMN, demand_type.code().to_string()),
            ],
        }
    }

    /// Partition segments the selector pins down, reference year aside.
    pub fn key_constraints(&self) -> PartitionKey {
        let key = PartitionKey::new();
        match self {
            EntitySelector::SolarProject { .. } | EntitySelector::WindProject { .. } => {
                key.with(ENTITY_KIND_COLUMN, EntityKind::Project)
            }
            EntitySelector::SolarZone { technology, .. } => key
                .with(ENTITY_KIND_COLUMN, EntityKind::Zone)
                .with(TECHNOLOGY_COLUMN, technology),
            EntitySelector::WindZone {
                resource_quality, ..
            } => key
                .with(ENTITY_KIND_COLUMN, EntityKind::Zone)
                .with(RESOURCE_QUALITY_COLUMN, resource_quality),
            EntitySelector::Demand { scenario, .. } => {
                key.with(SCENARIO_COLUMN, scenario.label())
            }
        }
    }

    pub fn matches_key(&self, key: &PartitionKey) -> bool {
        self.key_constraints()
            .segments()
            .iter()
            .all(|(column, value)| key.value(column) == Some(value.as_str()))
    }

    /// The partition a query for `reference_year` expects, for error messages.
    pub fn expected_partition(&self, reference_year: i32) -> String {
        match self {
            EntitySelector::SolarProject { .. } => {
                let key = PartitionKey::new()
                    .with(ENTITY_KIND_COLUMN, EntityKind::Project)
                    .with(REFERENCE_YEAR_COLUMN, reference_year);
                format!("{}/{}=*", key, TECHNOLOGY_COLUMN)
            }
            EntitySelector::SolarZone { technology, .. } => {
                isp_trace_parser::solar::partition_key(EntityKind::Zone, reference_year, *technology)
                    .to_string()
            }
            EntitySelector::WindProject { .. } => {
                isp_trace_parser::wind::partition_key(EntityKind::Project, reference_year, None)
                    .to_string()
            }
            EntitySelector::WindZone {
                resource_quality, ..
            } => isp_trace_parser::wind::partition_key(
                EntityKind::Zone,
                reference_year,
                Some(*resource_quality),
            )
            .to_string(),
            EntitySelector::Demand { scenario, .. } => {
                isp_trace_parser::demand::partition_key(*scenario, reference_year).to_string()
            }
        }
    }
}

/// Which modelled years to return and where their shapes come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YearSelection {
    Range {
        start_year: i32,
        end_year: i32,
        reference_year: i32,
    },
    Mapping(ReferenceYearMapping),
}

impl YearSelection {
    pub fn to_mapping(&self) -> Result<ReferenceYearMapping> {
        match self {
            YearSelection::Range {
                start_year,
                end_year,
                reference_year,
            } => construct_reference_year_mapping(*start_year, *end_year, &[*reference_year]),
            YearSelection::Mapping(mapping) if mapping.is_empty() => Err(QueryError::EmptyMapping),
            YearSelection::Mapping(mapping) => Ok(mapping.clone()),
        }
    }
}

/// A resolved trace for one entity over the requested years.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub label: String,
    pub records: Vec<TimeSeriesRecord>,
}

impl Trace {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn to_dataframe(&self) -> Result<DataFrame> {
        Ok(records_to_dataframe(&self.records)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calendar_and_financial_segments() {
        let render = |segments: Vec<(i32, NaiveDateTime, NaiveDateTime)>| {
            segments
                .into_iter()
                .map(|(y, start, end)| format!("{} {} {}", y, start, end))
                .collect::<Vec<_>>()
        };

        assert_eq!(
            render(YearType::Calendar.segments(2024).unwrap()),
            vec!["2024 2024-01-01 00:00:00 2025-01-01 00:00:00"]
        );
        assert_eq!(
            render(YearType::Financial.segments(2024).unwrap()),
            vec![
                "2023 2023-07-01 00:00:00 2024-01-01 00:00:00",
                "2024 2024-01-01 00:00:00 2024-07-01 00:00:00",
            ]
        );
    }

    #[test]
    fn test_selector_matches_only_its_partitions() {
        let zone = EntitySelector::SolarZone {
            zone: "N0".to_string(),
            technology: SolarTechnology::Cst,
        };
        let cst = isp_trace_parser::solar::partition_key(EntityKind::Zone, 2011, SolarTechnology::Cst);
        let sat = isp_trace_parser::solar::partition_key(EntityKind::Zone, 2011, SolarTechnology::Sat);
        let project =
            isp_trace_parser::solar::partition_key(EntityKind::Project, 2011, SolarTechnology::Cst);
        assert!(zone.matches_key(&cst));
        assert!(!zone.matches_key(&sat));
        assert!(!zone.matches_key(&project));
        assert_eq!(zone.label(), "N0_CST");
    }

    #[test]
    fn test_demand_selector_matches_sanitised_scenario() {
        let selector = EntitySelector::Demand {
            subregion: "VIC".to_string(),
            scenario: DemandScenario::StepChange,
            poe: Poe::Poe10,
            demand_type: DemandType::OpsoModelling,
        };
        let key = isp_trace_parser::demand::partition_key(DemandScenario::StepChange, 2011);
        assert!(selector.matches_key(&key));
        assert_eq!(selector.identity()[1], ("poe", "POE10".to_string()));
        assert_eq!(
            selector.expected_partition(2011),
            "scenario=Step_Change/reference_year=2011"
        );
    }

    #[test]
    fn test_selector_from_json() {
        let selector: EntitySelector =
            serde_json::from_str(r#"{"kind": "wind_zone", "zone": "N8", "resource_quality": "WH"}"#)
                .unwrap();
        assert_eq!(
            selector,
            EntitySelector::WindZone {
                zone: "N8".to_string(),
                resource_quality: WindResourceQuality::High,
            }
        );
        assert_eq!(selector.family(), Family::Wind);
    }

    #[test]
    fn test_empty_mapping_selection_is_rejected() {
        let selection = YearSelection::Mapping(ReferenceYearMapping::new());
        assert!(matches!(selection.to_mapping(), Err(QueryError::EmptyMapping)));
    }
}
