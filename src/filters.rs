use crate::family::{
    DemandScenario, DemandType, EntityKind, Family, Poe, SolarTechnology, WindResourceQuality,
};
use crate::metadata::{DemandMetadata, RawFileMetadata, SolarMetadata, WindMetadata};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::HashSet;
use std::hash::Hash;

/// Accepted values for one metadata attribute. `None` accepts everything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AcceptSet<T: Eq + Hash>(Option<HashSet<T>>);

impl<T: Eq + Hash> Default for AcceptSet<T> {
    fn default() -> Self {
        AcceptSet(None)
    }
}

impl<T: Eq + Hash> AcceptSet<T> {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn only(values: impl IntoIterator<Item = T>) -> Self {
        AcceptSet(Some(values.into_iter().collect()))
    }

    pub fn is_unrestricted(&self) -> bool {
        self.0.is_none()
    }

    pub fn admits<Q>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        match &self.0 {
            None => true,
            Some(set) => set.contains(value),
        }
    }
}

pub trait MetadataFilter {
    type Metadata;

    fn matches(&self, metadata: &Self::Metadata) -> bool;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolarMetadataFilter {
    pub entity_kind: AcceptSet<EntityKind>,
    pub name: AcceptSet<String>,
    pub technology: AcceptSet<SolarTechnology>,
    pub reference_year: AcceptSet<i32>,
}

impl MetadataFilter for SolarMetadataFilter {
    type Metadata = SolarMetadata;

    fn matches(&self, m: &SolarMetadata) -> bool {
        self.entity_kind.admits(&m.entity_kind)
            && self.name.admits(m.name.as_str())
            && self.technology.admits(&m.technology)
            && self.reference_year.admits(&m.reference_year)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WindMetadataFilter {
    pub entity_kind: AcceptSet<EntityKind>,
    pub name: AcceptSet<String>,
    pub resource_quality: AcceptSet<WindResourceQuality>,
    pub reference_year: AcceptSet<i32>,
}

impl MetadataFilter for WindMetadataFilter {
    type Metadata = WindMetadata;

    fn matches(&self, m: &WindMetadata) -> bool {
        // Project traces have no resource quality, so that attribute cannot exclude them.
        let quality_ok = m
            .resource_quality
            .map_or(true, |q| self.resource_quality.admits(&q));
        self.entity_kind.admits(&m.entity_kind)
            && self.name.admits(m.name.as_str())
            && quality_ok
            && self.reference_year.admits(&m.reference_year)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DemandMetadataFilter {
    pub subregion: AcceptSet<String>,
    pub scenario: AcceptSet<DemandScenario>,
    pub poe: AcceptSet<Poe>,
    pub demand_type: AcceptSet<DemandType>,
    pub reference_year: AcceptSet<i32>,
}

impl MetadataFilter for DemandMetadataFilter {
    type Metadata = DemandMetadata;

    fn matches(&self, m: &DemandMetadata) -> bool {
        self.subregion.admits(m.subregion.as_str())
            && self.scenario.admits(&m.scenario)
            && self.poe.admits(&m.poe)
            && self.demand_type.admits(&m.demand_type)
            && self.reference_year.admits(&m.reference_year)
    }
}

/// A filter for any family, selected by the `family` tag in JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "lowercase")]
pub enum TraceFilter {
    Solar(SolarMetadataFilter),
    Wind(WindMetadataFilter),
    Demand(DemandMetadataFilter),
}

impl TraceFilter {
    pub fn family(&self) -> Family {
        match self {
            TraceFilter::Solar(_) => Family::Solar,
            TraceFilter::Wind(_) => Family::Wind,
            TraceFilter::Demand(_) => Family::Demand,
        }
    }

    /// A filter never matches metadata of another family.
    pub fn matches_raw(&self, metadata: &RawFileMetadata) -> bool {
        match (self, metadata) {
            (TraceFilter::Solar(f), RawFileMetadata::Solar(m)) => f.matches(m),
            (TraceFilter::Wind(f), RawFileMetadata::Wind(m)) => f.matches(m),
            (TraceFilter::Demand(f), RawFileMetadata::Demand(m)) => f.matches(m),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::parse_filename;

    fn solar(name: &str, technology: SolarTechnology, year: i32) -> SolarMetadata {
        SolarMetadata {
            entity_kind: EntityKind::Project,
            name: name.to_string(),
            technology,
            reference_year: year,
        }
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = SolarMetadataFilter::default();
        assert!(filter.matches(&solar("Woolooga", SolarTechnology::Sat, 2011)));
        assert!(filter.entity_kind.is_unrestricted());
    }

    #[test]
    fn test_attributes_are_conjunctive() {
        let filter = SolarMetadataFilter {
            name: AcceptSet::only(["Woolooga".to_string(), "Darling_Downs".to_string()]),
            reference_year: AcceptSet::only([2011]),
            ..Default::default()
        };
        assert!(filter.matches(&solar("Woolooga", SolarTechnology::Sat, 2011)));
        assert!(filter.matches(&solar("Darling_Downs", SolarTechnology::Ffp, 2011)));
        assert!(!filter.matches(&solar("Woolooga", SolarTechnology::Sat, 2012)));
        assert!(!filter.matches(&solar("Bungala", SolarTechnology::Sat, 2011)));
    }

    #[test]
    fn test_empty_accept_set_rejects_everything() {
        let filter = SolarMetadataFilter {
            technology: AcceptSet::only(Vec::new()),
            ..Default::default()
        };
        assert!(!filter.matches(&solar("Woolooga", SolarTechnology::Sat, 2011)));
    }

    #[test]
    fn test_wind_quality_does_not_exclude_projects() {
        let filter = WindMetadataFilter {
            resource_quality: AcceptSet::only([WindResourceQuality::High]),
            ..Default::default()
        };
        let project = parse_filename("ARWF1_RefYear2023.csv", Family::Wind).unwrap();
        let high = parse_filename("N8_WH_Cooma-Monaro_RefYear2023.csv", Family::Wind).unwrap();
        let low = parse_filename("N8_WL_Cooma-Monaro_RefYear2023.csv", Family::Wind).unwrap();
        let filter = TraceFilter::Wind(filter);
        assert!(filter.matches_raw(&project));
        assert!(filter.matches_raw(&high));
        assert!(!filter.matches_raw(&low));
    }

    #[test]
    fn test_filter_from_json() {
        let json = r#"{
            "family": "demand",
            "subregion": ["VIC", "NSW"],
            "scenario": ["Step Change"],
            "poe": ["POE10"]
        }"#;
        let filter: TraceFilter = serde_json::from_str(json).unwrap();
        let vic = parse_filename(
            "VIC_RefYear_2011_STEP_CHANGE_POE10_OPSO_MODELLING.csv",
            Family::Demand,
        )
        .unwrap();
        let poe50 = parse_filename(
            "VIC_RefYear_2011_STEP_CHANGE_POE50_OPSO_MODELLING.csv",
            Family::Demand,
        )
        .unwrap();
        assert!(filter.matches_raw(&vic));
        assert!(!filter.matches_raw(&poe50));

        let solar = parse_filename("Woolooga_SAT_RefYear2023.csv", Family::Solar).unwrap();
        assert!(!filter.matches_raw(&solar));
    }

    #[test]
    fn test_unknown_filter_key_is_rejected() {
        let result: Result<SolarMetadataFilter, _> = serde_json::from_str(r#"{"colour": ["red"]}"#);
        assert!(result.is_err());
    }
}
