use crate::error::{Result, TraceError};
use crate::family::{
    DemandScenario, DemandType, EntityKind, Family, Poe, SolarTechnology, WindResourceQuality,
};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::path::Path;

// Zone files carry a leading region marker and free text between the zone id
// and the technology code, e.g. REZ_N0_NSW_Non-REZ_CST_RefYear2023.csv
static SOLAR_ZONE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[A-Z]+_(?P<name>[A-Z0-9]+)_[A-Za-z0-9_\-]+_(?P<technology>[A-Z]+)_RefYear(?P<reference_year>\d{4})\.csv$",
    )
    .expect("solar zone pattern is valid")
});

static SOLAR_PROJECT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<name>[A-Za-z0-9_\-]+)_(?P<technology>[A-Z]+)_RefYear(?P<reference_year>\d{4})\.csv$",
    )
    .expect("solar project pattern is valid")
});

static WIND_ZONE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<name>[A-Z0-9]+)_(?P<resource_quality>W[A-Z]+)_[A-Za-z_\-]+_RefYear(?P<reference_year>\d{4})\.csv$",
    )
    .expect("wind zone pattern is valid")
});

static WIND_PROJECT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<name>.+)_RefYear(?P<reference_year>\d{4})\.csv$")
        .expect("wind project pattern is valid")
});

static DEMAND_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<subregion>[A-Z]+)_RefYear_(?P<reference_year>\d{4})_(?P<scenario>[A-Z_]+)_(?P<poe>POE\d{2})_(?P<demand_type>[A-Z_]+)\.csv$",
    )
    .expect("demand pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SolarMetadata {
    pub entity_kind: EntityKind,
    pub name: String,
    pub technology: SolarTechnology,
    pub reference_year: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindMetadata {
    pub entity_kind: EntityKind,
    pub name: String,
    /// Only zone traces carry a resource quality code.
    pub resource_quality: Option<WindResourceQuality>,
    pub reference_year: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DemandMetadata {
    pub subregion: String,
    pub scenario: DemandScenario,
    pub poe: Poe,
    pub demand_type: DemandType,
    pub reference_year: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceSubtype {
    Technology(SolarTechnology),
    ResourceQuality(WindResourceQuality),
    DemandType(DemandType),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileCategory {
    ProjectTrace,
    ZoneTrace,
    DemandTrace,
}

/// Metadata recovered from a raw trace filename, one variant per family.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RawFileMetadata {
    Solar(SolarMetadata),
    Wind(WindMetadata),
    Demand(DemandMetadata),
}

impl RawFileMetadata {
    pub fn family(&self) -> Family {
        match self {
            RawFileMetadata::Solar(_) => Family::Solar,
            RawFileMetadata::Wind(_) => Family::Wind,
            RawFileMetadata::Demand(_) => Family::Demand,
        }
    }

    pub fn entity_kind(&self) -> EntityKind {
        match self {
            RawFileMetadata::Solar(m) => m.entity_kind,
            RawFileMetadata::Wind(m) => m.entity_kind,
            RawFileMetadata::Demand(_) => EntityKind::Subregion,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            RawFileMetadata::Solar(m) => &m.name,
            RawFileMetadata::Wind(m) => &m.name,
            RawFileMetadata::Demand(m) => &m.subregion,
        }
    }

    pub fn reference_year(&self) -> i32 {
        match self {
            RawFileMetadata::Solar(m) => m.reference_year,
            RawFileMetadata::Wind(m) => m.reference_year,
            RawFileMetadata::Demand(m) => m.reference_year,
        }
    }

    pub fn resource_subtype(&self) -> Option<ResourceSubtype> {
        match self {
            RawFileMetadata::Solar(m) => Some(ResourceSubtype::Technology(m.technology)),
            RawFileMetadata::Wind(m) => m.resource_quality.map(ResourceSubtype::ResourceQuality),
            RawFileMetadata::Demand(m) => Some(ResourceSubtype::DemandType(m.demand_type)),
        }
    }

    pub fn file_category(&self) -> FileCategory {
        match self.entity_kind() {
            EntityKind::Project => FileCategory::ProjectTrace,
            EntityKind::Zone => FileCategory::ZoneTrace,
            EntityKind::Subregion => FileCategory::DemandTrace,
        }
    }
}

/// Parse a raw trace filename (not a path) with the grammar of `family`.
pub fn parse_filename(filename: &str, family: Family) -> Result<RawFileMetadata> {
    match family {
        Family::Solar => extract_solar_metadata(filename).map(RawFileMetadata::Solar),
        Family::Wind => extract_wind_metadata(filename).map(RawFileMetadata::Wind),
        Family::Demand => extract_demand_metadata(filename).map(RawFileMetadata::Demand),
    }
}

/// Filename component of a path, rejected as malformed when it is not UTF-8.
pub fn file_name_of(path: &Path, family: Family) -> Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| TraceError::MalformedFilename {
            filename: path.display().to_string(),
            family,
        })
}

pub fn extract_solar_metadata(filename: &str) -> Result<SolarMetadata> {
    // Zone grammar is the more specific one, so it gets first refusal.
    let (caps, entity_kind) = if let Some(caps) = SOLAR_ZONE_PATTERN.captures(filename) {
        (caps, EntityKind::Zone)
    } else if let Some(caps) = SOLAR_PROJECT_PATTERN.captures(filename) {
        (caps, EntityKind::Project)
    } else {
        return Err(malformed(filename, Family::Solar));
    };

    let code = &caps["technology"];
    let technology = SolarTechnology::from_code(code)
        .ok_or_else(|| unknown_code(filename, "solar technology", code))?;

    Ok(SolarMetadata {
        entity_kind,
        name: caps["name"].to_string(),
        technology,
        reference_year: reference_year(&caps, filename, Family::Solar)?,
    })
}

pub fn extract_wind_metadata(filename: &str) -> Result<WindMetadata> {
    if let Some(caps) = WIND_ZONE_PATTERN.captures(filename) {
        let code = &caps["resource_quality"];
        let quality = WindResourceQuality::from_code(code)
            .ok_or_else(|| unknown_code(filename, "wind resource quality", code))?;
        return Ok(WindMetadata {
            entity_kind: EntityKind::Zone,
            name: caps["name"].to_string(),
            resource_quality: Some(quality),
            reference_year: reference_year(&caps, filename, Family::Wind)?,
        });
    }

    let caps = WIND_PROJECT_PATTERN
        .captures(filename)
        .ok_or_else(|| malformed(filename, Family::Wind))?;
    Ok(WindMetadata {
        entity_kind: EntityKind::Project,
        name: caps["name"].to_string(),
        resource_quality: None,
        reference_year: reference_year(&caps, filename, Family::Wind)?,
    })
}

pub fn extract_demand_metadata(filename: &str) -> Result<DemandMetadata> {
    let caps = DEMAND_PATTERN
        .captures(filename)
        .ok_or_else(|| malformed(filename, Family::Demand))?;

    let scenario = DemandScenario::from_code(&caps["scenario"])
        .ok_or_else(|| unknown_code(filename, "demand scenario", &caps["scenario"]))?;
    let poe = Poe::from_code(&caps["poe"])
        .ok_or_else(|| unknown_code(filename, "POE", &caps["poe"]))?;
    let demand_type = DemandType::from_code(&caps["demand_type"])
        .ok_or_else(|| unknown_code(filename, "demand type", &caps["demand_type"]))?;

    Ok(DemandMetadata {
        subregion: caps["subregion"].to_string(),
        scenario,
        poe,
        demand_type,
        reference_year: reference_year(&caps, filename, Family::Demand)?,
    })
}

fn reference_year(caps: &Captures<'_>, filename: &str, family: Family) -> Result<i32> {
    caps["reference_year"]
        .parse::<i32>()
        .map_err(|_| malformed(filename, family))
}

fn malformed(filename: &str, family: Family) -> TraceError {
    TraceError::MalformedFilename {
        filename: filename.to_string(),
        family,
    }
}

fn unknown_code(filename: &str, kind: &'static str, token: &str) -> TraceError {
    TraceError::UnknownResourceSubtype {
        filename: filename.to_string(),
        kind,
        token: token.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solar_project_filenames() {
        let meta = extract_solar_metadata("Woolooga_SAT_RefYear2023.csv").unwrap();
        assert_eq!(meta.name, "Woolooga");
        assert_eq!(meta.technology, SolarTechnology::Sat);
        assert_eq!(meta.reference_year, 2023);
        assert_eq!(meta.entity_kind, EntityKind::Project);

        let meta = extract_solar_metadata("Darling_Downs_FFP_RefYear2023.csv").unwrap();
        assert_eq!(meta.name, "Darling_Downs");
        assert_eq!(meta.technology, SolarTechnology::Ffp);
    }

    #[test]
    fn test_solar_zone_filename() {
        let meta = extract_solar_metadata("REZ_N0_NSW_Non-REZ_CST_RefYear2023.csv").unwrap();
        assert_eq!(meta.name, "N0");
        assert_eq!(meta.technology, SolarTechnology::Cst);
        assert_eq!(meta.entity_kind, EntityKind::Zone);
    }

    #[test]
    fn test_wind_filenames() {
        let meta = extract_wind_metadata("ARWF1_RefYear2023.csv").unwrap();
        assert_eq!(meta.name, "ARWF1");
        assert_eq!(meta.entity_kind, EntityKind::Project);
        assert_eq!(meta.resource_quality, None);

        let meta = extract_wind_metadata("CAPTL_WF_RefYear2023.csv").unwrap();
        assert_eq!(meta.name, "CAPTL_WF");
        assert_eq!(meta.entity_kind, EntityKind::Project);

        let meta = extract_wind_metadata("N8_WH_Cooma-Monaro_RefYear2023.csv").unwrap();
        assert_eq!(meta.name, "N8");
        assert_eq!(meta.resource_quality, Some(WindResourceQuality::High));
        assert_eq!(meta.entity_kind, EntityKind::Zone);
        assert_eq!(meta.reference_year, 2023);
    }

    #[test]
    fn test_demand_filename() {
        let meta =
            extract_demand_metadata("VIC_RefYear_2011_STEP_CHANGE_POE10_OPSO_MODELLING.csv")
                .unwrap();
        assert_eq!(meta.subregion, "VIC");
        assert_eq!(meta.reference_year, 2011);
        assert_eq!(meta.scenario, DemandScenario::StepChange);
        assert_eq!(meta.poe, Poe::Poe10);
        assert_eq!(meta.demand_type, DemandType::OpsoModelling);

        let meta =
            extract_demand_metadata("CNSW_RefYear_2011_HYDROGEN_EXPORT_POE10_OPSO_MODELLING.csv")
                .unwrap();
        assert_eq!(meta.scenario, DemandScenario::GreenEnergyExports);
    }

    #[test]
    fn test_malformed_filenames_are_rejected() {
        for name in ["notes.txt", "Woolooga_SAT_RefYearABCD.csv", "SAT_2011.csv"] {
            let err = parse_filename(name, Family::Solar).unwrap_err();
            assert!(matches!(err, TraceError::MalformedFilename { .. }), "{name}");
        }
        let err = parse_filename("VIC_2011_STEP_CHANGE.csv", Family::Demand).unwrap_err();
        assert!(matches!(err, TraceError::MalformedFilename { .. }));
    }

    #[test]
    fn test_unknown_codes_are_rejected() {
        let err = extract_solar_metadata("Woolooga_XYZ_RefYear2023.csv").unwrap_err();
        assert!(matches!(
            err,
            TraceError::UnknownResourceSubtype { ref token, .. } if token == "XYZ"
        ));

        let err = extract_wind_metadata("N8_WZ_Cooma-Monaro_RefYear2023.csv").unwrap_err();
        assert!(matches!(err, TraceError::UnknownResourceSubtype { .. }));

        let err = extract_demand_metadata("VIC_RefYear_2011_STEP_CHANGE_POE30_OPSO.csv")
            .unwrap_err();
        assert!(matches!(err, TraceError::UnknownResourceSubtype { kind: "POE", .. }));

        let err = extract_demand_metadata("VIC_RefYear_2011_SLOW_CHANGE_POE10_OPSO.csv")
            .unwrap_err();
        assert!(matches!(
            err,
            TraceError::UnknownResourceSubtype { kind: "demand scenario", .. }
        ));
    }

    #[test]
    fn test_raw_metadata_accessors() {
        let meta = parse_filename("N8_WH_Cooma-Monaro_RefYear2023.csv", Family::Wind).unwrap();
        assert_eq!(meta.family(), Family::Wind);
        assert_eq!(meta.name(), "N8");
        assert_eq!(meta.file_category(), FileCategory::ZoneTrace);
        assert_eq!(
            meta.resource_subtype(),
            Some(ResourceSubtype::ResourceQuality(WindResourceQuality::High))
        );

        let meta = parse_filename(
            "TAS_RefYear_2012_PROGRESSIVE_CHANGE_POE50_PV_TOT.csv",
            Family::Demand,
        )
        .unwrap();
        assert_eq!(meta.entity_kind(), EntityKind::Subregion);
        assert_eq!(meta.reference_year(), 2012);
    }
}
