use serde::{Deserialize, Serialize};
use std::fmt;

/// Dataset family a trace file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    Solar,
    Wind,
    Demand,
}

impl Family {
    pub fn as_str(&self) -> &'static str {
        match self {
            Family::Solar => "solar",
            Family::Wind => "wind",
            Family::Demand => "demand",
        }
    }

    /// Columns that identify one entity inside a partition file.
    pub fn identity_columns(&self) -> &'static [&'static str] {
        match self {
            Family::Solar | Family::Wind => &[crate::partition::NAME_COLUMN],
            Family::Demand => &[
                crate::partition::SUBREGION_COLUMN,
                crate::partition::POE_COLUMN,
                crate::partition::DEMAND_TYPE_COLUMN,
            ],
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Project,
    Zone,
    Subregion,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Project => "project",
            EntityKind::Zone => "zone",
            EntityKind::Subregion => "subregion",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed vocabularies of filename codes. Each variant maps to exactly one
/// token as it appears in AEMO filenames.
macro_rules! code_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $token:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $token)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn code(&self) -> &'static str {
                match self {
                    $($name::$variant => $token),+
                }
            }

            pub fn from_code(code: &str) -> Option<Self> {
                match code {
                    $($token => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.code())
            }
        }
    };
}

code_enum! {
    /// Solar technology: single axis tracking, fixed flat plate, concentrated solar thermal.
    SolarTechnology {
        Sat => "SAT",
        Ffp => "FFP",
        Cst => "CST",
    }
}

code_enum! {
    /// Wind resource quality for zone traces. Offshore zones use the fixed and floating codes.
    WindResourceQuality {
        High => "WH",
        Medium => "WM",
        Low => "WL",
        OffshoreFixed => "WFX",
        OffshoreFloating => "WFL",
    }
}

code_enum! {
    Poe {
        Poe10 => "POE10",
        Poe50 => "POE50",
        Poe90 => "POE90",
    }
}

code_enum! {
    DemandType {
        Opso => "OPSO",
        OpsoPvlite => "OPSO_PVLITE",
        OpsoModelling => "OPSO_MODELLING",
        OpsoModellingPvlite => "OPSO_MODELLING_PVLITE",
        PvTot => "PV_TOT",
    }
}

/// Demand scenario. Raw files use upper-case codes, the store uses the
/// workbook label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DemandScenario {
    #[serde(rename = "Step Change", alias = "STEP_CHANGE")]
    StepChange,
    #[serde(rename = "Progressive Change", alias = "PROGRESSIVE_CHANGE")]
    ProgressiveChange,
    #[serde(
        rename = "Green Energy Exports",
        alias = "GREEN_ENERGY_EXPORTS",
        alias = "HYDROGEN_EXPORT"
    )]
    GreenEnergyExports,
}

impl DemandScenario {
    pub const ALL: &'static [DemandScenario] = &[
        DemandScenario::StepChange,
        DemandScenario::ProgressiveChange,
        DemandScenario::GreenEnergyExports,
    ];

    /// Accepts the raw filename code (including the legacy hydrogen export
    /// code) or the workbook label with spaces or underscores.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "STEP_CHANGE" | "Step Change" | "Step_Change" => Some(DemandScenario::StepChange),
            "PROGRESSIVE_CHANGE" | "Progressive Change" | "Progressive_Change" => {
                Some(DemandScenario::ProgressiveChange)
            }
            "GREEN_ENERGY_EXPORTS" | "HYDROGEN_EXPORT" | "Green Energy Exports"
            | "Green_Energy_Exports" => Some(DemandScenario::GreenEnergyExports),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DemandScenario::StepChange => "Step Change",
            DemandScenario::ProgressiveChange => "Progressive Change",
            DemandScenario::GreenEnergyExports => "Green Energy Exports",
        }
    }
}

impl fmt::Display for DemandScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
