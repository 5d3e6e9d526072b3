//! Column allow-lists for the profile tables.
//!
//! Handlers never splice caller text into SQL; a variable name reaches a
//! statement only through one of these enums.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Core CTD variable stored on every `profiles` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum OceanVariable {
    Temperature,
    Salinity,
}

impl OceanVariable {
    /// Column identifier in `profiles`.
    pub fn column(&self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Salinity => "salinity",
        }
    }
}

impl std::fmt::Display for OceanVariable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.column())
    }
}

/// Biogeochemical variable names accepted by the BGC summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum BgcVariable {
    #[serde(rename = "oxygen")]
    Oxygen,
    #[serde(rename = "NO3")]
    No3,
    #[serde(rename = "CHLA")]
    Chla,
    #[serde(rename = "temperature")]
    Temperature,
    #[serde(rename = "salinity")]
    Salinity,
}

impl BgcVariable {
    /// Column identifier in `profiles`.
    pub fn column(&self) -> &'static str {
        match self {
            Self::Oxygen => "oxygen",
            Self::No3 => "no3",
            Self::Chla => "chla",
            Self::Temperature => "temperature",
            Self::Salinity => "salinity",
        }
    }

    /// Name as the caller spelled it; used as the key in summaries.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Oxygen => "oxygen",
            Self::No3 => "NO3",
            Self::Chla => "CHLA",
            Self::Temperature => "temperature",
            Self::Salinity => "salinity",
        }
    }

    pub fn defaults() -> Vec<Self> {
        vec![Self::Oxygen, Self::No3, Self::Chla]
    }
}
