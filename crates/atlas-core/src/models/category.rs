use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AtlasError;

/// Feature category, one per target table slice in the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Boundaries,
    AdministrativeDistricts,
    EmissionSources,
    Landfills,
    GasPipelines,
    GroundwaterProtection,
    ConservationAreas,
    SettlementAreas,
    TransportLines,
}

impl Category {
    /// Every category, in import order
    pub const ALL: [Category; 9] = [
        Category::Boundaries,
        Category::AdministrativeDistricts,
        Category::EmissionSources,
        Category::Landfills,
        Category::GasPipelines,
        Category::GroundwaterProtection,
        Category::ConservationAreas,
        Category::SettlementAreas,
        Category::TransportLines,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Boundaries => "boundaries",
            Category::AdministrativeDistricts => "administrative_districts",
            Category::EmissionSources => "emission_sources",
            Category::Landfills => "landfills",
            Category::GasPipelines => "gas_pipelines",
            Category::GroundwaterProtection => "groundwater_protection",
            Category::ConservationAreas => "conservation_areas",
            Category::SettlementAreas => "settlement_areas",
            Category::TransportLines => "transport_lines",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = AtlasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Category::ALL.into_iter().find(|c| c.as_str() == normalized).ok_or_else(|| {
            AtlasError::ConfigInvalid {
                key: "category".to_string(),
                reason: format!(
                    "Unknown category: {}. Use one of: {}",
                    s,
                    Category::ALL.iter().map(|c| c.as_str()).collect::<Vec<_>>().join(", ")
                ),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_category() {
        assert_eq!("landfills".parse::<Category>().unwrap(), Category::Landfills);
        assert_eq!(
            "Groundwater-Protection".parse::<Category>().unwrap(),
            Category::GroundwaterProtection
        );
        assert!("airports".parse::<Category>().is_err());
    }

    #[test]
    fn test_serde_uses_snake_case() {
        let json = serde_json::to_string(&Category::EmissionSources).unwrap();
        assert_eq!(json, "\"emission_sources\"");
    }
}
