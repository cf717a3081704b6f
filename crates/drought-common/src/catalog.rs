//! Static catalog of the published drought indices.
//!
//! Every index is mapped to its [`IndexFamily`] here, once. Code that needs
//! family-specific behavior (category thresholds, sign conventions, display
//! ranges) dispatches on the family instead of inspecting index names.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DroughtError, DroughtResult};

/// Scale families sharing threshold tables and sign conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexFamily {
    /// Standardized precipitation (and evapotranspiration) indices.
    SpiSpei,
    /// Evaporative demand; positive values mean drier conditions.
    Eddi,
    /// Palmer indices.
    Pdsi,
    /// Landscape evaporative response, published as percentiles.
    Leri,
}

macro_rules! drought_indices {
    ($( $variant:ident => $name:literal, $family:ident, $label:literal; )+) => {
        /// One of the published drought index rasters.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum DroughtIndex {
            $( $variant, )+
        }

        impl DroughtIndex {
            /// Every catalogued index, in display order.
            pub const ALL: &'static [DroughtIndex] = &[ $( DroughtIndex::$variant, )+ ];

            /// Short archive name, e.g. `"spei3"`.
            pub fn name(&self) -> &'static str {
                match self {
                    $( DroughtIndex::$variant => $name, )+
                }
            }

            pub fn family(&self) -> IndexFamily {
                match self {
                    $( DroughtIndex::$variant => IndexFamily::$family, )+
                }
            }

            /// Human-readable label.
            pub fn label(&self) -> &'static str {
                match self {
                    $( DroughtIndex::$variant => $label, )+
                }
            }
        }

        impl FromStr for DroughtIndex {
            type Err = DroughtError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $( $name => Ok(DroughtIndex::$variant), )+
                    other => Err(DroughtError::UnknownIndex(other.to_string())),
                }
            }
        }
    };
}

drought_indices! {
    Pdsi => "pdsi", Pdsi, "Palmer Drought Severity Index";
    Scpdsi => "scpdsi", Pdsi, "Self-Calibrated Palmer Drought Severity Index";
    Pzi => "pzi", Pdsi, "Palmer Z-Index";
    Spi1 => "spi1", SpiSpei, "Standardized Precipitation Index - 1 month";
    Spi2 => "spi2", SpiSpei, "Standardized Precipitation Index - 2 month";
    Spi3 => "spi3", SpiSpei, "Standardized Precipitation Index - 3 month";
    Spi6 => "spi6", SpiSpei, "Standardized Precipitation Index - 6 month";
    Spei1 => "spei1", SpiSpei, "Standardized Precipitation-Evapotranspiration Index - 1 month";
    Spei2 => "spei2", SpiSpei, "Standardized Precipitation-Evapotranspiration Index - 2 month";
    Spei3 => "spei3", SpiSpei, "Standardized Precipitation-Evapotranspiration Index - 3 month";
    Spei6 => "spei6", SpiSpei, "Standardized Precipitation-Evapotranspiration Index - 6 month";
    Eddi1 => "eddi1", Eddi, "Evaporative Demand Drought Index - 1 month";
    Eddi2 => "eddi2", Eddi, "Evaporative Demand Drought Index - 2 month";
    Eddi3 => "eddi3", Eddi, "Evaporative Demand Drought Index - 3 month";
    Eddi6 => "eddi6", Eddi, "Evaporative Demand Drought Index - 6 month";
    Leri1 => "leri1", Leri, "Landscape Evaporative Response Index - 1 month";
    Leri3 => "leri3", Leri, "Landscape Evaporative Response Index - 3 month";
}

impl fmt::Display for DroughtIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which transform of an index a cube holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSpace {
    /// Index values as published.
    Raw,
    /// Per-cell percentile ranks (0-100) of the raw values.
    Percentile,
    /// Raw values resampled onto the equal-area grid.
    EqualAreaProjected,
}

impl ValueSpace {
    /// Directory name of this value space inside the archive root.
    pub fn dir_name(&self) -> &'static str {
        match self {
            ValueSpace::Raw => "raw",
            ValueSpace::Percentile => "percentile",
            ValueSpace::EqualAreaProjected => "albers",
        }
    }
}

impl FromStr for ValueSpace {
    type Err = DroughtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "raw" | "original" => Ok(ValueSpace::Raw),
            "percentile" | "percentiles" => Ok(ValueSpace::Percentile),
            "albers" | "equal_area" | "equal_area_projected" => Ok(ValueSpace::EqualAreaProjected),
            other => Err(DroughtError::UnknownValueSpace(other.to_string())),
        }
    }
}

impl fmt::Display for ValueSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Observed value range of an index across the whole archive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Range centered on zero that covers both extremes.
    pub fn symmetric(&self) -> Self {
        let bound = self.min.abs().max(self.max.abs());
        Self::new(-bound, bound)
    }
}

/// Process-wide lookup tables, built once at startup and shared by reference.
#[derive(Debug, Clone)]
pub struct StaticCatalog {
    ranges: HashMap<DroughtIndex, ValueRange>,
}

impl StaticCatalog {
    /// Catalog with the archive-wide ranges of the current deployment.
    pub fn new() -> Self {
        let table: &[(DroughtIndex, f64, f64)] = &[
            (DroughtIndex::Pdsi, -9.66, 12.55),
            (DroughtIndex::Scpdsi, -6.37, 8.99),
            (DroughtIndex::Pzi, -7.54, 16.42),
            (DroughtIndex::Spi1, -3.09, 3.09),
            (DroughtIndex::Spi2, -3.09, 3.09),
            (DroughtIndex::Spi3, -3.09, 3.09),
            (DroughtIndex::Spi6, -3.09, 3.09),
            (DroughtIndex::Spei1, -3.09, 3.09),
            (DroughtIndex::Spei2, -3.09, 3.09),
            (DroughtIndex::Spei3, -3.09, 3.09),
            (DroughtIndex::Spei6, -3.09, 3.09),
            (DroughtIndex::Eddi1, -2.51, 2.58),
            (DroughtIndex::Eddi2, -2.51, 2.58),
            (DroughtIndex::Eddi3, -2.51, 2.58),
            (DroughtIndex::Eddi6, -2.51, 2.58),
            (DroughtIndex::Leri1, 0.0, 100.0),
            (DroughtIndex::Leri3, 0.0, 100.0),
        ];

        let ranges = table
            .iter()
            .map(|&(index, min, max)| (index, ValueRange::new(min, max)))
            .collect();

        Self { ranges }
    }

    /// Replace ranges with those of a JSON table `{"pdsi": [min, max], ...}`.
    ///
    /// Indices missing from the table keep their built-in range.
    pub fn with_range_table(mut self, path: &Path) -> DroughtResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let raw: HashMap<String, (f64, f64)> = serde_json::from_str(&text)?;
        for (name, (min, max)) in raw {
            let index: DroughtIndex = name.parse()?;
            if !(min <= max) {
                return Err(DroughtError::RangeTable(format!(
                    "{}: min {} > max {}",
                    name, min, max
                )));
            }
            self.ranges.insert(index, ValueRange::new(min, max));
        }
        Ok(self)
    }

    /// Raw archive range of an index.
    pub fn range(&self, index: DroughtIndex) -> ValueRange {
        self.ranges
            .get(&index)
            .copied()
            .unwrap_or(ValueRange::new(-1.0, 1.0))
    }

    /// Color-scale bounds for an index in a value space.
    ///
    /// Percentile data and LERI are always 0-100; everything else is
    /// symmetric about zero so colors mean the same thing across queries.
    pub fn display_range(&self, index: DroughtIndex, space: ValueSpace) -> ValueRange {
        if space == ValueSpace::Percentile || index.family() == IndexFamily::Leri {
            return ValueRange::new(0.0, 100.0);
        }
        self.range(index).symmetric()
    }

    /// EDDI grows with dryness, so its color scale runs the other way.
    pub fn reversed_scale(&self, index: DroughtIndex) -> bool {
        index.family() == IndexFamily::Eddi
    }

    pub fn indices(&self) -> &'static [DroughtIndex] {
        DroughtIndex::ALL
    }
}

impl Default for StaticCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_has_seventeen_indices() {
        assert_eq!(DroughtIndex::ALL.len(), 17);
    }

    #[test]
    fn test_parse_index_names() {
        assert_eq!("SPEI3".parse::<DroughtIndex>().unwrap(), DroughtIndex::Spei3);
        assert_eq!("pdsi".parse::<DroughtIndex>().unwrap(), DroughtIndex::Pdsi);
        assert!("spi9".parse::<DroughtIndex>().is_err());
        for index in DroughtIndex::ALL {
            assert_eq!(index.name().parse::<DroughtIndex>().unwrap(), *index);
        }
    }

    #[test]
    fn test_families() {
        assert_eq!(DroughtIndex::Spei6.family(), IndexFamily::SpiSpei);
        assert_eq!(DroughtIndex::Eddi1.family(), IndexFamily::Eddi);
        assert_eq!(DroughtIndex::Scpdsi.family(), IndexFamily::Pdsi);
        assert_eq!(DroughtIndex::Pzi.family(), IndexFamily::Pdsi);
        assert_eq!(DroughtIndex::Leri3.family(), IndexFamily::Leri);
    }

    #[test]
    fn test_display_ranges() {
        let catalog = StaticCatalog::new();

        let pdsi = catalog.display_range(DroughtIndex::Pdsi, ValueSpace::Raw);
        assert_eq!(pdsi.min, -pdsi.max);
        assert!((pdsi.max - 12.55).abs() < 1e-9);

        let pct = catalog.display_range(DroughtIndex::Spi1, ValueSpace::Percentile);
        assert_eq!(pct, ValueRange::new(0.0, 100.0));

        let leri = catalog.display_range(DroughtIndex::Leri1, ValueSpace::Raw);
        assert_eq!(leri, ValueRange::new(0.0, 100.0));
    }

    #[test]
    fn test_reversed_scale_only_for_eddi() {
        let catalog = StaticCatalog::new();
        assert!(catalog.reversed_scale(DroughtIndex::Eddi2));
        assert!(!catalog.reversed_scale(DroughtIndex::Spi2));
    }

    #[test]
    fn test_value_space_parse() {
        assert_eq!("albers".parse::<ValueSpace>().unwrap(), ValueSpace::EqualAreaProjected);
        assert_eq!(ValueSpace::Percentile.dir_name(), "percentile");
        assert!("mercator".parse::<ValueSpace>().is_err());
    }
}
