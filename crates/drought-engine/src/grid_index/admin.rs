//! Administrative units (counties, states) and their rasterized membership.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use drought_common::GridSpec;
use serde::{Deserialize, Serialize};

use crate::dataset::read_raster_2d;
use crate::error::{EngineError, Result};

/// Attribute of the admin polygon layer to burn into a raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminField {
    CountyFips,
    StateFips,
}

impl AdminField {
    fn artifact_name(&self) -> &'static str {
        match self {
            AdminField::CountyFips => "county_fips.zarr",
            AdminField::StateFips => "state_fips.zarr",
        }
    }
}

/// One county row of the admin table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminUnit {
    /// Five-digit county fips as an integer (state * 1000 + county).
    pub fips: u32,
    pub state_fips: u32,
    pub county: String,
    pub state: String,
    pub state_abbr: String,
    /// Display name, e.g. "Aroostook County, ME".
    pub place: String,
}

/// County records keyed by fips.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<AdminUnit>", into = "Vec<AdminUnit>")]
pub struct AdminTable {
    units: Vec<AdminUnit>,
    by_fips: HashMap<u32, usize>,
}

impl AdminTable {
    pub fn new(units: Vec<AdminUnit>) -> Self {
        let by_fips = units.iter().enumerate().map(|(i, u)| (u.fips, i)).collect();
        Self { units, by_fips }
    }

    /// Load the table from its JSON artifact (a list of [`AdminUnit`]).
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(EngineError::missing_artifact(format!("admin table {}", path.display())));
        }
        let text = std::fs::read_to_string(path)?;
        let units: Vec<AdminUnit> = serde_json::from_str(&text)?;
        Ok(Self::new(units))
    }

    pub fn county(&self, fips: u32) -> Option<&AdminUnit> {
        self.by_fips.get(&fips).map(|&i| &self.units[i])
    }

    pub fn units(&self) -> &[AdminUnit] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    fn state_unit(&self, state_fips: u32) -> Option<&AdminUnit> {
        self.units.iter().find(|u| u.state_fips == state_fips)
    }

    pub fn state_name(&self, state_fips: u32) -> Option<&str> {
        self.state_unit(state_fips).map(|u| u.state.as_str())
    }

    pub fn state_abbr(&self, state_fips: u32) -> Option<&str> {
        self.state_unit(state_fips).map(|u| u.state_abbr.as_str())
    }

    /// Resolve a state by abbreviation or full name (case-insensitive).
    pub fn state_fips(&self, name: &str) -> Option<u32> {
        let name = name.trim();
        self.units
            .iter()
            .find(|u| u.state_abbr.eq_ignore_ascii_case(name) || u.state.eq_ignore_ascii_case(name))
            .map(|u| u.state_fips)
    }
}

impl From<Vec<AdminUnit>> for AdminTable {
    fn from(units: Vec<AdminUnit>) -> Self {
        Self::new(units)
    }
}

impl From<AdminTable> for Vec<AdminUnit> {
    fn from(table: AdminTable) -> Self {
        table.units
    }
}

/// Source of rasterized administrative boundaries.
///
/// Rasters are row-major on the requested grid; `None` marks cells outside
/// every polygon.
pub trait AdminRasterizer: Send + Sync {
    fn rasterize(&self, field: AdminField, grid: &GridSpec) -> Result<Vec<Option<u32>>>;

    fn admin_table(&self) -> Result<AdminTable>;
}

/// Admin rasters produced by the deployment pipeline.
///
/// `<dir>/county_fips.zarr` and `<dir>/state_fips.zarr` are 2-D float
/// rasters (NaN outside polygons); `<dir>/admin_table.json` lists counties.
#[derive(Debug, Clone)]
pub struct StoredAdminRasters {
    dir: PathBuf,
}

impl StoredAdminRasters {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl AdminRasterizer for StoredAdminRasters {
    fn rasterize(&self, field: AdminField, grid: &GridSpec) -> Result<Vec<Option<u32>>> {
        let path = self.dir.join(field.artifact_name());
        let (stored, data) = read_raster_2d(&path)?;

        if !stored.is_aligned_with(grid) {
            return Err(EngineError::grid_mismatch(format!(
                "{} is {}x{}, grid index expects {}x{}",
                path.display(),
                stored.nx,
                stored.ny,
                grid.nx,
                grid.ny
            )));
        }

        Ok(data
            .into_iter()
            .map(|v| if v.is_finite() && v > 0.0 { Some(v as u32) } else { None })
            .collect())
    }

    fn admin_table(&self) -> Result<AdminTable> {
        AdminTable::load(&self.dir.join("admin_table.json"))
    }
}

/// Admin rasters already in memory, for a fixed grid.
#[derive(Debug, Clone)]
pub struct MemoryAdminRasters {
    pub grid: GridSpec,
    pub county: Vec<Option<u32>>,
    pub state: Vec<Option<u32>>,
    pub table: AdminTable,
}

impl AdminRasterizer for MemoryAdminRasters {
    fn rasterize(&self, field: AdminField, grid: &GridSpec) -> Result<Vec<Option<u32>>> {
        if !self.grid.is_aligned_with(grid) {
            return Err(EngineError::grid_mismatch("admin rasters are on a different grid"));
        }
        Ok(match field {
            AdminField::CountyFips => self.county.clone(),
            AdminField::StateFips => self.state.clone(),
        })
    }

    fn admin_table(&self) -> Result<AdminTable> {
        Ok(self.table.clone())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::writer::write_raster_2d;
    use drought_common::Crs;

    pub(crate) fn unit(fips: u32, county: &str, state: &str, abbr: &str) -> AdminUnit {
        AdminUnit {
            fips,
            state_fips: fips / 1000,
            county: county.to_string(),
            state: state.to_string(),
            state_abbr: abbr.to_string(),
            place: format!("{}, {}", county, abbr),
        }
    }

    pub(crate) fn sample_table() -> AdminTable {
        AdminTable::new(vec![
            unit(23003, "Aroostook County", "Maine", "ME"),
            unit(23019, "Penobscot County", "Maine", "ME"),
            unit(33007, "Coos County", "New Hampshire", "NH"),
        ])
    }

    #[test]
    fn test_table_lookups() {
        let table = sample_table();
        assert_eq!(table.county(23003).unwrap().place, "Aroostook County, ME");
        assert_eq!(table.state_fips("me"), Some(23));
        assert_eq!(table.state_fips("New Hampshire"), Some(33));
        assert_eq!(table.state_abbr(33), Some("NH"));
        assert_eq!(table.state_fips("Texas"), None);
    }

    #[test]
    fn test_table_json_is_a_list() {
        let json = serde_json::to_string(&sample_table()).unwrap();
        assert!(json.starts_with('['));
        let back: AdminTable = serde_json::from_str(&json).unwrap();
        assert_eq!(back.county(33007).unwrap().county, "Coos County");
    }

    #[test]
    fn test_stored_rasters() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let grid = GridSpec::new(2, 2, -70.0, 47.0, 1.0, 1.0, Crs::Geographic);

        write_raster_2d(
            &temp_dir.path().join("county_fips.zarr"),
            &grid,
            &[23003.0, f32::NAN, 23019.0, 33007.0],
        )
        .unwrap();

        let admin = StoredAdminRasters::new(temp_dir.path());
        let county = admin.rasterize(AdminField::CountyFips, &grid).unwrap();
        assert_eq!(county, vec![Some(23003), None, Some(23019), Some(33007)]);

        let err = admin.rasterize(AdminField::StateFips, &grid).unwrap_err();
        assert!(matches!(err, EngineError::MissingArtifact(_)));

        let other = GridSpec::new(3, 2, -70.0, 47.0, 1.0, 1.0, Crs::Geographic);
        let err = admin.rasterize(AdminField::CountyFips, &other).unwrap_err();
        assert!(matches!(err, EngineError::GridMismatch(_)));

        assert!(matches!(admin.admin_table(), Err(EngineError::MissingArtifact(_))));
    }
}
