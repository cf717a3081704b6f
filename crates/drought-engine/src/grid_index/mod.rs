//! Static spatial reference of the archive grid.
//!
//! For one resolution the grid index holds the county and state membership
//! of every cell, the land mask, the dense grid id raster, the NW-to-SE
//! gradient raster used to order multi-cell labels, both grid templates,
//! and the coordinate lookup.
//!
//! Grid ids are assigned once and persisted: location labels key off them,
//! so they must not change between runs.

pub mod admin;
pub mod lookup;

use std::path::{Path, PathBuf};

use drought_common::grid::grids;
use drought_common::{AlbersParams, BoundingBox, GridCell, GridSpec};
use projection::equal_area_template;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

pub use admin::{AdminField, AdminRasterizer, AdminTable, AdminUnit, MemoryAdminRasters, StoredAdminRasters};
pub use lookup::CoordinateLookup;

/// Everything the resolver and the area statistics need to know about the grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridElements {
    /// Cell size of the geographic grid in degrees.
    pub resolution: f64,
    /// Geographic grid of the archive cubes.
    pub source_template: GridSpec,
    /// Equal-area grid used for area fractions.
    pub equal_area_template: GridSpec,
    pub state: Vec<Option<u32>>,
    pub county: Vec<Option<u32>>,
    pub grid_id: Vec<Option<u32>>,
    /// Cells inside some county.
    pub land_mask: Vec<bool>,
    /// `row * col` per cell; smallest is north-west, largest south-east.
    pub gradient: Vec<u64>,
    pub admin: AdminTable,
    #[serde(skip)]
    lookup: CoordinateLookup,
}

impl GridElements {
    /// Rasterize the admin layers onto `source_template` and derive the rest.
    pub fn build(
        source_template: GridSpec,
        rasterizer: &dyn AdminRasterizer,
        equal_area_cell_m: f64,
        albers: AlbersParams,
    ) -> Result<Self> {
        let county = rasterizer.rasterize(AdminField::CountyFips, &source_template)?;
        let state = rasterizer.rasterize(AdminField::StateFips, &source_template)?;
        let admin = rasterizer.admin_table()?;

        for (name, raster) in [("county", &county), ("state", &state)] {
            if raster.len() != source_template.len() {
                return Err(EngineError::grid_mismatch(format!(
                    "{} raster has {} cells, grid has {}",
                    name,
                    raster.len(),
                    source_template.len()
                )));
            }
        }

        let land_mask: Vec<bool> = county.iter().map(Option::is_some).collect();
        let grid_id = assign_grid_ids(&land_mask);
        let gradient = (0..source_template.len())
            .map(|flat| {
                let cell = source_template.cell_of(flat);
                (cell.row * cell.col) as u64
            })
            .collect();

        let equal_area_template = equal_area_template(&source_template, albers, equal_area_cell_m)?;
        let lookup = CoordinateLookup::new(&source_template, &grid_id);

        tracing::info!(
            cols = source_template.nx,
            rows = source_template.ny,
            land_cells = lookup.len(),
            counties = admin.len(),
            "Built grid index"
        );

        Ok(Self {
            resolution: source_template.dx,
            source_template,
            equal_area_template,
            state,
            county,
            grid_id,
            land_mask,
            gradient,
            admin,
            lookup,
        })
    }

    pub fn lookup(&self) -> &CoordinateLookup {
        &self.lookup
    }

    fn rebuild_lookup(&mut self) {
        self.lookup = CoordinateLookup::new(&self.source_template, &self.grid_id);
    }

    /// Land cells in row-major order.
    pub fn land_cells(&self) -> Vec<GridCell> {
        self.land_mask
            .iter()
            .enumerate()
            .filter(|&(_, &land)| land)
            .map(|(flat, _)| self.source_template.cell_of(flat))
            .collect()
    }

    pub fn is_land(&self, cell: GridCell) -> bool {
        self.flat(cell).map(|i| self.land_mask[i]).unwrap_or(false)
    }

    /// Cells of one county, row-major.
    pub fn county_cells(&self, fips: u32) -> Vec<GridCell> {
        self.cells_where(&self.county, |v| v == fips)
    }

    /// Cells of any of the given states, row-major.
    pub fn state_cells(&self, state_fips: &[u32]) -> Vec<GridCell> {
        self.cells_where(&self.state, |v| state_fips.contains(&v))
    }

    fn cells_where(&self, raster: &[Option<u32>], pred: impl Fn(u32) -> bool) -> Vec<GridCell> {
        raster
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_some_and(&pred))
            .map(|(flat, _)| self.source_template.cell_of(flat))
            .collect()
    }

    pub fn county_at(&self, cell: GridCell) -> Option<u32> {
        self.flat(cell).and_then(|i| self.county[i])
    }

    /// Display name of the county containing a cell.
    pub fn place_of(&self, cell: GridCell) -> Option<&str> {
        self.county_at(cell)
            .and_then(|fips| self.admin.county(fips))
            .map(|unit| unit.place.as_str())
    }

    pub fn gradient_at(&self, cell: GridCell) -> Option<u64> {
        self.flat(cell).map(|i| self.gradient[i])
    }

    /// Row-major land mask restricted to `cells`.
    pub fn mask_for(&self, cells: &[GridCell]) -> Vec<bool> {
        let mut mask = vec![false; self.source_template.len()];
        for cell in cells {
            if let Some(i) = self.flat(*cell) {
                mask[i] = true;
            }
        }
        mask
    }

    fn flat(&self, cell: GridCell) -> Option<usize> {
        let grid = &self.source_template;
        (cell.row < grid.ny && cell.col < grid.nx).then(|| grid.flat_index(cell.row, cell.col))
    }
}

/// Dense ids over land cells: the row-major k-th land cell of N gets `N - k`.
pub fn assign_grid_ids(land_mask: &[bool]) -> Vec<Option<u32>> {
    let total = land_mask.iter().filter(|&&land| land).count() as u32;
    let mut k = 0u32;
    land_mask
        .iter()
        .map(|&land| {
            if land {
                let id = total - k;
                k += 1;
                Some(id)
            } else {
                None
            }
        })
        .collect()
}

/// Persisted grid indices, one JSON artifact per resolution.
#[derive(Debug, Clone)]
pub struct GridIndexStore {
    dir: PathBuf,
    domain: BoundingBox,
    equal_area_cell_m: f64,
    albers: AlbersParams,
}

impl GridIndexStore {
    pub fn new(dir: impl Into<PathBuf>, equal_area_cell_m: f64) -> Self {
        Self {
            dir: dir.into(),
            domain: grids::conus_bbox(),
            equal_area_cell_m,
            albers: AlbersParams::conus(),
        }
    }

    /// Use a geographic extent other than CONUS.
    pub fn with_domain(mut self, domain: BoundingBox) -> Self {
        self.domain = domain;
        self
    }

    pub fn with_albers(mut self, albers: AlbersParams) -> Self {
        self.albers = albers;
        self
    }

    pub fn source_template(&self, resolution: f64) -> GridSpec {
        GridSpec::geographic(self.domain, resolution)
    }

    pub fn path_for(&self, resolution: f64) -> PathBuf {
        self.dir.join(format!("grid_index_{}.json", resolution))
    }

    /// Load the index for `resolution`, building and persisting it on first use.
    pub fn elements(&self, resolution: f64, rasterizer: &dyn AdminRasterizer) -> Result<GridElements> {
        let path = self.path_for(resolution);
        if path.exists() {
            return Self::load(&path);
        }

        tracing::info!(resolution = resolution, path = %path.display(), "Grid index not found, building");
        let elements = GridElements::build(
            self.source_template(resolution),
            rasterizer,
            self.equal_area_cell_m,
            self.albers,
        )?;
        self.persist(&path, &elements)?;
        Ok(elements)
    }

    /// Rebuild and overwrite the persisted index.
    pub fn rebuild(&self, resolution: f64, rasterizer: &dyn AdminRasterizer) -> Result<GridElements> {
        let elements = GridElements::build(
            self.source_template(resolution),
            rasterizer,
            self.equal_area_cell_m,
            self.albers,
        )?;
        self.persist(&self.path_for(resolution), &elements)?;
        Ok(elements)
    }

    pub fn load(path: &Path) -> Result<GridElements> {
        if !path.exists() {
            return Err(EngineError::missing_artifact(format!("grid index {}", path.display())));
        }
        let text = std::fs::read_to_string(path)?;
        let mut elements: GridElements = serde_json::from_str(&text)?;

        if elements.grid_id.len() != elements.source_template.len() {
            return Err(EngineError::invalid_metadata(format!(
                "{}: grid id raster does not match its template",
                path.display()
            )));
        }
        elements.rebuild_lookup();

        tracing::info!(path = %path.display(), land_cells = elements.lookup.len(), "Loaded grid index");
        Ok(elements)
    }

    fn persist(&self, path: &Path, elements: &GridElements) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(path, serde_json::to_vec(elements)?)?;
        tracing::debug!(path = %path.display(), "Persisted grid index");
        Ok(())
    }
}
