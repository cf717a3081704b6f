//! Selection resolver: user selection events to canonical cell sets.
//!
//! ```text
//! SelectionTrigger ──► SelectionResolver::resolve ──► SpatialSelection
//!   CountyPick            county raster == fips          County
//!   MapClick              coord → cell → grid id         SinglePoint
//!   Lasso                 points → land cells            MultiPoint | AllDomain
//!   StateList             state raster ∈ set             StateSet | AllDomain
//!   ShapefileUploaded     non-NaN mask cells             ShapefileMask | AllDomain
//! ```
//!
//! Selections that cover no cells fall back to [`Selection::AllDomain`].
//! Events that cannot be resolved at all return
//! [`EngineError::NoSelection`], which callers treat as "no update".

pub mod sync;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use drought_common::{GridCell, GridSpec};
use serde::{Deserialize, Serialize};

use crate::dataset::read_raster_2d;
use crate::error::{EngineError, Result};
use crate::grid_index::GridElements;

pub use sync::LocationStore;

/// Label of the whole-domain selection.
pub const ALL_DOMAIN_LABEL: &str = "Contiguous United States";

/// Label of an uploaded-shapefile selection.
pub const SHAPEFILE_LABEL: &str = "Shapefile Area";

/// Which geometry a selection came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionKind {
    AllDomain,
    SinglePoint,
    MultiPoint,
    County,
    StateSet,
    ShapefileMask,
}

/// The cells a query runs over.
///
/// Cell lists are sorted row-major and never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Selection {
    AllDomain,
    SinglePoint { cell: GridCell, grid_id: Option<u32> },
    MultiPoint { cells: Vec<GridCell> },
    County { fips: u32, cells: Vec<GridCell> },
    StateSet { state_fips: Vec<u32>, cells: Vec<GridCell> },
    ShapefileMask { cells: Vec<GridCell> },
}

impl Selection {
    pub fn kind(&self) -> SelectionKind {
        match self {
            Selection::AllDomain => SelectionKind::AllDomain,
            Selection::SinglePoint { .. } => SelectionKind::SinglePoint,
            Selection::MultiPoint { .. } => SelectionKind::MultiPoint,
            Selection::County { .. } => SelectionKind::County,
            Selection::StateSet { .. } => SelectionKind::StateSet,
            Selection::ShapefileMask { .. } => SelectionKind::ShapefileMask,
        }
    }

    /// Selected cells; empty for [`Selection::AllDomain`].
    pub fn cells(&self) -> &[GridCell] {
        match self {
            Selection::AllDomain => &[],
            Selection::SinglePoint { cell, .. } => std::slice::from_ref(cell),
            Selection::MultiPoint { cells }
            | Selection::County { cells, .. }
            | Selection::StateSet { cells, .. }
            | Selection::ShapefileMask { cells } => cells,
        }
    }

    pub fn is_all_domain(&self) -> bool {
        matches!(self, Selection::AllDomain)
    }
}

/// A resolved selection with its display label and originating control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialSelection {
    pub selection: Selection,
    pub label: String,
    /// Index of the control that produced the selection; see [`LocationStore`].
    pub origin: usize,
}

impl SpatialSelection {
    pub fn all_domain(origin: usize) -> Self {
        Self {
            selection: Selection::AllDomain,
            label: ALL_DOMAIN_LABEL.to_string(),
            origin,
        }
    }

    pub fn kind(&self) -> SelectionKind {
        self.selection.kind()
    }
}

/// A user selection event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "trigger", rename_all = "snake_case")]
pub enum SelectionTrigger {
    CountyPick { fips: u32 },
    MapClick { lon: f64, lat: f64 },
    /// Lasso or box select; `(lon, lat)` of every point inside.
    Lasso { points: Vec<(f64, f64)> },
    /// State names or abbreviations; `"all"` or an empty list selects everything.
    StateList { states: Vec<String> },
    /// The upload handler finished writing a rasterized mask.
    ShapefileUploaded { mask_path: PathBuf },
}

/// Resolves triggers against one grid index.
#[derive(Debug, Clone)]
pub struct SelectionResolver {
    elements: Arc<GridElements>,
}

impl SelectionResolver {
    pub fn new(elements: Arc<GridElements>) -> Self {
        Self { elements }
    }

    pub fn elements(&self) -> &GridElements {
        &self.elements
    }

    pub fn resolve(&self, trigger: &SelectionTrigger, origin: usize) -> Result<SpatialSelection> {
        let resolved = match trigger {
            SelectionTrigger::CountyPick { fips } => self.county(*fips, origin)?,
            SelectionTrigger::MapClick { lon, lat } => self.point(*lon, *lat, origin)?,
            SelectionTrigger::Lasso { points } => self.lasso(points, origin)?,
            SelectionTrigger::StateList { states } => self.states(states, origin)?,
            SelectionTrigger::ShapefileUploaded { mask_path } => self.shapefile(mask_path, origin)?,
        };

        tracing::debug!(
            kind = ?resolved.kind(),
            cells = resolved.selection.cells().len(),
            label = %resolved.label,
            origin = origin,
            "Resolved selection"
        );
        Ok(resolved)
    }

    fn county(&self, fips: u32, origin: usize) -> Result<SpatialSelection> {
        let unit = self
            .elements
            .admin
            .county(fips)
            .ok_or_else(|| EngineError::no_selection(format!("unknown county fips {}", fips)))?;

        let cells = self.elements.county_cells(fips);
        if cells.is_empty() {
            tracing::warn!(fips = fips, "County covers no grid cells, using whole domain");
            return Ok(SpatialSelection::all_domain(origin));
        }

        Ok(SpatialSelection {
            selection: Selection::County { fips, cells },
            label: unit.place.clone(),
            origin,
        })
    }

    fn point(&self, lon: f64, lat: f64, origin: usize) -> Result<SpatialSelection> {
        let lookup = self.elements.lookup();
        let cell = lookup
            .cell_at(lon, lat)
            .filter(|cell| self.elements.is_land(*cell))
            .ok_or_else(|| EngineError::no_selection(format!("no land cell at ({}, {})", lon, lat)))?;

        let grid_id = lookup.id_of(cell);
        let place = self.elements.place_of(cell).unwrap_or("Unknown");
        let label = match grid_id {
            Some(id) => format!("{} (grid {})", place, id),
            None => place.to_string(),
        };

        Ok(SpatialSelection {
            selection: Selection::SinglePoint { cell, grid_id },
            label,
            origin,
        })
    }

    fn lasso(&self, points: &[(f64, f64)], origin: usize) -> Result<SpatialSelection> {
        if points.is_empty() {
            return Err(EngineError::no_selection("lasso selection carries no points"));
        }

        let lookup = self.elements.lookup();
        let cells: BTreeSet<GridCell> = points
            .iter()
            .filter_map(|&(lon, lat)| lookup.cell_at(lon, lat))
            .filter(|cell| self.elements.is_land(*cell))
            .collect();

        if cells.is_empty() {
            tracing::info!(points = points.len(), "Lasso covers no land cells, using whole domain");
            return Ok(SpatialSelection::all_domain(origin));
        }

        let cells: Vec<GridCell> = cells.into_iter().collect();
        let label = self.span_label(&cells);

        Ok(SpatialSelection {
            selection: Selection::MultiPoint { cells },
            label,
            origin,
        })
    }

    /// "<north-west place> to <south-east place>", ranked by the gradient raster.
    fn span_label(&self, cells: &[GridCell]) -> String {
        let gradient = |cell: &&GridCell| self.elements.gradient_at(**cell).unwrap_or(0);
        let nw = cells.iter().min_by_key(gradient).and_then(|c| self.elements.place_of(*c));
        let se = cells.iter().max_by_key(gradient).and_then(|c| self.elements.place_of(*c));

        match (nw, se) {
            (Some(nw), Some(se)) if nw == se => nw.to_string(),
            (Some(nw), Some(se)) => format!("{} to {}", nw, se),
            (Some(place), None) | (None, Some(place)) => place.to_string(),
            (None, None) => "Selected Area".to_string(),
        }
    }

    fn states(&self, states: &[String], origin: usize) -> Result<SpatialSelection> {
        if states.is_empty() || states.iter().any(|s| s.trim().eq_ignore_ascii_case("all")) {
            return Ok(SpatialSelection::all_domain(origin));
        }

        let admin = &self.elements.admin;
        let mut state_fips = states
            .iter()
            .map(|name| {
                admin
                    .state_fips(name)
                    .ok_or_else(|| EngineError::no_selection(format!("unknown state '{}'", name)))
            })
            .collect::<Result<Vec<u32>>>()?;
        // same set, same selection
        state_fips.sort_unstable();
        state_fips.dedup();

        let cells = self.elements.state_cells(&state_fips);
        if cells.is_empty() {
            tracing::warn!(states = ?state_fips, "States cover no grid cells, using whole domain");
            return Ok(SpatialSelection::all_domain(origin));
        }

        let names: Vec<&str> = if state_fips.len() <= 3 {
            state_fips.iter().filter_map(|&f| admin.state_name(f)).collect()
        } else {
            state_fips.iter().filter_map(|&f| admin.state_abbr(f)).collect()
        };

        Ok(SpatialSelection {
            selection: Selection::StateSet { state_fips, cells },
            label: names.join(", "),
            origin,
        })
    }

    fn shapefile(&self, mask_path: &Path, origin: usize) -> Result<SpatialSelection> {
        let grid = &self.elements.source_template;
        let mask = read_mask_artifact(mask_path, grid)?;

        let cells: Vec<GridCell> = mask
            .iter()
            .enumerate()
            .filter(|&(_, &m)| m)
            .map(|(flat, _)| grid.cell_of(flat))
            .collect();

        if cells.is_empty() {
            tracing::info!(path = %mask_path.display(), "Uploaded mask is empty, using whole domain");
            return Ok(SpatialSelection::all_domain(origin));
        }

        Ok(SpatialSelection {
            selection: Selection::ShapefileMask { cells },
            label: SHAPEFILE_LABEL.to_string(),
            origin,
        })
    }
}

/// Read a rasterized upload mask; non-NaN cells are selected.
pub fn read_mask_artifact(path: &Path, grid: &GridSpec) -> Result<Vec<bool>> {
    let (stored, data) = read_raster_2d(path)?;
    if !stored.is_aligned_with(grid) {
        return Err(EngineError::grid_mismatch(format!(
            "mask {} is {}x{}, grid is {}x{}",
            path.display(),
            stored.nx,
            stored.ny,
            grid.nx,
            grid.ny
        )));
    }
    Ok(data.iter().map(|v| !v.is_nan()).collect())
}
