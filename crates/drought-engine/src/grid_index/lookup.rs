//! Constant-time lookups between coordinates, cells and grid ids.

use std::collections::HashMap;

use drought_common::{GridCell, GridSpec};

/// Bidirectional `(lon, lat)` / `(row, col)` / grid id lookup.
///
/// Coordinate to cell is plain transform arithmetic; cell to id and id to
/// cell go through hash maps built once from the grid id raster.
#[derive(Debug, Clone, Default)]
pub struct CoordinateLookup {
    grid: Option<GridSpec>,
    cell_to_id: HashMap<GridCell, u32>,
    id_to_cell: HashMap<u32, GridCell>,
}

impl CoordinateLookup {
    pub fn new(grid: &GridSpec, grid_ids: &[Option<u32>]) -> Self {
        let mut cell_to_id = HashMap::with_capacity(grid_ids.len());
        let mut id_to_cell = HashMap::with_capacity(grid_ids.len());

        for (flat, id) in grid_ids.iter().enumerate() {
            if let Some(id) = *id {
                let cell = grid.cell_of(flat);
                cell_to_id.insert(cell, id);
                id_to_cell.insert(id, cell);
            }
        }

        Self {
            grid: Some(*grid),
            cell_to_id,
            id_to_cell,
        }
    }

    /// Cell containing a geographic coordinate, if inside the grid.
    pub fn cell_at(&self, lon: f64, lat: f64) -> Option<GridCell> {
        self.grid.as_ref()?.cell_at(lon, lat)
    }

    /// Center of a cell as `(lon, lat)`.
    pub fn coord_of(&self, cell: GridCell) -> Option<(f64, f64)> {
        let grid = self.grid.as_ref()?;
        if cell.row >= grid.ny || cell.col >= grid.nx {
            return None;
        }
        Some(grid.cell_center(cell.row, cell.col))
    }

    /// Grid id of a cell; `None` off land.
    pub fn id_of(&self, cell: GridCell) -> Option<u32> {
        self.cell_to_id.get(&cell).copied()
    }

    pub fn cell_of(&self, id: u32) -> Option<GridCell> {
        self.id_to_cell.get(&id).copied()
    }

    /// Grid id at a geographic coordinate.
    pub fn id_at(&self, lon: f64, lat: f64) -> Option<u32> {
        self.cell_at(lon, lat).and_then(|cell| self.id_of(cell))
    }

    pub fn len(&self) -> usize {
        self.id_to_cell.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_cell.is_empty()
    }
}
