//! Grid specifications for the drought archives.

use crate::{BoundingBox, Crs};
use serde::{Deserialize, Serialize};

/// One raster cell, addressed by row (north to south) and column (west to east).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCell {
    pub row: usize,
    pub col: usize,
}

impl GridCell {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

/// Specification of a regular north-up grid.
///
/// The affine transform is anchored at the north-west corner of the grid:
/// cell `(row, col)` covers `[origin_x + col*dx, origin_x + (col+1)*dx]`
/// horizontally and `[origin_y - (row+1)*dy, origin_y - row*dy]` vertically.
/// Data is stored row-major, top row first.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    /// Number of columns
    pub nx: usize,
    /// Number of rows
    pub ny: usize,
    /// West edge of the grid (degrees or meters depending on CRS)
    pub origin_x: f64,
    /// North edge of the grid
    pub origin_y: f64,
    /// Cell width
    pub dx: f64,
    /// Cell height (positive; rows run southward)
    pub dy: f64,
    /// Reference system of the transform
    #[serde(default)]
    pub crs: Crs,
}

impl GridSpec {
    /// Create a new grid specification.
    pub fn new(nx: usize, ny: usize, origin_x: f64, origin_y: f64, dx: f64, dy: f64, crs: Crs) -> Self {
        Self {
            nx,
            ny,
            origin_x,
            origin_y,
            dx,
            dy,
            crs,
        }
    }

    /// Geographic grid covering `bbox` with square cells of `resolution` degrees.
    pub fn geographic(bbox: BoundingBox, resolution: f64) -> Self {
        let nx = (bbox.width() / resolution).round().max(1.0) as usize;
        let ny = (bbox.height() / resolution).round().max(1.0) as usize;
        Self::new(nx, ny, bbox.min_x, bbox.max_y, resolution, resolution, Crs::Geographic)
    }

    /// Grid covering `bbox` in an arbitrary CRS, snapped outward to whole cells.
    pub fn covering(bbox: BoundingBox, cell_size: f64, crs: Crs) -> Self {
        let nx = (bbox.width() / cell_size).ceil().max(1.0) as usize;
        let ny = (bbox.height() / cell_size).ceil().max(1.0) as usize;
        Self::new(nx, ny, bbox.min_x, bbox.max_y, cell_size, cell_size, crs)
    }

    /// GDAL-style affine transform `[x0, dx, 0, y0, 0, -dy]`.
    pub fn transform(&self) -> [f64; 6] {
        [self.origin_x, self.dx, 0.0, self.origin_y, 0.0, -self.dy]
    }

    /// Calculate the bounding box of this grid (outer cell edges).
    pub fn bbox(&self) -> BoundingBox {
        BoundingBox::new(
            self.origin_x,
            self.origin_y - self.ny as f64 * self.dy,
            self.origin_x + self.nx as f64 * self.dx,
            self.origin_y,
        )
    }

    /// Coordinates of a cell center as `(x, y)` (lon/lat for geographic grids).
    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        (
            self.origin_x + (col as f64 + 0.5) * self.dx,
            self.origin_y - (row as f64 + 0.5) * self.dy,
        )
    }

    /// The cell containing a coordinate, or `None` outside the grid or for
    /// non-finite input.
    pub fn cell_at(&self, x: f64, y: f64) -> Option<GridCell> {
        if !x.is_finite() || !y.is_finite() {
            return None;
        }
        let col = ((x - self.origin_x) / self.dx).floor();
        let row = ((self.origin_y - y) / self.dy).floor();

        if col < 0.0 || row < 0.0 || col >= self.nx as f64 || row >= self.ny as f64 {
            return None;
        }

        Some(GridCell::new(row as usize, col as usize))
    }

    /// Fractional `(col, row)` position of a coordinate, measured between
    /// cell centers (cell `(0, 0)` center maps to `(0.0, 0.0)`).
    pub fn fractional_index(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.origin_x) / self.dx - 0.5,
            (self.origin_y - y) / self.dy - 0.5,
        )
    }

    /// Get the 1D array index for a 2D grid position.
    pub fn flat_index(&self, row: usize, col: usize) -> usize {
        row * self.nx + col
    }

    /// Inverse of [`GridSpec::flat_index`].
    pub fn cell_of(&self, flat: usize) -> GridCell {
        GridCell::new(flat / self.nx, flat % self.nx)
    }

    /// Total number of grid points.
    pub fn len(&self) -> usize {
        self.nx * self.ny
    }

    /// Check if grid is empty.
    pub fn is_empty(&self) -> bool {
        self.nx == 0 || self.ny == 0
    }

    /// Same shape and CRS (transforms may still differ by rounding).
    pub fn is_aligned_with(&self, other: &GridSpec) -> bool {
        self.nx == other.nx && self.ny == other.ny && self.crs == other.crs
    }
}

/// Well-known grid extents.
pub mod grids {
    use super::*;

    /// Contiguous US extent used by the published archives.
    pub fn conus_bbox() -> BoundingBox {
        BoundingBox::new(-130.0, 20.0, -55.0, 50.0)
    }

    /// Geographic CONUS grid at the given resolution in degrees.
    pub fn conus(resolution: f64) -> GridSpec {
        GridSpec::geographic(conus_bbox(), resolution)
    }
}
