//! Point transforms between the grid reference systems in use.

use drought_common::{AlbersParams, BoundingBox, Crs, GridSpec};

use crate::albers::AlbersEqualArea;
use crate::error::ProjectionError;

/// Edge samples per side when projecting an extent.
const EXTENT_SAMPLES: usize = 64;

/// Converts coordinates of one [`Crs`] to and from geographic degrees.
#[derive(Debug, Clone)]
pub enum CrsTransform {
    Geographic,
    Albers(AlbersEqualArea),
}

impl CrsTransform {
    pub fn for_crs(crs: &Crs) -> Result<Self, ProjectionError> {
        match crs {
            Crs::Geographic => Ok(CrsTransform::Geographic),
            Crs::AlbersEqualArea(params) => Ok(CrsTransform::Albers(AlbersEqualArea::new(*params)?)),
        }
    }

    /// Native `(x, y)` to `(lon, lat)`.
    pub fn to_geographic(&self, x: f64, y: f64) -> Result<(f64, f64), ProjectionError> {
        match self {
            CrsTransform::Geographic => Ok((x, y)),
            CrsTransform::Albers(proj) => proj.inverse(x, y),
        }
    }

    /// `(lon, lat)` to native `(x, y)`.
    pub fn from_geographic(&self, lon: f64, lat: f64) -> (f64, f64) {
        match self {
            CrsTransform::Geographic => (lon, lat),
            CrsTransform::Albers(proj) => proj.forward(lon, lat),
        }
    }
}

/// Derive the equal-area grid covering a geographic grid.
///
/// The projected extent of `geographic` is snapped outward to whole
/// multiples of `cell_size` meters so that templates derived from the same
/// source grid always line up.
pub fn equal_area_template(
    geographic: &GridSpec,
    params: AlbersParams,
    cell_size: f64,
) -> Result<GridSpec, ProjectionError> {
    if !geographic.crs.is_geographic() {
        return Err(ProjectionError::InvalidParameters(format!(
            "equal-area template needs a geographic source grid, got {}",
            geographic.crs
        )));
    }
    if !(cell_size > 0.0) {
        return Err(ProjectionError::InvalidParameters(format!(
            "cell size must be positive, got {}",
            cell_size
        )));
    }

    let proj = AlbersEqualArea::new(params)?;
    let extent = proj.project_bounds(&geographic.bbox(), EXTENT_SAMPLES);

    let snapped = BoundingBox::new(
        (extent.min_x / cell_size).floor() * cell_size,
        (extent.min_y / cell_size).floor() * cell_size,
        (extent.max_x / cell_size).ceil() * cell_size,
        (extent.max_y / cell_size).ceil() * cell_size,
    );

    Ok(GridSpec::covering(snapped, cell_size, Crs::AlbersEqualArea(params)))
}
