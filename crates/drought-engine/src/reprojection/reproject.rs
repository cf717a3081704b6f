//! Resampling between the geographic and equal-area grids.

use std::path::Path;

use drought_common::{GridSpec, ValueSpace};
use projection::CrsTransform;
use rayon::prelude::*;

use super::interpolation::bilinear_interpolate;
use crate::dataset::{CubeMeta, RasterCube};
use crate::error::{EngineError, Result};
use crate::writer::{CubeWriteResult, CubeWriter};

/// Fractional source `(col, row)` position of every target cell center.
///
/// `None` where the target center has no geographic equivalent.
pub fn source_positions(source: &GridSpec, target: &GridSpec) -> Result<Vec<Option<(f64, f64)>>> {
    let to_geo = CrsTransform::for_crs(&target.crs)?;
    let from_geo = CrsTransform::for_crs(&source.crs)?;

    let positions = (0..target.len())
        .into_par_iter()
        .map(|flat| {
            let cell = target.cell_of(flat);
            let (x, y) = target.cell_center(cell.row, cell.col);
            let (lon, lat) = to_geo.to_geographic(x, y).ok()?;
            let (sx, sy) = from_geo.from_geographic(lon, lat);
            Some(source.fractional_index(sx, sy))
        })
        .collect();

    Ok(positions)
}

/// Resample a boolean selection mask onto another grid.
///
/// The mask is interpolated bilinearly as a 0/1 field and re-binarized:
/// any interpolated value above zero is included. Target cells that fall
/// outside the source grid are excluded.
pub fn project_mask(mask: &[bool], source: &GridSpec, target: &GridSpec) -> Result<Vec<bool>> {
    check_len(mask.len(), source, "mask")?;

    let field: Vec<f32> = mask.iter().map(|&m| if m { 1.0 } else { 0.0 }).collect();
    let positions = source_positions(source, target)?;

    let projected: Vec<bool> = positions
        .par_iter()
        .map(|pos| match pos {
            Some((x, y)) => bilinear_interpolate(&field, source.nx, source.ny, *x, *y) > 0.0,
            None => false,
        })
        .collect();

    tracing::debug!(
        source_cells = mask.iter().filter(|m| **m).count(),
        target_cells = projected.iter().filter(|m| **m).count(),
        "Projected selection mask"
    );

    Ok(projected)
}

/// Resample a value field onto another grid with bilinear interpolation.
pub fn reproject_field(values: &[f32], source: &GridSpec, target: &GridSpec) -> Result<Vec<f32>> {
    check_len(values.len(), source, "field")?;
    let positions = source_positions(source, target)?;
    Ok(resample_with(values, source, &positions))
}

/// Resample using precomputed positions, so a whole cube shares one pass of
/// coordinate transforms.
pub fn resample_with(values: &[f32], source: &GridSpec, positions: &[Option<(f64, f64)>]) -> Vec<f32> {
    positions
        .par_iter()
        .map(|pos| match pos {
            Some((x, y)) => bilinear_interpolate(values, source.nx, source.ny, *x, *y),
            None => f32::NAN,
        })
        .collect()
}

/// Resample every step of a geographic cube onto `target` and write it as
/// the equal-area cube at `dest`.
pub fn build_equal_area_cube(
    raw: &dyn RasterCube,
    target: &GridSpec,
    writer: &CubeWriter,
    dest: &Path,
) -> Result<CubeWriteResult> {
    let meta = raw.meta();
    tracing::info!(
        index = %meta.index,
        steps = meta.steps(),
        cols = target.nx,
        rows = target.ny,
        dest = %dest.display(),
        "Building equal-area cube"
    );

    let positions = source_positions(&meta.grid, target)?;
    let mut data = Vec::with_capacity(meta.steps() * target.len());
    for t in 0..meta.steps() {
        let step = raw.read_step(t)?;
        data.extend(resample_with(&step, &meta.grid, &positions));
    }

    let out_meta = CubeMeta {
        value_space: ValueSpace::EqualAreaProjected,
        grid: *target,
        ..meta.clone()
    };
    writer.write_cube_to_dir(dest, &out_meta, &data)
}

fn check_len(len: usize, grid: &GridSpec, what: &str) -> Result<()> {
    if len != grid.len() {
        return Err(EngineError::grid_mismatch(format!(
            "{} has {} cells, grid has {}x{}",
            what, len, grid.nx, grid.ny
        )));
    }
    Ok(())
}
