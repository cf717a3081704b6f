//! Time-axis reductions and spatial series.

use drought_common::{GridCell, GridSpec};

use crate::dataset::DatasetInterval;
use crate::error::{EngineError, Result};
use crate::selection::Selection;
use crate::types::Field2D;

#[derive(Clone, Copy)]
enum Fold {
    Mean,
    Min,
    Max,
}

/// Check that a domain mask covers the interval grid cell for cell.
pub(crate) fn check_mask(grid: &GridSpec, mask: Option<&[bool]>, what: &str) -> Result<()> {
    match mask {
        Some(mask) if mask.len() != grid.len() => Err(EngineError::grid_mismatch(format!(
            "{} mask has {} cells, grid has {}",
            what,
            mask.len(),
            grid.len()
        ))),
        _ => Ok(()),
    }
}

/// Per-cell mean over the interval. Cells that are NaN at every step, or
/// outside `mask`, stay NaN.
pub fn reduce_mean(interval: &DatasetInterval, mask: Option<&[bool]>) -> Result<Field2D> {
    reduce(interval, mask, Fold::Mean)
}

/// Per-cell minimum over the interval, ignoring NaN.
pub fn reduce_min(interval: &DatasetInterval, mask: Option<&[bool]>) -> Result<Field2D> {
    reduce(interval, mask, Fold::Min)
}

/// Per-cell maximum over the interval, ignoring NaN.
pub fn reduce_max(interval: &DatasetInterval, mask: Option<&[bool]>) -> Result<Field2D> {
    reduce(interval, mask, Fold::Max)
}

fn reduce(interval: &DatasetInterval, mask: Option<&[bool]>, fold: Fold) -> Result<Field2D> {
    let grid = *interval.grid();
    let cells = grid.len();
    check_mask(&grid, mask, "domain")?;

    let init = match fold {
        Fold::Mean => 0.0,
        Fold::Min => f64::INFINITY,
        Fold::Max => f64::NEG_INFINITY,
    };
    let mut acc = vec![init; cells];
    let mut counts = vec![0u32; cells];

    for i in 0..interval.len() {
        let step = interval.step(i)?;
        for (cell, &v) in step.iter().enumerate() {
            if v.is_nan() || mask.is_some_and(|m| !m[cell]) {
                continue;
            }
            let v = v as f64;
            acc[cell] = match fold {
                Fold::Mean => acc[cell] + v,
                Fold::Min => acc[cell].min(v),
                Fold::Max => acc[cell].max(v),
            };
            counts[cell] += 1;
        }
    }

    let data = acc
        .iter()
        .zip(&counts)
        .map(|(&a, &n)| match (n, fold) {
            (0, _) => f32::NAN,
            (n, Fold::Mean) => (a / n as f64) as f32,
            _ => a as f32,
        })
        .collect();

    Ok(Field2D::new(grid, data))
}

/// Spatial series of a selection over the interval.
///
/// A single point is read out directly; every other selection is the
/// unweighted mean of its non-NaN cells per step. [`Selection::AllDomain`]
/// averages every valid cell inside `mask` (the whole grid without one).
/// Steps with no valid cell are NaN.
pub fn series(interval: &DatasetInterval, selection: &Selection, mask: Option<&[bool]>) -> Result<Vec<f64>> {
    check_mask(interval.grid(), mask, "domain")?;

    if let Selection::SinglePoint { cell, .. } = selection {
        return Ok(interval
            .cell_series(*cell)?
            .into_iter()
            .map(|v| v as f64)
            .collect());
    }

    let grid = interval.grid();
    let flat: Option<Vec<usize>> = if selection.is_all_domain() {
        None
    } else {
        Some(
            selection
                .cells()
                .iter()
                .map(|c| flat_index(grid, *c))
                .collect::<Result<_>>()?,
        )
    };

    (0..interval.len())
        .map(|i| {
            let step = interval.step(i)?;
            Ok(match &flat {
                None => match mask {
                    Some(mask) => nan_mean(step.iter().zip(mask).filter(|(_, &m)| m).map(|(&v, _)| v)),
                    None => nan_mean(step.iter().copied()),
                },
                Some(idx) => nan_mean(idx.iter().map(|&j| step[j])),
            })
        })
        .collect()
}

fn flat_index(grid: &GridSpec, cell: GridCell) -> Result<usize> {
    if cell.row >= grid.ny || cell.col >= grid.nx {
        return Err(EngineError::grid_mismatch(format!(
            "selected cell ({}, {}) outside {}x{} grid",
            cell.row, cell.col, grid.ny, grid.nx
        )));
    }
    Ok(grid.flat_index(cell.row, cell.col))
}

/// Mean of the non-NaN values, NaN if there are none.
pub fn nan_mean(values: impl Iterator<Item = f32>) -> f64 {
    let (sum, n) = values
        .filter(|v| !v.is_nan())
        .fold((0.0f64, 0usize), |(s, n), v| (s + v as f64, n + 1));
    if n == 0 {
        f64::NAN
    } else {
        sum / n as f64
    }
}
