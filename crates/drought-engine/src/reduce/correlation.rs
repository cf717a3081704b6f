//! Pearson correlation of every cell against a reference series.

use rayon::prelude::*;

use crate::dataset::DatasetInterval;
use crate::error::{EngineError, Result};
use crate::reduce::temporal::check_mask;
use crate::types::Field2D;

/// Pearson correlation coefficient of two equal-length series.
///
/// NaN when the lengths differ, there are fewer than two samples, either
/// series contains NaN anywhere, or either series has zero variance.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len();
    if n != y.len() || n < 2 {
        return f64::NAN;
    }
    if x.iter().chain(y).any(|v| !v.is_finite()) {
        return f64::NAN;
    }

    let mean_x = x.iter().sum::<f64>() / n as f64;
    let mean_y = y.iter().sum::<f64>() / n as f64;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (a, b) in x.iter().zip(y) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return f64::NAN;
    }

    (cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0)
}

/// Correlation of every cell's series with `reference`.
///
/// Cells run in parallel. A reference containing NaN makes the whole field
/// NaN; otherwise degenerate cells and cells outside `mask` are NaN and the
/// rest are in `[-1, 1]`.
pub fn correlation_field(reference: &[f64], interval: &DatasetInterval, mask: Option<&[bool]>) -> Result<Field2D> {
    let grid = *interval.grid();
    check_mask(&grid, mask, "domain")?;

    if reference.len() != interval.len() {
        return Err(EngineError::grid_mismatch(format!(
            "reference series has {} steps, interval has {}",
            reference.len(),
            interval.len()
        )));
    }

    if reference.iter().any(|v| !v.is_finite()) {
        tracing::debug!("Reference series has missing values, correlation field is empty");
        return Ok(Field2D::empty(grid));
    }

    let steps = interval.len();
    let cells = grid.len();
    let cube = interval.materialize()?;

    let data: Vec<f32> = (0..cells)
        .into_par_iter()
        .map_init(
            || Vec::<f64>::with_capacity(steps),
            |series, cell| {
                if mask.is_some_and(|m| !m[cell]) {
                    return f32::NAN;
                }
                series.clear();
                series.extend((0..steps).map(|t| cube[t * cells + cell] as f64));
                pearson(series.as_slice(), reference) as f32
            },
        )
        .collect();

    tracing::debug!(cells = cells, steps = steps, "Computed correlation field");
    Ok(Field2D::new(grid, data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::tests::small_meta;
    use crate::dataset::{MemoryCube, RasterCube};
    use crate::reduce::temporal::series;
    use crate::selection::Selection;
    use drought_common::{DroughtIndex, GridCell, StaticCatalog};
    use std::sync::Arc;
    use test_utils::{assert_approx_eq, create_index_cube};

    #[test]
    fn test_pearson() {
        assert_approx_eq!(pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]), 1.0, 1e-12);
        assert_approx_eq!(pearson(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]), -1.0, 1e-12);
        assert!(pearson(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]).is_nan());
        assert!(pearson(&[1.0, f64::NAN, 3.0], &[1.0, 2.0, 3.0]).is_nan());
        assert!(pearson(&[1.0], &[1.0]).is_nan());
        assert!(pearson(&[1.0, 2.0], &[1.0, 2.0, 3.0]).is_nan());
    }

    #[test]
    fn test_self_correlation_is_one() {
        let steps = 24;
        let mut data = create_index_cube(3, 2, steps, 7);
        data[3] = f32::NAN; // cell 3 degenerate
        for t in 0..steps {
            data[t * 6 + 5] = 1.5; // cell 5 constant
        }
        let cube: Arc<dyn RasterCube> =
            Arc::new(MemoryCube::new(small_meta(DroughtIndex::Spei1, steps), data).unwrap());
        let interval = DatasetInterval::full(cube, &StaticCatalog::new());

        let anchor = GridCell::new(0, 1);
        let reference = series(&interval, &Selection::SinglePoint { cell: anchor, grid_id: None }, None).unwrap();
        let field = correlation_field(&reference, &interval, None).unwrap();

        assert_approx_eq!(field.at(anchor).unwrap(), 1.0, 1e-5);
        assert!(field.data[3].is_nan());
        assert!(field.data[5].is_nan());
        assert!(field.data.iter().filter(|v| !v.is_nan()).all(|v| (-1.0..=1.0).contains(v)));

        let land = [true, true, false, true, true, true];
        let masked = correlation_field(&reference, &interval, Some(&land[..])).unwrap();
        assert!(masked.data[2].is_nan());
        assert_eq!(masked.data[1], field.data[1]);
        assert!(correlation_field(&reference, &interval, Some(&land[..2])).is_err());
    }

    #[test]
    fn test_nan_reference_gives_empty_field() {
        let cube: Arc<dyn RasterCube> =
            Arc::new(MemoryCube::new(small_meta(DroughtIndex::Spi1, 3), vec![1.0; 18]).unwrap());
        let interval = DatasetInterval::full(cube, &StaticCatalog::new());

        let field = correlation_field(&[1.0, f64::NAN, 2.0], &interval, None).unwrap();
        assert_eq!(field.valid_count(), 0);
        assert!(correlation_field(&[1.0, 2.0], &interval, None).is_err());
    }
}
