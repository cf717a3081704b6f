//! Per-cell percentile ranks of index values.

use std::path::Path;

use drought_common::ValueSpace;
use rayon::prelude::*;

use crate::dataset::{CubeMeta, RasterCube};
use crate::error::Result;
use crate::writer::{CubeWriteResult, CubeWriter};

/// Percentile rank (0-100] of each value within its own series.
///
/// Ties share their average rank; `pct = rank / valid * 100`. NaN stays NaN
/// and does not count towards `valid`.
///
/// Ranking is not a fixed point in general: ranking a ranked series again
/// ranks the ranks, which only coincides with the first pass when ties are
/// preserved.
pub fn percentile_ranks(values: &[f32]) -> Vec<f32> {
    let mut order: Vec<usize> = (0..values.len()).filter(|&i| !values[i].is_nan()).collect();
    let valid = order.len();
    let mut out = vec![f32::NAN; values.len()];
    if valid == 0 {
        return out;
    }

    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut start = 0;
    while start < valid {
        let mut end = start + 1;
        while end < valid && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // 1-based ranks start+1 ..= end share their mean
        let avg_rank = (start + 1 + end) as f64 / 2.0;
        let pct = (avg_rank / valid as f64 * 100.0) as f32;
        for &i in &order[start..end] {
            out[i] = pct;
        }
        start = end;
    }

    out
}

/// Rank every cell of a time-major cube along time.
pub fn percentile_rank_cube(data: &[f32], steps: usize, cells: usize) -> Vec<f32> {
    let columns: Vec<Vec<f32>> = (0..cells)
        .into_par_iter()
        .map(|cell| {
            let series: Vec<f32> = (0..steps).map(|t| data[t * cells + cell]).collect();
            percentile_ranks(&series)
        })
        .collect();

    let mut out = vec![f32::NAN; steps * cells];
    for (cell, ranks) in columns.iter().enumerate() {
        for (t, &v) in ranks.iter().enumerate() {
            out[t * cells + cell] = v;
        }
    }
    out
}

/// Build the percentile-space cube of `raw` and write it to `dest`.
pub fn build_percentile_cube(raw: &dyn RasterCube, writer: &CubeWriter, dest: &Path) -> Result<CubeWriteResult> {
    let meta = raw.meta();
    tracing::info!(index = %meta.index, steps = meta.steps(), dest = %dest.display(), "Building percentile cube");

    let data = raw.read_all()?;
    let ranked = percentile_rank_cube(&data, meta.steps(), meta.cells());

    let out_meta = CubeMeta {
        value_space: ValueSpace::Percentile,
        units: "percentile".to_string(),
        ..meta.clone()
    };
    writer.write_cube_to_dir(dest, &out_meta, &ranked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ChunkCache;
    use crate::config::ZarrCompression;
    use crate::dataset::tests::small_meta;
    use crate::dataset::{MemoryCube, ZarrCube};
    use drought_common::{DroughtIndex, GridCell};
    use std::sync::{Arc, Mutex};
    use test_utils::assert_slice_approx_eq;

    #[test]
    fn test_ranks_with_ties_and_nan() {
        let ranks = percentile_ranks(&[3.0, 1.0, f32::NAN, 3.0, 2.0]);
        assert_slice_approx_eq!(&ranks, &[87.5, 25.0, f32::NAN, 87.5, 50.0], 1e-5);
        assert!(percentile_ranks(&[f32::NAN, f32::NAN]).iter().all(|v| v.is_nan()));
        assert!(percentile_ranks(&[]).is_empty());
    }

    #[test]
    fn test_ranking_ranks_is_rank_of_ranks() {
        let values = [0.4, -1.2, 2.2, 0.4, -0.3, 1.1];
        let once = percentile_ranks(&values);
        let twice = percentile_ranks(&once);
        // ranking is order-preserving, so ranking ranks ranks the same order
        assert_slice_approx_eq!(&twice, &once, 1e-5);
    }

    #[test]
    fn test_cube_ranks_per_cell() {
        // 2 steps x 3 cells
        let data = [1.0, 5.0, f32::NAN, 2.0, 4.0, 7.0];
        let ranked = percentile_rank_cube(&data, 2, 3);
        assert_slice_approx_eq!(&ranked, &[50.0, 100.0, f32::NAN, 100.0, 50.0, 100.0], 1e-5);
    }

    #[test]
    fn test_build_percentile_cube() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let dest = temp_dir.path().join("percentile").join("spi1.zarr");

        let data: Vec<f32> = (0..24).map(|v| (v % 5) as f32).collect();
        let raw = MemoryCube::new(small_meta(DroughtIndex::Spi1, 4), data).unwrap();
        let writer = CubeWriter::new(12, ZarrCompression::None, 1);
        build_percentile_cube(&raw, &writer, &dest).unwrap();

        let cube = ZarrCube::open_dir(&dest, Arc::new(Mutex::new(ChunkCache::new(1 << 20)))).unwrap();
        assert_eq!(cube.meta().value_space, ValueSpace::Percentile);
        let series = cube.read_cell_series(GridCell::new(0, 0)).unwrap();
        // cell 0 holds 0, 1, 2, 3
        assert_slice_approx_eq!(&series, &[25.0, 50.0, 75.0, 100.0], 1e-5);
    }
}
