//! Core result types.

use drought_common::{GridCell, GridSpec};
use serde::{Deserialize, Serialize};

/// A materialized 2-D field on a grid, row-major, top row first.
///
/// Serialized values use `null` for NaN since JSON has no NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field2D {
    pub grid: GridSpec,
    #[serde(with = "nan_as_null")]
    pub data: Vec<f32>,
}

impl Field2D {
    pub fn new(grid: GridSpec, data: Vec<f32>) -> Self {
        debug_assert_eq!(grid.len(), data.len());
        Self { grid, data }
    }

    /// A field of NaN.
    pub fn empty(grid: GridSpec) -> Self {
        Self::new(grid, vec![f32::NAN; grid.len()])
    }

    pub fn width(&self) -> usize {
        self.grid.nx
    }

    pub fn height(&self) -> usize {
        self.grid.ny
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        if row >= self.grid.ny || col >= self.grid.nx {
            return None;
        }
        self.data.get(self.grid.flat_index(row, col)).copied()
    }

    pub fn at(&self, cell: GridCell) -> Option<f32> {
        self.get(cell.row, cell.col)
    }

    /// Min and max of the non-NaN values.
    pub fn finite_range(&self) -> Option<(f32, f32)> {
        self.data
            .iter()
            .filter(|v| !v.is_nan())
            .fold(None, |acc, &v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|v| !v.is_nan()).count()
    }
}

/// Statistics about cache performance.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub memory_bytes: u64,
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate the cache hit rate (0.0 - 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Serde helper writing NaN as `null`.
pub(crate) mod nan_as_null {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(data: &[f32], serializer: S) -> Result<S::Ok, S::Error> {
        let opts: Vec<Option<f32>> = data
            .iter()
            .map(|v| if v.is_nan() { None } else { Some(*v) })
            .collect();
        opts.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f32>, D::Error> {
        let opts: Vec<Option<f32>> = Vec::deserialize(deserializer)?;
        Ok(opts.into_iter().map(|v| v.unwrap_or(f32::NAN)).collect())
    }
}
