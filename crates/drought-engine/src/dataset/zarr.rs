//! Zarr V3 cube reader.
//!
//! Cubes are 3-D float32 arrays `[time, row, col]` chunked along time with
//! whole grids per chunk, so reading one step touches exactly one chunk.
//! Attributes:
//!
//! | key           | value                                  |
//! |---------------|----------------------------------------|
//! | `index`       | catalog name, e.g. `"spei3"`           |
//! | `value_space` | `"raw"`, `"percentile"` or `"albers"`  |
//! | `grid`        | [`GridSpec`] as JSON                   |
//! | `times`       | ISO dates, one per step                |
//! | `fill_value`  | stored missing-data marker             |
//! | `units`       | free text                              |

use std::path::Path;
use std::sync::{Arc, Mutex};

use drought_common::time::parse_date;
use drought_common::{DroughtIndex, GridCell, GridSpec, ValueSpace};
use serde_json::{Map, Value};
use zarrs::array::Array;
use zarrs::array_subset::ArraySubset;
use zarrs::storage::ReadableStorageTraits;
use zarrs_filesystem::FilesystemStore;

use super::{check_cell, translate_fill, CubeMeta, RasterCube, FILL_SENTINEL};
use crate::cache::{hash_path, ChunkCache, ChunkData};
use crate::error::{EngineError, Result};

/// A lazily read archive cube.
pub struct ZarrCube<S: ReadableStorageTraits + ?Sized> {
    array: Array<S>,
    path: String,
    path_hash: u64,
    meta: CubeMeta,
    /// Steps per chunk along the time axis.
    time_chunk: usize,
    chunk_cache: Arc<Mutex<ChunkCache>>,
}

impl ZarrCube<FilesystemStore> {
    /// Open a cube stored as a directory on the local filesystem.
    pub fn open_dir(dir: &Path, chunk_cache: Arc<Mutex<ChunkCache>>) -> Result<Self> {
        if !dir.exists() {
            return Err(EngineError::missing_artifact(format!("cube {}", dir.display())));
        }
        let store = FilesystemStore::new(dir).map_err(|e| EngineError::open_failed(e.to_string()))?;
        Self::open(store, &dir.to_string_lossy(), chunk_cache)
    }
}

impl<S: ReadableStorageTraits + Send + Sync + 'static> ZarrCube<S> {
    /// Open the array at the root of `storage`. `path` names the cube in
    /// logs and cache keys.
    pub fn open(storage: S, path: &str, chunk_cache: Arc<Mutex<ChunkCache>>) -> Result<Self> {
        let array = Array::open(Arc::new(storage), "/")
            .map_err(|e| EngineError::open_failed(format!("{}: {}", path, e)))?;

        let meta = Self::extract_meta(&array)?;
        let time_chunk = Self::time_chunk_len(&array)?;

        Ok(Self {
            array,
            path: path.to_string(),
            path_hash: hash_path(path),
            meta,
            time_chunk,
            chunk_cache,
        })
    }

    /// Extract metadata from the array attributes and check it against the shape.
    fn extract_meta(array: &Array<S>) -> Result<CubeMeta> {
        let attrs = array.attributes();
        let shape = array.shape();

        if shape.len() != 3 {
            return Err(EngineError::invalid_metadata(format!(
                "cube must have 3 dimensions, found {}",
                shape.len()
            )));
        }

        let index: DroughtIndex = required_str(attrs, "index")?.parse()?;
        let value_space: ValueSpace = required_str(attrs, "value_space")?.parse()?;
        let grid = parse_grid(attrs)?;

        let times = attrs
            .get("times")
            .and_then(|v| v.as_array())
            .ok_or_else(|| EngineError::invalid_metadata("missing 'times' attribute"))?
            .iter()
            .map(|v| {
                v.as_str()
                    .ok_or_else(|| EngineError::invalid_metadata("non-string time"))
                    .and_then(|s| parse_date(s).map_err(|e| EngineError::invalid_metadata(e.to_string())))
            })
            .collect::<Result<Vec<_>>>()?;

        let fill_value = attrs
            .get("fill_value")
            .and_then(|v| v.as_f64())
            .map(|v| v as f32)
            .unwrap_or(FILL_SENTINEL);

        let units = attrs
            .get("units")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();

        let expected = [times.len() as u64, grid.ny as u64, grid.nx as u64];
        if shape != expected {
            return Err(EngineError::invalid_metadata(format!(
                "array shape {:?} does not match attributes {:?}",
                shape, expected
            )));
        }

        Ok(CubeMeta {
            index,
            value_space,
            grid,
            times,
            fill_value,
            units,
        })
    }

    fn time_chunk_len(array: &Array<S>) -> Result<usize> {
        let origin = vec![0u64; array.shape().len()];
        let chunk_shape = array
            .chunk_grid()
            .chunk_shape(&origin, array.shape())
            .map_err(|e| EngineError::invalid_metadata(e.to_string()))?
            .ok_or_else(|| EngineError::invalid_metadata("missing chunk shape"))?;

        let (ny, nx) = (array.shape()[1], array.shape()[2]);
        if chunk_shape[1].get() < ny || chunk_shape[2].get() < nx {
            return Err(EngineError::invalid_metadata(format!(
                "cube chunks must span the whole grid, found {:?}",
                chunk_shape.iter().map(|c| c.get()).collect::<Vec<_>>()
            )));
        }

        Ok(chunk_shape[0].get() as usize)
    }

    /// Read and decode one time chunk (synchronous, uncached).
    fn read_chunk_sync(&self, chunk: usize) -> Result<Vec<f32>> {
        let start = chunk * self.time_chunk;
        let end = (start + self.time_chunk).min(self.meta.steps());
        let grid = &self.meta.grid;

        let subset = ArraySubset::new_with_start_shape(
            vec![start as u64, 0, 0],
            vec![(end - start) as u64, grid.ny as u64, grid.nx as u64],
        )
        .map_err(|e| EngineError::read_failed(e.to_string()))?;

        let mut data: Vec<f32> = self
            .array
            .retrieve_array_subset_elements(&subset)
            .map_err(|e| EngineError::read_failed(format!("{}: {}", self.path, e)))?;

        translate_fill(&mut data, self.meta.fill_value, self.meta.index.family());
        Ok(data)
    }

    /// Read one time chunk through the shared cache.
    fn read_chunk(&self, chunk: usize) -> Result<ChunkData> {
        let key = (self.path_hash, chunk);

        if let Some(data) = self.lock_cache()?.get(&key) {
            return Ok(data);
        }

        tracing::debug!(path = %self.path, chunk = chunk, "Reading time chunk");
        let data: ChunkData = self.read_chunk_sync(chunk)?.into();
        self.lock_cache()?.insert(key, Arc::clone(&data));

        Ok(data)
    }

    fn lock_cache(&self) -> Result<std::sync::MutexGuard<'_, ChunkCache>> {
        self.chunk_cache
            .lock()
            .map_err(|_| EngineError::storage("chunk cache poisoned"))
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn time_chunk(&self) -> usize {
        self.time_chunk
    }
}

impl<S: ReadableStorageTraits + Send + Sync + 'static> RasterCube for ZarrCube<S> {
    fn meta(&self) -> &CubeMeta {
        &self.meta
    }

    fn read_step(&self, t: usize) -> Result<Vec<f32>> {
        if t >= self.meta.steps() {
            return Err(EngineError::read_failed(format!(
                "step {} out of range (cube has {})",
                t,
                self.meta.steps()
            )));
        }

        let chunk = self.read_chunk(t / self.time_chunk)?;
        let cells = self.meta.cells();
        let offset = (t % self.time_chunk) * cells;
        Ok(chunk[offset..offset + cells].to_vec())
    }

    fn read_cell_series(&self, cell: GridCell) -> Result<Vec<f32>> {
        check_cell(&self.meta.grid, cell)?;

        let subset = ArraySubset::new_with_start_shape(
            vec![0, cell.row as u64, cell.col as u64],
            vec![self.meta.steps() as u64, 1, 1],
        )
        .map_err(|e| EngineError::read_failed(e.to_string()))?;

        let mut data: Vec<f32> = self
            .array
            .retrieve_array_subset_elements(&subset)
            .map_err(|e| EngineError::read_failed(format!("{}: {}", self.path, e)))?;

        translate_fill(&mut data, self.meta.fill_value, self.meta.index.family());
        Ok(data)
    }
}

fn required_str<'a>(attrs: &'a Map<String, Value>, key: &str) -> Result<&'a str> {
    attrs
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| EngineError::invalid_metadata(format!("missing '{}' attribute", key)))
}

fn parse_grid(attrs: &Map<String, Value>) -> Result<GridSpec> {
    let grid = attrs
        .get("grid")
        .ok_or_else(|| EngineError::invalid_metadata("missing 'grid' attribute"))?;
    Ok(serde_json::from_value(grid.clone())?)
}

/// Read a 2-D float raster (admin rasters, upload masks) with its grid.
pub fn read_raster_2d(dir: &Path) -> Result<(GridSpec, Vec<f32>)> {
    if !dir.exists() {
        return Err(EngineError::missing_artifact(format!("raster {}", dir.display())));
    }

    let store = FilesystemStore::new(dir).map_err(|e| EngineError::open_failed(e.to_string()))?;
    let array = Array::open(Arc::new(store), "/")
        .map_err(|e| EngineError::open_failed(format!("{}: {}", dir.display(), e)))?;

    let grid = parse_grid(array.attributes())?;
    let shape = array.shape().to_vec();
    if shape != [grid.ny as u64, grid.nx as u64] {
        return Err(EngineError::invalid_metadata(format!(
            "raster shape {:?} does not match grid {}x{}",
            shape, grid.ny, grid.nx
        )));
    }

    let subset = ArraySubset::new_with_start_shape(vec![0, 0], shape)
        .map_err(|e| EngineError::read_failed(e.to_string()))?;
    let data: Vec<f32> = array
        .retrieve_array_subset_elements(&subset)
        .map_err(|e| EngineError::read_failed(format!("{}: {}", dir.display(), e)))?;

    Ok((grid, data))
}
