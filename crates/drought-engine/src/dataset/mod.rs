//! Dataset accessor: lazily opened time-stacked index cubes.
//!
//! ```text
//! DatasetAccessor::open(index, space)
//!      │
//!      ├─► memoized handle? ──► return it
//!      │
//!      └─► ArchiveStore::open ──► ZarrCube (metadata only, no data read)
//!
//! DatasetAccessor::filter_time(cube, filter)
//!      │
//!      ├─► matching steps ──► DatasetInterval over the cube
//!      │
//!      └─► none ──► DatasetInterval over a 2-step NaN placeholder
//! ```
//!
//! Values are read one time chunk at a time when a reduction touches them.

pub mod interval;
pub mod zarr;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use drought_common::{DroughtIndex, GridCell, GridSpec, IndexFamily, StaticCatalog, TimeFilter, ValueSpace};
use serde::{Deserialize, Serialize};

use crate::cache::ChunkCache;
use crate::error::{EngineError, Result};
use crate::types::CacheStats;

pub use interval::DatasetInterval;
pub use zarr::{read_raster_2d, ZarrCube};

/// Missing-data sentinel used by the published archives.
pub const FILL_SENTINEL: f32 = -9999.0;

/// Descriptive metadata of a cube.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CubeMeta {
    pub index: DroughtIndex,
    pub value_space: ValueSpace,
    pub grid: GridSpec,
    pub times: Vec<NaiveDate>,
    /// Stored missing-data value, translated to NaN on read.
    pub fill_value: f32,
    pub units: String,
}

impl CubeMeta {
    pub fn steps(&self) -> usize {
        self.times.len()
    }

    pub fn cells(&self) -> usize {
        self.grid.len()
    }
}

/// A `[time, row, col]` cube of index values.
///
/// Implementations return values with missing data already translated
/// to NaN.
pub trait RasterCube: Send + Sync {
    fn meta(&self) -> &CubeMeta;

    /// One time step as a row-major grid.
    fn read_step(&self, t: usize) -> Result<Vec<f32>>;

    /// The full time series of one cell.
    fn read_cell_series(&self, cell: GridCell) -> Result<Vec<f32>> {
        let meta = self.meta();
        check_cell(&meta.grid, cell)?;
        let flat = meta.grid.flat_index(cell.row, cell.col);
        (0..meta.steps())
            .map(|t| self.read_step(t).map(|step| step[flat]))
            .collect()
    }

    /// Every step, time-major.
    fn read_all(&self) -> Result<Vec<f32>> {
        let meta = self.meta();
        let mut out = Vec::with_capacity(meta.steps() * meta.cells());
        for t in 0..meta.steps() {
            out.extend(self.read_step(t)?);
        }
        Ok(out)
    }
}

/// A cube held fully in memory.
#[derive(Debug, Clone)]
pub struct MemoryCube {
    meta: CubeMeta,
    data: Vec<f32>,
}

impl MemoryCube {
    /// Wrap time-major data. Fill values are translated to NaN here.
    pub fn new(meta: CubeMeta, mut data: Vec<f32>) -> Result<Self> {
        let expected = meta.steps() * meta.cells();
        if data.len() != expected {
            return Err(EngineError::grid_mismatch(format!(
                "cube data has {} values, expected {} ({} steps x {} cells)",
                data.len(),
                expected,
                meta.steps(),
                meta.cells()
            )));
        }
        translate_fill(&mut data, meta.fill_value, meta.index.family());
        Ok(Self { meta, data })
    }

    pub fn into_parts(self) -> (CubeMeta, Vec<f32>) {
        (self.meta, self.data)
    }
}

impl RasterCube for MemoryCube {
    fn meta(&self) -> &CubeMeta {
        &self.meta
    }

    fn read_step(&self, t: usize) -> Result<Vec<f32>> {
        let cells = self.meta.cells();
        if t >= self.meta.steps() {
            return Err(EngineError::read_failed(format!(
                "step {} out of range (cube has {})",
                t,
                self.meta.steps()
            )));
        }
        Ok(self.data[t * cells..(t + 1) * cells].to_vec())
    }

    fn read_all(&self) -> Result<Vec<f32>> {
        Ok(self.data.clone())
    }
}

/// Replace stored missing-data markers with NaN.
///
/// LERI additionally uses negative values as a missing-data flag.
pub fn translate_fill(values: &mut [f32], fill_value: f32, family: IndexFamily) {
    let leri = family == IndexFamily::Leri;
    for v in values.iter_mut() {
        if *v == fill_value || *v == FILL_SENTINEL || (leri && *v < 0.0) {
            *v = f32::NAN;
        }
    }
}

pub(crate) fn check_cell(grid: &GridSpec, cell: GridCell) -> Result<()> {
    if cell.row >= grid.ny || cell.col >= grid.nx {
        return Err(EngineError::grid_mismatch(format!(
            "cell ({}, {}) outside {}x{} grid",
            cell.row, cell.col, grid.ny, grid.nx
        )));
    }
    Ok(())
}

/// Read-only archive of cubes keyed by (index, value space).
pub trait ArchiveStore: Send + Sync {
    fn open(&self, index: DroughtIndex, space: ValueSpace) -> Result<Arc<dyn RasterCube>>;
}

/// Archive laid out on disk as `<root>/<value space>/<index>.zarr`.
pub struct FilesystemArchive {
    root: PathBuf,
    chunk_cache: Arc<Mutex<ChunkCache>>,
}

impl FilesystemArchive {
    pub fn new(root: impl Into<PathBuf>, chunk_cache_bytes: usize) -> Self {
        Self {
            root: root.into(),
            chunk_cache: Arc::new(Mutex::new(ChunkCache::new(chunk_cache_bytes))),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cube_path(&self, index: DroughtIndex, space: ValueSpace) -> PathBuf {
        cube_path(&self.root, index, space)
    }

    pub fn chunk_cache_stats(&self) -> CacheStats {
        match self.chunk_cache.lock() {
            Ok(cache) => cache.stats(),
            Err(poisoned) => poisoned.into_inner().stats(),
        }
    }
}

/// Location of a cube inside an archive root.
pub fn cube_path(root: &Path, index: DroughtIndex, space: ValueSpace) -> PathBuf {
    root.join(space.dir_name()).join(format!("{}.zarr", index.name()))
}

impl ArchiveStore for FilesystemArchive {
    fn open(&self, index: DroughtIndex, space: ValueSpace) -> Result<Arc<dyn RasterCube>> {
        let path = self.cube_path(index, space);
        let cube = ZarrCube::open_dir(&path, Arc::clone(&self.chunk_cache))?;

        let meta = cube.meta();
        if meta.index != index || meta.value_space != space {
            return Err(EngineError::invalid_metadata(format!(
                "{} holds {} ({}), expected {} ({})",
                path.display(),
                meta.index,
                meta.value_space,
                index,
                space
            )));
        }

        Ok(Arc::new(cube))
    }
}

/// Opens cubes on first use and narrows them to time windows.
pub struct DatasetAccessor {
    store: Arc<dyn ArchiveStore>,
    catalog: Arc<StaticCatalog>,
    opened: Mutex<HashMap<(DroughtIndex, ValueSpace), Arc<dyn RasterCube>>>,
}

impl DatasetAccessor {
    pub fn new(store: Arc<dyn ArchiveStore>, catalog: Arc<StaticCatalog>) -> Self {
        Self {
            store,
            catalog,
            opened: Mutex::new(HashMap::new()),
        }
    }

    pub fn catalog(&self) -> &StaticCatalog {
        &self.catalog
    }

    /// Open a cube, reusing the handle from an earlier call.
    pub fn open(&self, index: DroughtIndex, space: ValueSpace) -> Result<Arc<dyn RasterCube>> {
        let key = (index, space);
        if let Some(cube) = self.lock_opened()?.get(&key) {
            return Ok(Arc::clone(cube));
        }

        let cube = self.store.open(index, space)?;
        tracing::info!(
            index = %index,
            value_space = %space,
            steps = cube.meta().steps(),
            rows = cube.meta().grid.ny,
            cols = cube.meta().grid.nx,
            "Opened dataset"
        );

        let mut opened = self.lock_opened()?;
        let entry = opened.entry(key).or_insert(cube);
        Ok(Arc::clone(entry))
    }

    /// Narrow a cube to a time window, substituting a placeholder when
    /// nothing matches.
    pub fn filter_time(&self, cube: Arc<dyn RasterCube>, filter: &TimeFilter) -> Result<DatasetInterval> {
        let today = chrono::Utc::now().date_naive();
        DatasetInterval::filter(cube, filter, &self.catalog, today)
    }

    /// Open and filter in one step.
    pub fn interval(&self, index: DroughtIndex, space: ValueSpace, filter: &TimeFilter) -> Result<DatasetInterval> {
        let cube = self.open(index, space)?;
        self.filter_time(cube, filter)
    }

    fn lock_opened(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<(DroughtIndex, ValueSpace), Arc<dyn RasterCube>>>> {
        self.opened
            .lock()
            .map_err(|_| EngineError::storage("dataset handle table poisoned"))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use drought_common::time::monthly_series;
    use drought_common::Crs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub(crate) fn small_meta(index: DroughtIndex, steps: usize) -> CubeMeta {
        CubeMeta {
            index,
            value_space: ValueSpace::Raw,
            grid: GridSpec::new(3, 2, -100.0, 40.0, 1.0, 1.0, Crs::Geographic),
            times: monthly_series(2000, 1, steps),
            fill_value: FILL_SENTINEL,
            units: String::new(),
        }
    }

    struct CountingStore {
        opens: AtomicUsize,
    }

    impl ArchiveStore for CountingStore {
        fn open(&self, index: DroughtIndex, _space: ValueSpace) -> Result<Arc<dyn RasterCube>> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            let meta = small_meta(index, 2);
            Ok(Arc::new(MemoryCube::new(meta, vec![0.0; 12])?))
        }
    }

    #[test]
    fn test_translate_fill() {
        let mut values = vec![1.0, -9999.0, -0.5, 3.0];
        translate_fill(&mut values, FILL_SENTINEL, IndexFamily::SpiSpei);
        assert!(values[1].is_nan());
        assert_eq!(values[2], -0.5);

        let mut leri = vec![55.0, -1.0, -9999.0, 0.0];
        translate_fill(&mut leri, FILL_SENTINEL, IndexFamily::Leri);
        assert_eq!(leri[0], 55.0);
        assert!(leri[1].is_nan());
        assert!(leri[2].is_nan());
        assert_eq!(leri[3], 0.0);
    }

    #[test]
    fn test_memory_cube_rejects_wrong_length() {
        let meta = small_meta(DroughtIndex::Spi1, 2);
        assert!(MemoryCube::new(meta, vec![0.0; 5]).is_err());
    }

    #[test]
    fn test_default_cell_series() {
        let meta = small_meta(DroughtIndex::Spi1, 3);
        let data: Vec<f32> = (0..18).map(|v| v as f32).collect();
        let cube = MemoryCube::new(meta, data).unwrap();
        assert_eq!(cube.read_cell_series(GridCell::new(1, 2)).unwrap(), vec![5.0, 11.0, 17.0]);
        assert!(cube.read_cell_series(GridCell::new(2, 0)).is_err());
    }

    #[test]
    fn test_accessor_memoizes_open() {
        let store = Arc::new(CountingStore {
            opens: AtomicUsize::new(0),
        });
        let accessor = DatasetAccessor::new(store.clone(), Arc::new(StaticCatalog::new()));

        accessor.open(DroughtIndex::Pdsi, ValueSpace::Raw).unwrap();
        accessor.open(DroughtIndex::Pdsi, ValueSpace::Raw).unwrap();
        assert_eq!(store.opens.load(Ordering::SeqCst), 1);

        accessor.open(DroughtIndex::Pdsi, ValueSpace::Percentile).unwrap();
        assert_eq!(store.opens.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_cube_path_layout() {
        let path = cube_path(Path::new("/data"), DroughtIndex::Spei3, ValueSpace::EqualAreaProjected);
        assert_eq!(path, PathBuf::from("/data/albers/spei3.zarr"));
    }
}
