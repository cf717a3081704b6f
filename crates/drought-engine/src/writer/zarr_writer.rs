//! Zarr V3 writer for index cubes and 2-D rasters.
//!
//! Cubes are written `[time, row, col]` with chunks of `time_chunk` whole
//! grids, which is the layout [`ZarrCube`](crate::dataset::ZarrCube) expects.

use std::path::Path;
use std::sync::Arc;

use drought_common::GridSpec;
use serde_json::json;
use zarrs::array::codec::bytes_to_bytes::blosc::{
    BloscCodec, BloscCompressionLevel, BloscCompressor, BloscShuffleMode,
};
use zarrs::array::{Array, ArrayBuilder, DataType, FillValue};
use zarrs::array_subset::ArraySubset;
use zarrs::storage::{ReadableStorageTraits, WritableStorageTraits};
use zarrs_filesystem::FilesystemStore;

use crate::config::{EngineConfig, ZarrCompression};
use crate::dataset::CubeMeta;
use crate::error::{EngineError, Result};

/// Summary of a written cube.
#[derive(Debug, Clone)]
pub struct CubeWriteResult {
    /// Shape `[time, rows, cols]`.
    pub shape: [usize; 3],
    pub time_chunk: usize,
    /// Number of time chunks.
    pub num_chunks: usize,
    pub compression: ZarrCompression,
    /// Uncompressed size of the written values.
    pub bytes_written: u64,
}

/// Writer for time-chunked index cubes.
#[derive(Debug, Clone)]
pub struct CubeWriter {
    time_chunk: usize,
    compression: ZarrCompression,
    compression_level: u8,
}

impl CubeWriter {
    pub fn new(time_chunk: usize, compression: ZarrCompression, compression_level: u8) -> Self {
        Self {
            time_chunk: time_chunk.max(1),
            compression,
            compression_level,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.time_chunk, config.compression, config.compression_level)
    }

    /// Write a cube to the root of `storage`.
    ///
    /// `data` is time-major. NaN is stored as `meta.fill_value`.
    pub fn write_cube<S: ReadableStorageTraits + WritableStorageTraits + 'static>(
        &self,
        storage: S,
        meta: &CubeMeta,
        data: &[f32],
    ) -> Result<CubeWriteResult> {
        let (steps, ny, nx) = (meta.steps(), meta.grid.ny, meta.grid.nx);
        if data.len() != steps * ny * nx {
            return Err(EngineError::grid_mismatch(format!(
                "cube data has {} values, expected {}x{}x{}",
                data.len(),
                steps,
                ny,
                nx
            )));
        }

        let mut attrs = serde_json::Map::new();
        attrs.insert("index".to_string(), json!(meta.index.name()));
        attrs.insert("value_space".to_string(), json!(meta.value_space.dir_name()));
        attrs.insert("grid".to_string(), serde_json::to_value(meta.grid)?);
        attrs.insert(
            "times".to_string(),
            json!(meta
                .times
                .iter()
                .map(|t| t.format("%Y-%m-%d").to_string())
                .collect::<Vec<_>>()),
        );
        attrs.insert("fill_value".to_string(), json!(meta.fill_value));
        attrs.insert("units".to_string(), json!(meta.units));

        let time_chunk = self.time_chunk.min(steps.max(1));
        let array = self.build_array(
            Arc::new(storage),
            vec![steps as u64, ny as u64, nx as u64],
            vec![time_chunk as u64, ny.max(1) as u64, nx.max(1) as u64],
            meta.fill_value,
            attrs,
        )?;

        array.store_metadata().map_err(|e| EngineError::storage(e.to_string()))?;

        if !data.is_empty() {
            let stored: Vec<f32> = data
                .iter()
                .map(|&v| if v.is_nan() { meta.fill_value } else { v })
                .collect();
            let subset = ArraySubset::new_with_start_shape(
                vec![0, 0, 0],
                vec![steps as u64, ny as u64, nx as u64],
            )
            .map_err(|e| EngineError::storage(e.to_string()))?;
            array
                .store_array_subset_elements(&subset, &stored)
                .map_err(|e| EngineError::storage(e.to_string()))?;
        }

        tracing::info!(
            index = %meta.index,
            value_space = %meta.value_space,
            steps = steps,
            rows = ny,
            cols = nx,
            compression = %self.compression,
            "Wrote cube"
        );

        Ok(CubeWriteResult {
            shape: [steps, ny, nx],
            time_chunk,
            num_chunks: steps.div_ceil(time_chunk),
            compression: self.compression,
            bytes_written: (data.len() * std::mem::size_of::<f32>()) as u64,
        })
    }

    /// Write a cube into a new directory store at `dir`.
    pub fn write_cube_to_dir(&self, dir: &Path, meta: &CubeMeta, data: &[f32]) -> Result<CubeWriteResult> {
        std::fs::create_dir_all(dir)?;
        let store = FilesystemStore::new(dir).map_err(|e| EngineError::storage(e.to_string()))?;
        self.write_cube(store, meta, data)
    }

    fn build_array<S: ReadableStorageTraits + WritableStorageTraits + 'static>(
        &self,
        storage: Arc<S>,
        shape: Vec<u64>,
        chunk_shape: Vec<u64>,
        fill_value: f32,
        attrs: serde_json::Map<String, serde_json::Value>,
    ) -> Result<Array<S>> {
        let chunk_grid: zarrs::array::ChunkGrid = chunk_shape
            .try_into()
            .map_err(|e| EngineError::Config(format!("{:?}", e)))?;

        let mut binding = ArrayBuilder::new(shape, DataType::Float32, chunk_grid, FillValue::from(fill_value));
        let mut builder = binding.attributes(attrs);

        if self.compression != ZarrCompression::None {
            builder = builder.bytes_to_bytes_codecs(vec![self.compression_codec()?]);
        }

        builder
            .build(storage, "/")
            .map_err(|e| EngineError::storage(e.to_string()))
    }

    fn compression_codec(&self) -> Result<Arc<dyn zarrs::array::codec::BytesToBytesCodecTraits>> {
        let level = BloscCompressionLevel::try_from(self.compression_level)
            .map_err(|_| EngineError::Config("Invalid compression level".to_string()))?;

        let compressor = match self.compression {
            ZarrCompression::None => {
                return Err(EngineError::Config("No compression configured".to_string()))
            }
            ZarrCompression::BloscLz4 => BloscCompressor::LZ4,
            ZarrCompression::BloscZstd => BloscCompressor::Zstd,
        };

        // f32 typesize for byte shuffling
        let codec = BloscCodec::new(compressor, level, None, BloscShuffleMode::Shuffle, Some(4))
            .map_err(|e| EngineError::Config(e.to_string()))?;

        Ok(Arc::new(codec))
    }
}

impl Default for CubeWriter {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

/// Write a 2-D float raster with its grid as a single-chunk array.
///
/// Used for admin rasters and uploaded selection masks. NaN is kept as is.
pub fn write_raster_2d(dir: &Path, grid: &GridSpec, data: &[f32]) -> Result<()> {
    if data.len() != grid.len() {
        return Err(EngineError::grid_mismatch(format!(
            "raster has {} values, grid has {} cells",
            data.len(),
            grid.len()
        )));
    }

    std::fs::create_dir_all(dir)?;
    let store = Arc::new(FilesystemStore::new(dir).map_err(|e| EngineError::storage(e.to_string()))?);

    let mut attrs = serde_json::Map::new();
    attrs.insert("grid".to_string(), serde_json::to_value(grid)?);

    let shape = vec![grid.ny as u64, grid.nx as u64];
    let chunk_grid: zarrs::array::ChunkGrid = vec![grid.ny.max(1) as u64, grid.nx.max(1) as u64]
        .try_into()
        .map_err(|e| EngineError::Config(format!("{:?}", e)))?;

    let mut binding = ArrayBuilder::new(shape.clone(), DataType::Float32, chunk_grid, FillValue::from(f32::NAN));
    let array = binding
        .attributes(attrs)
        .build(store, "/")
        .map_err(|e| EngineError::storage(e.to_string()))?;

    array.store_metadata().map_err(|e| EngineError::storage(e.to_string()))?;
    let subset = ArraySubset::new_with_start_shape(vec![0, 0], shape)
        .map_err(|e| EngineError::storage(e.to_string()))?;
    array
        .store_array_subset_elements(&subset, data)
        .map_err(|e| EngineError::storage(e.to_string()))?;

    Ok(())
}
