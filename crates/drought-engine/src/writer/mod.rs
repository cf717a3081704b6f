//! Zarr writers for archive cubes and auxiliary rasters.
//!
//! Used by the offline builders (percentile and equal-area archives,
//! admin rasters) and by tests that need an on-disk archive.

mod zarr_writer;

pub use zarr_writer::{write_raster_2d, CubeWriteResult, CubeWriter};
