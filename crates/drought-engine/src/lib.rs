//! Spatiotemporal query and aggregation engine for gridded drought indices.
//!
//! Archive cubes are time-stacked rasters (one per index and value space)
//! stored as Zarr V3 arrays chunked along time. The engine narrows them to a
//! year/month window, restricts them to a user selection and reduces them to
//! maps, series and drought-category coverage.
//!
//! # Architecture
//!
//! ```text
//! SelectionTrigger ──► SelectionResolver ──► SpatialSelection
//!                            │                     │
//!                       GridElements               ▼
//!                     (grid index)          DroughtQuery
//!                            │                     │
//!                            ▼                     ▼
//!                    equal-area mask ◄──── DroughtService ──► ResultCache (LRU)
//!                                                  │
//!                                                  ▼
//!                                   DatasetAccessor::interval(index, space, window)
//!                                                  │
//!                                                  ├─► ZarrCube (lazy, ChunkCache)
//!                                                  │
//!                                                  ▼
//!                               reduce_mean / series / correlation / drought_area
//! ```

pub mod cache;
pub mod config;
pub mod dataset;
pub mod error;
pub mod grid_index;
pub mod query;
pub mod reduce;
pub mod reprojection;
pub mod selection;
pub mod service;
pub mod types;
pub mod writer;

// Re-export commonly used types at crate root
pub use cache::{ChunkCache, ResultCache};
pub use config::{EngineConfig, ZarrCompression};
pub use dataset::{
    ArchiveStore, CubeMeta, DatasetAccessor, DatasetInterval, FilesystemArchive, MemoryCube, RasterCube,
    ZarrCube,
};
pub use error::{EngineError, Result};
pub use grid_index::{AdminRasterizer, GridElements, GridIndexStore, StoredAdminRasters};
pub use query::{AreaResult, DroughtQuery, MapResult, QueryKey, SeriesResult, Statistic};
pub use reduce::DroughtArea;
pub use selection::{
    LocationStore, Selection, SelectionKind, SelectionResolver, SelectionTrigger, SpatialSelection,
};
pub use service::{DroughtService, ServiceStats};
pub use types::{CacheStats, Field2D};
pub use writer::{CubeWriteResult, CubeWriter};
