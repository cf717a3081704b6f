//! Common types shared across the drought-index raster workspace.

pub mod bbox;
pub mod catalog;
pub mod crs;
pub mod error;
pub mod grid;
pub mod time;

pub use bbox::BoundingBox;
pub use catalog::{DroughtIndex, IndexFamily, StaticCatalog, ValueRange, ValueSpace};
pub use crs::{AlbersParams, Crs};
pub use error::{DroughtError, DroughtResult};
pub use grid::{GridCell, GridSpec};
pub use time::{MonthSet, TimeFilter};
