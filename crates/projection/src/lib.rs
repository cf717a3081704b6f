//! Coordinate reference system transformations.
//!
//! Implements the equal-area projection from scratch without external
//! dependencies.

pub mod albers;
pub mod error;
pub mod transform;

pub use albers::AlbersEqualArea;
pub use error::ProjectionError;
pub use transform::{equal_area_template, CrsTransform};
