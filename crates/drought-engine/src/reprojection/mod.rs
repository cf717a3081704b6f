//! Reprojection bridge between the geographic and equal-area grids.

pub mod interpolation;
pub mod reproject;

pub use interpolation::bilinear_interpolate;
pub use reproject::{build_equal_area_cube, project_mask, reproject_field, resample_with, source_positions};
