//! Reduction engine: statistics over filtered, masked intervals.
//!
//! All reductions are NaN-aware: missing values never contribute, and a
//! result with no contributing value is NaN.

pub mod correlation;
pub mod drought_area;
pub mod percentile;
pub mod temporal;

pub use correlation::{correlation_field, pearson};
pub use drought_area::{category_table, drought_area, CategoryBand, DroughtArea, CATEGORIES};
pub use percentile::{build_percentile_cube, percentile_rank_cube, percentile_ranks};
pub use temporal::{nan_mean, reduce_max, reduce_mean, reduce_min, series};
