//! Coordinate reference system descriptors.
//!
//! Only two systems are in play: the geographic (WGS84 lon/lat) grid the
//! archives are published on, and the Albers equal-area grid used for
//! area-fraction statistics.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Albers equal-area conic parameters, in degrees and meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlbersParams {
    /// First standard parallel
    pub lat1: f64,
    /// Second standard parallel
    pub lat2: f64,
    /// Latitude of origin
    pub lat0: f64,
    /// Central meridian
    pub lon0: f64,
    #[serde(default)]
    pub false_easting: f64,
    #[serde(default)]
    pub false_northing: f64,
}

impl AlbersParams {
    /// CONUS Albers on the GRS80 ellipsoid (EPSG:5070).
    pub fn conus() -> Self {
        Self {
            lat1: 29.5,
            lat2: 45.5,
            lat0: 23.0,
            lon0: -96.0,
            false_easting: 0.0,
            false_northing: 0.0,
        }
    }
}

impl Default for AlbersParams {
    fn default() -> Self {
        Self::conus()
    }
}

/// Reference system a grid's affine transform is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Crs {
    /// Longitude/latitude in degrees.
    Geographic,
    /// Projected meters on an Albers equal-area conic.
    AlbersEqualArea(AlbersParams),
}

impl Crs {
    /// Check if this is a geographic (lat/lon) CRS.
    pub fn is_geographic(&self) -> bool {
        matches!(self, Crs::Geographic)
    }

    /// Albers parameters, if this is the equal-area system.
    pub fn albers(&self) -> Option<&AlbersParams> {
        match self {
            Crs::AlbersEqualArea(params) => Some(params),
            Crs::Geographic => None,
        }
    }
}

impl Default for Crs {
    fn default() -> Self {
        Crs::Geographic
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Crs::Geographic => write!(f, "EPSG:4326"),
            Crs::AlbersEqualArea(p) => write!(
                f,
                "+proj=aea +lat_1={} +lat_2={} +lat_0={} +lon_0={} +ellps=GRS80",
                p.lat1, p.lat2, p.lat0, p.lon0
            ),
        }
    }
}
