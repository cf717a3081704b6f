//! Albers Equal-Area Conic projection on the GRS80 ellipsoid.
//!
//! Used to build the equal-area grid on which drought area fractions are
//! computed. Formulas follow Snyder, "Map Projections: A Working Manual",
//! pp. 101-102.
//!
//! Projected coordinates are meters east/north of the origin
//! (`lat0`, `lon0`) plus the false easting/northing.

use std::f64::consts::PI;

use drought_common::{AlbersParams, BoundingBox};

use crate::error::ProjectionError;

/// GRS80 semi-major axis (meters).
pub const GRS80_A: f64 = 6_378_137.0;
/// GRS80 first eccentricity squared.
pub const GRS80_E2: f64 = 0.006_694_380_022_90;

const MAX_ITERATIONS: usize = 25;
const CONVERGENCE: f64 = 1e-12;

/// Albers Equal-Area Conic projection with precomputed constants.
#[derive(Debug, Clone)]
pub struct AlbersEqualArea {
    params: AlbersParams,
    /// Central meridian in radians
    lon0: f64,
    a: f64,
    e2: f64,
    e: f64,
    /// Cone constant
    n: f64,
    /// Snyder's C
    c: f64,
    /// Radius of the parallel of origin
    rho0: f64,
}

impl AlbersEqualArea {
    /// Create a projection on the GRS80 ellipsoid.
    pub fn new(params: AlbersParams) -> Result<Self, ProjectionError> {
        Self::with_ellipsoid(params, GRS80_A, GRS80_E2)
    }

    /// CONUS Albers (EPSG:5070).
    pub fn conus() -> Self {
        // Constants of the CONUS parameter set are known to be valid.
        Self::build(AlbersParams::conus(), GRS80_A, GRS80_E2)
    }

    /// Create a projection on an arbitrary ellipsoid.
    pub fn with_ellipsoid(params: AlbersParams, a: f64, e2: f64) -> Result<Self, ProjectionError> {
        for lat in [params.lat0, params.lat1, params.lat2] {
            if !(-90.0..=90.0).contains(&lat) {
                return Err(ProjectionError::InvalidParameters(format!(
                    "latitude {} outside [-90, 90]",
                    lat
                )));
            }
        }
        if (params.lat1 + params.lat2).abs() < 1e-10 {
            return Err(ProjectionError::InvalidParameters(
                "standard parallels are symmetric about the equator".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&e2) || a <= 0.0 {
            return Err(ProjectionError::InvalidParameters(format!(
                "invalid ellipsoid a={} e2={}",
                a, e2
            )));
        }
        Ok(Self::build(params, a, e2))
    }

    fn build(params: AlbersParams, a: f64, e2: f64) -> Self {
        let to_rad = PI / 180.0;
        let e = e2.sqrt();

        let phi0 = params.lat0 * to_rad;
        let phi1 = params.lat1 * to_rad;
        let phi2 = params.lat2 * to_rad;

        let m1 = m_of(phi1, e2);
        let m2 = m_of(phi2, e2);
        let q0 = q_of(phi0, e, e2);
        let q1 = q_of(phi1, e, e2);
        let q2 = q_of(phi2, e, e2);

        let n = if (phi1 - phi2).abs() < 1e-10 {
            phi1.sin()
        } else {
            (m1 * m1 - m2 * m2) / (q2 - q1)
        };
        let c = m1 * m1 + n * q1;
        let rho0 = a * (c - n * q0).max(0.0).sqrt() / n;

        Self {
            params,
            lon0: params.lon0 * to_rad,
            a,
            e2,
            e,
            n,
            c,
            rho0,
        }
    }

    pub fn params(&self) -> &AlbersParams {
        &self.params
    }

    /// Project geographic degrees to meters. Returns `(x, y)`.
    pub fn forward(&self, lon_deg: f64, lat_deg: f64) -> (f64, f64) {
        let to_rad = PI / 180.0;
        let lat = lat_deg * to_rad;

        let mut dlon = lon_deg * to_rad - self.lon0;
        while dlon > PI {
            dlon -= 2.0 * PI;
        }
        while dlon < -PI {
            dlon += 2.0 * PI;
        }

        let q = q_of(lat, self.e, self.e2);
        let rho = self.a * (self.c - self.n * q).max(0.0).sqrt() / self.n;
        let theta = self.n * dlon;

        let x = rho * theta.sin() + self.params.false_easting;
        let y = self.rho0 - rho * theta.cos() + self.params.false_northing;
        (x, y)
    }

    /// Unproject meters back to geographic degrees. Returns `(lon, lat)`.
    pub fn inverse(&self, x: f64, y: f64) -> Result<(f64, f64), ProjectionError> {
        let to_deg = 180.0 / PI;
        let x = x - self.params.false_easting;
        let y = y - self.params.false_northing;

        let dy = self.rho0 - y;
        let mut rho = (x * x + dy * dy).sqrt();
        let theta = if self.n < 0.0 {
            rho = -rho;
            (-x).atan2(-dy)
        } else {
            x.atan2(dy)
        };

        let q = (self.c - (rho * rho * self.n * self.n) / (self.a * self.a)) / self.n;
        let lat = self.latitude_from_q(q, x, y)?;
        let lon = self.lon0 + theta / self.n;

        Ok((lon * to_deg, lat * to_deg))
    }

    /// Iterate Snyder eq. 3-16 for latitude.
    fn latitude_from_q(&self, q: f64, x: f64, y: f64) -> Result<f64, ProjectionError> {
        let e = self.e;
        let e2 = self.e2;

        // q at the poles
        let q_pole = 1.0 - (1.0 - e2) / (2.0 * e) * ((1.0 - e) / (1.0 + e)).ln();
        if (q.abs() - q_pole).abs() < 1e-10 {
            return Ok(q.signum() * PI / 2.0);
        }
        if q.abs() > q_pole {
            return Err(ProjectionError::OutOfDomain { x, y });
        }

        let mut phi = (q / 2.0).asin();
        for _ in 0..MAX_ITERATIONS {
            let sin_phi = phi.sin();
            let cos_phi = phi.cos();
            let one_minus = 1.0 - e2 * sin_phi * sin_phi;
            let delta = one_minus * one_minus / (2.0 * cos_phi)
                * (q / (1.0 - e2) - sin_phi / one_minus
                    + 1.0 / (2.0 * e) * ((1.0 - e * sin_phi) / (1.0 + e * sin_phi)).ln());
            phi += delta;
            if delta.abs() < CONVERGENCE {
                return Ok(phi);
            }
        }

        Err(ProjectionError::NoConvergence { x, y })
    }

    /// Projected extent of a geographic bounding box.
    ///
    /// Parallels project to arcs, so the box edges are sampled rather than
    /// just the corners.
    pub fn project_bounds(&self, bbox: &BoundingBox, samples: usize) -> BoundingBox {
        let samples = samples.max(2);
        let mut out = BoundingBox::empty();

        for t in 0..=samples {
            let frac = t as f64 / samples as f64;
            let lon = bbox.min_x + frac * bbox.width();
            let lat = bbox.min_y + frac * bbox.height();

            for (px, py) in [
                (lon, bbox.min_y),
                (lon, bbox.max_y),
                (bbox.min_x, lat),
                (bbox.max_x, lat),
            ] {
                let (x, y) = self.forward(px, py);
                out.include(x, y);
            }
        }

        // Parallels reach their southernmost point on the central meridian.
        let lon0 = self.params.lon0;
        if lon0 > bbox.min_x && lon0 < bbox.max_x {
            for lat in [bbox.min_y, bbox.max_y] {
                let (x, y) = self.forward(lon0, lat);
                out.include(x, y);
            }
        }

        out
    }
}

fn m_of(phi: f64, e2: f64) -> f64 {
    let s = phi.sin();
    phi.cos() / (1.0 - e2 * s * s).sqrt()
}

fn q_of(phi: f64, e: f64, e2: f64) -> f64 {
    let s = phi.sin();
    (1.0 - e2) * (s / (1.0 - e2 * s * s) - 1.0 / (2.0 * e) * ((1.0 - e * s) / (1.0 + e * s)).ln())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_maps_to_zero() {
        let proj = AlbersEqualArea::conus();
        let (x, y) = proj.forward(-96.0, 23.0);
        assert!(x.abs() < 1e-6, "x should be 0, got {}", x);
        assert!(y.abs() < 1e-6, "y should be 0, got {}", y);
    }

    #[test]
    fn test_central_meridian_symmetry() {
        let proj = AlbersEqualArea::conus();
        let (xw, yw) = proj.forward(-106.0, 40.0);
        let (xe, ye) = proj.forward(-86.0, 40.0);
        assert!((xw + xe).abs() < 1e-6);
        assert!((yw - ye).abs() < 1e-6);
        assert!(xw < 0.0 && xe > 0.0);
    }

    #[test]
    fn test_roundtrip_across_conus() {
        let proj = AlbersEqualArea::conus();
        for &(lon, lat) in &[(-124.5, 48.0), (-96.0, 38.0), (-70.0, 44.0), (-81.0, 25.5)] {
            let (x, y) = proj.forward(lon, lat);
            let (lon2, lat2) = proj.inverse(x, y).unwrap();
            assert!((lon - lon2).abs() < 1e-8, "lon roundtrip: {} vs {}", lon, lon2);
            assert!((lat - lat2).abs() < 1e-8, "lat roundtrip: {} vs {}", lat, lat2);
        }
    }

    #[test]
    fn test_kansas_city_location() {
        let proj = AlbersEqualArea::conus();
        let (x, y) = proj.forward(-94.5, 39.0);
        // A bit east of the central meridian, ~1.8e6 m north of the origin parallel
        assert!(x > 100_000.0 && x < 150_000.0, "x = {}", x);
        assert!(y > 1_700_000.0 && y < 1_900_000.0, "y = {}", y);
    }

    #[test]
    fn test_project_bounds_covers_corners() {
        let proj = AlbersEqualArea::conus();
        let bbox = BoundingBox::new(-125.0, 24.0, -66.0, 50.0);
        let projected = proj.project_bounds(&bbox, 16);

        for (lon, lat) in [(-125.0, 24.0), (-125.0, 50.0), (-66.0, 24.0), (-66.0, 50.0), (-96.0, 50.0)] {
            let (x, y) = proj.forward(lon, lat);
            assert!(projected.contains_point(x, y));
        }
    }

    #[test]
    fn test_rejects_symmetric_parallels() {
        let params = AlbersParams {
            lat1: -30.0,
            lat2: 30.0,
            ..AlbersParams::conus()
        };
        assert!(AlbersEqualArea::new(params).is_err());
    }
}
