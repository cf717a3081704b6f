//! Interpolation on regular grids.
//!
//! Positions are fractional `(col, row)` indices where integer values are
//! cell centers. Positions up to half a cell outside the outer centers are
//! clamped onto the edge, which matches the extent covered by the grid's
//! outer cells; anything beyond that is outside and yields NaN.

/// Bilinear interpolation between the four surrounding cell centers.
///
/// Returns NaN if any of the four corners is NaN.
pub fn bilinear_interpolate(data: &[f32], width: usize, height: usize, x: f64, y: f64) -> f32 {
    let (x, y) = match clamp_position(width, height, x, y) {
        Some(pos) => pos,
        None => return f32::NAN,
    };

    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);

    let xf = (x - x0 as f64) as f32;
    let yf = (y - y0 as f64) as f32;

    let v00 = data[y0 * width + x0];
    let v10 = data[y0 * width + x1];
    let v01 = data[y1 * width + x0];
    let v11 = data[y1 * width + x1];

    if v00.is_nan() || v10.is_nan() || v01.is_nan() || v11.is_nan() {
        return f32::NAN;
    }

    let top = v00 * (1.0 - xf) + v10 * xf;
    let bottom = v01 * (1.0 - xf) + v11 * xf;
    top * (1.0 - yf) + bottom * yf
}

fn clamp_position(width: usize, height: usize, x: f64, y: f64) -> Option<(f64, f64)> {
    if width == 0 || height == 0 || !x.is_finite() || !y.is_finite() {
        return None;
    }
    let max_x = (width - 1) as f64;
    let max_y = (height - 1) as f64;
    if x < -0.5 || y < -0.5 || x > max_x + 0.5 || y > max_y + 0.5 {
        return None;
    }
    Some((x.clamp(0.0, max_x), y.clamp(0.0, max_y)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bilinear_interpolate() {
        let data: Vec<f32> = vec![
            1.0, 2.0,
            3.0, 4.0,
        ];

        assert_eq!(bilinear_interpolate(&data, 2, 2, 0.0, 0.0), 1.0);
        assert_eq!(bilinear_interpolate(&data, 2, 2, 1.0, 0.0), 2.0);
        assert_eq!(bilinear_interpolate(&data, 2, 2, 0.0, 1.0), 3.0);
        assert_eq!(bilinear_interpolate(&data, 2, 2, 1.0, 1.0), 4.0);

        let center = bilinear_interpolate(&data, 2, 2, 0.5, 0.5);
        assert!((center - 2.5).abs() < 0.001);
    }

    #[test]
    fn test_bilinear_with_nan() {
        let data: Vec<f32> = vec![
            1.0, f32::NAN,
            3.0, 4.0,
        ];
        assert!(bilinear_interpolate(&data, 2, 2, 0.5, 0.5).is_nan());
    }

    #[test]
    fn test_edge_half_cell_is_clamped() {
        let data: Vec<f32> = vec![
            1.0, 2.0,
            3.0, 4.0,
        ];
        assert_eq!(bilinear_interpolate(&data, 2, 2, -0.4, 0.0), 1.0);
        assert_eq!(bilinear_interpolate(&data, 2, 2, 1.4, 1.4), 4.0);
        assert!(bilinear_interpolate(&data, 2, 2, -0.6, 0.0).is_nan());
        assert!(bilinear_interpolate(&data, 2, 2, 0.0, 1.6).is_nan());
    }
}
