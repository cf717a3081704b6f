//! Synthetic drought-index cubes.
//!
//! Cubes are time-major: `data[t * width * height + row * width + col]`.

/// Creates a cube whose value encodes its own position:
/// `t * 100 + row * 10 + col` (so keep grids under 10x10 for readability).
///
/// ```
/// use test_utils::create_positional_cube;
///
/// let cube = create_positional_cube(3, 2, 4);
/// assert_eq!(cube.len(), 24);
/// assert_eq!(cube[6 + 3 + 2], 112.0); // t=1, row=1, col=2
/// ```
pub fn create_positional_cube(width: usize, height: usize, steps: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height * steps);
    for t in 0..steps {
        for row in 0..height {
            for col in 0..width {
                data.push((t * 100 + row * 10 + col) as f32);
            }
        }
    }
    data
}

/// Creates a cube of index-like values in roughly `[-3, 3]`.
///
/// Each cell carries a slow seasonal cycle plus seeded noise, so series
/// are neither constant nor perfectly correlated with each other.
pub fn create_index_cube(width: usize, height: usize, steps: usize, seed: u32) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height * steps);
    for t in 0..steps {
        let season = ((t % 12) as f32 / 12.0 * std::f32::consts::TAU).sin();
        for row in 0..height {
            for col in 0..width {
                let hash = mix(col as u32 + 7919 * t as u32, row as u32, seed);
                let noise = (hash % 4000) as f32 / 1000.0 - 2.0;
                data.push(season + noise);
            }
        }
    }
    data
}

fn mix(x: u32, y: u32, seed: u32) -> u32 {
    let mut h = seed;
    h = h.wrapping_mul(31).wrapping_add(x);
    h = h.wrapping_mul(31).wrapping_add(y);
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positional_cube_layout() {
        let cube = create_positional_cube(4, 3, 2);
        assert_eq!(cube.len(), 24);
        assert_eq!(cube[12 + 4 * 2 + 3], 123.0);
    }

    #[test]
    fn test_index_cube_is_deterministic_and_bounded() {
        let a = create_index_cube(8, 6, 24, 42);
        let b = create_index_cube(8, 6, 24, 42);
        let c = create_index_cube(8, 6, 24, 43);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.iter().all(|v| (-3.0..=3.0).contains(v)));
    }
}
